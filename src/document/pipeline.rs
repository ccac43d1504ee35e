//! Aggregation pipeline over one document collection.
//!
//! A pipeline is a list of [`Stage`]s applied in order to the documents of a
//! collection. A leading [`Stage::Match`] is pushed down to SQL where the
//! store has an index for the matched path; every other stage runs in memory
//! under the deadline of the calling connection.

use std::{cmp::Ordering, mem};

use ahash::AHashMap;
use rusqlite::{OptionalExtension, params, params_from_iter, types::Value as SqlValue};
use serde_json::{Map, Number, Value};

use super::schema::{self, IndexKind};
use crate::{
    errors::{FederationError, FederationResult},
    pool::PooledConnection,
};

const DEADLINE_STRIDE: usize = 1024;

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gte(String, Value),
    /// Matches when no value at the path equals any of the listed values.
    NotIn(String, Vec<Value>),
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq<P: Into<String>, V: Into<Value>>(path: P, value: V) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn gte<P: Into<String>, V: Into<Value>>(path: P, value: V) -> Self {
        Filter::Gte(path.into(), value.into())
    }

    pub fn not_in<P, I, V>(path: P, values: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::NotIn(path.into(), values.into_iter().map(Into::into).collect())
    }

    /// Array fields match when any element matches.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::Eq(path, expected) => values_at(doc, path)
                .into_iter()
                .any(|value| compare(Some(value), Some(expected)) == Ordering::Equal),
            Filter::Gte(path, bound) => values_at(doc, path).into_iter().any(|value| {
                same_type(value, bound) && compare(Some(value), Some(bound)) != Ordering::Less
            }),
            Filter::NotIn(path, excluded) => values_at(doc, path).into_iter().all(|value| {
                !excluded
                    .iter()
                    .any(|item| compare(Some(value), Some(item)) == Ordering::Equal)
            }),
            Filter::And(filters) => filters.iter().all(|f| f.matches(doc)),
        }
    }

    fn conjuncts(&self) -> Vec<&Filter> {
        match self {
            Filter::And(filters) => filters.iter().flat_map(|f| f.conjuncts()).collect(),
            other => vec![other],
        }
    }

    fn paths(&self) -> Vec<&str> {
        self.conjuncts()
            .into_iter()
            .filter_map(|f| match f {
                Filter::Eq(path, _) | Filter::Gte(path, _) | Filter::NotIn(path, _) => {
                    Some(path.as_str())
                }
                Filter::And(_) => None,
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Field(String),
    Literal(f64),
    Multiply(Vec<Expr>),
}

impl Expr {
    pub fn field<P: Into<String>>(path: P) -> Self {
        Expr::Field(path.into())
    }

    /// `None` when a referenced field is missing or not numeric.
    fn eval(&self, doc: &Value) -> Option<f64> {
        match self {
            Expr::Field(path) => lookup(doc, path).and_then(Value::as_f64),
            Expr::Literal(value) => Some(*value),
            Expr::Multiply(factors) => factors
                .iter()
                .try_fold(1.0, |acc, factor| factor.eval(doc).map(|v| acc * v)),
        }
    }

    fn paths(&self) -> Vec<&str> {
        match self {
            Expr::Field(path) => vec![path.as_str()],
            Expr::Literal(_) => Vec::new(),
            Expr::Multiply(factors) => factors.iter().flat_map(|f| f.paths()).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Accumulator {
    Count,
    /// Sums the expression, skipping documents where it has no value.
    Sum(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub path: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc<P: Into<String>>(path: P) -> Self {
        Self {
            path: path.into(),
            descending: false,
        }
    }

    pub fn desc<P: Into<String>>(path: P) -> Self {
        Self {
            path: path.into(),
            descending: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    Match(Filter),
    /// Emits one document per element of the array at the path. Documents
    /// without the field, or with an empty array, are dropped.
    Unwind(String),
    /// Writes the `from` documents whose ids are listed at `local_field` into
    /// `as_field`. Unknown ids are skipped.
    Lookup {
        from: String,
        local_field: String,
        as_field: String,
    },
    /// Groups by `keys` (`(output name, source path)` pairs), emitting one
    /// document per group with the keys and the accumulated `output`.
    Group {
        keys: Vec<(String, String)>,
        accumulator: Accumulator,
        output: String,
    },
    Sort(Vec<SortKey>),
    Limit(usize),
    Round {
        field: String,
        places: u32,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pipeline {
    pub collection: String,
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new<C: Into<String>>(collection: C) -> Self {
        Self {
            collection: collection.into(),
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn validate(&self) -> FederationResult<()> {
        schema::validate_path(&self.collection)?;
        for stage in &self.stages {
            match stage {
                Stage::Match(filter) => {
                    for path in filter.paths() {
                        schema::validate_path(path)?;
                    }
                }
                Stage::Unwind(path) => schema::validate_path(path)?,
                Stage::Lookup {
                    from,
                    local_field,
                    as_field,
                } => {
                    schema::validate_path(from)?;
                    schema::validate_path(local_field)?;
                    schema::validate_path(as_field)?;
                }
                Stage::Group {
                    keys,
                    accumulator,
                    output,
                } => {
                    for (name, path) in keys {
                        schema::validate_path(name)?;
                        schema::validate_path(path)?;
                    }
                    if let Accumulator::Sum(expr) = accumulator {
                        for path in expr.paths() {
                            schema::validate_path(path)?;
                        }
                    }
                    schema::validate_path(output)?;
                }
                Stage::Sort(keys) => {
                    for key in keys {
                        schema::validate_path(&key.path)?;
                    }
                }
                Stage::Limit(_) => {}
                Stage::Round { field, .. } => schema::validate_path(field)?,
            }
        }
        Ok(())
    }
}

pub fn run_pipeline(
    conn: &PooledConnection<'_>,
    pipeline: &Pipeline,
) -> FederationResult<Vec<Value>> {
    pipeline.validate()?;
    let pushdown = match pipeline.stages.first() {
        Some(Stage::Match(filter)) => Some(filter),
        _ => None,
    };
    let mut docs = scan(conn, &pipeline.collection, pushdown)?;
    for stage in &pipeline.stages {
        conn.check_deadline()?;
        docs = match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Unwind(path) => unwind(conn, docs, path)?,
            Stage::Lookup {
                from,
                local_field,
                as_field,
            } => lookup_stage(conn, docs, from, local_field, as_field)?,
            Stage::Group {
                keys,
                accumulator,
                output,
            } => group(conn, docs, keys, accumulator, output)?,
            Stage::Sort(keys) => {
                let mut docs = docs;
                docs.sort_by(|a, b| compare_by(a, b, keys));
                docs
            }
            Stage::Limit(limit) => {
                let mut docs = docs;
                docs.truncate(*limit);
                docs
            }
            Stage::Round { field, places } => {
                let mut docs = docs;
                for doc in &mut docs {
                    round_field(doc, field, *places)?;
                }
                docs
            }
        };
    }
    Ok(docs)
}

/// Loads the collection, narrowed by whichever conjuncts of `filter` an
/// index can answer.
fn scan(
    conn: &PooledConnection<'_>,
    collection: &str,
    filter: Option<&Filter>,
) -> FederationResult<Vec<Value>> {
    let mut sql = String::from("SELECT body FROM documents WHERE collection = ?1");
    let mut bound: Vec<SqlValue> = vec![SqlValue::Text(collection.to_string())];
    for conjunct in filter.map(Filter::conjuncts).unwrap_or_default() {
        let (path, value, op) = match conjunct {
            Filter::Eq(path, value) => (path, value, "="),
            Filter::Gte(path, value) => (path, value, ">="),
            // Exclusions are applied in memory.
            Filter::NotIn(..) | Filter::And(_) => continue,
        };
        let Some(spec) = schema::index_for(collection, path) else {
            continue;
        };
        let Some(sql_value) = to_sql_value(value) else {
            continue;
        };
        match spec.kind {
            IndexKind::Expression => {
                bound.push(sql_value);
                sql.push_str(&format!(
                    " AND {} {op} ?{}",
                    schema::json_expr(spec.path)?,
                    bound.len()
                ));
            }
            IndexKind::Multikey if op == "=" => {
                bound.push(SqlValue::Text(spec.path.to_string()));
                let path_param = bound.len();
                bound.push(sql_value);
                sql.push_str(&format!(
                    " AND doc_id IN (SELECT doc_id FROM document_index_entries
                       WHERE collection = ?1 AND path = ?{path_param} AND value = ?{})",
                    bound.len()
                ));
            }
            IndexKind::Multikey => {}
        }
    }
    sql.push_str(" ORDER BY doc_id");

    let mut stmt = conn.prepare_cached(&sql).map_err(FederationError::from_read)?;
    let rows = stmt
        .query_map(params_from_iter(bound), |row| row.get::<_, String>(0))
        .map_err(FederationError::from_read)?;
    let mut docs = Vec::new();
    for body in rows {
        let body = body.map_err(FederationError::from_read)?;
        docs.push(parse_body(&body)?);
    }
    Ok(docs)
}

fn unwind(
    conn: &PooledConnection<'_>,
    docs: Vec<Value>,
    path: &str,
) -> FederationResult<Vec<Value>> {
    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        let items = match lookup_mut(&mut doc, path) {
            Some(Value::Array(items)) => mem::take(items),
            Some(Value::Null) | None => continue,
            Some(_) => {
                out.push(doc);
                continue;
            }
        };
        for item in items {
            let mut copy = doc.clone();
            set_path(&mut copy, path, item);
            out.push(copy);
            if out.len() % DEADLINE_STRIDE == 0 {
                conn.check_deadline()?;
            }
        }
    }
    Ok(out)
}

fn lookup_stage(
    conn: &PooledConnection<'_>,
    docs: Vec<Value>,
    from: &str,
    local_field: &str,
    as_field: &str,
) -> FederationResult<Vec<Value>> {
    let mut stmt = conn
        .prepare_cached("SELECT body FROM documents WHERE collection = ?1 AND doc_id = ?2")
        .map_err(FederationError::from_read)?;
    let mut cache: AHashMap<i64, Option<Value>> = AHashMap::new();
    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        let ids: Vec<i64> = match lookup(&doc, local_field) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
            Some(value) => value.as_i64().into_iter().collect(),
            None => Vec::new(),
        };
        let mut joined = Vec::with_capacity(ids.len());
        for id in ids {
            if !cache.contains_key(&id) {
                let body: Option<String> = stmt
                    .query_row(params![from, id], |row| row.get(0))
                    .optional()
                    .map_err(FederationError::from_read)?;
                let parsed = body.as_deref().map(parse_body).transpose()?;
                cache.insert(id, parsed);
            }
            if let Some(Some(found)) = cache.get(&id) {
                joined.push(found.clone());
            }
        }
        set_path(&mut doc, as_field, Value::Array(joined));
        out.push(doc);
        if out.len() % DEADLINE_STRIDE == 0 {
            conn.check_deadline()?;
        }
    }
    Ok(out)
}

enum Acc {
    Count(i64),
    Sum(f64),
}

fn group(
    conn: &PooledConnection<'_>,
    docs: Vec<Value>,
    keys: &[(String, String)],
    accumulator: &Accumulator,
    output: &str,
) -> FederationResult<Vec<Value>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: AHashMap<String, (Vec<Value>, Acc)> = AHashMap::new();
    for (idx, doc) in docs.iter().enumerate() {
        if idx % DEADLINE_STRIDE == DEADLINE_STRIDE - 1 {
            conn.check_deadline()?;
        }
        let key_values: Vec<Value> = keys
            .iter()
            .map(|(_, path)| lookup(doc, path).cloned().unwrap_or(Value::Null))
            .collect();
        let key = Value::Array(key_values.clone()).to_string();
        let entry = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            let acc = match accumulator {
                Accumulator::Count => Acc::Count(0),
                Accumulator::Sum(_) => Acc::Sum(0.0),
            };
            (key_values, acc)
        });
        match (&mut entry.1, accumulator) {
            (Acc::Count(count), _) => *count += 1,
            (Acc::Sum(sum), Accumulator::Sum(expr)) => {
                if let Some(value) = expr.eval(doc) {
                    *sum += value;
                }
            }
            (Acc::Sum(_), Accumulator::Count) => {}
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        let Some((values, acc)) = groups.remove(&key) else {
            continue;
        };
        let mut object = Map::new();
        for ((name, _), value) in keys.iter().zip(values) {
            object.insert(name.clone(), value);
        }
        let total = match acc {
            Acc::Count(count) => Value::from(count),
            Acc::Sum(sum) => Number::from_f64(sum).map(Value::Number).ok_or_else(|| {
                FederationError::query(format!("{output} is not a finite number"))
            })?,
        };
        object.insert(output.to_string(), total);
        out.push(Value::Object(object));
    }
    Ok(out)
}

fn round_field(doc: &mut Value, field: &str, places: u32) -> FederationResult<()> {
    let Some(value) = lookup(doc, field).and_then(Value::as_f64) else {
        return Ok(());
    };
    let factor = 10f64.powi(places as i32);
    let rounded = (value * factor).round() / factor;
    let number = Number::from_f64(rounded)
        .ok_or_else(|| FederationError::query(format!("{field} is not a finite number")))?;
    set_path(doc, field, Value::Number(number));
    Ok(())
}

fn compare_by(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let ordering = compare(lookup(a, &key.path), lookup(b, &key.path));
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Missing and null sort first, then numbers, then strings.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or(f64::NAN)
                .total_cmp(&y.as_f64().unwrap_or(f64::NAN)),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) if rank(Some(x)) == 4 && rank(Some(y)) == 4 => {
            x.to_string().cmp(&y.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn same_type(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_))
    )
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.as_object()?.get(segment))
}

fn lookup_mut<'a>(doc: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(doc, |current, segment| current.as_object_mut()?.get_mut(segment))
}

/// All values at `path`, descending into arrays met along the way.
pub(crate) fn values_at<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Some(child) = item.as_object().and_then(|m| m.get(segment)) {
                            next.push(child);
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

fn to_sql_value(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real)),
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        _ => None,
    }
}

fn parse_body(body: &str) -> FederationResult<Value> {
    serde_json::from_str(body).map_err(|e| FederationError::query(format!("corrupt document: {e}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn filter_matches_inside_arrays() {
        let doc = json!({"keywords": [{"name": "databases"}, {"name": "robotics"}]});
        assert!(Filter::eq("keywords.name", "robotics").matches(&doc));
        assert!(!Filter::eq("keywords.name", "compilers").matches(&doc));
    }

    #[test]
    fn not_in_rejects_any_listed_element() {
        let doc = json!({"id": 3, "keywords": [{"name": "databases"}, {"name": "robotics"}]});
        assert!(!Filter::not_in("keywords.name", ["robotics"]).matches(&doc));
        assert!(Filter::not_in("keywords.name", ["compilers"]).matches(&doc));
        assert!(!Filter::not_in("id", [1, 3]).matches(&doc));
        assert!(Filter::not_in("id", Vec::<i64>::new()).matches(&doc));
        assert!(Filter::not_in("missing", ["x"]).matches(&doc));
    }

    #[test]
    fn gte_does_not_cross_types() {
        let doc = json!({"year": "2020"});
        assert!(!Filter::gte("year", 2015).matches(&doc));
        assert!(Filter::gte("year", 2015).matches(&json!({"year": 2015})));
    }

    #[test]
    fn set_path_creates_parents() {
        let mut doc = json!({});
        set_path(&mut doc, "a.b", json!(1));
        assert_eq!(doc, json!({"a": {"b": 1}}));
    }

    #[test]
    fn sort_orders_numbers_then_names() {
        let mut docs = vec![
            json!({"n": 1, "k": "b"}),
            json!({"n": 2, "k": "z"}),
            json!({"n": 1, "k": "a"}),
        ];
        let keys = [SortKey::desc("n"), SortKey::asc("k")];
        docs.sort_by(|a, b| compare_by(a, b, &keys));
        let names: Vec<&str> = docs.iter().filter_map(|d| d["k"].as_str()).collect();
        assert_eq!(names, vec!["z", "a", "b"]);
    }

    #[test]
    fn invalid_paths_are_rejected() {
        let pipeline = Pipeline::new("publications").stage(Stage::Unwind("keywords; DROP".into()));
        assert!(matches!(
            pipeline.validate(),
            Err(FederationError::QueryError(_))
        ));
    }
}
