//! Configuration for the three store adapters.
//!
//! Every store is described by a [`StoreConfig`]: where its database lives,
//! how many connections its pool may hold, and the time bounds applied to lock
//! waits and statements. [`FederationConfig`] groups the three adapters and can
//! be built from defaults, from `ACADEMICFED_*` environment variables, or from a
//! JSON file.
//!
//! ```rust
//! use academicfed::config::{FederationConfig, StoreLocation};
//!
//! let cfg = FederationConfig::default();
//! assert_eq!(cfg.graph.location, StoreLocation::InMemory);
//! assert_eq!(cfg.relational.min_keyword_relevance, 50.0);
//! ```

use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::errors::{FederationError, FederationResult};

pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PROGRESS_INTERVAL: i32 = 1_000;
pub const DEFAULT_MIN_KEYWORD_RELEVANCE: f64 = 50.0;

/// Where a store keeps its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreLocation {
    /// Private in-memory database. Only one connection can see it, so the pool
    /// is capped at a single connection.
    InMemory,
    /// SQLite database file, opened in WAL mode.
    File(PathBuf),
}

/// Connection and time bounds for one store adapter.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub location: StoreLocation,
    /// Maximum number of simultaneously open connections.
    ///
    /// **Default:** `4` (always `1` for [`StoreLocation::InMemory`])
    pub pool_size: usize,
    /// How long a statement waits on another connection's write lock.
    pub busy_timeout: Duration,
    /// Upper bound for a single adapter call, including the wait for a free
    /// connection and the statements it runs.
    pub query_timeout: Duration,
    /// Number of SQLite VM instructions between deadline checks.
    pub progress_interval: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            location: StoreLocation::InMemory,
            pool_size: DEFAULT_POOL_SIZE,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self {
            location: StoreLocation::File(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Pool size after applying the in-memory restriction.
    pub fn effective_pool_size(&self) -> usize {
        match self.location {
            StoreLocation::InMemory => 1,
            StoreLocation::File(_) => self.pool_size.max(1),
        }
    }

    pub fn validate(&self) -> FederationResult<()> {
        if self.pool_size == 0 {
            return Err(FederationError::query("pool_size must be at least 1"));
        }
        if self.progress_interval <= 0 {
            return Err(FederationError::query(
                "progress_interval must be positive",
            ));
        }
        if let StoreLocation::File(path) = &self.location
            && path.as_os_str().is_empty()
        {
            return Err(FederationError::query("store path must not be empty"));
        }
        Ok(())
    }
}

/// Relational adapter options.
#[derive(Clone, Debug)]
pub struct RelationalConfig {
    pub store: StoreConfig,
    /// Minimum `faculty_keyword.score` for a faculty member to count as
    /// working on a keyword.
    pub min_keyword_relevance: f64,
}

impl Default for RelationalConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            min_keyword_relevance: DEFAULT_MIN_KEYWORD_RELEVANCE,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FederationConfig {
    pub relational: RelationalConfig,
    pub document: StoreConfig,
    pub graph: StoreConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct StoreFile {
    path: Option<PathBuf>,
    pool_size: Option<usize>,
    busy_timeout_ms: Option<u64>,
    query_timeout_ms: Option<u64>,
    progress_interval: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct RelationalFile {
    path: Option<PathBuf>,
    pool_size: Option<usize>,
    busy_timeout_ms: Option<u64>,
    query_timeout_ms: Option<u64>,
    progress_interval: Option<i32>,
    min_keyword_relevance: Option<f64>,
}

impl RelationalFile {
    fn split(self) -> (StoreFile, Option<f64>) {
        let store = StoreFile {
            path: self.path,
            pool_size: self.pool_size,
            busy_timeout_ms: self.busy_timeout_ms,
            query_timeout_ms: self.query_timeout_ms,
            progress_interval: self.progress_interval,
        };
        (store, self.min_keyword_relevance)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    relational: RelationalFile,
    document: StoreFile,
    graph: StoreFile,
}

impl StoreFile {
    fn apply(self, target: &mut StoreConfig) {
        if let Some(path) = self.path {
            target.location = StoreLocation::File(path);
        }
        if let Some(size) = self.pool_size {
            target.pool_size = size;
        }
        if let Some(ms) = self.busy_timeout_ms {
            target.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.query_timeout_ms {
            target.query_timeout = Duration::from_millis(ms);
        }
        if let Some(interval) = self.progress_interval {
            target.progress_interval = interval;
        }
    }
}

impl FederationConfig {
    /// Reads `ACADEMICFED_{RELATIONAL,DOCUMENT,GRAPH}_PATH`,
    /// `ACADEMICFED_POOL_SIZE`, `ACADEMICFED_QUERY_TIMEOUT_MS` and
    /// `ACADEMICFED_MIN_KEYWORD_RELEVANCE`. Unset variables keep defaults.
    pub fn from_env() -> FederationResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> FederationResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(path) = lookup("ACADEMICFED_RELATIONAL_PATH") {
            cfg.relational.store.location = StoreLocation::File(path.into());
        }
        if let Some(path) = lookup("ACADEMICFED_DOCUMENT_PATH") {
            cfg.document.location = StoreLocation::File(path.into());
        }
        if let Some(path) = lookup("ACADEMICFED_GRAPH_PATH") {
            cfg.graph.location = StoreLocation::File(path.into());
        }
        if let Some(raw) = lookup("ACADEMICFED_POOL_SIZE") {
            let size = parse_number::<usize>("ACADEMICFED_POOL_SIZE", &raw)?;
            for store in cfg.stores_mut() {
                store.pool_size = size;
            }
        }
        if let Some(raw) = lookup("ACADEMICFED_QUERY_TIMEOUT_MS") {
            let ms = parse_number::<u64>("ACADEMICFED_QUERY_TIMEOUT_MS", &raw)?;
            for store in cfg.stores_mut() {
                store.query_timeout = Duration::from_millis(ms);
            }
        }
        if let Some(raw) = lookup("ACADEMICFED_MIN_KEYWORD_RELEVANCE") {
            cfg.relational.min_keyword_relevance =
                parse_number::<f64>("ACADEMICFED_MIN_KEYWORD_RELEVANCE", &raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_str(raw: &str) -> FederationResult<Self> {
        let file: ConfigFile = serde_json::from_str(raw)
            .map_err(|e| FederationError::query(format!("invalid config: {e}")))?;
        let mut cfg = Self::default();
        let (relational, min_relevance) = file.relational.split();
        relational.apply(&mut cfg.relational.store);
        if let Some(min) = min_relevance {
            cfg.relational.min_keyword_relevance = min;
        }
        file.document.apply(&mut cfg.document);
        file.graph.apply(&mut cfg.graph);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> FederationResult<Self> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|e| {
            FederationError::query(format!(
                "cannot read config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> FederationResult<()> {
        self.relational.store.validate()?;
        self.document.validate()?;
        self.graph.validate()?;
        if !self.relational.min_keyword_relevance.is_finite() {
            return Err(FederationError::query(
                "min_keyword_relevance must be a finite number",
            ));
        }
        Ok(())
    }

    fn stores_mut(&mut self) -> [&mut StoreConfig; 3] {
        [
            &mut self.relational.store,
            &mut self.document,
            &mut self.graph,
        ]
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> FederationResult<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| FederationError::query(format!("{key} has invalid value {raw:?}")))
}
