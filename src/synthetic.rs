//! Deterministic synthetic datasets for benches, timeout tests and the binary.

use ahash::AHashSet;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::dataset::{Dataset, Faculty, Keyword, KeywordScore, Publication, University};

const TOPICS: &[&str] = &[
    "machine learning",
    "databases",
    "computer vision",
    "natural language processing",
    "distributed systems",
    "information retrieval",
    "computer networks",
    "operating systems",
    "cryptography",
    "data mining",
    "robotics",
    "bioinformatics",
    "compilers",
    "human computer interaction",
    "software engineering",
    "quantum computing",
];

#[derive(Clone, Debug)]
pub struct DatasetShape {
    pub universities: usize,
    pub faculty_per_university: usize,
    pub keywords: usize,
    pub publications: usize,
    pub first_year: i32,
    pub last_year: i32,
    pub keywords_per_faculty: usize,
    pub keywords_per_publication: usize,
    pub authors_per_publication: usize,
}

impl Default for DatasetShape {
    fn default() -> Self {
        Self {
            universities: 8,
            faculty_per_university: 12,
            keywords: 40,
            publications: 400,
            first_year: 2000,
            last_year: 2020,
            keywords_per_faculty: 4,
            keywords_per_publication: 3,
            authors_per_publication: 3,
        }
    }
}

impl DatasetShape {
    pub fn small() -> Self {
        Self {
            universities: 3,
            faculty_per_university: 4,
            keywords: 12,
            publications: 30,
            ..Self::default()
        }
    }

    pub fn large() -> Self {
        Self {
            universities: 40,
            faculty_per_university: 50,
            keywords: 200,
            publications: 20_000,
            ..Self::default()
        }
    }
}

/// Builds a dataset that always passes [`Dataset::validate`].
///
/// Publication keyword scores are multiples of 0.25 and citation counts are
/// integers, so every KRC sum is exact in `f64` whatever order a store adds
/// the terms in.
pub fn generate_dataset(shape: &DatasetShape, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let universities = build_universities(shape.universities.max(1));
    let keywords = build_keywords(shape.keywords.max(1));
    let keyword_ids: Vec<i64> = keywords.iter().map(|k| k.id).collect();

    let mut faculty = Vec::with_capacity(universities.len() * shape.faculty_per_university);
    for university in &universities {
        for _ in 0..shape.faculty_per_university {
            let id = faculty.len() as i64 + 1;
            faculty.push(Faculty {
                id,
                name: format!("Faculty {id:05}"),
                university_id: university.id,
                keywords: pick_scores(&mut rng, &keyword_ids, shape.keywords_per_faculty, |rng| {
                    rng.gen_range(1..=100) as f64
                }),
                publications: Vec::new(),
            });
        }
    }

    let (first_year, last_year) = if shape.first_year <= shape.last_year {
        (shape.first_year, shape.last_year)
    } else {
        (shape.last_year, shape.first_year)
    };
    let mut publications = Vec::with_capacity(shape.publications);
    for idx in 0..shape.publications {
        let id = idx as i64 + 1;
        publications.push(Publication {
            id,
            title: format!("Publication {id:06}"),
            year: rng.gen_range(first_year..=last_year),
            num_citations: rng.gen_range(0..500),
            keywords: pick_scores(
                &mut rng,
                &keyword_ids,
                shape.keywords_per_publication,
                |rng| rng.gen_range(1..=4) as f64 * 0.25,
            ),
        });
        if faculty.is_empty() {
            continue;
        }
        let authors = shape.authors_per_publication.clamp(1, faculty.len());
        let mut chosen = AHashSet::with_capacity(authors);
        while chosen.len() < authors {
            chosen.insert(rng.gen_range(0..faculty.len()));
        }
        let mut chosen: Vec<usize> = chosen.into_iter().collect();
        chosen.sort_unstable();
        for author in chosen {
            faculty[author].publications.push(id);
        }
    }

    Dataset {
        universities,
        keywords,
        faculty,
        publications,
    }
}

fn build_universities(count: usize) -> Vec<University> {
    (1..=count as i64)
        .map(|id| University {
            id,
            name: format!("University {id:03}"),
            photo_url: Some(format!("https://images.example.org/universities/{id}.png")),
        })
        .collect()
}

fn build_keywords(count: usize) -> Vec<Keyword> {
    (0..count)
        .map(|idx| {
            let topic = TOPICS[idx % TOPICS.len()];
            let round = idx / TOPICS.len();
            let name = if round == 0 {
                topic.to_string()
            } else {
                format!("{topic} {round}")
            };
            Keyword {
                id: idx as i64 + 1,
                name,
            }
        })
        .collect()
}

fn pick_scores<F>(rng: &mut StdRng, ids: &[i64], count: usize, mut score: F) -> Vec<KeywordScore>
where
    F: FnMut(&mut StdRng) -> f64,
{
    let mut picked: Vec<i64> = ids
        .choose_multiple(rng, count.min(ids.len()))
        .copied()
        .collect();
    picked.sort_unstable();
    picked
        .into_iter()
        .map(|keyword_id| KeywordScore {
            keyword_id,
            score: score(rng),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_dataset() {
        let shape = DatasetShape::small();
        assert_eq!(generate_dataset(&shape, 7), generate_dataset(&shape, 7));
    }

    #[test]
    fn generated_dataset_validates() {
        let dataset = generate_dataset(&DatasetShape::default(), 42);
        dataset.validate().expect("valid dataset");
        assert_eq!(dataset.faculty.len(), 96);
        assert_eq!(dataset.keywords.len(), 40);
    }
}
