//! Genre id to name mapping.

use std::collections::HashMap;

/// TMDB's movie genres, used when the live list cannot be fetched.
const FALLBACK_GENRES: &[(i64, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

/// Immutable id to name table. Built once when a catalog is constructed and
/// shared by reference afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreTable {
    names: HashMap<i64, String>,
    fallback: bool,
}

impl GenreTable {
    pub fn new(entries: impl IntoIterator<Item = (i64, String)>) -> Self {
        Self {
            names: entries.into_iter().collect(),
            fallback: false,
        }
    }

    /// The built-in table of well-known genres.
    pub fn fallback() -> Self {
        Self {
            names: FALLBACK_GENRES
                .iter()
                .map(|(id, name)| (*id, (*name).to_string()))
                .collect(),
            fallback: true,
        }
    }

    /// Whether this table came from [`GenreTable::fallback`].
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn name(&self, id: i64) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Resolve ids in order, dropping unknown ones.
    pub fn resolve(&self, ids: &[i64]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.name(*id).map(str::to_string))
            .collect()
    }

    /// All genre names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.values().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
