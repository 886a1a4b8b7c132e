//! Search input, filtering, ordering and pagination.
//!
//! The same [`RecordComparator`] and [`MovieFilter`] are used whether the work
//! happens inside a store or in memory over a freshly fetched remote page, so
//! both paths order and filter identically.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::CoreError;
use crate::model::MovieRecord;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Page size used when the caller does not pick one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Title,
    Year,
    Rating,
    Runtime,
}

impl SortField {
    /// Column holding this field in the SQLite schema.
    pub fn column(self) -> &'static str {
        match self {
            SortField::Title => "title",
            SortField::Year => "release_year",
            SortField::Rating => "rating_score",
            SortField::Runtime => "runtime_minutes",
        }
    }

    fn compare_fn(self) -> FieldCompare {
        match self {
            SortField::Title => compare_title,
            SortField::Year => compare_year,
            SortField::Rating => compare_rating,
            SortField::Runtime => compare_runtime,
        }
    }
}

impl FromStr for SortField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(SortField::Title),
            "year" => Ok(SortField::Year),
            "rating" => Ok(SortField::Rating),
            "runtime" => Ok(SortField::Runtime),
            other => Err(CoreError::Validation(format!(
                "unknown sort field '{other}' (expected title, year, rating or runtime)"
            ))),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortField::Title => "title",
            SortField::Year => "year",
            SortField::Rating => "rating",
            SortField::Runtime => "runtime",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(CoreError::Validation(format!(
                "unknown sort direction '{other}' (expected asc or desc)"
            ))),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
    }
}

/// Requested ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Resolve the comparator once; callers reuse it for every comparison.
    pub fn comparator(self) -> RecordComparator {
        RecordComparator {
            compare: self.field.compare_fn(),
            direction: self.direction,
        }
    }

    /// `ORDER BY` body matching [`RecordComparator`]: nulls last in both
    /// directions, ties broken by ascending internal id.
    pub fn order_by_sql(self) -> String {
        let col = self.field.column();
        format!(
            "({col} IS NULL) ASC, {col} {}, id ASC",
            self.direction.sql()
        )
    }
}

type FieldCompare = fn(&MovieRecord, &MovieRecord, SortDirection) -> Ordering;

/// Total order over records for one [`SortSpec`].
#[derive(Clone, Copy)]
pub struct RecordComparator {
    compare: FieldCompare,
    direction: SortDirection,
}

impl RecordComparator {
    pub fn compare(&self, a: &MovieRecord, b: &MovieRecord) -> Ordering {
        (self.compare)(a, b, self.direction).then_with(|| a.id.cmp(&b.id))
    }

    pub fn sort(&self, records: &mut [MovieRecord]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}

/// Missing values sort after present ones regardless of direction.
fn nulls_last<T>(
    a: Option<T>,
    b: Option<T>,
    direction: SortDirection,
    cmp: impl FnOnce(&T, &T) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => direction.apply(cmp(&a, &b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_title(a: &MovieRecord, b: &MovieRecord, dir: SortDirection) -> Ordering {
    dir.apply(a.title.cmp(&b.title))
}

fn compare_year(a: &MovieRecord, b: &MovieRecord, dir: SortDirection) -> Ordering {
    nulls_last(a.release_year, b.release_year, dir, Ord::cmp)
}

fn compare_rating(a: &MovieRecord, b: &MovieRecord, dir: SortDirection) -> Ordering {
    nulls_last(
        a.rating.external_score,
        b.rating.external_score,
        dir,
        f64::total_cmp,
    )
}

fn compare_runtime(a: &MovieRecord, b: &MovieRecord, dir: SortDirection) -> Ordering {
    nulls_last(a.runtime_minutes, b.runtime_minutes, dir, Ord::cmp)
}

/// Case-insensitive substring test shared by every store and the in-memory path.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Optional genre/year restrictions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovieFilter {
    /// Matches when any genre contains this substring, ignoring case.
    pub genre: Option<String>,
    pub year: Option<i32>,
}

impl MovieFilter {
    pub fn matches(&self, movie: &MovieRecord) -> bool {
        let genre_ok = match self.genre_needle() {
            Some(genre) => movie.genres.iter().any(|g| contains_ci(g, genre)),
            None => true,
        };
        let year_ok = self.year.is_none_or(|y| movie.release_year == Some(y));
        genre_ok && year_ok
    }

    /// Genre needle with empty strings treated as absent.
    pub fn genre_needle(&self) -> Option<&str> {
        self.genre.as_deref().filter(|g| !g.is_empty())
    }
}

/// Input contract for a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    /// 1-indexed.
    pub page: u32,
    pub page_size: u32,
    pub filter: MovieFilter,
    pub sort: SortSpec,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filter: MovieFilter::default(),
            sort: SortSpec::default(),
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.filter.genre = Some(genre.into());
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.filter.year = Some(year);
        self
    }

    pub fn sort(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort = SortSpec::new(field, direction);
        self
    }

    /// Reject the query before any store or remote access.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.text.trim().is_empty() {
            return Err(CoreError::Validation("search query cannot be empty".into()));
        }
        if self.page < 1 {
            return Err(CoreError::Validation("page must be at least 1".into()));
        }
        if self.page_size < 1 {
            return Err(CoreError::Validation("size must be at least 1".into()));
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(CoreError::Validation(format!(
                "size cannot exceed {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }

    /// Zero-based offset of the first item on the requested page.
    pub fn offset(&self) -> usize {
        page_offset(self.page, self.page_size)
    }
}

pub fn page_offset(page: u32, page_size: u32) -> usize {
    (page.saturating_sub(1) as usize).saturating_mul(page_size as usize)
}

/// `ceil(total / page_size)`; zero when there is nothing to page.
pub fn total_pages(total_elements: u64, page_size: u32) -> u32 {
    if page_size == 0 {
        return 0;
    }
    total_elements.div_ceil(page_size as u64) as u32
}

/// Cut one page out of an already filtered and ordered list.
/// Out-of-range pages produce an empty slice.
pub fn paginate<T>(items: Vec<T>, page: u32, page_size: u32) -> Vec<T> {
    paginate_offset(items, page_offset(page, page_size), page_size as usize)
}

pub fn paginate_offset<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}
