use movieflix_core::{
    CacheStats, CoreError, MovieView, Rating, SearchQuery, SearchResult, SortDirection, SortField,
};
use serde::{Deserialize, Serialize};

/// Rating block as exposed over HTTP.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingJson {
    pub imdb: Option<f64>,
    pub tmdb: Option<f64>,
    pub tmdb_vote_count: Option<i64>,
}

impl From<&Rating> for RatingJson {
    fn from(r: &Rating) -> Self {
        Self {
            imdb: r.secondary,
            tmdb: r.external_score,
            tmdb_vote_count: r.external_votes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieJson {
    pub id: Option<String>,
    pub tmdb_id: i64,
    pub imdb_id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub runtime: Option<i32>,
    pub genre: Vec<String>,
    pub director: Vec<String>,
    pub actors: Vec<String>,
    pub plot: Option<String>,
    pub rating: RatingJson,
    pub poster: Option<String>,
    pub backdrop: Option<String>,
    pub release_date: Option<String>,
    pub budget: Option<i64>,
    pub revenue: Option<i64>,
    pub language: Option<String>,
    pub status: Option<String>,
    pub from_cache: bool,
}

impl From<&MovieView> for MovieJson {
    fn from(view: &MovieView) -> Self {
        let m = &view.movie;
        Self {
            id: m.id.map(|id| id.to_string()),
            tmdb_id: m.external_id,
            imdb_id: m.imdb_id.clone(),
            title: m.title.clone(),
            year: m.release_year,
            runtime: m.runtime_minutes,
            genre: m.genres.clone(),
            director: m.directors.clone(),
            actors: m.actors.clone(),
            plot: m.plot.clone(),
            rating: RatingJson::from(&m.rating),
            poster: m.poster_url.clone(),
            backdrop: m.backdrop_url.clone(),
            release_date: m.release_date.map(|d| d.to_string()),
            budget: m.budget,
            revenue: m.revenue,
            language: m.language.clone(),
            status: m.status.clone(),
            from_cache: view.from_cache,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedMoviesJson {
    pub movies: Vec<MovieJson>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_elements: u64,
    pub size: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl From<&SearchResult> for PagedMoviesJson {
    fn from(r: &SearchResult) -> Self {
        Self {
            movies: r.movies.iter().map(MovieJson::from).collect(),
            current_page: r.current_page,
            total_pages: r.total_pages,
            total_elements: r.total_elements,
            size: r.page_size,
            has_next: r.has_next,
            has_previous: r.has_previous,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsJson {
    pub total_cached_movies: u64,
    pub store: String,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub ttl_hours: i64,
}

impl From<&CacheStats> for CacheStatsJson {
    fn from(s: &CacheStats) -> Self {
        Self {
            total_cached_movies: s.entries,
            store: s.store.clone(),
            hits: s.hits,
            misses: s.misses,
            hit_rate: s.hit_rate(),
            ttl_hours: s.ttl.num_hours(),
        }
    }
}

/// Query string of `GET /api/movies`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
}

/// JSON body of `POST /api/movies/search`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<String>,
}

impl TryFrom<SearchParams> for SearchQuery {
    type Error = CoreError;

    fn try_from(p: SearchParams) -> Result<Self, Self::Error> {
        build_query(
            p.search,
            p.page,
            p.size,
            p.genre,
            p.year,
            p.sort_by.as_deref(),
            p.sort_direction.as_deref(),
        )
    }
}

impl TryFrom<SearchRequest> for SearchQuery {
    type Error = CoreError;

    fn try_from(r: SearchRequest) -> Result<Self, Self::Error> {
        build_query(
            r.query,
            r.page,
            r.size,
            r.genre,
            r.year,
            r.sort_by.as_deref(),
            r.sort_direction.as_deref(),
        )
    }
}

fn build_query(
    text: Option<String>,
    page: Option<u32>,
    size: Option<u32>,
    genre: Option<String>,
    year: Option<i32>,
    sort_by: Option<&str>,
    sort_direction: Option<&str>,
) -> Result<SearchQuery, CoreError> {
    let field = match sort_by.filter(|s| !s.is_empty()) {
        Some(s) => s.parse::<SortField>()?,
        None => SortField::default(),
    };
    let direction = match sort_direction.filter(|s| !s.is_empty()) {
        Some(s) => s.parse::<SortDirection>()?,
        None => SortDirection::default(),
    };

    let mut query = SearchQuery::new(text.unwrap_or_default()).sort(field, direction);
    if let Some(page) = page {
        query = query.page(page);
    }
    if let Some(size) = size {
        query = query.page_size(size);
    }
    if let Some(genre) = genre.filter(|g| !g.trim().is_empty()) {
        query = query.genre(genre);
    }
    if let Some(year) = year {
        query = query.year(year);
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use movieflix_core::MovieRecord;

    #[test]
    fn params_default_to_first_page_by_title() {
        let q = SearchQuery::try_from(SearchParams {
            search: Some("alien".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(q.page, 1);
        assert_eq!(q.page_size, 20);
        assert_eq!(q.sort.field, SortField::Title);
        assert_eq!(q.sort.direction, SortDirection::Asc);
        assert!(q.filter.genre.is_none());
    }

    #[test]
    fn blank_genre_is_no_filter() {
        let q = SearchQuery::try_from(SearchRequest {
            query: Some("alien".into()),
            genre: Some("  ".into()),
            year: Some(1979),
            ..Default::default()
        })
        .unwrap();
        assert!(q.filter.genre.is_none());
        assert_eq!(q.filter.year, Some(1979));
    }

    #[test]
    fn unknown_sort_field_is_rejected() {
        let err = SearchQuery::try_from(SearchParams {
            search: Some("alien".into()),
            sort_by: Some("popularity".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn movie_json_uses_wire_names() {
        let mut m = MovieRecord::new(603, "The Matrix");
        m.id = Some(7);
        m.rating.external_score = Some(8.2);
        let json = serde_json::to_value(MovieJson::from(&MovieView::cached(m))).unwrap();
        assert_eq!(json["id"], "7");
        assert_eq!(json["tmdbId"], 603);
        assert_eq!(json["rating"]["tmdb"], 8.2);
        assert_eq!(json["fromCache"], true);
    }
}
