//! Behaviour every [`RecordStore`] must share, run against both the
//! in-memory and the SQLite implementation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{TimeDelta, Utc};
use movieflix_core::query::{MovieFilter, SortDirection, SortField, SortSpec};
use movieflix_core::store::{RecordStore, TitleQuery};
use movieflix_core::{MemoryStore, MovieRecord, SqliteStore};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn temp_path() -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "movieflix_store_contract_{}_{}",
        std::process::id(),
        id,
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("movies.db");
    let _ = std::fs::remove_file(&path);
    path
}

fn stores() -> Vec<Box<dyn RecordStore>> {
    vec![
        Box::new(MemoryStore::new()),
        Box::new(SqliteStore::open(&temp_path()).unwrap()),
    ]
}

fn movie(external_id: i64, title: &str, year: Option<i32>, score: Option<f64>) -> MovieRecord {
    let mut m = MovieRecord::new(external_id, title);
    m.release_year = year;
    m.rating.external_score = score;
    m
}

fn query(text: &str, sort: SortSpec) -> TitleQuery {
    TitleQuery {
        text: text.into(),
        filter: MovieFilter::default(),
        sort,
        offset: 0,
        limit: 50,
    }
}

fn seed(store: &dyn RecordStore) {
    let mut a = movie(1, "Alien", Some(1979), Some(8.5));
    a.genres = vec!["Horror".into(), "Science Fiction".into()];
    let mut b = movie(2, "Aliens", Some(1986), Some(8.4));
    b.genres = vec!["Action".into(), "Science Fiction".into()];
    let mut c = movie(3, "Alien Resurrection", None, None);
    c.genres = vec!["Science Fiction".into()];
    let mut d = movie(4, "Alien Nation", Some(1988), Some(6.3));
    d.genres = vec!["Crime".into()];
    for m in [a, b, c, d] {
        store.upsert(&m).unwrap();
    }
}

#[test]
fn external_id_is_unique() {
    for store in stores() {
        let first = store.upsert(&movie(7, "Seven", Some(1995), None)).unwrap();
        let second = store.upsert(&movie(7, "Se7en", Some(1995), None)).unwrap();
        assert_eq!(first.id, second.id, "{}", store.name());
        assert_eq!(store.count().unwrap(), 1, "{}", store.name());
        assert_eq!(
            store.find_by_external_id(7).unwrap().unwrap().title,
            "Se7en",
            "{}",
            store.name()
        );
    }
}

#[test]
fn point_lookups() {
    for store in stores() {
        let saved = store.upsert(&movie(11, "Star Wars", Some(1977), None)).unwrap();
        let id = saved.id.unwrap();
        assert!(store.exists_by_external_id(11).unwrap());
        assert!(!store.exists_by_external_id(12).unwrap());
        assert_eq!(store.find_by_id(id).unwrap().unwrap().external_id, 11);
        assert!(store.find_by_id(id + 1).unwrap().is_none());
    }
}

#[test]
fn title_search_is_case_insensitive_substring() {
    for store in stores() {
        seed(store.as_ref());
        let page = store
            .title_contains(&query("ALIEN", SortSpec::default()))
            .unwrap();
        assert_eq!(page.total, 4, "{}", store.name());
        let titles: Vec<_> = page.items.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Alien", "Alien Nation", "Alien Resurrection", "Aliens"],
            "{}",
            store.name()
        );
    }
}

#[test]
fn year_sort_nulls_last_in_both_directions() {
    for store in stores() {
        seed(store.as_ref());
        for direction in [SortDirection::Asc, SortDirection::Desc] {
            let page = store
                .title_contains(&query("alien", SortSpec::new(SortField::Year, direction)))
                .unwrap();
            let last = page.items.last().unwrap();
            assert_eq!(last.external_id, 3, "{} {direction}", store.name());
        }
        let desc = store
            .title_contains(&query(
                "alien",
                SortSpec::new(SortField::Year, SortDirection::Desc),
            ))
            .unwrap();
        let years: Vec<_> = desc.items.iter().map(|m| m.release_year).collect();
        assert_eq!(years, vec![Some(1988), Some(1986), Some(1979), None]);
    }
}

#[test]
fn filters_apply_before_count_and_paging() {
    for store in stores() {
        seed(store.as_ref());
        let page = store
            .title_contains(&TitleQuery {
                text: "alien".into(),
                filter: MovieFilter {
                    genre: Some("science".into()),
                    year: None,
                },
                sort: SortSpec::new(SortField::Rating, SortDirection::Desc),
                offset: 1,
                limit: 1,
            })
            .unwrap();
        assert_eq!(page.total, 3, "{}", store.name());
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].external_id, 2, "{}", store.name());

        let by_year = store
            .title_contains(&TitleQuery {
                text: "alien".into(),
                filter: MovieFilter {
                    genre: None,
                    year: Some(1979),
                },
                sort: SortSpec::default(),
                offset: 0,
                limit: 10,
            })
            .unwrap();
        assert_eq!(by_year.total, 1);
    }
}

#[test]
fn out_of_range_offset_is_empty_with_total() {
    for store in stores() {
        seed(store.as_ref());
        let page = store
            .title_contains(&TitleQuery {
                offset: 100,
                ..query("alien", SortSpec::default())
            })
            .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total, 4, "{}", store.name());
    }
}

#[test]
fn genre_and_year_scans() {
    for store in stores() {
        seed(store.as_ref());
        let scifi = store.find_by_genre_contains("fiction").unwrap();
        assert_eq!(scifi.len(), 3, "{}", store.name());
        assert_eq!(scifi[0].title, "Alien");
        assert_eq!(store.find_by_year(1986).unwrap().len(), 1);
        assert!(store.find_by_genre_contains("western").unwrap().is_empty());
    }
}

#[test]
fn expiry_queries_use_strict_cutoff() {
    for store in stores() {
        let now = Utc::now();
        let mut old = movie(1, "Old", None, None);
        old.expires_at = now - TimeDelta::seconds(1);
        let mut fresh = movie(2, "Fresh", None, None);
        fresh.expires_at = now + TimeDelta::hours(1);
        store.upsert(&old).unwrap();
        store.upsert(&fresh).unwrap();

        let expired = store.find_expired_before(now).unwrap();
        assert_eq!(expired.len(), 1, "{}", store.name());
        assert_eq!(expired[0].external_id, 1);

        assert_eq!(store.delete_expired_before(now).unwrap(), 1);
        assert_eq!(store.delete_expired_before(now).unwrap(), 0);
        assert!(store.exists_by_external_id(2).unwrap());
    }
}

#[test]
fn delete_by_id_and_delete_all() {
    for store in stores() {
        seed(store.as_ref());
        let alien = store.find_by_external_id(1).unwrap().unwrap();
        assert!(store.delete_by_id(alien.id.unwrap()).unwrap());
        assert!(!store.delete_by_id(alien.id.unwrap()).unwrap());
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.delete_all().unwrap(), 3);
        assert_eq!(store.count().unwrap(), 0);
    }
}
