use std::io::Write;

use movieflix_core::{CacheStats, MovieView, SearchResult};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn source_tag(view: &MovieView) -> &'static str {
    if view.from_cache { "cache" } else { "tmdb" }
}

fn year_label(view: &MovieView) -> String {
    view.movie
        .release_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "----".into())
}

fn score_label(view: &MovieView) -> String {
    view.movie
        .rating
        .external_score
        .map(|s| format!("{s:.1}"))
        .unwrap_or_else(|| " -".into())
}

/// One line per movie: tmdb id, year, score, title, source.
pub fn print_movie_line(
    w: &mut dyn Write,
    view: &MovieView,
    color: ColorMode,
) -> std::io::Result<()> {
    let id = format!("{:>8}", view.movie.external_id);
    let tag = format!("[{}]", source_tag(view));
    if color.enabled() {
        writeln!(
            w,
            "{}  {}  {:>4}  {}  {}",
            id.dimmed(),
            year_label(view),
            score_label(view).yellow(),
            view.movie.title.bold(),
            tag.dimmed()
        )
    } else {
        writeln!(
            w,
            "{}  {}  {:>4}  {}  {}",
            id,
            year_label(view),
            score_label(view),
            view.movie.title,
            tag
        )
    }
}

pub fn print_movie_list(
    w: &mut dyn Write,
    views: &[MovieView],
    color: ColorMode,
) -> std::io::Result<()> {
    if views.is_empty() {
        writeln!(w, "No movies found")?;
        return Ok(());
    }
    for view in views {
        print_movie_line(w, view, color)?;
    }
    Ok(())
}

/// A search page followed by its pagination footer.
pub fn print_search_result(
    w: &mut dyn Write,
    result: &SearchResult,
    color: ColorMode,
) -> std::io::Result<()> {
    print_movie_list(w, &result.movies, color)?;
    let footer = format!(
        "Page {} of {} ({} movies)",
        result.current_page, result.total_pages, result.total_elements
    );
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", footer.dimmed())
    } else {
        writeln!(w, "{}", footer)
    }
}

fn field(w: &mut dyn Write, label: &str, value: &str, color: ColorMode) -> std::io::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    if color.enabled() {
        writeln!(w, "  {:<10} {}", label.cyan(), value)
    } else {
        writeln!(w, "  {:<10} {}", label, value)
    }
}

/// Full details of a single movie.
pub fn print_movie_details(
    w: &mut dyn Write,
    view: &MovieView,
    color: ColorMode,
) -> std::io::Result<()> {
    let m = &view.movie;
    let heading = format!("{} ({})", m.title, year_label(view));
    if color.enabled() {
        writeln!(w, "{}", heading.bold())?;
    } else {
        writeln!(w, "{}", heading)?;
    }

    let opt = |v: Option<String>| v.unwrap_or_default();
    field(w, "TMDB id", &m.external_id.to_string(), color)?;
    field(w, "IMDb id", &opt(m.imdb_id.clone()), color)?;
    field(w, "Runtime", &opt(m.runtime_minutes.map(|r| format!("{r} min"))), color)?;
    field(w, "Genres", &m.genres.join(", "), color)?;
    field(w, "Director", &m.directors.join(", "), color)?;
    field(w, "Cast", &m.actors.join(", "), color)?;
    field(
        w,
        "Rating",
        &opt(m.rating.external_score.map(|s| match m.rating.external_votes {
            Some(votes) => format!("{s:.1} ({votes} votes)"),
            None => format!("{s:.1}"),
        })),
        color,
    )?;
    field(w, "Released", &opt(m.release_date.map(|d| d.to_string())), color)?;
    field(w, "Status", &opt(m.status.clone()), color)?;
    field(w, "Language", &opt(m.language.clone()), color)?;
    field(w, "Poster", &opt(m.poster_url.clone()), color)?;
    field(w, "Source", source_tag(view), color)?;
    if let Some(plot) = &m.plot {
        writeln!(w)?;
        writeln!(w, "{}", plot)?;
    }
    Ok(())
}

pub fn print_stats(w: &mut dyn Write, stats: &CacheStats, color: ColorMode) -> std::io::Result<()> {
    let rows = [
        ("Store", stats.store.clone()),
        ("Entries", stats.entries.to_string()),
        ("TTL", format!("{}h", stats.ttl.num_hours())),
    ];
    for (label, value) in rows {
        field(w, label, &value, color)?;
    }
    Ok(())
}
