// Page handlers for HTML rendering with Askama

use std::net::SocketAddr;

use askama::Template;
use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::api_server::{bracket_svg, voter_fingerprint, AppState};
use crate::bracket::{Bracket, Matchup};
use crate::error::{Result, SaintfestError};
use crate::model::{render_markdown, Post, Saint};
use crate::store::Store;

const RECENT_POSTS: usize = 5;
const EXCERPT_CHARS: usize = 240;

fn render<T: Template>(template: &T) -> Html<String> {
    Html(template.render().unwrap_or_else(|e| {
        format!("Template error: {}", e)
    }))
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%B %-d, %H:%M UTC").to_string()
}

// ============================================================================
// Messages and errors
// ============================================================================

#[derive(Template)]
#[template(path = "pages/message.html")]
pub struct MessageTemplate {
    pub title: String,
    pub message: String,
}

fn message_page(status: StatusCode, title: &str, message: String) -> Response {
    let template = MessageTemplate {
        title: title.to_string(),
        message,
    };
    (status, render(&template)).into_response()
}

fn error_page(err: SaintfestError) -> Response {
    let (status, title) = match err {
        SaintfestError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
        SaintfestError::Invalid(_) => (StatusCode::BAD_REQUEST, "Bad request"),
        _ => {
            tracing::error!("Page error: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
        }
    };
    message_page(status, title, err.to_string())
}

fn page<T: Template>(result: Result<T>) -> Response {
    match result {
        Ok(template) => render(&template).into_response(),
        Err(e) => error_page(e),
    }
}

/// Build a page on the blocking thread pool.
async fn render_blocking<T, F>(state: &AppState, build: F) -> Response
where
    T: Template + Send + 'static,
    F: FnOnce(&Store) -> Result<T> + Send + 'static,
{
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || build(&store)).await {
        Ok(result) => page(result),
        Err(e) => {
            tracing::error!("Page task failed: {}", e);
            message_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "The page could not be built.".to_string(),
            )
        }
    }
}

// ============================================================================
// Home Page
// ============================================================================

pub struct Contender {
    pub name: String,
    pub slug: String,
    pub saint_id: i64,
    pub votes: u64,
    pub percent: String,
}

pub struct MatchupCard {
    pub id: i64,
    pub round_name: String,
    pub region: String,
    pub closes_at: String,
    pub total_votes: u64,
    pub a: Contender,
    pub b: Contender,
}

pub struct PostTeaser {
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub date: String,
}

impl From<&Post> for PostTeaser {
    fn from(post: &Post) -> Self {
        Self {
            slug: post.slug.clone(),
            title: post.title.clone(),
            excerpt: post.excerpt(EXCERPT_CHARS),
            date: post.created_at.format("%B %-d, %Y").to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub title: String,
    pub notice: String,
    pub matchups: Vec<MatchupCard>,
    pub posts: Vec<PostTeaser>,
    pub has_bracket: bool,
    pub bracket_year: i32,
}

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    vote: Option<String>,
}

pub async fn home_page(State(state): State<AppState>, Query(params): Query<HomeQuery>) -> Response {
    render_blocking(&state, move |store| build_home(store, params.vote.as_deref())).await
}

fn build_home(store: &Store, vote: Option<&str>) -> Result<HomeTemplate> {
    let now = Utc::now();
    let mut brackets: FxHashMap<i32, Bracket> = FxHashMap::default();
    let mut matchups = Vec::new();

    for (year, matchup) in store.open_matchups(now)? {
        if !brackets.contains_key(&year) {
            if let Some(bracket) = store.get_bracket(year)? {
                brackets.insert(year, bracket);
            }
        }
        let round_name = brackets
            .get(&year)
            .and_then(|b| b.rounds.get(matchup.round))
            .map(|r| r.name.clone())
            .unwrap_or_default();
        matchups.push(matchup_card(store, &matchup, round_name)?);
    }

    let posts = store
        .list_posts(false)?
        .iter()
        .take(RECENT_POSTS)
        .map(PostTeaser::from)
        .collect();

    let latest = store.latest_bracket()?;
    let notice = match vote {
        Some("recorded") => "Your vote has been counted. Thank you!",
        Some("already") => "A vote from this device was already counted for that matchup.",
        Some("closed") => "Voting for that matchup is closed.",
        Some(_) => "That vote could not be recorded.",
        None => "",
    };

    Ok(HomeTemplate {
        title: "Saintfest".to_string(),
        notice: notice.to_string(),
        matchups,
        posts,
        has_bracket: latest.is_some(),
        bracket_year: latest.map(|b| b.year).unwrap_or_default(),
    })
}

fn matchup_card(store: &Store, matchup: &Matchup, round_name: String) -> Result<MatchupCard> {
    let (a, b) = matchup
        .entrants()
        .ok_or_else(|| SaintfestError::Invalid(format!("matchup {} has no opponents yet", matchup.id)))?;
    let saints = store.saints_by_ids(&[a, b])?;
    let tally = store.tally(matchup)?;
    let (percent_a, percent_b) = tally.percentages();

    let contender = |saint: &Saint, votes: u64, percent: f64| Contender {
        name: saint.name.clone(),
        slug: saint.slug.clone(),
        saint_id: saint.id,
        votes,
        percent: format!("{:.0}%", percent),
    };

    Ok(MatchupCard {
        id: matchup.id,
        round_name,
        region: matchup.region.clone().unwrap_or_default(),
        closes_at: matchup.closes_at.map(format_time).unwrap_or_default(),
        total_votes: tally.total(),
        a: contender(&saints[0], tally.votes_a, percent_a),
        b: contender(&saints[1], tally.votes_b, percent_b),
    })
}

#[derive(Debug, Deserialize)]
pub struct VoteForm {
    saint_id: i64,
}

/// Form fallback for browsers without JavaScript.
pub async fn vote_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<VoteForm>,
) -> Redirect {
    let voter = voter_fingerprint(&state.config, connect_info.map(|c| c.0), &headers);
    let store = state.store.clone();
    let cast = tokio::task::spawn_blocking(move || store.cast_vote(id, form.saint_id, &voter, Utc::now())).await;
    let outcome = match cast {
        Ok(Ok(_)) => "recorded",
        Ok(Err(SaintfestError::AlreadyVoted(_))) => "already",
        Ok(Err(SaintfestError::VotingClosed(_))) => "closed",
        Ok(Err(e)) => {
            tracing::debug!("Rejected form vote for matchup {}: {}", id, e);
            "rejected"
        }
        Err(e) => {
            tracing::error!("Vote task failed: {}", e);
            "rejected"
        }
    };
    Redirect::to(&format!("/?vote={}", outcome))
}

// ============================================================================
// Saint Page
// ============================================================================

pub struct Fact {
    pub label: String,
    pub value: String,
}

pub struct HistoryRow {
    pub year: i32,
    pub round_name: String,
    pub opponent: String,
    pub outcome: String,
}

#[derive(Template)]
#[template(path = "pages/saint.html")]
pub struct SaintTemplate {
    pub title: String,
    pub image_url: String,
    pub facts: Vec<Fact>,
    pub categories: Vec<String>,
    pub biography_html: String,
    pub history: Vec<HistoryRow>,
}

pub async fn saint_page(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    render_blocking(&state, move |store| build_saint(store, &slug)).await
}

fn build_saint(store: &Store, slug: &str) -> Result<SaintTemplate> {
    let saint = store
        .get_saint_by_slug(slug)?
        .ok_or_else(|| SaintfestError::not_found("saint", slug))?;

    let facts = [
        ("Feast day", &saint.feast_day),
        ("Patron of", &saint.patronage),
        ("Born", &saint.born),
        ("Died", &saint.died),
        ("Canonized", &saint.canonized),
    ]
    .into_iter()
    .filter_map(|(label, value)| {
        value.as_ref().map(|v| Fact {
            label: label.to_string(),
            value: v.clone(),
        })
    })
    .collect();

    let matchups = store.saint_matchups(saint.id)?;
    let opponents: Vec<i64> = matchups
        .iter()
        .filter_map(|(_, m)| if m.saint_a == Some(saint.id) { m.saint_b } else { m.saint_a })
        .collect();
    let names = store.saint_names(&opponents)?;

    let mut history = Vec::with_capacity(matchups.len());
    let mut brackets: FxHashMap<i32, Bracket> = FxHashMap::default();
    for (year, m) in &matchups {
        if !brackets.contains_key(year) {
            if let Some(bracket) = store.get_bracket(*year)? {
                brackets.insert(*year, bracket);
            }
        }
        let opponent_id = if m.saint_a == Some(saint.id) { m.saint_b } else { m.saint_a };
        let outcome = match m.winner {
            Some(w) if w == saint.id => "Won",
            Some(_) => "Lost",
            None => "Pending",
        };
        history.push(HistoryRow {
            year: *year,
            round_name: brackets
                .get(year)
                .and_then(|b| b.rounds.get(m.round))
                .map(|r| r.name.clone())
                .unwrap_or_default(),
            opponent: opponent_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_else(|| "To be decided".to_string()),
            outcome: outcome.to_string(),
        });
    }

    Ok(SaintTemplate {
        title: saint.name.clone(),
        image_url: saint.image_url.clone().unwrap_or_default(),
        facts,
        categories: saint.categories.iter().map(|c| c.label().to_string()).collect(),
        biography_html: saint.biography.as_deref().map(render_markdown).unwrap_or_default(),
        history,
    })
}

// ============================================================================
// Bracket Page
// ============================================================================

pub struct YearLink {
    pub year: i32,
    pub current: bool,
}

#[derive(Template)]
#[template(path = "pages/bracket.html")]
pub struct BracketTemplate {
    pub title: String,
    pub year: i32,
    pub svg: String,
    pub status: String,
    pub champion: String,
    pub years: Vec<YearLink>,
}

pub async fn bracket_page(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    render_blocking(&state, move |store| build_bracket(store, year)).await
}

pub async fn current_bracket_page(State(state): State<AppState>) -> Response {
    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.latest_bracket()).await {
        Ok(Ok(Some(bracket))) => Redirect::to(&format!("/bracket/{}", bracket.year)).into_response(),
        Ok(Ok(None)) => error_page(SaintfestError::NotFound("No bracket has been drawn yet".to_string())),
        Ok(Err(e)) => error_page(e),
        Err(e) => {
            tracing::error!("Page task failed: {}", e);
            message_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "The bracket could not be loaded.".to_string(),
            )
        }
    }
}

fn build_bracket(store: &Store, year: i32) -> Result<BracketTemplate> {
    let bracket = store
        .get_bracket(year)?
        .ok_or_else(|| SaintfestError::not_found("bracket", year))?;

    let svg = bracket_svg(store, &bracket, None).map_err(|_| {
        SaintfestError::Invalid(format!("bracket {} cannot be drawn", year))
    })?;

    let progress = bracket.progress();
    let status = match &progress.current_round_name {
        Some(name) => format!("{} of {} matchups decided. Now playing: {}", progress.decided, progress.total, name),
        None => "The tournament is complete.".to_string(),
    };
    let champion = match progress.blessed_intercessor {
        Some(id) => store.saint_names(&[id])?.remove(&id).unwrap_or_default(),
        None => String::new(),
    };

    let years = store
        .list_brackets()?
        .into_iter()
        .map(|b| YearLink {
            year: b.year,
            current: b.year == year,
        })
        .collect();

    Ok(BracketTemplate {
        title: bracket.title.clone(),
        year,
        svg,
        status,
        champion,
        years,
    })
}

// ============================================================================
// Post Page
// ============================================================================

#[derive(Template)]
#[template(path = "pages/post.html")]
pub struct PostTemplate {
    pub title: String,
    pub date: String,
    pub html: String,
    pub matchup_link: String,
}

pub async fn post_page(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    render_blocking(&state, move |store| build_post(store, &slug)).await
}

fn build_post(store: &Store, slug: &str) -> Result<PostTemplate> {
    let post = store
        .get_post_by_slug(slug)?
        .filter(|p| p.published)
        .ok_or_else(|| SaintfestError::not_found("post", slug))?;

    let matchup_link = match post.matchup_id {
        Some(id) => match store.get_matchup(id)? {
            Some((year, _)) => format!("/bracket/{}", year),
            None => String::new(),
        },
        None => String::new(),
    };

    Ok(PostTemplate {
        title: post.title.clone(),
        date: post.created_at.format("%B %-d, %Y").to_string(),
        html: post.render_html(),
        matchup_link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewSaint;

    #[test]
    fn test_home_renders_without_data() {
        let store = Store::open_in_memory().unwrap();
        let home = build_home(&store, Some("recorded")).unwrap();
        assert!(home.matchups.is_empty());
        assert!(!home.has_bracket);
        let html = home.render().unwrap();
        assert!(html.contains("Your vote has been counted"));
    }

    #[test]
    fn test_saint_page_escapes_and_renders_markdown() {
        let store = Store::open_in_memory().unwrap();
        let mut saint = NewSaint::named("Thomas More");
        saint.biography = Some("Lord Chancellor of *England*.".to_string());
        saint.patronage = Some("Lawyers & statesmen".to_string());
        store.create_saint(&saint).unwrap();

        let html = build_saint(&store, "thomas-more").unwrap().render().unwrap();
        assert!(html.contains("<em>England</em>"));
        assert!(html.contains("Lawyers &amp; statesmen"));
        assert!(matches!(build_saint(&store, "nobody"), Err(SaintfestError::NotFound(_))));
    }

    #[test]
    fn test_imported_biography_cannot_inject_script() {
        let store = Store::open_in_memory().unwrap();
        let mut saint = NewSaint::named("Expeditus");
        saint.biography = Some("Patron of <script>alert('urgent')</script> causes.".to_string());
        store.create_saint(&saint).unwrap();

        let html = build_saint(&store, "expeditus").unwrap().render().unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_unpublished_post_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        store
            .create_post(&crate::model::PostDraft {
                title: "Secret".to_string(),
                body: "draft".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(build_post(&store, "secret"), Err(SaintfestError::NotFound(_))));
    }
}
