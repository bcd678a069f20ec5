// Axum API server
//
// Public JSON endpoints for saints, brackets, matchups, votes and posts, the
// bearer-token admin surface, and the server-rendered pages.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use moka::future::Cache;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::auth::{require_admin, AdminAuth};
use crate::bracket::{
    compute_layout, generate_bracket_structure, render_svg, schedule_round, schedule_tournament,
    Bracket, BracketPlan, LayoutOptions, Matchup,
};
use crate::config::Config;
use crate::error::SaintfestError;
use crate::import::{import_saints, ImportFormat};
use crate::model::{NewSaint, PostDraft, SaintCategory};
use crate::store::Store;
use crate::voting::fingerprint;
use crate::web::handlers::pages;

// ============================================================================
// Application State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Arc<Config>,
    pub auth: AdminAuth,
    /// Public read responses, flushed on every admin write.
    pub cache: Cache<String, serde_json::Value>,
    /// Bumped by every admin write.
    generation: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        tracing::info!("Opening store...");
        let store = Store::open(&config.database_path)?;
        tracing::info!("Store ready ({} saints)", store.saint_count()?);
        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: Store, config: Config) -> Self {
        tracing::info!("Initializing Moka cache...");
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(config.cache_ttl.max(Duration::from_secs(1)))
            .build();

        Self {
            store: Arc::new(store),
            auth: AdminAuth::from_config(&config),
            config: Arc::new(config),
            cache,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run store work on the blocking thread pool.
    pub(crate) async fn blocking<F, T>(&self, work: F) -> Result<T, AppError>
    where
        F: FnOnce(&Store) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || work(&store))
            .await
            .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
    }

    /// Serve `key` from the cache, computing and storing it on a miss.
    ///
    /// A value computed while an admin write landed is returned but not kept.
    async fn cached<F>(&self, key: String, compute: F) -> Result<serde_json::Value, AppError>
    where
        F: FnOnce(&Store) -> Result<serde_json::Value, AppError> + Send + 'static,
    {
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!("Cache hit for {}", key);
            return Ok(hit);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let value = self.blocking(compute).await?;
        self.cache.insert(key.clone(), value.clone()).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            self.cache.invalidate(&key).await;
        }
        Ok(value)
    }

    fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate_all();
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/api/admin/logout", post(admin_logout))
        .route("/api/admin/saints", post(create_saint))
        .route("/api/admin/saints/import", post(import_saints_upload))
        .route("/api/admin/saints/:id", put(update_saint).delete(delete_saint))
        .route("/api/admin/brackets", post(create_bracket))
        .route("/api/admin/brackets/:year", axum::routing::delete(delete_bracket))
        .route("/api/admin/brackets/:year/schedule", post(schedule_bracket))
        .route("/api/admin/matchups/:id/close", post(close_matchup))
        .route("/api/admin/posts", get(list_all_posts).post(create_post))
        .route("/api/admin/posts/:id", put(update_post).delete(delete_post))
        .route_layer(middleware::from_fn_with_state(state.auth.clone(), require_admin));

    Router::new()
        // Health check
        .route("/health", get(health_check))

        // Saints
        .route("/api/saints", get(list_saints))
        .route("/api/saints/:id", get(get_saint))

        // Brackets
        // static segments win over :year
        .route("/api/brackets", get(list_brackets))
        .route("/api/brackets/current", get(current_bracket))
        .route("/api/brackets/:year", get(get_bracket))
        .route("/api/brackets/:year/progress", get(bracket_progress))
        .route("/api/brackets/:year/layout", get(bracket_layout))
        .route("/api/brackets/:year/export.svg", get(export_svg))

        // Matchups and voting
        .route("/api/matchups/open", get(open_matchups))
        .route("/api/matchups/:id", get(get_matchup))
        .route("/api/matchups/:id/vote", post(cast_vote))

        // Posts
        .route("/api/posts", get(list_posts))
        .route("/api/posts/:slug", get(get_post))

        // Admin
        .route("/api/admin/login", post(admin_login))
        .merge(admin)

        // HTML pages
        .route("/", get(pages::home_page))
        .route("/saints/:slug", get(pages::saint_page))
        .route("/bracket", get(pages::current_bracket_page))
        .route("/bracket/:year", get(pages::bracket_page))
        .route("/posts/:slug", get(pages::post_page))
        .route("/vote/:id", post(pages::vote_form))

        // Middleware (applied in reverse order)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Public Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let (schema_version, saints) = state
        .blocking(|store| Ok((store.schema_version()?, store.saint_count()?)))
        .await?;
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "schema_version": schema_version,
        "saints": saints,
        "timestamp": Utc::now().to_rfc3339()
    })))
}

#[derive(Debug, Deserialize)]
struct SaintQuery {
    category: Option<String>,
    q: Option<String>,
}

async fn list_saints(
    State(state): State<AppState>,
    Query(params): Query<SaintQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let category = params
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(str::parse::<SaintCategory>)
        .transpose()?;

    let key = format!("saints:{:?}:{:?}", category, params.q);
    let query = params.q;
    let result = state
        .cached(key, move |store| {
            let saints = store.list_saints(category, query.as_deref())?;
            Ok(serde_json::json!({
                "rows": saints.len(),
                "data": saints,
            }))
        })
        .await?;
    Ok(Json(result))
}

async fn get_saint(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, AppError> {
    let result = state
        .cached(format!("saint:{}", id), move |store| {
            let saint = store
                .get_saint(id)?
                .ok_or_else(|| SaintfestError::not_found("saint", id))?;
            let matchups: Vec<serde_json::Value> = store
                .saint_matchups(id)?
                .into_iter()
                .map(|(year, m)| serde_json::json!({ "year": year, "matchup": m }))
                .collect();
            Ok(serde_json::json!({
                "saint": saint,
                "matchups": matchups,
            }))
        })
        .await?;
    Ok(Json(result))
}

async fn list_brackets(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = state
        .cached("brackets".to_string(), |store| {
            Ok(serde_json::to_value(store.list_brackets()?).map_err(SaintfestError::from)?)
        })
        .await?;
    Ok(Json(result))
}

async fn current_bracket(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = state
        .cached("bracket:current".to_string(), |store| {
            let bracket = store
                .latest_bracket()?
                .ok_or_else(|| AppError::NotFound("No bracket has been drawn yet".to_string()))?;
            bracket_json(store, &bracket)
        })
        .await?;
    Ok(Json(result))
}

async fn get_bracket(State(state): State<AppState>, Path(year): Path<i32>) -> Result<Json<serde_json::Value>, AppError> {
    let result = state
        .cached(format!("bracket:{}", year), move |store| {
            let bracket = load_bracket(store, year)?;
            bracket_json(store, &bracket)
        })
        .await?;
    Ok(Json(result))
}

async fn bracket_progress(
    State(state): State<AppState>,
    Path(year): Path<i32>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = state
        .blocking(move |store| {
            let progress = load_bracket(store, year)?.progress();
            let mut ids = progress.remaining.clone();
            ids.extend(progress.blessed_intercessor);
            let names = store.saint_names(&ids)?;
            Ok(serde_json::json!({
                "progress": progress,
                "saints": names,
            }))
        })
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct LayoutQuery {
    width: Option<f64>,
}

async fn bracket_layout(
    State(state): State<AppState>,
    Path(year): Path<i32>,
    Query(params): Query<LayoutQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let bracket = state.blocking(move |store| load_bracket(store, year)).await?;
    let options = layout_options(bracket.size, params.width)?;
    let layout = compute_layout(bracket.size, &options)?;
    Ok(Json(serde_json::to_value(layout).map_err(SaintfestError::from)?))
}

async fn export_svg(
    State(state): State<AppState>,
    Path(year): Path<i32>,
    Query(params): Query<LayoutQuery>,
) -> Result<Response, AppError> {
    let svg = state
        .blocking(move |store| {
            let bracket = load_bracket(store, year)?;
            bracket_svg(store, &bracket, params.width)
        })
        .await?;
    let disposition = format!("inline; filename=\"saintfest-{}.svg\"", year);
    Ok((
        [
            (header::CONTENT_TYPE, "image/svg+xml".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        svg,
    )
        .into_response())
}

async fn open_matchups(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let data = state
        .blocking(|store| {
            store
                .open_matchups(Utc::now())?
                .into_iter()
                .map(|(year, m)| matchup_json(store, year, &m))
                .collect::<Result<Vec<_>, _>>()
        })
        .await?;
    Ok(Json(serde_json::json!({
        "rows": data.len(),
        "data": data,
    })))
}

async fn get_matchup(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<serde_json::Value>, AppError> {
    let result = state
        .blocking(move |store| {
            let (year, matchup) = load_matchup(store, id)?;
            matchup_json(store, year, &matchup)
        })
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct VoteRequest {
    saint_id: i64,
}

async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(payload): Json<VoteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let voter = voter_fingerprint(&state.config, connect_info.map(|c| c.0), &headers);
    let tally = state
        .blocking(move |store| Ok(store.cast_vote(id, payload.saint_id, &voter, Utc::now())?))
        .await?;
    let (percent_a, percent_b) = tally.percentages();
    Ok(Json(serde_json::json!({
        "recorded": true,
        "tally": tally,
        "percentages": [percent_a, percent_b],
    })))
}

async fn list_posts(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let result = state
        .cached("posts".to_string(), |store| {
            let posts = store.list_posts(false)?;
            Ok(serde_json::json!({
                "rows": posts.len(),
                "data": posts,
            }))
        })
        .await?;
    Ok(Json(result))
}

async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = state
        .cached(format!("post:{}", slug), move |store| {
            let post = store
                .get_post_by_slug(&slug)?
                .filter(|p| p.published)
                .ok_or_else(|| SaintfestError::not_found("post", &slug))?;
            Ok(serde_json::json!({
                "html": post.render_html(),
                "post": post,
            }))
        })
        .await?;
    Ok(Json(result))
}

// ============================================================================
// Admin Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn admin_login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.auth.enabled() {
        return Err(AppError::Unauthorized("Admin login is disabled".to_string()));
    }
    let token = state
        .auth
        .login(&payload.username, &payload.password)
        .await
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;
    Ok(Json(serde_json::json!({
        "token": token,
        "expires_in_seconds": state.auth.ttl().as_secs(),
    })))
}

async fn admin_logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if let Some(token) = token {
        state.auth.logout(token.trim()).await;
    }
    StatusCode::NO_CONTENT
}

async fn create_saint(
    State(state): State<AppState>,
    Json(payload): Json<NewSaint>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let saint = state.blocking(move |store| Ok(store.create_saint(&payload)?)).await?;
    state.invalidate();
    tracing::info!("Admin created saint {} ({})", saint.id, saint.name);
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(saint).map_err(SaintfestError::from)?),
    ))
}

async fn update_saint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<NewSaint>,
) -> Result<Json<serde_json::Value>, AppError> {
    let saint = state.blocking(move |store| Ok(store.update_saint(id, &payload)?)).await?;
    state.invalidate();
    Ok(Json(serde_json::to_value(saint).map_err(SaintfestError::from)?))
}

async fn delete_saint(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, AppError> {
    state.blocking(move |store| Ok(store.delete_saint(id)?)).await?;
    state.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ImportQuery {
    format: Option<String>,
}

async fn import_saints_upload(
    State(state): State<AppState>,
    Query(params): Query<ImportQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let format = match params.format.as_deref() {
        Some(f) => f.parse::<ImportFormat>()?,
        None => headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(ImportFormat::from_content_type)
            .ok_or_else(|| {
                AppError::BadRequest("Specify ?format=csv|excel or a spreadsheet Content-Type".to_string())
            })?,
    };
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty upload".to_string()));
    }

    // Parsing and upserting can take a while
    let report = state
        .blocking(move |store| Ok(import_saints(store, format, &body)?))
        .await?;

    state.invalidate();
    Ok(Json(serde_json::to_value(report).map_err(SaintfestError::from)?))
}

#[derive(Debug, Deserialize)]
struct CreateBracketRequest {
    year: i32,
    title: Option<String>,
    size: Option<usize>,
    #[serde(default)]
    categories: Vec<SaintCategory>,
    /// Draw only from these saints instead of the whole catalogue.
    saint_ids: Option<Vec<i64>>,
    #[serde(default)]
    replace: bool,
}

async fn create_bracket(
    State(state): State<AppState>,
    Json(payload): Json<CreateBracketRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let created = state
        .blocking(move |store| {
            let bracket = draw_bracket(store, &payload)?;
            let saved = store.insert_bracket(&bracket, payload.replace)?;
            bracket_json(store, &saved)
        })
        .await?;
    state.invalidate();
    Ok((StatusCode::CREATED, Json(created)))
}

fn draw_bracket(store: &Store, request: &CreateBracketRequest) -> Result<Bracket, AppError> {
    let candidates = match &request.saint_ids {
        Some(ids) => store.saints_by_ids(ids)?,
        None => store.list_saints(None, None)?,
    };

    let mut plan = BracketPlan::new(request.year).with_categories(request.categories.clone());
    if let Some(size) = request.size {
        plan = plan.with_size(size);
    }
    if let Some(title) = request.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        plan.title = title.to_string();
    }

    tracing::info!(
        "Drawing {} bracket of {} from {} candidates",
        plan.year,
        plan.size,
        candidates.len()
    );
    Ok(generate_bracket_structure(&candidates, &plan, &mut rand::thread_rng())?)
}

async fn delete_bracket(State(state): State<AppState>, Path(year): Path<i32>) -> Result<StatusCode, AppError> {
    state.blocking(move |store| Ok(store.delete_bracket(year)?)).await?;
    state.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct ScheduleRequest {
    start: chrono::DateTime<Utc>,
    /// Only this round; every round back to back otherwise.
    round: Option<usize>,
    per_day: Option<usize>,
    session_hours: Option<i64>,
}

async fn schedule_bracket(
    State(state): State<AppState>,
    Path(year): Path<i32>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let per_day = payload.per_day.unwrap_or(state.config.matchups_per_day);
    let session = match payload.session_hours {
        Some(hours) => chrono::Duration::try_hours(hours)
            .ok_or_else(|| AppError::BadRequest(format!("session_hours {} is out of range", hours)))?,
        None => chrono::Duration::from_std(state.config.voting_session)
            .map_err(|e| AppError::Internal(format!("Configured voting session is out of range: {}", e)))?,
    };
    let ScheduleRequest { start, round, .. } = payload;

    let result = state
        .blocking(move |store| {
            let (bracket, ()) = store.update_bracket(year, |bracket| match round {
                Some(round) => schedule_round(bracket, round, start, per_day, session).map(|_| ()),
                None => schedule_tournament(bracket, start, per_day, session),
            })?;
            bracket_json(store, &bracket)
        })
        .await?;
    state.invalidate();

    tracing::info!("Scheduled bracket {} from {}", year, start);
    Ok(Json(result))
}

#[derive(Debug, Default, Deserialize)]
struct CloseRequest {
    winner: Option<i64>,
}

async fn close_matchup(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Option<Json<CloseRequest>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(payload) = payload.unwrap_or_default();
    let closed = state
        .blocking(move |store| Ok(store.close_matchup(id, payload.winner)?))
        .await?;
    state.invalidate();

    tracing::info!(
        "Closed matchup {} of {}: winner {} ({} of {} votes)",
        id,
        closed.year,
        closed.winner,
        closed.tally.votes_for(closed.winner),
        closed.tally.total()
    );
    Ok(Json(serde_json::json!({
        "winner": closed.winner,
        "tally": closed.tally,
        "changed": closed.changed,
        "progress": closed.bracket.progress(),
    })))
}

async fn list_all_posts(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let posts = state.blocking(|store| Ok(store.list_posts(true)?)).await?;
    Ok(Json(serde_json::json!({
        "rows": posts.len(),
        "data": posts,
    })))
}

async fn create_post(
    State(state): State<AppState>,
    Json(payload): Json<PostDraft>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let post = state.blocking(move |store| Ok(store.create_post(&payload)?)).await?;
    state.invalidate();
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(post).map_err(SaintfestError::from)?),
    ))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<PostDraft>,
) -> Result<Json<serde_json::Value>, AppError> {
    let post = state.blocking(move |store| Ok(store.update_post(id, &payload)?)).await?;
    state.invalidate();
    Ok(Json(serde_json::to_value(post).map_err(SaintfestError::from)?))
}

async fn delete_post(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, AppError> {
    state.blocking(move |store| Ok(store.delete_post(id)?)).await?;
    state.invalidate();
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn load_bracket(store: &Store, year: i32) -> Result<Bracket, AppError> {
    store
        .get_bracket(year)?
        .ok_or_else(|| AppError::NotFound(format!("No bracket for {}", year)))
}

fn load_matchup(store: &Store, id: i64) -> Result<(i32, Matchup), AppError> {
    store
        .get_matchup(id)?
        .ok_or_else(|| AppError::NotFound(format!("Matchup {} not found", id)))
}

fn layout_options(size: usize, width: Option<f64>) -> Result<LayoutOptions, AppError> {
    match width {
        Some(w) if w.is_finite() && w > 0.0 => Ok(LayoutOptions::fit_width(size, w)?),
        Some(w) => Err(AppError::BadRequest(format!("Invalid width {}", w))),
        None => Ok(LayoutOptions::default()),
    }
}

pub(crate) fn bracket_svg(store: &Store, bracket: &Bracket, width: Option<f64>) -> Result<String, AppError> {
    let layout = compute_layout(bracket.size, &layout_options(bracket.size, width)?)?;
    let names = store.saint_names(&bracket.entrants())?;
    Ok(render_svg(bracket, &layout, &names))
}

fn bracket_json(store: &Store, bracket: &Bracket) -> Result<serde_json::Value, AppError> {
    let names = store.saint_names(&bracket.entrants())?;
    Ok(serde_json::json!({
        "bracket": bracket,
        "saints": names,
        "progress": bracket.progress(),
    }))
}

fn matchup_json(store: &Store, year: i32, matchup: &Matchup) -> Result<serde_json::Value, AppError> {
    let ids: Vec<i64> = [matchup.saint_a, matchup.saint_b].into_iter().flatten().collect();
    let saints = store.saints_by_ids(&ids)?;
    let tally = store.tally(matchup)?;
    let (percent_a, percent_b) = tally.percentages();
    let posts = store.posts_for_matchup(matchup.id)?;
    Ok(serde_json::json!({
        "year": year,
        "matchup": matchup,
        "state": matchup.state_at(Utc::now()),
        "saints": saints,
        "tally": tally,
        "percentages": [percent_a, percent_b],
        "posts": posts,
    }))
}

/// Client address: the first `X-Forwarded-For` hop when the proxy is trusted,
/// the socket peer otherwise.
pub(crate) fn client_ip(config: &Config, peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    if config.trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub(crate) fn voter_fingerprint(config: &Config, peer: Option<SocketAddr>, headers: &HeaderMap) -> String {
    let ip = client_ip(config, peer, headers);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    fingerprint(&config.vote_salt, &ip, user_agent)
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    UnprocessableEntity(String),
    Internal(String),
}

impl From<SaintfestError> for AppError {
    fn from(err: SaintfestError) -> Self {
        let message = err.to_string();
        match err {
            SaintfestError::NotFound(_) => AppError::NotFound(message),
            SaintfestError::Invalid(_) => AppError::BadRequest(message),
            SaintfestError::Import(_) => AppError::UnprocessableEntity(message),
            SaintfestError::VotingClosed(_) => AppError::Forbidden(message),
            SaintfestError::Conflict(_) | SaintfestError::AlreadyVoted(_) | SaintfestError::Tie(_) => {
                AppError::Conflict(message)
            }
            SaintfestError::Storage(_) | SaintfestError::Serialization(_) => {
                tracing::error!("{}", message);
                AppError::Internal(message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
