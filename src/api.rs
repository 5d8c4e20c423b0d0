//! HTTP API — the whole server surface.
//!
//! Endpoints:
//!   POST   /api/login                → start a session (shared password)
//!   POST   /api/logout               → clear the session cookie
//!   GET    /api/health               → liveness info (open)
//!   GET    /api/auth/check           → session probe
//!   GET    /api/movies               → local + custom movie list (JSON)
//!   GET    /api/movies/{id}          → single movie record
//!   GET    /api/stats                → library totals per source
//!   GET    /api/stream/{id}          → range-aware video streaming
//!   GET    /api/stream/custom/{id}   → streaming for custom-registry movies
//!   POST   /api/custom-path          → scan a folder into the custom registry
//!   DELETE /api/custom-path          → clear the custom registry
//!   GET    /api/thumbnail/{id}       → redirect to a placeholder poster

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::auth;
use crate::catalog::{self, Movie, MovieId};
use crate::config::Config;
use crate::error::FlixError;
use crate::registry::CustomRegistry;
use crate::stream::{self, StreamTarget};

/// Shared state passed to all handlers.
pub struct AppState {
    pub config: Config,
    pub registry: CustomRegistry,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: CustomRegistry::new(),
            started_at: Instant::now(),
        }
    }
}

// ──────────────── request / response types ────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPathRequest {
    custom_path: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    total_movie_count: usize,
    local_movie_count: usize,
    custom_movie_count: usize,
    total_size: u64,
    total_size_formatted: String,
    movies_dir: String,
    server_uptime: u64,
    timestamp: String,
    sources: SourcesBreakdown,
}

#[derive(Serialize)]
struct SourcesBreakdown {
    local: SourceStats,
    custom: SourceStats,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceStats {
    count: usize,
    size: u64,
    size_formatted: String,
}

// ──────────────── error → HTTP boundary ───────────────────────────────────

/// All request-path errors become JSON envelopes here; nothing escapes a
/// handler as a panic.
impl IntoResponse for FlixError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            FlixError::MovieNotFound { .. } => (StatusCode::NOT_FOUND, "Movie not found"),
            FlixError::InvalidId(_) => (StatusCode::BAD_REQUEST, "Invalid movie id"),
            FlixError::PathOutsideRoot => (StatusCode::FORBIDDEN, "Forbidden"),
            FlixError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            FlixError::MalformedRange(_) | FlixError::RangeOutOfBounds { .. } => {
                (StatusCode::RANGE_NOT_SATISFIABLE, "Range not satisfiable")
            }
            FlixError::Io(_) | FlixError::Config(_) => {
                error!(error = %self, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ──────────────── router ──────────────────────────────────────────────────

/// Build the axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/auth/check", get(handle_auth_check))
        .route("/api/movies", get(handle_movies))
        .route("/api/movies/{id}", get(handle_movie))
        .route("/api/stats", get(handle_stats))
        .route("/api/stream/{id}", get(handle_stream))
        .route("/api/stream/custom/{id}", get(handle_stream_custom))
        .route(
            "/api/custom-path",
            post(handle_custom_scan).delete(handle_custom_clear),
        )
        .route("/api/thumbnail/{id}", get(handle_thumbnail))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .route("/api/login", post(handle_login))
        .route("/api/logout", post(handle_logout))
        .route("/api/health", get(handle_health))
        .merge(protected)
        .fallback(handle_not_found)
        .layer(cors_layer(&state.config.api.frontend_origin))
        .with_state(state)
}

/// CORS with credentials: cookies must travel cross-origin from the React
/// dev server, so the origin is pinned rather than wildcarded.
fn cors_layer(frontend_origin: &str) -> CorsLayer {
    let origin = frontend_origin
        .parse::<HeaderValue>()
        .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:5173"));
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Start the HTTP server.
pub async fn start_server(state: Arc<AppState>, port: u16) {
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", port);
    info!(port, "HTTP API listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "Failed to bind HTTP server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "HTTP server error");
    }
}

// ──────────────── auth handlers ───────────────────────────────────────────

async fn handle_login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Response {
    if req.password == state.config.auth.shared_password {
        info!("Login successful");
        (
            StatusCode::OK,
            [(header::SET_COOKIE, auth::issue_cookie(&state.config.auth))],
            Json(serde_json::json!({"success": true, "message": "Login successful"})),
        )
            .into_response()
    } else {
        warn!("Login attempt with wrong password");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Invalid password"})),
        )
            .into_response()
    }
}

async fn handle_logout() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, auth::clear_cookie())],
        Json(serde_json::json!({"success": true, "message": "Logged out successfully"})),
    )
}

async fn handle_auth_check() -> impl IntoResponse {
    Json(serde_json::json!({"authenticated": true}))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.started_at.elapsed().as_secs(),
    }))
}

// ──────────────── catalog handlers ────────────────────────────────────────

async fn handle_movies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Movie>>, FlixError> {
    let mut movies = catalog::scan(&state.config.library.movies_dir).await?;
    movies.extend(state.registry.all());
    info!(total = movies.len(), "Movie list served");
    Ok(Json(movies))
}

async fn handle_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Movie>, FlixError> {
    let movie = find_movie(&state, &id).await?;
    Ok(Json(movie))
}

async fn find_movie(state: &AppState, id: &str) -> Result<Movie, FlixError> {
    match MovieId::decode(id)? {
        MovieId::Local(_) => catalog::scan(&state.config.library.movies_dir)
            .await?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or_else(|| FlixError::MovieNotFound { id: id.to_string() }),
        MovieId::Custom(_) => state
            .registry
            .find(id)
            .ok_or_else(|| FlixError::MovieNotFound { id: id.to_string() }),
    }
}

async fn handle_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, FlixError> {
    let (local_count, local_size) = catalog::stats(&state.config.library.movies_dir).await?;
    let custom_count = state.registry.len();
    let custom_size = state.registry.total_size();
    let total_size = local_size + custom_size;

    Ok(Json(StatsResponse {
        total_movie_count: local_count + custom_count,
        local_movie_count: local_count,
        custom_movie_count: custom_count,
        total_size,
        total_size_formatted: catalog::format_bytes(total_size),
        movies_dir: state.config.library.movies_dir.display().to_string(),
        server_uptime: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now().to_rfc3339(),
        sources: SourcesBreakdown {
            local: SourceStats {
                count: local_count,
                size: local_size,
                size_formatted: catalog::format_bytes(local_size),
            },
            custom: SourceStats {
                count: custom_count,
                size: custom_size,
                size_formatted: catalog::format_bytes(custom_size),
            },
        },
    }))
}

// ──────────────── streaming handlers ──────────────────────────────────────

async fn handle_stream(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, FlixError> {
    match MovieId::decode(&id)? {
        MovieId::Local(filename) => {
            let target =
                catalog::resolve_local(&state.config.library.movies_dir, &filename).await?;
            serve_target(&id, &headers, &target).await
        }
        MovieId::Custom(_) => {
            // Same shape as the historical API: custom ids bounce to the
            // dedicated custom endpoint, prefix stripped.
            let inner = id.strip_prefix("custom_").unwrap_or(&id);
            Ok(Redirect::temporary(&format!("/api/stream/custom/{inner}")).into_response())
        }
    }
}

async fn handle_stream_custom(
    State(state): State<Arc<AppState>>,
    Path(inner): Path<String>,
    headers: HeaderMap,
) -> Result<Response, FlixError> {
    let id = format!("custom_{inner}");
    let MovieId::Custom(dir) = MovieId::decode(&id)? else {
        return Err(FlixError::InvalidId(id));
    };
    let path = state
        .registry
        .resolve(&dir)
        .ok_or_else(|| FlixError::MovieNotFound { id: id.clone() })?;
    let target = StreamTarget::open(path).await?;
    serve_target(&id, &headers, &target).await
}

async fn serve_target(
    id: &str,
    headers: &HeaderMap,
    target: &StreamTarget,
) -> Result<Response, FlixError> {
    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let response = stream::serve(range_header, target).await?;
    info!(
        movie_id = id,
        size = target.size,
        status = %response.status(),
        range = range_header.unwrap_or("-"),
        "Stream request"
    );
    Ok(response)
}

// ──────────────── custom registry handlers ────────────────────────────────

async fn handle_custom_scan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CustomPathRequest>,
) -> Response {
    let Some(custom_path) = req.custom_path.filter(|p| !p.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Custom path is required"})),
        )
            .into_response();
    };

    match state.registry.scan_path(std::path::Path::new(&custom_path)).await {
        Ok(movies) => Json(serde_json::json!({
            "success": true,
            "count": movies.len(),
            "movies": movies,
        }))
        .into_response(),
        Err(e) => {
            error!(path = custom_path, error = %e, "Custom path scan failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to scan custom path"})),
            )
                .into_response()
        }
    }
}

async fn handle_custom_clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.registry.clear();
    Json(serde_json::json!({"success": true, "message": "Custom movies cleared"}))
}

// ──────────────── misc handlers ───────────────────────────────────────────

/// Poster placeholder: a redirect to a third-party placeholder image built
/// from the movie's title. Unknown ids still get a generic poster so broken
/// thumbnails never block the grid.
async fn handle_thumbnail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Redirect {
    let url = match find_movie(&state, &id).await {
        Ok(movie) => format!(
            "https://via.placeholder.com/300x450/141414/E50914?text={}&font=Arial",
            urlencoding::encode(&movie.title)
        ),
        Err(_) => "https://via.placeholder.com/300x450/141414/6B7280?text=Movie".to_string(),
    };
    Redirect::temporary(&url)
}

async fn handle_not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Endpoint not found"})),
    )
}
