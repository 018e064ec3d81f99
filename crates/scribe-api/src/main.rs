//! scribe-api - HTTP API server for scribe notes.
//!
//! Thin transport layer over `scribe_db::Database`: request decoding,
//! status-code mapping, and JSON shaping live here; all persistence
//! semantics live in the repository.

use std::net::SocketAddr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use scribe_core::{Note, NoteCreate, NoteCursor, NoteRepository, NoteShort, NoteUpdate};
use scribe_db::{Database, PoolConfig};

/// Default page size when the client does not send `limit`.
const DEFAULT_PAGE_SIZE: i64 = 20;

/// Hard cap on page size.
const MAX_PAGE_SIZE: i64 = 100;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation when chasing a request across handler and repository logs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(scribe_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<scribe_core::Error> for ApiError {
    fn from(err: scribe_core::Error) -> Self {
        match &err {
            scribe_core::Error::NoteNotFound(id) => {
                ApiError::NotFound(format!("Note {} not found", id))
            }
            scribe_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            scribe_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// NOTE HANDLERS
// =============================================================================

async fn create_note(
    State(state): State<AppState>,
    Json(body): Json<NoteCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = body.validated()?;
    let id = state.db.notes.create_with_log(draft).await?;
    let note = state.db.notes.get(id).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.db.notes.get(id).await?;
    Ok(Json(note))
}

#[derive(Debug, Deserialize)]
struct ListNotesQuery {
    limit: Option<i64>,
    /// Opaque keyset cursor from a previous page's `next_cursor`.
    cursor: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListNotesResponse {
    data: Vec<Note>,
    /// Present when another page may exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    next_cursor: Option<String>,
}

/// Clamp the requested page size into `1..=MAX_PAGE_SIZE`, rejecting
/// non-positive values.
fn effective_limit(requested: Option<i64>) -> Result<i64, ApiError> {
    match requested {
        None => Ok(DEFAULT_PAGE_SIZE),
        Some(n) if n <= 0 => Err(ApiError::BadRequest("limit must be >= 1".into())),
        Some(n) => Ok(n.min(MAX_PAGE_SIZE)),
    }
}

/// Cursor for the page after `page`, if `page` was full.
fn next_cursor(page: &[Note], limit: i64) -> Option<String> {
    if page.len() as i64 == limit {
        page.last().map(|note| note.cursor().encode())
    } else {
        None
    }
}

async fn list_notes(
    State(state): State<AppState>,
    Query(query): Query<ListNotesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = effective_limit(query.limit)?;

    let data = match &query.cursor {
        Some(token) => {
            let cursor = NoteCursor::decode(token)?;
            state.db.notes.list_after(&cursor, limit).await?
        }
        None => state.db.notes.list_first_page(limit).await?,
    };

    let next_cursor = next_cursor(&data, limit);
    Ok(Json(ListNotesResponse { data, next_cursor }))
}

async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NoteUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let patch = body.validated()?;
    state.db.notes.update(id, patch).await?;

    // Return the merged record so clients see the refreshed updated_at.
    let note = state.db.notes.get(id).await?;
    Ok(Json(note))
}

async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.notes.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct BatchNotesQuery {
    /// Comma-separated note ids, e.g. `ids=1,5,12`.
    ids: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchNotesResponse {
    data: Vec<NoteShort>,
}

/// Parse a comma-separated id list; blank entries are ignored.
fn parse_ids(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("invalid id: {}", s)))
        })
        .collect()
}

async fn get_notes_batch(
    State(state): State<AppState>,
    Query(query): Query<BatchNotesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = match query.ids.as_deref() {
        Some(raw) => parse_ids(raw)?,
        None => Vec::new(),
    };
    let data = state.db.notes.get_by_ids(&ids).await?;
    Ok(Json(BatchNotesResponse { data }))
}

// =============================================================================
// SYSTEM HANDLERS
// =============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ok" })),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "degraded", "error": err.to_string() })),
        ),
    }
}

// =============================================================================
// STARTUP
// =============================================================================

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/notes", get(list_notes).post(create_note))
        .route("/notes/batch", get(get_notes_batch))
        .route(
            "/notes/:id",
            get(get_note).patch(update_note).delete(delete_note),
        );

    Router::new()
        .nest("/api/v1", api)
        .route("/health", get(health_check))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}

fn init_tracing() {
    // LOG_FORMAT - "json" or "text" (default: "text")
    // RUST_LOG   - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "scribe_api=debug,scribe_db=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL is not set"))?;
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    let max_connections: u32 = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(scribe_db::pool::DEFAULT_MAX_CONNECTIONS);

    info!("Connecting to database...");
    let db = Database::connect_with_config(
        &database_url,
        PoolConfig::default().max_connections(max_connections),
    )
    .await?;
    info!("Database connected");

    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    let app = build_router(AppState { db });

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn note(id: i64) -> Note {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        Note {
            id,
            title: format!("note-{}", id),
            content: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_effective_limit_defaults_and_caps() {
        assert_eq!(effective_limit(None).unwrap(), DEFAULT_PAGE_SIZE);
        assert_eq!(effective_limit(Some(5)).unwrap(), 5);
        assert_eq!(effective_limit(Some(10_000)).unwrap(), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_effective_limit_rejects_non_positive() {
        assert!(effective_limit(Some(0)).is_err());
        assert!(effective_limit(Some(-3)).is_err());
    }

    #[test]
    fn test_next_cursor_only_on_full_page() {
        let full = vec![note(3), note(2)];
        assert!(next_cursor(&full, 2).is_some());

        let short = vec![note(3)];
        assert!(next_cursor(&short, 2).is_none());

        assert!(next_cursor(&[], 2).is_none());
    }

    #[test]
    fn test_next_cursor_points_at_last_row() {
        let page = vec![note(9), note(4)];
        let token = next_cursor(&page, 2).unwrap();
        let cursor = NoteCursor::decode(&token).unwrap();
        assert_eq!(cursor.id, 4);
        assert_eq!(cursor.created_at, page[1].created_at);
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids("1,5,12").unwrap(), vec![1, 5, 12]);
        assert_eq!(parse_ids(" 7 , 8 ").unwrap(), vec![7, 8]);
        assert_eq!(parse_ids("").unwrap(), Vec::<i64>::new());
        assert!(parse_ids("1,two,3").is_err());
    }

    #[test]
    fn test_api_error_status_mapping() {
        let resp = ApiError::from(scribe_core::Error::NoteNotFound(7)).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = ApiError::from(scribe_core::Error::InvalidInput("bad".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp =
            ApiError::from(scribe_core::Error::Database(sqlx::Error::PoolTimedOut)).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
