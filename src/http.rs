//! HTTP surface: one route per engine operation.
//!
//! Endpoints:
//! - GET    /                 - banner
//! - POST   /events/book      - Book
//! - GET    /events           - List
//! - POST   /events/block     - Block
//! - POST   /events/release   - Release
//! - PUT    /events/:id       - Update
//! - DELETE /events/:id       - Delete

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::trace::TraceLayer;
use ulid::Ulid;

use crate::engine::{required_fields, Engine, EngineError};
use crate::model::*;
use crate::observability::{self, Operation};
use crate::time;

pub type SharedEngine = Arc<Engine>;

pub fn router(engine: SharedEngine) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/events", get(list_events))
        .route("/events/book", post(book_event))
        .route("/events/block", post(block_event))
        .route("/events/release", post(release_event))
        .route("/events/:id", put(update_event).delete(delete_event))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Event as rendered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: String,
    pub title: String,
    pub start_time: String,
    pub end_time: String,
    pub status: Status,
}

impl From<&Event> for EventView {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id.to_string(),
            title: event.title.clone(),
            start_time: time::format(event.span.start),
            end_time: time::format(event.span.end),
            status: event.status,
        }
    }
}

#[derive(Debug, Serialize)]
struct EventResponse {
    message: &'static str,
    event: EventView,
}

impl EventResponse {
    fn new(message: &'static str, event: &Event) -> Json<Self> {
        Json(Self {
            message,
            event: event.into(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

/// Body of block/release. The id is kept as raw JSON so that falsy values
/// (`null`, `""`, `0`, `false`) read as "no id" rather than a parse failure.
#[derive(Debug, Deserialize)]
struct IdRequest {
    #[serde(default)]
    id: Option<Value>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    /// An id that cannot name any event (wrong shape or type).
    UnknownId,
    BadBody(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadBody(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::MissingFields
                | EngineError::MissingId
                | EngineError::InvalidFormat(_)
                | EngineError::InvalidInterval { .. }
                | EngineError::LimitExceeded(_) => StatusCode::BAD_REQUEST,
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Overlap(_) | EngineError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
                EngineError::WalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::UnknownId => StatusCode::NOT_FOUND,
            ApiError::BadBody(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Engine(e) => match e {
                EngineError::MissingFields => "Missing required fields.".into(),
                EngineError::MissingId => "Event id is required.".into(),
                EngineError::InvalidFormat(_) => "Invalid date format.".into(),
                EngineError::InvalidInterval { .. } => "Start time must be before end time.".into(),
                EngineError::Overlap(_) => "Event overlaps with an existing event.".into(),
                EngineError::NotFound(_) => "Event not found.".into(),
                EngineError::InvalidTransition { from, to, .. } => {
                    format!("Event cannot be {to} once {from}.")
                }
                EngineError::LimitExceeded(msg) => format!("Limit exceeded: {msg}."),
                EngineError::WalError(_) => "Internal storage error.".into(),
            },
            ApiError::UnknownId => "Event not found.".into(),
            ApiError::BadBody(_) => "Invalid request body.".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Engine(e) if status.is_server_error() => tracing::error!("request failed: {e}"),
            ApiError::BadBody(detail) => tracing::debug!("bad request body: {detail}"),
            _ => {}
        }
        (status, Json(MessageResponse { message: self.message() })).into_response()
    }
}

fn parse_path_id(raw: &str) -> Result<EventId, ApiError> {
    Ulid::from_string(raw).map_err(|_| ApiError::UnknownId)
}

/// `Ok(None)` for a falsy id, which the engine reports as missing.
fn parse_body_id(value: Option<&Value>) -> Result<Option<EventId>, ApiError> {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(None),
        Some(Value::String(s)) => Ulid::from_string(s)
            .map(Some)
            .map_err(|_| ApiError::UnknownId),
        Some(_) => Err(ApiError::UnknownId),
    }
}

/// Run a handler body and record its outcome.
async fn track<T, F>(op: Operation, body: F) -> Response
where
    T: IntoResponse,
    F: Future<Output = Result<T, ApiError>>,
{
    let started = Instant::now();
    let response = match body.await {
        Ok(ok) => ok.into_response(),
        Err(e) => e.into_response(),
    };
    observability::record(op, response.status().as_u16(), started.elapsed());
    response
}

// ============================================================================
// Handlers
// ============================================================================

async fn banner() -> &'static str {
    "Scheduling API is up and running!"
}

async fn list_events(State(engine): State<SharedEngine>) -> Response {
    track(Operation::List, async {
        let events = engine.list().await;
        let views: Vec<EventView> = events.iter().map(EventView::from).collect();
        Ok::<_, ApiError>(Json(views))
    })
    .await
}

async fn book_event(
    State(engine): State<SharedEngine>,
    body: Result<Json<EventInput>, JsonRejection>,
) -> Response {
    track(Operation::Book, async {
        let Json(input) = body?;
        let event = engine.book(input).await?;
        Ok::<_, ApiError>((
            StatusCode::CREATED,
            EventResponse::new("Event booked successfully.", &event),
        ))
    })
    .await
}

async fn block_event(
    State(engine): State<SharedEngine>,
    body: Result<Json<IdRequest>, JsonRejection>,
) -> Response {
    track(Operation::Block, async {
        let Json(req) = body?;
        let id = parse_body_id(req.id.as_ref())?;
        let event = engine.block(id).await?;
        Ok::<_, ApiError>(EventResponse::new("Event blocked successfully.", &event))
    })
    .await
}

async fn release_event(
    State(engine): State<SharedEngine>,
    body: Result<Json<IdRequest>, JsonRejection>,
) -> Response {
    track(Operation::Release, async {
        let Json(req) = body?;
        let id = parse_body_id(req.id.as_ref())?;
        let event = engine.release(id).await?;
        Ok::<_, ApiError>(EventResponse::new("Event released successfully.", &event))
    })
    .await
}

async fn update_event(
    State(engine): State<SharedEngine>,
    Path(raw_id): Path<String>,
    body: Result<Json<EventInput>, JsonRejection>,
) -> Response {
    track(Operation::Update, async {
        let Json(input) = body?;
        // Missing fields outrank an unknown id.
        let id = match parse_path_id(&raw_id) {
            Ok(id) => id,
            Err(e) => {
                required_fields(&input)?;
                return Err(e);
            }
        };
        let event = engine.update(id, input).await?;
        Ok::<_, ApiError>(EventResponse::new("Event updated successfully", &event))
    })
    .await
}

async fn delete_event(State(engine): State<SharedEngine>, Path(raw_id): Path<String>) -> Response {
    track(Operation::Delete, async {
        let id = parse_path_id(&raw_id)?;
        engine.delete(id).await?;
        Ok::<_, ApiError>(Json(MessageResponse {
            message: "Event deleted successfully.".into(),
        }))
    })
    .await
}
