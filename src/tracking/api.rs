use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::error;

use super::db::DbHandle;
use super::models::{InspectionDto, NewProductionOrder};
use super::repository::{SqliteFailureRepository, SqliteInspectionRepository, SqliteOrderRepository};
use super::service::{
    FailureCatalog, InspectionService, InspectionServiceImpl, OrderServiceImpl,
    ProductionOrderService,
};
use crate::errors::TrackerError;

// ── Shared application state ──────────────────────────────────────────

/// Application context built once at startup and shared by every handler.
pub struct AppState {
    pub orders: Arc<dyn ProductionOrderService>,
    pub inspections: Arc<dyn InspectionService>,
    pub failures: FailureCatalog,
}

impl AppState {
    /// Wire the SQLite repositories and services around one store handle.
    pub fn from_db(db: DbHandle) -> Self {
        let orders = OrderServiceImpl::new(Arc::new(SqliteOrderRepository::new(db.clone())));
        let inspections =
            InspectionServiceImpl::new(Arc::new(SqliteInspectionRepository::new(db.clone())));
        let failures = FailureCatalog::new(Arc::new(SqliteFailureRepository::new(db)));
        Self {
            orders: Arc::new(orders),
            inspections: Arc::new(inspections),
            failures,
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request payload types ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct OrderIdQuery {
    pub orderid: Option<String>,
}

impl OrderIdQuery {
    /// The `orderid` parameter, rejected before any store access when absent
    /// or blank.
    fn require(self) -> Result<String, ApiError> {
        match self.orderid {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(ApiError::BadRequest("missing orderid query parameter".into())),
        }
    }
}

#[derive(Deserialize)]
pub struct FailuresQuery {
    pub group: Option<String>,
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Validation(_) => ApiError::BadRequest(err.to_string()),
            TrackerError::OrderNotFound { .. } => ApiError::NotFound(err.to_string()),
            TrackerError::OrderAlreadyClosed { .. } => ApiError::Conflict(err.to_string()),
            TrackerError::Storage(_) => {
                error!(error = %format!("{:#}", anyhow::Error::from(err)), "store failure");
                ApiError::Internal("storage failure".into())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/open", get(list_open_orders))
        .route("/api/order", get(get_order))
        .route("/api/order/close", get(close_order).post(close_order))
        .route(
            "/api/inspections",
            get(list_inspections).post(submit_inspection),
        )
        .route("/api/failure-groups", get(list_failure_groups))
        .route("/api/failures", get(list_failures))
        .route("/health", get(health_check))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn create_order(
    State(state): State<SharedState>,
    body: Result<Json<NewProductionOrder>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body?;
    state.orders.new_order(req).await?;
    Ok(StatusCode::OK)
}

async fn get_order(
    State(state): State<SharedState>,
    Query(query): Query<OrderIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query.require()?;
    let order = state.orders.get_order_by_id(&id).await?;
    Ok(Json(order))
}

async fn close_order(
    State(state): State<SharedState>,
    Query(query): Query<OrderIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query.require()?;
    state.orders.close_order(&id).await?;
    Ok(StatusCode::OK)
}

async fn list_open_orders(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state.orders.get_open_orders().await?;
    Ok(Json(orders))
}

async fn submit_inspection(
    State(state): State<SharedState>,
    body: Result<Json<InspectionDto>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(dto) = body?;
    let recorded = state.inspections.submit(dto).await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

async fn list_inspections(
    State(state): State<SharedState>,
    Query(query): Query<OrderIdQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = query.require()?;
    let inspections = state.inspections.list_for_order(&id).await?;
    Ok(Json(inspections))
}

async fn list_failure_groups(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.failures.groups().await?))
}

async fn list_failures(
    State(state): State<SharedState>,
    Query(query): Query<FailuresQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.failures.failures(query.group.as_deref()).await?))
}
