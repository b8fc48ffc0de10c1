use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{CatalogError, PenaltyCatalog};
use super::deduction::{DeductionError, DeductionRequest, DeductionService};
use super::domain::{DriverId, NewPenalty, PenaltyId, PenaltyUpdate, TripId, UserId};
use super::repository::{
    FleetRepository, PenaltyFilter, PenaltyMailer, PenaltyRepository, RepositoryError,
    StaffDirectory,
};

/// Shared handler state bundling the catalog and the deduction engine.
pub struct PenaltyApi<P, F, S, M> {
    pub catalog: Arc<PenaltyCatalog<P>>,
    pub engine: Arc<DeductionService<P, F, S, M>>,
}

impl<P, F, S, M> PenaltyApi<P, F, S, M> {
    pub fn new(
        catalog: Arc<PenaltyCatalog<P>>,
        engine: Arc<DeductionService<P, F, S, M>>,
    ) -> Self {
        Self { catalog, engine }
    }
}

/// Uniform response envelope: `{success, message?, data?, count?}`.
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    let envelope = ApiEnvelope {
        success: true,
        message: None,
        data: Some(data),
        count: None,
    };
    (status, axum::Json(envelope)).into_response()
}

fn success_with_count<T: Serialize>(data: Vec<T>) -> Response {
    let count = data.len();
    let envelope = ApiEnvelope {
        success: true,
        message: None,
        data: Some(data),
        count: Some(count),
    };
    (StatusCode::OK, axum::Json(envelope)).into_response()
}

fn failure(status: StatusCode, message: String) -> Response {
    let envelope: ApiEnvelope<()> = ApiEnvelope {
        success: false,
        message: Some(message),
        data: None,
        count: None,
    };
    (status, axum::Json(envelope)).into_response()
}

fn catalog_failure(error: CatalogError) -> Response {
    let status = match &error {
        CatalogError::NotFound => StatusCode::NOT_FOUND,
        CatalogError::NameTaken(_) => StatusCode::CONFLICT,
        CatalogError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        CatalogError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        CatalogError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    failure(status, error.to_string())
}

fn deduction_failure(error: DeductionError) -> Response {
    let status = match &error {
        DeductionError::PenaltyNotFound | DeductionError::DriverNotFound => StatusCode::NOT_FOUND,
        DeductionError::PenaltyInactive(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DeductionError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        DeductionError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        DeductionError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    failure(status, error.to_string())
}

/// Router builder exposing the penalty catalog, deduction, status, and
/// history endpoints. Role enforcement belongs to upstream middleware.
pub fn penalty_router<P, F, S, M>(api: Arc<PenaltyApi<P, F, S, M>>) -> Router
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    Router::new()
        .route(
            "/api/v1/penalties",
            post(create_penalty_handler::<P, F, S, M>).get(list_penalties_handler::<P, F, S, M>),
        )
        .route(
            "/api/v1/penalties/:penalty_id",
            get(get_penalty_handler::<P, F, S, M>)
                .put(update_penalty_handler::<P, F, S, M>)
                .delete(delete_penalty_handler::<P, F, S, M>),
        )
        .route(
            "/api/v1/drivers/:driver_id/deductions",
            post(apply_deduction_handler::<P, F, S, M>),
        )
        .route(
            "/api/v1/drivers/:driver_id/penalty-history",
            get(penalty_history_handler::<P, F, S, M>),
        )
        .route(
            "/api/v1/drivers/:driver_id/block",
            post(block_driver_handler::<P, F, S, M>),
        )
        .route(
            "/api/v1/drivers/:driver_id/unblock",
            post(unblock_driver_handler::<P, F, S, M>),
        )
        .with_state(api)
}

async fn create_penalty_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    axum::Json(new): axum::Json<NewPenalty>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    match api.catalog.create(new) {
        Ok(penalty) => success(StatusCode::CREATED, penalty),
        Err(error) => catalog_failure(error),
    }
}

async fn list_penalties_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    Query(filter): Query<PenaltyFilter>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    match api.catalog.list(&filter) {
        Ok(penalties) => success_with_count(penalties),
        Err(error) => catalog_failure(error),
    }
}

async fn get_penalty_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    Path(penalty_id): Path<String>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    match api.catalog.get(&PenaltyId(penalty_id)) {
        Ok(penalty) => success(StatusCode::OK, penalty),
        Err(error) => catalog_failure(error),
    }
}

async fn update_penalty_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    Path(penalty_id): Path<String>,
    axum::Json(update): axum::Json<PenaltyUpdate>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    match api.catalog.update(&PenaltyId(penalty_id), update) {
        Ok(penalty) => success(StatusCode::OK, penalty),
        Err(error) => catalog_failure(error),
    }
}

async fn delete_penalty_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    Path(penalty_id): Path<String>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    match api.catalog.deactivate(&PenaltyId(penalty_id)) {
        Ok(penalty) => success(StatusCode::OK, penalty),
        Err(error) => catalog_failure(error),
    }
}

/// Body for the deduction endpoint.
#[derive(Debug, Deserialize)]
struct ApplyDeductionBody {
    penalty_id: PenaltyId,
    #[serde(default)]
    amount_cents: Option<i64>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    trip_id: Option<TripId>,
    applied_by: UserId,
}

async fn apply_deduction_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    Path(driver_id): Path<String>,
    axum::Json(body): axum::Json<ApplyDeductionBody>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    let request = DeductionRequest {
        penalty_id: body.penalty_id,
        driver_id: DriverId(driver_id),
        amount_cents: body.amount_cents,
        reason: body.reason,
        trip_id: body.trip_id,
        applied_by: body.applied_by,
    };
    match api.engine.apply_deduction(request) {
        Ok(outcome) => success(StatusCode::OK, outcome),
        Err(error) => deduction_failure(error),
    }
}

/// Optional inclusive RFC 3339 bounds for the history endpoint.
#[derive(Debug, Deserialize)]
struct HistoryParams {
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
}

async fn penalty_history_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    Path(driver_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    match api
        .engine
        .driver_penalty_history(&DriverId(driver_id), params.start, params.end)
    {
        Ok(entries) => success_with_count(entries),
        Err(error) => deduction_failure(error),
    }
}

/// Body for the block/unblock endpoints.
#[derive(Debug, Deserialize)]
struct StatusChangeBody {
    reason: String,
    actor: UserId,
}

async fn block_driver_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    Path(driver_id): Path<String>,
    axum::Json(body): axum::Json<StatusChangeBody>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    match api
        .engine
        .block_driver(&DriverId(driver_id), &body.reason, &body.actor)
    {
        Ok(driver) => success(StatusCode::OK, driver),
        Err(error) => deduction_failure(error),
    }
}

async fn unblock_driver_handler<P, F, S, M>(
    State(api): State<Arc<PenaltyApi<P, F, S, M>>>,
    Path(driver_id): Path<String>,
    axum::Json(body): axum::Json<StatusChangeBody>,
) -> Response
where
    P: PenaltyRepository + 'static,
    F: FleetRepository + 'static,
    S: StaffDirectory + 'static,
    M: PenaltyMailer + 'static,
{
    match api
        .engine
        .unblock_driver(&DriverId(driver_id), &body.reason, &body.actor)
    {
        Ok(driver) => success(StatusCode::OK, driver),
        Err(error) => deduction_failure(error),
    }
}
