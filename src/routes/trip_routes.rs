use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::trip_controller::TripController;
use crate::dto::trip_dto::{CompleteTripRequest, CreateTripRequest, TripFilters};
use crate::dto::ApiResponse;
use crate::models::Trip;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_trip_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_trip).get(list_trips))
        .route("/:id", get(get_trip))
        .route("/:id/dispatch", post(dispatch_trip))
        .route("/:id/complete", post(complete_trip))
        .route("/:id/cancel", post(cancel_trip))
}

async fn create_trip(
    State(state): State<AppState>,
    Json(request): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Trip>>), AppError> {
    let controller = TripController::new(&state);
    let response = controller.create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_trips(
    State(state): State<AppState>,
    Query(filters): Query<TripFilters>,
) -> Result<Json<ApiResponse<Vec<Trip>>>, AppError> {
    let controller = TripController::new(&state);
    Ok(Json(controller.list(filters).await?))
}

async fn get_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trip>>, AppError> {
    let controller = TripController::new(&state);
    Ok(Json(controller.get_by_id(id).await?))
}

async fn dispatch_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trip>>, AppError> {
    let controller = TripController::new(&state);
    Ok(Json(controller.dispatch(id).await?))
}

async fn complete_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CompleteTripRequest>,
) -> Result<Json<ApiResponse<Trip>>, AppError> {
    let controller = TripController::new(&state);
    Ok(Json(controller.complete(id, request).await?))
}

async fn cancel_trip(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trip>>, AppError> {
    let controller = TripController::new(&state);
    Ok(Json(controller.cancel(id).await?))
}
