use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::vehicle_controller::VehicleController;
use crate::dto::vehicle_dto::{LockVehicleRequest, UnlockVehicleRequest, UnlockVehicleResponse, VehicleLockStatus};
use crate::dto::ApiResponse;
use crate::models::Vehicle;
use crate::services::LockToken;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_vehicle_router() -> Router<AppState> {
    Router::new()
        .route("/available", get(list_available_vehicles))
        .route("/:id/lock", post(lock_vehicle).get(get_lock_status))
        .route("/:id/unlock", post(unlock_vehicle))
}

async fn list_available_vehicles(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Vehicle>>>, AppError> {
    let controller = VehicleController::new(&state);
    Ok(Json(controller.list_available().await?))
}

async fn lock_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<LockVehicleRequest>,
) -> Result<Json<ApiResponse<LockToken>>, AppError> {
    let controller = VehicleController::new(&state);
    Ok(Json(controller.lock(id, request).await?))
}

async fn unlock_vehicle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UnlockVehicleRequest>,
) -> Result<Json<ApiResponse<UnlockVehicleResponse>>, AppError> {
    let controller = VehicleController::new(&state);
    Ok(Json(controller.unlock(id, request).await?))
}

async fn get_lock_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<VehicleLockStatus>>, AppError> {
    let controller = VehicleController::new(&state);
    Ok(Json(controller.lock_status(id).await?))
}
