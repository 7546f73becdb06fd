use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::controllers::driver_controller::DriverController;
use crate::dto::ApiResponse;
use crate::models::Driver;
use crate::services::SyncExpiredLicensesResult;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_driver_router() -> Router<AppState> {
    Router::new()
        .route("/available", get(list_available_drivers))
        .route("/sync-expired-licenses", post(sync_expired_licenses))
}

async fn list_available_drivers(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Driver>>>, AppError> {
    let controller = DriverController::new(&state);
    Ok(Json(controller.list_available().await?))
}

async fn sync_expired_licenses(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SyncExpiredLicensesResult>>, AppError> {
    let controller = DriverController::new(&state);
    Ok(Json(controller.sync_expired_licenses().await?))
}
