use crate::dto::ApiResponse;
use crate::models::Driver;
use crate::services::{FleetQueryService, SyncExpiredLicensesResult};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct DriverController {
    queries: FleetQueryService,
}

impl DriverController {
    pub fn new(state: &AppState) -> Self {
        Self {
            queries: state.queries.clone(),
        }
    }

    /// Lectura pura: no suspende a nadie
    pub async fn list_available(&self) -> Result<ApiResponse<Vec<Driver>>, AppError> {
        Ok(ApiResponse::success(self.queries.list_available_drivers().await?))
    }

    pub async fn sync_expired_licenses(&self) -> Result<ApiResponse<SyncExpiredLicensesResult>, AppError> {
        let result = self.queries.sync_expired_licenses().await?;
        let message = format!("{} conductor(es) suspendido(s)", result.suspended_count);
        Ok(ApiResponse::success_with_message(result, message))
    }
}
