use std::time::Duration;

use uuid::Uuid;
use validator::Validate;

use crate::dto::vehicle_dto::{LockVehicleRequest, UnlockVehicleRequest, UnlockVehicleResponse, VehicleLockStatus};
use crate::dto::ApiResponse;
use crate::metrics::DispatchMetrics;
use crate::models::Vehicle;
use crate::services::{FleetQueryService, LockToken, ReservationGuard};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct VehicleController {
    queries: FleetQueryService,
    guard: ReservationGuard,
    metrics: DispatchMetrics,
}

impl VehicleController {
    pub fn new(state: &AppState) -> Self {
        Self {
            queries: state.queries.clone(),
            guard: state.guard.clone(),
            metrics: state.metrics.clone(),
        }
    }

    pub async fn list_available(&self) -> Result<ApiResponse<Vec<Vehicle>>, AppError> {
        Ok(ApiResponse::success(self.queries.list_available_vehicles().await?))
    }

    pub async fn lock(&self, vehicle_id: Uuid, request: LockVehicleRequest) -> Result<ApiResponse<LockToken>, AppError> {
        request.validate()?;

        let ttl = request.ttl_secs.map(Duration::from_secs);
        match self.guard.acquire(vehicle_id, request.dispatcher_id, ttl).await {
            Ok(token) => {
                self.metrics.record_reservation("acquired");
                Ok(ApiResponse::success_with_message(
                    token,
                    "Vehículo reservado".to_string(),
                ))
            }
            Err(e) => {
                if matches!(e, AppError::Conflict(_)) {
                    self.metrics.record_reservation("conflict");
                }
                Err(e)
            }
        }
    }

    pub async fn unlock(
        &self,
        vehicle_id: Uuid,
        request: UnlockVehicleRequest,
    ) -> Result<ApiResponse<UnlockVehicleResponse>, AppError> {
        let released = self.guard.release(vehicle_id, request.dispatcher_id).await?;
        self.metrics
            .record_reservation(if released { "released" } else { "not_held" });

        Ok(ApiResponse::success(UnlockVehicleResponse { released }))
    }

    pub async fn lock_status(&self, vehicle_id: Uuid) -> Result<ApiResponse<VehicleLockStatus>, AppError> {
        let holder_id = self.guard.holder_of(vehicle_id).await?;
        Ok(ApiResponse::success(VehicleLockStatus {
            vehicle_id,
            locked: holder_id.is_some(),
            holder_id,
        }))
    }
}
