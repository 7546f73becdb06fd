use uuid::Uuid;
use validator::Validate;

use crate::dto::trip_dto::{CompleteTripRequest, CreateTripRequest, TripFilters};
use crate::dto::ApiResponse;
use crate::models::Trip;
use crate::services::{FleetQueryService, TripLifecycleService};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct TripController {
    lifecycle: TripLifecycleService,
    queries: FleetQueryService,
}

impl TripController {
    pub fn new(state: &AppState) -> Self {
        Self {
            lifecycle: state.lifecycle.clone(),
            queries: state.queries.clone(),
        }
    }

    pub async fn create(&self, request: CreateTripRequest) -> Result<ApiResponse<Trip>, AppError> {
        request.validate()?;

        let trip = self.lifecycle.create_trip(request.into()).await?;

        Ok(ApiResponse::success_with_message(
            trip,
            "Viaje creado en DRAFT".to_string(),
        ))
    }

    pub async fn dispatch(&self, id: Uuid) -> Result<ApiResponse<Trip>, AppError> {
        let trip = self.lifecycle.dispatch_trip(id).await?;
        Ok(ApiResponse::success_with_message(trip, "Viaje despachado".to_string()))
    }

    pub async fn complete(&self, id: Uuid, request: CompleteTripRequest) -> Result<ApiResponse<Trip>, AppError> {
        request.validate()?;

        let trip = self.lifecycle.complete_trip(id, request.final_odometer).await?;
        Ok(ApiResponse::success_with_message(trip, "Viaje completado".to_string()))
    }

    pub async fn cancel(&self, id: Uuid) -> Result<ApiResponse<Trip>, AppError> {
        let trip = self.lifecycle.cancel_trip(id).await?;
        Ok(ApiResponse::success_with_message(trip, "Viaje cancelado".to_string()))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<ApiResponse<Trip>, AppError> {
        Ok(ApiResponse::success(self.queries.get_trip(id).await?))
    }

    pub async fn list(&self, filters: TripFilters) -> Result<ApiResponse<Vec<Trip>>, AppError> {
        let trips = self.queries.list_trips(filters.status()?).await?;
        Ok(ApiResponse::success(trips))
    }
}
