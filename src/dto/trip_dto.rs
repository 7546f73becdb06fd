use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::TripStatus;
use crate::services::CreateTripCommand;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::validation::validate_positive_decimal;

// Request para crear un viaje
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTripRequest {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    #[validate(custom = "validate_positive_decimal")]
    pub cargo_weight: Decimal,
    #[validate(length(max = 255))]
    pub origin: Option<String>,
    #[validate(length(max = 255))]
    pub destination: Option<String>,
    pub dispatcher_id: Option<Uuid>,
}

impl From<CreateTripRequest> for CreateTripCommand {
    fn from(request: CreateTripRequest) -> Self {
        Self {
            vehicle_id: request.vehicle_id,
            driver_id: request.driver_id,
            cargo_weight: request.cargo_weight,
            origin: request.origin,
            destination: request.destination,
            dispatcher_id: request.dispatcher_id,
        }
    }
}

// Request para completar un viaje
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteTripRequest {
    #[validate(custom = "validate_positive_decimal")]
    pub final_odometer: Decimal,
}

// Query string de GET /api/trips
#[derive(Debug, Default, Deserialize)]
pub struct TripFilters {
    pub status: Option<String>,
}

impl TripFilters {
    pub fn status(&self) -> AppResult<Option<TripStatus>> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(AppError::InvalidArgument),
        }
    }
}
