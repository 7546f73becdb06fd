use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

// Request para reservar un vehículo
#[derive(Debug, Deserialize, Validate)]
pub struct LockVehicleRequest {
    pub dispatcher_id: Uuid,
    #[validate(range(min = 1, max = 86400))]
    pub ttl_secs: Option<u64>,
}

// Request para liberar la reserva
#[derive(Debug, Deserialize)]
pub struct UnlockVehicleRequest {
    pub dispatcher_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UnlockVehicleResponse {
    pub released: bool,
}

// Response de GET /api/vehicles/:id/lock
#[derive(Debug, Serialize)]
pub struct VehicleLockStatus {
    pub vehicle_id: Uuid,
    pub locked: bool,
    pub holder_id: Option<Uuid>,
}
