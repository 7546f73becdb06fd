//! Modelo de Vehicle
//!
//! Mapea exactamente a la tabla `vehicles`. El motor de viajes sólo mueve
//! el estado entre AVAILABLE y ON_TRIP; IN_SHOP y OUT_OF_SERVICE los fijan
//! otros servicios y bloquean cualquier asignación.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado del vehículo - mapea al ENUM vehicle_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "vehicle_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    Available,
    OnTrip,
    InShop,
    OutOfService,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 4] = [
        VehicleStatus::Available,
        VehicleStatus::OnTrip,
        VehicleStatus::InShop,
        VehicleStatus::OutOfService,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "AVAILABLE",
            VehicleStatus::OnTrip => "ON_TRIP",
            VehicleStatus::InShop => "IN_SHOP",
            VehicleStatus::OutOfService => "OUT_OF_SERVICE",
        }
    }
}

impl std::fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle principal
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Vehicle {
    pub id: Uuid,
    pub name: String,
    pub license_plate: String,
    pub max_capacity: Decimal,
    pub odometer: Decimal,
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// Vehículo nuevo en estado AVAILABLE
    pub fn new(name: &str, license_plate: &str, max_capacity: Decimal, odometer: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            license_plate: license_plate.to_string(),
            max_capacity,
            odometer,
            status: VehicleStatus::Available,
            created_at: Utc::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == VehicleStatus::Available
    }
}
