//! Modelo de Trip
//!
//! El campo `status` de un viaje sólo lo escribe el motor de ciclo de vida.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado del viaje - mapea al ENUM trip_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "trip_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Draft,
    Dispatched,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub const ALL: [TripStatus; 4] = [
        TripStatus::Draft,
        TripStatus::Dispatched,
        TripStatus::Completed,
        TripStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Draft => "DRAFT",
            TripStatus::Dispatched => "DISPATCHED",
            TripStatus::Completed => "COMPLETED",
            TripStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for TripStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TripStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown trip status '{}'", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub cargo_weight: Decimal,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub status: TripStatus,
    pub final_odometer: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Datos validados para insertar un viaje en DRAFT
#[derive(Debug, Clone)]
pub struct NewTrip {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub cargo_weight: Decimal,
    pub origin: Option<String>,
    pub destination: Option<String>,
}

impl NewTrip {
    pub fn into_draft(self) -> Trip {
        Trip {
            id: Uuid::new_v4(),
            vehicle_id: self.vehicle_id,
            driver_id: self.driver_id,
            cargo_weight: self.cargo_weight,
            origin: self.origin,
            destination: self.destination,
            status: TripStatus::Draft,
            final_odometer: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}
