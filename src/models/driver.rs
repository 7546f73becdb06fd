//! Modelo de Driver
//!
//! Un conductor con licencia vencida nunca pasa a ON_DUTY desde el motor.
//! La suspensión automática sólo ocurre en el barrido de mantenimiento.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado del conductor - mapea al ENUM driver_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "driver_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriverStatus {
    OnDuty,
    OffDuty,
    Suspended,
}

impl DriverStatus {
    pub const ALL: [DriverStatus; 3] = [
        DriverStatus::OnDuty,
        DriverStatus::OffDuty,
        DriverStatus::Suspended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::OnDuty => "ON_DUTY",
            DriverStatus::OffDuty => "OFF_DUTY",
            DriverStatus::Suspended => "SUSPENDED",
        }
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub license_number: String,
    pub license_category: String,
    pub license_expiry_date: NaiveDate,
    pub performance_score: Decimal,
    pub trip_completion_rate: Decimal,
    pub status: DriverStatus,
    pub created_at: DateTime<Utc>,
}

impl Driver {
    /// Conductor nuevo en estado ON_DUTY
    pub fn new(name: &str, license_number: &str, license_category: &str, license_expiry_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            license_number: license_number.to_string(),
            license_category: license_category.to_string(),
            license_expiry_date,
            performance_score: Decimal::ONE_HUNDRED,
            trip_completion_rate: Decimal::ONE_HUNDRED,
            status: DriverStatus::OnDuty,
            created_at: Utc::now(),
        }
    }

    /// La licencia sigue vigente el día de la expiración
    pub fn license_expired(&self, today: NaiveDate) -> bool {
        self.license_expiry_date < today
    }
}
