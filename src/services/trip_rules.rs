//! Reglas de la máquina de estados de viajes
//!
//! Funciones puras sobre instantáneas ya bloqueadas dentro de la
//! transacción. No tocan el store: el servicio de ciclo de vida decide
//! qué escribir a partir de lo que devuelven.
//!
//! ```text
//! DRAFT ──dispatch──▶ DISPATCHED ──complete──▶ COMPLETED
//!   │                     │
//!   └──────cancel─────────┴──────cancel──────▶ CANCELLED
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{Driver, DriverStatus, Trip, TripStatus, Vehicle, VehicleStatus};
use crate::utils::errors::{AppError, AppResult};

/// Estado del conductor mientras su viaje está DISPATCHED
pub const DISPATCHED_DRIVER_STATUS: DriverStatus = DriverStatus::OffDuty;

/// Decimales admitidos en pesos y odómetros (columnas NUMERIC(12, 2))
pub const QUANTITY_SCALE: u32 = 2;

/// Cota superior exclusiva de pesos y odómetros: 10^10
pub const QUANTITY_LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripTransition {
    Dispatch,
    Complete,
    Cancel,
}

impl TripTransition {
    pub const ALL: [TripTransition; 3] = [
        TripTransition::Dispatch,
        TripTransition::Complete,
        TripTransition::Cancel,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TripTransition::Dispatch => "dispatch",
            TripTransition::Complete => "complete",
            TripTransition::Cancel => "cancel",
        }
    }

    /// Estados de origen aceptados
    pub fn allowed_from(&self) -> &'static [TripStatus] {
        match self {
            TripTransition::Dispatch => &[TripStatus::Draft],
            TripTransition::Complete => &[TripStatus::Dispatched],
            TripTransition::Cancel => &[TripStatus::Draft, TripStatus::Dispatched],
        }
    }

    pub fn target(&self) -> TripStatus {
        match self {
            TripTransition::Dispatch => TripStatus::Dispatched,
            TripTransition::Complete => TripStatus::Completed,
            TripTransition::Cancel => TripStatus::Cancelled,
        }
    }
}

/// Estado siguiente o `InvalidState`; las transiciones no son idempotentes
pub fn next_status(current: TripStatus, transition: TripTransition) -> AppResult<TripStatus> {
    if transition.allowed_from().contains(&current) {
        Ok(transition.target())
    } else {
        Err(AppError::InvalidState(format!(
            "Cannot {} a trip in {} state",
            transition.name(),
            current
        )))
    }
}

/// Cantidad representable tal cual en el esquema: a lo sumo dos
/// decimales significativos y menor que 10^10
pub fn validate_quantity(field: &str, value: Decimal) -> AppResult<()> {
    if value.normalize().scale() > QUANTITY_SCALE {
        return Err(AppError::InvalidArgument(format!(
            "{} allows at most {} decimal places, got {}",
            field, QUANTITY_SCALE, value
        )));
    }
    if value.abs() >= QUANTITY_LIMIT {
        return Err(AppError::InvalidArgument(format!(
            "{} must be below {}, got {}",
            field, QUANTITY_LIMIT, value
        )));
    }
    Ok(())
}

pub fn validate_cargo_weight(cargo_weight: Decimal) -> AppResult<()> {
    if cargo_weight <= Decimal::ZERO {
        return Err(AppError::InvalidArgument(format!(
            "Cargo weight must be positive, got {}",
            cargo_weight
        )));
    }
    validate_quantity("Cargo weight", cargo_weight)
}

/// Precondiciones de `createTrip` una vez bloqueados vehículo y conductor.
/// La licencia vencida se rechaza antes que cualquier chequeo de estado.
pub fn check_new_trip(
    vehicle: &Vehicle,
    driver: &Driver,
    cargo_weight: Decimal,
    today: NaiveDate,
) -> AppResult<()> {
    validate_cargo_weight(cargo_weight)?;

    if driver.license_expired(today) {
        return Err(AppError::InvalidArgument(format!(
            "Driver license {} expired on {}",
            driver.license_number, driver.license_expiry_date
        )));
    }

    if !vehicle.is_available() {
        return Err(AppError::Conflict(format!(
            "Vehicle {} is not available (status: {})",
            vehicle.license_plate, vehicle.status
        )));
    }

    if driver.status != DriverStatus::OnDuty {
        return Err(AppError::Conflict(format!(
            "Driver {} is not on duty (status: {})",
            driver.name, driver.status
        )));
    }

    if cargo_weight > vehicle.max_capacity {
        return Err(AppError::InvalidArgument(format!(
            "Cargo weight ({}) exceeds vehicle capacity ({})",
            cargo_weight, vehicle.max_capacity
        )));
    }

    Ok(())
}

/// Precondiciones de `dispatchTrip`
pub fn check_dispatch(trip: &Trip, vehicle: &Vehicle, driver: &Driver, today: NaiveDate) -> AppResult<TripStatus> {
    let next = next_status(trip.status, TripTransition::Dispatch)?;

    if !vehicle.is_available() {
        return Err(AppError::InvalidState(format!(
            "Vehicle {} is no longer available (status: {})",
            vehicle.license_plate, vehicle.status
        )));
    }

    if driver.status != DriverStatus::OnDuty {
        return Err(AppError::InvalidState(format!(
            "Driver {} is no longer on duty (status: {})",
            driver.name, driver.status
        )));
    }

    if driver.license_expired(today) {
        return Err(AppError::InvalidArgument(format!(
            "Driver license {} expired on {}",
            driver.license_number, driver.license_expiry_date
        )));
    }

    if trip.cargo_weight > vehicle.max_capacity {
        return Err(AppError::InvalidArgument(format!(
            "Cargo weight ({}) exceeds vehicle capacity ({})",
            trip.cargo_weight, vehicle.max_capacity
        )));
    }

    Ok(next)
}

/// Precondiciones de `completeTrip`
pub fn check_completion(trip: &Trip, vehicle: &Vehicle, final_odometer: Decimal) -> AppResult<TripStatus> {
    let next = next_status(trip.status, TripTransition::Complete)?;

    if final_odometer <= Decimal::ZERO {
        return Err(AppError::InvalidArgument(format!(
            "Final odometer must be positive, got {}",
            final_odometer
        )));
    }
    validate_quantity("Final odometer", final_odometer)?;

    if final_odometer < vehicle.odometer {
        return Err(AppError::InvalidArgument(format!(
            "Final odometer ({}) is below the vehicle's last reading ({})",
            final_odometer, vehicle.odometer
        )));
    }

    Ok(next)
}

/// Escrituras de liberación al salir de DISPATCHED; `None` = no tocar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRelease {
    pub vehicle: Option<VehicleStatus>,
    pub driver: Option<DriverStatus>,
}

/// Sólo se deshace lo que puso el despacho: un vehículo que un colaborador
/// mandó a taller sigue en taller y un conductor suspendido sigue suspendido.
/// Con licencia vencida el conductor queda OFF_DUTY.
pub fn release_assets(vehicle: &Vehicle, driver: &Driver, today: NaiveDate) -> AssetRelease {
    let vehicle_status = (vehicle.status == VehicleStatus::OnTrip).then_some(VehicleStatus::Available);

    let driver_status = match driver.status {
        DriverStatus::Suspended => None,
        _ if driver.license_expired(today) => {
            (driver.status != DriverStatus::OffDuty).then_some(DriverStatus::OffDuty)
        }
        DISPATCHED_DRIVER_STATUS => Some(DriverStatus::OnDuty),
        _ => None,
    };

    AssetRelease {
        vehicle: vehicle_status,
        driver: driver_status,
    }
}

/// Porcentaje de viajes completados sobre el total del conductor.
/// Sin viajes el conductor conserva el 100.
pub fn completion_rate(completed: i64, total: i64) -> Decimal {
    if total <= 0 {
        return Decimal::ONE_HUNDRED;
    }
    (Decimal::from(completed) * Decimal::ONE_HUNDRED / Decimal::from(total)).round_dp(QUANTITY_SCALE)
}
