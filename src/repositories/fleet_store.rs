//! Contrato de persistencia de la flota
//!
//! `FleetStore` expone las lecturas puras del registro de activos y abre
//! transacciones. Dentro de una `FleetTransaction` las filas se bloquean
//! (`lock_*`) antes de escribirlas y nada es visible para otros lectores
//! hasta `commit`. Si la transacción se descarta sin commit, se revierte.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Driver, DriverStatus, Trip, TripStatus, Vehicle, VehicleStatus};
use crate::utils::errors::AppResult;

#[async_trait]
pub trait FleetStore: Send + Sync {
    /// Nombre corto del backend para logs y health
    fn backend_name(&self) -> &'static str;

    async fn begin(&self) -> AppResult<Box<dyn FleetTransaction>>;

    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>>;

    async fn find_driver(&self, id: Uuid) -> AppResult<Option<Driver>>;

    async fn find_trip(&self, id: Uuid) -> AppResult<Option<Trip>>;

    async fn list_trips(&self, status: Option<TripStatus>) -> AppResult<Vec<Trip>>;

    async fn list_available_vehicles(&self) -> AppResult<Vec<Vehicle>>;

    /// Conductores ON_DUTY con licencia vigente a `today`
    async fn list_available_drivers(&self, today: NaiveDate) -> AppResult<Vec<Driver>>;

    /// Suspender conductores con licencia vencida; devuelve los ids afectados
    async fn suspend_expired_drivers(&self, today: NaiveDate) -> AppResult<Vec<Uuid>>;
}

#[async_trait]
pub trait FleetTransaction: Send {
    async fn lock_trip(&mut self, id: Uuid) -> AppResult<Option<Trip>>;

    async fn lock_vehicle(&mut self, id: Uuid) -> AppResult<Option<Vehicle>>;

    async fn lock_driver(&mut self, id: Uuid) -> AppResult<Option<Driver>>;

    async fn insert_trip(&mut self, trip: &Trip) -> AppResult<()>;

    /// Persistir status, final_odometer y completed_at del viaje
    async fn update_trip(&mut self, trip: &Trip) -> AppResult<()>;

    async fn update_vehicle_status(&mut self, id: Uuid, status: VehicleStatus) -> AppResult<()>;

    async fn update_vehicle_odometer(&mut self, id: Uuid, odometer: Decimal) -> AppResult<()>;

    async fn update_driver_status(&mut self, id: Uuid, status: DriverStatus) -> AppResult<()>;

    /// `(completados, total)` de los viajes del conductor, incluyendo lo
    /// escrito en esta transacción
    async fn count_driver_trips(&mut self, driver_id: Uuid) -> AppResult<(i64, i64)>;

    async fn update_driver_completion_rate(&mut self, id: Uuid, rate: Decimal) -> AppResult<()>;

    async fn commit(&mut self) -> AppResult<()>;
}
