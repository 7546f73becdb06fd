//! Store en memoria
//!
//! Una transacción toma el mutex global durante toda su vida y trabaja
//! sobre una copia; `commit` reemplaza las tablas de una sola vez. Las
//! transacciones quedan serializadas y ningún lector ve estados parciales.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::fleet_store::{FleetStore, FleetTransaction};
use crate::models::{Driver, DriverStatus, Trip, TripStatus, Vehicle, VehicleStatus};
use crate::utils::errors::{not_found_error, AppError, AppResult};

#[derive(Debug, Clone, Default)]
struct FleetTables {
    vehicles: HashMap<Uuid, Vehicle>,
    drivers: HashMap<Uuid, Driver>,
    trips: HashMap<Uuid, Trip>,
}

#[derive(Clone, Default)]
pub struct InMemoryFleetStore {
    tables: Arc<Mutex<FleetTables>>,
    injected_failures: Arc<AtomicU32>,
    lost_commits: Arc<AtomicU32>,
}

impl InMemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Alta de vehículo (el registro de activos es externo al motor)
    pub async fn insert_vehicle(&self, vehicle: Vehicle) -> AppResult<Vehicle> {
        let mut tables = self.tables.lock().await;
        if tables
            .vehicles
            .values()
            .any(|v| v.license_plate == vehicle.license_plate)
        {
            return Err(AppError::Conflict(format!(
                "License plate '{}' already registered",
                vehicle.license_plate
            )));
        }
        tables.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    pub async fn insert_driver(&self, driver: Driver) -> AppResult<Driver> {
        let mut tables = self.tables.lock().await;
        if tables
            .drivers
            .values()
            .any(|d| d.license_number == driver.license_number)
        {
            return Err(AppError::Conflict(format!(
                "License number '{}' already registered",
                driver.license_number
            )));
        }
        tables.drivers.insert(driver.id, driver.clone());
        Ok(driver)
    }

    /// Cambio de estado hecho por un colaborador (taller, seguridad)
    pub async fn set_vehicle_status(&self, id: Uuid, status: VehicleStatus) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let vehicle = tables
            .vehicles
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Vehicle", &id))?;
        vehicle.status = status;
        Ok(())
    }

    pub async fn set_driver_status(&self, id: Uuid, status: DriverStatus) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        let driver = tables
            .drivers
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Driver", &id))?;
        driver.status = status;
        Ok(())
    }

    /// Hace que los próximos `count` intentos de abrir transacción fallen
    /// como fallo transitorio del store
    pub fn inject_transient_failures(&self, count: u32) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    /// Los próximos `count` commits se aplican pero informan un fallo
    /// transitorio, como una conexión caída antes de la respuesta
    pub fn inject_lost_commits(&self, count: u32) {
        self.lost_commits.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> bool {
        take_one(&self.injected_failures)
    }
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl FleetStore for InMemoryFleetStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> AppResult<Box<dyn FleetTransaction>> {
        if self.take_injected_failure() {
            return Err(AppError::Unavailable("could not serialize access".to_string()));
        }
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard: Some(guard),
            staged,
            lost_commits: self.lost_commits.clone(),
        }))
    }

    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        Ok(self.tables.lock().await.vehicles.get(&id).cloned())
    }

    async fn find_driver(&self, id: Uuid) -> AppResult<Option<Driver>> {
        Ok(self.tables.lock().await.drivers.get(&id).cloned())
    }

    async fn find_trip(&self, id: Uuid) -> AppResult<Option<Trip>> {
        Ok(self.tables.lock().await.trips.get(&id).cloned())
    }

    async fn list_trips(&self, status: Option<TripStatus>) -> AppResult<Vec<Trip>> {
        let tables = self.tables.lock().await;
        let mut trips: Vec<Trip> = tables
            .trips
            .values()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trips)
    }

    async fn list_available_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        let tables = self.tables.lock().await;
        let mut vehicles: Vec<Vehicle> = tables
            .vehicles
            .values()
            .filter(|v| v.status == VehicleStatus::Available)
            .cloned()
            .collect();
        vehicles.sort_by(|a, b| a.license_plate.cmp(&b.license_plate));
        Ok(vehicles)
    }

    async fn list_available_drivers(&self, today: NaiveDate) -> AppResult<Vec<Driver>> {
        let tables = self.tables.lock().await;
        let mut drivers: Vec<Driver> = tables
            .drivers
            .values()
            .filter(|d| d.status == DriverStatus::OnDuty && !d.license_expired(today))
            .cloned()
            .collect();
        drivers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(drivers)
    }

    async fn suspend_expired_drivers(&self, today: NaiveDate) -> AppResult<Vec<Uuid>> {
        let mut tables = self.tables.lock().await;
        let mut suspended = Vec::new();
        for driver in tables.drivers.values_mut() {
            if driver.license_expired(today) && driver.status != DriverStatus::Suspended {
                driver.status = DriverStatus::Suspended;
                suspended.push(driver.id);
            }
        }
        Ok(suspended)
    }
}

pub struct InMemoryTransaction {
    guard: Option<OwnedMutexGuard<FleetTables>>,
    staged: FleetTables,
    lost_commits: Arc<AtomicU32>,
}

impl InMemoryTransaction {
    fn ensure_open(&self) -> AppResult<()> {
        if self.guard.is_none() {
            return Err(AppError::Internal("Transaction already committed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FleetTransaction for InMemoryTransaction {
    async fn lock_trip(&mut self, id: Uuid) -> AppResult<Option<Trip>> {
        self.ensure_open()?;
        Ok(self.staged.trips.get(&id).cloned())
    }

    async fn lock_vehicle(&mut self, id: Uuid) -> AppResult<Option<Vehicle>> {
        self.ensure_open()?;
        Ok(self.staged.vehicles.get(&id).cloned())
    }

    async fn lock_driver(&mut self, id: Uuid) -> AppResult<Option<Driver>> {
        self.ensure_open()?;
        Ok(self.staged.drivers.get(&id).cloned())
    }

    async fn insert_trip(&mut self, trip: &Trip) -> AppResult<()> {
        self.ensure_open()?;
        // Mismo efecto que el índice parcial único de PostgreSQL
        if trip.status == TripStatus::Dispatched
            && self
                .staged
                .trips
                .values()
                .any(|t| t.vehicle_id == trip.vehicle_id && t.status == TripStatus::Dispatched)
        {
            return Err(AppError::Conflict(format!(
                "Vehicle {} already has a dispatched trip",
                trip.vehicle_id
            )));
        }
        self.staged.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn update_trip(&mut self, trip: &Trip) -> AppResult<()> {
        self.ensure_open()?;
        if trip.status == TripStatus::Dispatched
            && self.staged.trips.values().any(|t| {
                t.id != trip.id
                    && t.vehicle_id == trip.vehicle_id
                    && t.status == TripStatus::Dispatched
            })
        {
            return Err(AppError::Conflict(format!(
                "Vehicle {} already has a dispatched trip",
                trip.vehicle_id
            )));
        }
        let stored = self
            .staged
            .trips
            .get_mut(&trip.id)
            .ok_or_else(|| not_found_error("Trip", &trip.id))?;
        stored.status = trip.status;
        stored.final_odometer = trip.final_odometer;
        stored.completed_at = trip.completed_at;
        Ok(())
    }

    async fn update_vehicle_status(&mut self, id: Uuid, status: VehicleStatus) -> AppResult<()> {
        self.ensure_open()?;
        let vehicle = self
            .staged
            .vehicles
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Vehicle", &id))?;
        vehicle.status = status;
        Ok(())
    }

    async fn update_vehicle_odometer(&mut self, id: Uuid, odometer: Decimal) -> AppResult<()> {
        self.ensure_open()?;
        let vehicle = self
            .staged
            .vehicles
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Vehicle", &id))?;
        vehicle.odometer = odometer;
        Ok(())
    }

    async fn update_driver_status(&mut self, id: Uuid, status: DriverStatus) -> AppResult<()> {
        self.ensure_open()?;
        let driver = self
            .staged
            .drivers
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Driver", &id))?;
        driver.status = status;
        Ok(())
    }

    async fn count_driver_trips(&mut self, driver_id: Uuid) -> AppResult<(i64, i64)> {
        self.ensure_open()?;
        let counts = self
            .staged
            .trips
            .values()
            .filter(|t| t.driver_id == driver_id)
            .fold((0, 0), |(completed, total), t| {
                let done = i64::from(t.status == TripStatus::Completed);
                (completed + done, total + 1)
            });
        Ok(counts)
    }

    async fn update_driver_completion_rate(&mut self, id: Uuid, rate: Decimal) -> AppResult<()> {
        self.ensure_open()?;
        let driver = self
            .staged
            .drivers
            .get_mut(&id)
            .ok_or_else(|| not_found_error("Driver", &id))?;
        driver.trip_completion_rate = rate;
        Ok(())
    }

    async fn commit(&mut self) -> AppResult<()> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))?;
        *guard = std::mem::take(&mut self.staged);
        if take_one(&self.lost_commits) {
            return Err(AppError::Unavailable("connection reset after commit".to_string()));
        }
        Ok(())
    }
}
