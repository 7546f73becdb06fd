//! Lecturas de la flota y barrido de licencias vencidas
//!
//! Las consultas nunca escriben. La suspensión automática de conductores
//! sólo ocurre en `sync_expired_licenses`, invocado explícitamente.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{Driver, Trip, TripStatus, Vehicle};
use crate::repositories::FleetStore;
use crate::services::retry::{with_retry, RetryConfig};
use crate::utils::errors::{not_found_error, AppResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncExpiredLicensesResult {
    pub suspended_count: usize,
    pub driver_ids: Vec<Uuid>,
}

#[derive(Clone)]
pub struct FleetQueryService {
    store: Arc<dyn FleetStore>,
    retry: RetryConfig,
}

impl FleetQueryService {
    pub fn new(store: Arc<dyn FleetStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> AppResult<Trip> {
        with_retry(&self.retry, "get_trip", || self.store.find_trip(trip_id))
            .await?
            .ok_or_else(|| not_found_error("Trip", &trip_id))
    }

    /// Más recientes primero
    pub async fn list_trips(&self, status: Option<TripStatus>) -> AppResult<Vec<Trip>> {
        with_retry(&self.retry, "list_trips", || self.store.list_trips(status)).await
    }

    pub async fn list_available_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        with_retry(&self.retry, "list_available_vehicles", || {
            self.store.list_available_vehicles()
        })
        .await
    }

    /// ON_DUTY y con licencia vigente hoy
    pub async fn list_available_drivers(&self) -> AppResult<Vec<Driver>> {
        self.list_available_drivers_on(today()).await
    }

    pub async fn list_available_drivers_on(&self, date: NaiveDate) -> AppResult<Vec<Driver>> {
        with_retry(&self.retry, "list_available_drivers", || {
            self.store.list_available_drivers(date)
        })
        .await
    }

    /// Suspender todo conductor con licencia vencida que no lo esté ya.
    /// Incluye conductores con viaje DISPATCHED: el cierre del viaje no
    /// revierte la suspensión.
    pub async fn sync_expired_licenses(&self) -> AppResult<SyncExpiredLicensesResult> {
        self.sync_expired_licenses_on(today()).await
    }

    pub async fn sync_expired_licenses_on(&self, date: NaiveDate) -> AppResult<SyncExpiredLicensesResult> {
        let driver_ids = with_retry(&self.retry, "sync_expired_licenses", || {
            self.store.suspend_expired_drivers(date)
        })
        .await?;

        if driver_ids.is_empty() {
            info!("🪪 Licencias al día, ningún conductor suspendido");
        } else {
            warn!(count = driver_ids.len(), ?driver_ids, "🪪 Conductores suspendidos por licencia vencida");
        }

        Ok(SyncExpiredLicensesResult {
            suspended_count: driver_ids.len(),
            driver_ids,
        })
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
