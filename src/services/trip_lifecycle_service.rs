//! Motor de ciclo de vida de viajes
//!
//! Único punto de escritura de `Trip.status` y de los cambios de estado de
//! vehículo y conductor que acompañan a un viaje. Cada transición:
//!
//! 1. abre una transacción del store y bloquea trip → vehículo → conductor,
//! 2. valida con `trip_rules` sobre esas filas bloqueadas,
//! 3. escribe viaje y activos y hace commit (todo o nada),
//! 4. recién entonces emite el evento (best-effort).
//!
//! Los fallos transitorios del store repiten la transacción completa.

use std::sync::Arc;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::metrics::DispatchMetrics;
use crate::models::{Driver, NewTrip, Trip, TripEvent, TripEventType, TripStatus, Vehicle, VehicleStatus};
use crate::repositories::{FleetStore, FleetTransaction};
use crate::services::notification_service::Notifier;
use crate::services::reservation_guard::ReservationGuard;
use crate::services::retry::{with_retry, RetryConfig};
use crate::services::trip_rules::{self, TripTransition, DISPATCHED_DRIVER_STATUS};
use crate::utils::errors::{not_found_error, AppResult};
use crate::utils::validation::normalize_label;

/// Datos de entrada de `create_trip`
#[derive(Debug, Clone)]
pub struct CreateTripCommand {
    pub vehicle_id: Uuid,
    pub driver_id: Uuid,
    pub cargo_weight: Decimal,
    pub origin: Option<String>,
    pub destination: Option<String>,
    /// Despachador que puede tener reservado el vehículo
    pub dispatcher_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct TripLifecycleService {
    store: Arc<dyn FleetStore>,
    guard: ReservationGuard,
    notifier: Notifier,
    retry: RetryConfig,
    metrics: DispatchMetrics,
}

impl TripLifecycleService {
    pub fn new(
        store: Arc<dyn FleetStore>,
        guard: ReservationGuard,
        notifier: Notifier,
        retry: RetryConfig,
        metrics: DispatchMetrics,
    ) -> Self {
        Self {
            store,
            guard,
            notifier,
            retry,
            metrics,
        }
    }

    /// Crear un viaje en DRAFT.
    ///
    /// Si el vehículo está reservado por otro despachador falla con
    /// `Conflict` sin tocar el store. La reserva del propio llamador se
    /// libera al terminar, haya éxito o no.
    pub async fn create_trip(&self, command: CreateTripCommand) -> AppResult<Trip> {
        let started = Instant::now();

        let result = self.create_trip_guarded(&command).await;

        if let Some(holder_id) = command.dispatcher_id {
            self.guard.release_quietly(command.vehicle_id, holder_id).await;
        }

        self.finish("create", TripEventType::TripCreated, started, result).await
    }

    async fn create_trip_guarded(&self, command: &CreateTripCommand) -> AppResult<Trip> {
        trip_rules::validate_cargo_weight(command.cargo_weight)?;

        self.guard
            .check_not_held_by_other(command.vehicle_id, command.dispatcher_id)
            .await?;

        let draft = NewTrip {
            vehicle_id: command.vehicle_id,
            driver_id: command.driver_id,
            cargo_weight: command.cargo_weight,
            origin: normalize_label(command.origin.clone()),
            destination: normalize_label(command.destination.clone()),
        }
        .into_draft();

        with_retry(&self.retry, "create_trip", || self.insert_draft(&draft)).await
    }

    /// El id se fija antes del primer intento: si un commit se aplicó pero
    /// su respuesta se perdió, el reintento encuentra el viaje y lo devuelve.
    async fn insert_draft(&self, draft: &Trip) -> AppResult<Trip> {
        let mut tx = self.store.begin().await?;

        if let Some(existing) = tx.lock_trip(draft.id).await? {
            debug!(trip_id = %existing.id, "Viaje ya insertado por un intento previo");
            return Ok(existing);
        }

        let vehicle = lock_vehicle(tx.as_mut(), draft.vehicle_id).await?;
        let driver = lock_driver(tx.as_mut(), draft.driver_id).await?;

        trip_rules::check_new_trip(&vehicle, &driver, draft.cargo_weight, today())?;

        tx.insert_trip(draft).await?;
        refresh_completion_rate(tx.as_mut(), &driver).await?;
        tx.commit().await?;

        Ok(draft.clone())
    }

    /// DRAFT → DISPATCHED; el vehículo pasa a ON_TRIP y el conductor a OFF_DUTY
    pub async fn dispatch_trip(&self, trip_id: Uuid) -> AppResult<Trip> {
        let started = Instant::now();
        let result = with_retry(&self.retry, "dispatch_trip", || self.dispatch_once(trip_id)).await;
        self.finish("dispatch", TripEventType::TripDispatched, started, result).await
    }

    async fn dispatch_once(&self, trip_id: Uuid) -> AppResult<Trip> {
        let mut tx = self.store.begin().await?;

        let mut trip = lock_trip(tx.as_mut(), trip_id).await?;
        // Rechazo temprano sin bloquear activos
        trip_rules::next_status(trip.status, TripTransition::Dispatch)?;

        let vehicle = lock_vehicle(tx.as_mut(), trip.vehicle_id).await?;
        let driver = lock_driver(tx.as_mut(), trip.driver_id).await?;

        trip.status = trip_rules::check_dispatch(&trip, &vehicle, &driver, today())?;

        tx.update_trip(&trip).await?;
        tx.update_vehicle_status(vehicle.id, VehicleStatus::OnTrip).await?;
        if driver.status != DISPATCHED_DRIVER_STATUS {
            tx.update_driver_status(driver.id, DISPATCHED_DRIVER_STATUS).await?;
        }
        tx.commit().await?;

        Ok(trip)
    }

    /// DISPATCHED → COMPLETED con lectura final del odómetro
    pub async fn complete_trip(&self, trip_id: Uuid, final_odometer: Decimal) -> AppResult<Trip> {
        let started = Instant::now();
        let result = with_retry(&self.retry, "complete_trip", || {
            self.complete_once(trip_id, final_odometer)
        })
        .await;
        self.finish("complete", TripEventType::TripCompleted, started, result).await
    }

    async fn complete_once(&self, trip_id: Uuid, final_odometer: Decimal) -> AppResult<Trip> {
        let mut tx = self.store.begin().await?;

        let mut trip = lock_trip(tx.as_mut(), trip_id).await?;
        trip_rules::next_status(trip.status, TripTransition::Complete)?;

        let vehicle = lock_vehicle(tx.as_mut(), trip.vehicle_id).await?;
        let driver = lock_driver(tx.as_mut(), trip.driver_id).await?;

        trip.status = trip_rules::check_completion(&trip, &vehicle, final_odometer)?;
        trip.final_odometer = Some(final_odometer);
        trip.completed_at = Some(Utc::now());

        tx.update_trip(&trip).await?;
        tx.update_vehicle_odometer(vehicle.id, final_odometer).await?;
        release_assets(tx.as_mut(), &vehicle, &driver).await?;
        refresh_completion_rate(tx.as_mut(), &driver).await?;
        tx.commit().await?;

        Ok(trip)
    }

    /// DRAFT | DISPATCHED → CANCELLED; libera activos si estaba despachado
    pub async fn cancel_trip(&self, trip_id: Uuid) -> AppResult<Trip> {
        let started = Instant::now();
        let result = with_retry(&self.retry, "cancel_trip", || self.cancel_once(trip_id)).await;
        self.finish("cancel", TripEventType::TripCancelled, started, result).await
    }

    async fn cancel_once(&self, trip_id: Uuid) -> AppResult<Trip> {
        let mut tx = self.store.begin().await?;

        let mut trip = lock_trip(tx.as_mut(), trip_id).await?;
        let previous = trip.status;
        trip.status = trip_rules::next_status(previous, TripTransition::Cancel)?;

        let vehicle = match previous {
            TripStatus::Dispatched => Some(lock_vehicle(tx.as_mut(), trip.vehicle_id).await?),
            _ => None,
        };
        let driver = lock_driver(tx.as_mut(), trip.driver_id).await?;

        tx.update_trip(&trip).await?;
        if let Some(vehicle) = &vehicle {
            release_assets(tx.as_mut(), vehicle, &driver).await?;
        }
        refresh_completion_rate(tx.as_mut(), &driver).await?;
        tx.commit().await?;

        Ok(trip)
    }

    /// Métricas, log y evento post-commit
    async fn finish(
        &self,
        transition: &'static str,
        event_type: TripEventType,
        started: Instant,
        result: AppResult<Trip>,
    ) -> AppResult<Trip> {
        match &result {
            Ok(trip) => {
                self.metrics.record_transition(transition, "ok", started.elapsed());
                info!(
                    trip_id = %trip.id,
                    vehicle_id = %trip.vehicle_id,
                    driver_id = %trip.driver_id,
                    status = %trip.status,
                    "✅ Viaje: {} aplicado",
                    transition
                );
                self.notifier.emit(TripEvent::for_trip(event_type, trip)).await;
            }
            Err(e) => {
                self.metrics.record_transition(transition, e.code(), started.elapsed());
                debug!(transition, code = e.code(), error = %e, "Transición rechazada");
            }
        }
        result
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn lock_trip(tx: &mut dyn FleetTransaction, id: Uuid) -> AppResult<Trip> {
    tx.lock_trip(id).await?.ok_or_else(|| not_found_error("Trip", &id))
}

async fn lock_vehicle(tx: &mut dyn FleetTransaction, id: Uuid) -> AppResult<Vehicle> {
    tx.lock_vehicle(id).await?.ok_or_else(|| not_found_error("Vehicle", &id))
}

async fn lock_driver(tx: &mut dyn FleetTransaction, id: Uuid) -> AppResult<Driver> {
    tx.lock_driver(id).await?.ok_or_else(|| not_found_error("Driver", &id))
}

/// Deshacer los cambios de estado del despacho dentro de la misma transacción
async fn release_assets(tx: &mut dyn FleetTransaction, vehicle: &Vehicle, driver: &Driver) -> AppResult<()> {
    let release = trip_rules::release_assets(vehicle, driver, today());

    if let Some(status) = release.vehicle {
        tx.update_vehicle_status(vehicle.id, status).await?;
    }
    if let Some(status) = release.driver {
        tx.update_driver_status(driver.id, status).await?;
    }
    Ok(())
}

/// Recalcular `trip_completion_rate` con los viajes ya escritos en `tx`
async fn refresh_completion_rate(tx: &mut dyn FleetTransaction, driver: &Driver) -> AppResult<()> {
    let (completed, total) = tx.count_driver_trips(driver.id).await?;
    let rate = trip_rules::completion_rate(completed, total);
    if rate != driver.trip_completion_rate {
        tx.update_driver_completion_rate(driver.id, rate).await?;
    }
    Ok(())
}
