//! Store PostgreSQL
//!
//! Las lecturas puras van contra el pool. Dentro de una transacción cada
//! `lock_*` es un `SELECT … FOR UPDATE` y cada escritura comprueba las
//! filas afectadas. El índice parcial `trips_one_dispatched_per_vehicle`
//! respalda el bloqueo de filas: su violación llega como `Conflict`.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::fleet_store::{FleetStore, FleetTransaction};
use crate::models::{Driver, DriverStatus, Trip, TripStatus, Vehicle, VehicleStatus};
use crate::utils::errors::{not_found_error, AppError, AppResult};

const VEHICLE_COLUMNS: &str =
    "id, name, license_plate, max_capacity, odometer, status, created_at";
const DRIVER_COLUMNS: &str = "id, name, license_number, license_category, license_expiry_date, \
     performance_score, trip_completion_rate, status, created_at";
const TRIP_COLUMNS: &str = "id, vehicle_id, driver_id, cargo_weight, origin, destination, status, \
     final_odometer, created_at, completed_at";

/// Store PostgreSQL: cada transición es una transacción con bloqueo de filas
#[derive(Clone)]
pub struct PgFleetStore {
    pool: PgPool,
}

impl PgFleetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FleetStore for PgFleetStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> AppResult<Box<dyn FleetTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgFleetTransaction { tx: Some(tx) }))
    }

    async fn find_vehicle(&self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {} FROM vehicles WHERE id = $1",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(vehicle)
    }

    async fn find_driver(&self, id: Uuid) -> AppResult<Option<Driver>> {
        let driver = sqlx::query_as::<_, Driver>(&format!(
            "SELECT {} FROM drivers WHERE id = $1",
            DRIVER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(driver)
    }

    async fn find_trip(&self, id: Uuid) -> AppResult<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            "SELECT {} FROM trips WHERE id = $1",
            TRIP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(trip)
    }

    async fn list_trips(&self, status: Option<TripStatus>) -> AppResult<Vec<Trip>> {
        let trips = sqlx::query_as::<_, Trip>(&format!(
            "SELECT {} FROM trips WHERE ($1::trip_status IS NULL OR status = $1) ORDER BY created_at DESC",
            TRIP_COLUMNS
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(trips)
    }

    async fn list_available_vehicles(&self) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {} FROM vehicles WHERE status = 'available' ORDER BY license_plate",
            VEHICLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(vehicles)
    }

    async fn list_available_drivers(&self, today: NaiveDate) -> AppResult<Vec<Driver>> {
        let drivers = sqlx::query_as::<_, Driver>(&format!(
            "SELECT {} FROM drivers WHERE status = 'on_duty' AND license_expiry_date >= $1 ORDER BY name",
            DRIVER_COLUMNS
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(drivers)
    }

    async fn suspend_expired_drivers(&self, today: NaiveDate) -> AppResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE drivers
            SET status = 'suspended'
            WHERE license_expiry_date < $1 AND status <> 'suspended'
            RETURNING id
            "#,
        )
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

/// Transacción abierta; si se descarta sin commit sqlx hace rollback
pub struct PgFleetTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgFleetTransaction {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))
    }
}

fn ensure_updated(rows: u64, entity: &str, id: Uuid) -> AppResult<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(not_found_error(entity, &id))
    }
}

#[async_trait]
impl FleetTransaction for PgFleetTransaction {
    async fn lock_trip(&mut self, id: Uuid) -> AppResult<Option<Trip>> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            "SELECT {} FROM trips WHERE id = $1 FOR UPDATE",
            TRIP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(trip)
    }

    async fn lock_vehicle(&mut self, id: Uuid) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(&format!(
            "SELECT {} FROM vehicles WHERE id = $1 FOR UPDATE",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(vehicle)
    }

    async fn lock_driver(&mut self, id: Uuid) -> AppResult<Option<Driver>> {
        let driver = sqlx::query_as::<_, Driver>(&format!(
            "SELECT {} FROM drivers WHERE id = $1 FOR UPDATE",
            DRIVER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.conn()?)
        .await?;

        Ok(driver)
    }

    async fn insert_trip(&mut self, trip: &Trip) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trips (id, vehicle_id, driver_id, cargo_weight, origin, destination, status, final_odometer, created_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(trip.id)
        .bind(trip.vehicle_id)
        .bind(trip.driver_id)
        .bind(trip.cargo_weight)
        .bind(&trip.origin)
        .bind(&trip.destination)
        .bind(trip.status)
        .bind(trip.final_odometer)
        .bind(trip.created_at)
        .bind(trip.completed_at)
        .execute(self.conn()?)
        .await?;

        Ok(())
    }

    async fn update_trip(&mut self, trip: &Trip) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE trips SET status = $2, final_odometer = $3, completed_at = $4 WHERE id = $1",
        )
        .bind(trip.id)
        .bind(trip.status)
        .bind(trip.final_odometer)
        .bind(trip.completed_at)
        .execute(self.conn()?)
        .await?;

        ensure_updated(result.rows_affected(), "Trip", trip.id)
    }

    async fn update_vehicle_status(&mut self, id: Uuid, status: VehicleStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE vehicles SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.conn()?)
            .await?;

        ensure_updated(result.rows_affected(), "Vehicle", id)
    }

    async fn update_vehicle_odometer(&mut self, id: Uuid, odometer: Decimal) -> AppResult<()> {
        let result = sqlx::query("UPDATE vehicles SET odometer = $2 WHERE id = $1")
            .bind(id)
            .bind(odometer)
            .execute(self.conn()?)
            .await?;

        ensure_updated(result.rows_affected(), "Vehicle", id)
    }

    async fn update_driver_status(&mut self, id: Uuid, status: DriverStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE drivers SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(self.conn()?)
            .await?;

        ensure_updated(result.rows_affected(), "Driver", id)
    }

    async fn count_driver_trips(&mut self, driver_id: Uuid) -> AppResult<(i64, i64)> {
        let counts = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*) FILTER (WHERE status = 'completed'), COUNT(*) FROM trips WHERE driver_id = $1",
        )
        .bind(driver_id)
        .fetch_one(self.conn()?)
        .await?;

        Ok(counts)
    }

    async fn update_driver_completion_rate(&mut self, id: Uuid, rate: Decimal) -> AppResult<()> {
        let result = sqlx::query("UPDATE drivers SET trip_completion_rate = $2 WHERE id = $1")
            .bind(id)
            .bind(rate)
            .execute(self.conn()?)
            .await?;

        ensure_updated(result.rows_affected(), "Driver", id)
    }

    async fn commit(&mut self) -> AppResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| AppError::Internal("Transaction already committed".to_string()))?;
        tx.commit().await?;
        Ok(())
    }
}
