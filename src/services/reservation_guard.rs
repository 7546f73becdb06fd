//! Reserva consultiva de vehículos
//!
//! Mientras un despachador arma un viaje puede reservar el vehículo para
//! que otro despachador no trabaje sobre el mismo. La reserva expira sola
//! tras su TTL. No garantiza exclusividad: eso lo hace la transacción del
//! motor de viajes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::RedisClient;
use crate::utils::errors::{AppError, AppResult};

/// Comprobante de una reserva concedida
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LockToken {
    pub vehicle_id: Uuid,
    pub holder_id: Uuid,
    pub ttl_secs: u64,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReservationBackend: Send + Sync {
    /// true si la reserva quedó a nombre de `holder` (nueva o renovada)
    async fn try_acquire(&self, vehicle_id: Uuid, holder: Uuid, ttl: Duration) -> anyhow::Result<bool>;

    /// true sólo si existía una reserva vigente de `holder` y se borró
    async fn release(&self, vehicle_id: Uuid, holder: Uuid) -> anyhow::Result<bool>;

    async fn holder_of(&self, vehicle_id: Uuid) -> anyhow::Result<Option<Uuid>>;
}

#[async_trait]
impl ReservationBackend for RedisClient {
    async fn try_acquire(&self, vehicle_id: Uuid, holder: Uuid, ttl: Duration) -> anyhow::Result<bool> {
        let key = self.vehicle_lock_key(vehicle_id);
        Ok(self
            .acquire_key(&key, &holder.to_string(), ttl.as_millis() as u64)
            .await?)
    }

    async fn release(&self, vehicle_id: Uuid, holder: Uuid) -> anyhow::Result<bool> {
        let key = self.vehicle_lock_key(vehicle_id);
        Ok(self.release_key(&key, &holder.to_string()).await?)
    }

    async fn holder_of(&self, vehicle_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        let key = self.vehicle_lock_key(vehicle_id);
        match self.get_value(&key).await? {
            Some(raw) => Ok(Some(Uuid::parse_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone)]
struct Reservation {
    holder: Uuid,
    expires_at: Instant,
}

/// Mapa con TTL en memoria; las reservas vencidas se descartan al leerlas
#[derive(Default)]
pub struct InMemoryReservations {
    entries: Mutex<HashMap<Uuid, Reservation>>,
}

impl InMemoryReservations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationBackend for InMemoryReservations {
    async fn try_acquire(&self, vehicle_id: Uuid, holder: Uuid, ttl: Duration) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        if let Some(current) = entries.get(&vehicle_id) {
            if current.expires_at > now && current.holder != holder {
                return Ok(false);
            }
        }

        entries.insert(
            vehicle_id,
            Reservation {
                holder,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, vehicle_id: Uuid, holder: Uuid) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let current = entries.get(&vehicle_id).map(|r| (r.holder, r.expires_at));
        match current {
            Some((_, expires_at)) if expires_at <= now => {
                entries.remove(&vehicle_id);
                Ok(false)
            }
            Some((current_holder, _)) if current_holder == holder => {
                entries.remove(&vehicle_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn holder_of(&self, vehicle_id: Uuid) -> anyhow::Result<Option<Uuid>> {
        let mut entries = self.entries.lock().await;
        let current = entries.get(&vehicle_id).map(|r| (r.holder, r.expires_at));
        match current {
            Some((holder, expires_at)) if expires_at > Instant::now() => Ok(Some(holder)),
            Some(_) => {
                entries.remove(&vehicle_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct ReservationGuard {
    backend: Arc<dyn ReservationBackend>,
    default_ttl: Duration,
}

impl ReservationGuard {
    pub fn new(backend: Arc<dyn ReservationBackend>, default_ttl: Duration) -> Self {
        Self { backend, default_ttl }
    }

    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(InMemoryReservations::new()), default_ttl)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Reservar `vehicle_id` para `holder_id`. Renovar la propia reserva es
    /// válido; si otro holder la tiene vigente devuelve `Conflict`.
    pub async fn acquire(&self, vehicle_id: Uuid, holder_id: Uuid, ttl: Option<Duration>) -> AppResult<LockToken> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl.is_zero() {
            return Err(AppError::InvalidArgument("Reservation TTL must be positive".to_string()));
        }

        let acquired = self
            .backend
            .try_acquire(vehicle_id, holder_id, ttl)
            .await
            .map_err(|e| AppError::Unavailable(format!("Reservation store error: {}", e)))?;

        if !acquired {
            debug!(%vehicle_id, %holder_id, "Reserva rechazada: vehículo reservado por otro despachador");
            return Err(AppError::Conflict(format!(
                "Vehicle {} is currently locked by another dispatcher",
                vehicle_id
            )));
        }

        info!(%vehicle_id, %holder_id, ttl_secs = ttl.as_secs(), "🔒 Vehículo reservado");
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(ttl.as_secs() as i64));

        Ok(LockToken {
            vehicle_id,
            holder_id,
            ttl_secs: ttl.as_secs(),
            expires_at,
        })
    }

    /// false (sin error) si la reserva no existe o es de otro holder
    pub async fn release(&self, vehicle_id: Uuid, holder_id: Uuid) -> AppResult<bool> {
        let released = self
            .backend
            .release(vehicle_id, holder_id)
            .await
            .map_err(|e| AppError::Unavailable(format!("Reservation store error: {}", e)))?;

        if released {
            info!(%vehicle_id, %holder_id, "🔓 Reserva liberada");
        }
        Ok(released)
    }

    pub async fn is_locked(&self, vehicle_id: Uuid) -> AppResult<bool> {
        Ok(self.holder_of(vehicle_id).await?.is_some())
    }

    pub async fn holder_of(&self, vehicle_id: Uuid) -> AppResult<Option<Uuid>> {
        self.backend
            .holder_of(vehicle_id)
            .await
            .map_err(|e| AppError::Unavailable(format!("Reservation store error: {}", e)))
    }

    /// Chequeo previo a crear un viaje: `Conflict` si otro holder tiene la
    /// reserva. Un fallo del backend no bloquea la creación.
    pub(crate) async fn check_not_held_by_other(&self, vehicle_id: Uuid, caller: Option<Uuid>) -> AppResult<()> {
        match self.holder_of(vehicle_id).await {
            Ok(Some(holder)) if Some(holder) != caller => Err(AppError::Conflict(format!(
                "Vehicle {} is locked by another dispatcher",
                vehicle_id
            ))),
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(%vehicle_id, error = %e, "⚠️ Reserva no verificable, se continúa sin ella");
                Ok(())
            }
        }
    }

    /// Liberar la reserva del llamador al terminar una creación
    pub(crate) async fn release_quietly(&self, vehicle_id: Uuid, holder_id: Uuid) {
        if let Err(e) = self.release(vehicle_id, holder_id).await {
            warn!(%vehicle_id, %holder_id, error = %e, "⚠️ No se pudo liberar la reserva");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> ReservationGuard {
        ReservationGuard::in_memory(Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let guard = guard();
        let vehicle = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let token = guard.acquire(vehicle, alice, None).await.unwrap();
        assert_eq!(token.holder_id, alice);
        assert_eq!(token.ttl_secs, 300);

        let err = guard.acquire(vehicle, bob, None).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(guard.is_locked(vehicle).await.unwrap());
    }

    #[tokio::test]
    async fn test_same_holder_can_refresh() {
        let guard = guard();
        let vehicle = Uuid::new_v4();
        let alice = Uuid::new_v4();

        guard.acquire(vehicle, alice, None).await.unwrap();
        let refreshed = guard
            .acquire(vehicle, alice, Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(refreshed.ttl_secs, 60);
    }

    #[tokio::test]
    async fn test_release_only_by_holder() {
        let guard = guard();
        let vehicle = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        guard.acquire(vehicle, alice, None).await.unwrap();
        assert!(!guard.release(vehicle, bob).await.unwrap());
        assert!(guard.is_locked(vehicle).await.unwrap());

        assert!(guard.release(vehicle, alice).await.unwrap());
        assert!(!guard.is_locked(vehicle).await.unwrap());
        assert!(!guard.release(vehicle, alice).await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_expires_without_release() {
        let guard = guard();
        let vehicle = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        guard
            .acquire(vehicle, alice, Some(Duration::from_millis(30)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!guard.is_locked(vehicle).await.unwrap());
        assert!(guard.acquire(vehicle, bob, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let guard = guard();
        let err = guard
            .acquire(Uuid::new_v4(), Uuid::new_v4(), Some(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_is_locked_does_not_mutate() {
        let guard = guard();
        let vehicle = Uuid::new_v4();
        assert!(!guard.is_locked(vehicle).await.unwrap());
        assert!(!guard.is_locked(vehicle).await.unwrap());
        assert!(guard.acquire(vehicle, Uuid::new_v4(), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_not_held_by_other() {
        let guard = guard();
        let vehicle = Uuid::new_v4();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(guard.check_not_held_by_other(vehicle, None).await.is_ok());
        guard.acquire(vehicle, alice, None).await.unwrap();
        assert!(guard.check_not_held_by_other(vehicle, Some(alice)).await.is_ok());
        assert!(matches!(
            guard.check_not_held_by_other(vehicle, Some(bob)).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            guard.check_not_held_by_other(vehicle, None).await,
            Err(AppError::Conflict(_))
        ));
    }
}
