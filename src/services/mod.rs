//! Services module
//!
//! Este módulo contiene la lógica de negocio: el motor de ciclo de vida
//! de viajes, sus reglas puras, la reserva consultiva de vehículos, la
//! publicación de eventos y las lecturas de la flota.

pub mod fleet_query_service;
pub mod notification_service;
pub mod reservation_guard;
pub mod retry;
pub mod trip_lifecycle_service;
pub mod trip_rules;

pub use fleet_query_service::{FleetQueryService, SyncExpiredLicensesResult};
pub use notification_service::{BroadcastSink, FanoutSink, NotificationSink, Notifier, RedisNotificationSink};
pub use reservation_guard::{InMemoryReservations, LockToken, ReservationBackend, ReservationGuard};
pub use retry::{with_retry, RetryConfig};
pub use trip_lifecycle_service::{CreateTripCommand, TripLifecycleService};
