//! Repositorios
//!
//! Persistencia de vehículos, conductores y viajes detrás del contrato
//! transaccional `FleetStore`.

pub mod fleet_store;
pub mod memory_fleet_store;
pub mod pg_fleet_store;

pub use fleet_store::{FleetStore, FleetTransaction};
pub use memory_fleet_store::InMemoryFleetStore;
pub use pg_fleet_store::PgFleetStore;
