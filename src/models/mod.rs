//! Modelos del sistema
//!
//! Este módulo contiene el schema canónico de la flota: vehículos,
//! conductores, viajes y los eventos de ciclo de vida.

pub mod driver;
pub mod event;
pub mod trip;
pub mod vehicle;

pub use driver::{Driver, DriverStatus};
pub use event::{TripEvent, TripEventType};
pub use trip::{NewTrip, Trip, TripStatus};
pub use vehicle::{Vehicle, VehicleStatus};
