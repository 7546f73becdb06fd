//! Controllers
//!
//! Traducen requests HTTP a llamadas del motor de viajes y de las lecturas.

pub mod driver_controller;
pub mod trip_controller;
pub mod vehicle_controller;
