//! Fleet Dispatch - motor de ciclo de vida de viajes
//!
//! Crea viajes, los despacha, completa y cancela moviendo vehículos y
//! conductores en la misma transacción. Expone una API HTTP con axum.

pub mod app;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use app::{build_state, create_app};
pub use state::AppState;
