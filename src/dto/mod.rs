//! DTOs de la API
//!
//! Cuerpos de request/response del adaptador HTTP.

pub mod api_response;
pub mod trip_dto;
pub mod vehicle_dto;

pub use api_response::ApiResponse;
