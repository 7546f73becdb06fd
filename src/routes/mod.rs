pub mod driver_routes;
pub mod system_routes;
pub mod trip_routes;
pub mod vehicle_routes;
