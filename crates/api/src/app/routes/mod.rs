use axum::{
    Router,
    routing::{delete, get, post},
};

pub mod crops;
pub mod stations;
pub mod system;

/// Router for all container-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route(
            "/containers/:container_id/stations/:kind",
            get(stations::get_snapshot).post(stations::commission),
        )
        .route(
            "/containers/:container_id/stations/:kind/provision",
            post(stations::provision),
        )
        .route(
            "/containers/:container_id/stations/:kind/detach",
            post(stations::detach),
        )
        .route(
            "/containers/:container_id/stations/:kind/units/:unit_id/place",
            post(stations::place),
        )
        .route(
            "/containers/:container_id/stations/:kind/units/:unit_id/crops",
            post(crops::seed),
        )
        .route(
            "/containers/:container_id/stations/:kind/crops/:crop_id",
            delete(crops::remove).put(crops::update),
        )
        .route(
            "/containers/:container_id/stations/:kind/crops/:crop_id/transplant",
            post(crops::transplant),
        )
        .route(
            "/containers/:container_id/crops/:crop_id/history",
            get(crops::history).post(crops::record_event),
        )
}
