use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use farmops_inventory::StorageUnitId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn commission(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind)): Path<(String, String)>,
    Json(body): Json<dto::CommissionStationRequest>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.inventory.commission_station(&key, body.racks) {
        Ok(report) => (StatusCode::CREATED, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind)): Path<(String, String)>,
    Query(query): Query<dto::SnapshotQuery>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let as_of = match errors::parse_date("date", query.date.as_deref()) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match services.inventory.station_snapshot(&key, as_of) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn provision(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind)): Path<(String, String)>,
    Json(body): Json<dto::ProvisionRequest>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services
        .inventory
        .provision_storage_unit(&key, body.slot.into(), body.rfid_tag, body.notes)
    {
        Ok(result) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "stage": result.stage(),
                "unit": result.unit,
                "slot": result.slot,
                "location": result.location,
                "created_at": result.created_at,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn detach(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind)): Path<(String, String)>,
    Json(body): Json<dto::DetachRequest>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match services.inventory.detach_storage_unit(&key, body.slot.into()) {
        Ok(unit) => (StatusCode::OK, Json(unit)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn place(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind, unit_id)): Path<(String, String, String)>,
    Json(body): Json<dto::PlaceRequest>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let unit_id: StorageUnitId = match unit_id.parse() {
        Ok(id) => id,
        Err(e) => {
            return errors::inventory_error_to_response(
                farmops_inventory::InventoryError::Domain(e),
            );
        }
    };

    match services.inventory.place_storage_unit(&key, unit_id, body.slot.into()) {
        Ok(unit) => (StatusCode::OK, Json(unit)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
