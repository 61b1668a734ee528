use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use farmops_inventory::{CropId, DateRange, InventoryError, RemovalReason, StorageUnitId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

fn parse_crop_id(s: &str) -> Result<CropId, axum::response::Response> {
    CropId::parse(s).map_err(|e| errors::inventory_error_to_response(InventoryError::Domain(e)))
}

pub async fn seed(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind, unit_id)): Path<(String, String, String)>,
    Json(body): Json<dto::SeedCropRequest>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let unit_id: StorageUnitId = match unit_id.parse() {
        Ok(id) => id,
        Err(e) => return errors::inventory_error_to_response(InventoryError::Domain(e)),
    };

    let (crop, note) = body.into_crop(services.clock.now().date_naive());
    match services.inventory.seed_crop(&key, unit_id, crop, note) {
        Ok(crop) => (StatusCode::CREATED, Json(crop)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind, crop_id)): Path<(String, String, String)>,
    Json(body): Json<dto::UpdateCropRequest>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let crop_id = match parse_crop_id(&crop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.inventory.update_crop(&key, crop_id, body.observation, body.note) {
        Ok(crop) => (StatusCode::OK, Json(crop)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn transplant(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind, crop_id)): Path<(String, String, String)>,
    Json(body): Json<dto::TransplantCropRequest>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let crop_id = match parse_crop_id(&crop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .inventory
        .transplant_crop(&key, crop_id, body.to_unit, body.to_position, body.note)
    {
        Ok(crop) => (StatusCode::OK, Json(crop)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Harvest (default) or dispose of a crop.
pub async fn remove(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, kind, crop_id)): Path<(String, String, String)>,
    Query(query): Query<dto::RemoveCropQuery>,
) -> axum::response::Response {
    let key = match errors::parse_station_key(&container_id, &kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let crop_id = match parse_crop_id(&crop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let reason = query.reason.unwrap_or(RemovalReason::Harvested);

    match services.inventory.remove_crop(&key, crop_id, reason, query.note) {
        Ok(crop) => (
            StatusCode::OK,
            Json(serde_json::json!({ "reason": reason, "crop": crop })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn history(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, crop_id)): Path<(String, String)>,
    Query(query): Query<dto::HistoryQuery>,
) -> axum::response::Response {
    let container_id = match errors::parse_container_id(&container_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let crop_id = match parse_crop_id(&crop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let (start_date, end_date) = match (
        errors::parse_date("start_date", query.start_date.as_deref()),
        errors::parse_date("end_date", query.end_date.as_deref()),
    ) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };

    match services.inventory.query_crop_history(
        &container_id,
        &crop_id,
        DateRange::new(start_date, end_date),
    ) {
        Ok(events) => (
            StatusCode::OK,
            Json(dto::CropHistoryResponse {
                crop_id,
                start_date,
                end_date,
                events,
            }),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn record_event(
    Extension(services): Extension<Arc<AppServices>>,
    Path((container_id, crop_id)): Path<(String, String)>,
    Json(body): Json<dto::RecordCropEventRequest>,
) -> axum::response::Response {
    let container_id = match errors::parse_container_id(&container_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let crop_id = match parse_crop_id(&crop_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let event = body.into_event(crop_id, services.clock.now());
    match services.inventory.record_crop_event(&container_id, event.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(event)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
