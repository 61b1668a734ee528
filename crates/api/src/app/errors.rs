use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDate;
use serde_json::json;

use farmops_core::{ContainerId, DomainError};
use farmops_infra::ServiceError;
use farmops_inventory::{InventoryError, StationKey, StationKind};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let code = err.code();
    match err {
        ServiceError::Rejected(e) => inventory_error_to_response(e),
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, code, msg),
        ServiceError::Internal(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, code, "internal error")
        }
    }
}

pub fn inventory_error_to_response(err: InventoryError) -> axum::response::Response {
    let status = match &err {
        InventoryError::Validation { .. }
        | InventoryError::Domain(DomainError::Validation(_))
        | InventoryError::Domain(DomainError::InvalidId(_)) => StatusCode::BAD_REQUEST,
        InventoryError::NotFound(_) | InventoryError::Domain(DomainError::NotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        InventoryError::SlotOccupied(_)
        | InventoryError::AlreadyOccupied(_)
        | InventoryError::SlotEmpty(_)
        | InventoryError::DuplicateRfid(_)
        | InventoryError::Domain(DomainError::Conflict(_)) => StatusCode::CONFLICT,
        InventoryError::InvalidOrder { .. }
        | InventoryError::MalformedSnapshot(_)
        | InventoryError::Domain(DomainError::InvariantViolation(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    json_error(status, err.code(), err.to_string())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_container_id(s: &str) -> Result<ContainerId, axum::response::Response> {
    ContainerId::parse(s).map_err(|e| inventory_error_to_response(e.into()))
}

pub fn parse_station_key(
    container_id: &str,
    kind: &str,
) -> Result<StationKey, axum::response::Response> {
    let container_id = parse_container_id(container_id)?;
    let kind: StationKind = kind.parse().map_err(inventory_error_to_response)?;
    Ok(StationKey::new(container_id, kind))
}

pub fn parse_date(
    field: &'static str,
    s: Option<&str>,
) -> Result<Option<NaiveDate>, axum::response::Response> {
    match s.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(Some).map_err(|_| {
            inventory_error_to_response(InventoryError::validation(
                field,
                format!("must be a YYYY-MM-DD date (got '{raw}')"),
            ))
        }),
    }
}
