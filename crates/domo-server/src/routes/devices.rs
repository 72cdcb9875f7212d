//! Device (lamp) CRUD routes backed by the [`DeviceStore`](domo_store::DeviceStore).

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use domo_core::{Device, DeviceUpdate, NewDevice};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Envelope;
use crate::errors::ApiError;
use crate::server::AppState;

/// Default page size for `GET /device/`.
pub const DEFAULT_LIMIT: u32 = 100;

/// Paging parameters for `GET /device/`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Paging {
    /// Records to skip.
    #[serde(default)]
    pub skip: u32,
    /// Maximum records returned.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

/// Body of `DELETE /device/{id}`.
#[derive(Debug, Serialize)]
pub struct Deleted {
    /// Confirmation text.
    pub message: String,
}

/// POST /device/
pub async fn create(
    State(state): State<AppState>,
    body: Result<Json<NewDevice>, JsonRejection>,
) -> Result<Json<Envelope<Device>>, ApiError> {
    let Json(new_device) = body?;
    let device = state.devices.create(new_device).await?;
    info!(device_id = device.id, status = device.status, "device created");
    Ok(Json(Envelope::new(device, "Device created")))
}

/// GET /device/
///
/// An empty page is a 404, which existing clients rely on.
pub async fn list(
    State(state): State<AppState>,
    paging: Result<Query<Paging>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Device>>>, ApiError> {
    let Query(paging) = paging?;
    let devices = state.devices.list(paging.skip, paging.limit).await?;
    if devices.is_empty() {
        return Err(ApiError::NotFound("no devices found".into()));
    }
    Ok(Json(Envelope::new(devices, "Devices")))
}

/// GET /device/{id}
pub async fn get(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Envelope<Device>>, ApiError> {
    let Path(id) = id?;
    let device = state.devices.get(id).await?;
    Ok(Json(Envelope::new(device, format!("Device {id}"))))
}

/// PUT /device/{id}
pub async fn update(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<DeviceUpdate>, JsonRejection>,
) -> Result<Json<Envelope<Device>>, ApiError> {
    let Path(id) = id?;
    let Json(update) = body?;
    let device = state.devices.update(id, update).await?;
    info!(device_id = id, status = device.status, "device updated");
    Ok(Json(Envelope::new(device, format!("Device {id} updated"))))
}

/// DELETE /device/{id}
pub async fn delete(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Deleted>, ApiError> {
    let Path(id) = id?;
    state.devices.delete(id).await?;
    info!(device_id = id, "device deleted");
    Ok(Json(Deleted {
        message: format!("Device {id} deleted"),
    }))
}

/// POST /device/toggle/
///
/// Appends a record with the negated status of the latest one and returns
/// the bare record.
pub async fn toggle(State(state): State<AppState>) -> Result<Json<Device>, ApiError> {
    let device = state.devices.toggle_latest().await?;
    info!(device_id = device.id, status = device.status, "device toggled");
    Ok(Json(device))
}
