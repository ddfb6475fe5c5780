// libs/doctor-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{DoctorError, SlotQuery};
use crate::services::availability::SlotResolverService;
use crate::services::doctor::DoctorDirectoryService;

/// Bookable slot labels for a doctor on a date. An empty list is a normal
/// answer for a day the doctor does not work.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let resolver = SlotResolverService::new(&state);

    let slots = resolver
        .available_slots(doctor_id, query.date, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "date": query.date,
        "slots": slots
    })))
}

/// Public directory projection used by booking screens.
#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let directory = DoctorDirectoryService::new(&state);

    let doctor = directory
        .get_doctor(doctor_id, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "doctor": {
            "id": doctor.id,
            "full_name": doctor.full_name,
            "consultation_fee": doctor.consultation_fee,
            "weekly_availability": doctor.weekly_availability,
            "is_bookable": doctor.is_bookable()
        }
    })))
}

fn map_doctor_error(err: DoctorError) -> AppError {
    match err {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::Database(msg) => AppError::Database(msg),
    }
}
