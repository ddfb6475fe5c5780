// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::services::doctor::DoctorDirectoryService;
use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};
use shared_models::auth::{AuthUser, UserRole};

use crate::models::{
    Appointment, AppointmentError, AppointmentQueryParams, AppointmentStatus,
    BookAppointmentRequest, PaymentState, UpdateStatusRequest,
};
use crate::services::authorization::{authorize, AppointmentAction};
use crate::services::lifecycle::AppointmentLifecycleService;

const DEFAULT_PAGE_SIZE: i32 = 20;
const MAX_PAGE_SIZE: i32 = 100;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    directory: DoctorDirectoryService,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let directory = DoctorDirectoryService::with_client(Arc::clone(&supabase));

        Self {
            supabase,
            directory,
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Book a slot for the calling patient. The storage layer's partial
    /// unique index on non-cancelled (doctor, date, time) is the conflict
    /// gate: the insert either lands or answers 409, so two racing callers
    /// cannot both take the slot. No pre-check, no window.
    pub async fn book_appointment(
        &self,
        patient: &AuthUser,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {} on {} {}",
            patient.id, request.doctor_id, request.date, request.time
        );

        let slot_time = canonical_slot_label(&request.time)?;

        let doctor = self
            .directory
            .get_doctor(request.doctor_id, auth_token)
            .await
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::NotFound => AppointmentError::DoctorNotFound,
                doctor_cell::models::DoctorError::Database(msg) => AppointmentError::Database(msg),
            })?;

        if !doctor.is_bookable() {
            warn!("Doctor {} is not accepting appointments", doctor.id);
            return Err(AppointmentError::DoctorUnavailable);
        }

        let now = Utc::now();
        // Fee is captured by value here; later fee edits must not reach
        // this appointment.
        let appointment_data = json!({
            "patient_id": patient.id,
            "doctor_id": request.doctor_id,
            "appointment_date": request.date,
            "slot_time": slot_time,
            "problem": request.problem,
            "status": AppointmentStatus::Pending.to_string(),
            "payment_status": PaymentState::Pending.to_string(),
            "amount": doctor.consultation_fee,
            "is_checked": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                DbError::Conflict(_) => {
                    warn!(
                        "Slot {} {} already booked for doctor {}",
                        request.date, slot_time, request.doctor_id
                    );
                    AppointmentError::SlotTaken
                }
                other => AppointmentError::Database(other.to_string()),
            })?;

        let appointment = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Failed to create appointment".to_string()))?;

        info!("Appointment {} booked successfully", appointment.id);
        Ok(appointment)
    }

    /// Get appointment by ID, policy-checked for the caller.
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        user: &AuthUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;
        authorize(user, &appointment, AppointmentAction::View)?;
        Ok(appointment)
    }

    /// Appointments scoped to the caller: patients see their own, doctors
    /// their consultations, admins everything. Newest date first.
    pub async fn list_for_user(
        &self,
        user: &AuthUser,
        params: AppointmentQueryParams,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for {} ({})", user.id, user.role);

        let mut query_parts = Vec::new();

        match user.role {
            UserRole::Patient => query_parts.push(format!("patient_id=eq.{}", user.id)),
            UserRole::Doctor => query_parts.push(format!("doctor_id=eq.{}", user.id)),
            UserRole::Admin => {}
        }

        if let Some(status) = params.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = params.offset.unwrap_or(0).max(0);

        query_parts.push("order=appointment_date.desc,slot_time.desc".to_string());
        query_parts.push(format!("limit={}", limit));
        query_parts.push(format!("offset={}", offset));

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let appointments: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        Ok(appointments)
    }

    /// Cancel an appointment. Terminal states are rejected the same way
    /// every time, including a second cancel. A completed payment flips to
    /// refunded in the same PATCH; money movement happens elsewhere.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        user: &AuthUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;
        authorize(user, &appointment, AppointmentAction::Cancel)?;

        if appointment.status.is_terminal() {
            warn!(
                "Cancel rejected for appointment {} in status {}",
                appointment_id, appointment.status
            );
            return Err(AppointmentError::InvalidStatusTransition(appointment.status));
        }

        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(AppointmentStatus::Cancelled.to_string()));
        if appointment.payment_status == PaymentState::Completed {
            update_data.insert("payment_status".to_string(), json!(PaymentState::Refunded.to_string()));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let cancelled = self
            .patch_appointment(appointment_id, Value::Object(update_data), auth_token)
            .await?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Doctor-side triage update: status transition and/or reviewed flag.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        user: &AuthUser,
        request: UpdateStatusRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment: {}", appointment_id);

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;
        authorize(user, &appointment, AppointmentAction::UpdateStatus)?;

        if request.status.is_none() && request.is_checked.is_none() {
            return Err(AppointmentError::Validation("Nothing to update".to_string()));
        }

        let mut update_data = serde_json::Map::new();

        if let Some(new_status) = request.status {
            self.lifecycle
                .validate_status_transition(&appointment.status, &new_status)?;
            update_data.insert("status".to_string(), json!(new_status.to_string()));
        }
        if let Some(is_checked) = request.is_checked {
            update_data.insert("is_checked".to_string(), json!(is_checked));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .patch_appointment(appointment_id, Value::Object(update_data), auth_token)
            .await?;

        info!("Appointment {} updated", appointment_id);
        Ok(updated)
    }

    /// Hard-remove an appointment record, any status. History cleanup for
    /// the owning patient or an admin; unrelated to Cancel.
    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        user: &AuthUser,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        debug!("Deleting appointment: {}", appointment_id);

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;
        authorize(user, &appointment, AppointmentAction::Delete)?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.supabase
            .execute(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        info!("Appointment {} deleted", appointment_id);
        Ok(())
    }

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        result.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let result: Vec<Appointment> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Failed to update appointment".to_string()))
    }
}

/// Parse and re-format a slot label so stored labels share one alphabet
/// with the resolver's output ("9:5" never lands in storage).
fn canonical_slot_label(raw: &str) -> Result<String, AppointmentError> {
    let time = NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| AppointmentError::Validation(format!("Invalid time label: {}", raw)))?;
    Ok(time.format("%H:%M").to_string())
}
