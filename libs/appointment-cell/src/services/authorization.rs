// libs/appointment-cell/src/services/authorization.rs
use shared_models::auth::{AuthUser, UserRole};

use crate::models::{Appointment, AppointmentError};

/// What a caller is trying to do with an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentAction {
    View,
    Cancel,
    UpdateStatus,
    Delete,
}

/// Single allow/deny decision for (requester, appointment, action),
/// evaluated once per operation. View and Cancel belong to either party or
/// an admin; triage updates belong to the owning doctor alone; hard delete
/// belongs to the owning patient or an admin.
pub fn authorize(
    user: &AuthUser,
    appointment: &Appointment,
    action: AppointmentAction,
) -> Result<(), AppointmentError> {
    let is_owning_patient = user.role == UserRole::Patient && user.id == appointment.patient_id;
    let is_owning_doctor = user.role == UserRole::Doctor && user.id == appointment.doctor_id;

    let allowed = match action {
        AppointmentAction::View | AppointmentAction::Cancel => {
            is_owning_patient || is_owning_doctor || user.is_admin()
        }
        AppointmentAction::UpdateStatus => is_owning_doctor,
        AppointmentAction::Delete => is_owning_patient || user.is_admin(),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppointmentError::Forbidden)
    }
}
