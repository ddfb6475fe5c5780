// libs/doctor-cell/src/services/doctor.rs
use std::sync::Arc;

use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};

use crate::models::{DoctorError, DoctorProfile};

pub struct DoctorDirectoryService {
    supabase: Arc<SupabaseClient>,
}

impl DoctorDirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Fetch one doctor row, template included.
    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorProfile, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<DoctorProfile> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        result.into_iter().next().ok_or(DoctorError::NotFound)
    }
}

fn map_db_error(err: DbError) -> DoctorError {
    match err {
        DbError::NotFound(_) => DoctorError::NotFound,
        other => DoctorError::Database(other.to_string()),
    }
}
