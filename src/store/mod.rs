// src/store/mod.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, Role, SessionIdentity, SessionRow, UserRow,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("db error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("row decode error: {0}")]
    Decode(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// Selects appointments. Every set field must match; `statuses` is an IN set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub statuses: Vec<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub booked_by: Option<Role>,
    pub start_time: Option<DateTime<Utc>>,
    pub start_from: Option<DateTime<Utc>>,
    pub start_before: Option<DateTime<Utc>>,
}

impl AppointmentFilter {
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Pending or approved bookings for one doctor at one instant.
    pub fn slot_holders(doctor_id: Uuid, start_time: DateTime<Utc>) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            start_time: Some(start_time),
            statuses: AppointmentStatus::HOLDS_SLOT.to_vec(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_patient(self, patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..self
        }
    }

    pub fn with_doctor(self, doctor_id: Uuid) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            ..self
        }
    }
}

/// A validated booking ready to persist.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub start_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub booked_by: Role,
}

/// Fields a patient may change while the appointment is pending.
#[derive(Debug, Clone, Default)]
pub struct AppointmentEdit {
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
}

/// A doctor's status decision.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub remark: Option<String>,
    pub doctor_updated_at: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// The two update paths never share fields.
#[derive(Debug, Clone)]
pub enum AppointmentPatch {
    Fields(AppointmentEdit),
    Status(StatusChange),
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find_one(&self, filter: &AppointmentFilter) -> Result<Option<Appointment>, StoreError>;

    /// Matches ordered by start time.
    async fn find_many(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError>;

    /// Applies `patch` to the oldest match and returns it, or `None` when
    /// nothing matches.
    async fn update(
        &self,
        filter: &AppointmentFilter,
        patch: AppointmentPatch,
    ) -> Result<Option<Appointment>, StoreError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRow>, StoreError>;

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        device_name: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRow, StoreError>;

    /// Resolves a live (unrevoked, unexpired) session of an active user.
    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionIdentity>, StoreError>;

    async fn touch_session(&self, session_token_id: Uuid) -> Result<(), StoreError>;

    /// Returns false when the session was already gone.
    async fn revoke_session(&self, session_token_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
}
