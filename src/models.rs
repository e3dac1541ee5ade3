use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{AccountStore, AppointmentStore};

#[derive(Clone)]
pub struct AppState {
    pub appointments: Arc<dyn AppointmentStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub session_ttl_hours: i64,
    /// Offset used to turn a slot label + calendar date into an instant.
    pub clinic_offset: FixedOffset,
}

/* -------------------------
   Vocabulary
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Patient,
    Doctor,
    Admin,
    #[serde(rename = "Super Admin")]
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Patient, Role::Doctor, Role::Admin, Role::SuperAdmin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::Admin => "Admin",
            Role::SuperAdmin => "Super Admin",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AppointmentType {
    #[default]
    Consultation,
    Treatment,
    Surgery,
    CheckUp,
    #[serde(rename = "Lab Test")]
    LabTest,
}

impl AppointmentType {
    pub const ALL: [AppointmentType; 5] = [
        AppointmentType::Consultation,
        AppointmentType::Treatment,
        AppointmentType::Surgery,
        AppointmentType::CheckUp,
        AppointmentType::LabTest,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentType::Consultation => "Consultation",
            AppointmentType::Treatment => "Treatment",
            AppointmentType::Surgery => "Surgery",
            AppointmentType::CheckUp => "CheckUp",
            AppointmentType::LabTest => "Lab Test",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Declined,
    Completed,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Declined,
        AppointmentStatus::Completed,
    ];

    /// Statuses that keep a doctor's slot occupied.
    pub const HOLDS_SLOT: [AppointmentStatus; 2] =
        [AppointmentStatus::Pending, AppointmentStatus::Approved];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "Pending",
            AppointmentStatus::Approved => "Approved",
            AppointmentStatus::Declined => "Declined",
            AppointmentStatus::Completed => "Completed",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }

    /// Whether a doctor may request this status at all.
    pub fn is_doctor_target(self) -> bool {
        !matches!(self, AppointmentStatus::Pending)
    }

    /// Forward-only moves. Re-sending the current status is allowed so a
    /// doctor can amend the remark; re-completion restamps the end time.
    pub fn can_move_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        if self == next {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Declined) | (Approved, Declined) | (Approved, Completed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
        Day::Saturday,
    ];
}

impl From<Weekday> for Day {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Sun => Day::Sunday,
            Weekday::Mon => Day::Monday,
            Weekday::Tue => Day::Tuesday,
            Weekday::Wed => Day::Wednesday,
            Weekday::Thu => Day::Thursday,
            Weekday::Fri => Day::Friday,
            Weekday::Sat => Day::Saturday,
        }
    }
}

/* -------------------------
   Records
--------------------------*/

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: AppointmentStatus,
    pub booked_by: Role,
    pub remark: Option<String>,
    pub doctor_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub session_token_id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// What a valid bearer token resolves to.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub session_token_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiOk<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
}

impl From<&UserRow> for UserProfile {
    fn from(u: &UserRow) -> Self {
        Self {
            user_id: u.user_id,
            username: u.username.clone(),
            display_name: u.display_name.clone(),
            role: u.role,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MeData {
    pub user: UserProfile,
    pub session: SessionInfo,
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
}
