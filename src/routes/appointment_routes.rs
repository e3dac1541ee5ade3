// src/routes/appointment_routes.rs

use std::collections::HashSet;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState, Appointment, AppointmentStatus, AppointmentType, Day, Role},
    slots::{self, TimeSlot},
    store::{AppointmentEdit, AppointmentFilter, AppointmentPatch, NewAppointment, StatusChange},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/appointments",
            get(list_appointments)
                .post(create_appointment)
                .patch(update_appointment),
        )
        .route("/appointments/status", patch(update_status))
        .route("/appointments/availability", get(get_availability))
}

/* ============================================================
   Role guards
   ============================================================ */

/// Patients only see their own bookings, doctors only their own schedule.
fn scope_to_caller(auth: &AuthContext, filter: AppointmentFilter) -> AppointmentFilter {
    match auth.role {
        Role::Patient => filter.with_patient(auth.user_id),
        Role::Doctor => filter.with_doctor(auth.user_id),
        Role::Admin | Role::SuperAdmin => filter,
    }
}

fn ensure_patient_may_edit(
    auth: &AuthContext,
    found: &Appointment,
    req: &UpdateAppointmentRequest,
) -> Result<(), ApiError> {
    if auth.role != Role::Patient {
        return Ok(());
    }
    if found.patient_id != auth.user_id {
        return Err(ApiError::Forbidden("FORBIDDEN", "Unauthorized access".into()));
    }
    if found.status != AppointmentStatus::Pending {
        return Err(ApiError::BadRequest(
            "APPOINTMENT_LOCKED",
            "You can no longer modify appointment".into(),
        ));
    }
    if is_set(&req.status) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Patients are not allowed to update the status".into(),
        ));
    }
    if is_set(&req.remark) {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Patients are not allowed to remark".into(),
        ));
    }
    Ok(())
}

fn ensure_doctor_of(auth: &AuthContext, found: &Appointment) -> Result<(), ApiError> {
    if auth.role != Role::Doctor {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only doctors can update the status".into(),
        ));
    }
    if found.doctor_id != auth.user_id {
        return Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Doctor can only update their own appointments".into(),
        ));
    }
    Ok(())
}

fn is_set(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

/* ============================================================
   Query params
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentQuery {
    pub id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub appointment_type: Option<AppointmentType>,
    pub booked_by: Option<Role>,
    pub start_time: Option<DateTime<Utc>>,
    // inclusive lower / exclusive upper bound on startTime
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl From<AppointmentQuery> for AppointmentFilter {
    fn from(q: AppointmentQuery) -> Self {
        AppointmentFilter {
            id: q.id,
            patient_id: q.patient_id,
            doctor_id: q.doctor_id,
            statuses: q.status.into_iter().collect(),
            appointment_type: q.appointment_type,
            booked_by: q.booked_by,
            start_time: q.start_time,
            start_from: q.from,
            start_before: q.to,
        }
    }
}

/// Update paths must name their target.
fn lookup_filter(q: AppointmentQuery) -> Result<AppointmentFilter, ApiError> {
    let filter = AppointmentFilter::from(q);
    if filter.is_empty() {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "a lookup query is required".into(),
        ));
    }
    Ok(filter)
}

/* ============================================================
   POST /appointments (create)
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub time_value: String,
    pub date: String,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub appointment_type: AppointmentType,
    pub reason: Option<String>,
}

/// Shapes a booking for the caller: their own id fills their side of the
/// appointment, whatever the body says.
fn booking_for(
    auth: &AuthContext,
    req: CreateAppointmentRequest,
    offset: chrono::FixedOffset,
) -> Result<NewAppointment, ApiError> {
    let (patient_id, doctor_id, status) = match auth.role {
        Role::Patient => (Some(auth.user_id), req.doctor_id, AppointmentStatus::Pending),
        Role::Doctor => (req.patient_id, Some(auth.user_id), AppointmentStatus::Approved),
        Role::Admin | Role::SuperAdmin => {
            return Err(ApiError::Forbidden("INVALID_ROLE", "Unauthorized user type".into()));
        }
    };

    let (Some(patient_id), Some(doctor_id)) = (patient_id, doctor_id) else {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            "doctorId (for patients) or patientId (for doctors) is required".into(),
        ));
    };

    let start_time = slots::start_time(&req.time_value, &req.date, offset)?;

    Ok(NewAppointment {
        patient_id,
        doctor_id,
        appointment_type: req.appointment_type,
        reason: req.reason,
        start_time,
        status,
        booked_by: auth.role,
    })
}

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Json(req), _): WithRejection<Json<CreateAppointmentRequest>, ApiError>,
) -> Result<(StatusCode, Json<ApiOk<Appointment>>), ApiError> {
    let new = booking_for(&auth, req, state.clinic_offset)?;

    // Read-then-write: two concurrent bookings can both pass this check.
    let holder = state
        .appointments
        .find_one(&AppointmentFilter::slot_holders(new.doctor_id, new.start_time))
        .await?;
    if let Some(existing) = holder {
        tracing::warn!(
            doctor_id = %new.doctor_id,
            start_time = %new.start_time,
            held_by = %existing.id,
            "slot unavailable"
        );
        return Err(ApiError::Conflict(
            "SLOT_UNAVAILABLE",
            "Doctor is not available at the selected time".into(),
        ));
    }

    let created = state.appointments.create(new).await?;
    tracing::info!(
        appointment_id = %created.id,
        booked_by = created.booked_by.as_str(),
        status = created.status.as_str(),
        "appointment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiOk::new("Appointment request sent successfully", created)),
    ))
}

/* ============================================================
   GET /appointments
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<AppointmentQuery>, ApiError>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let filter = scope_to_caller(&auth, q.into());
    let rows = state.appointments.find_many(&filter).await?;

    Ok(Json(ApiOk::new("Appointments retrieved successfully", rows)))
}

/* ============================================================
   PATCH /appointments (patient-facing edit)
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    pub status: Option<String>,
    pub remark: Option<String>,
    pub appointment_type: Option<AppointmentType>,
    pub reason: Option<String>,
}

pub async fn update_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<AppointmentQuery>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateAppointmentRequest>, ApiError>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let filter = lookup_filter(q)?;

    let found = state
        .appointments
        .find_one(&filter)
        .await?
        .ok_or_else(ApiError::appointment_not_found)?;

    ensure_patient_may_edit(&auth, &found, &req)?;

    // status and remark never travel on this path
    let edit = AppointmentEdit {
        appointment_type: req.appointment_type,
        reason: req.reason,
    };
    let updated = state
        .appointments
        .update(&AppointmentFilter::by_id(found.id), AppointmentPatch::Fields(edit))
        .await?
        .ok_or_else(ApiError::appointment_not_found)?;

    Ok(Json(ApiOk::new("Appointment updated successfully", updated)))
}

/* ============================================================
   PATCH /appointments/status (doctor-facing transition)
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub remark: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<AppointmentQuery>, ApiError>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateStatusRequest>, ApiError>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let filter = lookup_filter(q)?;

    let found = state
        .appointments
        .find_one(&filter)
        .await?
        .ok_or_else(ApiError::appointment_not_found)?;

    ensure_doctor_of(&auth, &found)?;

    let next = req
        .status
        .as_deref()
        .and_then(AppointmentStatus::parse)
        .filter(|s| s.is_doctor_target())
        .ok_or_else(|| ApiError::BadRequest("VALIDATION_ERROR", "Invalid status update".into()))?;

    if !found.status.can_move_to(next) {
        return Err(ApiError::BadRequest(
            "INVALID_TRANSITION",
            format!(
                "Cannot change status from {} to {}",
                found.status.as_str(),
                next.as_str()
            ),
        ));
    }

    let now = Utc::now();
    let change = StatusChange {
        status: next,
        remark: req.remark,
        doctor_updated_at: now,
        end_time: (next == AppointmentStatus::Completed).then_some(now),
    };

    let updated = state
        .appointments
        .update(&AppointmentFilter::by_id(found.id), AppointmentPatch::Status(change))
        .await?
        .ok_or_else(ApiError::appointment_not_found)?;

    tracing::info!(
        appointment_id = %updated.id,
        from = found.status.as_str(),
        to = next.as_str(),
        "appointment status updated"
    );

    Ok(Json(ApiOk::new("Appointment status updated successfully", updated)))
}

/* ============================================================
   GET /appointments/availability
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub doctor_id: Option<Uuid>,
    pub date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub time_value: TimeSlot,
    pub start_time: DateTime<Utc>,
    pub available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub day: Day,
    pub slots: Vec<SlotAvailability>,
}

pub async fn get_availability(
    State(state): State<AppState>,
    auth: AuthContext,
    WithRejection(Query(q), _): WithRejection<Query<AvailabilityQuery>, ApiError>,
) -> Result<Json<ApiOk<DayAvailability>>, ApiError> {
    let doctor_id = match (q.doctor_id, auth.role) {
        (Some(id), _) => id,
        (None, Role::Doctor) => auth.user_id,
        (None, Role::Patient | Role::Admin | Role::SuperAdmin) => {
            return Err(ApiError::BadRequest(
                "VALIDATION_ERROR",
                "doctorId is required".into(),
            ));
        }
    };

    let date = slots::parse_date(&q.date, state.clinic_offset)?;
    let starts: Vec<(TimeSlot, DateTime<Utc>)> = TimeSlot::ALL
        .into_iter()
        .map(|s| (s, s.start_on(date, state.clinic_offset)))
        .collect();

    // ALL is ordered, so the first and last entries bound the day
    let (Some(first), Some(last)) = (starts.first(), starts.last()) else {
        return Err(ApiError::Internal("no time slots configured".into()));
    };

    let filter = AppointmentFilter {
        doctor_id: Some(doctor_id),
        statuses: AppointmentStatus::HOLDS_SLOT.to_vec(),
        start_from: Some(first.1),
        start_before: Some(last.1 + Duration::hours(1)),
        ..AppointmentFilter::default()
    };
    let taken: HashSet<DateTime<Utc>> = state
        .appointments
        .find_many(&filter)
        .await?
        .into_iter()
        .map(|a| a.start_time)
        .collect();

    let slots = starts
        .into_iter()
        .map(|(time_value, start_time)| SlotAvailability {
            time_value,
            start_time,
            available: !taken.contains(&start_time),
        })
        .collect();

    Ok(Json(ApiOk::new(
        "Availability retrieved successfully",
        DayAvailability {
            doctor_id,
            date,
            day: Day::from(date.weekday()),
            slots,
        },
    )))
}

/* ============================================================
   Tests
   ============================================================ */
