// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    PgPool, Postgres, QueryBuilder, Row,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, AppointmentType, Role, SessionIdentity, SessionRow, UserRow,
};
use crate::store::{
    AccountStore, AppointmentFilter, AppointmentPatch, AppointmentStore, NewAppointment, StoreError,
};

pub async fn connect_pg(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id,
    patient_id,
    doctor_id,
    appointment_type,
    reason,
    start_time,
    end_time,
    status,
    booked_by,
    remark,
    doctor_updated_at,
    created_at,
    updated_at
"#;

/* ============================================================
   Appointments
   ============================================================ */

#[derive(Clone)]
pub struct PgAppointmentStore {
    pool: PgPool,
}

impl PgAppointmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &AppointmentFilter) {
    qb.push(" WHERE TRUE");
    if let Some(id) = f.id {
        qb.push(" AND appointment_id = ").push_bind(id);
    }
    if let Some(patient_id) = f.patient_id {
        qb.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(doctor_id) = f.doctor_id {
        qb.push(" AND doctor_id = ").push_bind(doctor_id);
    }
    if !f.statuses.is_empty() {
        let labels: Vec<String> = f.statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(labels).push(")");
    }
    if let Some(t) = f.appointment_type {
        qb.push(" AND appointment_type = ").push_bind(t.as_str());
    }
    if let Some(role) = f.booked_by {
        qb.push(" AND booked_by = ").push_bind(role.as_str());
    }
    if let Some(at) = f.start_time {
        qb.push(" AND start_time = ").push_bind(at);
    }
    if let Some(from) = f.start_from {
        qb.push(" AND start_time >= ").push_bind(from);
    }
    if let Some(before) = f.start_before {
        qb.push(" AND start_time < ").push_bind(before);
    }
}

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    async fn find_one(&self, filter: &AppointmentFilter) -> Result<Option<Appointment>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(APPOINTMENT_COLUMNS).push(" FROM appointment");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC LIMIT 1");

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn find_many(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(APPOINTMENT_COLUMNS).push(" FROM appointment");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY start_time ASC, created_at ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(appointment_from_row).collect()
    }

    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO appointment (
              appointment_id,
              patient_id,
              doctor_id,
              appointment_type,
              reason,
              start_time,
              status,
              booked_by
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(new.patient_id)
            .bind(new.doctor_id)
            .bind(new.appointment_type.as_str())
            .bind(new.reason)
            .bind(new.start_time)
            .bind(new.status.as_str())
            .bind(new.booked_by.as_str())
            .fetch_one(&self.pool)
            .await?;

        appointment_from_row(&row)
    }

    async fn update(
        &self,
        filter: &AppointmentFilter,
        patch: AppointmentPatch,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE appointment SET updated_at = now()");
        match patch {
            AppointmentPatch::Fields(edit) => {
                if let Some(t) = edit.appointment_type {
                    qb.push(", appointment_type = ").push_bind(t.as_str());
                }
                if let Some(reason) = edit.reason {
                    qb.push(", reason = ").push_bind(reason);
                }
            }
            AppointmentPatch::Status(change) => {
                qb.push(", status = ").push_bind(change.status.as_str());
                qb.push(", doctor_updated_at = ").push_bind(change.doctor_updated_at);
                if let Some(remark) = change.remark {
                    qb.push(", remark = ").push_bind(remark);
                }
                if let Some(end_time) = change.end_time {
                    qb.push(", end_time = ").push_bind(end_time);
                }
            }
        }

        qb.push(" WHERE appointment_id = (SELECT appointment_id FROM appointment");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC LIMIT 1) RETURNING ");
        qb.push(APPOINTMENT_COLUMNS);

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(appointment_from_row).transpose()
    }
}

fn appointment_from_row(r: &PgRow) -> Result<Appointment, StoreError> {
    let appointment_type: String = r.try_get("appointment_type")?;
    let status: String = r.try_get("status")?;
    let booked_by: String = r.try_get("booked_by")?;

    Ok(Appointment {
        id: r.try_get("appointment_id")?,
        patient_id: r.try_get("patient_id")?,
        doctor_id: r.try_get("doctor_id")?,
        appointment_type: AppointmentType::parse(&appointment_type)
            .ok_or_else(|| StoreError::Decode(format!("unknown appointment_type {appointment_type}")))?,
        reason: r.try_get("reason")?,
        start_time: r.try_get("start_time")?,
        end_time: r.try_get("end_time")?,
        status: AppointmentStatus::parse(&status)
            .ok_or_else(|| StoreError::Decode(format!("unknown status {status}")))?,
        booked_by: parse_role(&booked_by)?,
        remark: r.try_get("remark")?,
        doctor_updated_at: r.try_get("doctor_updated_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn parse_role(label: &str) -> Result<Role, StoreError> {
    Role::parse(label).ok_or_else(|| StoreError::Decode(format!("unknown role {label}")))
}

/* ============================================================
   Users & sessions
   ============================================================ */

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRecord {
    user_id: Uuid,
    username: String,
    display_name: String,
    password_hash: String,
    role: String,
    is_active: bool,
}

impl TryFrom<UserRecord> for UserRow {
    type Error = StoreError;

    fn try_from(u: UserRecord) -> Result<Self, Self::Error> {
        Ok(UserRow {
            role: parse_role(&u.role)?,
            user_id: u.user_id,
            username: u.username,
            display_name: u.display_name,
            password_hash: u.password_hash,
            is_active: u.is_active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    user_id: Uuid,
    role: String,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, username, display_name, password_hash, role, is_active
            FROM app_user
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(UserRow::try_from)
        .transpose()
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRow>, StoreError> {
        sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT user_id, username, display_name, password_hash, role, is_active
            FROM app_user
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(UserRow::try_from)
        .transpose()
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        device_name: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRow, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO session_token
                (session_token_id, user_id, session_token_hash, device_name, expires_at)
            VALUES
                ($1, $2, $3, $4, $5)
            RETURNING session_token_id, user_id, expires_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(device_name)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(SessionRow {
            session_token_id: row.try_get("session_token_id")?,
            user_id: row.try_get("user_id")?,
            expires_at: row.try_get("expires_at")?,
        })
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionIdentity>, StoreError> {
        let row = sqlx::query_as::<_, SessionLookupRow>(
            r#"
            SELECT st.session_token_id, st.user_id, u.role, st.expires_at
            FROM session_token st
            JOIN app_user u ON u.user_id = st.user_id
            WHERE st.session_token_hash = $1
              AND st.revoked_at IS NULL
              AND st.expires_at > now()
              AND u.is_active = true
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> Result<SessionIdentity, StoreError> {
            Ok(SessionIdentity {
                role: parse_role(&r.role)?,
                session_token_id: r.session_token_id,
                user_id: r.user_id,
                expires_at: r.expires_at,
            })
        })
        .transpose()
    }

    async fn touch_session(&self, session_token_id: Uuid) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE session_token
            SET last_seen_at = now()
            WHERE session_token_id = $1
            "#,
        )
        .bind(session_token_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_session(&self, session_token_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let done = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE session_token_id = $1
              AND user_id = $2
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_token_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected() > 0)
    }
}
