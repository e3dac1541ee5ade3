// src/store/memory.rs
//
// In-process stores backing the router tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Appointment, SessionIdentity, SessionRow, UserRow};
use crate::store::{
    AccountStore, AppointmentFilter, AppointmentPatch, AppointmentStore, NewAppointment, StoreError,
};

#[derive(Default)]
pub struct MemoryAppointmentStore {
    rows: Mutex<Vec<Appointment>>,
}

impl MemoryAppointmentStore {
    pub fn all(&self) -> Vec<Appointment> {
        self.rows.lock().unwrap().clone()
    }
}

fn matches(f: &AppointmentFilter, a: &Appointment) -> bool {
    f.id.is_none_or(|id| a.id == id)
        && f.patient_id.is_none_or(|id| a.patient_id == id)
        && f.doctor_id.is_none_or(|id| a.doctor_id == id)
        && (f.statuses.is_empty() || f.statuses.contains(&a.status))
        && f.appointment_type.is_none_or(|t| a.appointment_type == t)
        && f.booked_by.is_none_or(|r| a.booked_by == r)
        && f.start_time.is_none_or(|t| a.start_time == t)
        && f.start_from.is_none_or(|t| a.start_time >= t)
        && f.start_before.is_none_or(|t| a.start_time < t)
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn find_one(&self, filter: &AppointmentFilter) -> Result<Option<Appointment>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|a| matches(filter, a)).cloned())
    }

    async fn find_many(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut found: Vec<Appointment> = rows.iter().filter(|a| matches(filter, a)).cloned().collect();
        found.sort_by_key(|a| a.start_time);
        Ok(found)
    }

    async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let now = Utc::now();
        let created = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            appointment_type: new.appointment_type,
            reason: new.reason,
            start_time: new.start_time,
            end_time: None,
            status: new.status,
            booked_by: new.booked_by,
            remark: None,
            doctor_updated_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        filter: &AppointmentFilter,
        patch: AppointmentPatch,
    ) -> Result<Option<Appointment>, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let Some(target) = rows.iter_mut().find(|a| matches(filter, a)) else {
            return Ok(None);
        };

        match patch {
            AppointmentPatch::Fields(edit) => {
                if let Some(t) = edit.appointment_type {
                    target.appointment_type = t;
                }
                if let Some(reason) = edit.reason {
                    target.reason = Some(reason);
                }
            }
            AppointmentPatch::Status(change) => {
                target.status = change.status;
                target.doctor_updated_at = Some(change.doctor_updated_at);
                if let Some(remark) = change.remark {
                    target.remark = Some(remark);
                }
                if let Some(end_time) = change.end_time {
                    target.end_time = Some(end_time);
                }
            }
        }
        target.updated_at = Utc::now();
        Ok(Some(target.clone()))
    }
}

struct MemorySession {
    row: SessionRow,
    token_hash: String,
    revoked: bool,
    touched: bool,
}

#[derive(Default)]
pub struct MemoryAccountStore {
    users: Mutex<HashMap<Uuid, UserRow>>,
    sessions: Mutex<Vec<MemorySession>>,
}

impl MemoryAccountStore {
    pub fn add_user(&self, user: UserRow) {
        self.users.lock().unwrap().insert(user.user_id, user);
    }

    pub fn was_touched(&self, session_token_id: Uuid) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .iter()
            .any(|s| s.row.session_token_id == session_token_id && s.touched)
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<UserRow>, StoreError> {
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        _device_name: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<SessionRow, StoreError> {
        let row = SessionRow {
            session_token_id: Uuid::new_v4(),
            user_id,
            expires_at,
        };
        self.sessions.lock().unwrap().push(MemorySession {
            row: row.clone(),
            token_hash: token_hash.to_string(),
            revoked: false,
            touched: false,
        });
        Ok(row)
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<SessionIdentity>, StoreError> {
        let sessions = self.sessions.lock().unwrap();
        let users = self.users.lock().unwrap();
        let now = Utc::now();

        Ok(sessions
            .iter()
            .filter(|s| s.token_hash == token_hash && !s.revoked && s.row.expires_at > now)
            .find_map(|s| {
                let user = users.get(&s.row.user_id).filter(|u| u.is_active)?;
                Some(SessionIdentity {
                    session_token_id: s.row.session_token_id,
                    user_id: user.user_id,
                    role: user.role,
                    expires_at: s.row.expires_at,
                })
            }))
    }

    async fn touch_session(&self, session_token_id: Uuid) -> Result<(), StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(s) = sessions
            .iter_mut()
            .find(|s| s.row.session_token_id == session_token_id)
        {
            s.touched = true;
        }
        Ok(())
    }

    async fn revoke_session(&self, session_token_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.lock().unwrap();
        let Some(s) = sessions.iter_mut().find(|s| {
            s.row.session_token_id == session_token_id && s.row.user_id == user_id && !s.revoked
        }) else {
            return Ok(false);
        };
        s.revoked = true;
        Ok(true)
    }
}
