// src/routes/test_support.rs

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chrono::{Duration, FixedOffset, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::{generate_access_token, hash_access_token};
use crate::models::{AppState, Role, UserRow};
use crate::store::AccountStore;
use crate::store::memory::{MemoryAccountStore, MemoryAppointmentStore};

pub struct TestApp {
    pub router: Router,
    pub accounts: Arc<MemoryAccountStore>,
    pub appointments: Arc<MemoryAppointmentStore>,
}

pub struct Caller {
    pub id: Uuid,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let accounts = Arc::new(MemoryAccountStore::default());
        let appointments = Arc::new(MemoryAppointmentStore::default());
        let state = AppState {
            appointments: appointments.clone(),
            accounts: accounts.clone(),
            session_ttl_hours: 24,
            clinic_offset: FixedOffset::east_opt(0).unwrap(),
        };
        Self {
            router: super::router(state),
            accounts,
            appointments,
        }
    }

    pub fn add_user(&self, role: Role, password_hash: &str) -> UserRow {
        let user_id = Uuid::new_v4();
        let user = UserRow {
            user_id,
            username: format!("{}-{}", role.as_str().to_lowercase().replace(' ', "_"), user_id.simple()),
            display_name: format!("Test {}", role.as_str()),
            password_hash: password_hash.to_string(),
            role,
            is_active: true,
        };
        self.accounts.add_user(user.clone());
        user
    }

    /// Registers a user of `role` with a live session.
    pub async fn sign_in(&self, role: Role) -> Caller {
        let user = self.add_user(role, "");
        let token = generate_access_token();
        self.accounts
            .create_session(user.user_id, &hash_access_token(&token), None, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        Caller {
            id: user.user_id,
            token,
        }
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header("authorization", format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}
