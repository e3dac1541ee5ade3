// src/routes/vocabulary_routes.rs

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::{
    models::{ApiOk, AppState, AppointmentStatus, AppointmentType, Day, Role},
    slots::TimeSlot,
};

/// Label tables clients use to build booking forms.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vocabulary {
    pub user_types: &'static [Role],
    pub appointment_types: &'static [AppointmentType],
    pub statuses: &'static [AppointmentStatus],
    pub days: &'static [Day],
    pub time_slots: &'static [TimeSlot],
}

pub fn router() -> Router<AppState> {
    Router::new().route("/vocabulary", get(vocabulary))
}

pub async fn vocabulary() -> Json<ApiOk<Vocabulary>> {
    Json(ApiOk::new(
        "Vocabulary retrieved successfully",
        Vocabulary {
            user_types: &Role::ALL,
            appointment_types: &AppointmentType::ALL,
            statuses: &AppointmentStatus::ALL,
            days: &Day::ALL,
            time_slots: &TimeSlot::ALL,
        },
    ))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::TestApp;

    #[tokio::test]
    async fn vocabulary_is_public_and_complete() {
        let app = TestApp::new();
        let (status, body) = app.call("GET", "/api/v1/vocabulary", None, None).await;

        assert_eq!(status.as_u16(), 200);
        let data = &body["data"];
        assert_eq!(data["userTypes"].as_array().unwrap().len(), 4);
        assert_eq!(data["userTypes"][3], "Super Admin");
        assert_eq!(data["appointmentTypes"][4], "Lab Test");
        assert_eq!(data["statuses"][0], "Pending");
        assert_eq!(data["days"][0], "Sunday");
        let slots = data["timeSlots"].as_array().unwrap();
        assert_eq!(slots.len(), 19);
        assert_eq!(slots[0], "6am");
        assert_eq!(slots[18], "12am");
    }
}
