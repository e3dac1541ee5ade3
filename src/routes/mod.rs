use crate::models::AppState;
use axum::Router;

pub mod appointment_routes;
pub mod auth_routes;
pub mod vocabulary_routes;

#[cfg(test)]
pub mod test_support;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest(
            "/api/v1",
            appointment_routes::router().merge(vocabulary_routes::router()),
        )
        .with_state(state)
}
