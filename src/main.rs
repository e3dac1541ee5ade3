mod auth;
mod config;
mod middleware;

mod error;
mod models;
mod routes;
mod slots;
mod store;

use std::sync::Arc;

use crate::{
    config::Config,
    models::AppState,
    store::postgres::{PgAccountStore, PgAppointmentStore, connect_pg, run_migrations},
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let pool = connect_pg(&cfg.database_url, cfg.db_max_connections).await?;

    if cfg.run_migrations {
        run_migrations(&pool).await?;
        tracing::info!("migrations applied");
    }

    let state = AppState {
        appointments: Arc::new(PgAppointmentStore::new(pool.clone())),
        accounts: Arc::new(PgAccountStore::new(pool)),
        session_ttl_hours: cfg.session_ttl_hours,
        clinic_offset: cfg.clinic_offset,
    };

    // Browser clients of the booking app call the API cross-origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
