//! CareLink server binary.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use carelink_core::config::{
    data_dir_from_env_value, minutes_per_patient_from_env_value, pharmacy_tax_rate_from_env_value,
};
use carelink_core::constants::{
    DEFAULT_EMERGENCY_MINUTES_PER_PATIENT, DEFAULT_OPD_MINUTES_PER_PATIENT, DEFAULT_REST_ADDR,
};
use carelink_core::{CoreConfig, CoreContext};

/// Main entry point for the CareLink server
///
/// Resolves configuration from the environment once, opens the store and serves the REST API
/// with OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `CARELINK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CARELINK_DATA_DIR`: directory for the store snapshot and audit log (unset: in-memory)
/// - `CARELINK_PHARMACY_TAX_RATE`: pharmacy invoice tax percentage (default: 18)
/// - `CARELINK_OPD_MINUTES_PER_PATIENT`: OPD wait estimate per patient ahead (default: 10)
/// - `CARELINK_EMERGENCY_MINUTES_PER_PATIENT`: emergency wait estimate (default: 5)
///
/// # Errors
/// Returns an error if:
/// - a configuration value cannot be parsed,
/// - the store snapshot cannot be loaded, or
/// - the server address cannot be bound.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carelink=info".parse()?)
                .add_directive("carelink_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = |name: &str| std::env::var(name).ok();
    let rest_addr = env("CARELINK_REST_ADDR").unwrap_or_else(|| DEFAULT_REST_ADDR.into());

    let cfg = Arc::new(CoreConfig::new(
        data_dir_from_env_value(env("CARELINK_DATA_DIR")),
        pharmacy_tax_rate_from_env_value(env("CARELINK_PHARMACY_TAX_RATE"))?,
        minutes_per_patient_from_env_value(
            env("CARELINK_OPD_MINUTES_PER_PATIENT"),
            DEFAULT_OPD_MINUTES_PER_PATIENT,
        )?,
        minutes_per_patient_from_env_value(
            env("CARELINK_EMERGENCY_MINUTES_PER_PATIENT"),
            DEFAULT_EMERGENCY_MINUTES_PER_PATIENT,
        )?,
    )?);

    if let Some(dir) = cfg.data_dir() {
        tracing::info!("++ Using data directory {}", dir.display());
    }
    let ctx = Arc::new(CoreContext::open(cfg)?);

    tracing::info!("++ Starting CareLink REST on {}", rest_addr);
    let app = router(AppState::new(ctx));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
