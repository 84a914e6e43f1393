//! SALT Rules Service entry point.
//!
//! Loads configuration, applies pending migrations, and verifies database
//! connectivity before reporting the service ready.

use salt_rules_service::config::SaltConfig;
use salt_rules_service::services::{init_metrics, Database};

use salt_core::observability::init_tracing;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = SaltConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // Initialize tracing
    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting salt-rules-service"
    );

    // Initialize metrics
    init_metrics();

    let db = Database::new(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .map_err(|e| {
        eprintln!("Failed to connect to database: {}", e);
        std::io::Error::other(format!("Database error: {}", e))
    })?;

    if config.common.run_migrations {
        db.run_migrations().await.map_err(|e| {
            eprintln!("Failed to run migrations: {}", e);
            std::io::Error::other(format!("Migration error: {}", e))
        })?;
    } else {
        tracing::info!("Skipping migrations (run_migrations disabled)");
    }

    db.health_check().await.map_err(|e| {
        eprintln!("Database health check failed: {}", e);
        std::io::Error::other(format!("Health check error: {}", e))
    })?;

    tracing::info!(service = %config.service_name, "salt-rules-service ready");

    Ok(())
}
