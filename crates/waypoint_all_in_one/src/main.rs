mod config;

use common::domain::LocationRepository;
use common::postgres::{PostgresClient, PostgresLocationRepository, PostgresMigrator};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use crate::config::ServiceConfig;
use ingest_worker::IngestWorker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracks_api::TracksApi;
use waypoint_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {:#}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        broker_url = %config.mqtt_broker_url,
        client_id = %config.mqtt_client_id,
        "Starting waypoint service"
    );
    debug!(
        topic_filter = %config.mqtt_topic_filter,
        session_expiry_secs = config.mqtt_session_expiry_secs,
        http_port = config.http_port,
        "Loaded configuration"
    );

    let location_repository = match initialize_location_repository(&config).await {
        Ok(repository) => repository,
        Err(e) => {
            error!("Failed to initialize location store: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let ingest_worker =
        match IngestWorker::new(location_repository.clone(), config.subscriber_config()) {
            Ok(worker) => worker,
            Err(e) => {
                error!("Failed to initialize ingest worker: {:#}", e);
                shutdown_telemetry(telemetry_providers);
                std::process::exit(1);
            }
        };

    let tracks_api = TracksApi::new(location_repository, config.http_server_config());

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let runner = Runner::new()
        .with_named_process("ingest_worker", ingest_worker.into_runner_process())
        .with_named_process("tracks_api", tracks_api.into_runner_process())
        .with_shutdown_grace(shutdown_timeout)
        .with_closer_timeout(shutdown_timeout)
        .with_closer(move || async move {
            info!("Shutting down telemetry");
            shutdown_telemetry(telemetry_providers);
            Ok(())
        });

    if let Err(e) = runner.run().await {
        // telemetry is already shut down by the closer
        eprintln!("waypoint stopped with error: {:#}", e);
        std::process::exit(1);
    }
}

/// Applies migrations and returns a repository over a verified pool.
async fn initialize_location_repository(
    config: &ServiceConfig,
) -> anyhow::Result<Arc<dyn LocationRepository>> {
    let postgres_config = config.postgres_config();

    info!("Running PostgreSQL migrations...");
    PostgresMigrator::new(&postgres_config).run_migrations().await?;
    info!("PostgreSQL migrations completed");

    let client = PostgresClient::new(&postgres_config)?;
    client.ping().await?;
    info!(
        host = %postgres_config.host,
        database = %postgres_config.database,
        "Connected to PostgreSQL"
    );

    Ok(Arc::new(PostgresLocationRepository::new(client)))
}
