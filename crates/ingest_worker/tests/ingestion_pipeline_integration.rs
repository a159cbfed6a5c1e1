#![cfg(feature = "integration-tests")]

use common::domain::LocationRepository;
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresLocationRepository, PostgresMigrator,
};
use ingest_worker::{IngestWorker, LocationSubscriberConfig};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mosquitto::Mosquitto;
use testcontainers_modules::postgres::Postgres;
use tokio_util::sync::CancellationToken;

const EXAMPLE: &str =
    r#"{"_type":"location","batt":80,"lat":52.1,"lon":4.3,"tst":1700000000,"vel":3}"#;

async fn setup_repository() -> (ContainerAsync<Postgres>, Arc<PostgresLocationRepository>) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let goose_path = which::which("goose").expect("goose binary not found");
    let config = PostgresConfig {
        host: host.to_string(),
        port,
        database: "postgres".to_string(),
        username: "postgres".to_string(),
        password: "postgres".to_string(),
        max_pool_size: 5,
        migrations_dir: format!(
            "{}/../common/migrations/postgres",
            env!("CARGO_MANIFEST_DIR")
        ),
        goose_binary_path: goose_path.to_string_lossy().to_string(),
    };

    PostgresMigrator::new(&config)
        .run_migrations()
        .await
        .expect("Migrations failed");

    let client = PostgresClient::new(&config).expect("Failed to create client");
    (postgres, Arc::new(PostgresLocationRepository::new(client)))
}

async fn setup_broker() -> (ContainerAsync<Mosquitto>, String, u16) {
    let mosquitto = Mosquitto::default().start().await.unwrap();
    let host = mosquitto.get_host().await.unwrap().to_string();
    let port = mosquitto.get_host_port_ipv4(1883).await.unwrap();
    (mosquitto, host, port)
}

/// Publishes one QoS 1 message and waits for the broker's PUBACK.
async fn publish(host: &str, port: u16, topic: &str, payload: &str) {
    let mut options = MqttOptions::new("test-publisher", host, port);
    options.set_keep_alive(Duration::from_secs(5));
    let (client, mut eventloop) = AsyncClient::new(options, 10);

    client
        .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
        .await
        .unwrap();

    loop {
        match eventloop.poll().await.unwrap() {
            rumqttc::Event::Incoming(rumqttc::Packet::PubAck(_)) => break,
            _ => continue,
        }
    }
    client.disconnect().await.unwrap();
}

async fn wait_for_count(repo: &PostgresLocationRepository, expected: usize) -> usize {
    let mut count = 0;
    for _ in 0..50 {
        count = repo.list_locations().await.unwrap().len();
        if count == expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    count
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_location_published_twice_is_stored_once() {
    let (_postgres, repo) = setup_repository().await;
    let (_mosquitto, host, port) = setup_broker().await;

    let config = LocationSubscriberConfig {
        broker_url: format!("mqtt://{}:{}", host, port),
        client_id: "waypoint-ingest-test".to_string(),
        ..Default::default()
    };
    let worker = IngestWorker::new(repo.clone(), config).unwrap();

    let token = CancellationToken::new();
    let handle = tokio::spawn(worker.into_runner_process()(token.clone()));

    // give the subscriber time to connect and subscribe
    tokio::time::sleep(Duration::from_secs(1)).await;

    publish(&host, port, "owntracks/alice/phone1", EXAMPLE).await;
    assert_eq!(wait_for_count(&repo, 1).await, 1);

    let points = repo.list_locations().await.unwrap();
    assert_eq!(points[0].user, "alice");
    assert_eq!(points[0].latitude, 52.1);
    assert_eq!(points[0].longitude, 4.3);
    assert_eq!(points[0].battery, 80);
    assert_eq!(points[0].velocity, 3);
    assert_eq!(points[0].timestamp, 1700000000);

    // same user and timestamp under a fresh packet id
    publish(&host, port, "owntracks/alice/phone1", EXAMPLE).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(repo.list_locations().await.unwrap().len(), 1);

    token.cancel();
    let result = tokio::time::timeout(Duration::from_secs(15), handle)
        .await
        .expect("ingest worker did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_unreachable_broker_fails_startup() {
    let (_postgres, repo) = setup_repository().await;

    let config = LocationSubscriberConfig {
        // nothing listens on port 1 of the loopback interface
        broker_url: "mqtt://127.0.0.1:1".to_string(),
        ..Default::default()
    };
    let worker = IngestWorker::new(repo, config).unwrap();

    let result = tokio::time::timeout(
        Duration::from_secs(15),
        worker.into_runner_process()(CancellationToken::new()),
    )
    .await
    .expect("startup did not fail in time");

    assert!(result.is_err());
}
