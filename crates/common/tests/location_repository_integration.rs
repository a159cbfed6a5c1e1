#![cfg(feature = "integration-tests")]

use common::domain::{
    CreateLocationPointInput, DomainError, LocationExistsInput, LocationRepository,
};
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresLocationRepository, PostgresMigrator,
};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresLocationRepository, PostgresConfig) {
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
        migrations_dir: format!("{}/migrations/postgres", env!("CARGO_MANIFEST_DIR")),
        goose_binary_path: goose_path.to_string_lossy().to_string(),
    };

    PostgresMigrator::new(&config)
        .run_migrations()
        .await
        .expect("Migrations failed");

    let client = PostgresClient::new(&config).expect("Failed to create client");
    client.ping().await.expect("Failed to ping postgres");

    (postgres, PostgresLocationRepository::new(client), config)
}

fn alice_at(timestamp: i64, packet_id: u16) -> CreateLocationPointInput {
    CreateLocationPointInput {
        user: "alice".to_string(),
        latitude: 52.1,
        longitude: 4.3,
        battery: 80,
        velocity: 3,
        timestamp,
        packet_id,
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_insert_and_list_locations() {
    let (_container, repo, _config) = setup_test_db().await;

    let stored = repo.insert_location(alice_at(1700000000, 7)).await.unwrap();
    assert!(stored.id > 0);
    assert_eq!(stored.user, "alice");
    assert_eq!(stored.packet_id, 7);

    repo.insert_location(alice_at(1700000060, 8)).await.unwrap();

    let points = repo.list_locations().await.unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].id, stored.id);
    assert_eq!(points[0].latitude, 52.1);
    assert_eq!(points[0].longitude, 4.3);
    assert_eq!(points[0].battery, 80);
    assert_eq!(points[0].velocity, 3);
    assert_eq!(points[0].timestamp, 1700000000);
    assert_eq!(points[1].packet_id, 8);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_duplicate_packet_id_is_rejected() {
    let (_container, repo, _config) = setup_test_db().await;

    repo.insert_location(alice_at(1700000000, 7)).await.unwrap();
    let result = repo.insert_location(alice_at(1700000999, 7)).await;

    match result {
        Err(DomainError::LocationAlreadyExists(constraint)) => {
            assert_eq!(constraint, "location_points_packet_id_key");
        }
        other => panic!("expected LocationAlreadyExists, got {:?}", other),
    }
    assert_eq!(repo.list_locations().await.unwrap().len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_duplicate_user_timestamp_is_rejected() {
    let (_container, repo, _config) = setup_test_db().await;

    repo.insert_location(alice_at(1700000000, 7)).await.unwrap();
    let result = repo.insert_location(alice_at(1700000000, 9)).await;

    match result {
        Err(DomainError::LocationAlreadyExists(constraint)) => {
            assert_eq!(constraint, "location_points_user_timestamp_key");
        }
        other => panic!("expected LocationAlreadyExists, got {:?}", other),
    }
    assert_eq!(repo.list_locations().await.unwrap().len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_concurrent_inserts_for_same_user_timestamp_store_one() {
    let (_container, repo, _config) = setup_test_db().await;

    let first = repo.insert_location(alice_at(1700000000, 1));
    let second = repo.insert_location(alice_at(1700000000, 2));
    let (a, b) = tokio::join!(first, second);

    assert!(a.is_ok() ^ b.is_ok());
    assert_eq!(repo.list_locations().await.unwrap().len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_location_exists() {
    let (_container, repo, _config) = setup_test_db().await;
    repo.insert_location(alice_at(1700000000, 7)).await.unwrap();

    let by_packet = LocationExistsInput {
        packet_id: 7,
        user: "bob".to_string(),
        timestamp: 1,
    };
    let by_user_timestamp = LocationExistsInput {
        packet_id: 100,
        user: "alice".to_string(),
        timestamp: 1700000000,
    };
    let unseen = LocationExistsInput {
        packet_id: 100,
        user: "alice".to_string(),
        timestamp: 1700000001,
    };

    assert!(repo.location_exists(by_packet).await.unwrap());
    assert!(repo.location_exists(by_user_timestamp).await.unwrap());
    assert!(!repo.location_exists(unseen).await.unwrap());
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_migrations_are_idempotent() {
    let (_container, repo, config) = setup_test_db().await;
    repo.insert_location(alice_at(1700000000, 7)).await.unwrap();

    PostgresMigrator::new(&config)
        .run_migrations()
        .await
        .expect("second migration run failed");

    assert_eq!(repo.list_locations().await.unwrap().len(), 1);
}
