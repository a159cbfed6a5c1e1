use crate::domain::{
    CreateLocationPointInput, DomainError, DomainResult, LocationExistsInput, LocationPoint,
    LocationRepository,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, info};

const UNIQUE_VIOLATION: &str = "23505";

/// Location row as stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct LocationPointRow {
    pub id: i64,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub battery: i32,
    pub velocity: i32,
    pub device_timestamp: i64,
    pub packet_id: i32,
    pub created_at: DateTime<Utc>,
}

impl LocationPointRow {
    fn from_row(row: &Row) -> Self {
        Self {
            id: row.get(0),
            user_id: row.get(1),
            latitude: row.get(2),
            longitude: row.get(3),
            battery: row.get(4),
            velocity: row.get(5),
            device_timestamp: row.get(6),
            packet_id: row.get(7),
            created_at: row.get(8),
        }
    }
}

impl TryFrom<LocationPointRow> for LocationPoint {
    type Error = DomainError;

    fn try_from(row: LocationPointRow) -> Result<Self, Self::Error> {
        let packet_id = u16::try_from(row.packet_id).map_err(|_| {
            DomainError::RepositoryError(anyhow::anyhow!(
                "packet_id {} out of range for row {}",
                row.packet_id,
                row.id
            ))
        })?;

        Ok(LocationPoint {
            id: row.id,
            user: row.user_id,
            latitude: row.latitude,
            longitude: row.longitude,
            battery: row.battery,
            velocity: row.velocity,
            timestamp: row.device_timestamp,
            packet_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Clone)]
pub struct PostgresLocationRepository {
    client: PostgresClient,
}

impl PostgresLocationRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LocationRepository for PostgresLocationRepository {
    async fn insert_location(
        &self,
        input: CreateLocationPointInput,
    ) -> DomainResult<LocationPoint> {
        debug!(
            user = %input.user,
            timestamp = input.timestamp,
            packet_id = input.packet_id,
            "inserting location point"
        );

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let packet_id = i32::from(input.packet_id);

        let result = conn
            .query_one(
                "INSERT INTO location_points (user_id, latitude, longitude, battery, velocity, device_timestamp, packet_id)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 RETURNING id, created_at",
                &[
                    &input.user,
                    &input.latitude,
                    &input.longitude,
                    &input.battery,
                    &input.velocity,
                    &input.timestamp,
                    &packet_id,
                ],
            )
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) => {
                if let Some(db_err) = e.as_db_error() {
                    if db_err.code().code() == UNIQUE_VIOLATION {
                        let constraint = db_err.constraint().unwrap_or("location_points");
                        return Err(DomainError::LocationAlreadyExists(constraint.to_string()));
                    }
                }
                return Err(DomainError::RepositoryError(e.into()));
            }
        };

        let point = LocationPoint {
            id: row.get(0),
            user: input.user,
            latitude: input.latitude,
            longitude: input.longitude,
            battery: input.battery,
            velocity: input.velocity,
            timestamp: input.timestamp,
            packet_id: input.packet_id,
            created_at: row.get(1),
        };

        info!(id = point.id, user = %point.user, "location point stored");
        Ok(point)
    }

    async fn location_exists(&self, input: LocationExistsInput) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let packet_id = i32::from(input.packet_id);

        let row = conn
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM location_points
                    WHERE packet_id = $1 OR (user_id = $2 AND device_timestamp = $3)
                 )",
                &[&packet_id, &input.user, &input.timestamp],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }

    async fn list_locations(&self) -> DomainResult<Vec<LocationPoint>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT id, user_id, latitude, longitude, battery, velocity, device_timestamp, packet_id, created_at
                 FROM location_points
                 ORDER BY id",
                &[],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let points = rows
            .iter()
            .map(|row| LocationPoint::try_from(LocationPointRow::from_row(row)))
            .collect::<DomainResult<Vec<_>>>()?;

        debug!(count = points.len(), "listed location points");
        Ok(points)
    }
}
