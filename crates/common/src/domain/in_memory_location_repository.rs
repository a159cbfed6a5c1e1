use crate::domain::{
    CreateLocationPointInput, DomainError, DomainResult, LocationExistsInput, LocationPoint,
    LocationRepository,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of LocationRepository.
///
/// Enforces the same two uniqueness rules as the PostgreSQL schema. Used by
/// tests and for running the pipeline without a database.
#[derive(Clone)]
pub struct InMemoryLocationRepository {
    points: Arc<RwLock<Vec<LocationPoint>>>,
}

impl InMemoryLocationRepository {
    pub fn new() -> Self {
        Self {
            points: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn count(&self) -> usize {
        self.points.read().await.len()
    }
}

impl Default for InMemoryLocationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationRepository for InMemoryLocationRepository {
    async fn insert_location(
        &self,
        input: CreateLocationPointInput,
    ) -> DomainResult<LocationPoint> {
        // Single write lock spans the check and the push, like a unique index would
        let mut points = self.points.write().await;

        if points.iter().any(|p| p.packet_id == input.packet_id) {
            return Err(DomainError::LocationAlreadyExists(format!(
                "packet_id {}",
                input.packet_id
            )));
        }
        if points
            .iter()
            .any(|p| p.user == input.user && p.timestamp == input.timestamp)
        {
            return Err(DomainError::LocationAlreadyExists(format!(
                "user {} at {}",
                input.user, input.timestamp
            )));
        }

        let next_id = points.last().map_or(1, |p| p.id + 1);
        let point = LocationPoint {
            id: next_id,
            user: input.user,
            latitude: input.latitude,
            longitude: input.longitude,
            battery: input.battery,
            velocity: input.velocity,
            timestamp: input.timestamp,
            packet_id: input.packet_id,
            created_at: chrono::Utc::now(),
        };
        points.push(point.clone());
        Ok(point)
    }

    async fn location_exists(&self, input: LocationExistsInput) -> DomainResult<bool> {
        let points = self.points.read().await;
        Ok(points.iter().any(|p| {
            p.packet_id == input.packet_id
                || (p.user == input.user && p.timestamp == input.timestamp)
        }))
    }

    async fn list_locations(&self) -> DomainResult<Vec<LocationPoint>> {
        let points = self.points.read().await;
        Ok(points.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(user: &str, timestamp: i64, packet_id: u16) -> CreateLocationPointInput {
        CreateLocationPointInput {
            user: user.to_string(),
            latitude: 52.1,
            longitude: 4.3,
            battery: 80,
            velocity: 3,
            timestamp,
            packet_id,
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let repo = InMemoryLocationRepository::new();

        let first = repo.insert_location(input("alice", 1, 1)).await.unwrap();
        let second = repo.insert_location(input("alice", 2, 2)).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repo.count().await, 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_packet_id() {
        let repo = InMemoryLocationRepository::new();
        repo.insert_location(input("alice", 1, 7)).await.unwrap();

        let result = repo.insert_location(input("bob", 2, 7)).await;

        assert!(matches!(result, Err(DomainError::LocationAlreadyExists(_))));
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_user_timestamp() {
        let repo = InMemoryLocationRepository::new();
        repo.insert_location(input("alice", 1700000000, 7)).await.unwrap();

        let result = repo.insert_location(input("alice", 1700000000, 8)).await;

        assert!(matches!(result, Err(DomainError::LocationAlreadyExists(_))));
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn test_same_timestamp_for_different_users_is_allowed() {
        let repo = InMemoryLocationRepository::new();
        repo.insert_location(input("alice", 1700000000, 7)).await.unwrap();

        repo.insert_location(input("bob", 1700000000, 8)).await.unwrap();

        assert_eq!(repo.count().await, 2);
    }

    #[tokio::test]
    async fn test_location_exists_matches_either_key() {
        let repo = InMemoryLocationRepository::new();
        repo.insert_location(input("alice", 100, 7)).await.unwrap();

        let by_packet = LocationExistsInput {
            packet_id: 7,
            user: "bob".to_string(),
            timestamp: 999,
        };
        let by_user_timestamp = LocationExistsInput {
            packet_id: 42,
            user: "alice".to_string(),
            timestamp: 100,
        };
        let unseen = LocationExistsInput {
            packet_id: 42,
            user: "alice".to_string(),
            timestamp: 101,
        };

        assert!(repo.location_exists(by_packet).await.unwrap());
        assert!(repo.location_exists(by_user_timestamp).await.unwrap());
        assert!(!repo.location_exists(unseen).await.unwrap());
    }
}
