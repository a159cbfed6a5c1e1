use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A stored location sample for one user.
///
/// Points are written once at ingestion time and never updated.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPoint {
    pub id: i64,
    pub user: String,
    pub latitude: f64,
    pub longitude: f64,
    pub battery: i32,
    pub velocity: i32,
    /// Device clock, seconds since the Unix epoch as reported by the client
    pub timestamp: i64,
    /// Transport packet identifier of the delivery that produced this point
    pub packet_id: u16,
    pub created_at: DateTime<Utc>,
}

/// Input for storing a new location point
#[derive(Debug, Clone, PartialEq)]
pub struct CreateLocationPointInput {
    pub user: String,
    pub latitude: f64,
    pub longitude: f64,
    pub battery: i32,
    pub velocity: i32,
    pub timestamp: i64,
    pub packet_id: u16,
}

/// Lookup keys for the duplicate check: a point matches on either the
/// packet identifier or the (user, timestamp) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationExistsInput {
    pub packet_id: u16,
    pub user: String,
    pub timestamp: i64,
}

impl From<&CreateLocationPointInput> for LocationExistsInput {
    fn from(input: &CreateLocationPointInput) -> Self {
        Self {
            packet_id: input.packet_id,
            user: input.user.clone(),
            timestamp: input.timestamp,
        }
    }
}

/// Repository trait for location point storage.
///
/// Shared by the ingestion pipeline (writes) and the tracks API (reads).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Store a new point.
    ///
    /// Returns `DomainError::LocationAlreadyExists` when the packet identifier
    /// or the (user, timestamp) pair is already stored.
    async fn insert_location(&self, input: CreateLocationPointInput)
        -> DomainResult<LocationPoint>;

    /// Check whether a point with the same packet identifier, or the same
    /// user and timestamp, is already stored
    async fn location_exists(&self, input: LocationExistsInput) -> DomainResult<bool>;

    /// List every stored point ordered by identity
    async fn list_locations(&self) -> DomainResult<Vec<LocationPoint>>;
}
