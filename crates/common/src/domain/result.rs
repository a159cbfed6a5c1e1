use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    /// The store rejected the point under one of its uniqueness constraints.
    #[error("Location already exists: {0}")]
    LocationAlreadyExists(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Payload decode error: {0}")]
    PayloadDecodeError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
