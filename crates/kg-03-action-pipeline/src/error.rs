//! Startup-time errors. Per-request failures are [`shared_types::ApiError`].

use thiserror::Error;

/// Action registration failures. Fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Action type already registered: {0}")]
    DuplicateActionType(String),

    #[error("Graph action {0} must require authentication")]
    UnauthenticatedGraphAction(String),
}

/// Pipeline assembly failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Notification channel not configured")]
    MissingNotificationChannel,

    #[error("Graph storage not configured")]
    MissingStorage,

    #[error("Authenticator not configured")]
    MissingAuthenticator,
}

pub type RegistryResult<T> = Result<T, RegistryError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
