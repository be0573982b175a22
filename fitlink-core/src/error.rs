use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::gateway::RepositoryError;

#[derive(Error, Debug)]
pub enum FitlinkError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Machine-readable category of a single rule violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

/// One failed check: category plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Validation,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl fmt::Display) -> Self {
        Self {
            code: ErrorCode::NotFound,
            message: format!("{} not found: {}", entity, id),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Conflict,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: message.into(),
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a failed link graph operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkServiceError {
    /// One or more rule violations, all reported together. Duplicate and
    /// capacity conflicts travel here with `ErrorCode::Conflict`.
    #[error("Validation failed: {}", join_messages(.0))]
    ValidationFailed(Vec<ServiceError>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Collaborator failure not attributable to caller input.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LinkServiceError {
    pub fn single(error: ServiceError) -> Self {
        Self::ValidationFailed(vec![error])
    }

    pub fn link_not_found(id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: "ExerciseLink",
            id: id.to_string(),
        }
    }

    pub fn primary_code(&self) -> ErrorCode {
        match self {
            Self::ValidationFailed(errors) => errors
                .first()
                .map(|e| e.code)
                .unwrap_or(ErrorCode::Validation),
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Flattened view used by the outer surfaces.
    pub fn errors(&self) -> Vec<ServiceError> {
        match self {
            Self::ValidationFailed(errors) => errors.clone(),
            Self::NotFound { entity, id } => vec![ServiceError::not_found(entity, id)],
            Self::Internal(msg) => vec![ServiceError::internal(msg.clone())],
        }
    }

    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.errors().iter().any(|e| e.code == code)
    }
}

impl From<RepositoryError> for LinkServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => Self::single(ServiceError::conflict(msg)),
            RepositoryError::NotFound(id) => Self::link_not_found(id),
            other => Self::Internal(other.to_string()),
        }
    }
}

fn join_messages(errors: &[ServiceError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}
