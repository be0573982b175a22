pub mod compatibility;
pub mod config;
pub mod cycle;
pub mod db;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod ipc;
pub mod models;
pub mod orchestrator;
pub mod service;
pub mod store;
pub mod validation;

pub use config::{FitlinkConfig, LinksConfig};
pub use error::{ErrorCode, FitlinkError, LinkServiceError, ServiceError};
pub use gateway::{ExerciseLookup, LinkRepository, RepositoryError};
pub use ids::{ExerciseId, ExerciseLinkId};
pub use models::{ExerciseLink, ExerciseLinkType, ExerciseSnapshot, ExerciseTypeTag};
pub use service::LinkGraphService;
pub use validation::{CreateLinkCommand, UpdateLinkCommand};
