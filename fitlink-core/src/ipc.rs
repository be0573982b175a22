use serde::{Deserialize, Serialize};

use crate::error::{LinkServiceError, ServiceError};

fn default_true() -> bool {
    true
}

/// Requests accepted on the Unix socket. Ids travel in their prefixed
/// string form (`exercise-<uuid>`, `exerciselink-<uuid>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LinkRequest {
    Ping,
    Health,
    CreateLink {
        exercise_id: String,
        target_exercise_id: String,
        link_type: String,
        display_order: Option<i64>,
    },
    ListLinks {
        exercise_id: String,
        link_type: Option<String>,
    },
    ListInbound {
        exercise_id: String,
    },
    Bidirectional {
        exercise_id: String,
        link_type: String,
    },
    Suggest {
        exercise_id: String,
        count: Option<i64>,
    },
    UpdateLink {
        exercise_id: String,
        link_id: String,
        display_order: i64,
        is_active: bool,
    },
    DeleteLink {
        exercise_id: String,
        link_id: String,
        #[serde(default = "default_true")]
        delete_reverse: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LinkResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ServiceError>,
    pub version: String,
}

impl LinkResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            errors: Vec::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            errors: Vec::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Error response carrying every individual rule violation.
    pub fn from_service_error(err: &LinkServiceError) -> Self {
        Self {
            errors: err.errors(),
            ..Self::err(err.to_string())
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
