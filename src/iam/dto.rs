use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::iam::error::SignupError;

/// Request body for `POST /signup`. The payload stays untyped here; the
/// validator owns its shape.
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub db_flavour: String,
    pub signup_payload: Value,
}

/// Result of a signup call. `status` is the logical outcome; a rejection is
/// still a well-formed response, not a transport error.
#[derive(Debug, Serialize, Deserialize)]
pub struct SignupOutcome {
    pub status: bool,
    pub message: String,
}

impl SignupOutcome {
    pub fn success() -> Self {
        Self {
            status: true,
            message: "Signup is successful! Please try login.".into(),
        }
    }

    pub fn rejection(err: &SignupError) -> Self {
        Self {
            status: false,
            message: err.user_message(),
        }
    }
}
