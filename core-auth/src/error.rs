use bridge_traits::{BridgeError, MethodResponse};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::types::RequestTag;

/// Message returned when the platform reports a non-OK handshake result.
pub const AUTHORIZATION_FAILED_MESSAGE: &str = "Google Fit authorization failed";

#[derive(Error, Debug)]
pub enum GatewayError {
    /// No foreground surface to anchor the vendor UI on.
    #[error("Activity not available")]
    NoContext,

    #[error("{message}")]
    AuthorizationFailed { message: String, status: i32 },

    #[error("Authorization request {pending} is already in progress")]
    AlreadyPending { pending: RequestTag },

    #[error("Authorization request {tag} was superseded by a newer request")]
    Superseded { tag: RequestTag },

    #[error("Authorization request {tag} timed out after {}s", .after.as_secs())]
    TimedOut { tag: RequestTag, after: Duration },

    #[error("Method '{method}' is not implemented")]
    NotImplemented { method: String },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Platform bridge error: {0}")]
    Bridge(BridgeError),
}

impl GatewayError {
    /// Machine-readable code sent to the application layer.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::NoContext => "NO_ACTIVITY",
            GatewayError::AuthorizationFailed { .. } => "AUTH_FAILED",
            GatewayError::AlreadyPending { .. } => "ALREADY_PENDING",
            GatewayError::Superseded { .. } => "AUTH_SUPERSEDED",
            GatewayError::TimedOut { .. } => "AUTH_TIMEOUT",
            GatewayError::NotImplemented { .. } => "NOT_IMPLEMENTED",
            GatewayError::InvalidArguments(_) => "INVALID_ARGUMENTS",
            GatewayError::Bridge(_) => "BRIDGE_ERROR",
        }
    }

    /// Converts the error into the reply sent through the method channel.
    pub fn into_response(self) -> MethodResponse {
        let response = MethodResponse::error(self.code(), self.to_string());
        match self {
            GatewayError::NotImplemented { .. } => MethodResponse::NotImplemented,
            GatewayError::AuthorizationFailed { status, .. } => {
                response.with_details(json!({ "status": status }))
            }
            GatewayError::AlreadyPending { pending } => {
                response.with_details(json!({ "requestCode": pending.value() }))
            }
            _ => response,
        }
    }
}

impl From<BridgeError> for GatewayError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::SurfaceUnavailable(_) => GatewayError::NoContext,
            BridgeError::InvalidArgument { name, message } => {
                GatewayError::InvalidArguments(format!("{}: {}", name, message))
            }
            other => GatewayError::Bridge(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
