//! Method Channel Boundary
//!
//! Value types exchanged with the cross-platform method-call transport, plus
//! the one-shot [`ResultSink`] used to answer a call.
//!
//! The transport itself (message codec, isolate hopping, engine binding) is
//! owned by the host. The core only sees a decoded [`MethodCall`] and hands
//! back exactly one [`MethodResponse`] through the sink it was given.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{BridgeError, Result};

/// A decoded method invocation coming from the application layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Method name, e.g. `"requestAuthorization"`
    pub method: String,
    /// Argument mapping (usually a JSON object, `Null` when absent)
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    pub fn without_arguments(method: impl Into<String>) -> Self {
        Self::new(method, Value::Null)
    }

    /// Look up a typed argument.
    ///
    /// Missing keys and explicit `null` values yield `Ok(None)`. A value that is
    /// present but cannot be decoded as `T` is reported as
    /// [`BridgeError::InvalidArgument`].
    ///
    /// # Example
    ///
    /// ```
    /// use bridge_traits::channel::MethodCall;
    /// use serde_json::json;
    ///
    /// let call = MethodCall::new("hasPermissions", json!({ "types": ["STEPS"] }));
    /// let types: Option<Vec<String>> = call.argument("types").unwrap();
    /// assert_eq!(types, Some(vec!["STEPS".to_string()]));
    ///
    /// let permissions: Option<Vec<i32>> = call.argument("permissions").unwrap();
    /// assert!(permissions.is_none());
    /// ```
    pub fn argument<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value = match self.arguments.get(key) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value,
        };

        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| BridgeError::InvalidArgument {
                name: key.to_string(),
                message: e.to_string(),
            })
    }
}

/// Reply to a [`MethodCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    /// Call completed with a value
    Success { value: Value },
    /// Call failed with a machine-readable code and a human message
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
    /// The method name is not handled by this plugin
    NotImplemented,
}

impl MethodResponse {
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(self, details: Value) -> Self {
        match self {
            Self::Error { code, message, .. } => Self::Error {
                code,
                message,
                details: Some(details),
            },
            other => other,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error code, if this is an error response.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// One-shot continuation answering a single method call.
///
/// Consuming `self` makes double delivery impossible. Dropping a sink without
/// calling [`deliver`](ResultSink::deliver) means the caller never hears back;
/// hosts that care must observe the drop themselves (a `oneshot::Receiver`
/// sees it as a closed channel).
pub trait ResultSink: Send {
    fn deliver(self: Box<Self>, response: MethodResponse);
}

impl ResultSink for oneshot::Sender<MethodResponse> {
    fn deliver(self: Box<Self>, response: MethodResponse) {
        // Receiver gone means the caller stopped waiting; nothing left to notify.
        let _ = (*self).send(response);
    }
}

/// Adapts a closure into a [`ResultSink`].
///
/// ```
/// use bridge_traits::channel::{CallbackSink, MethodResponse, ResultSink};
///
/// let sink: Box<dyn ResultSink> = Box::new(CallbackSink::new(|response: MethodResponse| {
///     assert!(response.is_success());
/// }));
/// sink.deliver(MethodResponse::success(true));
/// ```
pub struct CallbackSink<F>(F);

impl<F> CallbackSink<F>
where
    F: FnOnce(MethodResponse) + Send,
{
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F> ResultSink for CallbackSink<F>
where
    F: FnOnce(MethodResponse) + Send,
{
    fn deliver(self: Box<Self>, response: MethodResponse) {
        (self.0)(response)
    }
}
