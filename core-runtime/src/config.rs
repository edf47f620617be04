//! # Plugin Configuration Module
//!
//! Configuration for the health bridge plugin.
//!
//! ## Overview
//!
//! [`PluginConfig`] is built through [`PluginConfigBuilder`] and validated
//! before the plugin starts, so a bad channel name or a zero timeout fails at
//! startup instead of on the first authorization request.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{PendingPolicy, PluginConfig};
//! use std::time::Duration;
//!
//! let config = PluginConfig::builder()
//!     .pending_policy(PendingPolicy::EvictPrevious)
//!     .authorization_timeout(Some(Duration::from_secs(30)))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.channel_name, "health");
//! assert_eq!(config.request_code, 1001);
//! ```
//!
//! ## Environment Overrides
//!
//! [`PluginConfigBuilder::with_env_overrides`] reads:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `HEALTH_BRIDGE_AUTH_TIMEOUT_SECS` | handshake timeout in seconds, `0` disables it |
//! | `HEALTH_BRIDGE_PENDING_POLICY` | `reject` or `evict` |

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Method channel name the host registers the plugin under.
pub const DEFAULT_CHANNEL_NAME: &str = "health";

/// Request code tagging the consent handshake's activity result.
pub const DEFAULT_REQUEST_CODE: i32 = 1001;

/// Read-only fitness activity scope.
pub const FITNESS_ACTIVITY_READ_SCOPE: &str =
    "https://www.googleapis.com/auth/fitness.activity.read";

/// Default timeout for a pending consent handshake (2 minutes)
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

const ENV_AUTH_TIMEOUT_SECS: &str = "HEALTH_BRIDGE_AUTH_TIMEOUT_SECS";
const ENV_PENDING_POLICY: &str = "HEALTH_BRIDGE_PENDING_POLICY";

/// What to do when an authorization request arrives while another is pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// Answer the new caller with `ALREADY_PENDING`; the first request keeps the slot.
    #[default]
    RejectIfPending,
    /// Answer the old caller with `AUTH_SUPERSEDED` and give the slot to the new one.
    EvictPrevious,
}

impl FromStr for PendingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "reject_if_pending" => Ok(Self::RejectIfPending),
            "evict" | "evict_previous" => Ok(Self::EvictPrevious),
            other => Err(Error::Config(format!(
                "Unknown pending policy '{}'. Expected 'reject' or 'evict'.",
                other
            ))),
        }
    }
}

/// Health bridge plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    /// Method channel name
    pub channel_name: String,

    /// Request code used to correlate the handshake result
    pub request_code: i32,

    /// Vendor scopes requested during authorization
    pub scopes: Vec<String>,

    /// Policy for a second request while one is pending
    pub pending_policy: PendingPolicy,

    /// How long a handshake may stay pending; `None` waits forever
    pub authorization_timeout: Option<Duration>,

    /// Event bus capacity
    pub event_buffer_size: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            request_code: DEFAULT_REQUEST_CODE,
            scopes: vec![FITNESS_ACTIVITY_READ_SCOPE.to_string()],
            pending_policy: PendingPolicy::default(),
            authorization_timeout: Some(DEFAULT_AUTHORIZATION_TIMEOUT),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl PluginConfig {
    /// Creates a new builder seeded with the defaults.
    pub fn builder() -> PluginConfigBuilder {
        PluginConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Channel name is not blank
    /// - At least one scope is requested and none is blank
    /// - A configured timeout is non-zero
    /// - Event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if self.channel_name.trim().is_empty() {
            return Err(Error::Config("Channel name cannot be empty".to_string()));
        }

        if self.scopes.is_empty() {
            return Err(Error::Config(
                "At least one authorization scope is required".to_string(),
            ));
        }

        if self.scopes.iter().any(|scope| scope.trim().is_empty()) {
            return Err(Error::Config(
                "Authorization scopes cannot be blank".to_string(),
            ));
        }

        if self.authorization_timeout == Some(Duration::ZERO) {
            return Err(Error::Config(
                "Authorization timeout must be greater than zero. \
                 Use None to disable the timeout."
                    .to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`PluginConfig`].
#[derive(Debug, Default)]
pub struct PluginConfigBuilder {
    channel_name: Option<String>,
    request_code: Option<i32>,
    scopes: Option<Vec<String>>,
    pending_policy: Option<PendingPolicy>,
    authorization_timeout: Option<Option<Duration>>,
    event_buffer_size: Option<usize>,
}

impl PluginConfigBuilder {
    pub fn channel_name(mut self, name: impl Into<String>) -> Self {
        self.channel_name = Some(name.into());
        self
    }

    pub fn request_code(mut self, code: i32) -> Self {
        self.request_code = Some(code);
        self
    }

    /// Replaces the requested scopes.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn pending_policy(mut self, policy: PendingPolicy) -> Self {
        self.pending_policy = Some(policy);
        self
    }

    /// Sets the handshake timeout; `None` disables it.
    pub fn authorization_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.authorization_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Applies `HEALTH_BRIDGE_*` environment variables on top of the values
    /// set so far.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a variable is set but cannot be parsed.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_AUTH_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_AUTH_TIMEOUT_SECS, raw
                ))
            })?;
            self.authorization_timeout = Some((secs > 0).then(|| Duration::from_secs(secs)));
        }

        if let Some(raw) = lookup(ENV_PENDING_POLICY) {
            self.pending_policy = Some(raw.parse()?);
        }

        Ok(self)
    }

    /// Builds and validates the final [`PluginConfig`].
    pub fn build(self) -> Result<PluginConfig> {
        let defaults = PluginConfig::default();

        let config = PluginConfig {
            channel_name: self.channel_name.unwrap_or(defaults.channel_name),
            request_code: self.request_code.unwrap_or(defaults.request_code),
            scopes: self.scopes.unwrap_or(defaults.scopes),
            pending_policy: self.pending_policy.unwrap_or(defaults.pending_policy),
            authorization_timeout: self
                .authorization_timeout
                .unwrap_or(defaults.authorization_timeout),
            event_buffer_size: self.event_buffer_size.unwrap_or(defaults.event_buffer_size),
        };

        config.validate()?;

        Ok(config)
    }
}
