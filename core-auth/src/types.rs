use serde::{Deserialize, Serialize};
use std::fmt;

/// Correlation tag linking an authorization launch to its platform outcome.
///
/// On Android this is the `requestCode` passed to `startActivityForResult`.
///
/// # Examples
///
/// ```
/// use core_auth::RequestTag;
///
/// let tag = RequestTag::new(1001);
/// assert_eq!(tag.value(), 1001);
/// assert_eq!(tag.to_string(), "1001");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestTag(i32);

impl RequestTag {
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for RequestTag {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

/// Result code reported by the platform for a finished handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityStatus {
    /// `RESULT_OK` (-1)
    Ok,
    /// `RESULT_CANCELED` (0), user pressed back or dismissed the consent UI
    Canceled,
    /// `RESULT_FIRST_USER` (1)
    FirstUser,
    Other(i32),
}

impl ActivityStatus {
    pub const RESULT_OK: i32 = -1;
    pub const RESULT_CANCELED: i32 = 0;
    pub const RESULT_FIRST_USER: i32 = 1;

    pub fn from_code(code: i32) -> Self {
        match code {
            Self::RESULT_OK => ActivityStatus::Ok,
            Self::RESULT_CANCELED => ActivityStatus::Canceled,
            Self::RESULT_FIRST_USER => ActivityStatus::FirstUser,
            other => ActivityStatus::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ActivityStatus::Ok => Self::RESULT_OK,
            ActivityStatus::Canceled => Self::RESULT_CANCELED,
            ActivityStatus::FirstUser => Self::RESULT_FIRST_USER,
            ActivityStatus::Other(code) => *code,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ActivityStatus::Ok)
    }
}

impl From<i32> for ActivityStatus {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

/// Outcome event delivered by the platform once the handshake UI closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityOutcome {
    pub tag: RequestTag,
    pub status: ActivityStatus,
}

impl ActivityOutcome {
    pub fn new(tag: impl Into<RequestTag>, status: impl Into<ActivityStatus>) -> Self {
        Self {
            tag: tag.into(),
            status: status.into(),
        }
    }
}

/// Commands understood by the gateway, parsed from the method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    CheckAvailability,
    HasPermissions,
    RequestAuthorization,
    GetData,
    Unknown(String),
}

impl Command {
    pub fn parse(method: &str) -> Self {
        match method {
            "checkAvailability" => Command::CheckAvailability,
            "hasPermissions" => Command::HasPermissions,
            "requestAuthorization" => Command::RequestAuthorization,
            "getData" => Command::GetData,
            other => Command::Unknown(other.to_string()),
        }
    }

    pub fn method_name(&self) -> &str {
        match self {
            Command::CheckAvailability => "checkAvailability",
            Command::HasPermissions => "hasPermissions",
            Command::RequestAuthorization => "requestAuthorization",
            Command::GetData => "getData",
            Command::Unknown(method) => method,
        }
    }
}

/// Identifies one registration in the pending slot.
///
/// The generation distinguishes successive requests reusing the same tag, so
/// a late timer for an old request cannot resolve a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingTicket {
    pub tag: RequestTag,
    pub generation: u64,
}
