//! Vendor Health SDK Abstractions
//!
//! Traits wrapping the vendor fitness/health SDK the host links against
//! (Google Fit on Android, HealthKit on iOS). The core talks to these traits
//! only; account selection, consent screens and scope handling stay inside the
//! platform implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::surface::HostSurface;

/// Access level requested for a data type.
///
/// Encoded on the wire as an integer (`0` read, `1` write, `2` read/write).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum HealthAccess {
    Read,
    Write,
    ReadWrite,
}

impl HealthAccess {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Read),
            1 => Some(Self::Write),
            2 => Some(Self::ReadWrite),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Read => 0,
            Self::Write => 1,
            Self::ReadWrite => 2,
        }
    }

    pub fn allows_write(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

impl From<HealthAccess> for i32 {
    fn from(access: HealthAccess) -> Self {
        access.code()
    }
}

impl TryFrom<i32> for HealthAccess {
    type Error = String;

    fn try_from(code: i32) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown access code {}", code))
    }
}

/// What the caller wants access to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Data type keys (e.g. `"STEPS"`, `"HEART_RATE"`)
    pub types: Vec<String>,
    /// Access level per type, positionally matched with `types`
    pub permissions: Vec<HealthAccess>,
    /// Vendor scopes the platform should ask for
    pub scopes: Vec<String>,
}

impl AccessRequest {
    pub fn requires_write(&self) -> bool {
        self.permissions.iter().any(HealthAccess::allows_write)
    }
}

/// Vendor authorization SDK.
///
/// Both calls are synchronous from the core's point of view: the permission
/// check reads cached account state, and the launch only starts the handshake.
/// The handshake result arrives later through the host's activity-result
/// callback tagged with `request_code`.
///
/// # Platform Support
///
/// - **Android**: `GoogleSignIn.hasPermissions` / `startActivityForResult`
/// - **iOS**: `HKHealthStore.authorizationStatus` / `requestAuthorization`
pub trait AuthorizationClient: Send + Sync {
    /// Whether the signed-in account already holds the requested access.
    fn has_permissions(&self, surface: &dyn HostSurface, request: &AccessRequest) -> Result<bool>;

    /// Start the consent handshake anchored on `surface`.
    ///
    /// Must return as soon as the UI is launched; it must not wait for the user.
    fn launch_authorization(
        &self,
        surface: &dyn HostSurface,
        request: &AccessRequest,
        request_code: i32,
    ) -> Result<()>;
}

/// Probe answering whether the vendor health service exists on this device.
#[async_trait]
pub trait CapabilityProbe: Send + Sync {
    async fn is_available(&self) -> Result<bool>;
}

/// Query parameters for [`HealthDataSource::query`].
///
/// `startTime` / `endTime` accept epoch milliseconds (what the Dart side
/// sends) or RFC 3339 strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    #[serde(default, rename = "dataTypeKey")]
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Text(DateTime<Utc>),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<WireTimestamp>::deserialize(deserializer)? {
        None => Ok(None),
        Some(WireTimestamp::Text(at)) => Ok(Some(at)),
        Some(WireTimestamp::Millis(millis)) => DateTime::<Utc>::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| {
                serde::de::Error::custom(format!("timestamp {} ms is out of range", millis))
            }),
    }
}

/// A single health data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    pub data_type: String,
    pub value: f64,
    pub unit: String,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// Reads health records from the vendor store.
#[async_trait]
pub trait HealthDataSource: Send + Sync {
    async fn query(&self, query: &DataQuery) -> Result<Vec<HealthRecord>>;
}
