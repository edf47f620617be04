//! # Event Bus System
//!
//! Broadcasts what the plugin is doing (handshakes started, answered, dropped;
//! surfaces coming and going) using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`CoreEvent`] wrapping [`AuthorizationEvent`] and [`SurfaceEvent`]
//! - **EventBus**: central broadcast channel for publishing events
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! Emitting never blocks and never fails the operation that emits: with no
//! subscriber the event is simply dropped.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AuthorizationEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Authorization(AuthorizationEvent::Requested {
//!     request_code: 1001,
//!     surface_id: "main".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.description(), "Authorization requested");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: subscriber missed `n` events; keep receiving.
//! - **`RecvError::Closed`**: every sender is gone; the plugin was dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub use crate::config::DEFAULT_EVENT_BUFFER_SIZE;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Consent handshake lifecycle
    Authorization(AuthorizationEvent),
    /// Foreground surface lifecycle
    Surface(SurfaceEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Authorization(e) => e.description(),
            CoreEvent::Surface(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Authorization(AuthorizationEvent::Denied { .. })
            | CoreEvent::Authorization(AuthorizationEvent::TimedOut { .. })
            | CoreEvent::Authorization(AuthorizationEvent::LaunchFailed { .. }) => {
                EventSeverity::Error
            }
            CoreEvent::Authorization(AuthorizationEvent::Abandoned { .. })
            | CoreEvent::Authorization(AuthorizationEvent::Superseded { .. })
            | CoreEvent::Authorization(AuthorizationEvent::StrayOutcome { .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Authorization(AuthorizationEvent::Granted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authorization Events
// ============================================================================

/// Consent handshake lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthorizationEvent {
    /// A caller is now pending; published before the handshake UI launches.
    Requested {
        request_code: i32,
        /// Surface the UI was anchored on.
        surface_id: String,
    },
    /// Platform reported success; the caller got `true`.
    Granted { request_code: i32 },
    /// Platform reported a non-OK result; the caller got `AUTH_FAILED`.
    Denied {
        request_code: i32,
        /// Raw platform result code.
        status: i32,
    },
    /// No result before the configured timeout; the caller got `AUTH_TIMEOUT`.
    TimedOut { request_code: i32, after_secs: u64 },
    /// A newer request evicted this one; the caller got `AUTH_SUPERSEDED`.
    Superseded { request_code: i32 },
    /// Pending request dropped on teardown; the caller will never hear back.
    Abandoned { request_code: i32 },
    /// Outcome arrived with nothing pending to receive it.
    StrayOutcome { request_code: i32, status: i32 },
    /// The SDK could not show the consent UI; the caller got the launch error.
    LaunchFailed { request_code: i32, message: String },
}

impl AuthorizationEvent {
    fn description(&self) -> &str {
        match self {
            AuthorizationEvent::Requested { .. } => "Authorization requested",
            AuthorizationEvent::Granted { .. } => "Authorization granted",
            AuthorizationEvent::Denied { .. } => "Authorization denied",
            AuthorizationEvent::TimedOut { .. } => "Authorization timed out",
            AuthorizationEvent::Superseded { .. } => "Authorization superseded by a newer request",
            AuthorizationEvent::Abandoned { .. } => "Pending authorization abandoned",
            AuthorizationEvent::StrayOutcome { .. } => "Ignored authorization outcome",
            AuthorizationEvent::LaunchFailed { .. } => "Authorization UI failed to launch",
        }
    }
}

// ============================================================================
// Surface Events
// ============================================================================

/// Foreground surface lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SurfaceEvent {
    Attached {
        surface_id: String,
    },
    Detached {
        /// Surface that was attached, if it was still alive.
        surface_id: Option<String>,
        /// `true` for a transient detach (rotation, theme change)
        config_change: bool,
    },
}

impl SurfaceEvent {
    fn description(&self) -> &str {
        match self {
            SurfaceEvent::Attached { .. } => "Foreground surface attached",
            SurfaceEvent::Detached {
                config_change: true,
                ..
            } => "Foreground surface detached for configuration change",
            SurfaceEvent::Detached { .. } => "Foreground surface detached",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for [`CoreEvent`]s. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// `capacity` is the number of events buffered per subscriber before it
    /// starts receiving `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let auth_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Authorization(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
