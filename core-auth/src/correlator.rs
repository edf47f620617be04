//! # Request Correlator
//!
//! Owns the single pending-authorization slot and matches asynchronous
//! platform outcomes with the caller that started the handshake.
//!
//! ## Lost callbacks
//!
//! [`PendingSlot::clear`] drops the stored continuation without answering it.
//! This is what happens when the foreground surface is destroyed before the
//! platform reports back: the caller never receives a response. Hosts that
//! await the answer through a `oneshot` channel observe this as a closed
//! channel.
//!
//! ## Concurrency
//!
//! `register`, `resolve` and `clear` are serialized by one mutex. Continuations
//! are always invoked after the lock is released, so a continuation may call
//! back into the correlator.

use bridge_traits::{Clock, MethodResponse, ResultSink, SystemClock};
use chrono::{DateTime, Utc};
use core_runtime::config::PendingPolicy;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::types::{PendingTicket, RequestTag};

/// Continuation resuming the caller of `requestAuthorization`.
pub type Continuation = Box<dyn ResultSink>;

/// Value or failure delivered to a continuation.
pub type Outcome = std::result::Result<Value, GatewayError>;

/// Successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registered {
    pub ticket: PendingTicket,
    /// Request evicted to make room, already answered with `AUTH_SUPERSEDED`.
    pub superseded: Option<PendingTicket>,
}

/// Registration refused because another request is in flight.
///
/// The continuation is handed back untouched so the caller can be answered.
pub struct AlreadyPending {
    pub pending: RequestTag,
    pub continuation: Continuation,
}

impl AlreadyPending {
    /// Answers the rejected caller with `ALREADY_PENDING`.
    pub fn reject(self) {
        self.continuation.deliver(
            GatewayError::AlreadyPending {
                pending: self.pending,
            }
            .into_response(),
        );
    }
}

impl fmt::Debug for AlreadyPending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlreadyPending")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

/// Narrow capability consumed by the gateway.
///
/// Implementations must keep at most one pending request at any instant and
/// must never invoke a continuation more than once.
pub trait PendingSlot: Send + Sync {
    /// Store `continuation` under `tag`.
    fn register(
        &self,
        tag: RequestTag,
        continuation: Continuation,
    ) -> std::result::Result<Registered, AlreadyPending>;

    /// Resolve the pending request if its tag matches. Returns whether anything
    /// was delivered.
    fn resolve(&self, tag: RequestTag, outcome: Outcome) -> bool;

    /// Resolve only the exact registration identified by `ticket`.
    fn resolve_ticket(&self, ticket: PendingTicket, outcome: Outcome) -> bool;

    /// Drop the pending continuation without answering it.
    fn clear(&self) -> Option<PendingTicket>;

    fn pending_ticket(&self) -> Option<PendingTicket>;

    fn is_pending(&self) -> bool {
        self.pending_ticket().is_some()
    }
}

struct PendingRequest {
    ticket: PendingTicket,
    continuation: Continuation,
    registered_at: DateTime<Utc>,
}

#[derive(Default)]
struct SlotState {
    pending: Option<PendingRequest>,
    next_generation: u64,
}

/// Snapshot of the in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingInfo {
    pub ticket: PendingTicket,
    pub registered_at: DateTime<Utc>,
}

/// Mutex-guarded single-slot [`PendingSlot`].
pub struct RequestCorrelator {
    state: Mutex<SlotState>,
    policy: PendingPolicy,
    clock: Arc<dyn Clock>,
}

impl RequestCorrelator {
    pub fn new(policy: PendingPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    pub fn with_clock(policy: PendingPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(SlotState::default()),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> PendingPolicy {
        self.policy
    }

    pub fn pending(&self) -> Option<PendingInfo> {
        self.state.lock().pending.as_ref().map(|p| PendingInfo {
            ticket: p.ticket,
            registered_at: p.registered_at,
        })
    }

    fn take_if<F>(&self, matches: F) -> Option<PendingRequest>
    where
        F: FnOnce(&PendingTicket) -> bool,
    {
        let mut state = self.state.lock();
        match state.pending.as_ref() {
            Some(pending) if matches(&pending.ticket) => state.pending.take(),
            _ => None,
        }
    }

    fn complete(&self, request: PendingRequest, outcome: Outcome) {
        let elapsed_ms = (self.clock.now() - request.registered_at).num_milliseconds();
        debug!(
            request_code = request.ticket.tag.value(),
            generation = request.ticket.generation,
            elapsed_ms,
            success = outcome.is_ok(),
            "Resolving pending authorization"
        );

        let response = match outcome {
            Ok(value) => MethodResponse::success(value),
            Err(err) => err.into_response(),
        };
        request.continuation.deliver(response);
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new(PendingPolicy::default())
    }
}

impl fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("policy", &self.policy)
            .field("pending", &self.pending())
            .finish()
    }
}

impl PendingSlot for RequestCorrelator {
    fn register(
        &self,
        tag: RequestTag,
        continuation: Continuation,
    ) -> std::result::Result<Registered, AlreadyPending> {
        let (ticket, evicted) = {
            let mut state = self.state.lock();

            if let Some(existing) = state.pending.as_ref() {
                if self.policy == PendingPolicy::RejectIfPending {
                    debug!(
                        request_code = tag.value(),
                        pending = existing.ticket.tag.value(),
                        "Rejecting authorization, another request is pending"
                    );
                    return Err(AlreadyPending {
                        pending: existing.ticket.tag,
                        continuation,
                    });
                }
            }

            state.next_generation += 1;
            let ticket = PendingTicket {
                tag,
                generation: state.next_generation,
            };
            let evicted = state.pending.replace(PendingRequest {
                ticket,
                continuation,
                registered_at: self.clock.now(),
            });
            (ticket, evicted)
        };

        let superseded = evicted.map(|old| {
            let old_ticket = old.ticket;
            warn!(
                request_code = old_ticket.tag.value(),
                generation = old_ticket.generation,
                "Evicting pending authorization in favour of a newer request"
            );
            self.complete(
                old,
                Err(GatewayError::Superseded {
                    tag: old_ticket.tag,
                }),
            );
            old_ticket
        });

        Ok(Registered { ticket, superseded })
    }

    fn resolve(&self, tag: RequestTag, outcome: Outcome) -> bool {
        match self.take_if(|ticket| ticket.tag == tag) {
            Some(request) => {
                self.complete(request, outcome);
                true
            }
            None => {
                debug!(request_code = tag.value(), "No pending request for outcome");
                false
            }
        }
    }

    fn resolve_ticket(&self, ticket: PendingTicket, outcome: Outcome) -> bool {
        match self.take_if(|pending| *pending == ticket) {
            Some(request) => {
                self.complete(request, outcome);
                true
            }
            None => false,
        }
    }

    fn clear(&self) -> Option<PendingTicket> {
        let dropped = self.state.lock().pending.take();
        dropped.map(|request| {
            debug!(
                request_code = request.ticket.tag.value(),
                "Dropping pending authorization without a response"
            );
            // Dropping the continuation is the documented lost-callback path.
            request.ticket
        })
    }

    fn pending_ticket(&self) -> Option<PendingTicket> {
        self.state.lock().pending.as_ref().map(|p| p.ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{CallbackSink, FixedClock};
    use serde_json::json;

    type Log = Arc<Mutex<Vec<MethodResponse>>>;

    fn recording_sink(log: &Log) -> Continuation {
        let log = Arc::clone(log);
        Box::new(CallbackSink::new(move |response| log.lock().push(response)))
    }

    fn tag() -> RequestTag {
        RequestTag::new(1001)
    }

    #[test]
    fn test_register_and_resolve_once() {
        let correlator = RequestCorrelator::default();
        let log: Log = Arc::default();

        let registered = correlator.register(tag(), recording_sink(&log)).unwrap();
        assert_eq!(registered.ticket.tag, tag());
        assert!(registered.superseded.is_none());
        assert!(correlator.is_pending());

        assert!(correlator.resolve(tag(), Ok(json!(true))));
        assert!(!correlator.is_pending());
        assert!(!correlator.resolve(tag(), Ok(json!(true))));

        assert_eq!(*log.lock(), vec![MethodResponse::success(true)]);
    }

    #[test]
    fn test_resolve_with_nothing_pending_is_noop() {
        let correlator = RequestCorrelator::default();
        assert!(!correlator.resolve(tag(), Ok(json!(true))));
        assert!(!correlator.resolve(RequestTag::new(7), Err(GatewayError::NoContext)));
    }

    #[test]
    fn test_resolve_with_unmatched_tag_keeps_pending() {
        let correlator = RequestCorrelator::default();
        let log: Log = Arc::default();
        correlator.register(tag(), recording_sink(&log)).unwrap();

        assert!(!correlator.resolve(RequestTag::new(42), Ok(json!(true))));
        assert!(correlator.is_pending());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_reject_policy_hands_continuation_back() {
        let correlator = RequestCorrelator::new(PendingPolicy::RejectIfPending);
        let first: Log = Arc::default();
        let second: Log = Arc::default();

        let registered = correlator.register(tag(), recording_sink(&first)).unwrap();
        let rejected = correlator
            .register(tag(), recording_sink(&second))
            .unwrap_err();
        assert_eq!(rejected.pending, tag());

        rejected.reject();
        assert_eq!(second.lock()[0].error_code(), Some("ALREADY_PENDING"));
        assert_eq!(correlator.pending_ticket(), Some(registered.ticket));
        assert!(first.lock().is_empty());
    }

    #[test]
    fn test_evict_policy_answers_previous_caller() {
        let correlator = RequestCorrelator::new(PendingPolicy::EvictPrevious);
        let first: Log = Arc::default();
        let second: Log = Arc::default();

        let old = correlator.register(tag(), recording_sink(&first)).unwrap();
        let new = correlator.register(tag(), recording_sink(&second)).unwrap();

        assert_eq!(new.superseded, Some(old.ticket));
        assert_ne!(new.ticket, old.ticket);
        assert_eq!(first.lock()[0].error_code(), Some("AUTH_SUPERSEDED"));
        assert!(second.lock().is_empty());

        // Old ticket no longer resolves anything.
        assert!(!correlator.resolve_ticket(old.ticket, Ok(json!(true))));
        assert!(correlator.resolve_ticket(new.ticket, Ok(json!(true))));
        assert_eq!(second.lock()[0], MethodResponse::success(true));
    }

    #[test]
    fn test_clear_never_invokes_continuation() {
        let correlator = RequestCorrelator::default();
        let log: Log = Arc::default();
        let registered = correlator.register(tag(), recording_sink(&log)).unwrap();

        assert_eq!(correlator.clear(), Some(registered.ticket));
        assert!(!correlator.is_pending());
        assert!(correlator.clear().is_none());
        assert!(!correlator.resolve(tag(), Ok(json!(true))));
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_clear_closes_oneshot_receiver() {
        let correlator = RequestCorrelator::default();
        let (tx, rx) = tokio::sync::oneshot::channel::<MethodResponse>();
        correlator.register(tag(), Box::new(tx)).unwrap();

        correlator.clear();
        assert!(rx.await.is_err());
    }

    #[test]
    fn test_continuation_can_reenter_correlator() {
        let correlator = Arc::new(RequestCorrelator::default());
        let inner = Arc::clone(&correlator);
        let observed = Arc::new(Mutex::new(None));
        let observed_in_sink = Arc::clone(&observed);

        correlator
            .register(
                tag(),
                Box::new(CallbackSink::new(move |_| {
                    *observed_in_sink.lock() = Some(inner.is_pending());
                })),
            )
            .unwrap();

        assert!(correlator.resolve(tag(), Ok(json!(true))));
        assert_eq!(*observed.lock(), Some(false));
    }

    #[test]
    fn test_pending_info_uses_clock() {
        let start = "2024-03-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let correlator = RequestCorrelator::with_clock(PendingPolicy::default(), clock.clone());
        let log: Log = Arc::default();

        correlator.register(tag(), recording_sink(&log)).unwrap();
        clock.advance(chrono::Duration::seconds(5));

        let info = correlator.pending().unwrap();
        assert_eq!(info.registered_at, start);
        assert_eq!(info.ticket.generation, 1);
    }

    #[test]
    fn test_generations_increase_across_registrations() {
        let correlator = RequestCorrelator::default();
        let log: Log = Arc::default();

        let first = correlator.register(tag(), recording_sink(&log)).unwrap();
        correlator.resolve(tag(), Err(GatewayError::NoContext));
        let second = correlator.register(tag(), recording_sink(&log)).unwrap();

        assert!(second.ticket.generation > first.ticket.generation);
        assert!(!correlator.resolve_ticket(first.ticket, Ok(json!(true))));
        assert!(correlator.is_pending());
    }

    /// Drives a long pseudo-random sequence of operations and checks that the
    /// slot never holds more than one request and every continuation fires at
    /// most once.
    #[test]
    fn test_operation_sequences_keep_single_slot() {
        for policy in [PendingPolicy::RejectIfPending, PendingPolicy::EvictPrevious] {
            let correlator = RequestCorrelator::new(policy);
            let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
            let mut sinks: Vec<Arc<Mutex<u32>>> = Vec::new();
            let mut live = 0usize;

            for _ in 0..2_000 {
                seed ^= seed << 13;
                seed ^= seed >> 7;
                seed ^= seed << 17;
                let op_tag = RequestTag::new(1000 + (seed % 3) as i32);

                match seed % 4 {
                    0 | 1 => {
                        let count = Arc::new(Mutex::new(0u32));
                        sinks.push(Arc::clone(&count));
                        let sink = Box::new(CallbackSink::new(move |_| *count.lock() += 1));
                        match correlator.register(op_tag, sink) {
                            Ok(registered) => {
                                if registered.superseded.is_none() {
                                    live += 1;
                                }
                            }
                            Err(rejected) => rejected.reject(),
                        }
                    }
                    2 => {
                        if correlator.resolve(op_tag, Ok(json!(true))) {
                            live -= 1;
                        }
                    }
                    _ => {
                        if correlator.clear().is_some() {
                            live -= 1;
                        }
                    }
                }

                assert!(live <= 1);
                assert_eq!(correlator.is_pending(), live == 1);
            }

            assert!(sinks.iter().all(|count| *count.lock() <= 1));
        }
    }
}
