// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Unique identifier for actors in the system.
///
/// Allocated by the registry as a monotonically increasing 64-bit counter
/// starting at 1. The reserved value `0` denotes "none / anonymous" and is
/// never handed out.
///
/// # Example
/// ```rust
/// use tessera_core::util::ActorId;
///
/// let id = ActorId::from_raw(7);
/// assert!(id.is_valid());
/// assert!(!ActorId::invalid().is_valid());
/// assert!(ActorId::invalid() < id);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ActorId(u64);

impl ActorId {
    /// The reserved "none" identifier.
    pub const fn invalid() -> Self {
        Self(0)
    }

    /// Wrap a raw identifier value.
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw identifier value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this identifier denotes an actual actor.
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bit marking a high-priority message.
const HIGH_PRIORITY_BIT: u64 = 1 << 63;

/// Bit marking a request that expects a response.
const REQUEST_BIT: u64 = 1 << 62;

/// Bit marking a request as answered; only meaningful on requests and
/// their responses.
const ANSWERED_BIT: u64 = 1 << 61;

/// Mask covering the per-actor sequence number.
const SEQUENCE_MASK: u64 = ANSWERED_BIT - 1;

/// Request/response correlation identifier.
///
/// A 64-bit value packing a priority bit, a request bit, an answered bit,
/// and a per-actor sequence number. The all-zero value is the asynchronous
/// "no correlation" id used by fire-and-forget messages.
///
/// A response carries the same sequence number as its request with the
/// request bit cleared and the answered bit set, so the two halves of an
/// exchange pair up by equality of [`response_id`](Self::response_id).
///
/// # Example
/// ```rust
/// use tessera_core::util::MessageId;
///
/// let req = MessageId::make_request(42);
/// assert!(req.is_request());
/// assert!(!req.is_answered());
///
/// let resp = req.response_id();
/// assert!(!resp.is_request());
/// assert!(resp.is_answered());
/// assert_eq!(resp, req.response_id());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct MessageId(u64);

impl MessageId {
    /// The asynchronous "no correlation" id.
    pub const fn invalid() -> Self {
        Self(0)
    }

    /// Build a request id from a per-actor sequence number.
    pub const fn make_request(sequence: u64) -> Self {
        Self(REQUEST_BIT | (sequence & SEQUENCE_MASK))
    }

    /// Build a high-priority request id from a sequence number.
    pub const fn make_urgent_request(sequence: u64) -> Self {
        Self(HIGH_PRIORITY_BIT | REQUEST_BIT | (sequence & SEQUENCE_MASK))
    }

    /// Wrap a raw id value.
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw id value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whether this id expects a response.
    pub const fn is_request(self) -> bool {
        self.0 & REQUEST_BIT != 0
    }

    /// Whether this id carries a valid correlation (request or response).
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Whether the answered bit is set.
    pub const fn is_answered(self) -> bool {
        self.0 & ANSWERED_BIT != 0
    }

    /// Whether the high-priority bit is set.
    pub const fn is_high_priority(self) -> bool {
        self.0 & HIGH_PRIORITY_BIT != 0
    }

    /// The matching response id: request bit cleared, answered bit set.
    pub const fn response_id(self) -> Self {
        Self((self.0 & !REQUEST_BIT) | ANSWERED_BIT)
    }

    /// Set the answered bit. Idempotent.
    pub fn mark_as_answered(&mut self) {
        self.0 |= ANSWERED_BIT;
    }

    /// A copy of this id with the high-priority bit set.
    pub const fn with_high_priority(self) -> Self {
        Self(self.0 | HIGH_PRIORITY_BIT)
    }

    /// The per-actor sequence number.
    pub const fn sequence(self) -> u64 {
        self.0 & SEQUENCE_MASK
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_zero_is_invalid() {
        assert!(!ActorId::invalid().is_valid());
        assert_eq!(ActorId::invalid(), ActorId::from_raw(0));
        assert!(ActorId::from_raw(1).is_valid());
    }

    #[test]
    fn test_actor_id_ordering() {
        assert!(ActorId::from_raw(1) < ActorId::from_raw(2));
        assert!(ActorId::invalid() < ActorId::from_raw(1));
    }

    #[test]
    fn test_message_id_invalid_is_async() {
        let mid = MessageId::invalid();
        assert!(!mid.is_request());
        assert!(!mid.is_valid());
        assert!(!mid.is_answered());
    }

    #[test]
    fn test_request_response_pairing() {
        let req = MessageId::make_request(99);
        let resp = req.response_id();
        assert!(req.is_request());
        assert!(!resp.is_request());
        assert!(resp.is_answered());
        assert_eq!(req.sequence(), resp.sequence());
        // the response id of a response is itself
        assert_eq!(resp.response_id(), resp);
    }

    #[test]
    fn test_mark_as_answered_idempotent() {
        let mut mid = MessageId::make_request(5);
        assert!(!mid.is_answered());
        mid.mark_as_answered();
        let once = mid;
        mid.mark_as_answered();
        assert_eq!(mid, once);
        assert!(mid.is_answered());
        assert!(mid.is_request());
    }

    #[test]
    fn test_priority_bit() {
        let mid = MessageId::make_request(3).with_high_priority();
        assert!(mid.is_high_priority());
        assert!(mid.response_id().is_high_priority());
        assert!(MessageId::make_urgent_request(3).is_high_priority());
    }

    #[test]
    fn test_sequence_masking() {
        let mid = MessageId::make_request(u64::MAX);
        assert!(mid.is_request());
        assert!(!mid.is_answered());
        assert!(!mid.is_high_priority());
    }
}
