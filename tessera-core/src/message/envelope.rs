//! Mailbox envelopes and the request bouncer.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use tracing::trace;

// Layer 3: Internal module imports
use super::payload::Message;
use super::system::ErrorMsg;
use crate::actor::exit_reason::ExitReason;
use crate::actor::handle::ActorRef;
use crate::scheduler::Scheduler;
use crate::util::ids::MessageId;

/// Envelope for a message in flight.
///
/// Uniquely owned between the producer and the target mailbox. The
/// forwarding stack `stages` lets decorators record downstream stages: when
/// the current actor finishes handling and produces a result, the result is
/// re-routed to the last stage (popped), so the stack drains LIFO.
pub struct MailboxElement {
    /// Who sent the message; `None` for anonymous sends.
    pub sender: Option<ActorRef>,
    /// Request/response correlation id.
    pub mid: MessageId,
    /// Downstream stages, drained back-to-front.
    pub stages: Vec<ActorRef>,
    /// The type-erased payload.
    pub payload: Message,
}

impl MailboxElement {
    /// An envelope with no sender and no correlation.
    pub fn anonymous(payload: Message) -> Self {
        Self {
            sender: None,
            mid: MessageId::invalid(),
            stages: Vec::new(),
            payload,
        }
    }

    /// An envelope with explicit sender and correlation id.
    pub fn make(sender: Option<ActorRef>, mid: MessageId, payload: Message) -> Self {
        Self {
            sender,
            mid,
            stages: Vec::new(),
            payload,
        }
    }

    /// Builder-style: attach a forwarding stack.
    pub fn with_stages(mut self, stages: Vec<ActorRef>) -> Self {
        self.stages = stages;
        self
    }

    /// A copy of this envelope carrying `payload` instead.
    ///
    /// Sender, correlation id, and forwarding stack are preserved; used by
    /// the broadcast policy to fan one message out to every worker.
    pub fn restamp(&self, payload: Message) -> Self {
        Self {
            sender: self.sender.clone(),
            mid: self.mid,
            stages: self.stages.clone(),
            payload,
        }
    }
}

impl fmt::Debug for MailboxElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxElement")
            .field("sender", &self.sender.as_ref().map(ActorRef::id))
            .field("mid", &self.mid)
            .field("stages", &self.stages.len())
            .field("payload", &self.payload)
            .finish()
    }
}

/// Answer a rejected request so the caller does not deadlock.
///
/// A request always gets exactly one reply; when the target is out of
/// service the reply is an [`ErrorMsg`] carrying the exit reason of the
/// first dead actor on the forwarding chain. Asynchronous messages are
/// dropped silently.
pub fn bounce_request(element: &MailboxElement, reason: &ExitReason, scheduler: Option<&dyn Scheduler>) {
    if !element.mid.is_request() || element.mid.is_answered() {
        return;
    }
    if let Some(sender) = &element.sender {
        trace!(mid = %element.mid, %reason, "bouncing request");
        sender.enqueue(
            MailboxElement::make(
                None,
                element.mid.response_id(),
                Message::of(ErrorMsg {
                    reason: reason.clone(),
                }),
            ),
            scheduler,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_envelope() {
        let element = MailboxElement::anonymous(Message::of(1u32));
        assert!(element.sender.is_none());
        assert!(!element.mid.is_request());
        assert!(element.stages.is_empty());
    }

    #[test]
    fn test_restamp_preserves_routing() {
        let element = MailboxElement::make(None, MessageId::make_request(3), Message::of(1u32));
        let copy = element.restamp(Message::of(2u32));
        assert_eq!(copy.mid, element.mid);
        assert_eq!(copy.payload.get::<u32>(0), Some(&2));
    }
}
