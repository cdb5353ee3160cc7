//! Strong and weak actor references.

// Layer 1: Standard library imports
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::attachable::{Attachable, ObserveToken};
use super::core::{self, AbstractActor, ActorCore};
use super::exit_reason::ExitReason;
use crate::message::envelope::MailboxElement;
use crate::message::system::ExitMsg;
use crate::message::Message;
use crate::scheduler::Scheduler;
use crate::util::ids::{ActorId, MessageId};
use crate::util::node_id::NodeId;

/// Strong, owning reference to an actor.
///
/// Keeps the actor body alive. Dropping the last `ActorRef` destroys the
/// body; [`ActorAddr`]s created from it stay valid as pure identities.
///
/// Handles compare, hash, and order by address `(node, actor id)`, so two
/// handles to the same actor are interchangeable in sets and maps.
#[derive(Clone)]
pub struct ActorRef {
    inner: Arc<dyn AbstractActor>,
}

impl ActorRef {
    pub(crate) fn from_arc(inner: Arc<dyn AbstractActor>) -> Self {
        Self { inner }
    }

    /// The actor's id.
    pub fn id(&self) -> ActorId {
        self.inner.core().id()
    }

    /// The actor's home node.
    pub fn node(&self) -> NodeId {
        self.inner.core().node()
    }

    /// The actor's weak identity.
    pub fn address(&self) -> ActorAddr {
        ActorAddr {
            node: self.node(),
            id: self.id(),
            weak: Some(Arc::downgrade(&self.inner)),
        }
    }

    /// The actor's diagnostic name.
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Attempt to deliver a mailbox element.
    ///
    /// Returns `false` iff the element was rejected because the actor has
    /// already terminated; rejected requests are still answered with an
    /// error reply so the caller does not deadlock.
    pub fn enqueue(&self, element: MailboxElement, scheduler: Option<&dyn Scheduler>) -> bool {
        self.inner.enqueue(element, scheduler)
    }

    /// Convenience: enqueue an anonymous fire-and-forget payload.
    pub fn send_anonymous(&self, payload: Message, scheduler: Option<&dyn Scheduler>) -> bool {
        self.enqueue(MailboxElement::anonymous(payload), scheduler)
    }

    /// Send an exit message with the given reason.
    pub fn send_exit(&self, reason: ExitReason, scheduler: Option<&dyn Scheduler>) -> bool {
        let source = self.address();
        self.send_anonymous(Message::of(ExitMsg { source, reason }), scheduler)
    }

    /// Drain the actor's mailbox. Invoked by schedulers.
    pub fn resume(&self, scheduler: Option<&dyn Scheduler>) {
        self.inner.resume(scheduler);
    }

    /// Allocate a request id from this actor's sequence; the actor is
    /// the one expecting the response.
    pub fn make_request_id(&self) -> MessageId {
        self.inner.core().new_request_id()
    }

    /// Whether the actor stopped accepting messages.
    pub fn is_terminated(&self) -> bool {
        self.inner.core().is_terminated()
    }

    /// The recorded exit reason; meaningful once the actor terminated.
    pub fn fail_state(&self) -> ExitReason {
        self.inner.core().fail_state()
    }

    /// Attach an interested party.
    ///
    /// If the actor has already terminated the attachable fires
    /// immediately with the recorded exit reason, so observers registered
    /// after death still get their notification exactly once.
    pub fn attach(&self, attachable: Attachable) {
        self.inner.core().attach(attachable, None);
    }

    /// Remove all attachables matching `token`; returns how many were
    /// removed.
    pub fn detach(&self, token: &ObserveToken) -> usize {
        self.inner.core().detach(token, false)
    }

    /// Terminate the actor with `reason`. Idempotent; returns `true` on
    /// the first call only.
    pub fn cleanup(&self, reason: ExitReason, scheduler: Option<&dyn Scheduler>) -> bool {
        self.inner.cleanup(reason, scheduler)
    }

    /// Establish a symmetric link with `peer`.
    ///
    /// Linking with self is a no-op. If either side has already
    /// terminated, the other receives an immediate exit message instead of
    /// a link.
    pub fn link_to(&self, peer: &ActorRef) {
        if self == peer {
            return;
        }
        core::add_link(self, peer);
    }

    /// Dissolve a link with `peer` on both sides.
    pub fn unlink_from(&self, peer: &ActorRef) {
        if self == peer {
            return;
        }
        core::remove_link(self, peer);
    }

    pub(crate) fn core(&self) -> &ActorCore {
        self.inner.core()
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.node() == other.node() && self.id() == other.id()
    }
}

impl Eq for ActorRef {}

impl PartialOrd for ActorRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorRef {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.node(), self.id()).cmp(&(other.node(), other.id()))
    }
}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node().hash(state);
        self.id().hash(state);
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({}@{})", self.id(), self.node())
    }
}

/// Weak, hashable identity of an actor.
///
/// Carries no ownership of the body: upgrading succeeds only while at
/// least one strong reference exists. The `(node, id)` pair stays
/// comparable and hashable after the actor dies, which is what monitors
/// and registries key on.
///
/// The invalid (zero) address compares less than all valid addresses.
#[derive(Clone)]
pub struct ActorAddr {
    node: NodeId,
    id: ActorId,
    weak: Option<Weak<dyn AbstractActor>>,
}

impl ActorAddr {
    /// The zero address.
    pub fn invalid() -> Self {
        Self {
            node: NodeId::invalid(),
            id: ActorId::invalid(),
            weak: None,
        }
    }

    /// An identity-only address without an upgrade path, e.g. for actors
    /// on other nodes.
    pub fn detached(node: NodeId, id: ActorId) -> Self {
        Self {
            node,
            id,
            weak: None,
        }
    }

    /// The actor id component.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// The node id component.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether this address denotes an actual actor.
    pub fn is_valid(&self) -> bool {
        self.id.is_valid()
    }

    /// Attempt to reacquire a strong reference.
    ///
    /// Succeeds iff the strong count is still positive.
    pub fn upgrade(&self) -> Option<ActorRef> {
        let inner = self.weak.as_ref()?.upgrade()?;
        Some(ActorRef { inner })
    }
}

impl PartialEq for ActorAddr {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.id == other.id
    }
}

impl Eq for ActorAddr {}

impl PartialOrd for ActorAddr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ActorAddr {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.node, self.id).cmp(&(other.node, other.id))
    }
}

impl Hash for ActorAddr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Debug for ActorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorAddr({}@{})", self.id, self.node)
    }
}

impl fmt::Display for ActorAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address_sorts_first() {
        let invalid = ActorAddr::invalid();
        let valid = ActorAddr::detached(NodeId::local(), ActorId::from_raw(1));
        assert!(invalid < valid);
        assert!(!invalid.is_valid());
        assert!(invalid.upgrade().is_none());
    }

    #[test]
    fn test_address_equality_ignores_weak() {
        let node = NodeId::local();
        let a = ActorAddr::detached(node, ActorId::from_raw(3));
        let b = ActorAddr::detached(node, ActorId::from_raw(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering_is_node_then_id() {
        let node = NodeId::local();
        let other = NodeId::local(); // larger instance byte on same host
        let (lo, hi) = if node < other {
            (node, other)
        } else {
            (other, node)
        };
        let a = ActorAddr::detached(lo, ActorId::from_raw(99));
        let b = ActorAddr::detached(hi, ActorId::from_raw(1));
        assert!(a < b);
    }
}
