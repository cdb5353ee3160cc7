//! Attachables: interested parties fired exactly once on termination.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::exit_reason::ExitReason;
use super::handle::ActorAddr;
use crate::message::envelope::MailboxElement;
use crate::message::payload::Message;
use crate::message::system::{DownMsg, ExitMsg};
use crate::scheduler::Scheduler;
use crate::util::ids::MessageId;

/// What kind of observation a token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveKind {
    /// One-way observation producing a single down message.
    Monitor,
    /// Symmetric relationship propagating non-normal exits.
    Link,
}

/// Identifies an attachable for removal.
#[derive(Debug, Clone)]
pub struct ObserveToken {
    /// The observing side of the relationship.
    pub observer: ActorAddr,
    /// Monitor or link.
    pub kind: ObserveKind,
}

/// One node in an actor's list of interested parties.
///
/// Fired exactly once when the owning actor terminates, in list order.
pub enum Attachable {
    /// Deliver one `DownMsg` to `observer` when the owner exits.
    Monitor {
        /// Who to notify.
        observer: ActorAddr,
        /// Deliver the down message at high priority.
        high_priority: bool,
    },
    /// Deliver an `ExitMsg` to `peer` when the owner exits.
    Link {
        /// The linked peer.
        peer: ActorAddr,
    },
    /// Run a one-shot callback with the exit reason.
    Functor(Box<dyn FnOnce(&ExitReason) + Send>),
}

impl Attachable {
    /// A normal-priority monitor attachable.
    pub fn monitor(observer: ActorAddr) -> Self {
        Self::Monitor {
            observer,
            high_priority: false,
        }
    }

    /// A high-priority monitor attachable.
    pub fn urgent_monitor(observer: ActorAddr) -> Self {
        Self::Monitor {
            observer,
            high_priority: true,
        }
    }

    /// A link attachable for `peer`.
    pub fn link(peer: ActorAddr) -> Self {
        Self::Link { peer }
    }

    /// A one-shot cleanup callback.
    pub fn functor(f: impl FnOnce(&ExitReason) + Send + 'static) -> Self {
        Self::Functor(Box::new(f))
    }

    /// Whether this attachable is identified by `token`.
    ///
    /// Functors match no token; they can only be drained by cleanup.
    pub fn matches(&self, token: &ObserveToken) -> bool {
        match (self, token.kind) {
            (Self::Monitor { observer, .. }, ObserveKind::Monitor) => *observer == token.observer,
            (Self::Link { peer }, ObserveKind::Link) => *peer == token.observer,
            _ => false,
        }
    }

    /// Fire the attachable: the owning actor at `source` exited with
    /// `reason`.
    ///
    /// Dead observers are skipped; an exit message is delivered for links
    /// regardless of the reason, leaving the normal-reason filtering to
    /// the receiving side.
    pub fn fire(self, source: &ActorAddr, reason: &ExitReason, scheduler: Option<&dyn Scheduler>) {
        match self {
            Self::Monitor {
                observer,
                high_priority,
            } => {
                if let Some(target) = observer.upgrade() {
                    let mid = if high_priority {
                        MessageId::invalid().with_high_priority()
                    } else {
                        MessageId::invalid()
                    };
                    target.enqueue(
                        MailboxElement::make(
                            None,
                            mid,
                            Message::of(DownMsg {
                                source: source.clone(),
                                reason: reason.clone(),
                            }),
                        ),
                        scheduler,
                    );
                }
            }
            Self::Link { peer } => {
                if let Some(target) = peer.upgrade() {
                    target.enqueue(
                        MailboxElement::anonymous(Message::of(ExitMsg {
                            source: source.clone(),
                            reason: reason.clone(),
                        })),
                        scheduler,
                    );
                }
            }
            Self::Functor(f) => f(reason),
        }
    }
}

impl fmt::Debug for Attachable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monitor {
                observer,
                high_priority,
            } => f
                .debug_struct("Monitor")
                .field("observer", observer)
                .field("high_priority", high_priority)
                .finish(),
            Self::Link { peer } => f.debug_struct("Link").field("peer", peer).finish(),
            Self::Functor(_) => f.write_str("Functor"),
        }
    }
}

/// Intrusive singly-linked list node; each node owns its successor.
pub(crate) struct AttachableNode {
    pub(crate) item: Attachable,
    pub(crate) next: Option<Box<AttachableNode>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_token_matching() {
        let addr = ActorAddr::invalid();
        let monitor = Attachable::monitor(addr.clone());
        let link = Attachable::link(addr.clone());
        let monitor_token = ObserveToken {
            observer: addr.clone(),
            kind: ObserveKind::Monitor,
        };
        let link_token = ObserveToken {
            observer: addr,
            kind: ObserveKind::Link,
        };
        assert!(monitor.matches(&monitor_token));
        assert!(!monitor.matches(&link_token));
        assert!(link.matches(&link_token));
        assert!(!link.matches(&monitor_token));
    }

    #[test]
    fn test_functor_matches_nothing() {
        let functor = Attachable::functor(|_| {});
        let token = ObserveToken {
            observer: ActorAddr::invalid(),
            kind: ObserveKind::Monitor,
        };
        assert!(!functor.matches(&token));
    }

    #[test]
    fn test_functor_fires_with_reason() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let functor = Attachable::functor(move |reason| {
            assert_eq!(*reason, ExitReason::Kill);
            flag.store(true, Ordering::SeqCst);
        });
        functor.fire(&ActorAddr::invalid(), &ExitReason::Kill, None);
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_dead_observer_is_skipped() {
        // firing at an invalid address must be a no-op, not a panic
        let monitor = Attachable::monitor(ActorAddr::invalid());
        monitor.fire(&ActorAddr::invalid(), &ExitReason::Normal, None);
    }
}
