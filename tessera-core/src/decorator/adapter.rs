//! Bound-argument decorator.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::actor::attachable::Attachable;
use crate::actor::core::{flags, handle_system_message, AbstractActor, ActorCore};
use crate::actor::exit_reason::ExitReason;
use crate::actor::handle::ActorRef;
use crate::message::envelope::{bounce_request, MailboxElement};
use crate::message::payload::Message;
use crate::scheduler::Scheduler;

/// Placeholder inside an adapter's bound prefix, replaced by the n-th
/// (1-based) element of the incoming payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMapping(pub usize);

/// Forwards every message to a decorated actor with a bound argument
/// prefix prepended.
///
/// [`IndexMapping`] placeholders inside the prefix are substituted with
/// positional references into the incoming payload before the prefix is
/// prepended.
pub struct Adapter {
    core: ActorCore,
    state: Mutex<Option<(ActorRef, Message)>>,
}

impl Adapter {
    /// Bind `merger` as the argument prefix of `decorated`.
    ///
    /// The adapter monitors the decorated actor; if it is already dead,
    /// the monitor fires immediately and the adapter is spawned dead.
    pub fn new(decorated: ActorRef, merger: Message) -> ActorRef {
        let system = decorated.core().system().clone();
        let adapter = Arc::new(Self {
            core: ActorCore::new(&system, flags::INITIALIZED | flags::DECORATOR),
            state: Mutex::new(Some((decorated.clone(), merger))),
        });
        let handle = ActorRef::from_arc(adapter);
        handle.core().init_self_addr(handle.address());
        decorated.attach(Attachable::monitor(handle.address()));
        handle
    }
}

/// Prepend `merger` to `incoming`, substituting placeholders.
fn merge_prefix(merger: &Message, incoming: &Message) -> Message {
    let mut merged = Message::empty();
    for index in 0..merger.len() {
        if let Some(mapping) = merger.get::<IndexMapping>(index) {
            if let Some(element) = incoming.element(mapping.0.saturating_sub(1)) {
                merged.push_shared(Arc::clone(element));
            }
            continue;
        }
        if let Some(element) = merger.element(index) {
            merged.push_shared(Arc::clone(element));
        }
    }
    merged.extend(incoming);
    merged
}

impl AbstractActor for Adapter {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        "adapter"
    }

    fn enqueue(&self, element: MailboxElement, scheduler: Option<&dyn Scheduler>) -> bool {
        if self.core.is_terminated() {
            bounce_request(&element, &self.core.fail_state(), scheduler);
            return false;
        }
        let handled = handle_system_message(self, &element, scheduler, false, |down| {
            self.cleanup(down.reason.clone(), scheduler);
        });
        if handled {
            return true;
        }
        let snapshot = self.state.lock().clone();
        let Some((decorated, merger)) = snapshot else {
            bounce_request(&element, &self.core.fail_state(), scheduler);
            return false;
        };
        let merged = merge_prefix(&merger, &element.payload);
        decorated.enqueue(
            MailboxElement {
                sender: element.sender,
                mid: element.mid,
                stages: element.stages,
                payload: merged,
            },
            scheduler,
        )
    }

    fn on_cleanup(&self, _reason: &ExitReason) {
        *self.state.lock() = None;
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        if !self.core.getf(flags::CLEANED_UP) {
            self.cleanup(ExitReason::Unreachable, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefix_prepends() {
        let merger = Message::builder().append(1u32).append(2u32).build();
        let incoming = Message::of("x");
        let merged = merge_prefix(&merger, &incoming);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get::<u32>(0), Some(&1));
        assert_eq!(merged.get::<u32>(1), Some(&2));
        assert_eq!(merged.get::<&str>(2), Some(&"x"));
    }

    #[test]
    fn test_merge_prefix_substitutes_placeholders() {
        let merger = Message::builder()
            .append(0u8)
            .append(IndexMapping(1))
            .build();
        let incoming = Message::builder().append("payload").build();
        let merged = merge_prefix(&merger, &incoming);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.get::<u8>(0), Some(&0));
        assert_eq!(merged.get::<&str>(1), Some(&"payload"));
        assert_eq!(merged.get::<&str>(2), Some(&"payload"));
    }

    #[test]
    fn test_merge_prefix_skips_unresolvable_placeholder() {
        let merger = Message::of(IndexMapping(5));
        let incoming = Message::of(1u16);
        let merged = merge_prefix(&merger, &incoming);
        // the placeholder cannot resolve; only the payload survives
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get::<u16>(0), Some(&1));
    }
}
