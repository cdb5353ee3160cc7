//! The composed actor `f after g`.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::actor::attachable::Attachable;
use crate::actor::core::{flags, handle_system_message, AbstractActor, ActorCore};
use crate::actor::exit_reason::ExitReason;
use crate::actor::handle::ActorRef;
use crate::message::envelope::{bounce_request, MailboxElement};
use crate::scheduler::Scheduler;

/// Represents the composition `x -> f(g(x))` as one addressable actor.
///
/// Each incoming envelope is forwarded to `g` with `f` pushed onto the
/// forwarding stack, so `g`'s result continues to `f` and `f`'s result
/// answers the original request. The sequencer's home node is the node of
/// `g`, the first stage.
pub struct Sequencer {
    core: ActorCore,
    stages: Mutex<Option<(ActorRef, ActorRef)>>,
}

impl Sequencer {
    /// Compose `f` after `g`.
    ///
    /// The sequencer monitors both constituents and exits as soon as
    /// either terminates; if one is already dead the monitor fires
    /// immediately and the sequencer is spawned dead.
    pub fn new(f: ActorRef, g: ActorRef) -> ActorRef {
        let system = g.core().system().clone();
        let sequencer = Arc::new(Self {
            core: ActorCore::with_node(&system, g.node(), flags::INITIALIZED | flags::DECORATOR),
            stages: Mutex::new(Some((f.clone(), g.clone()))),
        });
        let handle = ActorRef::from_arc(sequencer);
        handle.core().init_self_addr(handle.address());
        f.attach(Attachable::monitor(handle.address()));
        if g != f {
            g.attach(Attachable::monitor(handle.address()));
        }
        handle
    }
}

impl AbstractActor for Sequencer {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        "sequencer"
    }

    fn enqueue(&self, mut element: MailboxElement, scheduler: Option<&dyn Scheduler>) -> bool {
        if self.core.is_terminated() {
            bounce_request(&element, &self.core.fail_state(), scheduler);
            return false;
        }
        // quit if either `f` or `g` is no longer available
        let handled = handle_system_message(self, &element, scheduler, false, |down| {
            let concerns_stage = {
                let stages = self.stages.lock();
                stages.as_ref().is_none_or(|(f, g)| {
                    f.address() == down.source || g.address() == down.source
                })
            };
            if concerns_stage {
                self.cleanup(down.reason.clone(), scheduler);
            }
        });
        if handled {
            return true;
        }
        let snapshot = self.stages.lock().clone();
        let Some((f, g)) = snapshot else {
            bounce_request(&element, &self.core.fail_state(), scheduler);
            return false;
        };
        // store `f` as the next stage in the forwarding chain, then
        // forward the otherwise unchanged envelope to `g`
        element.stages.push(f);
        g.enqueue(element, scheduler)
    }

    fn on_cleanup(&self, _reason: &ExitReason) {
        *self.stages.lock() = None;
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        if !self.core.getf(flags::CLEANED_UP) {
            self.cleanup(ExitReason::Unreachable, None);
        }
    }
}
