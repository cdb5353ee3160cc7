//! Fan-out/fan-in decorator.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::split_join::{spawn_collector, WorkSet};
use crate::actor::attachable::Attachable;
use crate::actor::core::{flags, handle_system_message, AbstractActor, ActorCore};
use crate::actor::exit_reason::ExitReason;
use crate::actor::handle::ActorRef;
use crate::message::envelope::{bounce_request, MailboxElement};
use crate::message::payload::Message;
use crate::scheduler::Scheduler;
use crate::system::actor_system::ActorSystem;

/// Delivers each incoming message to every worker and answers with the
/// concatenation of their responses.
///
/// A short-lived collector actor is spawned per request; it sends each
/// worker its share, folds the responses into one message in arrival
/// order, and delivers the aggregate to the original sender. The splitter
/// exits as soon as any worker terminates. Its home node is the node of
/// the actor system that created it.
pub struct Splitter {
    core: ActorCore,
    workers: Mutex<Option<Vec<ActorRef>>>,
}

impl Splitter {
    /// A splitter over `workers`.
    pub fn new(system: &ActorSystem, workers: Vec<ActorRef>) -> ActorRef {
        let splitter = Arc::new(Self {
            core: ActorCore::new(system, flags::INITIALIZED | flags::DECORATOR),
            workers: Mutex::new(Some(workers.clone())),
        });
        let handle = ActorRef::from_arc(splitter);
        handle.core().init_self_addr(handle.address());
        // dependency on every constituent: dead workers fire immediately
        for worker in &workers {
            worker.attach(Attachable::monitor(handle.address()));
        }
        handle
    }
}

impl AbstractActor for Splitter {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        "splitter"
    }

    fn enqueue(&self, element: MailboxElement, scheduler: Option<&dyn Scheduler>) -> bool {
        if self.core.is_terminated() {
            bounce_request(&element, &self.core.fail_state(), scheduler);
            return false;
        }
        // quit if any worker fails
        let handled = handle_system_message(self, &element, scheduler, false, |down| {
            self.cleanup(down.reason.clone(), scheduler);
        });
        if handled {
            return true;
        }
        let snapshot = self.workers.lock().clone();
        let Some(workers) = snapshot.filter(|workers| !workers.is_empty()) else {
            bounce_request(&element, &self.core.fail_state(), scheduler);
            return false;
        };
        let workset: WorkSet = workers
            .into_iter()
            .map(|worker| (worker, Message::empty()))
            .collect();
        let collector = spawn_collector(
            self.core.system(),
            workset,
            Message::empty(),
            super::pool::broadcast_split,
            |accumulator: &mut Message, response: &Message| accumulator.extend(response),
            |accumulator| accumulator,
        );
        collector.enqueue(element, scheduler)
    }

    fn on_cleanup(&self, _reason: &ExitReason) {
        *self.workers.lock() = None;
    }
}

impl Drop for Splitter {
    fn drop(&mut self) {
        if !self.core.getf(flags::CLEANED_UP) {
            self.cleanup(ExitReason::Unreachable, None);
        }
    }
}
