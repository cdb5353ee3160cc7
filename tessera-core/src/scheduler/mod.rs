//! The contract with the external scheduler.
//!
//! The substrate never runs behaviors on its own authority: when a mailbox
//! transitions from empty to non-empty, the target actor is handed to the
//! scheduler passed along with the enqueue, and the scheduler is expected
//! to invoke [`ActorRef::resume`] from whatever execution context it
//! manages. Detached actors run on their own thread and ignore the hint.
//!
//! [`InlineScheduler`] is the reference implementation used by the test
//! suites: it resumes the actor immediately on the calling thread, which
//! makes message flow deterministic.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::handle::ActorRef;

/// Execution-unit handle passed through every enqueue.
///
/// The single operation the substrate requires is "put this actor on a
/// runnable queue". A scheduler must eventually call
/// [`ActorRef::resume`] for every scheduled actor, and must not run two
/// resumes of the same actor concurrently (the actor's own claim flag
/// enforces this as a backstop).
pub trait Scheduler: Send + Sync {
    /// Enqueue `actor` on a runnable queue.
    fn schedule(&self, actor: ActorRef);
}

/// Runs resumed actors immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn schedule(&self, actor: ActorRef) {
        actor.resume(Some(self));
    }
}
