//! Actor pools with pluggable dispatch policies.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use rand::Rng;
use tracing::debug;

// Layer 3: Internal module imports
use super::split_join::{spawn_collector, WorkSet};
use crate::actor::attachable::{Attachable, ObserveKind, ObserveToken};
use crate::actor::core::{flags, AbstractActor, ActorCore};
use crate::actor::exit_reason::ExitReason;
use crate::actor::handle::ActorRef;
use crate::message::atoms::{DeleteAtom, GetAtom, PutAtom, SysAtom};
use crate::message::envelope::{bounce_request, MailboxElement};
use crate::message::payload::{Message, MessageElement};
use crate::message::system::{DownMsg, ExitMsg};
use crate::scheduler::Scheduler;
use crate::sync::{SharedSpinlock, SpinUpgradeGuard};
use crate::system::actor_system::ActorSystem;

/// Dispatches one envelope to the pool's workers.
///
/// The policy receives the workers under an upgradable shared hold and is
/// responsible for releasing it before entering a worker's mailbox, so the
/// pool never holds its lock across a worker enqueue. Policies must be
/// O(1) or O(n_workers) and non-blocking: the pool does not buffer, it
/// dispatches in the sender's thread.
pub trait PoolPolicy: Send + Sync + 'static {
    /// Deliver `element` to one or more of `workers`.
    fn dispatch(
        &self,
        system: &ActorSystem,
        workers: SpinUpgradeGuard<'_, Vec<ActorRef>>,
        element: MailboxElement,
        scheduler: Option<&dyn Scheduler>,
    );
}

/// Sequential selection; copies of this policy restart at the first
/// worker.
pub struct RoundRobin {
    position: AtomicUsize,
}

impl RoundRobin {
    /// A round-robin policy starting at the first worker.
    pub fn new() -> Self {
        Self {
            position: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for RoundRobin {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl PoolPolicy for RoundRobin {
    fn dispatch(
        &self,
        _system: &ActorSystem,
        workers: SpinUpgradeGuard<'_, Vec<ActorRef>>,
        element: MailboxElement,
        scheduler: Option<&dyn Scheduler>,
    ) {
        debug_assert!(!workers.is_empty());
        let index = self.position.fetch_add(1, Ordering::Relaxed) % workers.len();
        let selected = workers[index].clone();
        workers.unlock();
        selected.enqueue(element, scheduler);
    }
}

/// Sends the same payload to every worker, preserving sender and
/// correlation id.
#[derive(Debug, Clone, Copy, Default)]
pub struct Broadcast;

impl PoolPolicy for Broadcast {
    fn dispatch(
        &self,
        _system: &ActorSystem,
        workers: SpinUpgradeGuard<'_, Vec<ActorRef>>,
        element: MailboxElement,
        scheduler: Option<&dyn Scheduler>,
    ) {
        debug_assert!(!workers.is_empty());
        for worker in workers.iter() {
            worker.enqueue(element.restamp(element.payload.clone()), scheduler);
        }
    }
}

/// Uniform random selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomPolicy;

impl PoolPolicy for RandomPolicy {
    fn dispatch(
        &self,
        _system: &ActorSystem,
        workers: SpinUpgradeGuard<'_, Vec<ActorRef>>,
        element: MailboxElement,
        scheduler: Option<&dyn Scheduler>,
    ) {
        debug_assert!(!workers.is_empty());
        let index = rand::thread_rng().gen_range(0..workers.len());
        let selected = workers[index].clone();
        workers.unlock();
        selected.enqueue(element, scheduler);
    }
}

/// Splits each request over all workers and joins their responses.
///
/// `split` distributes the incoming payload over the per-worker message
/// vector (the default broadcasts it); `join` folds each response into the
/// accumulator. The aggregated value answers the original request.
pub struct SplitJoin<T, S, J> {
    init: T,
    split: S,
    join: J,
}

impl<T, S, J> SplitJoin<T, S, J>
where
    T: MessageElement + Clone,
    S: Fn(&mut WorkSet, &Message) + Clone + Send + Sync + 'static,
    J: FnMut(&mut T, &Message) + Clone + Send + Sync + 'static,
{
    /// A split/join policy with an explicit split function.
    pub fn new(init: T, split: S, join: J) -> Self {
        Self { init, split, join }
    }
}

/// The default split: every worker receives the incoming payload.
pub fn broadcast_split(workset: &mut WorkSet, incoming: &Message) {
    for (_, msg) in workset.iter_mut() {
        *msg = incoming.clone();
    }
}

impl<T, S, J> PoolPolicy for SplitJoin<T, S, J>
where
    T: MessageElement + Clone,
    S: Fn(&mut WorkSet, &Message) + Clone + Send + Sync + 'static,
    J: FnMut(&mut T, &Message) + Clone + Send + Sync + 'static,
{
    fn dispatch(
        &self,
        system: &ActorSystem,
        workers: SpinUpgradeGuard<'_, Vec<ActorRef>>,
        element: MailboxElement,
        scheduler: Option<&dyn Scheduler>,
    ) {
        if element.sender.is_none() {
            workers.unlock();
            return;
        }
        let workset: WorkSet = workers
            .iter()
            .map(|worker| (worker.clone(), Message::empty()))
            .collect();
        workers.unlock();
        let split = self.split.clone();
        let collector = spawn_collector(
            system,
            workset,
            self.init.clone(),
            move |ws, incoming| split(ws, incoming),
            self.join.clone(),
            Message::of,
        );
        collector.enqueue(element, scheduler);
    }
}

/// A composite actor that dispatches incoming messages to a set of worker
/// actors.
///
/// The pool is itself an abstract actor, hence addressable. It monitors
/// every worker; when the last worker dies the pool terminates with
/// [`ExitReason::OutOfWorkers`]. Sys-tagged commands resize
/// (`put`/`delete`) and inspect (`get`) the worker set at runtime.
pub struct ActorPool {
    core: ActorCore,
    workers: SharedSpinlock<Vec<ActorRef>>,
    policy: Box<dyn PoolPolicy>,
    planned_reason: Mutex<ExitReason>,
}

impl ActorPool {
    /// Create an empty pool; workers arrive via `(sys, put, actor)`.
    pub fn make(system: &ActorSystem, policy: impl PoolPolicy) -> ActorRef {
        Self::make_impl(system, Box::new(policy)).1
    }

    /// Create a pool and populate it with `num_workers` actors from
    /// `factory`.
    pub fn with_workers(
        system: &ActorSystem,
        num_workers: usize,
        mut factory: impl FnMut() -> ActorRef,
        policy: impl PoolPolicy,
    ) -> ActorRef {
        let (pool, handle) = Self::make_impl(system, Box::new(policy));
        for _ in 0..num_workers {
            let worker = factory();
            worker.attach(Attachable::monitor(handle.address()));
            pool.workers.write().push(worker);
        }
        handle
    }

    fn make_impl(system: &ActorSystem, policy: Box<dyn PoolPolicy>) -> (Arc<Self>, ActorRef) {
        let pool = Arc::new(Self {
            core: ActorCore::new(system, flags::INITIALIZED | flags::DECORATOR),
            workers: SharedSpinlock::new(Vec::new()),
            policy,
            planned_reason: Mutex::new(ExitReason::Normal),
        });
        let handle = ActorRef::from_arc(Arc::clone(&pool) as Arc<dyn AbstractActor>);
        handle.core().init_self_addr(handle.address());
        system.register_actor(&handle);
        (pool, handle)
    }

    /// Consume system messages and drained-pool requests.
    ///
    /// Returns the guard and element back to the caller when the policy
    /// should dispatch.
    #[allow(clippy::type_complexity)]
    fn filter<'a>(
        &self,
        guard: SpinUpgradeGuard<'a, Vec<ActorRef>>,
        element: MailboxElement,
        scheduler: Option<&dyn Scheduler>,
    ) -> Option<(SpinUpgradeGuard<'a, Vec<ActorRef>>, MailboxElement)> {
        let payload = element.payload.clone();
        if payload.matches::<(ExitMsg,)>() {
            let reason = payload
                .get::<ExitMsg>(0)
                .map(|exit| exit.reason.clone())
                .unwrap_or(ExitReason::Normal);
            if self.cleanup(reason, scheduler) {
                // swap the workers out of the critical section, then send
                // the exit to every former worker
                let mut workers_guard = guard.upgrade();
                let workers = std::mem::take(&mut *workers_guard);
                drop(workers_guard);
                for worker in workers {
                    worker.send_anonymous(payload.clone(), scheduler);
                }
            } else {
                guard.unlock();
            }
            return None;
        }
        if payload.matches::<(DownMsg,)>() {
            // remove the failed worker from the pool
            let mut workers_guard = guard.upgrade();
            if let Some(down) = payload.get::<DownMsg>(0) {
                match workers_guard
                    .iter()
                    .position(|worker| worker.address() == down.source)
                {
                    Some(index) => {
                        workers_guard.remove(index);
                    }
                    None => debug!("received down message for an unknown worker"),
                }
            }
            if workers_guard.is_empty() {
                *self.planned_reason.lock() = ExitReason::OutOfWorkers;
                drop(workers_guard);
                self.quit(scheduler);
            }
            return None;
        }
        if payload.matches::<(SysAtom, PutAtom, ActorRef)>() {
            if let Some(worker) = payload.get::<ActorRef>(2) {
                let mut workers_guard = guard.upgrade();
                workers_guard.push(worker.clone());
                drop(workers_guard);
                // attach without the workers lock: a dead worker fires the
                // monitor immediately, which re-enters this pool
                worker.attach(Attachable::monitor(self.core.address()));
            } else {
                guard.unlock();
            }
            return None;
        }
        if payload.matches::<(SysAtom, DeleteAtom, ActorRef)>() {
            let mut workers_guard = guard.upgrade();
            if let Some(target) = payload.get::<ActorRef>(2) {
                if let Some(index) = workers_guard.iter().position(|worker| worker == target) {
                    target.detach(&ObserveToken {
                        observer: self.core.address(),
                        kind: ObserveKind::Monitor,
                    });
                    workers_guard.remove(index);
                }
            }
            return None;
        }
        if payload.matches::<(SysAtom, DeleteAtom)>() {
            let mut workers_guard = guard.upgrade();
            for worker in workers_guard.iter() {
                worker.detach(&ObserveToken {
                    observer: self.core.address(),
                    kind: ObserveKind::Monitor,
                });
            }
            workers_guard.clear();
            return None;
        }
        if payload.matches::<(SysAtom, GetAtom)>() {
            let snapshot = (*guard).clone();
            guard.unlock();
            if let Some(sender) = &element.sender {
                sender.enqueue(
                    MailboxElement::make(
                        self.core.address().upgrade(),
                        element.mid.response_id(),
                        Message::of(snapshot),
                    ),
                    scheduler,
                );
            }
            return None;
        }
        if guard.is_empty() {
            guard.unlock();
            if element.mid.is_request() {
                // tell the client we ignored this request by answering
                // with an empty message
                if let Some(sender) = &element.sender {
                    sender.enqueue(
                        MailboxElement::make(None, element.mid.response_id(), Message::empty()),
                        scheduler,
                    );
                }
            }
            return None;
        }
        Some((guard, element))
    }

    fn quit(&self, scheduler: Option<&dyn Scheduler>) {
        // safe without the workers lock: the termination protocol uses the
        // core's own state mutex
        let reason = self.planned_reason.lock().clone();
        self.cleanup(reason, scheduler);
    }
}

impl AbstractActor for ActorPool {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        "actor_pool"
    }

    fn enqueue(&self, element: MailboxElement, scheduler: Option<&dyn Scheduler>) -> bool {
        if self.core.is_terminated() {
            bounce_request(&element, &self.core.fail_state(), scheduler);
            return false;
        }
        let guard = self.workers.upgradable_read();
        if let Some((guard, element)) = self.filter(guard, element, scheduler) {
            self.policy
                .dispatch(self.core.system(), guard, element, scheduler);
        }
        true
    }
}

impl Drop for ActorPool {
    fn drop(&mut self) {
        if !self.core.getf(flags::CLEANED_UP) {
            self.cleanup(ExitReason::Unreachable, None);
        }
    }
}
