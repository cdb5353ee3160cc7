//! Base state and protocol shared by every actor.
//!
//! The substrate flattens the original deep inheritance chain into a
//! single [`ActorCore`] value embedded in each concrete actor, plus the
//! [`AbstractActor`] trait for the operations that differ per kind
//! (mailbox append, drain, cleanup hooks). Shared behavior - attachment,
//! linking, termination - lives here as methods and free functions over
//! the core.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tracing::{debug, trace};

// Layer 3: Internal module imports
use super::attachable::{Attachable, AttachableNode, ObserveKind, ObserveToken};
use super::exit_reason::ExitReason;
use super::handle::{ActorAddr, ActorRef};
use crate::message::atoms::{GetAtom, OkAtom, SysAtom};
use crate::message::envelope::MailboxElement;
use crate::message::payload::Message;
use crate::message::system::{DownMsg, ErrorMsg, ExitMsg};
use crate::scheduler::Scheduler;
use crate::system::actor_system::ActorSystem;
use crate::util::ids::{ActorId, MessageId};
use crate::util::node_id::NodeId;

/// Per-actor flag bits.
pub mod flags {
    /// Runs on its own OS thread rather than the scheduler's pool.
    pub const DETACHED: u32 = 1 << 0;
    /// Uses a synchronous receive API.
    pub const BLOCKING: u32 = 1 << 1;
    /// Not counted in the live-actor counter.
    pub const HIDDEN: u32 = 1 << 2;
    /// Behavior installed.
    pub const INITIALIZED: u32 = 1 << 3;
    /// No more messages accepted.
    pub const TERMINATED: u32 = 1 << 4;
    /// Attachables drained.
    pub const CLEANED_UP: u32 = 1 << 5;
    /// Convert exit messages to regular payloads.
    pub const TRAP_EXIT: u32 = 1 << 6;
    /// Published to the registry.
    pub const REGISTERED: u32 = 1 << 7;
    /// Forwards messages on behalf of other actors.
    pub const DECORATOR: u32 = 1 << 8;
}

/// Error code for unsupported framework-level requests.
const UNSUPPORTED_SYS: u16 = 0x5359;

pub(crate) struct CoreState {
    pub(crate) fail_state: Option<ExitReason>,
    pub(crate) attachables: Option<Box<AttachableNode>>,
}

impl CoreState {
    fn push_front(&mut self, item: Attachable) {
        self.attachables = Some(Box::new(AttachableNode {
            item,
            next: self.attachables.take(),
        }));
    }

    fn has_matching(&self, token: &ObserveToken) -> bool {
        let mut cursor = self.attachables.as_deref();
        while let Some(node) = cursor {
            if node.item.matches(token) {
                return true;
            }
            cursor = node.next.as_deref();
        }
        false
    }

    /// Remove attachables matching `token`; with `stop_on_hit` only the
    /// first match is removed. Returns the number removed.
    fn detach_matching(&mut self, token: &ObserveToken, stop_on_hit: bool) -> usize {
        let mut count = 0;
        let mut kept = Vec::new();
        let mut cursor = self.attachables.take();
        while let Some(mut node) = cursor {
            cursor = node.next.take();
            if node.item.matches(token) && (!stop_on_hit || count == 0) {
                count += 1;
            } else {
                kept.push(node.item);
            }
        }
        for item in kept.into_iter().rev() {
            self.push_front(item);
        }
        count
    }
}

/// Identity and shared state embedded in every actor.
pub struct ActorCore {
    id: ActorId,
    node: NodeId,
    system: ActorSystem,
    flags: AtomicU32,
    mid_sequence: AtomicU64,
    state: Mutex<CoreState>,
    self_addr: OnceLock<ActorAddr>,
}

impl ActorCore {
    /// A core homed on `system`'s node with a freshly allocated id.
    pub fn new(system: &ActorSystem, initial_flags: u32) -> Self {
        Self::with_node(system, system.node(), initial_flags)
    }

    /// A core with an explicit home node (decorators adopt the node of
    /// their first stage).
    pub fn with_node(system: &ActorSystem, node: NodeId, initial_flags: u32) -> Self {
        Self {
            id: system.next_actor_id(),
            node,
            system: system.clone(),
            flags: AtomicU32::new(initial_flags),
            mid_sequence: AtomicU64::new(0),
            state: Mutex::new(CoreState {
                fail_state: None,
                attachables: None,
            }),
            self_addr: OnceLock::new(),
        }
    }

    /// The actor's id.
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// The actor's home node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The owning actor system.
    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// The actor's address. Falls back to an identity-only address when
    /// the self reference has not been published yet.
    pub fn address(&self) -> ActorAddr {
        self.self_addr
            .get()
            .cloned()
            .unwrap_or_else(|| ActorAddr::detached(self.node, self.id))
    }

    pub(crate) fn init_self_addr(&self, addr: ActorAddr) {
        let _ = self.self_addr.set(addr);
    }

    /// Whether all bits in `mask` are set.
    pub fn getf(&self, mask: u32) -> bool {
        self.flags.load(Ordering::SeqCst) & mask == mask
    }

    /// Set the bits in `mask`.
    pub fn setf(&self, mask: u32) {
        self.flags.fetch_or(mask, Ordering::SeqCst);
    }

    /// Whether the actor stopped accepting messages.
    pub fn is_terminated(&self) -> bool {
        self.getf(flags::TERMINATED)
    }

    /// The recorded exit reason; `Unreachable` when none was recorded.
    pub fn fail_state(&self) -> ExitReason {
        self.state
            .lock()
            .fail_state
            .clone()
            .unwrap_or(ExitReason::Unreachable)
    }

    /// Allocate a fresh request id from the per-actor sequence.
    pub fn new_request_id(&self) -> MessageId {
        let seq = self.mid_sequence.fetch_add(1, Ordering::Relaxed) + 1;
        MessageId::make_request(seq)
    }

    /// Attach an interested party, or fire it immediately when the actor
    /// has already terminated.
    pub fn attach(&self, attachable: Attachable, scheduler: Option<&dyn Scheduler>) {
        let mut st = self.state.lock();
        if self.getf(flags::TERMINATED) {
            let reason = st
                .fail_state
                .clone()
                .unwrap_or(ExitReason::Unreachable);
            drop(st);
            trace!(id = %self.id, "attach to terminated actor fires immediately");
            attachable.fire(&self.address(), &reason, scheduler);
        } else {
            st.push_front(attachable);
        }
    }

    /// Remove attachables matching `token`.
    pub fn detach(&self, token: &ObserveToken, stop_on_hit: bool) -> usize {
        self.state.lock().detach_matching(token, stop_on_hit)
    }

    /// First (state-mutating) half of cleanup; returns the drained
    /// attachables on the first call and `None` afterwards.
    pub(crate) fn cleanup_impl(
        &self,
        reason: ExitReason,
    ) -> Option<(ExitReason, Option<Box<AttachableNode>>)> {
        let mut st = self.state.lock();
        if self.getf(flags::CLEANED_UP) {
            return None;
        }
        st.fail_state = Some(reason.clone());
        let head = st.attachables.take();
        self.setf(flags::TERMINATED | flags::CLEANED_UP);
        Some((reason, head))
    }

    /// Drop out of the live-actor count if this core was registered.
    pub(crate) fn unregister(&self) {
        let prev = self.flags.fetch_and(!flags::REGISTERED, Ordering::SeqCst);
        if prev & flags::REGISTERED != 0 && prev & flags::HIDDEN == 0 {
            self.system.registry().dec_running();
        }
    }
}

/// Operations implemented by every addressable endpoint.
///
/// Concrete actors embed an [`ActorCore`] and implement the actual mailbox
/// append; the default methods supply the shared termination protocol.
pub trait AbstractActor: Send + Sync + 'static {
    /// The embedded shared state.
    fn core(&self) -> &ActorCore;

    /// Attempt to deliver a mailbox element; see
    /// [`ActorRef::enqueue`](super::handle::ActorRef::enqueue).
    fn enqueue(&self, element: MailboxElement, scheduler: Option<&dyn Scheduler>) -> bool;

    /// Drain pending mailbox messages. No-op for actors that dispatch in
    /// the caller's thread.
    fn resume(&self, scheduler: Option<&dyn Scheduler>) {
        let _ = scheduler;
    }

    /// Diagnostic name.
    fn name(&self) -> &'static str {
        "actor"
    }

    /// Hook invoked once, after the exit reason is recorded and before the
    /// attachables fire.
    fn on_cleanup(&self, reason: &ExitReason) {
        let _ = reason;
    }

    /// Terminate the actor. Idempotent.
    ///
    /// The first call records `reason`, marks the actor terminated and
    /// cleaned up, fires every attachable exactly once in list order, and
    /// returns `true`. Later calls return `false` with no side effects.
    fn cleanup(&self, reason: ExitReason, scheduler: Option<&dyn Scheduler>) -> bool {
        let Some((reason, head)) = self.core().cleanup_impl(reason) else {
            return false;
        };
        debug!(id = %self.core().id(), node = %self.core().node(), %reason, "cleanup");
        self.on_cleanup(&reason);
        let source = self.core().address();
        let mut cursor = head;
        while let Some(node) = cursor {
            let AttachableNode { item, next } = *node;
            item.fire(&source, &reason, scheduler);
            cursor = next;
        }
        self.core().unregister();
        true
    }
}

/// Lock the state of two distinct actors in a canonical order.
pub(crate) fn joined_critical_section<R>(
    a: &ActorCore,
    b: &ActorCore,
    f: impl FnOnce(&mut CoreState, &mut CoreState) -> R,
) -> R {
    debug_assert!(
        (a.node(), a.id()) != (b.node(), b.id()),
        "joined critical section over one actor"
    );
    if (a.node(), a.id()) < (b.node(), b.id()) {
        let mut guard_a = a.state.lock();
        let mut guard_b = b.state.lock();
        f(&mut guard_a, &mut guard_b)
    } else {
        let mut guard_b = b.state.lock();
        let mut guard_a = a.state.lock();
        f(&mut guard_a, &mut guard_b)
    }
}

/// Establish a symmetric link; each side holds a link attachable for the
/// other. When either side has already terminated, the survivor receives
/// an immediate exit message instead.
pub(crate) fn add_link(a: &ActorRef, b: &ActorRef) {
    let mut pending: Option<(ActorRef, ExitMsg)> = None;
    joined_critical_section(a.core(), b.core(), |state_a, state_b| {
        if a.core().getf(flags::TERMINATED) {
            pending = Some((
                b.clone(),
                ExitMsg {
                    source: a.address(),
                    reason: state_a
                        .fail_state
                        .clone()
                        .unwrap_or(ExitReason::Unreachable),
                },
            ));
        } else if b.core().getf(flags::TERMINATED) {
            pending = Some((
                a.clone(),
                ExitMsg {
                    source: b.address(),
                    reason: state_b
                        .fail_state
                        .clone()
                        .unwrap_or(ExitReason::Unreachable),
                },
            ));
        } else {
            let token_on_b = ObserveToken {
                observer: a.address(),
                kind: ObserveKind::Link,
            };
            if !state_b.has_matching(&token_on_b) {
                state_b.push_front(Attachable::link(a.address()));
            }
            let token_on_a = ObserveToken {
                observer: b.address(),
                kind: ObserveKind::Link,
            };
            if !state_a.has_matching(&token_on_a) {
                state_a.push_front(Attachable::link(b.address()));
            }
        }
    });
    // deliver outside the critical section
    if let Some((target, exit)) = pending {
        target.enqueue(MailboxElement::anonymous(Message::of(exit)), None);
    }
}

/// Dissolve a link on both sides.
pub(crate) fn remove_link(a: &ActorRef, b: &ActorRef) {
    joined_critical_section(a.core(), b.core(), |state_a, state_b| {
        state_a.detach_matching(
            &ObserveToken {
                observer: b.address(),
                kind: ObserveKind::Link,
            },
            true,
        );
        state_b.detach_matching(
            &ObserveToken {
                observer: a.address(),
                kind: ObserveKind::Link,
            },
            true,
        );
    });
}

/// Process a system message on behalf of a decorator.
///
/// Returns `true` when the element was consumed: a `DownMsg` is passed to
/// `down_handler`, a non-trapped `ExitMsg` terminates the actor for
/// non-normal reasons (and is dropped for normal ones), and sys-tagged
/// commands are answered per the info protocol. Everything else stays with
/// the caller.
pub fn handle_system_message<A, F>(
    actor: &A,
    element: &MailboxElement,
    scheduler: Option<&dyn Scheduler>,
    trap_exit: bool,
    down_handler: F,
) -> bool
where
    A: AbstractActor + ?Sized,
    F: FnOnce(&DownMsg),
{
    let payload = &element.payload;
    if payload.matches::<(DownMsg,)>() {
        if let Some(down) = payload.get::<DownMsg>(0) {
            down_handler(down);
        }
        return true;
    }
    if !trap_exit && payload.matches::<(ExitMsg,)>() {
        if let Some(exit) = payload.get::<ExitMsg>(0) {
            if !exit.reason.is_normal() {
                actor.cleanup(exit.reason.clone(), scheduler);
            }
        }
        return true;
    }
    if payload.len() > 1 && payload.match_element::<SysAtom>(0) {
        handle_sys_command(actor, element, scheduler);
        return true;
    }
    false
}

/// Answer a `(sys, ...)` command; the only supported request is
/// `(sys, get, "info")`.
pub(crate) fn handle_sys_command<A>(
    actor: &A,
    element: &MailboxElement,
    scheduler: Option<&dyn Scheduler>,
) where
    A: AbstractActor + ?Sized,
{
    let Some(sender) = element.sender.clone() else {
        return;
    };
    let payload = &element.payload;
    let self_handle = actor.core().address().upgrade();
    let supported = payload.matches::<(SysAtom, GetAtom, String)>()
        && payload.get::<String>(2).map(String::as_str) == Some("info");
    if supported {
        let response = Message::builder()
            .append(OkAtom)
            .append(String::from("info"))
            .append(actor.core().address())
            .append(String::from(actor.name()))
            .build();
        sender.enqueue(
            MailboxElement::make(self_handle, element.mid.response_id(), response),
            scheduler,
        );
    } else if element.mid.is_request() {
        sender.enqueue(
            MailboxElement::make(
                self_handle,
                element.mid.response_id(),
                Message::of(ErrorMsg {
                    reason: ExitReason::user_defined(
                        UNSUPPORTED_SYS,
                        "unsupported system message",
                    ),
                }),
            ),
            scheduler,
        );
    } else {
        debug!(id = %actor.core().id(), "dropped unsupported system message");
    }
}
