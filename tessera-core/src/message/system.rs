//! System messages processed by the substrate before user code sees them.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::atoms::SysAtom;
use super::payload::Message;
use crate::actor::exit_reason::ExitReason;
use crate::actor::handle::ActorAddr;
use crate::group::Group;

/// Exit propagated over a link, or sent explicitly to terminate an actor.
///
/// Receiving a non-normal exit is equivalent to a kill unless the receiver
/// has `trap_exit` set, in which case the message is delivered like any
/// other payload.
#[derive(Debug, Clone)]
pub struct ExitMsg {
    /// Address of the terminating actor.
    pub source: ActorAddr,
    /// Why the source terminated.
    pub reason: ExitReason,
}

/// One-shot notification to a monitor that its target terminated.
#[derive(Debug, Clone)]
pub struct DownMsg {
    /// Address of the terminated actor.
    pub source: ActorAddr,
    /// Why the source terminated.
    pub reason: ExitReason,
}

/// Notifies subscribers of a remotely-owned group that its broker died.
#[derive(Debug, Clone)]
pub struct GroupDownMsg {
    /// The group that became unreachable.
    pub group: Group,
}

/// Error reply to a request whose target cannot serve it.
///
/// Carries the exit reason of the first out-of-service actor on the
/// forwarding chain.
#[derive(Debug, Clone)]
pub struct ErrorMsg {
    /// Why the request could not be served.
    pub reason: ExitReason,
}

/// Whether `payload` is a message the substrate handles itself.
///
/// System messages are single-element `ExitMsg` / `DownMsg` /
/// `GroupDownMsg` payloads and multi-element payloads tagged with a
/// leading [`SysAtom`].
pub fn is_system_message(payload: &Message) -> bool {
    (payload.len() == 1
        && (payload.match_element::<ExitMsg>(0)
            || payload.match_element::<DownMsg>(0)
            || payload.match_element::<GroupDownMsg>(0)))
        || (payload.len() > 1 && payload.match_element::<SysAtom>(0))
}
