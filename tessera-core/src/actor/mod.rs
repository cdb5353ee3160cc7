//! The actor substrate: identity, references, attachment, and lifecycle.
//!
//! # Components
//!
//! - [`ActorCore`] - State shared by every actor: flags, fail state,
//!   attachable list, and the cleanup protocol
//! - [`AbstractActor`] - Trait implemented by every addressable endpoint
//! - [`ActorRef`] / [`ActorAddr`] - Strong and weak references
//! - [`Attachable`] - Interested parties fired exactly once on termination
//! - [`ExitReason`] - Why an actor terminated
//! - [`EventActor`] - The substrate's own runnable actor with an
//!   installable behavior, used for brokers, collectors, and tests
//!
//! # Reference model
//!
//! An [`ActorRef`] keeps the actor body alive; an [`ActorAddr`] is identity
//! only. When the last strong reference drops, the body is destroyed while
//! addresses remain hashable and ordered, so observers keyed by address
//! keep working after death.

pub mod attachable;
pub mod core;
pub mod event;
pub mod exit_reason;
pub mod handle;

pub use attachable::{Attachable, ObserveKind, ObserveToken};
pub use core::{AbstractActor, ActorCore};
pub use event::{Behavior, BehaviorContext, EventActor, SpawnOptions};
pub use exit_reason::ExitReason;
pub use handle::{ActorAddr, ActorRef};
