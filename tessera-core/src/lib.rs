//! # tessera-core - Actor Substrate Runtime
//!
//! The runtime core of an actor framework: data structures and protocols
//! that make actors addressable, deliver messages to them, manage their
//! lifetimes, and allow safe multi-party observation.
//!
//! # Quick Start
//!
//! ```rust
//! use tessera_core::prelude::*;
//!
//! let system = ActorSystem::new(SystemConfig::default()).unwrap();
//!
//! // an actor that doubles every integer it receives as a request
//! let doubler = system.spawn(Box::new(|_ctx, element| {
//!     let x = element.payload.get::<i64>(0).copied().unwrap_or(0);
//!     Some(Message::of(x * 2))
//! }));
//!
//! // a probe collecting responses
//! let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
//! let sink = seen.clone();
//! let probe = system.spawn(Box::new(move |_ctx, element| {
//!     sink.lock().push(element.payload.clone());
//!     None
//! }));
//!
//! let mid = probe.make_request_id();
//! doubler.enqueue(
//!     MailboxElement::make(Some(probe.clone()), mid, Message::of(21i64)),
//!     None,
//! );
//! assert_eq!(seen.lock()[0].get::<i64>(0), Some(&42));
//! ```
//!
//! # Core Concepts
//!
//! ## Reference model
//!
//! Every actor lives behind a control block that decouples identity from
//! the actor body. [`ActorRef`] is a strong, owning handle; [`ActorAddr`]
//! is a weak identity that stays hashable and ordered after the actor
//! dies. Upgrading an address succeeds only while the actor is alive.
//!
//! ## Delivery contract
//!
//! `enqueue` either appends the envelope to the target's mailbox and
//! notifies the scheduler, or - for decorators - transforms and re-routes
//! it in the caller's thread. Enqueue on a terminated actor is rejected;
//! rejected requests are still answered with an error reply so the
//! caller never deadlocks.
//!
//! ## Observation
//!
//! Monitors deliver exactly one down message per attachment, regardless
//! of whether they were attached before or after the target's death.
//! Links are symmetric and propagate non-normal exits; a peer with
//! `trap_exit` receives them as regular messages instead.
//!
//! # Module Organization
//!
//! ## Core Substrate
//! - [`actor`] - Identity, references, attachables, lifecycle, event actor
//! - [`message`] - Type-erased payloads, envelopes, system taxonomy
//! - [`registry`] - Id allocation, lookup tables, live-actor counter
//! - [`scheduler`] - The contract with the external scheduler
//!
//! ## Composition
//! - [`group`] - Local broadcast groups, brokers, remote proxies
//! - [`decorator`] - Actor pool, sequencer, splitter, adapter
//!
//! ## Infrastructure
//! - [`system`] - ActorSystem, configuration, errors
//! - [`sync`] - Shared spinlock
//! - [`util`] - Ids, node identity, wire encoding

pub mod actor;
pub mod decorator;
pub mod group;
pub mod message;
pub mod prelude;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod system;
pub mod util;

// Re-export commonly used types
pub use actor::{
    Attachable, ActorAddr, ActorRef, Behavior, BehaviorContext, EventActor, ExitReason,
    ObserveKind, ObserveToken, SpawnOptions,
};
pub use decorator::{
    ActorPool, Adapter, Broadcast, IndexMapping, PoolPolicy, RandomPolicy, RoundRobin, Sequencer,
    SplitJoin, Splitter,
};
pub use group::{Group, GroupError, GroupManager, GroupModule};
pub use message::{DownMsg, ErrorMsg, ExitMsg, GroupDownMsg, MailboxElement, Message};
pub use registry::ActorRegistry;
pub use scheduler::{InlineScheduler, Scheduler};
pub use system::{ActorSystem, SystemConfig, SystemError};
pub use sync::SharedSpinlock;
pub use util::{ActorId, MessageId, NodeId};
