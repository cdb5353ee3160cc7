//! Decorators: composite actors that transform and forward messages.
//!
//! # Components
//!
//! - [`ActorPool`] - Dispatches to a worker set through a pluggable policy
//! - [`Sequencer`] - The composed actor `f after g`
//! - [`Splitter`] - Fan-out to workers, fan-in of their responses
//! - [`Adapter`] - Prepends bound arguments to each forwarded message
//!
//! Decorators are abstract actors, hence addressable; their dispatch runs
//! in the sender's thread and never invokes user behavior.

pub mod adapter;
pub mod pool;
pub mod sequencer;
pub mod split_join;
pub mod splitter;

pub use adapter::{Adapter, IndexMapping};
pub use pool::{ActorPool, Broadcast, PoolPolicy, RandomPolicy, RoundRobin, SplitJoin};
pub use sequencer::Sequencer;
pub use splitter::Splitter;
