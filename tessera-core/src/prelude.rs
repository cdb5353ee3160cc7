//! Convenience re-exports for common usage.
//!
//! ```rust
//! use tessera_core::prelude::*;
//!
//! let system = ActorSystem::new(SystemConfig::default()).unwrap();
//! let group = system.groups().anonymous();
//! assert!(group.is_valid());
//! ```

pub use crate::actor::{
    ActorAddr, ActorRef, Attachable, Behavior, BehaviorContext, EventActor, ExitReason,
    ObserveKind, ObserveToken, SpawnOptions,
};
pub use crate::decorator::{
    ActorPool, Adapter, Broadcast, IndexMapping, PoolPolicy, RandomPolicy, RoundRobin, Sequencer,
    SplitJoin, Splitter,
};
pub use crate::group::{Group, GroupError, GroupManager, GroupModule};
pub use crate::message::{
    DownMsg, ErrorMsg, ExitMsg, GroupDownMsg, MailboxElement, Message, MessageBuilder,
};
pub use crate::scheduler::{InlineScheduler, Scheduler};
pub use crate::system::{ActorSystem, SystemConfig, SystemError};
pub use crate::util::{ActorId, MessageId, NodeId};
