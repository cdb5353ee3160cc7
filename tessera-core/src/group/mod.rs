//! Groups: broadcast endpoints with local delivery and remote proxying.
//!
//! # Components
//!
//! - [`Group`] - Cheap handle to a group instance
//! - [`AbstractGroup`] - Operations every group implements
//! - [`GroupModule`] - Named factory ("local", "remote", user modules)
//! - [`GroupManager`] - Module map and identifier resolution
//!
//! A local group fans messages out to its subscribers and runs a hidden
//! broker actor that relays traffic to remote acquaintances. A proxy for a
//! remotely-owned group relays local publishes to the remote broker and
//! local subscriptions through a hidden proxy broker; a monitor actor
//! converts the death of the remote broker into `GroupDownMsg` for all
//! local subscribers.

// Layer 1: Standard library imports
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

// Layer 3: Internal module imports
use crate::actor::attachable::Attachable;
use crate::actor::exit_reason::ExitReason;
use crate::actor::handle::{ActorAddr, ActorRef};
use crate::message::payload::Message;
use crate::scheduler::Scheduler;
use crate::sync::SharedSpinlock;
use crate::util::ids::MessageId;

pub mod local;
pub mod manager;
pub mod proxy;
pub mod remote;

pub use local::LocalGroupModule;
pub use manager::GroupManager;
pub use remote::{NameserverConnector, RemoteGroupModule};

/// Errors from the group subsystem.
#[derive(Error, Debug)]
pub enum GroupError {
    /// No module registered under the given scheme.
    #[error("no module named \"{0}\" found")]
    NoSuchModule(String),

    /// The identifier does not parse for the chosen module.
    #[error("invalid group identifier: {0}")]
    InvalidIdentifier(String),

    /// The remote side could not be reached or did not answer.
    #[error("could not resolve remote group: {0}")]
    Unreachable(String),

    /// The owning actor system is gone.
    #[error("actor system already shut down")]
    SystemDown,
}

/// Operations every group implements.
pub trait AbstractGroup: Send + Sync + 'static {
    /// The owning module's name.
    fn module_name(&self) -> &str;

    /// The group identifier within its module.
    fn identifier(&self) -> &str;

    /// The broker actor relaying this group's remote traffic.
    fn broker(&self) -> Option<ActorRef>;

    /// Publish a message to the group.
    fn enqueue(
        &self,
        sender: Option<ActorRef>,
        mid: MessageId,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    );

    /// Add a subscriber channel; returns `true` iff newly added.
    fn subscribe(&self, who: ActorRef) -> bool;

    /// Remove a subscriber channel.
    fn unsubscribe(&self, who: &ActorAddr);

    /// Deliver a payload to the local subscribers only.
    fn send_all_subscribers(
        &self,
        sender: Option<ActorRef>,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    );

    /// Shut the group down, terminating the actors it spawned.
    fn stop(&self);
}

/// Named factory for groups.
pub trait GroupModule: Send + Sync + 'static {
    /// The module's scheme name.
    fn name(&self) -> &str;

    /// Resolve an identifier to a group, creating it when necessary.
    fn get(&self, identifier: &str) -> Result<Group, GroupError>;

    /// Materialize a deserialized group from its identifier and broker
    /// handle.
    fn load(&self, identifier: &str, broker: ActorRef) -> Result<Group, GroupError>;

    /// Shut down every group this module created.
    fn stop(&self);
}

/// Cheap handle to a group instance; the invalid handle refers to no
/// group.
#[derive(Clone, Default)]
pub struct Group {
    inner: Option<Arc<dyn AbstractGroup>>,
}

impl Group {
    /// The handle referring to no group.
    pub fn invalid() -> Self {
        Self { inner: None }
    }

    pub(crate) fn from_arc(inner: Arc<dyn AbstractGroup>) -> Self {
        Self { inner: Some(inner) }
    }

    /// Whether the handle refers to a group.
    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// The underlying group, if any.
    pub fn get(&self) -> Option<&Arc<dyn AbstractGroup>> {
        self.inner.as_ref()
    }

    /// The module name, or `""` for the invalid handle.
    pub fn module_name(&self) -> &str {
        self.inner.as_deref().map_or("", AbstractGroup::module_name)
    }

    /// The identifier, or `""` for the invalid handle.
    pub fn identifier(&self) -> &str {
        self.inner.as_deref().map_or("", AbstractGroup::identifier)
    }

    /// Publish a message; no-op on the invalid handle.
    pub fn enqueue(
        &self,
        sender: Option<ActorRef>,
        mid: MessageId,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    ) {
        if let Some(group) = &self.inner {
            group.enqueue(sender, mid, payload, scheduler);
        }
    }

    /// Add a subscriber; returns `false` on the invalid handle.
    pub fn subscribe(&self, who: ActorRef) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|group| group.subscribe(who))
    }

    /// Remove a subscriber.
    pub fn unsubscribe(&self, who: &ActorAddr) {
        if let Some(group) = &self.inner {
            group.unsubscribe(who);
        }
    }

    /// The group's broker actor.
    pub fn broker(&self) -> Option<ActorRef> {
        self.inner.as_ref().and_then(|group| group.broker())
    }

    /// Shut the group down.
    pub fn stop(&self) {
        if let Some(group) = &self.inner {
            group.stop();
        }
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for Group {}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(group) => write!(f, "Group({}:{})", group.module_name(), group.identifier()),
            None => f.write_str("Group(invalid)"),
        }
    }
}

/// Send a kill to each actor and block until every one has terminated.
///
/// A cleanup functor serves as the down monitor: it fires exactly once
/// per actor, immediately so for actors that are already dead, which
/// keeps this idempotent when a group is stopped twice. Callers pass
/// local actors only; remote constituents are their owning node's
/// concern.
pub(crate) fn await_all_down(actors: &[ActorRef]) {
    let latch = Arc::new((Mutex::new(actors.len()), Condvar::new()));
    for actor in actors {
        let latch = Arc::clone(&latch);
        actor.attach(Attachable::functor(move |_| {
            let (remaining, down) = &*latch;
            let mut remaining = remaining.lock();
            *remaining -= 1;
            if *remaining == 0 {
                down.notify_all();
            }
        }));
    }
    for actor in actors {
        actor.send_exit(ExitReason::Kill, None);
    }
    let (remaining, down) = &*latch;
    let mut remaining = remaining.lock();
    while *remaining > 0 {
        down.wait(&mut remaining);
    }
}

/// Subscriber set shared by local groups and proxies.
///
/// Readers snapshot under the shared lock and release it before any
/// enqueue, so a subscriber's mailbox is never entered while the set is
/// locked.
pub(crate) struct SubscriberSet {
    channels: SharedSpinlock<BTreeSet<ActorRef>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self {
            channels: SharedSpinlock::new(BTreeSet::new()),
        }
    }

    /// Insert under the exclusive lock; returns `(added, new_size)`.
    pub(crate) fn add(&self, who: ActorRef) -> (bool, usize) {
        let mut channels = self.channels.write();
        let added = channels.insert(who);
        (added, channels.len())
    }

    /// Erase under the exclusive lock; returns `(removed, new_size)`.
    pub(crate) fn erase(&self, who: &ActorAddr) -> (bool, usize) {
        let mut channels = self.channels.write();
        let before = channels.len();
        channels.retain(|c| c.address() != *who);
        (channels.len() < before, channels.len())
    }

    /// Snapshot the channels under the shared lock.
    pub(crate) fn snapshot(&self) -> Vec<ActorRef> {
        self.channels.read().iter().cloned().collect()
    }
}
