//! The "remote" group module: `name@host:port` identifiers resolved
//! through a nameserver actor.
//!
//! Transports are not the substrate's concern, so the module is handed a
//! connector that resolves a `host:port` authority to a nameserver actor
//! handle. Everything behind that handle is substrate logic: one cached
//! nameserver per authority, a `(get, name)` request per uncached group,
//! `None` stored on failure so repeated lookups fail fast, and group-down
//! fan-out when a nameserver dies.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

// Layer 2: Third-party crate imports
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::{AbstractGroup, Group, GroupError, GroupModule};
use crate::actor::event::SpawnOptions;
use crate::actor::handle::{ActorAddr, ActorRef};
use crate::message::atoms::{FetchAtom, GetAtom};
use crate::message::envelope::MailboxElement;
use crate::message::payload::Message;
use crate::message::system::{DownMsg, GroupDownMsg};
use crate::scheduler::Scheduler;
use crate::system::actor_system::ActorSystem;
use crate::util::ids::MessageId;

/// Resolves a `host:port` authority to a nameserver actor handle.
pub type NameserverConnector = Box<dyn Fn(&str) -> Option<ActorRef> + Send + Sync>;

/// Wraps a group received from a nameserver under its full
/// `name@host:port` key.
struct RemoteGroup {
    key: String,
    decorated: Group,
}

impl RemoteGroup {
    fn group_down(this: &Arc<Self>) {
        let as_group: Arc<dyn AbstractGroup> = Arc::clone(this) as Arc<dyn AbstractGroup>;
        let group = Group::from_arc(as_group);
        if let Some(inner) = this.decorated.get() {
            inner.send_all_subscribers(None, Message::of(GroupDownMsg { group }), None);
        }
    }
}

impl AbstractGroup for RemoteGroup {
    fn module_name(&self) -> &str {
        "remote"
    }

    fn identifier(&self) -> &str {
        &self.key
    }

    fn broker(&self) -> Option<ActorRef> {
        self.decorated.broker()
    }

    fn enqueue(
        &self,
        sender: Option<ActorRef>,
        mid: MessageId,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    ) {
        self.decorated.enqueue(sender, mid, payload, scheduler);
    }

    fn subscribe(&self, who: ActorRef) -> bool {
        self.decorated.subscribe(who)
    }

    fn unsubscribe(&self, who: &ActorAddr) {
        self.decorated.unsubscribe(who);
    }

    fn send_all_subscribers(
        &self,
        sender: Option<ActorRef>,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    ) {
        if let Some(inner) = self.decorated.get() {
            inner.send_all_subscribers(sender, payload, scheduler);
        }
    }

    fn stop(&self) {
        // the decorated group belongs to its own module
    }
}

/// Blocking resolution cache; `None` records a failed lookup.
struct SharedMap {
    instances: Mutex<HashMap<String, Option<Group>>>,
    resolved: Condvar,
}

impl SharedMap {
    fn new() -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            resolved: Condvar::new(),
        }
    }

    fn peek(&self, key: &str) -> Option<Option<Group>> {
        self.instances.lock().get(key).cloned()
    }

    fn put(&self, key: String, value: Option<Group>) {
        self.instances.lock().insert(key, value);
        self.resolved.notify_all();
    }

    /// Block until `key` is resolved one way or the other.
    fn await_resolved(&self, key: &str) -> Option<Group> {
        let mut guard = self.instances.lock();
        loop {
            if let Some(entry) = guard.get(key) {
                return entry.clone();
            }
            self.resolved.wait(&mut guard);
        }
    }
}

/// Group module resolving `name@host:port` identifiers.
pub struct RemoteGroupModule {
    cache: Arc<SharedMap>,
    worker: OnceLock<ActorRef>,
}

impl RemoteGroupModule {
    /// Create the module and spawn its hidden resolver worker.
    pub fn new(system: &ActorSystem, connector: NameserverConnector) -> Arc<Self> {
        let module = Arc::new(Self {
            cache: Arc::new(SharedMap::new()),
            worker: OnceLock::new(),
        });
        let cache = Arc::clone(&module.cache);
        let worker = system.spawn_with(
            SpawnOptions {
                hidden: true,
                actor_name: Some("remote_group_worker"),
                ..SpawnOptions::default()
            },
            worker_behavior(cache, connector),
        );
        let _ = module.worker.set(worker);
        module
    }
}

impl GroupModule for RemoteGroupModule {
    fn name(&self) -> &str {
        "remote"
    }

    fn get(&self, identifier: &str) -> Result<Group, GroupError> {
        // identifiers split on the raw first '@' and first ':'; names
        // containing either character are a known limitation
        let at = identifier.find('@');
        let colon = identifier.find(':');
        match (at, colon) {
            (Some(at), Some(colon)) if at < colon => {}
            _ => return Err(GroupError::InvalidIdentifier(identifier.to_string())),
        }
        if let Some(cached) = self.cache.peek(identifier) {
            return cached.ok_or_else(|| GroupError::Unreachable(identifier.to_string()));
        }
        let worker = self
            .worker
            .get()
            .cloned()
            .ok_or(GroupError::SystemDown)?;
        // fetch outside the cache lock; the worker fills the cache
        worker.send_anonymous(
            Message::builder()
                .append(FetchAtom)
                .append(identifier.to_string())
                .build(),
            None,
        );
        self.cache
            .await_resolved(identifier)
            .ok_or_else(|| GroupError::Unreachable(identifier.to_string()))
    }

    fn load(&self, identifier: &str, _broker: ActorRef) -> Result<Group, GroupError> {
        self.get(identifier)
    }

    fn stop(&self) {
        if let Some(worker) = self.worker.get() {
            super::await_all_down(std::slice::from_ref(worker));
        }
    }
}

struct Peer {
    nameserver: ActorRef,
    resolved: Vec<(String, Arc<RemoteGroup>)>,
}

fn worker_behavior(
    cache: Arc<SharedMap>,
    connector: NameserverConnector,
) -> crate::actor::event::Behavior {
    let mut peers: HashMap<String, Peer> = HashMap::new();
    let mut pending: HashMap<MessageId, (String, String)> = HashMap::new();
    Box::new(move |ctx, element| {
        let payload = element.payload.clone();
        // nameserver died: fail every group under its authority
        if let Some(down) = payload.get::<DownMsg>(0) {
            let authorities: Vec<String> = peers
                .iter()
                .filter(|(_, peer)| peer.nameserver.address() == down.source)
                .map(|(authority, _)| authority.clone())
                .collect();
            for authority in authorities {
                if let Some(peer) = peers.remove(&authority) {
                    warn!(%authority, "nameserver down, failing its groups");
                    for (key, group) in peer.resolved {
                        cache.put(key, None);
                        RemoteGroup::group_down(&group);
                    }
                }
            }
            pending.retain(|_, (key, authority)| {
                let dead = !peers.contains_key(authority.as_str());
                if dead {
                    cache.put(key.clone(), None);
                }
                !dead
            });
            return None;
        }
        // resolution request from the module
        if payload.matches::<(FetchAtom, String)>() {
            let Some(key) = payload.get::<String>(1) else {
                return None;
            };
            if cache.peek(key).is_some() {
                return None; // someone else resolved it meanwhile
            }
            // format is group@host:port
            let (Some(at), Some(colon)) = (key.find('@'), key.find(':')) else {
                cache.put(key.clone(), None);
                return None;
            };
            if at >= colon {
                cache.put(key.clone(), None);
                return None;
            }
            let name = key[..at].to_string();
            let authority = key[at + 1..].to_string();
            let nameserver = match peers.get(&authority) {
                Some(peer) => peer.nameserver.clone(),
                None => match connector(&authority) {
                    Some(nameserver) => {
                        ctx.monitor(&nameserver);
                        peers.insert(
                            authority.clone(),
                            Peer {
                                nameserver: nameserver.clone(),
                                resolved: Vec::new(),
                            },
                        );
                        nameserver
                    }
                    None => {
                        debug!(%key, "could not connect to nameserver");
                        cache.put(key.clone(), None);
                        return None;
                    }
                },
            };
            let mid = ctx.new_request_id();
            pending.insert(mid.response_id(), (key.clone(), authority));
            nameserver.enqueue(
                MailboxElement::make(
                    Some(ctx.self_ref().clone()),
                    mid,
                    Message::builder().append(GetAtom).append(name).build(),
                ),
                ctx.scheduler(),
            );
            return None;
        }
        // nameserver response
        if let Some((key, authority)) = pending.remove(&element.mid) {
            match payload.get::<Group>(0) {
                Some(group) if group.is_valid() => {
                    let wrapped = Arc::new(RemoteGroup {
                        key: key.clone(),
                        decorated: group.clone(),
                    });
                    if let Some(peer) = peers.get_mut(&authority) {
                        peer.resolved.push((key.clone(), Arc::clone(&wrapped)));
                    }
                    debug!(%key, "resolved remote group");
                    cache.put(key, Some(Group::from_arc(wrapped)));
                }
                _ => {
                    warn!(%key, "nameserver returned no usable group");
                    cache.put(key, None);
                }
            }
        }
        None
    })
}
