//! Local groups and their brokers.

// Layer 1: Standard library imports
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock, Weak};

// Layer 2: Third-party crate imports
use tracing::{debug, trace};

// Layer 3: Internal module imports
use super::{AbstractGroup, Group, GroupError, GroupModule, SubscriberSet};
use crate::actor::event::{Behavior, SpawnOptions};
use crate::actor::handle::{ActorAddr, ActorRef};
use crate::message::atoms::{ForwardAtom, JoinAtom, LeaveAtom};
use crate::message::envelope::MailboxElement;
use crate::message::payload::Message;
use crate::message::system::DownMsg;
use crate::scheduler::Scheduler;
use crate::sync::SharedSpinlock;
use crate::system::actor_system::{ActorSystem, SystemState};
use crate::util::ids::MessageId;

/// A group whose subscribers live on this node.
///
/// Owns a hidden broker actor that relays traffic between the local
/// subscribers and remote acquaintances: local publishes reach the broker,
/// which fans them out to every acquaintance; messages from remote
/// sources arrive as `(forward, msg)` at the broker and are re-broadcast
/// locally. This decouples remote sources from the local subscriber set
/// and breaks delivery cycles.
pub struct LocalGroup {
    identifier: String,
    subscribers: SubscriberSet,
    broker: OnceLock<ActorRef>,
}

impl LocalGroup {
    pub(crate) fn new(system: &ActorSystem, identifier: String) -> Arc<Self> {
        let group = Arc::new(Self {
            identifier,
            subscribers: SubscriberSet::new(),
            broker: OnceLock::new(),
        });
        let broker = system.spawn_with(
            SpawnOptions {
                hidden: true,
                actor_name: Some("local_broker"),
                ..SpawnOptions::default()
            },
            local_broker_behavior(Arc::clone(&group)),
        );
        let _ = group.broker.set(broker);
        group
    }

    pub(crate) fn add_subscriber(&self, who: ActorRef) -> (bool, usize) {
        trace!(group = %self.identifier, subscriber = %who.id(), "subscribe");
        self.subscribers.add(who)
    }

    pub(crate) fn erase_subscriber(&self, who: &ActorAddr) -> (bool, usize) {
        trace!(group = %self.identifier, subscriber = %who.id(), "unsubscribe");
        self.subscribers.erase(who)
    }
}

impl AbstractGroup for LocalGroup {
    fn module_name(&self) -> &str {
        "local"
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn broker(&self) -> Option<ActorRef> {
        self.broker.get().cloned()
    }

    fn enqueue(
        &self,
        sender: Option<ActorRef>,
        _mid: MessageId,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    ) {
        self.send_all_subscribers(sender.clone(), payload.clone(), scheduler);
        // the broker forwards to remote acquaintances
        if let Some(broker) = self.broker.get() {
            broker.enqueue(
                MailboxElement::make(sender, MessageId::invalid(), payload),
                scheduler,
            );
        }
    }

    fn subscribe(&self, who: ActorRef) -> bool {
        self.add_subscriber(who).0
    }

    fn unsubscribe(&self, who: &ActorAddr) {
        self.erase_subscriber(who);
    }

    fn send_all_subscribers(
        &self,
        sender: Option<ActorRef>,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    ) {
        // snapshot, release, then send
        for channel in self.subscribers.snapshot() {
            channel.enqueue(
                MailboxElement::make(sender.clone(), MessageId::invalid(), payload.clone()),
                scheduler,
            );
        }
    }

    fn stop(&self) {
        // kill the broker and wait for it to go down before returning
        if let Some(broker) = self.broker.get() {
            super::await_all_down(std::slice::from_ref(broker));
        }
    }
}

/// Behavior of a local group's hidden broker.
fn local_broker_behavior(group: Arc<LocalGroup>) -> Behavior {
    let mut acquaintances: BTreeSet<ActorRef> = BTreeSet::new();
    Box::new(move |ctx, element| {
        let payload = element.payload.clone();
        if payload.matches::<(DownMsg,)>() {
            if let Some(down) = payload.get::<DownMsg>(0) {
                acquaintances.retain(|a| a.address() != down.source);
            }
            return None;
        }
        if payload.matches::<(JoinAtom, ActorRef)>() {
            if let Some(other) = payload.get::<ActorRef>(1) {
                if acquaintances.insert(other.clone()) {
                    ctx.monitor(other);
                }
            }
            return None;
        }
        if payload.matches::<(LeaveAtom, ActorRef)>() {
            if let Some(other) = payload.get::<ActorRef>(1) {
                if acquaintances.remove(other) {
                    ctx.demonitor(other);
                }
            }
            return None;
        }
        if payload.matches::<(ForwardAtom, Message)>() {
            if let Some(inner) = payload.get::<Message>(1) {
                // local forwarding, then every acquaintance
                group.send_all_subscribers(
                    element.sender.clone(),
                    inner.clone(),
                    ctx.scheduler(),
                );
                send_to_acquaintances(
                    &acquaintances,
                    element.sender.clone(),
                    inner.clone(),
                    ctx.scheduler(),
                );
            }
            return None;
        }
        // instead of dropping "unexpected" messages, forward them to the
        // acquaintances: the group published from this node
        send_to_acquaintances(
            &acquaintances,
            element.sender.clone(),
            payload,
            ctx.scheduler(),
        );
        None
    })
}

fn send_to_acquaintances(
    acquaintances: &BTreeSet<ActorRef>,
    sender: Option<ActorRef>,
    payload: Message,
    scheduler: Option<&dyn Scheduler>,
) {
    for acquaintance in acquaintances {
        acquaintance.enqueue(
            MailboxElement::make(sender.clone(), MessageId::invalid(), payload.clone()),
            scheduler,
        );
    }
}

/// The built-in "local" module.
pub struct LocalGroupModule {
    system: Weak<SystemState>,
    instances: SharedSpinlock<HashMap<String, Arc<LocalGroup>>>,
    proxies: SharedSpinlock<HashMap<ActorAddr, Arc<super::proxy::GroupProxy>>>,
}

impl LocalGroupModule {
    pub(crate) fn new(system: Weak<SystemState>) -> Self {
        Self {
            system,
            instances: SharedSpinlock::new(HashMap::new()),
            proxies: SharedSpinlock::new(HashMap::new()),
        }
    }

    fn system(&self) -> Result<ActorSystem, GroupError> {
        self.system
            .upgrade()
            .map(ActorSystem::from_state)
            .ok_or(GroupError::SystemDown)
    }
}

impl GroupModule for LocalGroupModule {
    fn name(&self) -> &str {
        "local"
    }

    fn get(&self, identifier: &str) -> Result<Group, GroupError> {
        let guard = self.instances.upgradable_read();
        if let Some(existing) = guard.get(identifier) {
            return Ok(Group::from_arc(Arc::clone(existing) as Arc<dyn AbstractGroup>));
        }
        let system = self.system()?;
        let fresh = LocalGroup::new(&system, identifier.to_string());
        let mut guard = guard.upgrade();
        // someone might preempt us between the two lock modes
        if let Some(existing) = guard.get(identifier) {
            let winner = Arc::clone(existing);
            drop(guard);
            fresh.stop();
            return Ok(Group::from_arc(winner));
        }
        guard.insert(identifier.to_string(), Arc::clone(&fresh));
        drop(guard);
        debug!(group = %identifier, "created local group");
        Ok(Group::from_arc(fresh))
    }

    fn load(&self, identifier: &str, broker: ActorRef) -> Result<Group, GroupError> {
        let system = self.system()?;
        if broker.node() == system.node() {
            return self.get(identifier);
        }
        // remotely-owned group: hand out a proxy keyed by its broker
        let broker_addr = broker.address();
        let guard = self.proxies.upgradable_read();
        if let Some(existing) = guard.get(&broker_addr) {
            return Ok(Group::from_arc(Arc::clone(existing) as Arc<dyn AbstractGroup>));
        }
        let fresh = super::proxy::GroupProxy::new(&system, broker, identifier.to_string());
        let mut guard = guard.upgrade();
        if let Some(existing) = guard.get(&broker_addr) {
            let winner = Arc::clone(existing);
            drop(guard);
            fresh.stop();
            return Ok(Group::from_arc(winner));
        }
        guard.insert(broker_addr, Arc::clone(&fresh));
        drop(guard);
        debug!(group = %identifier, "created group proxy");
        Ok(Group::from_arc(fresh))
    }

    fn stop(&self) {
        // swap the maps out before stopping anything
        let instances = std::mem::take(&mut *self.instances.write());
        let proxies = std::mem::take(&mut *self.proxies.write());
        for group in instances.values() {
            group.stop();
        }
        for proxy in proxies.values() {
            proxy.stop();
        }
        debug!(
            instances = instances.len(),
            proxies = proxies.len(),
            "local group module stopped"
        );
    }
}
