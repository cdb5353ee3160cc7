//! Proxies for remotely-owned groups.

// Layer 1: Standard library imports
use std::sync::{Arc, OnceLock};

// Layer 2: Third-party crate imports
use tracing::{debug, trace};

// Layer 3: Internal module imports
use super::{AbstractGroup, Group, SubscriberSet};
use crate::actor::event::{Behavior, SpawnOptions};
use crate::actor::handle::{ActorAddr, ActorRef};
use crate::message::atoms::{ForwardAtom, JoinAtom, LeaveAtom};
use crate::message::envelope::MailboxElement;
use crate::message::payload::Message;
use crate::message::system::{DownMsg, GroupDownMsg};
use crate::scheduler::Scheduler;
use crate::system::actor_system::ActorSystem;
use crate::util::ids::MessageId;

/// Local representative of a group owned by another node.
///
/// Publishes are wrapped in `(forward, msg)` and sent to the remote
/// broker. Subscription is reference-counted towards the remote side: the
/// first local subscriber triggers `(join, proxy_broker)`, the last
/// unsubscribe `(leave, proxy_broker)`. The spawned proxy broker
/// re-broadcasts whatever the remote side sends to the local subscribers,
/// and a monitor actor converts the remote broker's death into a
/// `GroupDownMsg` for every local subscriber.
pub struct GroupProxy {
    identifier: String,
    subscribers: SubscriberSet,
    remote_broker: ActorRef,
    proxy_broker: OnceLock<ActorRef>,
    monitor: OnceLock<ActorRef>,
}

impl GroupProxy {
    pub(crate) fn new(
        system: &ActorSystem,
        remote_broker: ActorRef,
        identifier: String,
    ) -> Arc<Self> {
        let proxy = Arc::new(Self {
            identifier,
            subscribers: SubscriberSet::new(),
            remote_broker,
            proxy_broker: OnceLock::new(),
            monitor: OnceLock::new(),
        });
        let proxy_broker = system.spawn_with(
            SpawnOptions {
                hidden: true,
                actor_name: Some("proxy_broker"),
                ..SpawnOptions::default()
            },
            proxy_broker_behavior(Arc::clone(&proxy)),
        );
        let _ = proxy.proxy_broker.set(proxy_broker);
        let monitor = system.spawn_with(
            SpawnOptions {
                hidden: true,
                actor_name: Some("broker_monitor"),
                ..SpawnOptions::default()
            },
            broker_monitor_behavior(Arc::clone(&proxy)),
        );
        // the monitor registers its observation on the remote broker
        proxy
            .remote_broker
            .attach(crate::actor::attachable::Attachable::monitor(
                monitor.address(),
            ));
        let _ = proxy.monitor.set(monitor);
        proxy
    }

    fn proxy_broker_handle(&self) -> Option<ActorRef> {
        self.proxy_broker.get().cloned()
    }
}

impl AbstractGroup for GroupProxy {
    fn module_name(&self) -> &str {
        "local"
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn broker(&self) -> Option<ActorRef> {
        Some(self.remote_broker.clone())
    }

    fn enqueue(
        &self,
        sender: Option<ActorRef>,
        mid: MessageId,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    ) {
        // forward the message to the remote broker
        self.remote_broker.enqueue(
            MailboxElement::make(
                sender,
                mid,
                Message::builder().append(ForwardAtom).append(payload).build(),
            ),
            scheduler,
        );
    }

    fn subscribe(&self, who: ActorRef) -> bool {
        let (added, new_size) = self.subscribers.add(who);
        if !added {
            trace!(group = %self.identifier, "actor already joined group");
            return false;
        }
        if new_size == 1 {
            // first local subscriber: join the remote source
            if let Some(proxy_broker) = self.proxy_broker_handle() {
                debug!(group = %self.identifier, "joining remote group");
                self.remote_broker.send_anonymous(
                    Message::builder().append(JoinAtom).append(proxy_broker).build(),
                    None,
                );
            }
        }
        true
    }

    fn unsubscribe(&self, who: &ActorAddr) {
        let (removed, new_size) = self.subscribers.erase(who);
        if removed && new_size == 0 {
            // no subscriber left on this node: leave the remote source
            if let Some(proxy_broker) = self.proxy_broker_handle() {
                debug!(group = %self.identifier, "leaving remote group");
                self.remote_broker.send_anonymous(
                    Message::builder().append(LeaveAtom).append(proxy_broker).build(),
                    None,
                );
            }
        }
    }

    fn send_all_subscribers(
        &self,
        sender: Option<ActorRef>,
        payload: Message,
        scheduler: Option<&dyn Scheduler>,
    ) {
        for channel in self.subscribers.snapshot() {
            channel.enqueue(
                MailboxElement::make(sender.clone(), MessageId::invalid(), payload.clone()),
                scheduler,
            );
        }
    }

    fn stop(&self) {
        // kill our local constituents and wait for them; the remote
        // broker is its owning node's concern
        let locals: Vec<ActorRef> = [self.monitor.get(), self.proxy_broker.get()]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        super::await_all_down(&locals);
    }
}

/// Relays messages delivered by the remote side to the local subscribers.
fn proxy_broker_behavior(proxy: Arc<GroupProxy>) -> Behavior {
    Box::new(move |ctx, element| {
        proxy.send_all_subscribers(
            element.sender.clone(),
            element.payload.clone(),
            ctx.scheduler(),
        );
        None
    })
}

/// Watches the remote broker; on its death, synthesizes a group-down
/// notification for every local subscriber and quits.
fn broker_monitor_behavior(proxy: Arc<GroupProxy>) -> Behavior {
    Box::new(move |ctx, element| {
        if let Some(down) = element.payload.get::<DownMsg>(0) {
            debug!(group = %proxy.identifier(), "remote broker down");
            let group = Group::from_arc(Arc::clone(&proxy) as Arc<dyn AbstractGroup>);
            proxy.send_all_subscribers(
                Some(ctx.self_ref().clone()),
                Message::of(GroupDownMsg { group }),
                ctx.scheduler(),
            );
            ctx.quit(down.reason.clone());
        }
        None
    })
}
