//! Byte-stable wire encoding of node ids, actor handles, and groups.
//!
//! The substrate defines exactly what crosses a process boundary:
//!
//! - node id: 20 host-digest bytes, then the process id as `u32` BE
//! - handle: node id, then the actor id as `u64` BE
//! - group: module name and identifier as length-prefixed strings, then
//!   the broker handle
//!
//! Deserializing a handle resolves through the local registry; handles of
//! other nodes are the transport layer's concern and are rejected here.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut};
use thiserror::Error;

// Layer 3: Internal module imports
use crate::actor::handle::ActorRef;
use crate::group::Group;
use crate::system::actor_system::ActorSystem;
use crate::util::ids::ActorId;
use crate::util::node_id::{NodeId, HOST_ID_SIZE};

/// Errors from wire decoding.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WireError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A length-prefixed string was not valid UTF-8.
    #[error("malformed string")]
    BadString,

    /// The handle belongs to another node; proxies are created by the
    /// transport layer, not here.
    #[error("handle refers to a non-local actor")]
    NonLocalActor,

    /// No group module is registered under the encoded name.
    #[error("unknown group module: {0}")]
    UnknownModule(String),

    /// A group was encoded without a live broker.
    #[error("group broker is not serializable")]
    NoBroker,
}

/// Append a node id.
pub fn save_node_id(node: &NodeId, sink: &mut impl BufMut) {
    sink.put_slice(node.host_id());
    sink.put_u32(node.process_id());
}

/// Read a node id.
pub fn load_node_id(source: &mut impl Buf) -> Result<NodeId, WireError> {
    if source.remaining() < HOST_ID_SIZE + 4 {
        return Err(WireError::UnexpectedEof);
    }
    let mut host = [0u8; HOST_ID_SIZE];
    source.copy_to_slice(&mut host);
    let pid = source.get_u32();
    Ok(NodeId::from_parts(host, pid))
}

/// Append a handle: node id plus actor id. `None` encodes as the invalid
/// node with actor id zero.
pub fn save_handle(handle: Option<&ActorRef>, sink: &mut impl BufMut) {
    match handle {
        Some(handle) => {
            save_node_id(&handle.node(), sink);
            sink.put_u64(handle.id().raw());
        }
        None => {
            save_node_id(&NodeId::invalid(), sink);
            sink.put_u64(0);
        }
    }
}

/// Read a handle back, resolving through `system`'s registry.
///
/// Returns `Ok(None)` for the encoded null handle and for local actors
/// that have died since serialization.
pub fn load_handle(
    system: &ActorSystem,
    source: &mut impl Buf,
) -> Result<Option<ActorRef>, WireError> {
    let node = load_node_id(source)?;
    if source.remaining() < 8 {
        return Err(WireError::UnexpectedEof);
    }
    let id = ActorId::from_raw(source.get_u64());
    if !id.is_valid() {
        return Ok(None);
    }
    if node != system.node() {
        return Err(WireError::NonLocalActor);
    }
    Ok(system.registry().get(id))
}

/// Append a length-prefixed string.
pub fn save_string(value: &str, sink: &mut impl BufMut) {
    debug_assert!(value.len() <= u16::MAX as usize);
    sink.put_u16(value.len() as u16);
    sink.put_slice(value.as_bytes());
}

/// Read a length-prefixed string.
pub fn load_string(source: &mut impl Buf) -> Result<String, WireError> {
    if source.remaining() < 2 {
        return Err(WireError::UnexpectedEof);
    }
    let len = source.get_u16() as usize;
    if source.remaining() < len {
        return Err(WireError::UnexpectedEof);
    }
    let mut bytes = vec![0u8; len];
    source.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|_| WireError::BadString)
}

/// Append a group: module name, identifier, broker handle.
pub fn save_group(group: &Group, sink: &mut impl BufMut) -> Result<(), WireError> {
    let broker = match group.get() {
        Some(_) => group.broker().ok_or(WireError::NoBroker)?,
        None => {
            // the invalid group encodes as an empty module with a null
            // broker
            save_string("", sink);
            save_string("", sink);
            save_handle(None, sink);
            return Ok(());
        }
    };
    save_string(group.module_name(), sink);
    save_string(group.identifier(), sink);
    save_handle(Some(&broker), sink);
    Ok(())
}

/// Read a group back, materializing it through the named module.
pub fn load_group(system: &ActorSystem, source: &mut impl Buf) -> Result<Group, WireError> {
    let module_name = load_string(source)?;
    let identifier = load_string(source)?;
    let broker = load_handle(system, source)?;
    let Some(broker) = broker else {
        return Ok(Group::invalid());
    };
    let module = system
        .groups()
        .get_module(&module_name)
        .ok_or_else(|| WireError::UnknownModule(module_name.clone()))?;
    module
        .load(&identifier, broker)
        .map_err(|_| WireError::UnknownModule(module_name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::system::config::SystemConfig;

    fn system() -> ActorSystem {
        ActorSystem::new(SystemConfig::default()).unwrap()
    }

    #[test]
    fn test_node_id_roundtrip() {
        let node = NodeId::local();
        let mut buf = Vec::new();
        save_node_id(&node, &mut buf);
        assert_eq!(buf.len(), HOST_ID_SIZE + 4);
        let back = load_node_id(&mut buf.as_slice()).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_handle_roundtrip_same_node() {
        let sys = system();
        let actor = sys.spawn(Box::new(|_, _| None));
        let mut buf = Vec::new();
        save_handle(Some(&actor), &mut buf);
        let back = load_handle(&sys, &mut buf.as_slice()).unwrap();
        assert_eq!(back.as_ref().map(ActorRef::address), Some(actor.address()));
    }

    #[test]
    fn test_dead_handle_loads_as_none() {
        let sys = system();
        let actor = sys.spawn(Box::new(|_, _| None));
        let mut buf = Vec::new();
        save_handle(Some(&actor), &mut buf);
        actor.cleanup(crate::actor::exit_reason::ExitReason::Normal, None);
        let back = load_handle(&sys, &mut buf.as_slice()).unwrap();
        assert!(back.is_none());
    }

    #[test]
    fn test_null_handle_roundtrip() {
        let sys = system();
        let mut buf = Vec::new();
        save_handle(None, &mut buf);
        assert!(load_handle(&sys, &mut buf.as_slice()).unwrap().is_none());
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let sys_a = system();
        let sys_b = system();
        let foreign = sys_b.spawn(Box::new(|_, _| None));
        let mut buf = Vec::new();
        save_handle(Some(&foreign), &mut buf);
        let result = load_handle(&sys_a, &mut buf.as_slice());
        assert_eq!(result.unwrap_err(), WireError::NonLocalActor);
    }

    #[test]
    fn test_truncated_input() {
        let sys = system();
        let mut buf = Vec::new();
        save_handle(None, &mut buf);
        buf.truncate(buf.len() - 1);
        assert_eq!(
            load_handle(&sys, &mut buf.as_slice()).unwrap_err(),
            WireError::UnexpectedEof
        );
    }

    #[test]
    fn test_group_roundtrip() {
        let sys = system();
        let group = sys.groups().get_local("updates");
        let mut buf = Vec::new();
        save_group(&group, &mut buf).unwrap();
        let back = load_group(&sys, &mut buf.as_slice()).unwrap();
        assert_eq!(back, group);
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        save_string("name@host:1234", &mut buf);
        assert_eq!(load_string(&mut buf.as_slice()).unwrap(), "name@host:1234");
    }
}
