//! Tag types for the framework-level message protocols.
//!
//! Atoms are zero-sized markers placed at the front of a payload to select
//! a protocol branch: the pool commands are `(SysAtom, PutAtom, actor)`,
//! `(SysAtom, DeleteAtom, actor?)`, and `(SysAtom, GetAtom)`; the group
//! broker protocol uses `(JoinAtom, actor)`, `(LeaveAtom, actor)`, and
//! `(ForwardAtom, message)`. These shapes are wire-stable.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

macro_rules! atom {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
        )]
        pub struct $name;
    };
}

atom! {
    /// Marks a framework-level command; always the first element.
    SysAtom
}

atom! {
    /// Pool command: add a worker.
    PutAtom
}

atom! {
    /// Pool command: remove one worker, or all workers when no argument
    /// follows.
    DeleteAtom
}

atom! {
    /// Pool command: snapshot the worker vector. Also the nameserver
    /// group-lookup selector.
    GetAtom
}

atom! {
    /// Positive reply tag.
    OkAtom
}

atom! {
    /// Group broker command: add a remote acquaintance.
    JoinAtom
}

atom! {
    /// Group broker command: drop a remote acquaintance.
    LeaveAtom
}

atom! {
    /// Group broker command: publish the wrapped message to subscribers
    /// and acquaintances.
    ForwardAtom
}

atom! {
    /// Remote group module internal command: resolve an identifier.
    FetchAtom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_atoms_are_distinct_element_types() {
        let msg = Message::builder().append(SysAtom).append(GetAtom).build();
        assert!(msg.matches::<(SysAtom, GetAtom)>());
        assert!(!msg.matches::<(SysAtom, PutAtom)>());
    }

    #[test]
    fn test_atom_equality() {
        assert_eq!(SysAtom, SysAtom);
        assert_eq!(JoinAtom::default(), JoinAtom);
    }
}
