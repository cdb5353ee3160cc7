//! The group manager: a name-to-module map and identifier resolution.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tracing::debug;

// Layer 3: Internal module imports
use super::local::LocalGroupModule;
use super::remote::{NameserverConnector, RemoteGroupModule};
use super::{Group, GroupError, GroupModule};
use crate::system::actor_system::{ActorSystem, SystemState};

/// Counter backing anonymous group identifiers; process-global so
/// identifiers never repeat across systems.
static AD_HOC_ID: AtomicU64 = AtomicU64::new(0);

/// Owns the group modules of one actor system.
///
/// Module insertion is rare and guarded by the map's own sharding;
/// lookups are lock-free reads of cached module pointers.
pub struct GroupManager {
    system: Weak<SystemState>,
    modules: DashMap<String, Arc<dyn GroupModule>>,
}

impl GroupManager {
    pub(crate) fn new(system: Weak<SystemState>) -> Self {
        Self {
            system,
            modules: DashMap::new(),
        }
    }

    /// Register the built-in local module. Called once while the system
    /// comes up.
    pub(crate) fn init(&self) {
        self.modules.insert(
            "local".to_string(),
            Arc::new(LocalGroupModule::new(self.system.clone())) as Arc<dyn GroupModule>,
        );
    }

    /// Register a user-supplied module under its own name.
    pub fn add_module(&self, module: Arc<dyn GroupModule>) {
        let name = module.name().to_string();
        debug!(module = %name, "group module registered");
        self.modules.insert(name, module);
    }

    /// Register the "remote" module with the given nameserver connector.
    pub fn add_remote_module(&self, connector: NameserverConnector) -> Result<(), GroupError> {
        let system = self
            .system
            .upgrade()
            .map(ActorSystem::from_state)
            .ok_or(GroupError::SystemDown)?;
        let module = RemoteGroupModule::new(&system, connector);
        self.add_module(module);
        Ok(())
    }

    /// Look up a module by name.
    pub fn get_module(&self, name: &str) -> Option<Arc<dyn GroupModule>> {
        self.modules.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolve `identifier` through the module registered under
    /// `module_name`.
    pub fn get(&self, module_name: &str, identifier: &str) -> Result<Group, GroupError> {
        match self.get_module(module_name) {
            Some(module) => module.get(identifier),
            None => Err(GroupError::NoSuchModule(module_name.to_string())),
        }
    }

    /// Resolve a `scheme:identifier` uri.
    pub fn get_uri(&self, uri: &str) -> Result<Group, GroupError> {
        match uri.find(':') {
            Some(split) => self.get(&uri[..split], &uri[split + 1..]),
            None => Err(GroupError::InvalidIdentifier(uri.to_string())),
        }
    }

    /// Resolve a local group; the local module never fails.
    pub fn get_local(&self, identifier: &str) -> Group {
        self.get("local", identifier).unwrap_or_else(|_| Group::invalid())
    }

    /// A local group under a freshly generated identifier.
    pub fn anonymous(&self) -> Group {
        let id = format!("__#{}", AD_HOC_ID.fetch_add(1, Ordering::Relaxed) + 1);
        self.get_local(&id)
    }

    /// Shut down every module.
    pub(crate) fn stop(&self) {
        for entry in self.modules.iter() {
            entry.value().stop();
        }
    }
}
