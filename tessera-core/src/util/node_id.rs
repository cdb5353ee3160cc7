// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::fs;
use std::sync::atomic::{AtomicU8, Ordering};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Number of bytes in a host identifier.
pub const HOST_ID_SIZE: usize = 20;

/// Distinguishes multiple actor systems inside one process: the last host
/// id byte is overridden by this counter.
static SYSTEM_INSTANCE: AtomicU8 = AtomicU8::new(0);

/// Process-unique host identifier.
///
/// A 160-bit digest of the host's network interface addresses and machine
/// id, paired with the OS process id. Two actor systems created in the same
/// process still get distinct node ids because the last digest byte is
/// overridden by a process-wide instance counter.
///
/// Node ids compare byte-wise on the host digest first, then on the process
/// id. The invalid (all-zero) node id compares less than all valid ones.
///
/// # Example
/// ```rust
/// use tessera_core::util::NodeId;
///
/// let a = NodeId::local();
/// let b = NodeId::local();
/// assert!(a.is_valid());
/// assert_ne!(a, b); // distinct per system instance
/// assert!(NodeId::invalid() < a);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId {
    host: [u8; HOST_ID_SIZE],
    pid: u32,
}

impl NodeId {
    /// The all-zero node id denoting "no node".
    pub const fn invalid() -> Self {
        Self {
            host: [0; HOST_ID_SIZE],
            pid: 0,
        }
    }

    /// Derive the node id for this process.
    ///
    /// Hashes the union of the host's MAC addresses and its machine id to
    /// 160 bits, then overrides the last byte with a process-wide counter
    /// so that each call (one per actor system) yields a distinct id.
    pub fn local() -> Self {
        let mut hasher = Sha256::new();
        for mac in mac_addresses() {
            hasher.update(mac.as_bytes());
        }
        hasher.update(machine_uuid().as_bytes());
        let digest = hasher.finalize();
        let mut host = [0u8; HOST_ID_SIZE];
        host.copy_from_slice(&digest[..HOST_ID_SIZE]);
        host[HOST_ID_SIZE - 1] = SYSTEM_INSTANCE.fetch_add(1, Ordering::Relaxed);
        Self {
            host,
            pid: std::process::id(),
        }
    }

    /// Construct a node id from its parts.
    pub const fn from_parts(host: [u8; HOST_ID_SIZE], pid: u32) -> Self {
        Self { host, pid }
    }

    /// The 20-byte host digest.
    pub const fn host_id(&self) -> &[u8; HOST_ID_SIZE] {
        &self.host
    }

    /// The OS process id component.
    pub const fn process_id(&self) -> u32 {
        self.pid
    }

    /// Whether this id denotes an actual node.
    pub fn is_valid(&self) -> bool {
        self.pid != 0 && self.host.iter().any(|&b| b != 0)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("invalid-node");
        }
        for byte in &self.host {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "#{}", self.pid)
    }
}

/// Collect the MAC addresses of all network interfaces.
///
/// Loopback and unset addresses are skipped. Returns an empty vector on
/// platforms without a readable interface table; the machine id then
/// carries the digest alone.
fn mac_addresses() -> Vec<String> {
    let mut result = Vec::new();
    if let Ok(entries) = fs::read_dir("/sys/class/net") {
        for entry in entries.flatten() {
            let mut path = entry.path();
            path.push("address");
            if let Ok(addr) = fs::read_to_string(&path) {
                let addr = addr.trim();
                if !addr.is_empty() && addr != "00:00:00:00:00:00" {
                    result.push(addr.to_string());
                }
            }
        }
    }
    result.sort();
    result
}

/// Read a stable machine identifier, falling back to fresh randomness.
///
/// Without any stable source the node id is still unique, just not stable
/// across restarts.
fn machine_uuid() -> String {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(id) = fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    Uuid::new_v4().to_string()
}
