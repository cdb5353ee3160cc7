// Layer 1: Standard library imports
use std::fmt::{self, Display};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
// (none)

/// Why an actor terminated.
///
/// [`Normal`](Self::Normal) does not trigger link propagation; every other
/// reason cascades to linked peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// The actor finished regularly.
    Normal,
    /// The actor is out of service without a recorded reason, e.g. its
    /// last strong reference dropped before cleanup ran.
    Unreachable,
    /// The actor was killed.
    Kill,
    /// An actor pool lost its last worker.
    OutOfWorkers,
    /// Shutdown requested by user code.
    UserShutdown,
    /// Application-defined reason.
    UserDefined {
        /// Application-defined error code.
        code: u16,
        /// Human-readable description.
        text: String,
    },
}

impl ExitReason {
    /// Build an application-defined reason.
    pub fn user_defined(code: u16, text: impl Into<String>) -> Self {
        Self::UserDefined {
            code,
            text: text.into(),
        }
    }

    /// Whether this is the regular-completion reason.
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }
}

impl Default for ExitReason {
    fn default() -> Self {
        Self::Normal
    }
}

impl Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Unreachable => f.write_str("unreachable"),
            Self::Kill => f.write_str("kill"),
            Self::OutOfWorkers => f.write_str("out_of_workers"),
            Self::UserShutdown => f.write_str("user_shutdown"),
            Self::UserDefined { code, text } => write!(f, "user_defined({code}, {text})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_normal_is_normal() {
        assert!(ExitReason::Normal.is_normal());
        assert!(!ExitReason::Kill.is_normal());
        assert!(!ExitReason::UserShutdown.is_normal());
        assert!(!ExitReason::user_defined(3, "boom").is_normal());
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitReason::OutOfWorkers.to_string(), "out_of_workers");
        assert_eq!(
            ExitReason::user_defined(7, "bad").to_string(),
            "user_defined(7, bad)"
        );
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_serde_roundtrip() {
        let reason = ExitReason::user_defined(9, "x");
        let json = serde_json::to_string(&reason).unwrap();
        assert_eq!(serde_json::from_str::<ExitReason>(&json).unwrap(), reason);
    }
}
