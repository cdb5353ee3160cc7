//! Messages: type-erased payloads, envelopes, and the system taxonomy.
//!
//! # Components
//!
//! - [`Message`] - Immutable, reference-counted element tuple with
//!   per-position accessors and type-id matching
//! - [`MailboxElement`] - Envelope carrying sender, correlation id,
//!   forwarding stack, and payload
//! - [`atoms`] - Tag types used by the pool and group protocols
//! - [`system`] - `ExitMsg`, `DownMsg`, `GroupDownMsg`, `ErrorMsg`

pub mod atoms;
pub mod envelope;
pub mod payload;
pub mod system;

pub use envelope::{bounce_request, MailboxElement};
pub use payload::{Message, MessageBuilder, MessageElement, Pattern};
pub use system::{DownMsg, ErrorMsg, ExitMsg, GroupDownMsg};
