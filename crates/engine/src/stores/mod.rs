//! In-memory state storage modules.
//!
//! Stores manage runtime state that never leaves the process:
//! - `MessageQueue` - bounded per-NPC inboxes of pending actions

pub mod message_queue;

pub use message_queue::{MessageQueue, DEFAULT_INBOX_CAPACITY};
