//! NPC engine library.
//!
//! Runs every spawned NPC as its own tokio task with a bounded inbox, routes
//! world notifications to NPCs and their reports back out, and decides idle
//! wandering inside each NPC's sub-zone.
//!
//! ## Structure
//!
//! - `stores/` - Bounded per-NPC inboxes
//! - `runtime/` - Units, thread manager, bridge, lifecycle, startup queue
//! - `use_cases/` - NPC behavior (idle movement, standard behavior)
//! - `infrastructure/` - Ports, in-memory adapters, clock, configuration
//! - `app` - Engine composition

pub mod app;
pub mod infrastructure;
pub mod runtime;
pub mod stores;
pub mod use_cases;

pub use app::{EnginePorts, NpcEngine};
