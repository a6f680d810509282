//! Core domain types for the NPC engine.
//!
//! Nothing in this crate does I/O or spawns tasks. It holds the catalog record
//! for an NPC ([`NpcDefinition`]), the live per-unit view of a spawned NPC
//! ([`NpcInstance`]), typed identifiers, and the [`ActionMessage`] unit of
//! intent exchanged between behavior code and the engine.

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

// Re-export entities
pub use entities::{BaseStats, BehaviorConfig, NpcDefinition, NpcInstance, NpcType};

pub use error::DomainError;

// Re-export ID types
pub use ids::{NpcDefinitionId, NpcId, RoomId, SubZoneId};

// Re-export value objects
pub use value_objects::{ActionMessage, ActionMessageError, ActionType, NpcName};
