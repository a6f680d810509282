//! Domain entities - Core business objects with identity

mod npc_definition;
mod npc_instance;

pub use npc_definition::{
    BaseStats, BehaviorConfig, NpcDefinition, NpcType, DEFAULT_IDLE_MOVEMENT_PROBABILITY,
};
pub use npc_instance::NpcInstance;
