//! NPC behavior use cases.

pub mod behavior;
pub mod idle_movement;

pub use behavior::{StandardNpcBehavior, CUSTOM_ACTIVE_KEY, CUSTOM_ALIVE_KEY};
pub use idle_movement::{
    room_distance, IdleMovementError, IdleMovementHandler, CROSS_SUBZONE_DISTANCE,
};
