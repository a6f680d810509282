//! Value objects - Immutable objects defined by their attributes

mod action_message;
mod names;

pub use action_message::{ActionMessage, ActionMessageError, ActionType};
pub use names::NpcName;
