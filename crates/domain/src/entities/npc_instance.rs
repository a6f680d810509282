//! NPC instance - the live state of one spawned NPC.
//!
//! Each instance is owned by exactly one NPC unit; behaviors receive it as
//! `&mut` for the duration of a tick, so no locking is needed here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::NpcDefinition;
use crate::ids::{NpcId, RoomId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcInstance {
    pub npc_id: NpcId,
    pub definition: NpcDefinition,
    /// Anchor for "weighted toward home" wandering.
    pub spawn_room: Option<RoomId>,
    pub current_room: Option<RoomId>,
    pub alive: bool,
    pub active: bool,
    pub spawned_at: DateTime<Utc>,
}

impl NpcInstance {
    /// A freshly spawned instance: alive, active, standing in its spawn room.
    pub fn spawn(npc_id: NpcId, definition: NpcDefinition, spawned_at: DateTime<Utc>) -> Self {
        let spawn_room = definition.room_id.clone();
        Self {
            npc_id,
            current_room: spawn_room.clone(),
            spawn_room,
            definition,
            alive: true,
            active: true,
            spawned_at,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn move_to(&mut self, room: RoomId) {
        self.current_room = Some(room);
    }

    pub fn set_alive(&mut self, alive: bool) {
        self.alive = alive;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_home(&self) -> bool {
        self.spawn_room.is_some() && self.spawn_room == self.current_room
    }
}
