//! In-memory room graph implementing [`MovementPort`].
//!
//! Rooms and NPC positions live in `DashMap`s so units on different tasks can
//! query and move concurrently.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use npc_domain::{NpcId, RoomId, SubZoneId};

use crate::infrastructure::ports::{IntegrationError, MovementPort};

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub sub_zone_id: SubZoneId,
    pub exits: BTreeMap<String, RoomId>,
}

impl Room {
    pub fn new(id: RoomId, sub_zone_id: SubZoneId) -> Self {
        Self {
            id,
            sub_zone_id,
            exits: BTreeMap::new(),
        }
    }

    pub fn with_exit(mut self, direction: impl Into<String>, to: RoomId) -> Self {
        self.exits.insert(direction.into(), to);
        self
    }
}

#[derive(Default)]
pub struct InMemoryWorld {
    rooms: DashMap<RoomId, Room>,
    positions: DashMap<NpcId, RoomId>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_room(&self, room: Room) {
        self.rooms.insert(room.id.clone(), room);
    }

    /// Add a two-way passage between existing rooms.
    pub fn connect(
        &self,
        from: &RoomId,
        direction: &str,
        to: &RoomId,
        back_direction: &str,
    ) -> bool {
        if !self.rooms.contains_key(from) || !self.rooms.contains_key(to) {
            return false;
        }
        if let Some(mut room) = self.rooms.get_mut(from) {
            room.exits.insert(direction.to_string(), to.clone());
        }
        if let Some(mut room) = self.rooms.get_mut(to) {
            room.exits.insert(back_direction.to_string(), from.clone());
        }
        true
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn position_of(&self, npc_id: &NpcId) -> Option<RoomId> {
        self.positions.get(npc_id).map(|room| room.value().clone())
    }

    pub fn npcs_in(&self, room_id: &RoomId) -> Vec<NpcId> {
        let mut npcs: Vec<NpcId> = self
            .positions
            .iter()
            .filter(|entry| entry.value() == room_id)
            .map(|entry| entry.key().clone())
            .collect();
        npcs.sort();
        npcs
    }
}

#[async_trait]
impl MovementPort for InMemoryWorld {
    async fn get_available_exits(
        &self,
        room_id: &RoomId,
    ) -> Result<BTreeMap<String, RoomId>, IntegrationError> {
        self.rooms
            .get(room_id)
            .map(|room| room.exits.clone())
            .ok_or_else(|| {
                IntegrationError::failed("get_available_exits", format!("unknown room {room_id}"))
            })
    }

    async fn validate_subzone_boundary(
        &self,
        sub_zone_id: &SubZoneId,
        room_id: &RoomId,
    ) -> Result<bool, IntegrationError> {
        Ok(self
            .rooms
            .get(room_id)
            .is_some_and(|room| room.sub_zone_id == *sub_zone_id))
    }

    async fn move_npc_to_room(
        &self,
        npc_id: &NpcId,
        from_room: &RoomId,
        to_room: &RoomId,
    ) -> Result<bool, IntegrationError> {
        if !self.rooms.contains_key(to_room) {
            tracing::debug!(npc_id = %npc_id, to = %to_room, "Move into unknown room refused");
            return Ok(false);
        }
        if let Some(current) = self.positions.get(npc_id) {
            if current.value() != from_room {
                tracing::debug!(
                    npc_id = %npc_id,
                    from = %from_room,
                    actual = %current.value(),
                    "Move from stale room refused"
                );
                return Ok(false);
            }
        }
        self.positions.insert(npc_id.clone(), to_room.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(key: &str) -> RoomId {
        RoomId::new(key).unwrap()
    }

    fn docks() -> SubZoneId {
        SubZoneId::new("docks").unwrap()
    }

    fn world() -> InMemoryWorld {
        let world = InMemoryWorld::new();
        world.add_room(Room::new(room("earth_arkham_docks_pier"), docks()));
        world.add_room(Room::new(room("earth_arkham_docks_shed"), docks()));
        world.add_room(Room::new(
            room("earth_arkham_campus_gate"),
            SubZoneId::new("campus").unwrap(),
        ));
        world.connect(
            &room("earth_arkham_docks_pier"),
            "east",
            &room("earth_arkham_docks_shed"),
            "west",
        );
        world.connect(
            &room("earth_arkham_docks_shed"),
            "north",
            &room("earth_arkham_campus_gate"),
            "south",
        );
        world
    }

    #[tokio::test]
    async fn exits_and_boundaries() {
        let world = world();

        let exits = world
            .get_available_exits(&room("earth_arkham_docks_shed"))
            .await
            .unwrap();
        assert_eq!(exits.len(), 2);
        assert_eq!(exits.get("west"), Some(&room("earth_arkham_docks_pier")));

        assert!(world
            .validate_subzone_boundary(&docks(), &room("earth_arkham_docks_pier"))
            .await
            .unwrap());
        assert!(!world
            .validate_subzone_boundary(&docks(), &room("earth_arkham_campus_gate"))
            .await
            .unwrap());
        assert!(world
            .get_available_exits(&room("earth_nowhere_at_all"))
            .await
            .is_err());
        assert!(!world.connect(
            &room("earth_nowhere_at_all"),
            "up",
            &room("earth_arkham_docks_pier"),
            "down"
        ));
    }

    #[tokio::test]
    async fn moves_track_positions() {
        let world = world();
        let npc = NpcId::new("npc_rat").unwrap();
        let pier = room("earth_arkham_docks_pier");
        let shed = room("earth_arkham_docks_shed");

        assert!(world.move_npc_to_room(&npc, &pier, &shed).await.unwrap());
        assert_eq!(world.position_of(&npc), Some(shed.clone()));
        assert_eq!(world.npcs_in(&shed), vec![npc.clone()]);

        // Stale origin and unknown target are refused
        assert!(!world.move_npc_to_room(&npc, &pier, &shed).await.unwrap());
        assert!(!world
            .move_npc_to_room(&npc, &shed, &room("earth_nowhere_at_all"))
            .await
            .unwrap());
        assert_eq!(world.position_of(&npc), Some(shed));
    }
}
