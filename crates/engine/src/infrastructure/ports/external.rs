//! World-side collaborator ports (movement integration, combat awareness).

use std::collections::BTreeMap;

use async_trait::async_trait;
use npc_domain::{NpcId, RoomId, SubZoneId};

use super::error::IntegrationError;

// =============================================================================
// Movement Integration
// =============================================================================

/// Room graph queries and NPC relocation, owned by the world layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MovementPort: Send + Sync {
    /// Exits of `room_id`, keyed by direction. Ordered so callers iterate
    /// deterministically.
    async fn get_available_exits(
        &self,
        room_id: &RoomId,
    ) -> Result<BTreeMap<String, RoomId>, IntegrationError>;

    /// Whether `room_id` lies inside `sub_zone_id`.
    async fn validate_subzone_boundary(
        &self,
        sub_zone_id: &SubZoneId,
        room_id: &RoomId,
    ) -> Result<bool, IntegrationError>;

    /// Relocate an NPC. `Ok(false)` means the world refused the move.
    async fn move_npc_to_room(
        &self,
        npc_id: &NpcId,
        from_room: &RoomId,
        to_room: &RoomId,
    ) -> Result<bool, IntegrationError>;
}

// =============================================================================
// Combat Awareness
// =============================================================================

/// Optional combat state lookup. A missing implementation means "not in combat".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CombatAwarenessPort: Send + Sync {
    async fn is_in_combat(&self, npc_id: &NpcId) -> Result<bool, IntegrationError>;
}
