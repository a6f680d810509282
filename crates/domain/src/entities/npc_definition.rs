//! NPC definition - the read-only catalog record an NPC is spawned from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{NpcDefinitionId, RoomId, SubZoneId};
use crate::value_objects::NpcName;

/// Default chance per tick that an idle NPC wanders.
pub const DEFAULT_IDLE_MOVEMENT_PROBABILITY: f64 = 0.25;

/// Catalog entry describing an NPC.
///
/// The engine never writes these back; a changed definition is applied by
/// respawning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcDefinition {
    pub id: NpcDefinitionId,
    pub name: NpcName,
    pub npc_type: NpcType,
    /// Boundary for idle wandering. Without one the NPC never wanders.
    #[serde(default)]
    pub sub_zone_id: Option<SubZoneId>,
    /// Spawn room.
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub behavior_config: BehaviorConfig,
    #[serde(default)]
    pub base_stats: BaseStats,
}

impl NpcDefinition {
    pub fn new(id: NpcDefinitionId, name: NpcName, npc_type: NpcType) -> Self {
        Self {
            id,
            name,
            npc_type,
            sub_zone_id: None,
            room_id: None,
            behavior_config: BehaviorConfig::default(),
            base_stats: BaseStats::default(),
        }
    }

    pub fn with_sub_zone(mut self, sub_zone_id: SubZoneId) -> Self {
        self.sub_zone_id = Some(sub_zone_id);
        self
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_behavior(mut self, behavior_config: BehaviorConfig) -> Self {
        self.behavior_config = behavior_config;
        self
    }

    pub fn with_base_stats(mut self, base_stats: BaseStats) -> Self {
        self.base_stats = base_stats;
        self
    }
}

/// Broad role of an NPC in the world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcType {
    Shopkeeper,
    QuestGiver,
    PassiveMob,
    AggressiveMob,
}

/// Per-definition behavior switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default = "default_true")]
    pub idle_movement_enabled: bool,
    /// Chance per tick (0.0 - 1.0) that an idle NPC wanders.
    #[serde(default = "default_idle_movement_probability")]
    pub idle_movement_probability: f64,
    /// Bias wandering toward the spawn room.
    #[serde(default = "default_true")]
    pub idle_movement_weighted_home: bool,
}

fn default_true() -> bool {
    true
}

fn default_idle_movement_probability() -> f64 {
    DEFAULT_IDLE_MOVEMENT_PROBABILITY
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            idle_movement_enabled: true,
            idle_movement_probability: DEFAULT_IDLE_MOVEMENT_PROBABILITY,
            idle_movement_weighted_home: true,
        }
    }
}

impl BehaviorConfig {
    /// Idle movement probability clamped to `0.0..=1.0`. NaN counts as 0.
    pub fn movement_probability(&self) -> f64 {
        if self.idle_movement_probability.is_nan() {
            return 0.0;
        }
        self.idle_movement_probability.clamp(0.0, 1.0)
    }

    pub fn with_idle_movement(mut self, enabled: bool) -> Self {
        self.idle_movement_enabled = enabled;
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.idle_movement_probability = probability;
        self
    }

    pub fn with_weighted_home(mut self, weighted: bool) -> Self {
        self.idle_movement_weighted_home = weighted;
        self
    }
}

/// Starting stats from the catalog. Combat resolution lives elsewhere; the
/// engine only carries these through to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseStats {
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, i64>,
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            hp: 100,
            max_hp: 100,
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn behavior_defaults_apply_to_missing_fields() {
        let config: BehaviorConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.idle_movement_enabled);
        assert!(config.idle_movement_weighted_home);
        assert_eq!(
            config.idle_movement_probability,
            DEFAULT_IDLE_MOVEMENT_PROBABILITY
        );
    }

    #[test]
    fn probability_is_clamped() {
        assert_eq!(BehaviorConfig::default().with_probability(3.0).movement_probability(), 1.0);
        assert_eq!(BehaviorConfig::default().with_probability(-1.0).movement_probability(), 0.0);
        assert_eq!(
            BehaviorConfig::default()
                .with_probability(f64::NAN)
                .movement_probability(),
            0.0
        );
    }

    #[test]
    fn definition_deserializes_from_catalog_record() {
        let id = NpcDefinitionId::new();
        let record = json!({
            "id": id,
            "name": "Dock Watchman",
            "npc_type": "passive_mob",
            "sub_zone_id": "earth_arkham_docks",
            "room_id": "earth_arkham_docks_pier",
            "behavior_config": { "idle_movement_probability": 0.5 },
            "base_stats": { "hp": 30, "max_hp": 30, "strength": 12 }
        });

        let definition: NpcDefinition = serde_json::from_value(record).unwrap();
        assert_eq!(definition.id, id);
        assert_eq!(definition.npc_type, NpcType::PassiveMob);
        assert_eq!(
            definition.sub_zone_id.as_ref().map(|s| s.as_str()),
            Some("earth_arkham_docks")
        );
        assert_eq!(definition.behavior_config.idle_movement_probability, 0.5);
        assert!(definition.behavior_config.idle_movement_enabled);
        assert_eq!(definition.base_stats.extra.get("strength"), Some(&12));
    }

    #[test]
    fn definition_without_optional_fields_uses_defaults() {
        let record = json!({
            "id": NpcDefinitionId::new(),
            "name": "Stray Cat",
            "npc_type": "passive_mob"
        });

        let definition: NpcDefinition = serde_json::from_value(record).unwrap();
        assert!(definition.sub_zone_id.is_none());
        assert!(definition.room_id.is_none());
        assert_eq!(definition.behavior_config, BehaviorConfig::default());
        assert_eq!(definition.base_stats, BaseStats::default());
    }
}
