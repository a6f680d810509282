//! Idle movement use case.
//!
//! Decides whether an NPC wanders on a tick, which exits it may take, and
//! which one it picks. Exits are limited to the NPC's sub-zone and, when
//! home weighting is on, biased toward the room it spawned in.
//!
//! Every stage fails soft: [`IdleMovementHandler::execute`] logs the reason
//! and reports `false`. [`IdleMovementHandler::try_execute`] exposes the
//! reason as an [`IdleMovementError`].

use std::sync::Arc;

use npc_domain::{NpcInstance, RoomId};

use crate::infrastructure::ports::{
    CombatAwarenessPort, IntegrationError, MovementPort, RandomPort,
};

/// Distance reported between rooms in different sub-zones.
pub const CROSS_SUBZONE_DISTANCE: u32 = 999;

/// Leading room-key segments that name the sub-zone (`plane_zone_subzone`).
const SUBZONE_PREFIX_SEGMENTS: usize = 3;

const WEIGHT_CLOSER: f64 = 1.0;
const WEIGHT_SAME: f64 = 0.75;
const WEIGHT_ONE_FURTHER: f64 = 0.5;
const WEIGHT_MUCH_FURTHER: f64 = 0.25;

/// Rough distance between two rooms, derived from their keys alone.
///
/// Identical rooms are 0 apart. Rooms sharing the sub-zone prefix are apart
/// by the difference in key segment count, never less than 1. Anything else
/// is [`CROSS_SUBZONE_DISTANCE`].
pub fn room_distance(from: &RoomId, to: &RoomId) -> u32 {
    if from == to {
        return 0;
    }

    let from_segments = from.segments();
    let to_segments = to.segments();
    let same_prefix = from_segments
        .iter()
        .take(SUBZONE_PREFIX_SEGMENTS)
        .eq(to_segments.iter().take(SUBZONE_PREFIX_SEGMENTS));

    if !same_prefix {
        return CROSS_SUBZONE_DISTANCE;
    }

    let difference = from_segments.len().abs_diff(to_segments.len());
    u32::try_from(difference).unwrap_or(u32::MAX).max(1)
}

/// Why a tick produced no move.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdleMovementError {
    #[error("Idle movement disabled")]
    Disabled,
    #[error("NPC is in combat")]
    InCombat,
    #[error("NPC is not alive")]
    NotAlive,
    #[error("NPC is not active")]
    Inactive,
    #[error("Probability roll failed ({roll:.3} >= {probability:.3})")]
    ProbabilityRoll { roll: f64, probability: f64 },
    #[error("NPC has no current room")]
    NoCurrentRoom,
    #[error("No valid exits from {room}")]
    NoValidExits { room: RoomId },
    #[error("Move to {to} rejected")]
    MoveRejected { to: RoomId },
    #[error("Integration error: {0}")]
    Integration(#[from] IntegrationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Roll {
    Required,
    Skipped,
}

pub struct IdleMovementHandler {
    movement: Arc<dyn MovementPort>,
    combat: Option<Arc<dyn CombatAwarenessPort>>,
    random: Arc<dyn RandomPort>,
}

impl IdleMovementHandler {
    pub fn new(movement: Arc<dyn MovementPort>, random: Arc<dyn RandomPort>) -> Self {
        Self {
            movement,
            combat: None,
            random,
        }
    }

    pub fn with_combat_awareness(mut self, combat: Arc<dyn CombatAwarenessPort>) -> Self {
        self.combat = Some(combat);
        self
    }

    /// Whether `npc` should try to move this tick.
    pub async fn should_move(&self, npc: &NpcInstance) -> bool {
        match self.check_gates(npc, Roll::Required).await {
            Ok(()) => true,
            Err(reason) => {
                tracing::trace!(npc_id = %npc.npc_id, reason = %reason, "Idle movement skipped");
                false
            }
        }
    }

    async fn check_gates(&self, npc: &NpcInstance, roll: Roll) -> Result<(), IdleMovementError> {
        let config = &npc.definition.behavior_config;
        if !config.idle_movement_enabled {
            return Err(IdleMovementError::Disabled);
        }

        if let Some(combat) = &self.combat {
            match combat.is_in_combat(&npc.npc_id).await {
                Ok(true) => return Err(IdleMovementError::InCombat),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        npc_id = %npc.npc_id,
                        error = %e,
                        "Combat check failed, assuming not in combat"
                    );
                }
            }
        }

        if !npc.is_alive() {
            return Err(IdleMovementError::NotAlive);
        }
        if !npc.is_active() {
            return Err(IdleMovementError::Inactive);
        }

        if roll == Roll::Required {
            let probability = config.movement_probability();
            let sample = self.random.gen_unit();
            if sample >= probability {
                return Err(IdleMovementError::ProbabilityRoll {
                    roll: sample,
                    probability,
                });
            }
        }

        Ok(())
    }

    /// Exits of the NPC's current room that stay inside its sub-zone.
    /// Collaborator failures yield no exits.
    pub async fn valid_exits(&self, npc: &NpcInstance) -> Vec<RoomId> {
        match self.try_valid_exits(npc).await {
            Ok(exits) => exits,
            Err(e) => {
                tracing::warn!(npc_id = %npc.npc_id, error = %e, "Failed to load exits");
                Vec::new()
            }
        }
    }

    /// Like [`Self::valid_exits`], but a failed exit lookup is returned.
    /// A failed boundary check only drops that one exit.
    pub async fn try_valid_exits(
        &self,
        npc: &NpcInstance,
    ) -> Result<Vec<RoomId>, IntegrationError> {
        let Some(sub_zone_id) = &npc.definition.sub_zone_id else {
            tracing::debug!(npc_id = %npc.npc_id, "NPC has no sub-zone, no exits allowed");
            return Ok(Vec::new());
        };
        let Some(current_room) = &npc.current_room else {
            return Ok(Vec::new());
        };

        let exits = self.movement.get_available_exits(current_room).await?;

        let mut valid = Vec::with_capacity(exits.len());
        for (direction, target) in exits {
            match self
                .movement
                .validate_subzone_boundary(sub_zone_id, &target)
                .await
            {
                Ok(true) => valid.push(target),
                Ok(false) => {
                    tracing::trace!(
                        npc_id = %npc.npc_id,
                        direction = %direction,
                        target = %target,
                        "Exit leaves sub-zone"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        npc_id = %npc.npc_id,
                        direction = %direction,
                        target = %target,
                        error = %e,
                        "Sub-zone check failed, skipping exit"
                    );
                }
            }
        }
        Ok(valid)
    }

    /// Pick one of `exits`.
    ///
    /// A single exit is always taken. With home weighting on (and a known
    /// spawn room) exits are weighted by how they change the distance to the
    /// spawn room; otherwise the pick is uniform.
    pub fn select_exit(&self, npc: &NpcInstance, exits: &[RoomId]) -> Option<RoomId> {
        match exits {
            [] => return None,
            [only] => return Some(only.clone()),
            _ => {}
        }

        let weighted = npc.definition.behavior_config.idle_movement_weighted_home;
        let (Some(spawn_room), Some(current_room), true) =
            (&npc.spawn_room, &npc.current_room, weighted)
        else {
            let index = self.random.gen_index(exits.len()).min(exits.len() - 1);
            return exits.get(index).cloned();
        };

        let current_distance = room_distance(current_room, spawn_room);
        let weights: Vec<f64> = exits
            .iter()
            .map(|exit| tier_weight(current_distance, room_distance(exit, spawn_room)))
            .collect();
        let total: f64 = weights.iter().sum();

        let target = self.random.gen_unit() * total;
        let mut cumulative = 0.0;
        for (exit, weight) in exits.iter().zip(&weights) {
            cumulative += weight;
            if target < cumulative {
                return Some(exit.clone());
            }
        }
        exits.last().cloned()
    }

    /// Run one idle-movement attempt. Returns `true` only if the NPC moved.
    pub async fn execute(&self, npc: &mut NpcInstance) -> bool {
        let outcome = self.try_execute(npc).await;
        log_outcome(npc, outcome)
    }

    /// Move regardless of the probability roll. Every other gate still applies.
    pub async fn wander(&self, npc: &mut NpcInstance) -> bool {
        let outcome = self.attempt(npc, Roll::Skipped).await;
        log_outcome(npc, outcome)
    }

    /// Run one idle-movement attempt, reporting why nothing happened.
    pub async fn try_execute(&self, npc: &mut NpcInstance) -> Result<RoomId, IdleMovementError> {
        self.attempt(npc, Roll::Required).await
    }

    async fn attempt(
        &self,
        npc: &mut NpcInstance,
        roll: Roll,
    ) -> Result<RoomId, IdleMovementError> {
        self.check_gates(npc, roll).await?;

        let from = npc
            .current_room
            .clone()
            .ok_or(IdleMovementError::NoCurrentRoom)?;

        let exits = self.try_valid_exits(npc).await?;
        let to = self
            .select_exit(npc, &exits)
            .ok_or_else(|| IdleMovementError::NoValidExits { room: from.clone() })?;

        if !self.movement.move_npc_to_room(&npc.npc_id, &from, &to).await? {
            return Err(IdleMovementError::MoveRejected { to });
        }

        npc.move_to(to.clone());
        Ok(to)
    }
}

fn tier_weight(current_distance: u32, new_distance: u32) -> f64 {
    if new_distance < current_distance {
        WEIGHT_CLOSER
    } else if new_distance == current_distance {
        WEIGHT_SAME
    } else if new_distance == current_distance.saturating_add(1) {
        WEIGHT_ONE_FURTHER
    } else {
        WEIGHT_MUCH_FURTHER
    }
}

fn log_outcome(npc: &NpcInstance, outcome: Result<RoomId, IdleMovementError>) -> bool {
    match outcome {
        Ok(to) => {
            tracing::debug!(npc_id = %npc.npc_id, to = %to, "NPC wandered");
            true
        }
        Err(IdleMovementError::Integration(e)) => {
            tracing::warn!(npc_id = %npc.npc_id, error = %e, "Idle movement failed");
            false
        }
        Err(reason) => {
            tracing::trace!(npc_id = %npc.npc_id, reason = %reason, "No idle movement");
            false
        }
    }
}
