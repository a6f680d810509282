//! Default NPC behavior.
//!
//! Acts on inbox actions, relays speech out over the bridge, and gives every
//! NPC one idle-movement attempt per tick.

use std::sync::Arc;

use async_trait::async_trait;
use npc_domain::{ActionMessage, ActionType, NpcInstance, RoomId};

use super::idle_movement::IdleMovementHandler;
use crate::infrastructure::ports::MovementPort;
use crate::runtime::{BridgeMessage, CommunicationBridge, NpcBehavior};

/// `custom_data` key that sets the NPC's alive flag.
pub const CUSTOM_ALIVE_KEY: &str = "alive";
/// `custom_data` key that sets the NPC's active flag.
pub const CUSTOM_ACTIVE_KEY: &str = "active";

pub struct StandardNpcBehavior {
    idle_movement: Arc<IdleMovementHandler>,
    movement: Arc<dyn MovementPort>,
    bridge: Option<Arc<CommunicationBridge>>,
}

impl StandardNpcBehavior {
    pub fn new(idle_movement: Arc<IdleMovementHandler>, movement: Arc<dyn MovementPort>) -> Self {
        Self {
            idle_movement,
            movement,
            bridge: None,
        }
    }

    /// Relay `speak` actions to the world through `bridge`.
    pub fn with_bridge(mut self, bridge: Arc<CommunicationBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    async fn move_directly(&self, npc: &mut NpcInstance, action: ActionType, to: &RoomId) {
        if !npc.is_alive() {
            tracing::debug!(npc_id = %npc.npc_id, action = %action, "Dead NPC ignores move");
            return;
        }
        let Some(from) = npc.current_room.clone() else {
            tracing::warn!(npc_id = %npc.npc_id, action = %action, "NPC has no current room");
            return;
        };

        match self.movement.move_npc_to_room(&npc.npc_id, &from, to).await {
            Ok(true) => {
                tracing::debug!(npc_id = %npc.npc_id, action = %action, to = %to, "NPC moved");
                npc.move_to(to.clone());
            }
            Ok(false) => {
                tracing::debug!(npc_id = %npc.npc_id, action = %action, to = %to, "Move rejected");
            }
            Err(e) => {
                tracing::warn!(
                    npc_id = %npc.npc_id,
                    action = %action,
                    to = %to,
                    error = %e,
                    "Move failed"
                );
            }
        }
    }

    async fn relay(&self, npc: &NpcInstance, message: &ActionMessage) {
        let Some(bridge) = &self.bridge else {
            tracing::debug!(npc_id = %npc.npc_id, "No bridge attached, speech dropped");
            return;
        };
        match BridgeMessage::from_action(message) {
            Ok(outgoing) => bridge.receive_message_from_npc(&npc.npc_id, outgoing).await,
            Err(e) => {
                tracing::warn!(npc_id = %npc.npc_id, error = %e, "Could not encode speech");
            }
        }
    }

    fn apply_state(npc: &mut NpcInstance, message: &ActionMessage) {
        if let Some(alive) = message.custom_flag(CUSTOM_ALIVE_KEY) {
            npc.set_alive(alive);
            tracing::info!(npc_id = %npc.npc_id, alive, "NPC alive flag changed");
        }
        if let Some(active) = message.custom_flag(CUSTOM_ACTIVE_KEY) {
            npc.set_active(active);
            tracing::info!(npc_id = %npc.npc_id, active, "NPC active flag changed");
        }
    }
}

#[async_trait]
impl NpcBehavior for StandardNpcBehavior {
    async fn handle_message(&self, npc: &mut NpcInstance, message: &ActionMessage) {
        match message.action_type {
            ActionType::Move | ActionType::Flee | ActionType::Hunt => {
                match &message.target_room {
                    Some(to) => self.move_directly(npc, message.action_type, to).await,
                    None => {
                        tracing::debug!(
                            npc_id = %npc.npc_id,
                            action = %message.action_type,
                            "Action has no target room"
                        );
                    }
                }
            }
            ActionType::Wander => {
                self.idle_movement.wander(npc).await;
            }
            ActionType::Speak => self.relay(npc, message).await,
            ActionType::Custom => Self::apply_state(npc, message),
            ActionType::Attack | ActionType::Interact | ActionType::Idle => {
                tracing::debug!(
                    npc_id = %npc.npc_id,
                    action = %message.action_type,
                    "Action acknowledged"
                );
            }
        }
    }

    /// Notifications carrying an action for this NPC are handled like inbox
    /// actions. Anything else is only logged.
    async fn handle_notification(&self, npc: &mut NpcInstance, message: &BridgeMessage) {
        match message.to_action() {
            Ok(action) if action.npc_id == npc.npc_id => self.handle_message(npc, &action).await,
            _ => {
                tracing::debug!(
                    npc_id = %npc.npc_id,
                    kind = %message.kind,
                    broadcast = message.broadcast,
                    "Notification received"
                );
            }
        }
    }

    async fn tick(&self, npc: &mut NpcInstance) {
        self.idle_movement.execute(npc).await;
    }
}
