//! Behavior hook invoked by NPC units.

use async_trait::async_trait;
use npc_domain::{ActionMessage, NpcInstance};

use super::bridge::BridgeMessage;

/// What an NPC unit does with its inbox, notifications, and idle time.
///
/// One implementation is shared by every unit; each call receives the
/// calling unit's own instance. Calls for one NPC never overlap.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NpcBehavior: Send + Sync {
    /// Handle one inbox action. Called in arrival order.
    async fn handle_message(&self, npc: &mut NpcInstance, message: &ActionMessage);

    /// Handle one bridge notification addressed to this NPC.
    async fn handle_notification(&self, _npc: &mut NpcInstance, _message: &BridgeMessage) {}

    /// Runs once per tick after the inbox and notifications are drained.
    async fn tick(&self, npc: &mut NpcInstance);
}
