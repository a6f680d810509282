//! The per-NPC execution unit.

use std::sync::Arc;
use std::time::Duration;

use npc_domain::NpcInstance;
use tokio_util::sync::CancellationToken;

use super::behavior::NpcBehavior;
use super::bridge::CommunicationBridge;
use crate::stores::MessageQueue;

/// One NPC's task state. Owns its [`NpcInstance`] outright; nothing else
/// touches it while the unit runs.
pub(crate) struct NpcUnit {
    pub(crate) npc: NpcInstance,
    pub(crate) queue: Arc<MessageQueue>,
    pub(crate) behavior: Arc<dyn NpcBehavior>,
    pub(crate) bridge: Option<Arc<CommunicationBridge>>,
    pub(crate) tick_interval: Duration,
    pub(crate) cancel: CancellationToken,
}

impl NpcUnit {
    /// Tick until cancelled. The sleep between ticks is the only point where
    /// cancellation is observed mid-loop; a tick in progress always finishes.
    pub(crate) async fn run(mut self) {
        tracing::debug!(npc_id = %self.npc.npc_id, "NPC unit started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            self.tick().await;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.tick_interval) => {}
            }
        }

        tracing::info!(npc_id = %self.npc.npc_id, "NPC unit cancelled");
    }

    async fn tick(&mut self) {
        let npc_id = self.npc.npc_id.clone();

        for message in self.queue.take_messages(&npc_id) {
            self.behavior.handle_message(&mut self.npc, &message).await;
        }

        if let Some(bridge) = &self.bridge {
            for notification in bridge.get_messages_for_npc(&npc_id).await {
                self.behavior
                    .handle_notification(&mut self.npc, &notification)
                    .await;
            }
        }

        self.behavior.tick(&mut self.npc).await;
    }
}
