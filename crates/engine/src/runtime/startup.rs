//! Holds spawn requests that arrive before the engine is ready.
//!
//! Requests made while the thread manager is stopped are kept in arrival
//! order, up to a fixed capacity, and replayed by [`StartupQueue::mark_ready`].

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use npc_domain::{NpcDefinition, NpcDefinitionId, NpcId};

use super::lifecycle::LifecycleManager;

/// Deferred spawn requests kept when none is configured.
pub const DEFAULT_STARTUP_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnOutcome {
    Spawned(NpcId),
    /// Queued until the engine is ready; `position` is zero-based.
    Deferred { position: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StartupError {
    #[error("startup queue is full ({capacity} pending spawns)")]
    QueueFull { capacity: usize },

    #[error("failed to spawn NPC definition {definition_id}")]
    SpawnFailed { definition_id: NpcDefinitionId },
}

pub struct StartupQueue {
    lifecycle: Arc<LifecycleManager>,
    pending: Mutex<VecDeque<NpcDefinition>>,
    capacity: usize,
}

impl StartupQueue {
    pub fn new(lifecycle: Arc<LifecycleManager>, capacity: usize) -> Self {
        Self {
            lifecycle,
            pending: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Spawn now if the engine is ready and nothing is waiting ahead of this
    /// request; otherwise queue it.
    pub async fn request_spawn(
        &self,
        definition: NpcDefinition,
    ) -> Result<SpawnOutcome, StartupError> {
        {
            let mut pending = self.pending.lock().await;
            if !self.lifecycle.threads().is_running() || !pending.is_empty() {
                if pending.len() >= self.capacity {
                    tracing::warn!(
                        definition_id = %definition.id,
                        capacity = self.capacity,
                        "Startup queue full, spawn rejected"
                    );
                    return Err(StartupError::QueueFull {
                        capacity: self.capacity,
                    });
                }
                let position = pending.len();
                tracing::debug!(definition_id = %definition.id, position, "Spawn deferred");
                pending.push_back(definition);
                return Ok(SpawnOutcome::Deferred { position });
            }
        }

        let definition_id = definition.id;
        self.lifecycle
            .spawn(definition)
            .await
            .map(SpawnOutcome::Spawned)
            .ok_or(StartupError::SpawnFailed { definition_id })
    }

    /// Start the thread manager and replay deferred spawns in arrival order.
    /// Returns the ids that spawned; failures are logged and skipped.
    pub async fn mark_ready(&self) -> Vec<NpcId> {
        self.lifecycle.threads().start().await;

        let mut spawned = Vec::new();
        loop {
            let next = self.pending.lock().await.pop_front();
            let Some(definition) = next else {
                break;
            };
            let definition_id = definition.id;
            match self.lifecycle.spawn(definition).await {
                Some(npc_id) => spawned.push(npc_id),
                None => {
                    tracing::warn!(definition_id = %definition_id, "Deferred spawn failed");
                }
            }
        }

        tracing::info!(spawned = spawned.len(), "Startup queue replayed");
        spawned
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}
