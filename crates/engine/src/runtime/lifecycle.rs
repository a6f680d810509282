//! Spawn, despawn, and respawn bookkeeping keyed by NPC definition.
//!
//! The lifecycle lock only guards the active-NPC map. It is released before
//! any unit stop is awaited, so a slow unit never blocks status queries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Mutex;

use npc_domain::{NpcDefinition, NpcDefinitionId, NpcId};

use super::bridge::CommunicationBridge;
use super::thread_manager::ThreadManager;
use crate::infrastructure::ports::ClockPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcStatus {
    /// Reserved; the unit is being started
    Spawning,
    Active,
    Despawning,
}

/// One spawned NPC as tracked by the lifecycle manager.
#[derive(Debug, Clone)]
pub struct ActiveNpc {
    pub npc_id: NpcId,
    pub definition: NpcDefinition,
    pub spawned_at: DateTime<Utc>,
    pub status: NpcStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpcStatusReport {
    pub npc_id: NpcId,
    pub status: NpcStatus,
    pub spawned_at: DateTime<Utc>,
    pub uptime: Duration,
}

pub struct LifecycleManager {
    threads: Arc<ThreadManager>,
    bridge: Option<Arc<CommunicationBridge>>,
    clock: Arc<dyn ClockPort>,
    sequence: AtomicU64,
    active: Mutex<HashMap<NpcDefinitionId, ActiveNpc>>,
}

impl LifecycleManager {
    pub fn new(threads: Arc<ThreadManager>, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            threads,
            bridge: None,
            clock,
            sequence: AtomicU64::new(0),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Register spawned NPCs on `bridge` so they receive broadcasts.
    pub fn with_bridge(mut self, bridge: Arc<CommunicationBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn threads(&self) -> &Arc<ThreadManager> {
        &self.threads
    }

    /// Spawn an instance of `definition` and return its new id.
    ///
    /// A definition that already has an instance is replaced: the new record
    /// is reserved under the lock and the previous unit is stopped, so every
    /// call yields a fresh id and at most one unit per definition survives.
    /// Returns `None` when the unit could not be started or a concurrent
    /// spawn or despawn of the same definition superseded this one; its unit
    /// is stopped before returning and nothing of it stays recorded.
    pub async fn spawn(&self, definition: NpcDefinition) -> Option<NpcId> {
        let definition_id = definition.id;
        let spawned_at = self.clock.now();
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let npc_id = NpcId::for_spawn(definition_id, spawned_at, sequence);
        let name = definition.name.to_string();

        let previous = self.active.lock().await.insert(
            definition_id,
            ActiveNpc {
                npc_id: npc_id.clone(),
                definition: definition.clone(),
                spawned_at,
                status: NpcStatus::Spawning,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(
                definition_id = %definition_id,
                npc_id = %previous.npc_id,
                "Replacing NPC instance"
            );
            self.retire(&previous.npc_id).await;
        }

        if let Err(e) = self.threads.start_unit(&npc_id, definition).await {
            tracing::warn!(
                definition_id = %definition_id,
                npc_id = %npc_id,
                error = %e,
                "Failed to spawn NPC"
            );
            self.release(definition_id, &npc_id).await;
            return None;
        }

        let mut active = self.active.lock().await;
        let current = match active.get_mut(&definition_id) {
            Some(entry) if entry.npc_id == npc_id && entry.status == NpcStatus::Spawning => {
                entry.status = NpcStatus::Active;
                true
            }
            _ => false,
        };
        if !current {
            drop(active);
            tracing::debug!(
                definition_id = %definition_id,
                npc_id = %npc_id,
                "NPC spawn superseded"
            );
            self.retire(&npc_id).await;
            return None;
        }
        // Registered under the lifecycle lock so a later replacement's
        // unregister always comes after it
        if let Some(bridge) = &self.bridge {
            bridge.register_npc(&npc_id).await;
        }
        drop(active);

        tracing::info!(
            definition_id = %definition_id,
            npc_id = %npc_id,
            name = %name,
            "NPC spawned"
        );
        Some(npc_id)
    }

    /// Stop and forget the instance of `definition_id`.
    ///
    /// Untracked definitions succeed without doing anything. Concurrent
    /// despawns of one definition all return once its unit has stopped.
    /// Returns `false` when the unit had to be aborted; the record is removed
    /// either way.
    pub async fn despawn(&self, definition_id: NpcDefinitionId) -> bool {
        let npc_id = {
            let mut active = self.active.lock().await;
            let Some(entry) = active.get_mut(&definition_id) else {
                return true;
            };
            entry.status = NpcStatus::Despawning;
            entry.npc_id.clone()
        };

        let stopped = self.retire(&npc_id).await;
        self.release(definition_id, &npc_id).await;

        if stopped {
            tracing::info!(definition_id = %definition_id, npc_id = %npc_id, "NPC despawned");
        } else {
            tracing::warn!(
                definition_id = %definition_id,
                npc_id = %npc_id,
                "NPC despawned after forced abort"
            );
        }
        stopped
    }

    /// Stop the unit for `npc_id` and drop everything routed to it.
    async fn retire(&self, npc_id: &NpcId) -> bool {
        let stopped = self.threads.stop_unit(npc_id).await;
        self.threads.queue().clear_messages(npc_id);
        if let Some(bridge) = &self.bridge {
            bridge.unregister_npc(npc_id).await;
        }
        stopped
    }

    /// Forget the record of `definition_id` if it still belongs to `npc_id`.
    async fn release(&self, definition_id: NpcDefinitionId, npc_id: &NpcId) {
        let mut active = self.active.lock().await;
        if active
            .get(&definition_id)
            .is_some_and(|entry| &entry.npc_id == npc_id)
        {
            active.remove(&definition_id);
        }
    }

    /// Despawn then spawn with `definition`. Not atomic.
    pub async fn respawn(
        &self,
        definition_id: NpcDefinitionId,
        definition: NpcDefinition,
    ) -> Option<NpcId> {
        self.despawn(definition_id).await;
        self.spawn(definition).await
    }

    pub async fn get_status(&self, definition_id: NpcDefinitionId) -> Option<NpcStatusReport> {
        let now = self.clock.now();
        self.active
            .lock()
            .await
            .get(&definition_id)
            .map(|entry| NpcStatusReport {
                npc_id: entry.npc_id.clone(),
                status: entry.status,
                spawned_at: entry.spawned_at,
                uptime: (now - entry.spawned_at).to_std().unwrap_or_default(),
            })
    }

    /// Despawn every tracked NPC concurrently. Returns `true` only when every
    /// despawn succeeded.
    pub async fn cleanup_all(&self) -> bool {
        let definition_ids: Vec<NpcDefinitionId> =
            self.active.lock().await.keys().copied().collect();
        let count = definition_ids.len();

        let results = join_all(definition_ids.into_iter().map(|id| self.despawn(id))).await;
        let failures = results.iter().filter(|ok| !**ok).count();

        if failures > 0 {
            tracing::warn!(count, failures, "NPC cleanup finished with failures");
        } else {
            tracing::info!(count, "All NPCs cleaned up");
        }
        failures == 0
    }

    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    pub async fn active_npcs(&self) -> Vec<ActiveNpc> {
        let mut npcs: Vec<ActiveNpc> = self.active.lock().await.values().cloned().collect();
        npcs.sort_by(|a, b| a.npc_id.cmp(&b.npc_id));
        npcs
    }

    pub async fn npc_id_for(&self, definition_id: NpcDefinitionId) -> Option<NpcId> {
        self.active
            .lock()
            .await
            .get(&definition_id)
            .map(|entry| entry.npc_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::test_support::{
        definition, fixed_clock, RecordingBehavior, SlowTickBehavior,
    };
    use crate::infrastructure::ports::MockClockPort;
    use crate::stores::MessageQueue;
    use chrono::TimeZone;
    use npc_domain::{ActionMessage, ActionType};

    struct Fixture {
        lifecycle: LifecycleManager,
        bridge: Arc<CommunicationBridge>,
    }

    async fn fixture(running: bool) -> Fixture {
        let clock = fixed_clock();
        let queue = Arc::new(MessageQueue::new(100, clock.clone()));
        let bridge = Arc::new(CommunicationBridge::new(clock.clone()));
        let threads = Arc::new(
            ThreadManager::new(queue, Arc::new(RecordingBehavior::default()), clock.clone())
                .with_bridge(bridge.clone())
                .with_tick_interval(Duration::from_millis(5)),
        );
        if running {
            threads.start().await;
        }
        Fixture {
            lifecycle: LifecycleManager::new(threads, clock).with_bridge(bridge.clone()),
            bridge,
        }
    }

    #[tokio::test]
    async fn spawn_then_despawn_round_trip() {
        let Fixture { lifecycle, bridge } = fixture(true).await;
        let guard = definition("Guard");

        let npc_id = lifecycle.spawn(guard.clone()).await.unwrap();
        assert!(npc_id.as_str().starts_with(&format!("npc_{}_", guard.id)));
        assert!(lifecycle.threads().is_unit_active(&npc_id).await);
        assert_eq!(bridge.registered_npcs().await, vec![npc_id.clone()]);

        let status = lifecycle.get_status(guard.id).await.unwrap();
        assert_eq!(status.npc_id, npc_id);
        assert_eq!(status.status, NpcStatus::Active);
        assert_eq!(status.uptime, Duration::ZERO);

        assert!(lifecycle.despawn(guard.id).await);
        assert!(lifecycle.get_status(guard.id).await.is_none());
        assert!(!lifecycle.threads().is_unit_active(&npc_id).await);
        assert!(bridge.registered_npcs().await.is_empty());

        // Second despawn is a no-op success
        assert!(lifecycle.despawn(guard.id).await);
        lifecycle.threads().stop().await;
    }

    #[tokio::test]
    async fn despawn_clears_pending_actions() {
        let Fixture { lifecycle, .. } = fixture(true).await;
        let guard = definition("Guard");
        let npc_id = lifecycle.spawn(guard.clone()).await.unwrap();

        lifecycle
            .threads()
            .send_action(&npc_id, ActionMessage::unstamped(ActionType::Idle, npc_id.clone()));
        assert!(lifecycle.despawn(guard.id).await);

        assert_eq!(lifecycle.threads().queue().get_queue_size(&npc_id), 0);
        lifecycle.threads().stop().await;
    }

    #[tokio::test]
    async fn successive_spawns_get_distinct_ids() {
        let Fixture { lifecycle, .. } = fixture(true).await;
        let guard = definition("Guard");

        let first = lifecycle.spawn(guard.clone()).await.unwrap();
        let second = lifecycle.spawn(guard.clone()).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(lifecycle.active_count().await, 1);
        assert!(!lifecycle.threads().is_unit_active(&first).await);
        assert!(lifecycle.threads().is_unit_active(&second).await);
        assert_eq!(lifecycle.npc_id_for(guard.id).await, Some(second));
        lifecycle.threads().stop().await;
    }

    #[tokio::test]
    async fn failed_spawn_records_nothing() {
        let Fixture { lifecycle, bridge } = fixture(false).await;
        let guard = definition("Guard");

        assert!(lifecycle.spawn(guard.clone()).await.is_none());
        assert_eq!(lifecycle.active_count().await, 0);
        assert!(lifecycle.get_status(guard.id).await.is_none());
        assert!(bridge.registered_npcs().await.is_empty());
    }

    #[tokio::test]
    async fn respawn_applies_new_definition() {
        let Fixture { lifecycle, .. } = fixture(true).await;
        let guard = definition("Guard");
        let first = lifecycle.spawn(guard.clone()).await.unwrap();

        let mut veteran = guard.clone();
        veteran.name = npc_domain::NpcName::new("Veteran Guard").unwrap();
        let second = lifecycle.respawn(guard.id, veteran).await.unwrap();

        assert_ne!(first, second);
        let npcs = lifecycle.active_npcs().await;
        assert_eq!(npcs.len(), 1);
        assert_eq!(npcs[0].definition.name.as_str(), "Veteran Guard");
        lifecycle.threads().stop().await;
    }

    #[tokio::test]
    async fn cleanup_all_despawns_everything() {
        let Fixture { lifecycle, bridge } = fixture(true).await;
        for name in ["Rat", "Crow", "Cat"] {
            lifecycle.spawn(definition(name)).await.unwrap();
        }
        assert_eq!(lifecycle.active_count().await, 3);

        assert!(lifecycle.cleanup_all().await);

        assert_eq!(lifecycle.active_count().await, 0);
        assert_eq!(lifecycle.threads().active_unit_count().await, 0);
        assert!(bridge.registered_npcs().await.is_empty());
        assert!(lifecycle.cleanup_all().await);
        lifecycle.threads().stop().await;
    }

    #[tokio::test]
    async fn concurrent_spawns_of_one_definition_leave_a_single_unit() {
        let Fixture { lifecycle, bridge } = fixture(true).await;

        for _ in 0..25 {
            let guard = definition("Guard");
            join_all((0..4).map(|_| lifecycle.spawn(guard.clone()))).await;

            let tracked = lifecycle.npc_id_for(guard.id).await.unwrap();
            assert_eq!(lifecycle.threads().active_unit_ids().await, vec![tracked.clone()]);
            assert_eq!(bridge.registered_npcs().await, vec![tracked]);

            assert!(lifecycle.cleanup_all().await);
            assert_eq!(lifecycle.active_count().await, 0);
            assert_eq!(lifecycle.threads().active_unit_count().await, 0);
        }
        lifecycle.threads().stop().await;
    }

    #[tokio::test]
    async fn concurrent_despawns_both_wait_for_the_unit() {
        let clock = fixed_clock();
        let behavior = Arc::new(SlowTickBehavior::new(Duration::from_millis(100)));
        let threads = Arc::new(
            ThreadManager::new(
                Arc::new(MessageQueue::new(10, clock.clone())),
                behavior.clone(),
                clock.clone(),
            )
            .with_tick_interval(Duration::from_millis(5)),
        );
        threads.start().await;
        let lifecycle = LifecycleManager::new(threads, clock);
        let guard = definition("Guard");
        let npc_id = lifecycle.spawn(guard.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (first, second) =
            tokio::join!(lifecycle.despawn(guard.id), lifecycle.despawn(guard.id));

        assert!(first && second);
        assert!(!lifecycle.threads().is_unit_active(&npc_id).await);
        let completed = behavior.completed();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(behavior.completed(), completed);
        lifecycle.threads().stop().await;
    }

    #[tokio::test]
    async fn status_uptime_follows_the_clock() {
        let spawned_at = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let later = spawned_at + chrono::Duration::seconds(90);
        let calls = AtomicU64::new(0);
        let mut clock = MockClockPort::new();
        clock.expect_now().returning(move || {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                spawned_at
            } else {
                later
            }
        });

        let Fixture { lifecycle: base, .. } = fixture(true).await;
        let lifecycle = LifecycleManager::new(base.threads().clone(), Arc::new(clock));
        let guard = definition("Guard");
        lifecycle.spawn(guard.clone()).await.unwrap();

        let status = lifecycle.get_status(guard.id).await.unwrap();
        assert_eq!(status.spawned_at, spawned_at);
        assert_eq!(status.uptime, Duration::from_secs(90));
        assert!(lifecycle.cleanup_all().await);
        lifecycle.threads().stop().await;
    }
}
