//! Engine state and composition.

use std::sync::Arc;

use npc_domain::{NpcDefinitionId, NpcId};

use crate::infrastructure::{
    config::EngineConfig,
    ports::{
        ClockPort, CombatAwarenessPort, MovementPort, NpcDefinitionRepo, RandomPort, RepoError,
    },
};
use crate::runtime::{
    CommunicationBridge, LifecycleManager, NpcBehavior, SpawnOutcome, StartupError,
    StartupQueue, ThreadManager,
};
use crate::stores::MessageQueue;
use crate::use_cases::npc::{IdleMovementHandler, StandardNpcBehavior};

/// Collaborators the engine needs from the outside world.
pub struct EnginePorts {
    pub catalog: Arc<dyn NpcDefinitionRepo>,
    pub movement: Arc<dyn MovementPort>,
    pub combat: Option<Arc<dyn CombatAwarenessPort>>,
    pub clock: Arc<dyn ClockPort>,
    pub random: Arc<dyn RandomPort>,
}

/// Main engine state.
///
/// Owns the queue, bridge, thread manager, lifecycle manager, and startup
/// queue, wired together by constructor injection.
pub struct NpcEngine {
    pub config: EngineConfig,
    pub catalog: Arc<dyn NpcDefinitionRepo>,
    pub queue: Arc<MessageQueue>,
    pub bridge: Arc<CommunicationBridge>,
    pub threads: Arc<ThreadManager>,
    pub lifecycle: Arc<LifecycleManager>,
    pub startup: Arc<StartupQueue>,
}

impl NpcEngine {
    /// Build an engine running [`StandardNpcBehavior`] for every NPC.
    pub fn new(config: EngineConfig, ports: EnginePorts) -> Self {
        let bridge = Arc::new(CommunicationBridge::new(ports.clock.clone()));

        let mut idle = IdleMovementHandler::new(ports.movement.clone(), ports.random.clone());
        if let Some(combat) = ports.combat.clone() {
            idle = idle.with_combat_awareness(combat);
        }
        let behavior = StandardNpcBehavior::new(Arc::new(idle), ports.movement.clone())
            .with_bridge(bridge.clone());

        Self::assemble(config, ports, bridge, Arc::new(behavior))
    }

    /// Build an engine with a caller-supplied behavior.
    pub fn with_behavior(
        config: EngineConfig,
        ports: EnginePorts,
        behavior: Arc<dyn NpcBehavior>,
    ) -> Self {
        let bridge = Arc::new(CommunicationBridge::new(ports.clock.clone()));
        Self::assemble(config, ports, bridge, behavior)
    }

    fn assemble(
        config: EngineConfig,
        ports: EnginePorts,
        bridge: Arc<CommunicationBridge>,
        behavior: Arc<dyn NpcBehavior>,
    ) -> Self {
        let queue = Arc::new(MessageQueue::new(
            config.inbox_capacity,
            ports.clock.clone(),
        ));
        let threads = Arc::new(
            ThreadManager::new(queue.clone(), behavior, ports.clock.clone())
                .with_bridge(bridge.clone())
                .with_tick_interval(config.tick_interval)
                .with_stop_timeout(config.stop_timeout),
        );
        let lifecycle = Arc::new(
            LifecycleManager::new(threads.clone(), ports.clock.clone())
                .with_bridge(bridge.clone()),
        );
        let startup = Arc::new(StartupQueue::new(
            lifecycle.clone(),
            config.startup_queue_capacity,
        ));

        Self {
            config,
            catalog: ports.catalog,
            queue,
            bridge,
            threads,
            lifecycle,
            startup,
        }
    }

    /// Start the thread manager and replay spawns requested before now.
    pub async fn start(&self) -> Vec<NpcId> {
        self.startup.mark_ready().await
    }

    /// Request a spawn for every catalog definition that has a spawn room.
    /// Individual spawn failures are logged and skipped.
    pub async fn spawn_catalog(&self) -> Result<Vec<SpawnOutcome>, RepoError> {
        let definitions = self.catalog.list_all().await?;
        let mut outcomes = Vec::with_capacity(definitions.len());

        for definition in definitions {
            if definition.room_id.is_none() {
                tracing::debug!(
                    definition_id = %definition.id,
                    name = %definition.name,
                    "Definition has no spawn room, skipped"
                );
                continue;
            }
            let definition_id = definition.id;
            match self.startup.request_spawn(definition).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::warn!(
                        definition_id = %definition_id,
                        error = %e,
                        "Catalog spawn failed"
                    );
                }
            }
        }

        tracing::info!(requested = outcomes.len(), "Catalog spawn requested");
        Ok(outcomes)
    }

    /// Look up one definition and request its spawn.
    pub async fn spawn_definition(
        &self,
        definition_id: NpcDefinitionId,
    ) -> Result<Result<SpawnOutcome, StartupError>, RepoError> {
        let definition = self
            .catalog
            .get(definition_id)
            .await?
            .ok_or_else(|| RepoError::not_found("NpcDefinition", definition_id))?;
        Ok(self.startup.request_spawn(definition).await)
    }

    /// Despawn every NPC, then stop the thread manager. Returns `true` when
    /// both completed cleanly.
    pub async fn shutdown(&self) -> bool {
        let cleaned = self.lifecycle.cleanup_all().await;
        let stopped = self.threads.stop().await;
        tracing::info!(cleaned, stopped, "NPC engine shut down");
        cleaned && stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::{FixedRandom, SystemClock};
    use crate::infrastructure::memory::{InMemoryCatalog, InMemoryWorld, Room};
    use crate::infrastructure::ports::MockNpcDefinitionRepo;
    use npc_domain::{
        ActionMessage, ActionType, BehaviorConfig, NpcDefinition, NpcName, NpcType, RoomId,
        SubZoneId,
    };
    use std::time::Duration;

    fn room(key: &str) -> RoomId {
        RoomId::new(key).unwrap()
    }

    /// A ring of rooms in one sub-zone so every NPC always has somewhere to go.
    fn ring_world(size: usize) -> Arc<InMemoryWorld> {
        let world = InMemoryWorld::new();
        let docks = SubZoneId::new("docks").unwrap();
        let keys: Vec<RoomId> = (0..size)
            .map(|i| room(&format!("earth_arkham_docks_berth_{i}")))
            .collect();
        for key in &keys {
            world.add_room(Room::new(key.clone(), docks.clone()));
        }
        for (i, key) in keys.iter().enumerate() {
            world.connect(key, "east", &keys[(i + 1) % size], "west");
        }
        Arc::new(world)
    }

    fn restless(name: &str, room_key: &str) -> NpcDefinition {
        NpcDefinition::new(
            NpcDefinitionId::new(),
            NpcName::new(name).unwrap(),
            NpcType::PassiveMob,
        )
        .with_sub_zone(SubZoneId::new("docks").unwrap())
        .with_room(room(room_key))
        .with_behavior(BehaviorConfig::default().with_probability(1.0))
    }

    fn config() -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(5),
            stop_timeout: Duration::from_secs(1),
            ..EngineConfig::default()
        }
    }

    fn engine(catalog: Arc<dyn NpcDefinitionRepo>, world: Arc<InMemoryWorld>) -> NpcEngine {
        NpcEngine::new(
            config(),
            EnginePorts {
                catalog,
                movement: world,
                combat: None,
                clock: Arc::new(SystemClock::new()),
                random: Arc::new(FixedRandom::new(0.0)),
            },
        )
    }

    #[tokio::test]
    async fn ten_npcs_run_concurrently_and_stop_cleanly() {
        let world = ring_world(4);
        let definitions: Vec<NpcDefinition> = (0..10)
            .map(|i| {
                restless(
                    &format!("Rat {i}"),
                    &format!("earth_arkham_docks_berth_{}", i % 4),
                )
            })
            .collect();
        let catalog = Arc::new(InMemoryCatalog::new(definitions));
        let engine = engine(catalog, world.clone());

        engine.start().await;
        let outcomes = engine.spawn_catalog().await.unwrap();
        assert_eq!(outcomes.len(), 10);
        assert!(outcomes
            .iter()
            .all(|outcome| matches!(outcome, SpawnOutcome::Spawned(_))));

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(engine.lifecycle.active_count().await, 10);
        assert_eq!(engine.threads.active_unit_count().await, 10);
        assert_eq!(engine.bridge.registered_npcs().await.len(), 10);
        for npc in engine.lifecycle.active_npcs().await {
            assert!(world.position_of(&npc.npc_id).is_some(), "{} never moved", npc.npc_id);
        }

        let npc_ids: Vec<NpcId> = engine
            .lifecycle
            .active_npcs()
            .await
            .into_iter()
            .map(|npc| npc.npc_id)
            .collect();

        assert!(engine.shutdown().await);
        assert_eq!(engine.lifecycle.active_count().await, 0);
        assert_eq!(engine.threads.active_unit_count().await, 0);
        assert!(!engine.threads.is_running());
        assert_eq!(engine.queue.get_total_queue_size(), 0);

        // Nothing moves once shutdown returned
        let positions: Vec<_> = npc_ids.iter().map(|id| world.position_of(id)).collect();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let later: Vec<_> = npc_ids.iter().map(|id| world.position_of(id)).collect();
        assert_eq!(positions, later);
    }

    #[tokio::test]
    async fn concurrent_spawns_then_individual_despawns() {
        let world = ring_world(4);
        let definitions: Vec<NpcDefinition> = (0..10)
            .map(|i| {
                restless(
                    &format!("Crow {i}"),
                    &format!("earth_arkham_docks_berth_{}", i % 4),
                )
            })
            .collect();
        let engine = engine(Arc::new(InMemoryCatalog::new(Vec::new())), world);
        engine.start().await;

        let spawned = futures_util::future::join_all(
            definitions
                .iter()
                .map(|definition| engine.lifecycle.spawn(definition.clone())),
        )
        .await;
        let npc_ids: Vec<NpcId> = spawned.into_iter().map(Option::unwrap).collect();
        assert_eq!(engine.threads.active_unit_count().await, 10);
        tokio::time::sleep(Duration::from_millis(30)).await;

        for definition in &definitions {
            assert!(engine.lifecycle.despawn(definition.id).await);
        }
        for npc_id in &npc_ids {
            assert!(!engine.threads.is_unit_active(npc_id).await);
        }
        assert_eq!(engine.lifecycle.active_count().await, 0);

        assert!(engine.threads.stop().await);
        assert_eq!(engine.threads.active_unit_count().await, 0);
        assert!(!engine.threads.is_running());
        assert!(engine.bridge.registered_npcs().await.is_empty());
    }

    #[tokio::test]
    async fn catalog_spawns_before_start_are_deferred() {
        let world = ring_world(2);
        let catalog = Arc::new(InMemoryCatalog::new([
            restless("Gull", "earth_arkham_docks_berth_0"),
            NpcDefinition::new(
                NpcDefinitionId::new(),
                NpcName::new("Ghost").unwrap(),
                NpcType::PassiveMob,
            ),
        ]));
        let engine = engine(catalog, world);

        let outcomes = engine.spawn_catalog().await.unwrap();
        assert_eq!(outcomes, vec![SpawnOutcome::Deferred { position: 0 }]);
        assert_eq!(engine.lifecycle.active_count().await, 0);

        let spawned = engine.start().await;
        assert_eq!(spawned.len(), 1);
        assert_eq!(engine.lifecycle.active_count().await, 1);
        assert!(engine.shutdown().await);
    }

    #[tokio::test]
    async fn actions_and_speech_flow_through_the_engine() {
        let world = ring_world(3);
        let gull = restless("Gull", "earth_arkham_docks_berth_0")
            .with_behavior(BehaviorConfig::default().with_idle_movement(false));
        let catalog = Arc::new(InMemoryCatalog::new([gull.clone()]));
        let engine = engine(catalog, world.clone());
        engine.start().await;

        let outcome = engine.spawn_definition(gull.id).await.unwrap().unwrap();
        let npc_id = match outcome {
            SpawnOutcome::Spawned(npc_id) => npc_id,
            other => panic!("expected immediate spawn, got {other:?}"),
        };

        engine.threads.send_action(
            &npc_id,
            ActionMessage::unstamped(ActionType::Move, npc_id.clone())
                .with_target_room(room("earth_arkham_docks_berth_2")),
        );
        engine.threads.send_action(
            &npc_id,
            ActionMessage::unstamped(ActionType::Speak, npc_id.clone()).with_message("Caw"),
        );
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(
            world.position_of(&npc_id),
            Some(room("earth_arkham_docks_berth_2"))
        );
        let outgoing = engine.bridge.get_pending_messages().await;
        assert_eq!(outgoing.len(), 1);
        assert_eq!(outgoing[0].source_npc, Some(npc_id));
        assert!(engine.shutdown().await);
    }

    #[tokio::test]
    async fn custom_behavior_receives_broadcasts() {
        let behavior = Arc::new(crate::runtime::test_support::RecordingBehavior::default());
        let gull = restless("Gull", "earth_arkham_docks_berth_0");
        let engine = NpcEngine::with_behavior(
            config(),
            EnginePorts {
                catalog: Arc::new(InMemoryCatalog::new([gull])),
                movement: ring_world(2),
                combat: None,
                clock: Arc::new(SystemClock::new()),
                random: Arc::new(FixedRandom::new(0.0)),
            },
            behavior.clone(),
        );
        engine.start().await;
        engine.spawn_catalog().await.unwrap();

        let recipients = engine
            .bridge
            .broadcast_to_all_npcs(crate::runtime::BridgeMessage::new(
                "storm",
                serde_json::json!({"severity": 3}),
            ))
            .await;
        assert_eq!(recipients, 1);
        tokio::time::sleep(Duration::from_millis(30)).await;

        let notifications = behavior.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].1, "storm");
        assert!(engine.shutdown().await);
    }

    #[tokio::test]
    async fn unknown_definition_is_not_found() {
        let mut catalog = MockNpcDefinitionRepo::new();
        catalog.expect_get().returning(|_| Ok(None));
        let engine = engine(Arc::new(catalog), ring_world(2));

        let err = engine.spawn_definition(NpcDefinitionId::new()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
