//! NPC Engine - demo entry point.
//!
//! Seeds a small in-memory harbor, spawns its residents, and logs what they
//! say until Ctrl+C or the configured run time elapses.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use npc_domain::{
    ActionMessage, ActionType, BehaviorConfig, NpcDefinition, NpcDefinitionId, NpcName, NpcType,
    RoomId, SubZoneId,
};
use npc_engine::infrastructure::{
    clock::{SystemClock, SystemRandom},
    config::EngineConfig,
    memory::{InMemoryCatalog, InMemoryWorld, Room},
};
use npc_engine::runtime::BridgeMessage;
use npc_engine::{EnginePorts, NpcEngine};

/// Cancels `cancel_token` on SIGTERM/SIGINT
fn setup_shutdown_signal(cancel_token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        cancel_token.cancel();
    });
}

fn seed_world() -> anyhow::Result<(InMemoryWorld, Vec<NpcDefinition>)> {
    let docks = SubZoneId::new("docks")?;
    let market = SubZoneId::new("market")?;

    let pier = RoomId::new("earth_innsmouth_docks_pier")?;
    let pier_end = RoomId::new("earth_innsmouth_docks_pier_end")?;
    let warehouse = RoomId::new("earth_innsmouth_docks_warehouse")?;
    let square = RoomId::new("earth_innsmouth_market_square")?;
    let stall = RoomId::new("earth_innsmouth_market_square_stall")?;

    let world = InMemoryWorld::new();
    for (room, sub_zone) in [
        (&pier, &docks),
        (&pier_end, &docks),
        (&warehouse, &docks),
        (&square, &market),
        (&stall, &market),
    ] {
        world.add_room(Room::new(room.clone(), sub_zone.clone()));
    }
    world.connect(&pier, "east", &pier_end, "west");
    world.connect(&pier, "north", &warehouse, "south");
    world.connect(&warehouse, "north", &square, "south");
    world.connect(&square, "east", &stall, "west");

    let npc = |name: &str, npc_type: NpcType| -> anyhow::Result<NpcDefinition> {
        Ok(NpcDefinition::new(NpcDefinitionId::new(), NpcName::new(name)?, npc_type))
    };
    let definitions = vec![
        npc("Dock Rat", NpcType::PassiveMob)?
            .with_sub_zone(docks.clone())
            .with_room(pier.clone())
            .with_behavior(BehaviorConfig::default().with_probability(0.5)),
        npc("Gull", NpcType::PassiveMob)?
            .with_sub_zone(docks.clone())
            .with_room(pier_end),
        npc("Fishmonger", NpcType::Shopkeeper)?
            .with_sub_zone(market.clone())
            .with_room(stall)
            .with_behavior(BehaviorConfig::default().with_idle_movement(false)),
        npc("Hooded Stranger", NpcType::QuestGiver)?
            .with_sub_zone(market)
            .with_room(square)
            .with_behavior(BehaviorConfig::default().with_weighted_home(false)),
        // No spawn room: stays in the catalog only
        npc("Drowned Sailor", NpcType::AggressiveMob)?.with_sub_zone(docks),
    ];

    Ok((world, definitions))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "npc_engine=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting NPC Engine");

    let cancel_token = CancellationToken::new();
    setup_shutdown_signal(cancel_token.clone());

    let config = EngineConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Tick interval: {:?}", config.tick_interval);
    tracing::info!("  Inbox capacity: {}", config.inbox_capacity);

    let (world, definitions) = seed_world()?;
    let world = Arc::new(world);
    tracing::info!(rooms = world.room_count(), npcs = definitions.len(), "World seeded");

    let run_for = Duration::from_secs(config.demo_run_seconds);
    let tick_interval = config.tick_interval;
    let engine = NpcEngine::new(
        config,
        EnginePorts {
            catalog: Arc::new(InMemoryCatalog::new(definitions)),
            movement: world.clone(),
            combat: None,
            clock: Arc::new(SystemClock::new()),
            random: Arc::new(SystemRandom::new()),
        },
    );

    // Requests made before start are deferred and replayed by it
    engine.spawn_catalog().await?;
    let spawned = engine.start().await;
    tracing::info!(spawned = spawned.len(), "NPCs spawned");

    for npc_id in &spawned {
        engine.threads.send_action(
            npc_id,
            ActionMessage::unstamped(ActionType::Speak, npc_id.clone()).with_message("..."),
        );
    }
    engine
        .bridge
        .broadcast_to_all_npcs(BridgeMessage::new("tide", serde_json::json!({"rising": true})))
        .await;

    let deadline = async {
        if run_for.is_zero() {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep(run_for).await;
        }
    };
    tokio::pin!(deadline);

    let mut report = tokio::time::interval(tick_interval * 10);
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = &mut deadline => {
                tracing::info!("Demo run time elapsed");
                break;
            }
            _ = report.tick() => {
                for message in engine.bridge.get_pending_messages().await {
                    tracing::info!(
                        source = ?message.source_npc,
                        kind = %message.kind,
                        payload = %message.payload,
                        "NPC report"
                    );
                }
                for npc in engine.lifecycle.active_npcs().await {
                    if let Some(room) = world.position_of(&npc.npc_id) {
                        tracing::debug!(npc = %npc.definition.name, room = %room, "NPC position");
                    }
                }
            }
        }
    }

    let clean = engine.shutdown().await;
    tracing::info!(clean, "NPC Engine stopped");
    Ok(())
}
