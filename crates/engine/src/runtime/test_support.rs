//! Shared fixtures for runtime tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use npc_domain::{
    ActionMessage, NpcDefinition, NpcDefinitionId, NpcId, NpcInstance, NpcName, NpcType, RoomId,
};

use super::behavior::NpcBehavior;
use super::bridge::BridgeMessage;
use crate::infrastructure::clock::FixedClock;
use crate::infrastructure::ports::ClockPort;

pub(crate) fn fixed_clock() -> Arc<dyn ClockPort> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()))
}

pub(crate) fn npc_id(value: &str) -> NpcId {
    NpcId::new(value).unwrap()
}

pub(crate) fn definition(name: &str) -> NpcDefinition {
    NpcDefinition::new(
        NpcDefinitionId::new(),
        NpcName::new(name).unwrap(),
        NpcType::PassiveMob,
    )
    .with_room(RoomId::new("earth_arkham_docks_pier").unwrap())
}

/// Counts ticks and records handled messages per NPC. Panics on tick for
/// any NPC whose id contains `panic_marker`.
#[derive(Default)]
pub(crate) struct RecordingBehavior {
    ticks: Mutex<HashMap<NpcId, usize>>,
    handled: Mutex<Vec<(NpcId, String)>>,
    notifications: Mutex<Vec<(NpcId, String)>>,
    total_ticks: AtomicUsize,
    panic_marker: Option<String>,
}

impl RecordingBehavior {
    pub(crate) fn panicking_on(marker: &str) -> Self {
        Self {
            panic_marker: Some(marker.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn ticks_for(&self, npc_id: &NpcId) -> usize {
        self.ticks.lock().unwrap().get(npc_id).copied().unwrap_or(0)
    }

    pub(crate) fn total_ticks(&self) -> usize {
        self.total_ticks.load(Ordering::SeqCst)
    }

    pub(crate) fn handled(&self) -> Vec<(NpcId, String)> {
        self.handled.lock().unwrap().clone()
    }

    pub(crate) fn notifications(&self) -> Vec<(NpcId, String)> {
        self.notifications.lock().unwrap().clone()
    }
}

#[async_trait]
impl NpcBehavior for RecordingBehavior {
    async fn handle_message(&self, npc: &mut NpcInstance, message: &ActionMessage) {
        let text = message.message.clone().unwrap_or_default();
        self.handled.lock().unwrap().push((npc.npc_id.clone(), text));
    }

    async fn handle_notification(&self, npc: &mut NpcInstance, message: &BridgeMessage) {
        self.notifications
            .lock()
            .unwrap()
            .push((npc.npc_id.clone(), message.kind.clone()));
    }

    async fn tick(&self, npc: &mut NpcInstance) {
        if let Some(marker) = &self.panic_marker {
            if npc.npc_id.as_str().contains(marker.as_str()) {
                panic!("behavior failure for {}", npc.npc_id);
            }
        }
        *self.ticks.lock().unwrap().entry(npc.npc_id.clone()).or_default() += 1;
        self.total_ticks.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sleeps through every tick and counts the ticks that ran to completion.
pub(crate) struct SlowTickBehavior {
    delay: Duration,
    completed: AtomicUsize,
}

impl SlowTickBehavior {
    pub(crate) fn new(delay: Duration) -> Self {
        Self {
            delay,
            completed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NpcBehavior for SlowTickBehavior {
    async fn handle_message(&self, _npc: &mut NpcInstance, _message: &ActionMessage) {}

    async fn tick(&self, _npc: &mut NpcInstance) {
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
}
