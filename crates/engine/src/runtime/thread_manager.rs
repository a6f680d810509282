//! Starts, stops, and restarts NPC units.
//!
//! Each active NPC runs as one tokio task. Every unit's cancellation token is
//! a child of the manager's root token, so [`ThreadManager::stop`] reaches all
//! of them with one cancel. Stopping always awaits the task before its
//! bookkeeping is removed, and always clears the unit's inbox.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use npc_domain::{ActionMessage, NpcDefinition, NpcId, NpcInstance};

use super::behavior::NpcBehavior;
use super::bridge::CommunicationBridge;
use super::unit::NpcUnit;
use crate::infrastructure::ports::ClockPort;
use crate::stores::MessageQueue;

/// Pause between two ticks of a unit when none is configured.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// How long a stop waits for a unit to acknowledge before aborting it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThreadManagerError {
    #[error("thread manager is not running")]
    NotRunning,

    #[error("NPC unit {0} is still stopping")]
    UnitStopping(NpcId),
}

enum UnitState {
    Active,
    /// Resolves to the stopping caller's result once the unit is gone
    Stopping(watch::Receiver<Option<bool>>),
}

struct UnitEntry {
    state: UnitState,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    started_at: DateTime<Utc>,
}

impl UnitEntry {
    fn is_live(&self) -> bool {
        matches!(self.state, UnitState::Active)
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// The first caller takes ownership of the stop; later callers wait on it.
    fn begin_stop(&mut self) -> StopTicket {
        if let UnitState::Stopping(done) = &self.state {
            return StopTicket::Wait(done.clone());
        }
        let (done, watcher) = watch::channel(None);
        self.state = UnitState::Stopping(watcher);
        StopTicket::Own {
            cancel: self.cancel.clone(),
            task: self.task.take(),
            done,
        }
    }
}

enum StopTicket {
    Own {
        cancel: CancellationToken,
        task: Option<JoinHandle<()>>,
        done: watch::Sender<Option<bool>>,
    },
    Wait(watch::Receiver<Option<bool>>),
    Untracked,
}

struct Registry {
    root: CancellationToken,
    units: HashMap<NpcId, UnitEntry>,
}

/// Snapshot of the manager for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadManagerStats {
    pub running: bool,
    pub active_units: usize,
    pub queued_messages: usize,
}

pub struct ThreadManager {
    queue: Arc<MessageQueue>,
    behavior: Arc<dyn NpcBehavior>,
    bridge: Option<Arc<CommunicationBridge>>,
    clock: Arc<dyn ClockPort>,
    tick_interval: Duration,
    stop_timeout: Duration,
    running: AtomicBool,
    registry: Mutex<Registry>,
}

impl ThreadManager {
    pub fn new(
        queue: Arc<MessageQueue>,
        behavior: Arc<dyn NpcBehavior>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            queue,
            behavior,
            bridge: None,
            clock,
            tick_interval: DEFAULT_TICK_INTERVAL,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            running: AtomicBool::new(false),
            registry: Mutex::new(Registry {
                root: CancellationToken::new(),
                units: HashMap::new(),
            }),
        }
    }

    /// Units drain their bridge notifications every tick.
    pub fn with_bridge(mut self, bridge: Arc<CommunicationBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    pub fn bridge(&self) -> Option<&Arc<CommunicationBridge>> {
        self.bridge.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Allow units to be started. Starting a running manager is a no-op.
    pub async fn start(&self) {
        let mut registry = self.registry.lock().await;
        if self.running.load(Ordering::SeqCst) {
            return;
        }
        // A stopped root stays cancelled, so every run gets a fresh one
        registry.root = CancellationToken::new();
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "NPC thread manager started"
        );
    }

    /// Launch the unit for `npc_id`.
    ///
    /// Fails without side effects when the manager is not running. Succeeds
    /// without doing anything when the unit is already active. A unit whose
    /// task already ended (its behavior panicked) is replaced.
    pub async fn start_unit(
        &self,
        npc_id: &NpcId,
        definition: NpcDefinition,
    ) -> Result<(), ThreadManagerError> {
        let mut registry = self.registry.lock().await;

        if !self.running.load(Ordering::SeqCst) {
            tracing::warn!(npc_id = %npc_id, "Cannot start NPC unit: manager not running");
            return Err(ThreadManagerError::NotRunning);
        }

        if let Some(entry) = registry.units.get_mut(npc_id) {
            if matches!(entry.state, UnitState::Stopping(_)) {
                return Err(ThreadManagerError::UnitStopping(npc_id.clone()));
            }
            if entry.is_live() {
                tracing::debug!(npc_id = %npc_id, "NPC unit already active");
                return Ok(());
            }
            if let Some(task) = entry.task.take() {
                report_join(npc_id, task.await);
            }
            registry.units.remove(npc_id);
        }

        let now = self.clock.now();
        let cancel = registry.root.child_token();
        let unit = NpcUnit {
            npc: NpcInstance::spawn(npc_id.clone(), definition, now),
            queue: Arc::clone(&self.queue),
            behavior: Arc::clone(&self.behavior),
            bridge: self.bridge.clone(),
            tick_interval: self.tick_interval,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(unit.run());

        registry.units.insert(
            npc_id.clone(),
            UnitEntry {
                state: UnitState::Active,
                cancel,
                task: Some(task),
                started_at: now,
            },
        );
        tracing::info!(npc_id = %npc_id, "NPC unit launched");
        Ok(())
    }

    /// Cancel the unit for `npc_id` and wait for it to finish.
    ///
    /// The inbox is cleared whatever the outcome. Returns `false` only when
    /// the unit did not acknowledge within the stop timeout and had to be
    /// aborted. Stopping an unknown unit succeeds. A caller that arrives while
    /// another stop is in flight waits for that stop and shares its result.
    pub async fn stop_unit(&self, npc_id: &NpcId) -> bool {
        let ticket = {
            let mut registry = self.registry.lock().await;
            registry
                .units
                .get_mut(npc_id)
                .map_or(StopTicket::Untracked, UnitEntry::begin_stop)
        };

        let acknowledged = self.finish_stop(npc_id, ticket).await;
        self.queue.clear_messages(npc_id);
        acknowledged
    }

    async fn finish_stop(&self, npc_id: &NpcId, ticket: StopTicket) -> bool {
        match ticket {
            StopTicket::Own { cancel, task, done } => {
                cancel.cancel();
                let acknowledged = match task {
                    Some(task) => self.join_unit(npc_id, task).await,
                    None => true,
                };

                self.registry.lock().await.units.remove(npc_id);
                self.queue.clear_messages(npc_id);
                done.send_replace(Some(acknowledged));

                if acknowledged {
                    tracing::info!(npc_id = %npc_id, "NPC unit stopped");
                }
                acknowledged
            }
            StopTicket::Wait(mut done) => {
                match done.wait_for(Option::is_some).await {
                    Ok(result) => (*result).unwrap_or(false),
                    Err(_) => {
                        // The owning stop was dropped before it finished
                        tracing::warn!(npc_id = %npc_id, "NPC unit stop abandoned");
                        false
                    }
                }
            }
            StopTicket::Untracked => true,
        }
    }

    /// Stop then start. Not atomic: another caller may act in between.
    pub async fn restart_unit(
        &self,
        npc_id: &NpcId,
        definition: NpcDefinition,
    ) -> Result<(), ThreadManagerError> {
        self.stop_unit(npc_id).await;
        self.start_unit(npc_id, definition).await
    }

    /// Cancel every unit at once and wait for all of them.
    ///
    /// Individual units that fail to acknowledge are aborted and logged; the
    /// unit map and the inboxes are cleared regardless. Returns `true` when
    /// every unit acknowledged.
    pub async fn stop(&self) -> bool {
        let tickets: Vec<(NpcId, StopTicket)> = {
            let mut registry = self.registry.lock().await;
            self.running.store(false, Ordering::SeqCst);
            registry.root.cancel();
            registry
                .units
                .iter_mut()
                .map(|(npc_id, entry)| (npc_id.clone(), entry.begin_stop()))
                .collect()
        };

        let unit_count = tickets.len();
        let results = join_all(tickets.into_iter().map(|(npc_id, ticket)| async move {
            self.finish_stop(&npc_id, ticket).await
        }))
        .await;

        self.registry.lock().await.units.clear();
        self.queue.clear_all();

        let all_acknowledged = results.iter().all(|ok| *ok);
        tracing::info!(
            units = unit_count,
            all_acknowledged,
            "NPC thread manager stopped"
        );
        all_acknowledged
    }

    pub async fn is_unit_active(&self, npc_id: &NpcId) -> bool {
        self.registry
            .lock()
            .await
            .units
            .get(npc_id)
            .is_some_and(UnitEntry::is_live)
    }

    pub async fn active_unit_count(&self) -> usize {
        self.registry
            .lock()
            .await
            .units
            .values()
            .filter(|entry| entry.is_live())
            .count()
    }

    pub async fn active_unit_ids(&self) -> Vec<NpcId> {
        let registry = self.registry.lock().await;
        let mut ids: Vec<NpcId> = registry
            .units
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(npc_id, _)| npc_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// When the unit for `npc_id` was launched, if it is tracked.
    pub async fn unit_started_at(&self, npc_id: &NpcId) -> Option<DateTime<Utc>> {
        self.registry
            .lock()
            .await
            .units
            .get(npc_id)
            .map(|entry| entry.started_at)
    }

    pub async fn stats(&self) -> ThreadManagerStats {
        ThreadManagerStats {
            running: self.is_running(),
            active_units: self.active_unit_count().await,
            queued_messages: self.queue.get_total_queue_size(),
        }
    }

    /// Queue an action for `npc_id`. The unit picks it up on its next tick.
    pub fn send_action(&self, npc_id: &NpcId, message: ActionMessage) -> bool {
        self.queue.add_message(npc_id, message)
    }

    async fn join_unit(&self, npc_id: &NpcId, mut task: JoinHandle<()>) -> bool {
        match tokio::time::timeout(self.stop_timeout, &mut task).await {
            Ok(result) => {
                report_join(npc_id, result);
                true
            }
            Err(_) => {
                task.abort();
                tracing::warn!(
                    npc_id = %npc_id,
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "NPC unit did not stop in time, aborted"
                );
                false
            }
        }
    }
}

fn report_join(npc_id: &NpcId, result: Result<(), tokio::task::JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            tracing::error!(npc_id = %npc_id, error = %e, "NPC unit panicked");
        }
        Err(e) => {
            tracing::debug!(npc_id = %npc_id, error = %e, "NPC unit task cancelled");
        }
    }
}
