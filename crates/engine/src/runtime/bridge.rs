//! Message routing between the world and NPC units.
//!
//! The bridge carries traffic that is not an inbox action: world notifications
//! addressed to one NPC, broadcasts to every registered NPC, and reports that
//! NPCs push back out to the world. Outgoing and incoming buffers sit behind
//! separate locks and no method holds both at once.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use npc_domain::{ActionMessage, ActionMessageError, NpcId};

use crate::infrastructure::ports::ClockPort;

/// A routed notification. `payload` is free-form; actions travel as their
/// flat record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_npc: Option<NpcId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_npc: Option<NpcId>,
    #[serde(default)]
    pub broadcast: bool,
}

impl BridgeMessage {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: None,
            target_npc: None,
            source_npc: None,
            broadcast: false,
        }
    }

    /// Wrap an action so it can travel over the bridge. `kind` is the
    /// action type name.
    pub fn from_action(action: &ActionMessage) -> Result<Self, ActionMessageError> {
        let record = action.to_record()?;
        Ok(Self::new(action.action_type.as_str(), Value::Object(record)))
    }

    /// Decode the payload back into an action. Fails for payloads that are
    /// not action records.
    pub fn to_action(&self) -> Result<ActionMessage, ActionMessageError> {
        match &self.payload {
            Value::Object(record) => ActionMessage::from_record(record),
            other => Err(ActionMessageError::InvalidRecord(format!(
                "bridge payload is not an object: {other}"
            ))),
        }
    }
}

/// Bidirectional router between the game loop and NPC units.
pub struct CommunicationBridge {
    /// NPC -> world reports, drained as a whole by the game loop
    outgoing: Mutex<Vec<BridgeMessage>>,
    /// world -> NPC notifications, drained per NPC by its unit
    incoming: Mutex<HashMap<NpcId, Vec<BridgeMessage>>>,
    clock: Arc<dyn ClockPort>,
}

impl CommunicationBridge {
    pub fn new(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            outgoing: Mutex::new(Vec::new()),
            incoming: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Give `npc_id` an incoming buffer so it receives broadcasts.
    pub async fn register_npc(&self, npc_id: &NpcId) {
        let mut incoming = self.incoming.lock().await;
        incoming.entry(npc_id.clone()).or_default();
        tracing::debug!(npc_id = %npc_id, "NPC registered on bridge");
    }

    /// Drop the incoming buffer of `npc_id` along with anything still in it.
    pub async fn unregister_npc(&self, npc_id: &NpcId) -> bool {
        let mut incoming = self.incoming.lock().await;
        let removed = incoming.remove(npc_id);
        if let Some(pending) = &removed {
            tracing::debug!(
                npc_id = %npc_id,
                discarded = pending.len(),
                "NPC unregistered from bridge"
            );
        }
        removed.is_some()
    }

    pub async fn registered_npcs(&self) -> Vec<NpcId> {
        let incoming = self.incoming.lock().await;
        let mut ids: Vec<NpcId> = incoming.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Deliver `message` to one NPC. An unknown NPC is registered on the fly.
    pub async fn send_message_to_npc(&self, npc_id: &NpcId, mut message: BridgeMessage) {
        message.timestamp = Some(self.clock.now());
        message.target_npc = Some(npc_id.clone());

        let mut incoming = self.incoming.lock().await;
        incoming.entry(npc_id.clone()).or_default().push(message);
    }

    /// Record a report from `npc_id` for the game loop.
    pub async fn receive_message_from_npc(&self, npc_id: &NpcId, mut message: BridgeMessage) {
        message.timestamp = Some(self.clock.now());
        message.source_npc = Some(npc_id.clone());

        let mut outgoing = self.outgoing.lock().await;
        outgoing.push(message);
    }

    /// Copy `message` into every registered NPC's buffer. NPCs that register
    /// later never see it. Returns the number of recipients.
    pub async fn broadcast_to_all_npcs(&self, mut message: BridgeMessage) -> usize {
        message.timestamp = Some(self.clock.now());
        message.broadcast = true;

        let mut incoming = self.incoming.lock().await;
        for (npc_id, buffer) in incoming.iter_mut() {
            let mut copy = message.clone();
            copy.target_npc = Some(npc_id.clone());
            buffer.push(copy);
        }
        let recipients = incoming.len();
        tracing::debug!(kind = %message.kind, recipients, "Broadcast to NPCs");
        recipients
    }

    /// Take every outgoing report, oldest first.
    pub async fn get_pending_messages(&self) -> Vec<BridgeMessage> {
        let mut outgoing = self.outgoing.lock().await;
        std::mem::take(&mut *outgoing)
    }

    /// Take every notification waiting for `npc_id`, oldest first. The NPC
    /// stays registered.
    pub async fn get_messages_for_npc(&self, npc_id: &NpcId) -> Vec<BridgeMessage> {
        let mut incoming = self.incoming.lock().await;
        incoming
            .get_mut(npc_id)
            .map(std::mem::take)
            .unwrap_or_default()
    }

    pub async fn pending_outgoing_count(&self) -> usize {
        self.outgoing.lock().await.len()
    }
}
