//! Action messages - the typed unit of NPC intent.
//!
//! Behavior code builds an [`ActionMessage`], the owning NPC unit consumes it
//! once from its inbox, and it is then discarded. The only byte-level contract
//! is the flat record form produced by [`ActionMessage::to_record`]: a JSON
//! object whose `action_type` is one of the [`ActionType`] wire names.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{NpcId, RoomId};

/// Kinds of intent an NPC can act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Move,
    Attack,
    Speak,
    Interact,
    Wander,
    Hunt,
    Flee,
    Idle,
    Custom,
}

impl ActionType {
    pub const ALL: [ActionType; 9] = [
        ActionType::Move,
        ActionType::Attack,
        ActionType::Speak,
        ActionType::Interact,
        ActionType::Wander,
        ActionType::Hunt,
        ActionType::Flee,
        ActionType::Idle,
        ActionType::Custom,
    ];

    /// Wire name used in the flat record form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Move => "move",
            ActionType::Attack => "attack",
            ActionType::Speak => "speak",
            ActionType::Interact => "interact",
            ActionType::Wander => "wander",
            ActionType::Hunt => "hunt",
            ActionType::Flee => "flee",
            ActionType::Idle => "idle",
            ActionType::Custom => "custom",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ActionMessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ActionMessageError::UnknownActionType(s.to_string()))
    }
}

/// Errors raised while encoding or decoding the flat record form.
///
/// Decoding failures mean the record is corrupt; callers must not treat them
/// as a soft no-op.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionMessageError {
    #[error("Unknown action type: {0}")]
    UnknownActionType(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid action record: {0}")]
    InvalidRecord(String),
}

/// A single NPC intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action_type: ActionType,
    pub npc_id: NpcId,
    /// Stamped at construction; records decoded without one are stamped by
    /// the inbox on arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_room: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_player: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_npc: Option<NpcId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Map<String, Value>>,
}

impl ActionMessage {
    pub fn new(action_type: ActionType, npc_id: NpcId, timestamp: DateTime<Utc>) -> Self {
        Self::with_optional_timestamp(action_type, npc_id, Some(timestamp))
    }

    /// A message without a timestamp; the inbox stamps it on arrival.
    pub fn unstamped(action_type: ActionType, npc_id: NpcId) -> Self {
        Self::with_optional_timestamp(action_type, npc_id, None)
    }

    fn with_optional_timestamp(
        action_type: ActionType,
        npc_id: NpcId,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            action_type,
            npc_id,
            timestamp,
            target_room: None,
            target_player: None,
            target_npc: None,
            message: None,
            channel: None,
            damage: None,
            item_id: None,
            custom_data: None,
        }
    }

    pub fn with_target_room(mut self, room: RoomId) -> Self {
        self.target_room = Some(room);
        self
    }

    pub fn with_target_player(mut self, player: impl Into<String>) -> Self {
        self.target_player = Some(player.into());
        self
    }

    pub fn with_target_npc(mut self, npc: NpcId) -> Self {
        self.target_npc = Some(npc);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_damage(mut self, damage: i32) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_item(mut self, item_id: impl Into<String>) -> Self {
        self.item_id = Some(item_id.into());
        self
    }

    pub fn with_custom_data(mut self, data: Map<String, Value>) -> Self {
        self.custom_data = Some(data);
        self
    }

    /// Read a boolean flag out of `custom_data`.
    pub fn custom_flag(&self, key: &str) -> Option<bool> {
        self.custom_data
            .as_ref()
            .and_then(|data| data.get(key))
            .and_then(Value::as_bool)
    }

    /// Encode into the flat record form. Absent optional fields are omitted.
    pub fn to_record(&self) -> Result<Map<String, Value>, ActionMessageError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(record)) => Ok(record),
            Ok(other) => Err(ActionMessageError::InvalidRecord(format!(
                "expected an object, got {other}"
            ))),
            Err(e) => Err(ActionMessageError::InvalidRecord(e.to_string())),
        }
    }

    /// Decode from the flat record form.
    ///
    /// The action type is checked before anything else so an unknown value is
    /// reported as [`ActionMessageError::UnknownActionType`].
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, ActionMessageError> {
        let raw_type = record
            .get("action_type")
            .ok_or(ActionMessageError::MissingField("action_type"))?;
        let raw_type = raw_type
            .as_str()
            .ok_or_else(|| ActionMessageError::UnknownActionType(raw_type.to_string()))?;
        raw_type.parse::<ActionType>()?;

        if !record.contains_key("npc_id") {
            return Err(ActionMessageError::MissingField("npc_id"));
        }

        serde_json::from_value(Value::Object(record.clone()))
            .map_err(|e| ActionMessageError::InvalidRecord(e.to_string()))
    }
}
