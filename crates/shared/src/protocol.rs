use serde::{Deserialize, Serialize};

use crate::domain::{GameId, MessageId, ParticipantId, SenderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireMessageKind {
    Chat,
    System,
}

/// One entry of the server's ordered chat log, exactly as it appears on the
/// wire. Older server builds omit `id` for system rows and for messages
/// persisted before ids were introduced, so everything but `type`, `message`
/// and `timestamp` is optional and normalized downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: WireMessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<WireSender>,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_muted: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSender {
    pub id: ParticipantId,
    #[serde(rename = "type")]
    pub kind: SenderKind,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireParticipant {
    pub id: ParticipantId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SenderKind,
    pub is_online: bool,
    pub is_muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub game_id: GameId,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetMutedRequest {
    pub game_id: GameId,
    pub participant_id: ParticipantId,
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub game_id: GameId,
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
