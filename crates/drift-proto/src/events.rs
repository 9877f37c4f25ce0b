//! Event vocabulary for the bidirectional wire protocol.
//!
//! Events are adjacently tagged: the `event` key names the variant in
//! kebab-case, the `data` key carries the payload. Payload keys are
//! camelCase on the wire.

use crate::message::{ChatMessage, MessageType};
use crate::ProtoError;
use serde::{Deserialize, Serialize};

/// Chat mode a session is queued or matched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Text,
    Video,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Text => write!(f, "text"),
            Mode::Video => write!(f, "video"),
        }
    }
}

/// Why a partner left an active pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectReason {
    Left,
    Skipped,
    Timeout,
}

impl DisconnectReason {
    /// Human-readable notice delivered alongside `partner-disconnected`.
    pub fn notice(self) -> &'static str {
        match self {
            DisconnectReason::Left => "Your partner has left the chat",
            DisconnectReason::Skipped => "Your partner has skipped to the next chat",
            DisconnectReason::Timeout => "Your partner has disconnected",
        }
    }
}

/// Escalation step attached to a blocked message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    None,
    Warning,
    Kick,
}

// ============================================================================
// Inbound payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinPayload {
    pub session_id: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueuePayload {
    #[serde(default)]
    pub interests: Vec<String>,
    /// Falls back to the mode chosen at `user-join` when omitted.
    #[serde(default)]
    pub mode: Option<Mode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: Option<MessageType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetMessagesPayload {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub skip: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportUserPayload {
    pub reported_user_id: String,
    pub reason: String,
}

// ============================================================================
// Inbound events
// ============================================================================

/// Everything a client may send to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    UserJoin(UserJoinPayload),
    JoinQueue(JoinQueuePayload),
    LeaveQueue,
    SkipUser,
    SendMessage(SendMessagePayload),
    GetMessages(GetMessagesPayload),
    Typing,
    StopTyping,
    MarkMessagesRead,
    ReportUser(ReportUserPayload),
    DisconnectChat,
    WebrtcOffer {
        offer: serde_json::Value,
    },
    WebrtcAnswer {
        answer: serde_json::Value,
    },
    WebrtcIceCandidate {
        candidate: serde_json::Value,
    },
    Pong,
}

impl ClientEvent {
    /// Decode a single text frame.
    pub fn parse(frame: &str) -> Result<Self, ProtoError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// The wire name of this event, for log labeling.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::UserJoin(_) => "user-join",
            ClientEvent::JoinQueue(_) => "join-queue",
            ClientEvent::LeaveQueue => "leave-queue",
            ClientEvent::SkipUser => "skip-user",
            ClientEvent::SendMessage(_) => "send-message",
            ClientEvent::GetMessages(_) => "get-messages",
            ClientEvent::Typing => "typing",
            ClientEvent::StopTyping => "stop-typing",
            ClientEvent::MarkMessagesRead => "mark-messages-read",
            ClientEvent::ReportUser(_) => "report-user",
            ClientEvent::DisconnectChat => "disconnect-chat",
            ClientEvent::WebrtcOffer { .. } => "webrtc-offer",
            ClientEvent::WebrtcAnswer { .. } => "webrtc-answer",
            ClientEvent::WebrtcIceCandidate { .. } => "webrtc-ice-candidate",
            ClientEvent::Pong => "pong",
        }
    }
}

// ============================================================================
// Outbound events
// ============================================================================

/// Everything the core may deliver to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    SessionConfirmed { session_id: String },
    #[serde(rename_all = "camelCase")]
    ReconnectSuccess {
        match_restored: bool,
        room_id: String,
        partner_id: String,
    },
    #[serde(rename_all = "camelCase")]
    QueueStatus {
        position: usize,
        estimated_wait: u64,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    MatchFound {
        partner_id: String,
        common_interests: Vec<String>,
        mode: Mode,
        send_offer: bool,
        room_id: String,
    },
    PartnerTyping(bool),
    MessageSent(ChatMessage),
    MessageReceived(ChatMessage),
    #[serde(rename_all = "camelCase")]
    MessagesLoaded {
        messages: Vec<ChatMessage>,
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    MessagesMarkedRead { count: u64, room_id: String },
    #[serde(rename_all = "camelCase")]
    MessagesReadByPartner { read_by: String, count: u64 },
    MessageBlocked {
        reason: String,
        categories: Vec<String>,
        action: ModerationAction,
    },
    #[serde(rename_all = "camelCase")]
    ModerationWarning { message: String, flag_count: u32 },
    ModerationKick { message: String },
    MessageError { error: String },
    MessagesError { error: String },
    Error { message: String },
    PartnerDisconnected {
        reason: DisconnectReason,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    PartnerReconnected { partner_id: String, room_id: String },
    SkipConfirmed,
    #[serde(rename_all = "camelCase")]
    ReportSubmitted {
        success: bool,
        report_id: String,
        message: String,
    },
    Ping,
    WebrtcOffer {
        offer: serde_json::Value,
        from: String,
    },
    WebrtcAnswer {
        answer: serde_json::Value,
        from: String,
    },
    WebrtcIceCandidate {
        candidate: serde_json::Value,
        from: String,
    },
}

impl ServerEvent {
    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The wire name of this event, for log labeling.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::SessionConfirmed { .. } => "session-confirmed",
            ServerEvent::ReconnectSuccess { .. } => "reconnect-success",
            ServerEvent::QueueStatus { .. } => "queue-status",
            ServerEvent::MatchFound { .. } => "match-found",
            ServerEvent::PartnerTyping(_) => "partner-typing",
            ServerEvent::MessageSent(_) => "message-sent",
            ServerEvent::MessageReceived(_) => "message-received",
            ServerEvent::MessagesLoaded { .. } => "messages-loaded",
            ServerEvent::MessagesMarkedRead { .. } => "messages-marked-read",
            ServerEvent::MessagesReadByPartner { .. } => "messages-read-by-partner",
            ServerEvent::MessageBlocked { .. } => "message-blocked",
            ServerEvent::ModerationWarning { .. } => "moderation-warning",
            ServerEvent::ModerationKick { .. } => "moderation-kick",
            ServerEvent::MessageError { .. } => "message-error",
            ServerEvent::MessagesError { .. } => "messages-error",
            ServerEvent::Error { .. } => "error",
            ServerEvent::PartnerDisconnected { .. } => "partner-disconnected",
            ServerEvent::PartnerReconnected { .. } => "partner-reconnected",
            ServerEvent::SkipConfirmed => "skip-confirmed",
            ServerEvent::ReportSubmitted { .. } => "report-submitted",
            ServerEvent::Ping => "ping",
            ServerEvent::WebrtcOffer { .. } => "webrtc-offer",
            ServerEvent::WebrtcAnswer { .. } => "webrtc-answer",
            ServerEvent::WebrtcIceCandidate { .. } => "webrtc-ice-candidate",
        }
    }
}
