//! The typed message envelope exchanged over a link.
//!
//! Every non-binary message is a flat JSON object with a small-integer
//! `type` field and a common header (`timestamp`, `participantId`,
//! `username`, `nickname`). Receivers ignore unknown fields, and the
//! host drops messages whose `type` it does not recognize — the link
//! stays open either way.
//!
//! Compressed video frames are the one binary kind: raw bytes with no
//! envelope at all (see [`crate::frame`]). A receiver must branch on
//! the wire representation (text vs. binary) before looking at `type`.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::NetplayError;
use crate::slots::{PlayerSlot, SlotRequest, SlotSnapshot};

/// Stable participant identifier, supplied by the external session
/// system. Id 0 is reserved for system-originated messages.
pub type ParticipantId = u64;

/// Milliseconds since the Unix epoch; the timestamp base of every
/// message header and latency sample.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ── WirePayload ──────────────────────────────────────────────────

/// One unit of traffic on a link, in wire representation.
#[derive(Debug, Clone)]
pub enum WirePayload {
    /// A JSON-encoded [`ChannelMessage`].
    Text(String),
    /// A compressed frame (no envelope).
    Binary(Bytes),
}

// ── MessageKind ──────────────────────────────────────────────────

/// Wire discriminants of the text message kinds.
///
/// The numeric values are part of the wire format.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ChatText = 0,
    KeyDown = 1,
    KeyUp = 2,
    RoleOffer = 3,
    RoleAnswer = 4,
    /// Sent by clients; echoed verbatim by the host, so the echo *is*
    /// the pong. There is no separate pong discriminant.
    Ping = 5,
    PointerMove = 6,
}

impl TryFrom<u8> for MessageKind {
    type Error = NetplayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageKind::ChatText),
            1 => Ok(MessageKind::KeyDown),
            2 => Ok(MessageKind::KeyUp),
            3 => Ok(MessageKind::RoleOffer),
            4 => Ok(MessageKind::RoleAnswer),
            5 => Ok(MessageKind::Ping),
            6 => Ok(MessageKind::PointerMove),
            _ => Err(NetplayError::UnknownVariant {
                type_name: "MessageKind",
                value: value as u64,
            }),
        }
    }
}

// ── MessageMeta ──────────────────────────────────────────────────

/// The common header carried by every text message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageMeta {
    pub timestamp: u64,
    pub participant_id: ParticipantId,
    pub username: String,
    pub nickname: String,
}

impl MessageMeta {
    pub fn new(
        participant_id: ParticipantId,
        username: impl Into<String>,
        nickname: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: unix_millis(),
            participant_id,
            username: username.into(),
            nickname: nickname.into(),
        }
    }

    /// Zeroed header for system-originated messages (join/leave
    /// announcements and the like).
    pub fn system() -> Self {
        Self {
            timestamp: unix_millis(),
            ..Self::default()
        }
    }

    pub fn is_system(&self) -> bool {
        self.participant_id == 0
    }
}

// ── ChannelMessage ───────────────────────────────────────────────

/// A decoded text message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    ChatText {
        meta: MessageMeta,
        text: String,
    },
    KeyDown {
        meta: MessageMeta,
        button: u8,
        slot: PlayerSlot,
    },
    KeyUp {
        meta: MessageMeta,
        button: u8,
        slot: PlayerSlot,
    },
    RoleOffer {
        meta: MessageMeta,
        request: SlotRequest,
    },
    RoleAnswer {
        meta: MessageMeta,
        slots: SlotSnapshot,
    },
    Ping {
        meta: MessageMeta,
        /// The sender's previous round-trip measurement, if it has one.
        prev_latency_ms: Option<u64>,
    },
    PointerMove {
        meta: MessageMeta,
        x: f32,
        y: f32,
        dx: f32,
        dy: f32,
        slot: PlayerSlot,
    },
}

impl ChannelMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::ChatText { .. } => MessageKind::ChatText,
            Self::KeyDown { .. } => MessageKind::KeyDown,
            Self::KeyUp { .. } => MessageKind::KeyUp,
            Self::RoleOffer { .. } => MessageKind::RoleOffer,
            Self::RoleAnswer { .. } => MessageKind::RoleAnswer,
            Self::Ping { .. } => MessageKind::Ping,
            Self::PointerMove { .. } => MessageKind::PointerMove,
        }
    }

    pub fn meta(&self) -> &MessageMeta {
        match self {
            Self::ChatText { meta, .. }
            | Self::KeyDown { meta, .. }
            | Self::KeyUp { meta, .. }
            | Self::RoleOffer { meta, .. }
            | Self::RoleAnswer { meta, .. }
            | Self::Ping { meta, .. }
            | Self::PointerMove { meta, .. } => meta,
        }
    }

    /// Serialize to the JSON text envelope.
    pub fn encode(&self) -> Result<String, NetplayError> {
        Ok(serde_json::to_string(&RawMessage::from(self))?)
    }

    /// Parse a text envelope. Unknown `type` values and missing payload
    /// fields are reported as errors; callers drop the message and keep
    /// the link open.
    pub fn decode(text: &str) -> Result<Self, NetplayError> {
        let raw: RawMessage = serde_json::from_str(text)?;
        Self::try_from(raw)
    }
}

// ── RawMessage (wire form) ───────────────────────────────────────

/// The flat wire object. All payload fields are optional so that one
/// struct round-trips every kind and tolerates unknown extras.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    timestamp: u64,
    participant_id: ParticipantId,
    username: String,
    nickname: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    button: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    slot: Option<u8>,
    /// Role request: field absent = auto, `null` = release, a number =
    /// that slot. The wrapper keeps `null` distinguishable from absent.
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_as_some"
    )]
    requested_slot: Option<Option<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    roles: Option<SlotSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prev_latency: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dx: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dy: Option<f32>,
}

/// Deserialize a field that was present (even as `null`) to `Some`.
/// Combined with the container-level `default`, an absent field stays
/// `None`.
fn present_as_some<'de, D>(deserializer: D) -> Result<Option<Option<u8>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<u8>::deserialize(deserializer).map(Some)
}

impl From<&ChannelMessage> for RawMessage {
    fn from(msg: &ChannelMessage) -> Self {
        let meta = msg.meta();
        let mut raw = RawMessage {
            kind: msg.kind() as u8,
            timestamp: meta.timestamp,
            participant_id: meta.participant_id,
            username: meta.username.clone(),
            nickname: meta.nickname.clone(),
            ..Default::default()
        };
        match msg {
            ChannelMessage::ChatText { text, .. } => raw.text = Some(text.clone()),
            ChannelMessage::KeyDown { button, slot, .. }
            | ChannelMessage::KeyUp { button, slot, .. } => {
                raw.button = Some(*button);
                raw.slot = Some(*slot as u8);
            }
            ChannelMessage::RoleOffer { request, .. } => {
                raw.requested_slot = match request {
                    SlotRequest::Auto => None,
                    SlotRequest::Release => Some(None),
                    SlotRequest::Slot(slot) => Some(Some(*slot as u8)),
                };
            }
            ChannelMessage::RoleAnswer { slots, .. } => raw.roles = Some(slots.clone()),
            ChannelMessage::Ping {
                prev_latency_ms, ..
            } => raw.prev_latency = *prev_latency_ms,
            ChannelMessage::PointerMove {
                x, y, dx, dy, slot, ..
            } => {
                raw.x = Some(*x);
                raw.y = Some(*y);
                raw.dx = Some(*dx);
                raw.dy = Some(*dy);
                raw.slot = Some(*slot as u8);
            }
        }
        raw
    }
}

impl TryFrom<RawMessage> for ChannelMessage {
    type Error = NetplayError;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        let meta = MessageMeta {
            timestamp: raw.timestamp,
            participant_id: raw.participant_id,
            username: raw.username,
            nickname: raw.nickname,
        };
        let slot = match raw.slot {
            Some(value) => PlayerSlot::try_from(value)?,
            None => PlayerSlot::One,
        };

        Ok(match MessageKind::try_from(raw.kind)? {
            MessageKind::ChatText => ChannelMessage::ChatText {
                meta,
                text: raw
                    .text
                    .ok_or(NetplayError::ProtocolViolation("chat without text"))?,
            },
            MessageKind::KeyDown => ChannelMessage::KeyDown {
                meta,
                button: raw
                    .button
                    .ok_or(NetplayError::ProtocolViolation("key event without button"))?,
                slot,
            },
            MessageKind::KeyUp => ChannelMessage::KeyUp {
                meta,
                button: raw
                    .button
                    .ok_or(NetplayError::ProtocolViolation("key event without button"))?,
                slot,
            },
            MessageKind::RoleOffer => ChannelMessage::RoleOffer {
                meta,
                request: match raw.requested_slot {
                    None => SlotRequest::Auto,
                    Some(None) => SlotRequest::Release,
                    Some(Some(value)) => SlotRequest::Slot(PlayerSlot::try_from(value)?),
                },
            },
            MessageKind::RoleAnswer => ChannelMessage::RoleAnswer {
                meta,
                slots: raw
                    .roles
                    .ok_or(NetplayError::ProtocolViolation("role answer without roles"))?,
            },
            MessageKind::Ping => ChannelMessage::Ping {
                meta,
                prev_latency_ms: raw.prev_latency,
            },
            MessageKind::PointerMove => ChannelMessage::PointerMove {
                meta,
                x: raw
                    .x
                    .ok_or(NetplayError::ProtocolViolation("pointer move without x"))?,
                y: raw
                    .y
                    .ok_or(NetplayError::ProtocolViolation("pointer move without y"))?,
                dx: raw.dx.unwrap_or(0.0),
                dy: raw.dy.unwrap_or(0.0),
                slot,
            },
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
