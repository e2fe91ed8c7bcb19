use shared::{
    domain::{MessageId, ParticipantId, SenderKind},
    protocol::{WireMessage, WireMessageKind},
};

/// Number of leading characters of the text that participate in the
/// timestamp-based dedup key fallback.
const DEDUP_TEXT_PREFIX_CHARS: usize = 20;

/// Sender id slot used for system rows, which carry no sender.
const SYSTEM_SENDER_KEY: &str = "system";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: ParticipantId,
    pub kind: SenderKind,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    /// Synthesized locally and not yet observed in a server fetch. Covers
    /// optimistic send echoes and locally appended system notices.
    LocalPending,
    ServerConfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Chat {
        id: Option<MessageId>,
        sender: Sender,
        text: String,
        timestamp: String,
        origin: MessageOrigin,
    },
    System {
        id: Option<MessageId>,
        text: String,
        timestamp: String,
        origin: MessageOrigin,
    },
}

/// Composite identity used to collapse duplicate records seen across polls:
/// (variant tag, server message id when present, sender id). Messages
/// without a server id fall back to `{timestamp}_{first 20 chars of text}`,
/// which is also what a local echo must produce so the server-confirmed copy
/// absorbs it. Two id-less messages with identical truncated text inside one
/// timestamp grain still collide; server-assigned ids close that gap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    fn derive(tag: &str, id: Option<&MessageId>, timestamp: &str, text: &str, sender: &str) -> Self {
        let content = match id {
            Some(id) => id.as_str().to_string(),
            None => {
                let prefix: String = text.chars().take(DEDUP_TEXT_PREFIX_CHARS).collect();
                format!("{timestamp}_{prefix}")
            }
        };
        Self(format!("{tag}:{content}:{sender}"))
    }
}

impl Message {
    pub fn text(&self) -> &str {
        match self {
            Message::Chat { text, .. } | Message::System { text, .. } => text,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Message::Chat { timestamp, .. } | Message::System { timestamp, .. } => timestamp,
        }
    }

    pub fn sender(&self) -> Option<&Sender> {
        match self {
            Message::Chat { sender, .. } => Some(sender),
            Message::System { .. } => None,
        }
    }

    pub fn origin(&self) -> MessageOrigin {
        match self {
            Message::Chat { origin, .. } | Message::System { origin, .. } => *origin,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.origin() == MessageOrigin::LocalPending
    }

    pub(crate) fn confirm(&mut self) {
        match self {
            Message::Chat { origin, .. } | Message::System { origin, .. } => {
                *origin = MessageOrigin::ServerConfirmed;
            }
        }
    }

    pub fn dedup_key(&self) -> DedupKey {
        match self {
            Message::Chat {
                id,
                sender,
                text,
                timestamp,
                ..
            } => DedupKey::derive("chat", id.as_ref(), timestamp, text, sender.id.as_str()),
            Message::System {
                id,
                text,
                timestamp,
                ..
            } => DedupKey::derive("system", id.as_ref(), timestamp, text, SYSTEM_SENDER_KEY),
        }
    }

    /// Key this message would have without its server id. Only meaningful
    /// for id-bearing messages; used to reconcile optimistic echoes, which
    /// never have an id.
    pub fn fallback_key(&self) -> Option<DedupKey> {
        match self {
            Message::Chat {
                id: Some(_),
                sender,
                text,
                timestamp,
                ..
            } => Some(DedupKey::derive(
                "chat",
                None,
                timestamp,
                text,
                sender.id.as_str(),
            )),
            Message::System {
                id: Some(_),
                text,
                timestamp,
                ..
            } => Some(DedupKey::derive(
                "system",
                None,
                timestamp,
                text,
                SYSTEM_SENDER_KEY,
            )),
            _ => None,
        }
    }

    /// Normalizes a wire row into the tagged union. A chat row missing its
    /// sender cannot be attributed, so it degrades to a system row rather
    /// than leaking an optional sender into rendering code.
    pub fn from_wire(wire: WireMessage) -> Self {
        match (wire.kind, wire.sender) {
            (WireMessageKind::Chat, Some(sender)) => Message::Chat {
                id: wire.id,
                sender: Sender {
                    id: sender.id,
                    kind: sender.kind,
                    display_name: sender.name,
                },
                text: wire.message,
                timestamp: wire.timestamp,
                origin: MessageOrigin::ServerConfirmed,
            },
            (WireMessageKind::Chat, None) | (WireMessageKind::System, _) => Message::System {
                id: wire.id,
                text: wire.message,
                timestamp: wire.timestamp,
                origin: MessageOrigin::ServerConfirmed,
            },
        }
    }
}

/// Source of display timestamps for locally synthesized messages. The format
/// must match the server's display timestamps exactly, or echo dedup keys
/// will not line up with their confirmed copies.
pub trait Clock: Send + Sync {
    fn timestamp(&self) -> String;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn timestamp(&self) -> String {
        chrono::Local::now().format("%I:%M %p").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::WireSender;

    fn chat(id: Option<&str>, text: &str, timestamp: &str, sender: &str) -> Message {
        Message::Chat {
            id: id.map(MessageId::new),
            sender: Sender {
                id: ParticipantId::new(sender),
                kind: SenderKind::Player,
                display_name: sender.to_string(),
            },
            text: text.to_string(),
            timestamp: timestamp.to_string(),
            origin: MessageOrigin::ServerConfirmed,
        }
    }

    #[test]
    fn key_prefers_server_id() {
        let a = chat(Some("m1"), "hello", "10:02 AM", "p1");
        let b = chat(Some("m1"), "hello edited", "10:03 AM", "p1");
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn key_falls_back_to_timestamp_and_text_prefix() {
        let a = chat(None, "hello", "10:02 AM", "p1");
        let b = chat(None, "hello", "10:02 AM", "p1");
        let c = chat(None, "hello", "10:03 AM", "p1");
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn fallback_prefix_is_twenty_chars() {
        let a = chat(None, "aaaaaaaaaaaaaaaaaaaa-first", "10:02 AM", "p1");
        let b = chat(None, "aaaaaaaaaaaaaaaaaaaa-second", "10:02 AM", "p1");
        // Known collision window for id-less messages.
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn sender_distinguishes_otherwise_equal_keys() {
        let a = chat(None, "hello", "10:02 AM", "p1");
        let b = chat(None, "hello", "10:02 AM", "p2");
        assert_ne!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn fallback_key_matches_echo_key() {
        let confirmed = chat(Some("m7"), "hi", "10:02 AM", "p1");
        let echo = Message::Chat {
            id: None,
            sender: Sender {
                id: ParticipantId::new("p1"),
                kind: SenderKind::Player,
                display_name: "p1".to_string(),
            },
            text: "hi".to_string(),
            timestamp: "10:02 AM".to_string(),
            origin: MessageOrigin::LocalPending,
        };
        assert_eq!(confirmed.fallback_key(), Some(echo.dedup_key()));
    }

    #[test]
    fn chat_row_without_sender_normalizes_to_system() {
        let wire = WireMessage {
            kind: WireMessageKind::Chat,
            id: None,
            sender: None,
            message: "orphan".to_string(),
            timestamp: "10:02 AM".to_string(),
            is_muted: None,
        };
        assert!(matches!(Message::from_wire(wire), Message::System { .. }));
    }

    #[test]
    fn system_rows_share_the_system_sender_slot() {
        let wire = WireMessage {
            kind: WireMessageKind::System,
            id: None,
            sender: Some(WireSender {
                id: ParticipantId::new("p1"),
                kind: SenderKind::Player,
                name: "Asha".to_string(),
            }),
            message: "Asha joined".to_string(),
            timestamp: "10:02 AM".to_string(),
            is_muted: None,
        };
        let message = Message::from_wire(wire);
        assert!(message.sender().is_none());
        assert_eq!(message.text(), "Asha joined");
    }
}
