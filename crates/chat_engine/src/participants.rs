use shared::{
    domain::{ParticipantId, SenderKind},
    protocol::WireParticipant,
};

/// Text rendered in place of a muted sender's messages. The original text
/// stays in the store untouched; suppression happens at render time only.
pub const MUTED_PLACEHOLDER: &str = "[This user is muted]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub kind: SenderKind,
    pub is_online: bool,
    pub is_muted: bool,
}

impl From<WireParticipant> for Participant {
    fn from(wire: WireParticipant) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            kind: wire.kind,
            is_online: wire.is_online,
            is_muted: wire.is_muted,
        }
    }
}

/// Participant presence and mute state. Refreshed on mount and on manual
/// refresh only; the 5-second message poll never touches it.
#[derive(Default)]
pub struct ParticipantRoster {
    participants: Vec<Participant>,
}

impl ParticipantRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, participants: Vec<Participant>) {
        self.participants = participants;
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Render-time query. Unknown senders are not muted; a stale roster can
    /// lag a moderation action until the next refresh, by design.
    pub fn is_muted(&self, id: &ParticipantId) -> bool {
        self.get(id).is_some_and(|p| p.is_muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(id: &str, muted: bool) -> Participant {
        Participant {
            id: ParticipantId::new(id),
            name: id.to_string(),
            kind: SenderKind::Player,
            is_online: true,
            is_muted: muted,
        }
    }

    #[test]
    fn is_muted_follows_roster_state() {
        let mut roster = ParticipantRoster::new();
        roster.replace(vec![participant("p1", true), participant("p2", false)]);
        assert!(roster.is_muted(&ParticipantId::new("p1")));
        assert!(!roster.is_muted(&ParticipantId::new("p2")));
    }

    #[test]
    fn unknown_senders_are_not_muted() {
        let roster = ParticipantRoster::new();
        assert!(!roster.is_muted(&ParticipantId::new("ghost")));
    }

    #[test]
    fn replace_overwrites_previous_roster() {
        let mut roster = ParticipantRoster::new();
        roster.replace(vec![participant("p1", true)]);
        roster.replace(vec![participant("p1", false)]);
        assert!(!roster.is_muted(&ParticipantId::new("p1")));
    }
}
