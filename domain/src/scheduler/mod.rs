//! Turn-taking state machine.
//!
//! [`RoleScheduler`] decides who speaks after each completed turn and builds
//! the exact message sequence handed to that speaker's model.
//!
//! # Transitions
//!
//! | From | Next speaker | To |
//! |------|--------------|----|
//! | `Unknown` (no prior speech) | moderator | `Moderator` |
//! | `Moderator` | the participant designated in the moderator's closing remark | `Participant` |
//! | `Participant` | moderator, unconditionally | `Moderator` |
//!
//! Participants never address each other directly: every hand-over goes
//! through the moderator, so each moderator turn designates exactly one name.
//!
//! The designation itself is extracted by an auxiliary model call that lives
//! outside the domain; [`RoleScheduler::advance`] only receives its result.
//!
//! The scheduler stores the current speaker as a tagged value and derives
//! [`SchedulerState`] from it, so state and speaker cannot disagree.

use crate::core::error::DomainError;
use crate::prompt::SeminarPrompt;
use crate::role::Role;
use crate::session::entities::Message;
use crate::topic::entities::Speech;
use std::collections::HashMap;

/// Role-kind state of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    Unknown,
    Moderator,
    Participant,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerState::Unknown => "unknown",
            SchedulerState::Moderator => "moderator",
            SchedulerState::Participant => "participant",
        }
    }
}

impl std::fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    Nobody,
    Moderator,
    Participant(usize),
}

/// Per-run turn scheduler for one topic.
#[derive(Debug, Clone)]
pub struct RoleScheduler {
    topic_id: String,
    moderator: Role,
    participants: Vec<Role>,
    by_name: HashMap<String, usize>,
    speaker: Speaker,
}

impl RoleScheduler {
    /// Create a scheduler in the `Unknown` state.
    pub fn new(
        topic_id: impl Into<String>,
        moderator: Role,
        participants: Vec<Role>,
    ) -> Result<Self, DomainError> {
        if participants.is_empty() {
            return Err(DomainError::NoParticipants);
        }

        let mut by_name = HashMap::with_capacity(participants.len());
        for (index, participant) in participants.iter().enumerate() {
            by_name.entry(participant.name.clone()).or_insert(index);
        }

        Ok(Self {
            topic_id: topic_id.into(),
            moderator,
            participants,
            by_name,
            speaker: Speaker::Nobody,
        })
    }

    /// Position the scheduler on the author of `last`, as if that turn had
    /// just been taken. Speeches by roles no longer in the roster leave the
    /// scheduler in `Unknown`, whose successor is the moderator as well.
    pub fn resume_after(mut self, last: Option<&Speech>) -> Self {
        self.speaker = match last {
            None => Speaker::Nobody,
            Some(speech) if speech.role_id == self.moderator.id => Speaker::Moderator,
            Some(speech) => self
                .participants
                .iter()
                .position(|p| p.id == speech.role_id)
                .or_else(|| self.by_name.get(&speech.role_name).copied())
                .map(Speaker::Participant)
                .unwrap_or(Speaker::Nobody),
        };
        self
    }

    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    pub fn state(&self) -> SchedulerState {
        match self.speaker {
            Speaker::Nobody => SchedulerState::Unknown,
            Speaker::Moderator => SchedulerState::Moderator,
            Speaker::Participant(_) => SchedulerState::Participant,
        }
    }

    /// The role currently holding the floor, if any.
    pub fn current(&self) -> Option<&Role> {
        match self.speaker {
            Speaker::Nobody => None,
            Speaker::Moderator => Some(&self.moderator),
            Speaker::Participant(index) => self.participants.get(index),
        }
    }

    pub fn moderator(&self) -> &Role {
        &self.moderator
    }

    pub fn participants(&self) -> &[Role] {
        &self.participants
    }

    pub fn participant_names(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.name.clone()).collect()
    }

    /// Whether the next transition depends on a designation extracted from
    /// the last turn's text (true only after a moderator turn).
    pub fn needs_designation(&self) -> bool {
        self.state() == SchedulerState::Moderator
    }

    /// Resolve a designated name to a participant.
    pub fn resolve(&self, designated: &str) -> Option<&Role> {
        let name = designated.trim();
        let name = name.strip_prefix('@').unwrap_or(name).trim();
        self.by_name
            .get(name)
            .and_then(|&index| self.participants.get(index))
    }

    /// Move to the next speaker.
    ///
    /// `designated` is only consulted from the `Moderator` state; an absent
    /// or unresolvable name fails with [`DomainError::UnknownRole`] and
    /// leaves the scheduler untouched.
    pub fn advance(&mut self, designated: Option<&str>) -> Result<&Role, DomainError> {
        let next = match self.speaker {
            Speaker::Nobody | Speaker::Participant(_) => Speaker::Moderator,
            Speaker::Moderator => {
                let name = designated.unwrap_or_default();
                let trimmed = name.trim();
                let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();
                match self.by_name.get(trimmed) {
                    Some(&index) => Speaker::Participant(index),
                    None => return Err(DomainError::UnknownRole(name.trim().to_string())),
                }
            }
        };

        self.speaker = next;
        self.current()
            .ok_or_else(|| DomainError::UnknownRole(String::new()))
    }

    /// Build the full message sequence for the current speaker: its system
    /// framing followed by `history`.
    ///
    /// Deterministic: equal histories and scheduler state produce equal
    /// output.
    pub fn build_messages(
        &self,
        history: &[Message],
        supporting_docs: &str,
    ) -> Result<Vec<Message>, DomainError> {
        let system = match self.speaker {
            Speaker::Nobody => return Err(DomainError::NoCurrentSpeaker),
            Speaker::Moderator => {
                SeminarPrompt::moderator_system(&self.moderator, &self.participant_names())
            }
            Speaker::Participant(index) => {
                let participant = self
                    .participants
                    .get(index)
                    .ok_or(DomainError::NoCurrentSpeaker)?;
                SeminarPrompt::participant_system(participant, supporting_docs)
            }
        };

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system));
        messages.extend_from_slice(history);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::{ModelSelector, RoleKind};
    use crate::session::entities::MessageRole;

    fn scheduler() -> RoleScheduler {
        let moderator = Role::moderator("m", "Mod", ModelSelector::new("x"));
        let participants = vec![
            Role::participant("a", "Alice", ModelSelector::new("x")),
            Role::participant("b", "Bob", ModelSelector::new("x")),
        ];
        RoleScheduler::new("t1", moderator, participants).unwrap()
    }

    #[test]
    fn test_fresh_scheduler_yields_moderator() {
        let mut s = scheduler();
        assert_eq!(s.state(), SchedulerState::Unknown);
        assert!(s.current().is_none());

        let next = s.advance(None).unwrap();
        assert_eq!(next.name, "Mod");
        assert_eq!(s.state(), SchedulerState::Moderator);
    }

    #[test]
    fn test_moderator_designation_selects_participant() {
        let mut s = scheduler();
        s.advance(None).unwrap();

        let next = s.advance(Some("Bob")).unwrap();
        assert_eq!(next.id, "b");
        assert_eq!(s.state(), SchedulerState::Participant);
        assert_eq!(s.current().unwrap().kind, RoleKind::Participant);
    }

    #[test]
    fn test_designation_tolerates_at_sign_and_whitespace() {
        let mut s = scheduler();
        s.advance(None).unwrap();
        assert_eq!(s.advance(Some("  @Alice\n")).unwrap().name, "Alice");
    }

    #[test]
    fn test_unknown_designation_leaves_state_unchanged() {
        let mut s = scheduler();
        s.advance(None).unwrap();

        let err = s.advance(Some("Carol")).unwrap_err();
        assert_eq!(err, DomainError::UnknownRole("Carol".to_string()));
        assert_eq!(s.state(), SchedulerState::Moderator);
        assert_eq!(s.current().unwrap().name, "Mod");

        assert!(s.advance(None).unwrap_err().is_unknown_role());
        assert!(s.advance(Some("")).unwrap_err().is_unknown_role());
    }

    #[test]
    fn test_participant_always_hands_back_to_moderator() {
        let mut s = scheduler();
        s.advance(None).unwrap();
        s.advance(Some("Alice")).unwrap();

        // Content is irrelevant from the participant state
        let next = s.advance(Some("Bob")).unwrap();
        assert_eq!(next.name, "Mod");
        assert_eq!(s.state(), SchedulerState::Moderator);
    }

    #[test]
    fn test_kinds_alternate() {
        let mut s = scheduler();
        let mut kinds = Vec::new();
        for turn in 0..10 {
            let designation = if turn % 4 == 1 { "Alice" } else { "Bob" };
            let role = s.advance(Some(designation)).unwrap();
            kinds.push(role.kind);
        }
        for pair in kinds.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert_eq!(kinds[0], RoleKind::Moderator);
    }

    #[test]
    fn test_resume_after_history() {
        let moderator_speech = Speech::new("t1", "m", "Mod", "@Alice?");
        let s = scheduler().resume_after(Some(&moderator_speech));
        assert_eq!(s.state(), SchedulerState::Moderator);

        let alice_speech = Speech::new("t1", "a", "Alice", "Hello");
        let s = scheduler().resume_after(Some(&alice_speech));
        assert_eq!(s.state(), SchedulerState::Participant);
        assert_eq!(s.current().unwrap().name, "Alice");

        let stranger = Speech::new("t1", "zz", "Zed", "Hi");
        let s = scheduler().resume_after(Some(&stranger));
        assert_eq!(s.state(), SchedulerState::Unknown);

        let s = scheduler().resume_after(None);
        assert_eq!(s.state(), SchedulerState::Unknown);
    }

    #[test]
    fn test_build_messages_requires_speaker() {
        let s = scheduler();
        assert_eq!(
            s.build_messages(&[], "").unwrap_err(),
            DomainError::NoCurrentSpeaker
        );
    }

    #[test]
    fn test_build_messages_uses_state_framing() {
        let mut s = scheduler();
        let history = SeminarPrompt::history("Free will", &[]);

        s.advance(None).unwrap();
        let messages = s.build_messages(&history, "doc").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert!(messages[0].content.contains("Existing roles: Alice, Bob."));
        assert!(!messages[0].content.contains("doc"));
        assert_eq!(messages[1], history[0]);

        s.advance(Some("Alice")).unwrap();
        let messages = s.build_messages(&history, "doc").unwrap();
        assert!(messages[0].content.contains("You are Alice"));
        assert!(messages[0].content.contains("doc"));
    }

    #[test]
    fn test_build_messages_is_deterministic() {
        let mut s = scheduler();
        s.advance(None).unwrap();
        let history = SeminarPrompt::history("Free will", &[]);
        assert_eq!(
            s.build_messages(&history, "").unwrap(),
            s.build_messages(&history, "").unwrap()
        );
    }

    #[test]
    fn test_requires_participants() {
        let moderator = Role::moderator("m", "Mod", ModelSelector::new("x"));
        assert_eq!(
            RoleScheduler::new("t", moderator, vec![]).unwrap_err(),
            DomainError::NoParticipants
        );
    }
}
