//! Prompt templates for a moderated seminar

use crate::role::Role;
use crate::session::entities::Message;
use crate::topic::entities::Speech;

/// Display name used for the subject announcement that opens every history.
pub const ADMINISTRATOR_NAME: &str = "Seminar Administrator";

/// Templates for each framing a role can receive
pub struct SeminarPrompt;

impl SeminarPrompt {
    /// Attribute `content` to a speaker: `@<name>:<content>`.
    ///
    /// Used for every history entry, including a role's own just-completed
    /// turn, so the model can tell speakers apart from the text alone.
    pub fn format_speech(role_name: &str, content: &str) -> String {
        format!("@{}:{}", role_name, content)
    }

    /// First history message: the administrator announces the subject.
    pub fn subject_announcement(subject: &str) -> String {
        Self::format_speech(
            ADMINISTRATOR_NAME,
            &format!(
                "The subject of this seminar is --- {}. Moderator, please get ready!",
                subject
            ),
        )
    }

    /// Build the speech history for a fresh context.
    pub fn history(subject: &str, speeches: &[Speech]) -> Vec<Message> {
        let mut history = Vec::with_capacity(speeches.len() + 1);
        history.push(Message::user(Self::subject_announcement(subject)));
        history.extend(
            speeches
                .iter()
                .map(|s| Message::assistant(Self::format_speech(&s.role_name, &s.content))),
        );
        history
    }

    /// System framing for the moderator
    pub fn moderator_system(moderator: &Role, participant_names: &[String]) -> String {
        format!(
            r#"You are {role}. Your traits: {characteristic}.
You are taking part in a seminar with many roles.
The history of every role's speech has been rewritten for you in the format "@role name:what the role said".
You do not give your own opinion on the subject. Your job is to moderate: summarize the point made by the previous speaker.
If there is no previous speaker (you only see system instructions and the subject I set for this seminar), there is nothing to summarize; simply open the floor for the other participants.
You must end your turn by addressing, with "@", exactly one role you want to speak next, and that role must be one of the existing roles, for example: "Next, @someone, what would you like to say about this?".
Existing roles: {roles}.
Ignore any 'user' or 'assistant' markers in front of a speech and only care about the content inside the speech format.
Most importantly: your answer must never contain the speech-history format described above. Answer directly. This order must never be disobeyed!
You must not end the seminar on your own."#,
            role = moderator.name,
            characteristic = moderator.description,
            roles = participant_names.join(", "),
        )
    }

    /// System framing for a participant
    pub fn participant_system(participant: &Role, supporting_docs: &str) -> String {
        let mut prompt = format!(
            r#"You are {role}. Your traits: {characteristic}.
You are taking part in a seminar with many roles.
The history of every role's speech has been rewritten for you in the format "@role name:what the role said".
Your job is to speak on the subject. Along the way you may agree with or criticize what earlier roles (except the moderator) have said.
Ignore any 'user' or 'assistant' markers in front of a speech and only care about the content inside the speech format.
Your answer must never contain the speech-history format described above. Answer directly!
You must stay in character as {role} and never consider yourself to be another role."#,
            role = participant.name,
            characteristic = participant.description,
        );

        if !supporting_docs.trim().is_empty() {
            prompt.push_str("\n\nSupporting material you may draw on:\n");
            prompt.push_str(supporting_docs.trim_end());
        }

        prompt
    }

    /// System prompt for the auxiliary call that reads the moderator's
    /// closing remark and names the next speaker.
    pub fn designation_system() -> &'static str {
        r#"# Role: Speaker identification expert

You read what a seminar moderator said and identify the name of the next speaker.

## Rules
- Output only the identified speaker name, nothing else.
- The name is the text that follows an "@" symbol.
- If several "@" symbols appear, decide which one designates the next speaker.
- Do not change the spelling of the name. Do not add punctuation or explanations.
- Do not guess a speaker that is not explicitly designated.
- If there is no "@" designation at all, output nothing.

## Example
Input: Next, @Alice please share your view, and @Bob get ready
Output: Alice"#
    }
}
