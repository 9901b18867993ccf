//! Console viewer for a topic's live token stream.

use colored::Colorize;
use seminar_application::Subscription;
use seminar_domain::{ContentType, RoleKind, TokenMessage};
use std::io::Write;

/// Renders token messages as a readable transcript.
///
/// A header is printed whenever the speaking role changes; reasoning
/// fragments are dimmed.
pub struct ConsoleViewer {
    show_reasoning: bool,
    current: Option<(String, ContentType)>,
}

impl ConsoleViewer {
    pub fn new() -> Self {
        Self {
            show_reasoning: true,
            current: None,
        }
    }

    pub fn with_reasoning(mut self, show: bool) -> Self {
        self.show_reasoning = show;
        self
    }

    /// Text to print for `message`, including any header or separator.
    pub fn render(&mut self, message: &TokenMessage) -> String {
        if message.is_end() {
            self.current = None;
            return "\n".to_string();
        }
        if message.content_type == ContentType::Reasoning && !self.show_reasoning {
            return String::new();
        }

        let mut out = String::new();
        match &self.current {
            Some((role_id, kind)) if *role_id == message.role_id => {
                if *kind != message.content_type {
                    out.push('\n');
                }
            }
            _ => {
                out.push_str("\n\n");
                out.push_str(&header(message));
                out.push('\n');
            }
        }
        self.current = Some((message.role_id.clone(), message.content_type));

        match message.content_type {
            ContentType::Reasoning => out.push_str(&message.content.dimmed().italic().to_string()),
            _ => out.push_str(&message.content),
        }
        out
    }

    /// Print a subscription until its run ends or the subscription closes.
    pub async fn watch(mut self, mut subscription: Subscription) {
        let mut stdout = std::io::stdout();
        while let Some(message) = subscription.recv().await {
            let text = self.render(&message);
            if !text.is_empty() {
                let _ = write!(stdout, "{}", text);
                let _ = stdout.flush();
            }
            if message.is_end() {
                break;
            }
        }
    }
}

impl Default for ConsoleViewer {
    fn default() -> Self {
        Self::new()
    }
}

fn header(message: &TokenMessage) -> String {
    let name = if message.role_name.is_empty() {
        &message.role_id
    } else {
        &message.role_name
    };
    match message.role_kind {
        Some(RoleKind::Moderator) => format!("[{}] (moderator)", name).bold().cyan().to_string(),
        _ => format!("[{}]", name).bold().green().to_string(),
    }
}
