//! Append-only conversation log for one agent run

use serde::Serialize;

use crate::llm::ChatMessage;

use super::protocol::{OBSERVATION_CLOSE, OBSERVATION_OPEN};

/// Who produced an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Observation,
}

/// Identifies the tool call an observation answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTag {
    /// Tool name as the model wrote it
    pub tool: String,
    /// Model output (1-based) that issued the call
    pub turn: usize,
    /// Position of the call within that output
    pub index: usize,
}

/// One immutable conversation entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    call: Option<CallTag>,
}

impl Entry {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn call(&self) -> Option<&CallTag> {
        self.call.as_ref()
    }
}

/// Ordered log of everything said in a run.
///
/// Entries can only be appended. After the system/user seed, each assistant
/// output is followed by the observations it caused.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Conversation {
    entries: Vec<Entry>,
}

impl Conversation {
    /// Start a conversation with the system instruction and the task
    pub fn seeded(system: impl Into<String>, task: impl Into<String>) -> Self {
        let mut conversation = Self::default();
        conversation.push(Role::System, system.into(), None);
        conversation.push(Role::User, task.into(), None);
        conversation
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content.into(), None);
    }

    pub fn push_observation(&mut self, content: impl Into<String>, call: Option<CallTag>) {
        self.push(Role::Observation, content.into(), call);
    }

    fn push(&mut self, role: Role, content: String, call: Option<CallTag>) {
        self.entries.push(Entry {
            role,
            content,
            call,
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent model output
    pub fn last_assistant(&self) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.role == Role::Assistant)
            .map(Entry::content)
    }

    /// Messages for the model backend.
    ///
    /// Tagged observations go back wrapped in `<tool_response>`; untagged
    /// ones (controller notices) go back as plain text. Consecutive
    /// observations share one user message.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = Vec::with_capacity(self.entries.len());
        let mut previous = None;

        for entry in &self.entries {
            match entry.role {
                Role::System => messages.push(ChatMessage::system(entry.content.as_str())),
                Role::User => messages.push(ChatMessage::user(entry.content.as_str())),
                Role::Assistant => messages.push(ChatMessage::assistant(entry.content.as_str())),
                Role::Observation => {
                    let text = match entry.call {
                        Some(_) => format!(
                            "{}\n{}\n{}",
                            OBSERVATION_OPEN, entry.content, OBSERVATION_CLOSE
                        ),
                        None => entry.content.clone(),
                    };
                    if previous == Some(Role::Observation) {
                        if let Some(last) = messages.last_mut() {
                            last.content.push('\n');
                            last.content.push_str(&text);
                        }
                    } else {
                        messages.push(ChatMessage::user(text));
                    }
                }
            }
            previous = Some(entry.role);
        }

        messages
    }

    /// Characters the model would receive for this conversation
    pub fn input_chars(&self) -> usize {
        self.to_messages()
            .iter()
            .map(|m| m.content.chars().count())
            .sum()
    }
}

/// Cut `text` to at most `max_chars` characters, marking what was dropped
pub fn truncate_observation(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
    format!("{}\n...[truncated {} chars]", &text[..cut], total - max_chars)
}
