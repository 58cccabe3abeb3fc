//! Prompt construction
//!
//! Order is fixed: specialization prompt, context block (code, open files,
//! errors), the trailing history window, then the new user message. Sections
//! whose source data is absent or empty are left out entirely.

use crate::agents::registry::{AgentDefinition, ConversationTurn, TurnRole};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_WINDOW: usize = 5;

/// Caller-supplied context used to enrich prompts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl TaskContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_open_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.open_files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors = Some(errors.into_iter().map(Into::into).collect());
        self
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.is_empty())
    }

    fn open_files(&self) -> Option<&[String]> {
        self.open_files.as_deref().filter(|f| !f.is_empty())
    }

    fn errors(&self) -> Option<&[String]> {
        self.errors.as_deref().filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    history_window: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl PromptBuilder {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Compose the full prompt for one call
    ///
    /// `history` may be longer than the window; only its tail is rendered.
    pub fn build(
        &self,
        agent: &AgentDefinition,
        history: &[ConversationTurn],
        message: &str,
        context: &TaskContext,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(&agent.specialization_prompt);
        prompt.push_str("\n\n");

        if let Some(code) = context.code() {
            prompt.push_str(&format!("Current code:\n```\n{}\n```\n\n", code));
        }

        if let Some(files) = context.open_files() {
            prompt.push_str(&format!("Open files:\n{}\n\n", files.join(", ")));
        }

        if let Some(errors) = context.errors() {
            prompt.push_str(&format!("Errors:\n{}\n\n", errors.join("\n")));
        }

        let start = history.len().saturating_sub(self.history_window);
        let recent = &history[start..];
        if !recent.is_empty() {
            prompt.push_str("Conversation history:\n");
            for turn in recent {
                let speaker = match turn.role {
                    TurnRole::User => "User",
                    TurnRole::Agent => agent.name.as_str(),
                };
                prompt.push_str(&format!("{}: {}\n", speaker, turn.content));
            }
            prompt.push('\n');
        }

        prompt.push_str(&format!("User: {}\n\n{}:", message, agent.name));
        prompt
    }
}
