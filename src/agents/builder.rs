//! Agent Builder - fluent construction of agent definitions
//!
//! Information Hiding:
//! - Fills sensible defaults for name, role and prompt
//! - Keeps capability tags ordered and free of duplicates
//! - Exposes fluent builder interface

use crate::agents::registry::AgentDefinition;

/// Builder for `AgentDefinition`s
///
/// # Example
/// ```
/// use ensemble::AgentBuilder;
///
/// let agent = AgentBuilder::new("frontend")
///     .name("Frontend Developer")
///     .role("HTML, CSS and JavaScript")
///     .specialization_prompt("You are a senior frontend developer.")
///     .capability("html")
///     .capability("css")
///     .build();
///
/// assert_eq!(agent.capabilities, vec!["html", "css"]);
/// ```
pub struct AgentBuilder {
    id: String,
    name: Option<String>,
    role: Option<String>,
    icon: Option<String>,
    specialization_prompt: Option<String>,
    capabilities: Vec<String>,
}

impl AgentBuilder {
    /// Create a new builder for the given identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            role: None,
            icon: None,
            specialization_prompt: None,
            capabilities: Vec::new(),
        }
    }

    /// Display name, used as the speaker label in prompts
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Set the specialization prompt
    ///
    /// This text opens every prompt sent on behalf of the agent.
    pub fn specialization_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.specialization_prompt = Some(prompt.into());
        self
    }

    pub fn capability(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.capabilities.contains(&tag) {
            self.capabilities.push(tag);
        }
        self
    }

    pub fn capabilities<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            self = self.capability(tag);
        }
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn build(self) -> AgentDefinition {
        let name = self.name.unwrap_or_else(|| self.id.clone());
        let role = self
            .role
            .unwrap_or_else(|| format!("Specialized agent: {}", name));
        let specialization_prompt = self.specialization_prompt.unwrap_or_else(|| {
            format!(
                "You are a specialized agent named {}. Answer from the perspective of your role: {}.",
                name, role
            )
        });

        AgentDefinition {
            id: self.id,
            name,
            role,
            icon: self.icon,
            specialization_prompt,
            capabilities: self.capabilities,
        }
    }
}
