//! Transcript Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend details hidden behind the trait
//! - Session reports are stored whole, keyed by a caller-chosen session id
//! - Nothing is saved automatically; callers opt in via `Ensemble::save_transcript`

use crate::agents::messages::SessionReport;
use anyhow::Result;
use async_trait::async_trait;

pub mod filesystem;
pub mod memory;

pub use filesystem::FileSystemStorage;
pub use memory::InMemoryStorage;

/// Persistence for finished (or cancelled) session trails
#[async_trait]
pub trait TranscriptStorage: Send + Sync {
    async fn save(&self, session_id: &str, report: &SessionReport) -> Result<()>;

    /// `None` if the session was never saved
    async fn load(&self, session_id: &str) -> Result<Option<SessionReport>>;

    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Stored session ids, sorted
    async fn list_sessions(&self) -> Result<Vec<String>>;

    async fn exists(&self, session_id: &str) -> Result<bool> {
        Ok(self.load(session_id).await?.is_some())
    }
}

/// Session ids are used as file names, so keep them to a safe alphabet
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        anyhow::bail!("Invalid session id '{}': use letters, digits, '-' or '_'", session_id);
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("run-2024_01").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("../etc/passwd").is_err());
        assert!(validate_session_id("a b").is_err());
    }
}
