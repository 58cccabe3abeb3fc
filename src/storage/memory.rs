//! In-Memory Transcript Storage
//!
//! Information Hiding:
//! - HashMap storage structure hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Suitable for testing and ephemeral sessions

use super::TranscriptStorage;
use crate::agents::messages::SessionReport;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Data is lost when the process terminates
#[derive(Default)]
pub struct InMemoryStorage {
    sessions: Arc<RwLock<HashMap<String, SessionReport>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStorage for InMemoryStorage {
    async fn save(&self, session_id: &str, report: &SessionReport) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), report.clone());
        tracing::debug!(
            "[InMemoryStorage] Saved {} phases for session '{}'",
            report.phases.len(),
            session_id
        );
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionReport>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        tracing::debug!("[InMemoryStorage] Deleted session '{}'", session_id);
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let sessions = self.sessions.read().await;
        let mut ids: Vec<String> = sessions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn exists(&self, session_id: &str) -> Result<bool> {
        let sessions = self.sessions.read().await;
        Ok(sessions.contains_key(session_id))
    }
}
