//! File System Transcript Storage
//!
//! Information Hiding:
//! - File paths and JSON serialization format hidden from users
//! - Directory structure management hidden behind interface
//!
//! Files are stored as `{base_path}/{session_id}.json`.

use super::{validate_session_id, TranscriptStorage};
use crate::agents::messages::SessionReport;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub async fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .await
            .context("Failed to create storage directory")?;

        Ok(Self { base_path })
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        validate_session_id(session_id)?;
        Ok(self.base_path.join(format!("{}.json", session_id)))
    }
}

#[async_trait]
impl TranscriptStorage for FileSystemStorage {
    async fn save(&self, session_id: &str, report: &SessionReport) -> Result<()> {
        let path = self.session_path(session_id)?;
        let json =
            serde_json::to_string_pretty(report).context("Failed to serialize session report")?;

        fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write session file: {:?}", path))?;

        tracing::debug!(
            "[FileSystemStorage] Saved session '{}' to {:?}",
            session_id,
            path
        );
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<SessionReport>> {
        let path = self.session_path(session_id)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!("[FileSystemStorage] Session '{}' does not exist", session_id);
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read session file: {:?}", path))?;
        let report: SessionReport = serde_json::from_str(&json)
            .with_context(|| format!("Failed to deserialize session report: {:?}", path))?;

        Ok(Some(report))
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let path = self.session_path(session_id)?;

        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to delete session file: {:?}", path))?;
            tracing::debug!("[FileSystemStorage] Deleted session '{}'", session_id);
        }

        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<String>> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.base_path)
            .await
            .context("Failed to read storage directory")?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .context("Failed to read directory entry")?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(session_id) = path.file_stem().and_then(|s| s.to_str()) {
                    sessions.push(session_id.to_string());
                }
            }
        }

        sessions.sort();
        tracing::debug!("[FileSystemStorage] Listed {} sessions", sessions.len());
        Ok(sessions)
    }

    async fn exists(&self, session_id: &str) -> Result<bool> {
        let path = self.session_path(session_id)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }
}
