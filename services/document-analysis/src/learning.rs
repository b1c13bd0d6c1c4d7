//! Correction Learning Store
//!
//! User corrections persisted to a JSON file and replayed into prompts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lexbid_models::UserCorrection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LearningData {
    #[serde(default)]
    pub user_corrections: Vec<UserCorrection>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LearningStore {
    path: PathBuf,
    // Serialises read-modify-write of the file.
    write_lock: Arc<Mutex<()>>,
}

impl LearningStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<LearningData> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LearningData::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read learning file {}", self.path.display()))
            }
        };

        serde_json::from_str(&raw).with_context(|| format!("Invalid learning file {}", self.path.display()))
    }

    /// Stored corrections, or none when the file cannot be read.
    pub async fn corrections(&self) -> Vec<UserCorrection> {
        match self.load().await {
            Ok(data) => data.user_corrections,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable learning file");
                Vec::new()
            }
        }
    }

    /// Append a correction and return how many are stored.
    pub async fn record(&self, correction: UserCorrection) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut data = self.load().await?;
        data.user_corrections.push(correction);
        data.last_updated = Some(Utc::now());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(&data)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write learning file {}", self.path.display()))?;

        Ok(data.user_corrections.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store() -> LearningStore {
        let dir = std::env::temp_dir().join(format!("lexbid-learning-{}", Uuid::new_v4()));
        LearningStore::new(dir.join("ai_learning.json"))
    }

    fn correction(original: &str, corrected: &str) -> UserCorrection {
        UserCorrection {
            document_id: Some(Uuid::new_v4()),
            original_classification: original.to_string(),
            user_correction: corrected.to_string(),
            specific_correction: None,
            note: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let store = temp_store();
        let data = store.load().await.unwrap();
        assert!(data.user_corrections.is_empty());
        assert!(data.last_updated.is_none());
    }

    #[tokio::test]
    async fn test_record_appends() {
        let store = temp_store();
        assert_eq!(store.record(correction("lawyer_certificate", "qualification_certificate")).await.unwrap(), 1);
        assert_eq!(store.record(correction("other", "award_certificate")).await.unwrap(), 2);

        let data = store.load().await.unwrap();
        assert_eq!(data.user_corrections.len(), 2);
        assert_eq!(data.user_corrections[1].user_correction, "award_certificate");
        assert!(data.last_updated.is_some());

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(raw.contains("\"user_corrections\""));

        let _ = tokio::fs::remove_dir_all(store.path().parent().unwrap()).await;
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let store = temp_store();
        tokio::fs::create_dir_all(store.path().parent().unwrap()).await.unwrap();
        tokio::fs::write(store.path(), "not json").await.unwrap();

        assert!(store.load().await.is_err());
        assert!(store.corrections().await.is_empty());

        let _ = tokio::fs::remove_dir_all(store.path().parent().unwrap()).await;
    }
}
