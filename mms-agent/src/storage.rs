//! Filesystem store for in-flight messages. Every message owns a state
//! record and at most one payload file under the base directory, all named
//! by its UUID.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{AgentError, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageState {
    Notification,
    Downloaded,
    Retrieved,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    state: MessageState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_location: Option<String>,
}

pub struct FsStorage {
    base_dir: PathBuf,
}

impl FsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn state_path(&self, uuid: &str) -> PathBuf {
        self.base_dir.join(format!("{}.status", uuid))
    }

    fn payload_path(&self, uuid: &str) -> PathBuf {
        self.base_dir.join(format!("{}.m-retrieve.conf", uuid))
    }

    async fn write_state(&self, uuid: &str, record: &StateRecord) -> Result<(), AgentError> {
        let encoded = serde_json::to_vec_pretty(record).map_err(|e| AgentError::ServiceError(format!("cannot serialize state for {}: {}", uuid, e)))?;
        tokio::fs::write(self.state_path(uuid), encoded).await?;
        Ok(())
    }

    async fn read_state(&self, uuid: &str) -> Result<StateRecord, AgentError> {
        let raw = tokio::fs::read(self.state_path(uuid)).await?;
        serde_json::from_slice(&raw).map_err(|e| AgentError::ServiceError(format!("cannot parse state for {}: {}", uuid, e)))
    }

    pub async fn destroy(&self, uuid: &str) -> Result<(), AgentError> {
        let _ = tokio::fs::remove_file(self.payload_path(uuid)).await;
        tokio::fs::remove_file(self.state_path(uuid)).await?;
        Ok(())
    }
}

impl Storage for FsStorage {
    async fn create(&self, uuid: &str, content_location: &str) -> Result<(), AgentError> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        debug!(uuid, content_location, "tracking notification");
        self.write_state(
            uuid,
            &StateRecord {
                state: MessageState::Notification,
                content_location: Some(content_location.to_string()),
            },
        )
        .await
    }

    /// Takes ownership of the downloaded file, moving it next to the state
    /// record.
    async fn update_downloaded(&self, uuid: &str, path: &Path) -> Result<(), AgentError> {
        let mut record = self.read_state(uuid).await?;
        let payload = self.payload_path(uuid);
        if tokio::fs::rename(path, &payload).await.is_err() {
            // The download may sit on another filesystem.
            tokio::fs::copy(path, &payload).await?;
            tokio::fs::remove_file(path).await?;
        }
        record.state = MessageState::Downloaded;
        self.write_state(uuid, &record).await
    }

    async fn update_retrieved(&self, uuid: &str) -> Result<(), AgentError> {
        let mut record = self.read_state(uuid).await?;
        record.state = MessageState::Retrieved;
        self.write_state(uuid, &record).await
    }

    async fn get_mms(&self, uuid: &str) -> Result<PathBuf, AgentError> {
        let payload = self.payload_path(uuid);
        tokio::fs::metadata(&payload).await?;
        Ok(payload)
    }

    async fn create_response_file(&self, uuid: &str) -> Result<PathBuf, AgentError> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        Ok(self.base_dir.join(format!("{}.m-notifyresp.ind", uuid)))
    }

    async fn create_send_file(&self, uuid: &str) -> Result<PathBuf, AgentError> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        Ok(self.base_dir.join(format!("{}.m-send.req", uuid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_tracks_a_message_through_its_states() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let storage = FsStorage::new(dir.path().join("mms"));

        storage.create("00aa", "http://mmsc.operator/abc").await?;
        assert!(storage.get_mms("00aa").await.is_err());

        let download = dir.path().join("download.tmp");
        tokio::fs::write(&download, b"payload").await?;
        storage.update_downloaded("00aa", &download).await?;
        assert!(!download.exists());

        let payload = storage.get_mms("00aa").await?;
        assert_eq!(tokio::fs::read(&payload).await?, b"payload");

        storage.update_retrieved("00aa").await?;
        let record = storage.read_state("00aa").await?;
        assert_eq!(record.state, MessageState::Retrieved);
        assert_eq!(record.content_location.as_deref(), Some("http://mmsc.operator/abc"));

        storage.destroy("00aa").await?;
        assert!(storage.get_mms("00aa").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn it_refuses_updates_for_unknown_uuids() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let storage = FsStorage::new(dir.path());
        assert!(storage.update_retrieved("unknown").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn it_names_outgoing_files_by_uuid_and_kind() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let storage = FsStorage::new(dir.path());
        let response = storage.create_response_file("00bb").await?;
        let send = storage.create_send_file("00bb").await?;
        assert!(response.ends_with("00bb.m-notifyresp.ind"));
        assert!(send.ends_with("00bb.m-send.req"));
        Ok(())
    }
}
