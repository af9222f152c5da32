//! HTTP plumbing towards the carrier. Fetches go to the content location
//! from the notification, uploads to the MMSC, both optionally through the
//! proxy configured on the active context. Payloads land in temporary
//! files; callers own their cleanup.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, info};

use crate::api::{AgentError, ProxyInfo, Transport};

const MMS_CONTENT_TYPE: &str = "application/vnd.wap.mms-message";
const HTTP_TIMEOUT: Duration = Duration::from_secs(180);

pub struct HttpTransport {
    timeout: Duration,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { timeout: HTTP_TIMEOUT }
    }

    fn client(&self, proxy: Option<&ProxyInfo>) -> Result<reqwest::Client, AgentError> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(format!("http://{}", proxy)).map_err(|e| AgentError::TransportError(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(|e| AgentError::TransportError(format!("cannot build HTTP client: {}", e)))
    }

    /// Saves a payload to an exclusively created scratch file and hands the
    /// path over to the caller, who owns its cleanup.
    async fn scratch_file(prefix: &str, body: &[u8]) -> Result<PathBuf, AgentError> {
        let file = tempfile::Builder::new().prefix(prefix).tempfile_in(std::env::temp_dir())?;
        tokio::fs::write(file.path(), body).await?;
        file.into_temp_path().keep().map_err(|e| AgentError::StorageError(e.error))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, proxy: Option<&ProxyInfo>) -> Result<PathBuf, AgentError> {
        info!(url, proxy = ?proxy, "fetching message");
        let response = self
            .client(proxy)?
            .get(url)
            .send()
            .await
            .map_err(|e| AgentError::TransportError(format!("cannot fetch {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| AgentError::TransportError(format!("fetch of {} rejected: {}", url, e)))?;
        let body = response.bytes().await.map_err(|e| AgentError::TransportError(format!("cannot read body of {}: {}", url, e)))?;

        let path = Self::scratch_file("mms-download-", &body).await?;
        debug!(path = %path.display(), bytes = body.len(), "message downloaded");
        Ok(path)
    }

    async fn upload(&self, path: &Path, mmsc: &str, proxy: Option<&ProxyInfo>) -> Result<PathBuf, AgentError> {
        info!(path = %path.display(), mmsc, proxy = ?proxy, "uploading message");
        let body = tokio::fs::read(path).await?;
        let response = self
            .client(proxy)?
            .post(mmsc)
            .header(reqwest::header::CONTENT_TYPE, MMS_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| AgentError::TransportError(format!("cannot upload to {}: {}", mmsc, e)))?
            .error_for_status()
            .map_err(|e| AgentError::TransportError(format!("upload to {} rejected: {}", mmsc, e)))?;
        let confirmation = response.bytes().await.map_err(|e| AgentError::TransportError(format!("cannot read upload response from {}: {}", mmsc, e)))?;

        Self::scratch_file("mms-upload-response-", &confirmation).await
    }
}
