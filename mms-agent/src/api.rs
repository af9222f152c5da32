use std::{
    future::Future,
    path::{Path, PathBuf},
};

use strum::IntoStaticStr;
use thiserror::Error;
use tokio::sync::mpsc;

use mms_codec::{MRetrieveConf, MmsError};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Context Error - {}", .0)]
    ContextError(String),

    #[error("Transport Error - {}", .0)]
    TransportError(String),

    #[error("Storage Error: {:?}", .0)]
    StorageError(#[from] std::io::Error),

    #[error("Response Error - {}", .0)]
    ResponseError(String),

    #[error("Messaging Service Error - {}", .0)]
    ServiceError(String),

    #[error("Codec Error - {}", .0)]
    CodecError(#[from] MmsError),
}

/// Failures reported by the modem bus. The first four kinds are worth
/// retrying a context activation for after a short delay; anything else
/// fails the candidate immediately.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("operation in progress")]
    InProgress,

    #[error("attach in progress")]
    AttachInProgress,

    #[error("not attached")]
    NotAttached,

    #[error("operation failed")]
    Failed,

    #[error("{}", .0)]
    Other(String),
}

impl BusError {
    /// A failed activation may succeed on retry once the modem settles.
    /// `Failed` is included: it can be a network hiccup, and the delay only
    /// costs time the first time the APN list is walked.
    pub fn needs_wait(&self) -> bool {
        matches!(self, BusError::InProgress | BusError::AttachInProgress | BusError::NotAttached | BusError::Failed)
    }
}

/// Message states reported to the messaging service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum MessageStatus {
    Sent,
    TransientError,
    PermanentError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextType {
    Internet,
    Mms,
    Other,
}

/// One entry of the modem's connection-context table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInfo {
    pub object_path: String,
    pub context_type: ContextType,
    pub active: bool,
    pub preferred: bool,
    pub message_center: String,
    pub message_proxy: String,
    pub name: String,
}

impl ContextInfo {
    /// MMS capable: a dedicated mms context, or an internet context that
    /// names a message center.
    pub fn qualifies(&self) -> bool {
        match self.context_type {
            ContextType::Mms => true,
            ContextType::Internet => !self.message_center.is_empty(),
            ContextType::Other => false,
        }
    }

    pub fn message_center(&self) -> Result<&str, AgentError> {
        if self.message_center.is_empty() {
            return Err(AgentError::ContextError("context setting for the message center value is empty".to_string()));
        }
        Ok(&self.message_center)
    }

    /// The proxy configured on the context, when there is one. Empty means a
    /// direct connection.
    pub fn proxy(&self) -> Result<Option<ProxyInfo>, AgentError> {
        ProxyInfo::parse(&self.message_proxy)
    }
}

/// Carrier proxy endpoint: `host:port`, port defaulting to 80.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyInfo {
    pub host: String,
    pub port: u16,
}

impl ProxyInfo {
    pub fn parse(proxy: &str) -> Result<Option<ProxyInfo>, AgentError> {
        if proxy.is_empty() {
            return Ok(None);
        }
        let proxy = proxy.strip_prefix("http://").unwrap_or(proxy);
        match proxy.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| AgentError::ContextError(format!("cannot parse proxy port in {}", proxy)))?;
                Ok(Some(ProxyInfo { host: host.to_string(), port }))
            }
            None => Ok(Some(ProxyInfo { host: proxy.to_string(), port: 80 })),
        }
    }
}

impl std::fmt::Display for ProxyInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A context handed out by an activation, remembering whether this agent
/// switched it on. Contexts that were already active stay up on
/// deactivation.
#[derive(Debug, Clone)]
pub struct ActivatedContext {
    pub info: ContextInfo,
    pub(crate) was_active: bool,
}

/// One attachment of an outgoing message, by reference to a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentSpec {
    pub id: String,
    pub content_type: String,
    pub file_path: PathBuf,
}

/// A send request handed over by the messaging service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub recipients: Vec<String>,
    pub attachments: Vec<AttachmentSpec>,
    /// Opaque handle echoed back through `reply_send_message`.
    pub reply: String,
}

/// Property and context operations of the modem bus, plus the push agent
/// registration hooks.
pub trait ModemBus: Send + Sync + 'static {
    fn set_powered_for_mms(&self, powered: bool) -> impl Future<Output = Result<(), BusError>> + Send;
    fn attached(&self) -> impl Future<Output = Result<bool, BusError>> + Send;
    /// Subscribes to Attached property changes. Subscribing happens before
    /// the initial read so no transition is lost.
    fn watch_attached(&self) -> impl Future<Output = Result<mpsc::Receiver<bool>, BusError>> + Send;
    fn contexts(&self) -> impl Future<Output = Result<Vec<ContextInfo>, BusError>> + Send;
    fn set_context_active(&self, object_path: &str, active: bool) -> impl Future<Output = Result<(), BusError>> + Send;
    fn set_context_preferred(&self, object_path: &str) -> impl Future<Output = Result<(), BusError>> + Send;
    fn register_push_agent(&self) -> impl Future<Output = Result<(), BusError>> + Send;
    fn unregister_push_agent(&self) -> impl Future<Output = Result<(), BusError>> + Send;
}

/// Registry of per-SIM messaging services.
pub trait MessagingManager: Send + Sync + 'static {
    type Service: MessagingService;

    fn add_service(
        &self,
        identity: &str,
        modem_path: &str,
        outgoing: mpsc::Sender<OutgoingMessage>,
        use_delivery_reports: bool,
    ) -> impl Future<Output = Result<Self::Service, AgentError>> + Send;
    fn remove_service(&self, identity: &str) -> impl Future<Output = Result<(), AgentError>> + Send;
    /// Consulted once per push; implementations default to true when the
    /// user-accounts query fails.
    fn mms_enabled(&self) -> impl Future<Output = bool> + Send;
}

/// The per-SIM messaging service handle.
pub trait MessagingService: Clone + Send + Sync + 'static {
    fn preferred_context(&self) -> impl Future<Output = Result<String, AgentError>> + Send;
    fn set_preferred_context(&self, object_path: &str) -> impl Future<Output = Result<(), AgentError>> + Send;
    fn incoming_message_added(&self, message: &MRetrieveConf) -> impl Future<Output = Result<(), AgentError>> + Send;
    /// Acknowledges a send request with the UUID assigned to it.
    fn reply_send_message(&self, reply: &str, uuid: &str) -> impl Future<Output = Result<(), AgentError>> + Send;
    fn message_status_changed(&self, uuid: &str, status: MessageStatus) -> impl Future<Output = Result<(), AgentError>> + Send;
    fn message_destroy(&self, uuid: &str) -> impl Future<Output = Result<(), AgentError>> + Send;
}

/// UUID keyed payload store.
pub trait Storage: Send + Sync + 'static {
    fn create(&self, uuid: &str, content_location: &str) -> impl Future<Output = Result<(), AgentError>> + Send;
    fn update_downloaded(&self, uuid: &str, path: &Path) -> impl Future<Output = Result<(), AgentError>> + Send;
    fn update_retrieved(&self, uuid: &str) -> impl Future<Output = Result<(), AgentError>> + Send;
    fn get_mms(&self, uuid: &str) -> impl Future<Output = Result<PathBuf, AgentError>> + Send;
    fn create_response_file(&self, uuid: &str) -> impl Future<Output = Result<PathBuf, AgentError>> + Send;
    fn create_send_file(&self, uuid: &str) -> impl Future<Output = Result<PathBuf, AgentError>> + Send;
}

/// HTTP plumbing towards the carrier, through an optional proxy. Both
/// operations hand back the path of a local file holding the response.
pub trait Transport: Send + Sync + 'static {
    fn fetch(&self, url: &str, proxy: Option<&ProxyInfo>) -> impl Future<Output = Result<PathBuf, AgentError>> + Send;
    fn upload(&self, path: &Path, mmsc: &str, proxy: Option<&ProxyInfo>) -> impl Future<Output = Result<PathBuf, AgentError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_serializes_message_statuses() {
        assert_eq!(<&'static str>::from(MessageStatus::Sent), "sent");
        assert_eq!(<&'static str>::from(MessageStatus::TransientError), "transient-error");
        assert_eq!(<&'static str>::from(MessageStatus::PermanentError), "permanent-error");
    }

    #[test]
    fn it_parses_proxy_values() -> Result<(), anyhow::Error> {
        assert_eq!(ProxyInfo::parse("")?, None);
        assert_eq!(ProxyInfo::parse("10.0.0.1:8080")?, Some(ProxyInfo { host: "10.0.0.1".to_string(), port: 8080 }));
        assert_eq!(ProxyInfo::parse("http://wap.proxy:9201")?, Some(ProxyInfo { host: "wap.proxy".to_string(), port: 9201 }));
        assert_eq!(ProxyInfo::parse("wap.proxy")?, Some(ProxyInfo { host: "wap.proxy".to_string(), port: 80 }));
        assert!(ProxyInfo::parse("wap.proxy:nonsense").is_err());
        Ok(())
    }

    #[test]
    fn it_qualifies_mms_capable_contexts() {
        let context = ContextInfo {
            object_path: "/ctx1".to_string(),
            context_type: ContextType::Internet,
            active: false,
            preferred: false,
            message_center: String::new(),
            message_proxy: String::new(),
            name: "data".to_string(),
        };
        assert!(!context.qualifies());
        assert!(context.message_center().is_err());

        let mms = ContextInfo { context_type: ContextType::Mms, ..context.clone() };
        assert!(mms.qualifies());

        let internet = ContextInfo { message_center: "http://mmsc".to_string(), ..context };
        assert!(internet.qualifies());
        assert_eq!(internet.message_center().unwrap(), "http://mmsc");
    }
}
