//! The per-modem event loop. Everything the agent does funnels through one
//! `tokio::select!` over the modem channels, the messaging-service outgoing
//! channel and the internal pipeline channels; each message is dispatched
//! onto its own task so the loop itself never touches the network or the
//! disk. A single mutex arbitrates the carrier data context between
//! concurrent inbound and outbound flows.

use std::{path::PathBuf, sync::Arc};

use tokio::sync::{Mutex, mpsc};
use tracing::{error, info, warn};

use mms_codec::{Attachment, MNotificationInd, MNotifyRespInd, MRetrieveConf, MSendConf, MSendReq, ResponseClass};

use crate::{
    api::{ActivatedContext, AgentError, MessageStatus, MessagingManager, MessagingService, ModemBus, OutgoingMessage, ProxyInfo, Storage, Transport},
    modem::Modem,
};

const CHANNEL_CAPACITY: usize = 16;

/// Event streams surfaced by the modem integration.
pub struct ModemEvents {
    pub push: mpsc::Receiver<Vec<u8>>,
    pub identity_added: mpsc::Receiver<String>,
    pub identity_removed: mpsc::Receiver<String>,
    pub push_interface_available: mpsc::Receiver<bool>,
}

/// Sender halves matching [`ModemEvents`], for the bus integration to feed.
pub struct ModemEventSenders {
    pub push: mpsc::Sender<Vec<u8>>,
    pub identity_added: mpsc::Sender<String>,
    pub identity_removed: mpsc::Sender<String>,
    pub push_interface_available: mpsc::Sender<bool>,
}

impl ModemEvents {
    pub fn channel() -> (ModemEventSenders, ModemEvents) {
        let (push_tx, push_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (added_tx, added_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (removed_tx, removed_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (available_tx, available_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            ModemEventSenders {
                push: push_tx,
                identity_added: added_tx,
                identity_removed: removed_tx,
                push_interface_available: available_tx,
            },
            ModemEvents {
                push: push_rx,
                identity_added: added_rx,
                identity_removed: removed_rx,
                push_interface_available: available_rx,
            },
        )
    }
}

/// Stops the loop. The signal carries whether it is safe to exit right
/// away; the loop keeps running on `false`.
#[derive(Clone)]
pub struct MediatorHandle {
    terminate: mpsc::Sender<bool>,
}

impl MediatorHandle {
    pub async fn terminate(&self) {
        let _ = self.terminate.send(true).await;
    }
}

struct SendFile {
    path: PathBuf,
    uuid: String,
}

/// Collaborators shared with every dispatched sub-task.
struct TaskContext<B, S, T> {
    modem: Arc<Modem<B>>,
    storage: Arc<S>,
    transport: Arc<T>,
    context_lock: Arc<Mutex<()>>,
    use_delivery_reports: bool,
}

impl<B, S, T> Clone for TaskContext<B, S, T> {
    fn clone(&self) -> Self {
        Self {
            modem: Arc::clone(&self.modem),
            storage: Arc::clone(&self.storage),
            transport: Arc::clone(&self.transport),
            context_lock: Arc::clone(&self.context_lock),
            use_delivery_reports: self.use_delivery_reports,
        }
    }
}

pub struct Mediator<B, M: MessagingManager, S, T> {
    ctx: TaskContext<B, S, T>,
    manager: Arc<M>,
    service: Option<M::Service>,
    events: ModemEvents,
    outgoing_tx: mpsc::Sender<OutgoingMessage>,
    outgoing_rx: mpsc::Receiver<OutgoingMessage>,
    notification_tx: mpsc::Sender<MNotificationInd>,
    notification_rx: mpsc::Receiver<MNotificationInd>,
    send_req_tx: mpsc::Sender<MSendReq>,
    send_req_rx: mpsc::Receiver<MSendReq>,
    send_file_tx: mpsc::Sender<SendFile>,
    send_file_rx: mpsc::Receiver<SendFile>,
    terminate_rx: mpsc::Receiver<bool>,
}

impl<B, M, S, T> Mediator<B, M, S, T>
where
    B: ModemBus,
    M: MessagingManager,
    S: Storage,
    T: Transport,
{
    pub fn new(modem: Modem<B>, manager: M, storage: S, transport: T, events: ModemEvents, use_delivery_reports: bool) -> (Self, MediatorHandle) {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (notification_tx, notification_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (send_req_tx, send_req_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (send_file_tx, send_file_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (terminate_tx, terminate_rx) = mpsc::channel(1);

        let mediator = Mediator {
            ctx: TaskContext {
                modem: Arc::new(modem),
                storage: Arc::new(storage),
                transport: Arc::new(transport),
                context_lock: Arc::new(Mutex::new(())),
                use_delivery_reports,
            },
            manager: Arc::new(manager),
            service: None,
            events,
            outgoing_tx,
            outgoing_rx,
            notification_tx,
            notification_rx,
            send_req_tx,
            send_req_rx,
            send_file_tx,
            send_file_rx,
            terminate_rx,
        };
        (mediator, MediatorHandle { terminate: terminate_tx })
    }

    /// Runs until terminated. Sub-task failures are contained; the only
    /// errors that escalate are messaging-service registration failures on
    /// identity changes, which leave the agent in a state only a restart
    /// can fix.
    pub async fn run(mut self) -> Result<(), AgentError> {
        info!(modem = self.ctx.modem.object_path(), "starting mediator loop");
        loop {
            tokio::select! {
                Some(push) = self.events.push.recv() => {
                    if !self.manager.mms_enabled().await {
                        info!("MMS is disabled, dropping push notification");
                        continue;
                    }
                    let ctx = self.ctx.clone();
                    let notification_tx = self.notification_tx.clone();
                    tokio::spawn(handle_push(ctx, notification_tx, push));
                }
                Some(notification) = self.notification_rx.recv() => {
                    let ctx = self.ctx.clone();
                    let service = self.service.clone();
                    tokio::spawn(retrieve_message(ctx, service, notification));
                }
                Some(message) = self.outgoing_rx.recv() => {
                    let service = self.service.clone();
                    let send_req_tx = self.send_req_tx.clone();
                    let use_delivery_reports = self.ctx.use_delivery_reports;
                    tokio::spawn(handle_outgoing_message(service, send_req_tx, message, use_delivery_reports));
                }
                Some(send_req) = self.send_req_rx.recv() => {
                    let ctx = self.ctx.clone();
                    let service = self.service.clone();
                    let send_file_tx = self.send_file_tx.clone();
                    tokio::spawn(encode_send_req(ctx, service, send_file_tx, send_req));
                }
                Some(send_file) = self.send_file_rx.recv() => {
                    let ctx = self.ctx.clone();
                    let service = self.service.clone();
                    tokio::spawn(upload_send_req(ctx, service, send_file));
                }
                Some(identity) = self.events.identity_added.recv() => {
                    let service = self
                        .manager
                        .add_service(&identity, self.ctx.modem.object_path(), self.outgoing_tx.clone(), self.ctx.use_delivery_reports)
                        .await?;
                    info!(%identity, "messaging service registered");
                    self.service = Some(service);
                }
                Some(identity) = self.events.identity_removed.recv() => {
                    self.manager.remove_service(&identity).await?;
                    info!(%identity, "messaging service unregistered");
                    self.service = None;
                }
                Some(available) = self.events.push_interface_available.recv() => {
                    let result = if available {
                        self.ctx.modem.bus().register_push_agent().await
                    } else {
                        self.ctx.modem.bus().unregister_push_agent().await
                    };
                    if let Err(e) = result {
                        error!(available, "cannot update the push agent registration: {}", e);
                    }
                }
                Some(exit) = self.terminate_rx.recv() => {
                    if exit {
                        break;
                    }
                }
                else => break,
            }
        }
        info!(modem = self.ctx.modem.object_path(), "ending mediator loop");
        Ok(())
    }
}

/// Push bytes: decode the notification, allocate storage, feed the inbound
/// pipeline.
async fn handle_push<B, S, T>(ctx: TaskContext<B, S, T>, notification_tx: mpsc::Sender<MNotificationInd>, push: Vec<u8>)
where
    B: ModemBus,
    S: Storage,
    T: Transport,
{
    let notification = match MNotificationInd::decode(&push) {
        Ok(notification) => notification,
        Err(e) => {
            error!("unable to decode m-notification.ind: {}", e);
            return;
        }
    };
    if let Err(e) = ctx.storage.create(&notification.uuid, &notification.content_location).await {
        error!(uuid = %notification.uuid, "cannot track the notification: {}", e);
        return;
    }
    let _ = notification_tx.send(notification).await;
}

/// Decoded notification: bring up a context unless the message is local,
/// download, hand the message over, acknowledge towards the carrier.
async fn retrieve_message<B, S, T, V>(ctx: TaskContext<B, S, T>, service: Option<V>, notification: MNotificationInd)
where
    B: ModemBus,
    S: Storage,
    T: Transport,
    V: MessagingService,
{
    let _guard = ctx.context_lock.lock().await;

    let mut active_context = None;
    let mut proxy = None;
    if notification.is_local() {
        info!("this is a local test, skipping context activation and proxy settings");
    } else {
        let preferred = match &service {
            Some(service) => service.preferred_context().await.ok(),
            None => None,
        };
        let context = match ctx.modem.activate_mms_context(preferred.as_deref()).await {
            Ok(context) => context,
            Err(e) => {
                error!("cannot activate a context: {}", e);
                return;
            }
        };
        if let Some(service) = &service {
            if let Err(e) = service.set_preferred_context(&context.info.object_path).await {
                warn!("unable to store the preferred context for MMS: {}", e);
            }
        }
        match context.info.proxy() {
            Ok(parsed) => proxy = parsed,
            Err(e) => {
                error!("error retrieving the proxy: {}", e);
                deactivate(&ctx, &context).await;
                return;
            }
        }
        active_context = Some(context);
    }

    if let Err(e) = download_and_respond(&ctx, &service, &notification, proxy.as_ref(), active_context.as_ref()).await {
        error!(uuid = %notification.uuid, "abandoning the inbound message: {}", e);
    }
    if let Some(context) = &active_context {
        deactivate(&ctx, context).await;
    }
}

async fn download_and_respond<B, S, T, V>(
    ctx: &TaskContext<B, S, T>,
    service: &Option<V>,
    notification: &MNotificationInd,
    proxy: Option<&ProxyInfo>,
    context: Option<&ActivatedContext>,
) -> Result<(), AgentError>
where
    B: ModemBus,
    S: Storage,
    T: Transport,
    V: MessagingService,
{
    let downloaded = ctx.transport.fetch(&notification.content_location, proxy).await?;
    ctx.storage.update_downloaded(&notification.uuid, &downloaded).await?;

    let payload_path = ctx.storage.get_mms(&notification.uuid).await?;
    let payload = tokio::fs::read(&payload_path).await?;
    let retrieve_conf = MRetrieveConf::decode(&notification.uuid, &payload)?;

    match service {
        Some(service) => {
            if let Err(e) = service.incoming_message_added(&retrieve_conf).await {
                warn!("cannot hand the new message to the messaging service: {}", e);
            }
        }
        None => info!("no messaging service registered, not delivering the retrieved message"),
    }

    let notify_resp = retrieve_conf.notify_resp_ind(ctx.use_delivery_reports);
    ctx.storage.update_retrieved(&notify_resp.uuid).await?;

    if notification.is_local() {
        info!("this is a local test, skipping m-notifyresp.ind");
        return Ok(());
    }
    match context {
        Some(context) => send_notify_resp(ctx, &notify_resp, context).await,
        None => Ok(()),
    }
}

/// Encode, upload and forget the m-notifyresp.ind. The encoded file and the
/// MMSC response are scratch data and removed on every path.
async fn send_notify_resp<B, S, T>(ctx: &TaskContext<B, S, T>, notify_resp: &MNotifyRespInd, context: &ActivatedContext) -> Result<(), AgentError>
where
    B: ModemBus,
    S: Storage,
    T: Transport,
{
    let encoded = notify_resp.encode()?;
    let response_path = ctx.storage.create_response_file(&notify_resp.uuid).await?;
    tokio::fs::write(&response_path, &encoded).await?;
    info!(path = %response_path.display(), uuid = %notify_resp.uuid, "created m-notifyresp.ind");

    let result: Result<(), AgentError> = async {
        let proxy = context.info.proxy()?;
        let mmsc = context.info.message_center()?;
        let confirmation = ctx.transport.upload(&response_path, mmsc, proxy.as_ref()).await?;
        let _ = tokio::fs::remove_file(&confirmation).await;
        Ok(())
    }
    .await;

    if let Err(e) = tokio::fs::remove_file(&response_path).await {
        warn!(path = %response_path.display(), "cannot remove the m-notifyresp.ind file: {}", e);
    }
    result
}

/// Outgoing request: load the attachments, build the m-send.req, ack the
/// request with the assigned UUID, feed the encode stage.
async fn handle_outgoing_message<V: MessagingService>(service: Option<V>, send_req_tx: mpsc::Sender<MSendReq>, message: OutgoingMessage, use_delivery_reports: bool) {
    let Some(service) = service else {
        warn!("no messaging service registered, dropping the outgoing message");
        return;
    };

    let mut attachments = Vec::with_capacity(message.attachments.len());
    for spec in &message.attachments {
        let data = match tokio::fs::read(&spec.file_path).await {
            Ok(data) => data,
            Err(e) => {
                error!(path = %spec.file_path.display(), "cannot read the attachment: {}", e);
                return;
            }
        };
        match Attachment::new(&spec.id, &spec.content_type, data) {
            Ok(attachment) => attachments.push(attachment),
            Err(e) => {
                error!(id = spec.id.as_str(), "cannot build the attachment: {}", e);
                return;
            }
        }
    }

    let send_req = match MSendReq::new(message.recipients, attachments, use_delivery_reports) {
        Ok(send_req) => send_req,
        Err(e) => {
            error!("cannot build the m-send.req: {}", e);
            return;
        }
    };
    if let Err(e) = service.reply_send_message(&message.reply, &send_req.uuid).await {
        error!(uuid = %send_req.uuid, "cannot acknowledge the send request: {}", e);
        return;
    }
    let _ = send_req_tx.send(send_req).await;
}

/// Build-send: encode to the send file and feed the upload stage. An
/// encoding failure is final and reported as such.
async fn encode_send_req<B, S, T, V>(ctx: TaskContext<B, S, T>, service: Option<V>, send_file_tx: mpsc::Sender<SendFile>, send_req: MSendReq)
where
    B: ModemBus,
    S: Storage,
    T: Transport,
    V: MessagingService,
{
    let Some(service) = service else {
        warn!("no messaging service registered, dropping the m-send.req");
        return;
    };

    info!(uuid = %send_req.uuid, "encoding m-send.req");
    let path = match ctx.storage.create_send_file(&send_req.uuid).await {
        Ok(path) => path,
        Err(e) => {
            error!(uuid = %send_req.uuid, "unable to create the m-send.req file: {}", e);
            return;
        }
    };
    let encoded = match send_req.encode() {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(uuid = %send_req.uuid, "unable to encode the m-send.req: {}", e);
            report_status(&service, &send_req.uuid, MessageStatus::PermanentError).await;
            return;
        }
    };
    if let Err(e) = tokio::fs::write(&path, &encoded).await {
        error!(path = %path.display(), "cannot write the m-send.req file: {}", e);
        return;
    }
    info!(path = %path.display(), uuid = %send_req.uuid, "created m-send.req");
    let _ = send_file_tx.send(SendFile { path, uuid: send_req.uuid }).await;
}

/// Encoded-send-ready: upload under the context lock, parse the
/// confirmation, report the final status. The send file is removed and the
/// message destroyed whatever the outcome.
async fn upload_send_req<B, S, T, V>(ctx: TaskContext<B, S, T>, service: Option<V>, send_file: SendFile)
where
    B: ModemBus,
    S: Storage,
    T: Transport,
    V: MessagingService,
{
    let Some(service) = service else {
        warn!("no messaging service registered, dropping the encoded send");
        return;
    };

    let outcome = send_and_confirm(&ctx, &service, &send_file).await;
    if let Err(e) = tokio::fs::remove_file(&send_file.path).await {
        warn!(path = %send_file.path.display(), "cannot remove the m-send.req file: {}", e);
    }

    let status = match outcome {
        Ok(status) => status,
        Err(e) => {
            warn!(uuid = %send_file.uuid, "cannot deliver the m-send.req: {}", e);
            MessageStatus::TransientError
        }
    };
    report_status(&service, &send_file.uuid, status).await;
    if let Err(e) = service.message_destroy(&send_file.uuid).await {
        warn!(uuid = %send_file.uuid, "cannot destroy the message: {}", e);
    }
}

async fn send_and_confirm<B, S, T, V>(ctx: &TaskContext<B, S, T>, service: &V, send_file: &SendFile) -> Result<MessageStatus, AgentError>
where
    B: ModemBus,
    S: Storage,
    T: Transport,
    V: MessagingService,
{
    let confirmation_path = upload_with_context(ctx, service, &send_file.path).await?;
    let confirmation = tokio::fs::read(&confirmation_path).await;
    let _ = tokio::fs::remove_file(&confirmation_path).await;

    let send_conf = MSendConf::decode(&confirmation?).map_err(|e| AgentError::ResponseError(format!("cannot decode the m-send.conf: {}", e)))?;
    info!(uuid = %send_file.uuid, response_status = send_conf.response_status, "m-send.conf received");
    Ok(match send_conf.response_class() {
        ResponseClass::Success => MessageStatus::Sent,
        ResponseClass::TransientFailure => MessageStatus::TransientError,
        ResponseClass::PermanentFailure => MessageStatus::PermanentError,
    })
}

/// Uploads a file to the MMSC with the context held for the duration.
async fn upload_with_context<B, S, T, V>(ctx: &TaskContext<B, S, T>, service: &V, path: &std::path::Path) -> Result<PathBuf, AgentError>
where
    B: ModemBus,
    S: Storage,
    T: Transport,
    V: MessagingService,
{
    let _guard = ctx.context_lock.lock().await;

    let preferred = service.preferred_context().await.ok();
    let context = ctx.modem.activate_mms_context(preferred.as_deref()).await?;
    if let Err(e) = service.set_preferred_context(&context.info.object_path).await {
        warn!("unable to store the preferred context for MMS: {}", e);
    }

    let result = async {
        let proxy = context.info.proxy()?;
        let mmsc = context.info.message_center()?;
        ctx.transport.upload(path, mmsc, proxy.as_ref()).await
    }
    .await;

    deactivate(ctx, &context).await;
    result
}

async fn deactivate<B, S, T>(ctx: &TaskContext<B, S, T>, context: &ActivatedContext)
where
    B: ModemBus,
    S: Storage,
    T: Transport,
{
    if let Err(e) = ctx.modem.deactivate_mms_context(context).await {
        warn!("issues while deactivating the context: {}", e);
    }
}

async fn report_status<V: MessagingService>(service: &V, uuid: &str, status: MessageStatus) {
    if let Err(e) = service.message_status_changed(uuid, status).await {
        error!(uuid, "cannot report the status change: {}", e);
    }
}
