//! Context activation against the modem bus. Activation powers the modem
//! for MMS, waits for attachment, walks the ranked candidate contexts and
//! pairs every success with a later deactivation that restores the power
//! flag.

use std::{sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::api::{ActivatedContext, AgentError, ContextInfo, ContextType, ModemBus};

const ATTACH_TIMEOUT: Duration = Duration::from_secs(40);
const ACTIVATION_ATTEMPTS: u32 = 3;
const ACTIVATION_RETRY_DELAY: Duration = Duration::from_secs(2);

pub struct Modem<B> {
    bus: Arc<B>,
    object_path: String,
    attach_timeout: Duration,
}

impl<B: ModemBus> Modem<B> {
    pub fn new(bus: B, object_path: impl Into<String>) -> Self {
        Self {
            bus: Arc::new(bus),
            object_path: object_path.into(),
            attach_timeout: ATTACH_TIMEOUT,
        }
    }

    /// Shortens the attach deadline; the 40 second default makes tests slow.
    pub fn with_attach_timeout(mut self, attach_timeout: Duration) -> Self {
        self.attach_timeout = attach_timeout;
        self
    }

    pub fn object_path(&self) -> &str {
        &self.object_path
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Brings up a context to operate MMS on. A context that is already
    /// active is used as-is; otherwise the ranked candidates are activated
    /// in turn. `preferred` is the object path cached by the messaging
    /// service from the last successful activation.
    pub async fn activate_mms_context(&self, preferred: Option<&str>) -> Result<ActivatedContext, AgentError> {
        self.bus
            .set_powered_for_mms(true)
            .await
            .map_err(|e| AgentError::ContextError(format!("cannot power modem for MMS: {}", e)))?;

        if let Err(e) = self.wait_attached().await {
            self.power_down().await;
            return Err(e);
        }

        let candidates = match self.mms_contexts(preferred).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.power_down().await;
                return Err(e);
            }
        };

        for context in candidates {
            if context.active {
                info!(context = %context.object_path, "context already active");
                return Ok(ActivatedContext { info: context, was_active: true });
            }
            match self.try_activate(&context).await {
                Ok(()) => {
                    if !context.preferred && context.context_type == ContextType::Mms {
                        if let Err(e) = self.bus.set_context_preferred(&context.object_path).await {
                            warn!(context = %context.object_path, "cannot mark context preferred: {}", e);
                        }
                    }
                    return Ok(ActivatedContext { info: context, was_active: false });
                }
                Err(e) => warn!(context = %context.object_path, "failed to activate: {}", e),
            }
        }

        self.power_down().await;
        Err(AgentError::ContextError("no context available to activate".to_string()))
    }

    /// Tears down what `activate_mms_context` set up. Contexts that were
    /// already active on entry are left untouched; the power flag is always
    /// released.
    pub async fn deactivate_mms_context(&self, context: &ActivatedContext) -> Result<(), AgentError> {
        if !context.was_active {
            if let Err(e) = self.bus.set_context_active(&context.info.object_path, false).await {
                warn!(context = %context.info.object_path, "cannot deactivate: {}", e);
            }
        }
        self.bus
            .set_powered_for_mms(false)
            .await
            .map_err(|e| AgentError::ContextError(format!("cannot release the MMS power flag: {}", e)))
    }

    async fn power_down(&self) {
        if let Err(e) = self.bus.set_powered_for_mms(false).await {
            warn!("cannot release the MMS power flag: {}", e);
        }
    }

    /// Waits for the connection manager to report attachment, subscribing
    /// before the initial read so a change between the two is not lost.
    async fn wait_attached(&self) -> Result<(), AgentError> {
        let mut changes = self
            .bus
            .watch_attached()
            .await
            .map_err(|e| AgentError::ContextError(format!("cannot watch the Attached property: {}", e)))?;

        let attached = self
            .bus
            .attached()
            .await
            .map_err(|e| AgentError::ContextError(format!("cannot read the Attached property: {}", e)))?;
        if attached {
            return Ok(());
        }

        info!(modem = %self.object_path, "waiting for the modem to attach");
        let wait = async {
            while let Some(attached) = changes.recv().await {
                if attached {
                    return Ok(());
                }
            }
            Err(AgentError::ContextError("attach watch ended before the modem attached".to_string()))
        };
        match timeout(self.attach_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::ContextError(format!("modem not attached after {:?}", self.attach_timeout))),
        }
    }

    /// The MMS capable contexts, best candidate first: the modem's own
    /// preferred context, then the caller's preferred or already active
    /// ones, then the rest.
    async fn mms_contexts(&self, preferred: Option<&str>) -> Result<Vec<ContextInfo>, AgentError> {
        let contexts = self
            .bus
            .contexts()
            .await
            .map_err(|e| AgentError::ContextError(format!("cannot enumerate contexts: {}", e)))?;

        let mut first = Vec::new();
        let mut second = Vec::new();
        let mut rest = Vec::new();
        for context in contexts.into_iter().filter(ContextInfo::qualifies) {
            if context.preferred {
                first.push(context);
            } else if Some(context.object_path.as_str()) == preferred || context.active {
                second.push(context);
            } else {
                rest.push(context);
            }
        }
        first.extend(second);
        first.extend(rest);
        Ok(first)
    }

    async fn try_activate(&self, context: &ContextInfo) -> Result<(), AgentError> {
        for attempt in 1..=ACTIVATION_ATTEMPTS {
            info!(context = %context.object_path, attempt, "setting Active");
            match self.bus.set_context_active(&context.object_path, true).await {
                Ok(()) => return Ok(()),
                Err(e) if e.needs_wait() && attempt < ACTIVATION_ATTEMPTS => {
                    warn!(context = %context.object_path, attempt, "activation failed, retrying: {}", e);
                    sleep(ACTIVATION_RETRY_DELAY).await;
                }
                Err(e) if e.needs_wait() => {
                    warn!(context = %context.object_path, attempt, "activation failed: {}", e);
                }
                Err(e) => return Err(AgentError::ContextError(format!("cannot activate {}: {}", context.object_path, e))),
            }
        }
        Err(AgentError::ContextError(format!("failed to change the Active property on {}", context.object_path)))
    }
}
