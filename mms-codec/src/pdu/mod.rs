//! The five PDU kinds from OMA-WAP-MMS-ENC v1.1, one record per kind. Each
//! record knows its own wire type byte; a decode over bytes of a different
//! kind is rejected.

use std::{
    fmt::Write,
    time::{SystemTime, UNIX_EPOCH},
};

use rand::TryRngCore;

use crate::{
    MmsError,
    api::{DELIVERY_REPORT_NO, DELIVERY_REPORT_YES, REPORT_ALLOWED_NO, REPORT_ALLOWED_YES},
};

pub mod notification;
pub mod notify_resp;
pub mod retrieve;
pub mod send;

pub use notification::MNotificationInd;
pub use notify_resp::MNotifyRespInd;
pub use retrieve::MRetrieveConf;
pub use send::{MSendConf, MSendReq};

// Message type assignments, OMA-WAP-MMS section 7.3 Table 13.
pub(crate) const TYPE_SEND_REQ: u8 = 0x80;
pub(crate) const TYPE_SEND_CONF: u8 = 0x81;
pub(crate) const TYPE_NOTIFICATION_IND: u8 = 0x82;
pub(crate) const TYPE_NOTIFYRESP_IND: u8 = 0x83;
pub(crate) const TYPE_RETRIEVE_CONF: u8 = 0x84;

/// 16 octets from the system CSPRNG, hex encoded. Keys one message across
/// storage, decoding and status reporting. Fails closed when the entropy
/// source is unavailable.
pub(crate) fn generate_uuid() -> Result<String, MmsError> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| MmsError::InternalError(format!("cannot read from the system entropy source: {}", e)))?;
    let mut uuid = String::with_capacity(32);
    for byte in bytes {
        let _ = write!(uuid, "{:02x}", byte);
    }
    Ok(uuid)
}

pub(crate) fn unix_date() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default()
}

pub(crate) fn delivery_report_flag(requested: bool) -> u8 {
    if requested { DELIVERY_REPORT_YES } else { DELIVERY_REPORT_NO }
}

pub(crate) fn report_allowed_flag(allowed: bool) -> u8 {
    if allowed { REPORT_ALLOWED_YES } else { REPORT_ALLOWED_NO }
}
