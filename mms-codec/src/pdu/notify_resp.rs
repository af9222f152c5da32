use bytes::Bytes;

use crate::{MmsError, encoder::Encoder, parameters::header, pdu::TYPE_NOTIFYRESP_IND};

/// m-notifyresp.ind, OMA-WAP-MMS-ENC section 6.2: acknowledges a
/// notification back to the carrier once the message has been dealt with.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MNotifyRespInd {
    pub uuid: String,
    pub transaction_id: String,
    pub version: u8,
    pub status: u8,
    pub report_allowed: u8,
}

impl MNotifyRespInd {
    pub fn encode(&self) -> Result<Bytes, MmsError> {
        if self.transaction_id.is_empty() {
            return Err(MmsError::EncodingError("missing mandatory field TransactionID".to_string()));
        }
        let mut enc = Encoder::new();
        enc.write_byte_param(header::MESSAGE_TYPE, TYPE_NOTIFYRESP_IND);
        enc.write_string_param(header::TRANSACTION_ID, &self.transaction_id);
        enc.write_byte_param(header::MMS_VERSION, self.version);
        enc.write_byte_param(header::STATUS, self.status);
        if self.report_allowed > 0 {
            enc.write_byte_param(header::REPORT_ALLOWED, self.report_allowed);
        }
        Ok(enc.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MMS_MESSAGE_VERSION_1_2, REPORT_ALLOWED_YES, STATUS_RETRIEVED};

    #[test]
    fn it_encodes_the_documented_byte_stream() -> Result<(), anyhow::Error> {
        let pdu = MNotifyRespInd {
            uuid: String::new(),
            transaction_id: "ABCD".to_string(),
            version: MMS_MESSAGE_VERSION_1_2,
            status: STATUS_RETRIEVED,
            report_allowed: REPORT_ALLOWED_YES,
        };
        assert_eq!(pdu.encode()?.to_vec(), vec![0x8C, 0x83, 0x98, 0x41, 0x42, 0x43, 0x44, 0x00, 0x8D, 0x92, 0x95, 0x81, 0x91, 0x80]);
        Ok(())
    }

    #[test]
    fn it_requires_a_transaction_id() {
        let pdu = MNotifyRespInd { version: MMS_MESSAGE_VERSION_1_2, status: STATUS_RETRIEVED, ..MNotifyRespInd::default() };
        assert!(pdu.encode().is_err());
    }
}
