use crate::{
    MmsError,
    decoder::{Decoder, with_trace},
    parameters::header,
    pdu::{MNotifyRespInd, TYPE_NOTIFICATION_IND, generate_uuid, report_allowed_flag},
};

/// m-notification.ind, OMA-WAP-MMS-ENC section 6.2: a carrier push telling
/// the client where to fetch a new message from.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MNotificationInd {
    pub uuid: String,
    pub version: u8,
    pub class: u8,
    pub delivery_report: u8,
    pub reply_charging: u8,
    pub reply_charging_deadline: u8,
    pub priority: u8,
    pub reply_charging_id: String,
    pub transaction_id: String,
    pub content_location: String,
    pub from: String,
    pub subject: String,
    /// Relative expiry in seconds.
    pub expiry: u64,
    /// Advertised message size in bytes.
    pub size: u64,
}

impl MNotificationInd {
    /// Decodes a pushed notification, assigning it a fresh UUID.
    pub fn decode(data: &[u8]) -> Result<MNotificationInd, MmsError> {
        let mut pdu = MNotificationInd { uuid: generate_uuid()?, ..MNotificationInd::default() };
        let mut dec = Decoder::new(data);
        decode_headers(&mut dec, &mut pdu).map_err(|e| with_trace(e, &dec))?;
        Ok(pdu)
    }

    /// Test-mode notifications point at a local server and bypass both
    /// context activation and the m-notifyresp.ind upload.
    pub fn is_local(&self) -> bool {
        self.content_location.starts_with("http://localhost:9191/mms")
    }

    pub fn notify_resp_ind(&self, status: u8, delivery_report: bool) -> MNotifyRespInd {
        MNotifyRespInd {
            uuid: self.uuid.clone(),
            transaction_id: self.transaction_id.clone(),
            version: self.version,
            status,
            report_allowed: report_allowed_flag(delivery_report),
        }
    }
}

fn decode_headers(dec: &mut Decoder<'_>, pdu: &mut MNotificationInd) -> Result<(), MmsError> {
    while dec.has_more() {
        let Some(tag) = dec.next_header()? else { continue };
        match tag {
            header::MESSAGE_TYPE => dec.expect_message_type(TYPE_NOTIFICATION_IND)?,
            header::TRANSACTION_ID => pdu.transaction_id = dec.read_string("TransactionID")?,
            header::MMS_VERSION => pdu.version = dec.read_byte("Version")?,
            header::FROM => pdu.from = dec.read_from()?,
            header::MESSAGE_CLASS => pdu.class = dec.read_byte("Class")?,
            header::DELIVERY_REPORT => pdu.delivery_report = dec.read_byte("DeliveryReport")?,
            header::REPLY_CHARGING => pdu.reply_charging = dec.read_byte("ReplyCharging")?,
            header::REPLY_CHARGING_DEADLINE => pdu.reply_charging_deadline = dec.read_byte("ReplyChargingDeadline")?,
            header::REPLY_CHARGING_ID => pdu.reply_charging_id = dec.read_string("ReplyChargingID")?,
            header::PRIORITY => pdu.priority = dec.read_byte("Priority")?,
            header::SUBJECT => pdu.subject = dec.read_encoded_string("Subject")?,
            header::EXPIRY => pdu.expiry = dec.read_expiry()?,
            header::MESSAGE_SIZE => pdu.size = dec.read_long("Size")?,
            header::CONTENT_LOCATION => {
                pdu.content_location = dec.read_string("ContentLocation")?;
                break;
            }
            x => dec.skip_field_value(x)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CLASS_PERSONAL, DELIVERY_REPORT_YES, EXPIRY_TOKEN_RELATIVE, MMS_MESSAGE_VERSION_1_0, REPORT_ALLOWED_NO, STATUS_RETRIEVED};

    fn notification_bytes(content_location: &str) -> Vec<u8> {
        let mut data = vec![0x8C, 0x82];
        data.extend(b"\x98TXN-1\0");
        data.extend([0x8D, MMS_MESSAGE_VERSION_1_0]);
        data.extend([0x86, DELIVERY_REPORT_YES]);
        data.extend([0x8A, CLASS_PERSONAL]);
        data.extend([0x88, 0x04, EXPIRY_TOKEN_RELATIVE, 0x02, 0x03, 0xE8]);
        data.extend([0x8E, 0x02, 0x30, 0x39]);
        data.push(0x83);
        data.extend(content_location.as_bytes());
        data.push(0);
        data
    }

    #[test]
    fn it_decodes_a_pushed_notification() -> Result<(), anyhow::Error> {
        let pdu = MNotificationInd::decode(&notification_bytes("http://mmsc.operator/abc"))?;
        assert_eq!(pdu.transaction_id, "TXN-1");
        assert_eq!(pdu.version, MMS_MESSAGE_VERSION_1_0);
        assert_eq!(pdu.delivery_report, DELIVERY_REPORT_YES);
        assert_eq!(pdu.class, CLASS_PERSONAL);
        assert_eq!(pdu.expiry, 1000);
        assert_eq!(pdu.size, 12345);
        assert_eq!(pdu.content_location, "http://mmsc.operator/abc");
        assert_eq!(pdu.uuid.len(), 32);
        assert!(!pdu.is_local());
        Ok(())
    }

    #[test]
    fn it_flags_local_test_notifications() -> Result<(), anyhow::Error> {
        let pdu = MNotificationInd::decode(&notification_bytes("http://localhost:9191/mms/x"))?;
        assert!(pdu.is_local());
        Ok(())
    }

    #[test]
    fn it_rejects_other_message_types() {
        // m-retrieve.conf type byte in a notification decode.
        let data = vec![0x8C, 0x84];
        assert!(MNotificationInd::decode(&data).is_err());
    }

    #[test]
    fn it_skips_unknown_and_application_headers() -> Result<(), anyhow::Error> {
        let mut data = vec![0x8C, 0x82];
        data.extend(b"X-Operator-Hint\0fast\0");
        // Sender-visibility, a known tag with no field here.
        data.extend([0x94, 0x80]);
        data.extend(b"\x98TXN-2\0");
        data.push(0x83);
        data.extend(b"http://mmsc.operator/abc\0");

        let pdu = MNotificationInd::decode(&data)?;
        assert_eq!(pdu.transaction_id, "TXN-2");
        assert_eq!(pdu.content_location, "http://mmsc.operator/abc");
        Ok(())
    }

    #[test]
    fn it_stops_reading_at_the_content_location() -> Result<(), anyhow::Error> {
        let mut data = notification_bytes("http://mmsc.operator/abc");
        // Trailing garbage after the terminating header must not be touched.
        data.extend([0xFF, 0xFF, 0xFF]);
        let pdu = MNotificationInd::decode(&data)?;
        assert_eq!(pdu.content_location, "http://mmsc.operator/abc");
        Ok(())
    }

    #[test]
    fn it_builds_the_notify_response() -> Result<(), anyhow::Error> {
        let pdu = MNotificationInd::decode(&notification_bytes("http://mmsc.operator/abc"))?;
        let resp = pdu.notify_resp_ind(STATUS_RETRIEVED, false);
        assert_eq!(resp.uuid, pdu.uuid);
        assert_eq!(resp.transaction_id, "TXN-1");
        assert_eq!(resp.version, MMS_MESSAGE_VERSION_1_0);
        assert_eq!(resp.status, STATUS_RETRIEVED);
        assert_eq!(resp.report_allowed, REPORT_ALLOWED_NO);
        Ok(())
    }
}
