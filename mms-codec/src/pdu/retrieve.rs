use crate::{
    MmsError,
    attachment::{Attachment, read_content_type_block, read_multipart},
    decoder::{Decoder, with_trace},
    parameters::header,
    pdu::{MNotifyRespInd, TYPE_RETRIEVE_CONF, report_allowed_flag},
};
use crate::api::STATUS_RETRIEVED;

/// m-retrieve.conf, OMA-WAP-MMS-ENC section 6.3: the downloaded message
/// itself, keyed by the UUID assigned to its notification.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MRetrieveConf {
    pub uuid: String,
    pub version: u8,
    pub status: u8,
    pub class: u8,
    pub priority: u8,
    pub reply_charging: u8,
    pub reply_charging_deadline: u8,
    pub reply_charging_id: String,
    pub read_report: u8,
    pub retrieve_status: u8,
    pub delivery_report: u8,
    pub transaction_id: String,
    pub message_id: String,
    pub retrieve_text: String,
    pub from: String,
    pub cc: String,
    pub subject: String,
    pub to: Vec<String>,
    pub report_allowed: u8,
    /// Unix seconds.
    pub date: u64,
    /// The top-level content-type block.
    pub content: Attachment,
    /// Body parts in wire order.
    pub attachments: Vec<Attachment>,
    /// Raw body when the message is a single text part.
    pub data: Vec<u8>,
}

impl MRetrieveConf {
    pub fn decode(uuid: &str, data: &[u8]) -> Result<MRetrieveConf, MmsError> {
        let mut pdu = MRetrieveConf { uuid: uuid.to_string(), ..MRetrieveConf::default() };
        let mut dec = Decoder::new(data);
        decode_headers(&mut dec, &mut pdu).map_err(|e| with_trace(e, &dec))?;
        Ok(pdu)
    }

    pub fn notify_resp_ind(&self, delivery_report: bool) -> MNotifyRespInd {
        MNotifyRespInd {
            uuid: self.uuid.clone(),
            transaction_id: self.transaction_id.clone(),
            version: self.version,
            status: STATUS_RETRIEVED,
            report_allowed: report_allowed_flag(delivery_report),
        }
    }

    /// The text of the part holding the SMIL presentation.
    pub fn smil(&self) -> Result<String, MmsError> {
        self.attachments
            .iter()
            .find(|a| a.media_type.starts_with("application/smil"))
            .map(|a| String::from_utf8_lossy(&a.data).into_owned())
            .ok_or_else(|| MmsError::InternalError("cannot find SMIL data part".to_string()))
    }

    /// The non-SMIL body parts.
    pub fn data_parts(&self) -> Vec<&Attachment> {
        self.attachments.iter().filter(|a| a.media_type != "application/smil").collect()
    }
}

fn decode_headers(dec: &mut Decoder<'_>, pdu: &mut MRetrieveConf) -> Result<(), MmsError> {
    while dec.has_more() {
        let Some(tag) = dec.next_header()? else { continue };
        match tag {
            header::MESSAGE_TYPE => dec.expect_message_type(TYPE_RETRIEVE_CONF)?,
            header::TRANSACTION_ID => pdu.transaction_id = dec.read_string("TransactionID")?,
            header::MESSAGE_ID => pdu.message_id = dec.read_string("MessageID")?,
            header::MMS_VERSION => pdu.version = dec.read_byte("Version")?,
            header::FROM => pdu.from = dec.read_from()?,
            header::CC => pdu.cc = dec.read_encoded_string("Cc")?,
            header::SUBJECT => pdu.subject = dec.read_encoded_string("Subject")?,
            header::TO => {
                let to = dec.read_encoded_string("To")?;
                pdu.to.push(to);
            }
            header::MESSAGE_CLASS => pdu.class = dec.read_byte("Class")?,
            header::PRIORITY => pdu.priority = dec.read_byte("Priority")?,
            header::DELIVERY_REPORT => pdu.delivery_report = dec.read_byte("DeliveryReport")?,
            header::READ_REPORT => pdu.read_report = dec.read_byte("ReadReport")?,
            header::REPLY_CHARGING => pdu.reply_charging = dec.read_byte("ReplyCharging")?,
            header::REPLY_CHARGING_DEADLINE => pdu.reply_charging_deadline = dec.read_byte("ReplyChargingDeadline")?,
            header::REPLY_CHARGING_ID => pdu.reply_charging_id = dec.read_string("ReplyChargingID")?,
            header::RETRIEVE_STATUS => pdu.retrieve_status = dec.read_byte("RetrieveStatus")?,
            header::RETRIEVE_TEXT => pdu.retrieve_text = dec.read_string("RetrieveText")?,
            header::DATE => pdu.date = dec.read_long("Date")?,
            header::CONTENT_TYPE => {
                read_content_type_block(dec, &mut pdu.content)?;
                if pdu.content.media_type != "text/plain" {
                    pdu.attachments = read_multipart(dec)?;
                } else {
                    pdu.data = dec.reader.read_rest().to_vec();
                }
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
    use crate::api::{MMS_MESSAGE_VERSION_1_1, REPORT_ALLOWED_YES};

    fn headers() -> Vec<u8> {
        let mut data = vec![0x8C, 0x84];
        data.extend(b"\x98TXN-9\0");
        data.extend([0x8D, MMS_MESSAGE_VERSION_1_1]);
        data.extend(b"\x8Bmsg-id-1\0");
        data.extend([0x89, 0x09, 0x80]);
        data.extend(b"+341234\0");
        data.extend(b"\x96Lunch?\0");
        data.extend([0x97]);
        data.extend(b"+567/TYPE=PLMN\0");
        data.extend([0x85, 0x04, 0x54, 0x0B, 0xE5, 0x80]);
        data
    }

    #[test]
    fn it_decodes_a_single_text_part_message() -> Result<(), anyhow::Error> {
        let mut data = headers();
        data.extend([0x84, 0x83]);
        data.extend(b"hello there");

        let pdu = MRetrieveConf::decode("00aa", &data)?;
        assert_eq!(pdu.uuid, "00aa");
        assert_eq!(pdu.transaction_id, "TXN-9");
        assert_eq!(pdu.message_id, "msg-id-1");
        assert_eq!(pdu.from, "+341234");
        assert_eq!(pdu.subject, "Lunch?");
        assert_eq!(pdu.to, vec!["+567/TYPE=PLMN".to_string()]);
        assert_eq!(pdu.date, 0x540B_E580);
        assert_eq!(pdu.content.media_type, "text/plain");
        assert_eq!(pdu.data, b"hello there");
        assert!(pdu.attachments.is_empty());
        Ok(())
    }

    #[test]
    fn it_decodes_a_multipart_message() -> Result<(), anyhow::Error> {
        let smil = Attachment::new("smil", "application/smil", b"<smil></smil>".to_vec())?;
        let image = Attachment::new("photo", "image/jpeg", vec![1, 2, 3])?;

        let mut data = headers();
        // application/vnd.wap.multipart.related, no parameters.
        data.extend([0x84, 0xB3]);
        let mut enc = crate::encoder::Encoder::new();
        enc.write_attachments(&[smil.clone(), image.clone()]);
        data.extend(enc.finish());

        let pdu = MRetrieveConf::decode("00bb", &data)?;
        assert_eq!(pdu.content.media_type, "application/vnd.wap.multipart.related");
        assert_eq!(pdu.attachments.len(), 2);
        assert_eq!(pdu.smil()?, "<smil></smil>");
        let parts = pdu.data_parts();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].data, vec![1, 2, 3]);

        let resp = pdu.notify_resp_ind(true);
        assert_eq!(resp.uuid, "00bb");
        assert_eq!(resp.transaction_id, "TXN-9");
        assert_eq!(resp.status, STATUS_RETRIEVED);
        assert_eq!(resp.report_allowed, REPORT_ALLOWED_YES);
        Ok(())
    }
}
