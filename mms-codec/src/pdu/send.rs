use bytes::Bytes;
use tracing::warn;

use crate::{
    MmsError,
    api::{
        CLASS_PERSONAL, MMS_MESSAGE_VERSION_1_1, READ_REPORT_NO, RESPONSE_STATUS_ERROR_CONTENT_NOT_ACCEPTED, RESPONSE_STATUS_ERROR_MESSAGE_FORMAT_CORRUPT, RESPONSE_STATUS_ERROR_MESSAGE_NOT_FOUND,
        RESPONSE_STATUS_ERROR_NETWORK_PROBLEM, RESPONSE_STATUS_ERROR_SENDING_ADDRESS_UNRESOLVED, RESPONSE_STATUS_ERROR_SERVICE_DENIED, RESPONSE_STATUS_ERROR_TRANSIENT_FAILURE,
        RESPONSE_STATUS_ERROR_TRANSIENT_MAX_RESERVED, RESPONSE_STATUS_ERROR_UNSPECIFIED, RESPONSE_STATUS_ERROR_UNSUPPORTED_MESSAGE, RESPONSE_STATUS_OK, ResponseClass,
    },
    attachment::{Attachment, read_content_type_block, read_multipart, smil_start},
    decoder::{Decoder, with_trace},
    encoder::Encoder,
    parameters::header,
    pdu::{TYPE_SEND_CONF, TYPE_SEND_REQ, delivery_report_flag, generate_uuid, unix_date},
};

/// Recipient address suffix required on the wire.
const PLMN_SUFFIX: &str = "/TYPE=PLMN";

/// Outgoing messages expire after a week unless told otherwise.
const DEFAULT_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// m-send.req, OMA-WAP-MMS-ENC-v1.1 section 6.1.1. The sender address is
/// never carried: the encoder always emits the insert-address token and the
/// carrier fills it in.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MSendReq {
    pub uuid: String,
    pub transaction_id: String,
    pub version: u8,
    pub date: u64,
    pub to: Vec<String>,
    pub subject: String,
    pub class: u8,
    /// Relative expiry in seconds.
    pub expiry: u64,
    pub delivery_report: u8,
    pub read_report: u8,
    pub content_type: String,
    /// Content-id of the SMIL root part, when one is present.
    pub content_type_start: String,
    /// `application/smil` when a SMIL part is present.
    pub content_type_type: String,
    pub attachments: Vec<Attachment>,
}

impl MSendReq {
    /// A personal message with normal priority and no read report. The
    /// generated UUID doubles as the transaction id.
    pub fn new(recipients: Vec<String>, attachments: Vec<Attachment>, delivery_report: bool) -> Result<MSendReq, MmsError> {
        let uuid = generate_uuid()?;
        let to = recipients.into_iter().map(|r| r + PLMN_SUFFIX).collect();
        let (attachments, smil_start, smil_type) = process_attachments(attachments);

        Ok(MSendReq {
            transaction_id: uuid.clone(),
            uuid,
            version: MMS_MESSAGE_VERSION_1_1,
            date: unix_date(),
            to,
            subject: String::new(),
            class: CLASS_PERSONAL,
            expiry: DEFAULT_EXPIRY_SECS,
            delivery_report: delivery_report_flag(delivery_report),
            read_report: READ_REPORT_NO,
            content_type: "application/vnd.wap.multipart.mixed".to_string(),
            content_type_start: smil_start,
            content_type_type: smil_type,
            attachments,
        })
    }

    pub fn encode(&self) -> Result<Bytes, MmsError> {
        if self.transaction_id.is_empty() {
            return Err(MmsError::EncodingError("missing mandatory field TransactionID".to_string()));
        }
        if self.content_type.is_empty() {
            return Err(MmsError::EncodingError("missing mandatory field ContentType".to_string()));
        }

        let mut enc = Encoder::new();
        enc.write_byte_param(header::MESSAGE_TYPE, TYPE_SEND_REQ);
        enc.write_string_param(header::TRANSACTION_ID, &self.transaction_id);
        enc.write_byte_param(header::MMS_VERSION, self.version);
        if self.date > 0 {
            enc.write_long_integer_param(header::DATE, self.date);
        }
        enc.write_from_insert_address();
        for to in &self.to {
            enc.write_string_param(header::TO, to);
        }
        enc.write_string_param(header::SUBJECT, &self.subject);
        if self.class > 0 {
            enc.write_byte_param(header::MESSAGE_CLASS, self.class);
        }
        if self.expiry > 0 {
            enc.write_relative_expiry(self.expiry);
        }
        if self.delivery_report > 0 {
            enc.write_byte_param(header::DELIVERY_REPORT, self.delivery_report);
        }
        if self.read_report > 0 {
            enc.write_byte_param(header::READ_REPORT, self.read_report);
        }
        enc.write_header(header::CONTENT_TYPE);
        enc.write_content_type(&self.content_type, &self.content_type_start, &self.content_type_type, "");
        enc.write_attachments(&self.attachments);
        Ok(enc.finish())
    }

    /// Decodes an encoded m-send.req. The UUID is not carried on the wire.
    pub fn decode(data: &[u8]) -> Result<MSendReq, MmsError> {
        let mut pdu = MSendReq::default();
        let mut dec = Decoder::new(data);
        decode_send_req_headers(&mut dec, &mut pdu).map_err(|e| with_trace(e, &dec))?;
        Ok(pdu)
    }
}

/// Orders the parts so the SMIL presentation comes first and derives the
/// start/type content-type parameters from it.
fn process_attachments(attachments: Vec<Attachment>) -> (Vec<Attachment>, String, String) {
    let mut ordered = Vec::with_capacity(attachments.len());
    let mut start = String::new();
    let mut smil_type = String::new();
    for attachment in attachments {
        if attachment.media_type.starts_with("application/smil") {
            match smil_start(&attachment.data) {
                Ok(s) => start = s,
                Err(e) => warn!("cannot set content type start: {}", e),
            }
            smil_type = "application/smil".to_string();
            ordered.insert(0, attachment);
        } else {
            ordered.push(attachment);
        }
    }
    (ordered, start, smil_type)
}

fn decode_send_req_headers(dec: &mut Decoder<'_>, pdu: &mut MSendReq) -> Result<(), MmsError> {
    while dec.has_more() {
        let Some(tag) = dec.next_header()? else { continue };
        match tag {
            header::MESSAGE_TYPE => dec.expect_message_type(TYPE_SEND_REQ)?,
            header::TRANSACTION_ID => pdu.transaction_id = dec.read_string("TransactionID")?,
            header::MMS_VERSION => pdu.version = dec.read_byte("Version")?,
            header::DATE => pdu.date = dec.read_long("Date")?,
            header::FROM => {
                dec.read_from()?;
            }
            header::TO => {
                let to = dec.read_encoded_string("To")?;
                pdu.to.push(to);
            }
            header::SUBJECT => pdu.subject = dec.read_encoded_string("Subject")?,
            header::MESSAGE_CLASS => pdu.class = dec.read_byte("Class")?,
            header::EXPIRY => pdu.expiry = dec.read_expiry()?,
            header::DELIVERY_REPORT => pdu.delivery_report = dec.read_byte("DeliveryReport")?,
            header::READ_REPORT => pdu.read_report = dec.read_byte("ReadReport")?,
            header::CONTENT_TYPE => {
                let mut content = Attachment::default();
                read_content_type_block(dec, &mut content)?;
                pdu.content_type = content.media_type;
                pdu.content_type_start = content.start;
                pdu.content_type_type = content.kind;
                pdu.attachments = read_multipart(dec)?;
                break;
            }
            x => dec.skip_field_value(x)?,
        }
    }
    Ok(())
}

/// m-send.conf, OMA-WAP-MMS-ENC section 6.1.2: the carrier's verdict on an
/// upload.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MSendConf {
    pub transaction_id: String,
    pub version: u8,
    pub response_status: u8,
    pub response_text: String,
    pub message_id: String,
}

impl MSendConf {
    pub fn decode(data: &[u8]) -> Result<MSendConf, MmsError> {
        let mut pdu = MSendConf::default();
        let mut dec = Decoder::new(data);
        decode_send_conf_headers(&mut dec, &mut pdu).map_err(|e| with_trace(e, &dec))?;
        Ok(pdu)
    }

    /// OMA-WAP-MMS section 7.2.27: the obsolete single codes keep their
    /// case-by-case meaning, [192..223] is transient, [224..255] permanent,
    /// and reserved values are treated as permanent.
    pub fn response_class(&self) -> ResponseClass {
        let s = self.response_status;
        match s {
            RESPONSE_STATUS_OK => return ResponseClass::Success,
            RESPONSE_STATUS_ERROR_UNSPECIFIED => return ResponseClass::TransientFailure,
            RESPONSE_STATUS_ERROR_SERVICE_DENIED => return ResponseClass::TransientFailure,
            RESPONSE_STATUS_ERROR_MESSAGE_FORMAT_CORRUPT => return ResponseClass::PermanentFailure,
            RESPONSE_STATUS_ERROR_SENDING_ADDRESS_UNRESOLVED => return ResponseClass::PermanentFailure,
            RESPONSE_STATUS_ERROR_MESSAGE_NOT_FOUND => return ResponseClass::PermanentFailure,
            RESPONSE_STATUS_ERROR_NETWORK_PROBLEM => return ResponseClass::TransientFailure,
            RESPONSE_STATUS_ERROR_CONTENT_NOT_ACCEPTED => return ResponseClass::PermanentFailure,
            RESPONSE_STATUS_ERROR_UNSUPPORTED_MESSAGE => return ResponseClass::PermanentFailure,
            _ => (),
        }
        if (RESPONSE_STATUS_ERROR_TRANSIENT_FAILURE..=RESPONSE_STATUS_ERROR_TRANSIENT_MAX_RESERVED).contains(&s) {
            ResponseClass::TransientFailure
        } else {
            // [224..255] and every reserved value.
            ResponseClass::PermanentFailure
        }
    }
}

fn decode_send_conf_headers(dec: &mut Decoder<'_>, pdu: &mut MSendConf) -> Result<(), MmsError> {
    while dec.has_more() {
        let Some(tag) = dec.next_header()? else { continue };
        match tag {
            header::MESSAGE_TYPE => dec.expect_message_type(TYPE_SEND_CONF)?,
            header::TRANSACTION_ID => pdu.transaction_id = dec.read_string("TransactionID")?,
            header::MMS_VERSION => pdu.version = dec.read_byte("Version")?,
            header::RESPONSE_STATUS => pdu.response_status = dec.read_byte("ResponseStatus")?,
            header::RESPONSE_TEXT => pdu.response_text = dec.read_string("ResponseText")?,
            header::MESSAGE_ID => pdu.message_id = dec.read_string("MessageID")?,
            x => dec.skip_field_value(x)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DELIVERY_REPORT_YES;

    const SMIL_BODY: &[u8] = b"<smil><body/></smil>";

    fn send_req() -> Result<MSendReq, MmsError> {
        let image = Attachment::new("photo.jpg", "image/jpeg", vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9])?;
        let smil = Attachment::new("smil", "application/smil", SMIL_BODY.to_vec())?;
        MSendReq::new(vec!["+34600123456".to_string(), "+34600654321".to_string()], vec![image, smil], true)
    }

    #[test]
    fn it_builds_sends_with_plmn_recipients_and_smil_first() -> Result<(), anyhow::Error> {
        let pdu = send_req()?;
        assert_eq!(pdu.uuid.len(), 32);
        assert_eq!(pdu.transaction_id, pdu.uuid);
        assert!(pdu.to.iter().all(|to| to.ends_with("/TYPE=PLMN")));
        assert_eq!(pdu.to[0], "+34600123456/TYPE=PLMN");
        assert_eq!(pdu.attachments[0].media_type, "application/smil");
        assert_eq!(pdu.content_type_start, "<smil>");
        assert_eq!(pdu.content_type_start, pdu.attachments[0].content_id);
        assert_eq!(pdu.content_type_type, "application/smil");
        assert_eq!(pdu.class, CLASS_PERSONAL);
        assert_eq!(pdu.expiry, 604_800);
        assert_eq!(pdu.delivery_report, DELIVERY_REPORT_YES);
        assert_eq!(pdu.read_report, READ_REPORT_NO);
        assert!(pdu.date > 0);
        Ok(())
    }

    #[test]
    fn it_round_trips_through_the_decoder() -> Result<(), anyhow::Error> {
        let pdu = send_req()?;
        let decoded = MSendReq::decode(&pdu.encode()?)?;

        assert_eq!(decoded.transaction_id, pdu.transaction_id);
        assert_eq!(decoded.version, pdu.version);
        assert_eq!(decoded.date, pdu.date);
        assert_eq!(decoded.to, pdu.to);
        assert_eq!(decoded.class, pdu.class);
        assert_eq!(decoded.expiry, pdu.expiry);
        assert_eq!(decoded.delivery_report, pdu.delivery_report);
        assert_eq!(decoded.read_report, pdu.read_report);
        assert_eq!(decoded.content_type, pdu.content_type);
        assert_eq!(decoded.content_type_start, pdu.content_type_start);
        assert_eq!(decoded.content_type_type, pdu.content_type_type);
        assert_eq!(decoded.attachments, pdu.attachments);
        Ok(())
    }

    #[test]
    fn it_keeps_part_payloads_byte_identical() -> Result<(), anyhow::Error> {
        let pdu = send_req()?;
        let encoded = pdu.encode()?;
        let decoded = MSendReq::decode(&encoded)?;
        assert_eq!(decoded.attachments.len(), 2);
        assert_eq!(decoded.attachments[0].data, SMIL_BODY);
        assert_eq!(decoded.attachments[1].data, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        Ok(())
    }

    #[test]
    fn it_rejects_sends_without_mandatory_fields() {
        let pdu = MSendReq { content_type: "application/vnd.wap.multipart.mixed".to_string(), ..MSendReq::default() };
        assert!(pdu.encode().is_err());

        let pdu = MSendReq { transaction_id: "t".to_string(), ..MSendReq::default() };
        assert!(pdu.encode().is_err());
    }

    #[test]
    fn it_decodes_a_send_confirmation() -> Result<(), anyhow::Error> {
        let mut data = vec![0x8C, 0x81];
        data.extend(b"\x98TXN-5\0");
        data.extend([0x8D, MMS_MESSAGE_VERSION_1_1]);
        data.extend([0x92, 0x80]);
        data.extend(b"\x8Bmid-123\0");

        let pdu = MSendConf::decode(&data)?;
        assert_eq!(pdu.transaction_id, "TXN-5");
        assert_eq!(pdu.response_status, 128);
        assert_eq!(pdu.message_id, "mid-123");
        assert_eq!(pdu.response_class(), ResponseClass::Success);
        Ok(())
    }

    #[test]
    fn it_classifies_response_statuses() {
        let class = |status: u8| MSendConf { response_status: status, ..MSendConf::default() }.response_class();

        assert_eq!(class(128), ResponseClass::Success);
        assert_eq!(class(195), ResponseClass::TransientFailure);
        assert_eq!(class(229), ResponseClass::PermanentFailure);
        assert_eq!(class(170), ResponseClass::PermanentFailure);

        // Obsolete single codes keep their case-by-case meaning.
        assert_eq!(class(129), ResponseClass::TransientFailure);
        assert_eq!(class(130), ResponseClass::TransientFailure);
        assert_eq!(class(131), ResponseClass::PermanentFailure);
        assert_eq!(class(134), ResponseClass::TransientFailure);
        assert_eq!(class(136), ResponseClass::PermanentFailure);

        // Range edges.
        assert_eq!(class(192), ResponseClass::TransientFailure);
        assert_eq!(class(223), ResponseClass::TransientFailure);
        assert_eq!(class(224), ResponseClass::PermanentFailure);
        assert_eq!(class(255), ResponseClass::PermanentFailure);
    }
}
