//! Multipart body parts. An attachment carries the OMA content-type
//! parameters of one part plus its payload, both when parsing a received
//! body and when assembling an outgoing one.

use bytes::Bytes;
use tracing::warn;

use crate::{
    MmsError,
    decoder::Decoder,
    encoder::Encoder,
    parameters::{SHORT_FILTER, TEXT_MAX, TEXT_MIN, param, part},
};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Attachment {
    /// MIME string; after decoding a part with a charset parameter this
    /// carries `;charset=<name>` appended.
    pub media_type: String,
    /// The `type` content-type parameter (a content type itself).
    pub kind: String,
    pub name: String,
    pub file_name: String,
    pub charset: String,
    pub start: String,
    pub start_info: String,
    pub comment: String,
    pub domain: String,
    pub path: String,
    pub content_location: String,
    pub content_id: String,
    pub data: Vec<u8>,
}

impl Attachment {
    /// Builds an outgoing part. The content type may carry `;charset=...`
    /// parameters; for a SMIL part the content id becomes the SMIL start
    /// tag, which is how peers reference the presentation root.
    pub fn new(id: &str, content_type: &str, data: Vec<u8>) -> Result<Attachment, MmsError> {
        let mut attachment = Attachment {
            content_id: id.to_string(),
            content_location: id.to_string(),
            name: id.to_string(),
            data,
            ..Attachment::default()
        };

        let mut fields = content_type.split(';');
        attachment.media_type = fields.next().unwrap_or_default().trim().to_string();
        for field in fields {
            match field.trim().split_once('=') {
                Some(("charset", value)) => attachment.charset = value.trim().to_string(),
                Some((name, _)) => warn!(field = name, "unhandled field in attachment content type"),
                None => (),
            }
        }

        if content_type == "application/smil" {
            attachment.content_id = smil_start(&attachment.data)?;
        }
        Ok(attachment)
    }

    /// Part headers as transmitted in a multipart body: the content-type
    /// block followed by the content-location and content-id parameters.
    pub(crate) fn encode_headers(&self) -> Bytes {
        let mut enc = Encoder::new();
        enc.write_content_type(&self.media_type, "", "", &self.name);
        enc.write_string_param(part::CONTENT_LOCATION as u8, &self.content_location);
        enc.write_quoted_string_param(part::CONTENT_ID as u8, &self.content_id);
        enc.finish()
    }
}

/// The SMIL root element tag: everything up to and including the first `>`.
pub(crate) fn smil_start(data: &[u8]) -> Result<String, MmsError> {
    let text = String::from_utf8_lossy(data);
    match text.find('>') {
        Some(end) => Ok(text[..=end].to_string()),
        None => Err(MmsError::EncodingError("cannot find the SMIL start tag".to_string())),
    }
}

/// Content-type block of a PDU body or body part: either a bare media type
/// (short form or text) or a value-length delimited block of media type
/// plus well-known parameters.
pub(crate) fn read_content_type_block(dec: &mut Decoder<'_>, attachment: &mut Attachment) -> Result<(), MmsError> {
    let next = dec.reader.peek()?;
    if next & SHORT_FILTER != 0 || (TEXT_MIN..=TEXT_MAX).contains(&next) {
        attachment.media_type = dec.read_media_type()?;
        return Ok(());
    }

    let length = dec.reader.read_value_length()? as usize;
    let end = dec.reader.offset() + length;
    dec.note("content type length", length);
    attachment.media_type = dec.read_media_type()?;

    while dec.has_more() && dec.reader.offset() < end {
        let offset = dec.reader.offset();
        let parameter = dec.reader.read_integer()?;
        match parameter {
            param::CHARSET => attachment.charset = dec.read_charset()?.to_string(),
            param::TYPE => {
                dec.reader.read_integer()?;
            }
            param::CONTENT_TYPE => attachment.kind = dec.read_string("Type")?,
            param::NAME_DEFUNCT | param::NAME => attachment.name = dec.read_string("Name")?,
            param::FILENAME_DEFUNCT | param::FILENAME => attachment.file_name = dec.read_string("FileName")?,
            param::START_DEFUNCT | param::START => attachment.start = dec.read_string("Start")?,
            param::START_INFO_DEFUNCT | param::START_INFO => attachment.start_info = dec.read_string("StartInfo")?,
            param::COMMENT_DEFUNCT | param::COMMENT => attachment.comment = dec.read_string("Comment")?,
            param::DOMAIN_DEFUNCT | param::DOMAIN => attachment.domain = dec.read_string("Domain")?,
            param::PATH_DEFUNCT | param::PATH => attachment.path = dec.read_string("Path")?,
            param::Q => {
                dec.reader.read_uintvar()?;
            }
            param::LEVEL | param::PADDING | param::SEC => {
                dec.reader.read_short_integer()?;
            }
            param::SIZE => {
                dec.reader.read_integer()?;
            }
            param::SECURE => (),
            param::UNTYPED => {
                let value = dec.read_string("untyped")?;
                warn!(%value, "ignoring untyped parameter");
            }
            param::DIFFERENCES | param::MAX_AGE | param::MAC | param::CREATION_DATE | param::MODIFICATION_DATE | param::READ_DATE => {
                return Err(MmsError::EncodingError(format!("unhandled parameter {:#04x} at offset {}", parameter, offset)));
            }
            x => return Err(MmsError::EncodingError(format!("unhandled parameter {:#04x} == {} at offset {}", x, x, offset))),
        }
    }
    Ok(())
}

/// Part-level headers between the content-type block and the payload.
fn read_part_headers(dec: &mut Decoder<'_>, attachment: &mut Attachment, header_end: usize) -> Result<(), MmsError> {
    while dec.reader.offset() < header_end {
        let parameter = dec.reader.read_integer()?;
        match parameter {
            part::CONTENT_LOCATION => attachment.content_location = dec.read_string("ContentLocation")?,
            part::CONTENT_ID => attachment.content_id = dec.read_string("ContentID")?,
            _ => (),
        }
    }
    Ok(())
}

/// Multipart body framing from WAP-230-WSP section 8.5.
pub(crate) fn read_multipart(dec: &mut Decoder<'_>) -> Result<Vec<Attachment>, MmsError> {
    let parts = dec.reader.read_uintvar()?;
    dec.note("number of parts", parts);

    let mut attachments = Vec::new();
    for _ in 0..parts {
        let header_length = dec.reader.read_uintvar()? as usize;
        let data_length = dec.reader.read_uintvar()? as usize;
        let header_end = dec.reader.offset() + header_length;
        dec.note("part", format!("len(header): {} - len(data): {}", header_length, data_length));

        let mut attachment = Attachment::default();
        read_content_type_block(dec, &mut attachment)?;
        read_part_headers(dec, &mut attachment, header_end)?;
        dec.reader.seek(header_end)?;
        attachment.data = dec.reader.read_bytes(data_length)?.to_vec();

        if !attachment.charset.is_empty() {
            attachment.media_type = format!("{};charset={}", attachment.media_type, attachment.charset);
        }
        attachments.push(attachment);
    }
    Ok(attachments)
}
