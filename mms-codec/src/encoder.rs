//! Header and body serialisation shared by the per-PDU encode functions.
//! Every field is written as a parameter tag (identifier with the high bit
//! set) followed by its WSP-encoded value.

use bytes::Bytes;

use crate::{
    api::EXPIRY_TOKEN_RELATIVE,
    attachment::Attachment,
    decoder::TOKEN_INSERT_ADDRESS,
    parameters::{content_type_code, header, param},
    wire::{WspWriter, encode_long},
};

pub(crate) struct Encoder {
    writer: WspWriter,
}

impl Encoder {
    pub(crate) fn new() -> Self {
        Self { writer: WspWriter::new() }
    }

    pub(crate) fn finish(self) -> Bytes {
        self.writer.finish()
    }

    pub(crate) fn write_header(&mut self, tag: u8) {
        self.writer.write_u8(tag | 0x80);
    }

    pub(crate) fn write_byte_param(&mut self, tag: u8, value: u8) {
        self.write_header(tag);
        self.writer.write_u8(value);
    }

    /// Text-string parameter; an empty value is not transmitted.
    pub(crate) fn write_string_param(&mut self, tag: u8, value: &str) {
        if value.is_empty() {
            return;
        }
        self.write_header(tag);
        self.writer.write_text_string(value);
    }

    /// Quoted-string parameter; an empty value is not transmitted.
    pub(crate) fn write_quoted_string_param(&mut self, tag: u8, value: &str) {
        if value.is_empty() {
            return;
        }
        self.write_header(tag);
        self.writer.write_quoted_string(value);
    }

    pub(crate) fn write_long_integer_param(&mut self, tag: u8, value: u64) {
        self.write_header(tag);
        self.writer.write_long_integer(value);
    }

    /// From-value carrying the insert-address token: the carrier fills in
    /// the sender address.
    pub(crate) fn write_from_insert_address(&mut self) {
        self.write_header(header::FROM);
        self.writer.write_u8(1);
        self.writer.write_u8(TOKEN_INSERT_ADDRESS);
    }

    /// Expiry-value with the relative token and the seconds as a
    /// length-prefixed long-integer.
    pub(crate) fn write_relative_expiry(&mut self, seconds: u64) {
        self.write_header(header::EXPIRY);
        let encoded = encode_long(seconds);
        self.writer.write_u8(encoded.len() as u8 + 2);
        self.writer.write_u8(EXPIRY_TOKEN_RELATIVE);
        self.writer.write_u8(encoded.len() as u8);
        self.writer.write_bytes(&encoded);
    }

    /// Media-type on its own: the well-known code, or a length-prefixed
    /// text string.
    pub(crate) fn write_media_type(&mut self, media: &str) {
        match content_type_code(media) {
            Some(code) => self.writer.write_integer(code),
            None => {
                self.writer.write_value_length(media.len() as u64 + 1);
                self.writer.write_text_string(media);
            }
        }
    }

    /// Content-type block: media-type plus the start/type/name parameters in
    /// their defunct short forms (0x8A, 0x89, 0x85).
    pub(crate) fn write_content_type(&mut self, media: &str, start: &str, content_type: &str, name: &str) {
        if start.is_empty() && content_type.is_empty() && name.is_empty() {
            return self.write_media_type(media);
        }

        let mut parameters = WspWriter::new();
        if !start.is_empty() {
            parameters.write_u8(param::START_DEFUNCT as u8 | 0x80);
            parameters.write_text_string(start);
        }
        if !content_type.is_empty() {
            parameters.write_u8(param::CONTENT_TYPE as u8 | 0x80);
            parameters.write_text_string(content_type);
        }
        if !name.is_empty() {
            parameters.write_u8(param::NAME_DEFUNCT as u8 | 0x80);
            parameters.write_text_string(name);
        }
        let parameters = parameters.finish();

        match content_type_code(media) {
            Some(code) => {
                // The well-known codes all fit a single short-integer octet.
                self.writer.write_value_length(parameters.len() as u64 + 1);
                self.writer.write_integer(code);
            }
            None => {
                self.writer.write_value_length(media.len() as u64 + 1 + parameters.len() as u64);
                self.writer.write_text_string(media);
            }
        }
        self.writer.write_bytes(&parameters);
    }

    /// Multipart body framing from WAP-230-WSP section 8.5: part count,
    /// then per part the header length, data length, headers and data.
    pub(crate) fn write_attachments(&mut self, attachments: &[Attachment]) {
        self.writer.write_uintvar(attachments.len() as u64);
        for attachment in attachments {
            let headers = attachment.encode_headers();
            self.writer.write_uintvar(headers.len() as u64);
            self.writer.write_uintvar(attachment.data.len() as u64);
            self.writer.write_bytes(&headers);
            self.writer.write_bytes(&attachment.data);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_writes_byte_and_string_params() {
        let mut enc = Encoder::new();
        enc.write_byte_param(header::MMS_VERSION, 0x92);
        enc.write_string_param(header::TRANSACTION_ID, "AB");
        enc.write_string_param(header::SUBJECT, "");
        assert_eq!(enc.finish().to_vec(), vec![0x8D, 0x92, 0x98, b'A', b'B', 0x00]);
    }

    #[test]
    fn it_writes_the_insert_address_token() {
        let mut enc = Encoder::new();
        enc.write_from_insert_address();
        assert_eq!(enc.finish().to_vec(), vec![0x89, 0x01, 0x81]);
    }

    #[test]
    fn it_writes_relative_expiry() {
        let mut enc = Encoder::new();
        enc.write_relative_expiry(1000);
        assert_eq!(enc.finish().to_vec(), vec![0x88, 0x04, 0x81, 0x02, 0x03, 0xE8]);
    }

    #[test]
    fn it_writes_well_known_and_text_media_types() {
        let mut enc = Encoder::new();
        enc.write_media_type("image/jpeg");
        assert_eq!(enc.finish().to_vec(), vec![0x9E]);

        let mut enc = Encoder::new();
        enc.write_media_type("application/smil");
        let mut expected = vec![17u8];
        expected.extend(b"application/smil\0");
        assert_eq!(enc.finish().to_vec(), expected);
    }

    #[test]
    fn it_writes_content_type_blocks_with_parameters() {
        let mut enc = Encoder::new();
        enc.write_content_type("application/vnd.wap.multipart.mixed", "<smil>", "application/smil", "");
        let bytes = enc.finish().to_vec();

        let mut expected = vec![];
        expected.push(0x8A);
        expected.extend(b"<smil>\0");
        expected.push(0x89);
        expected.extend(b"application/smil\0");
        let mut framed = vec![expected.len() as u8 + 1, 0xA3];
        framed.extend(&expected);
        assert_eq!(bytes, framed);
    }
}
