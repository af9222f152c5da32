//! Pull-parser plumbing shared by the per-PDU decode functions. The header
//! stream is a sequence of parameter tags (OMA-WAP-MMS section 7.3) with
//! WSP-encoded values; the [`Decoder`] keeps the cursor and a textual trace
//! of everything it assigned, for diagnostics when a PDU is rejected.

use std::fmt::Write;

use crate::{
    MmsError,
    api::{EXPIRY_TOKEN_ABSOLUTE, EXPIRY_TOKEN_RELATIVE},
    parameters::{ANY_CHARSET, LENGTH_QUOTE, SHORT_LENGTH_MAX, TEXT_MAX, TEXT_MIN, charset_name, content_type_name},
    wire::WspReader,
};

// From tokens defined in OMA-WAP-MMS section 7.2.11
pub(crate) const TOKEN_ADDRESS_PRESENT: u8 = 0x80;
pub(crate) const TOKEN_INSERT_ADDRESS: u8 = 0x81;

pub(crate) struct Decoder<'a> {
    pub(crate) reader: WspReader<'a>,
    trace: String,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { reader: WspReader::new(data), trace: String::new() }
    }

    pub(crate) fn trace(&self) -> &str {
        &self.trace
    }

    pub(crate) fn note(&mut self, name: &str, value: impl std::fmt::Display) {
        let _ = writeln!(self.trace, "{}: {}", name, value);
    }

    pub(crate) fn has_more(&self) -> bool {
        self.reader.has_more()
    }

    /// Reads the next parameter tag. Well-known headers are short-integer
    /// encoded; application-defined headers are a text name/value pair and
    /// are consumed and dropped, yielding `None`.
    pub(crate) fn next_header(&mut self) -> Result<Option<u8>, MmsError> {
        if self.reader.peek()? & 0x80 != 0 {
            return Ok(Some(self.reader.read_u8()? & 0x7F));
        }
        let name = self.reader.read_text_string()?;
        let value = self.reader.read_text_string()?;
        self.note("ignoring application header", format!("{}: {}", name, value));
        Ok(None)
    }

    /// Unknown message types are discarded, OMA-WAP-MMS-ENC section 7.2.16.
    pub(crate) fn expect_message_type(&mut self, expected: u8) -> Result<(), MmsError> {
        let parsed = self.reader.read_u8()?;
        if parsed != expected {
            return Err(MmsError::EncodingError(format!("expected message type {:#04x} got {:#04x}", expected, parsed)));
        }
        self.note("MessageType", format!("{:#04x}", parsed));
        Ok(())
    }

    pub(crate) fn read_byte(&mut self, name: &str) -> Result<u8, MmsError> {
        let value = self.reader.read_u8()?;
        self.note(name, value);
        Ok(value)
    }

    pub(crate) fn read_string(&mut self, name: &str) -> Result<String, MmsError> {
        let value = self.reader.read_text_string()?;
        self.note(name, &value);
        Ok(value)
    }

    pub(crate) fn read_long(&mut self, name: &str) -> Result<u64, MmsError> {
        let value = self.reader.read_long_integer()?;
        self.note(name, value);
        Ok(value)
    }

    /// Well-known-charset: the any-charset token, or an integer code from
    /// the charset table.
    pub(crate) fn read_charset(&mut self) -> Result<&'static str, MmsError> {
        if self.reader.peek()? == ANY_CHARSET {
            self.reader.read_u8()?;
            return Ok("*");
        }
        let code = self.reader.read_integer()?;
        charset_name(code).ok_or_else(|| MmsError::EncodingError(format!("cannot find matching charset for {:#04x} == {}", code, code)))
    }

    /// Encoded-string-value: optional value-length and charset in front of
    /// the text itself.
    pub(crate) fn read_encoded_string(&mut self, name: &str) -> Result<String, MmsError> {
        let next = self.reader.peek()?;
        let length = if next < SHORT_LENGTH_MAX {
            u64::from(self.reader.read_u8()?)
        } else if next == LENGTH_QUOTE {
            self.reader.read_u8()?;
            self.reader.read_uintvar()?
        } else {
            0
        };
        if length != 0 {
            let charset = self.read_charset()?;
            self.note("next string encoded with", charset);
        }
        self.read_string(name)
    }

    /// From-value: the carrier either inserts the address or carries it as
    /// an encoded string. An insert-address token yields the empty string.
    pub(crate) fn read_from(&mut self) -> Result<String, MmsError> {
        let length = self.reader.read_value_length()? as usize;
        let end = self.reader.offset() + length;
        let token = self.reader.read_u8()?;
        let from = match token {
            TOKEN_INSERT_ADDRESS => String::new(),
            TOKEN_ADDRESS_PRESENT => {
                let from = self.read_encoded_string("From")?;
                if self.reader.offset() != end {
                    return Err(MmsError::EncodingError(format!("From field ends at {} but expected {}", self.reader.offset(), end)));
                }
                from
            }
            x => return Err(MmsError::EncodingError(format!("unhandled address token {:#04x} in From field", x))),
        };
        self.reader.seek(end)?;
        Ok(from)
    }

    /// Expiry-value: value-length, an absolute/relative token, then the
    /// seconds as a long-integer.
    pub(crate) fn read_expiry(&mut self) -> Result<u64, MmsError> {
        let length = self.reader.read_value_length()? as usize;
        let end = self.reader.offset() + length;
        let token = self.reader.read_u8()?;
        if token != EXPIRY_TOKEN_ABSOLUTE && token != EXPIRY_TOKEN_RELATIVE {
            return Err(MmsError::EncodingError(format!("unhandled expiry token {:#04x}", token)));
        }
        let value = self.reader.read_long_integer()?;
        self.note("Expiry", format!("{} (token {:#04x})", value, token));
        self.reader.seek(end)?;
        Ok(value)
    }

    /// Media-type: a text string or a well-known content-type code.
    pub(crate) fn read_media_type(&mut self) -> Result<String, MmsError> {
        let next = self.reader.peek()?;
        if (TEXT_MIN..=TEXT_MAX).contains(&next) {
            return self.read_string("MediaType");
        }
        let offset = self.reader.offset();
        let code = self.reader.read_integer()?;
        match content_type_name(code) {
            Some(media) => {
                self.note("MediaType", media);
                Ok(media.to_string())
            }
            None => Err(MmsError::EncodingError(format!("cannot decode media type for field beginning with {:#04x}@{}", next, offset))),
        }
    }

    /// Skips a header value of unknown semantics by inferring its length
    /// from the encoding: length-prefixed, text, or single short-integer.
    pub(crate) fn skip_field_value(&mut self, tag: u8) -> Result<(), MmsError> {
        tracing::debug!("skipping unrecognized header {:#04x}", tag);
        self.note("skipping header", format!("{:#04x}", tag));
        let next = self.reader.peek()?;
        if next < LENGTH_QUOTE {
            let length = self.reader.read_u8()? as usize;
            self.reader.read_bytes(length)?;
        } else if next == LENGTH_QUOTE {
            self.reader.read_u8()?;
            let length = self.reader.read_uintvar()? as usize;
            self.reader.read_bytes(length)?;
        } else if next <= TEXT_MAX {
            self.reader.read_text_string()?;
        } else {
            self.reader.read_u8()?;
        }
        Ok(())
    }
}

/// Wraps a decode failure with everything decoded so far, the way the
/// failure is reported to the journal.
pub(crate) fn with_trace(error: MmsError, decoder: &Decoder<'_>) -> MmsError {
    match error {
        MmsError::EncodingError(message) if !decoder.trace().is_empty() => MmsError::EncodingError(format!("{}; decoded so far:\n{}", message, decoder.trace())),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_reads_well_known_and_application_headers() -> Result<(), anyhow::Error> {
        let mut data = vec![];
        data.extend(b"X-Custom\0value\0");
        data.push(0x98);
        let mut dec = Decoder::new(&data);
        assert_eq!(dec.next_header()?, None);
        assert_eq!(dec.next_header()?, Some(0x18));
        assert!(dec.trace().contains("X-Custom"));
        Ok(())
    }

    #[test]
    fn it_rejects_unexpected_message_types() {
        let mut dec = Decoder::new(&[0x84]);
        assert!(dec.expect_message_type(0x82).is_err());
    }

    #[test]
    fn it_reads_encoded_strings_with_and_without_charset() -> Result<(), anyhow::Error> {
        // Charset-tagged: value-length, utf-8, text.
        let mut dec = Decoder::new(&[0x0B, 0xEA, b'h', b'o', b'l', b'a', 0x00]);
        assert_eq!(dec.read_encoded_string("Subject")?, "hola");

        // Bare text string.
        let mut dec = Decoder::new(b"plain\0");
        assert_eq!(dec.read_encoded_string("Subject")?, "plain");
        Ok(())
    }

    #[test]
    fn it_reads_charsets() -> Result<(), anyhow::Error> {
        assert_eq!(Decoder::new(&[ANY_CHARSET]).read_charset()?, "*");
        assert_eq!(Decoder::new(&[0xEA]).read_charset()?, "utf-8");
        assert!(Decoder::new(&[0x82]).read_charset().is_err());
        Ok(())
    }

    #[test]
    fn it_reads_from_tokens() -> Result<(), anyhow::Error> {
        let mut dec = Decoder::new(&[0x01, TOKEN_INSERT_ADDRESS]);
        assert_eq!(dec.read_from()?, "");

        let mut data = vec![0x09, TOKEN_ADDRESS_PRESENT];
        data.extend(b"+341234\0");
        let mut dec = Decoder::new(&data);
        assert_eq!(dec.read_from()?, "+341234");

        assert!(Decoder::new(&[0x01, 0x42]).read_from().is_err());
        Ok(())
    }

    #[test]
    fn it_reads_expiry_values() -> Result<(), anyhow::Error> {
        // Relative, 1000 seconds: token + long-integer.
        let mut dec = Decoder::new(&[0x04, EXPIRY_TOKEN_RELATIVE, 0x02, 0x03, 0xE8]);
        assert_eq!(dec.read_expiry()?, 1000);

        let mut dec = Decoder::new(&[0x04, 0x42, 0x02, 0x03, 0xE8]);
        assert!(dec.read_expiry().is_err());
        Ok(())
    }

    #[test]
    fn it_skips_unknown_field_values() -> Result<(), anyhow::Error> {
        // Length-prefixed value, then a trailing tag that must stay aligned.
        let mut dec = Decoder::new(&[0x03, 0xAA, 0xBB, 0xCC, 0x98]);
        dec.skip_field_value(0x20)?;
        assert_eq!(dec.next_header()?, Some(0x18));

        // Text value.
        let mut dec = Decoder::new(b"ignored\0\x98");
        dec.skip_field_value(0x20)?;
        assert_eq!(dec.next_header()?, Some(0x18));

        // Single byte value.
        let mut dec = Decoder::new(&[0x85, 0x98]);
        dec.skip_field_value(0x20)?;
        assert_eq!(dec.next_header()?, Some(0x18));
        Ok(())
    }
}
