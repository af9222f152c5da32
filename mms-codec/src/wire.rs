//! Basic encoding rules from section 8.4.2.2 of WAP-230-WSP-20010705-a.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    MmsError,
    parameters::{LENGTH_QUOTE, SHORT_LENGTH_MAX, STRING_QUOTE},
};

// Uintvar-integer = 1*5 OCTET
const UINTVAR_MAX_OCTETS: usize = 5;

/// Cursor over a received byte slice. Every reader consumes exactly the
/// octets that make up the value and fails when the cursor would cross the
/// end of the input.
pub(crate) struct WspReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> WspReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn has_more(&self) -> bool {
        self.offset < self.data.len()
    }

    pub(crate) fn peek(&self) -> Result<u8, MmsError> {
        self.data
            .get(self.offset)
            .copied()
            .ok_or_else(|| MmsError::EncodingError(format!("reached end of data at offset {}", self.offset)))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, MmsError> {
        let value = self.peek()?;
        self.offset += 1;
        Ok(value)
    }

    pub(crate) fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], MmsError> {
        let end = self
            .offset
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| MmsError::EncodingError(format!("cannot read {} byte[s] at offset {}, only {} available", count, self.offset, self.data.len() - self.offset)))?;
        let value = &self.data[self.offset..end];
        self.offset = end;
        Ok(value)
    }

    /// Remaining input, consumed in one piece.
    pub(crate) fn read_rest(&mut self) -> &'a [u8] {
        let value = &self.data[self.offset..];
        self.offset = self.data.len();
        value
    }

    /// Repositions the cursor at an absolute offset. Used to close bounded
    /// regions (value-length delimited blocks) regardless of how much of the
    /// region the caller consumed.
    pub(crate) fn seek(&mut self, offset: usize) -> Result<(), MmsError> {
        if offset > self.data.len() {
            return Err(MmsError::EncodingError(format!("cannot seek to {} in {} byte[s] of data", offset, self.data.len())));
        }
        self.offset = offset;
        Ok(())
    }

    /// Short-integer: one octet with the most significant bit set, the value
    /// in the remaining seven bits.
    pub(crate) fn read_short_integer(&mut self) -> Result<u8, MmsError> {
        Ok(self.read_u8()? & 0x7F)
    }

    /// Long-integer = Short-length Multi-octet-integer, most significant
    /// octet first.
    pub(crate) fn read_long_integer(&mut self) -> Result<u64, MmsError> {
        let size = self.read_u8()?;
        if size > SHORT_LENGTH_MAX {
            return Err(MmsError::EncodingError(format!("long integer length was {} but at most {} is allowed", size, SHORT_LENGTH_MAX)));
        }
        let mut value = 0u64;
        for octet in self.read_bytes(size as usize)? {
            value = (value << 8) | u64::from(*octet);
        }
        Ok(value)
    }

    /// Short-integer when the next octet has its high bit set, long-integer
    /// otherwise.
    pub(crate) fn read_integer(&mut self) -> Result<u64, MmsError> {
        if self.peek()? & 0x80 != 0 {
            Ok(u64::from(self.read_short_integer()?))
        } else {
            self.read_long_integer()
        }
    }

    /// Uintvar-integer: seven value bits per octet, most significant first,
    /// the high bit flagging continuation.
    pub(crate) fn read_uintvar(&mut self) -> Result<u64, MmsError> {
        let mut value = 0u64;
        for count in 1.. {
            if count > UINTVAR_MAX_OCTETS {
                return Err(MmsError::EncodingError(format!("uintvar longer than {} octets at offset {}", UINTVAR_MAX_OCTETS, self.offset)));
            }
            let octet = self.read_u8()?;
            value = (value << 7) | u64::from(octet & 0x7F);
            if octet & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    /// Text-string: octets up to a terminating NUL. A leading quote
    /// character marks the string and is not part of the value.
    pub(crate) fn read_text_string(&mut self) -> Result<String, MmsError> {
        if self.peek()? == STRING_QUOTE {
            self.offset += 1;
        }
        let begin = self.offset;
        while self.offset < self.data.len() {
            if self.data[self.offset] == 0 {
                let value = String::from_utf8_lossy(&self.data[begin..self.offset]).into_owned();
                self.offset += 1;
                return Ok(value);
            }
            self.offset += 1;
        }
        Err(MmsError::EncodingError(format!("reached end of data while reading string: {:?}", String::from_utf8_lossy(&self.data[begin..]))))
    }

    /// Value-length = Short-length | (Length-quote Length)
    pub(crate) fn read_value_length(&mut self) -> Result<u64, MmsError> {
        let next = self.peek()?;
        if next <= SHORT_LENGTH_MAX {
            self.offset += 1;
            Ok(u64::from(next))
        } else if next == LENGTH_QUOTE {
            self.offset += 1;
            self.read_uintvar()
        } else {
            Err(MmsError::EncodingError(format!("unhandled length {:#04x} at offset {}", next, self.offset)))
        }
    }
}

/// Append-only writer for the same encoding rules. All integer forms use
/// the minimum-length representation.
pub(crate) struct WspWriter {
    buffer: BytesMut,
}

impl WspWriter {
    pub(crate) fn new() -> Self {
        Self { buffer: BytesMut::new() }
    }

    pub(crate) fn finish(self) -> Bytes {
        self.buffer.freeze()
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.buffer.put_u8(value);
    }

    pub(crate) fn write_bytes(&mut self, value: &[u8]) {
        self.buffer.put_slice(value);
    }

    /// Text-string with the terminating NUL.
    pub(crate) fn write_text_string(&mut self, value: &str) {
        self.buffer.put_slice(value.as_bytes());
        self.buffer.put_u8(0);
    }

    /// Quoted-string: quote character, text, terminating NUL.
    pub(crate) fn write_quoted_string(&mut self, value: &str) {
        self.buffer.put_u8(STRING_QUOTE);
        self.write_text_string(value);
    }

    pub(crate) fn write_short_integer(&mut self, value: u64) {
        self.buffer.put_u8((value as u8) | 0x80);
    }

    pub(crate) fn write_long_integer(&mut self, value: u64) {
        let encoded = encode_long(value);
        self.buffer.put_u8(encoded.len() as u8);
        self.buffer.put_slice(&encoded);
    }

    pub(crate) fn write_integer(&mut self, value: u64) {
        if value < 0x80 {
            self.write_short_integer(value);
        } else {
            self.write_long_integer(value);
        }
    }

    /// Smallest possible encoding; the output never starts with a bare
    /// continuation octet.
    pub(crate) fn write_uintvar(&mut self, value: u64) {
        let mut octets = vec![(value & 0x7F) as u8];
        let mut rest = value >> 7;
        while rest > 0 {
            octets.insert(0, 0x80 | (rest & 0x7F) as u8);
            rest >>= 7;
        }
        self.buffer.put_slice(&octets);
    }

    pub(crate) fn write_value_length(&mut self, length: u64) {
        if length <= u64::from(SHORT_LENGTH_MAX) {
            self.buffer.put_u8(length as u8);
        } else {
            self.buffer.put_u8(LENGTH_QUOTE);
            self.write_uintvar(length);
        }
    }
}

/// Big-endian content octets of an unsigned integer, most significant octet
/// first, no leading zero octets. Zero encodes to no octets.
pub(crate) fn encode_long(value: u64) -> Vec<u8> {
    let mut encoded = Vec::new();
    let mut rest = value;
    while rest > 0 {
        encoded.insert(0, (rest & 0xFF) as u8);
        rest >>= 8;
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut WspWriter)) -> Vec<u8> {
        let mut writer = WspWriter::new();
        f(&mut writer);
        writer.finish().to_vec()
    }

    #[test]
    fn it_round_trips_short_integers() -> Result<(), anyhow::Error> {
        for value in 0u64..=127 {
            let bytes = written(|w| w.write_short_integer(value));
            assert_eq!(bytes, vec![(value as u8) | 0x80]);
            assert_eq!(WspReader::new(&bytes).read_short_integer()?, value as u8);
        }
        Ok(())
    }

    #[test]
    fn it_round_trips_long_integers_with_minimum_length() -> Result<(), anyhow::Error> {
        for (value, expected_len) in [(0u64, 0usize), (1, 1), (255, 1), (256, 2), (1000, 2), (0x0102_0304, 4), (u64::MAX, 8)] {
            let bytes = written(|w| w.write_long_integer(value));
            assert_eq!(bytes[0] as usize, expected_len);
            assert_eq!(bytes.len(), expected_len + 1);
            assert_eq!(WspReader::new(&bytes).read_long_integer()?, value);
        }
        Ok(())
    }

    #[test]
    fn it_rejects_oversized_long_integers() {
        let mut bytes = vec![31u8];
        bytes.extend(std::iter::repeat(0xFF).take(31));
        assert!(WspReader::new(&bytes).read_long_integer().is_err());
    }

    #[test]
    fn it_dispatches_integer_encoding_on_magnitude() -> Result<(), anyhow::Error> {
        assert_eq!(written(|w| w.write_integer(0x45)), vec![0xC5]);
        assert_eq!(written(|w| w.write_integer(0x80)), vec![0x01, 0x80]);
        for value in [0u64, 1, 127, 128, 300, 70000] {
            let bytes = written(|w| w.write_integer(value));
            assert_eq!(WspReader::new(&bytes).read_integer()?, value);
        }
        Ok(())
    }

    #[test]
    fn it_round_trips_uintvars_with_shortest_encoding() -> Result<(), anyhow::Error> {
        for (value, expected_len) in [(0u64, 1usize), (0x7F, 1), (0x80, 2), (0x3FFF, 2), (0x4000, 3), (0x001F_FFFF, 3), (0x0020_0000, 4), (0x07FF_FFFF_u64, 4)] {
            let bytes = written(|w| w.write_uintvar(value));
            assert_eq!(bytes.len(), expected_len, "length for {:#x}", value);
            assert_ne!(bytes[0], 0x80, "leading continuation zero for {:#x}", value);
            assert_eq!(WspReader::new(&bytes).read_uintvar()?, value);
        }
        Ok(())
    }

    #[test]
    fn it_rejects_unterminated_uintvars() {
        assert!(WspReader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x01]).read_uintvar().is_err());
        assert!(WspReader::new(&[0x80, 0x80]).read_uintvar().is_err());
    }

    #[test]
    fn it_reads_text_strings() -> Result<(), anyhow::Error> {
        let mut reader = WspReader::new(b"hello\0world\0");
        assert_eq!(reader.read_text_string()?, "hello");
        assert_eq!(reader.read_text_string()?, "world");
        assert!(!reader.has_more());

        // A leading quote marks the string and is dropped.
        assert_eq!(WspReader::new(b"\"quoted\0").read_text_string()?, "quoted");
        assert!(WspReader::new(b"unterminated").read_text_string().is_err());
        Ok(())
    }

    #[test]
    fn it_writes_quoted_strings() {
        assert_eq!(written(|w| w.write_quoted_string("cid")), b"\"cid\0");
    }

    #[test]
    fn it_round_trips_value_lengths() -> Result<(), anyhow::Error> {
        for (value, expected) in [(0u64, vec![0u8]), (30, vec![30]), (31, vec![31, 31]), (1000, vec![31, 0x87, 0x68])] {
            let bytes = written(|w| w.write_value_length(value));
            assert_eq!(bytes, expected);
            assert_eq!(WspReader::new(&bytes).read_value_length()?, value);
        }
        assert!(WspReader::new(&[0x45]).read_value_length().is_err());
        Ok(())
    }

    #[test]
    fn it_fails_reads_past_the_end() {
        let mut reader = WspReader::new(&[0x01]);
        assert!(reader.read_bytes(2).is_err());
        assert_eq!(reader.offset(), 0);
        reader.read_u8().unwrap();
        assert!(reader.read_u8().is_err());
        assert!(WspReader::new(&[]).read_long_integer().is_err());
    }
}
