//! Static assignment tables from OMA-WAP-MMS section 7.3 and
//! WAP-230-WSP-20010705-a.

/// Header field assignments from OMA-WAP-MMS section 7.3 Table 12.
pub mod header {
    pub const BCC: u8 = 0x01;
    pub const CC: u8 = 0x02;
    pub const CONTENT_LOCATION: u8 = 0x03;
    pub const CONTENT_TYPE: u8 = 0x04;
    pub const DATE: u8 = 0x05;
    pub const DELIVERY_REPORT: u8 = 0x06;
    pub const DELIVERY_TIME: u8 = 0x07;
    pub const EXPIRY: u8 = 0x08;
    pub const FROM: u8 = 0x09;
    pub const MESSAGE_CLASS: u8 = 0x0A;
    pub const MESSAGE_ID: u8 = 0x0B;
    pub const MESSAGE_TYPE: u8 = 0x0C;
    pub const MMS_VERSION: u8 = 0x0D;
    pub const MESSAGE_SIZE: u8 = 0x0E;
    pub const PRIORITY: u8 = 0x0F;
    pub const READ_REPORT: u8 = 0x10;
    pub const REPORT_ALLOWED: u8 = 0x11;
    pub const RESPONSE_STATUS: u8 = 0x12;
    pub const RESPONSE_TEXT: u8 = 0x13;
    pub const SENDER_VISIBILITY: u8 = 0x14;
    pub const STATUS: u8 = 0x15;
    pub const SUBJECT: u8 = 0x16;
    pub const TO: u8 = 0x17;
    pub const TRANSACTION_ID: u8 = 0x18;
    pub const RETRIEVE_STATUS: u8 = 0x19;
    pub const RETRIEVE_TEXT: u8 = 0x1A;
    pub const READ_STATUS: u8 = 0x1B;
    pub const REPLY_CHARGING: u8 = 0x1C;
    pub const REPLY_CHARGING_DEADLINE: u8 = 0x1D;
    pub const REPLY_CHARGING_ID: u8 = 0x1E;
    pub const REPLY_CHARGING_SIZE: u8 = 0x1F;
    pub const PREVIOUSLY_SENT_BY: u8 = 0x20;
    pub const PREVIOUSLY_SENT_DATE: u8 = 0x21;
}

/// Well-Known Parameter Assignments from WAP-230-WSP Table 38.
pub mod param {
    pub const Q: u64 = 0x00; // Version 1.1 Q-value
    pub const CHARSET: u64 = 0x01; // Version 1.1 Well-known-charset
    pub const LEVEL: u64 = 0x02; // Version 1.1 Version-value
    pub const TYPE: u64 = 0x03; // Version 1.1 Integer-value
    pub const NAME_DEFUNCT: u64 = 0x05; // Version 1.1 Text-string
    pub const FILENAME_DEFUNCT: u64 = 0x06; // Version 1.1 Text-string
    pub const DIFFERENCES: u64 = 0x07; // Version 1.1 Field-name
    pub const PADDING: u64 = 0x08; // Version 1.1 Short-integer
    pub const CONTENT_TYPE: u64 = 0x09; // Version 1.2 Constrained-encoding
    pub const START_DEFUNCT: u64 = 0x0A; // Version 1.2 Text-string
    pub const START_INFO_DEFUNCT: u64 = 0x0B; // Version 1.2 Text-string
    pub const COMMENT_DEFUNCT: u64 = 0x0C; // Version 1.3 Text-string
    pub const DOMAIN_DEFUNCT: u64 = 0x0D; // Version 1.3 Text-string
    pub const MAX_AGE: u64 = 0x0E; // Version 1.3 Delta-seconds-value
    pub const PATH_DEFUNCT: u64 = 0x0F; // Version 1.3 Text-string
    pub const SECURE: u64 = 0x10; // Version 1.3 No-value
    pub const SEC: u64 = 0x11; // Version 1.4 Short-integer
    pub const MAC: u64 = 0x12; // Version 1.4 Text-value
    pub const CREATION_DATE: u64 = 0x13; // Version 1.4 Date-value
    pub const MODIFICATION_DATE: u64 = 0x14; // Version 1.4 Date-value
    pub const READ_DATE: u64 = 0x15; // Version 1.4 Date-value
    pub const SIZE: u64 = 0x16; // Version 1.4 Integer-value
    pub const NAME: u64 = 0x17; // Version 1.4 Text-value
    pub const FILENAME: u64 = 0x18; // Version 1.4 Text-value
    pub const START: u64 = 0x19; // Version 1.4 Text-value
    pub const START_INFO: u64 = 0x1A; // Version 1.4 Text-value
    pub const COMMENT: u64 = 0x1B; // Version 1.4 Text-value
    pub const DOMAIN: u64 = 0x1C; // Version 1.4 Text-value
    pub const PATH: u64 = 0x1D; // Version 1.4 Text-value
    pub const UNTYPED: u64 = 0xFF; // Version 1.4 Text-value
}

/// Multipart part-header assignments used inside attachment headers.
pub mod part {
    pub const CONTENT_LOCATION: u64 = 0x0E;
    pub const CONTENT_ID: u64 = 0x40;
}

pub(crate) const TEXT_MIN: u8 = 32;
pub(crate) const TEXT_MAX: u8 = 127;
pub(crate) const SHORT_LENGTH_MAX: u8 = 30;
pub(crate) const LENGTH_QUOTE: u8 = 31;
pub(crate) const STRING_QUOTE: u8 = 34;
pub(crate) const SHORT_FILTER: u8 = 0x80;
pub(crate) const ANY_CHARSET: u8 = 128;

/// Well-known content types from WAP-230-WSP Table 40 (appendix A). The
/// index in this table is the assigned number.
pub(crate) const CONTENT_TYPES: &[&str] = &[
    "*/*",
    "text/*",
    "text/html",
    "text/plain",
    "text/x-hdml",
    "text/x-ttml",
    "text/x-vCalendar",
    "text/x-vCard",
    "text/vnd.wap.wml",
    "text/vnd.wap.wmlscript",
    "text/vnd.wap.wta-event",
    "multipart/*",
    "multipart/mixed",
    "multipart/form-data",
    "multipart/byterantes",
    "multipart/alternative",
    "application/*",
    "application/java-vm",
    "application/x-www-form-urlencoded",
    "application/x-hdmlc",
    "application/vnd.wap.wmlc",
    "application/vnd.wap.wmlscriptc",
    "application/vnd.wap.wta-eventc",
    "application/vnd.wap.uaprof",
    "application/vnd.wap.wtls-ca-certificate",
    "application/vnd.wap.wtls-user-certificate",
    "application/x-x509-ca-cert",
    "application/x-x509-user-cert",
    "image/*",
    "image/gif",
    "image/jpeg",
    "image/tiff",
    "image/png",
    "image/vnd.wap.wbmp",
    "application/vnd.wap.multipart.*",
    "application/vnd.wap.multipart.mixed",
    "application/vnd.wap.multipart.form-data",
    "application/vnd.wap.multipart.byteranges",
    "application/vnd.wap.multipart.alternative",
    "application/xml",
    "text/xml",
    "application/vnd.wap.wbxml",
    "application/x-x968-cross-cert",
    "application/x-x968-ca-cert",
    "application/x-x968-user-cert",
    "text/vnd.wap.si",
    "application/vnd.wap.sic",
    "text/vnd.wap.sl",
    "application/vnd.wap.slc",
    "text/vnd.wap.co",
    "application/vnd.wap.coc",
    "application/vnd.wap.multipart.related",
    "application/vnd.wap.sia",
    "text/vnd.wap.connectivity-xml",
    "application/vnd.wap.connectivity-wbxml",
    "application/pkcs7-mime",
    "application/vnd.wap.hashed-certificate",
    "application/vnd.wap.signed-certificate",
    "application/vnd.wap.cert-response",
    "application/xhtml+xml",
    "application/wml+xml",
    "text/css",
    "application/vnd.wap.mms-message",
    "application/vnd.wap.rollover-certificate",
    "application/vnd.wap.locc+wbxml",
    "application/vnd.wap.loc+xml",
    "application/vnd.syncml.dm+wbxml",
    "application/vnd.syncml.dm+xml",
    "application/vnd.syncml.notification",
    "application/vnd.wap.xhtml+xml",
    "application/vnd.wv.csp.cir",
    "application/vnd.oma.dd+xml",
    "application/vnd.oma.drm.message",
    "application/vnd.oma.drm.content",
    "application/vnd.oma.drm.rights+xml",
    "application/vnd.oma.drm.rights+wbxml",
];

pub(crate) fn content_type_name(code: u64) -> Option<&'static str> {
    CONTENT_TYPES.get(usize::try_from(code).ok()?).copied()
}

pub(crate) fn content_type_code(media: &str) -> Option<u64> {
    CONTENT_TYPES.iter().position(|x| *x == media).map(|x| x as u64)
}

/// Well-known character set assignments (IANA MIBenum values) from
/// WAP-230-WSP Table 42.
pub(crate) fn charset_name(code: u64) -> Option<&'static str> {
    match code {
        0x03 => Some("us-ascii"),
        0x04 => Some("iso-8859-1"),
        0x05 => Some("iso-8859-2"),
        0x06 => Some("iso-8859-3"),
        0x07 => Some("iso-8859-4"),
        0x08 => Some("iso-8859-5"),
        0x09 => Some("iso-8859-6"),
        0x0A => Some("iso-8859-7"),
        0x0B => Some("iso-8859-8"),
        0x0C => Some("iso-8859-9"),
        0x11 => Some("shift_JIS"),
        0x6A => Some("utf-8"),
        0x03E8 => Some("iso-10646-ucs-2"),
        0x07EA => Some("big5"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_maps_well_known_content_types_both_ways() {
        assert_eq!(content_type_name(0x23), Some("application/vnd.wap.multipart.mixed"));
        assert_eq!(content_type_name(0x33), Some("application/vnd.wap.multipart.related"));
        assert_eq!(content_type_name(0x3E), Some("application/vnd.wap.mms-message"));
        assert_eq!(content_type_code("application/vnd.wap.multipart.mixed"), Some(0x23));
        assert_eq!(content_type_code("image/jpeg"), Some(0x1E));
        assert_eq!(content_type_code("text/plain"), Some(0x03));
        assert_eq!(content_type_code("application/smil"), None);
        assert_eq!(content_type_name(500), None);
    }

    #[test]
    fn it_maps_charsets() {
        assert_eq!(charset_name(0x6A), Some("utf-8"));
        assert_eq!(charset_name(0x03E8), Some("iso-10646-ucs-2"));
        assert_eq!(charset_name(0x02), None);
    }
}
