use thiserror::Error;

#[derive(Error, Debug)]
pub enum MmsError {
    #[error("Encoding Error - {}", .0)]
    EncodingError(String),

    #[error("MMS Error: {}", .0)]
    InternalError(String),
}

// Message versions from OMA-WAP-MMS-ENC section 7.2.18. The raw octet is
// carried as-is in the PDU records.
pub const MMS_MESSAGE_VERSION_1_0: u8 = 0x90;
pub const MMS_MESSAGE_VERSION_1_1: u8 = 0x91;
pub const MMS_MESSAGE_VERSION_1_2: u8 = 0x92;
pub const MMS_MESSAGE_VERSION_1_3: u8 = 0x93;

// Delivery Report defined in OMA-WAP-MMS section 7.2.6
pub const DELIVERY_REPORT_YES: u8 = 128;
pub const DELIVERY_REPORT_NO: u8 = 129;

// Expiry tokens defined in OMA-WAP-MMS section 7.2.10
pub const EXPIRY_TOKEN_ABSOLUTE: u8 = 128;
pub const EXPIRY_TOKEN_RELATIVE: u8 = 129;

// Message classes defined in OMA-WAP-MMS section 7.2.14
pub const CLASS_PERSONAL: u8 = 128;
pub const CLASS_ADVERTISEMENT: u8 = 129;
pub const CLASS_INFORMATIONAL: u8 = 130;
pub const CLASS_AUTO: u8 = 131;

// Read Report defined in OMA-WAP-MMS section 7.2.20
pub const READ_REPORT_YES: u8 = 128;
pub const READ_REPORT_NO: u8 = 129;

// Report Allowed defined in OMA-WAP-MMS section 7.2.26
pub const REPORT_ALLOWED_YES: u8 = 128;
pub const REPORT_ALLOWED_NO: u8 = 129;

// Status defined in OMA-WAP-MMS section 7.2.23
pub const STATUS_EXPIRED: u8 = 128;
pub const STATUS_RETRIEVED: u8 = 129;
pub const STATUS_REJECTED: u8 = 130;
pub const STATUS_DEFERRED: u8 = 131;
pub const STATUS_UNRECOGNIZED: u8 = 132;

// Response Status defined in OMA-WAP-MMS section 7.2.27.
//
// A client must react to a value in range 192 to 223 as it does to 192
// (Error-transient-failure) and to a value in range 224 to 255 as it does
// to 224 (Error-permanent-failure). Reserved values are treated as 224.
pub const RESPONSE_STATUS_OK: u8 = 128;
pub const RESPONSE_STATUS_ERROR_UNSPECIFIED: u8 = 129; // Obsolete
pub const RESPONSE_STATUS_ERROR_SERVICE_DENIED: u8 = 130; // Obsolete
pub const RESPONSE_STATUS_ERROR_MESSAGE_FORMAT_CORRUPT: u8 = 131; // Obsolete
pub const RESPONSE_STATUS_ERROR_SENDING_ADDRESS_UNRESOLVED: u8 = 132; // Obsolete
pub const RESPONSE_STATUS_ERROR_MESSAGE_NOT_FOUND: u8 = 133; // Obsolete
pub const RESPONSE_STATUS_ERROR_NETWORK_PROBLEM: u8 = 134; // Obsolete
pub const RESPONSE_STATUS_ERROR_CONTENT_NOT_ACCEPTED: u8 = 135; // Obsolete
pub const RESPONSE_STATUS_ERROR_UNSUPPORTED_MESSAGE: u8 = 136;

pub const RESPONSE_STATUS_ERROR_TRANSIENT_FAILURE: u8 = 192;
pub const RESPONSE_STATUS_ERROR_TRANSIENT_MAX_RESERVED: u8 = 223;

pub const RESPONSE_STATUS_ERROR_PERMANENT_FAILURE: u8 = 224;
pub const RESPONSE_STATUS_ERROR_PERMANENT_MAX_RESERVED: u8 = 255;

/// Classification of an `m-send.conf` response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    TransientFailure,
    PermanentFailure,
}
