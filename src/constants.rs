// Can this ever change?
pub const CHALLENGE_SIZE_BYTES: usize = 32;
pub const AUTHENTICATOR_TIMEOUT: u32 = 60000;

/// The only U2F protocol version we accept.
pub const U2F_PROTOCOL_VERSION: &str = "U2F_V2";

/// Uncompressed P-256 point: 0x04 || x || y
pub const U2F_PUBLIC_KEY_LENGTH: usize = 65;
pub const U2F_RESERVED_BYTE: u8 = 0x05;

pub const CLIENT_DATA_TYPE_CREATE: &str = "webauthn.create";
pub const CLIENT_DATA_TYPE_GET: &str = "webauthn.get";
pub const CLIENT_DATA_TYPE_U2F_REGISTER: &str = "navigator.id.finishEnrollment";
pub const CLIENT_DATA_TYPE_U2F_SIGN: &str = "navigator.id.getAssertion";

pub const PUBLIC_KEY_CREDENTIAL_TYPE: &str = "public-key";

// Authenticator data flags
//   [ ED | AT | RFU2 RFU2 RFU2 | UV | RFU1 | UP ]
//     7    6    5    4    3      2    1      0
pub const FLAG_USER_PRESENT: u8 = 0x01;
pub const FLAG_USER_VERIFIED: u8 = 0x04;
pub const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
pub const FLAG_EXTENSION_DATA: u8 = 0x80;

pub const RP_ID_HASH_LEN: usize = 32;
pub const AAGUID_LEN: usize = 16;

// SubjectPublicKeyInfo header for an uncompressed P-256 point:
//   SEQUENCE { SEQUENCE { id-ecPublicKey, prime256v1 }, BIT STRING (0 unused bits) }
pub const P256_SPKI_DER_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08, 0x2a,
    0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

pub const PACKED_ATTESTATION_SUBJECT_OU: &str = "Authenticator Attestation";
