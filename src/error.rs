//! Possible errors that may occur during Webauthn and U2F operation processing.

use base64::DecodeError as b64DecodeError;
use openssl::error::ErrorStack as OpenSSLErrorStack;
use serde_cbor_2::error::Error as CBORError;
use serde_json::error::Error as JSONError;
use url::ParseError as URLParseError;

/// A wrapper for `Result<T, WebauthnError>`
pub type WebauthnResult<T> = core::result::Result<T, WebauthnError>;

/// The broad category an error belongs to. This lets a caller tell "the client sent
/// garbage" apart from "the ceremony legitimately did not validate".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Truncated binary, bad encodings, missing required keys. Always fatal.
    MalformedInput,
    /// A feature this library does not implement (ECDAA, self attestation, token binding,
    /// unknown attestation formats, extensions).
    UnsupportedFeature,
    /// The ceremony was well formed but did not validate.
    ValidationFailure,
    /// The attestation did not chain to a configured trust anchor.
    TrustFailure,
}

/// Possible errors that may occur during Webauthn Operation processing.
#[derive(Debug, thiserror::Error)]
pub enum WebauthnError {
    /// A binary structure ended before a field it declares.
    #[error("Fewer bytes remain in the input than were requested")]
    TruncatedInput,

    /// A U2F registration or signature response could not be decoded.
    #[error("The U2F response is malformed")]
    MalformedResponse,

    /// The U2F response carries an `errorCode` instead of data.
    #[error("The U2F device returned an error code")]
    U2FErrorResponse,

    /// The U2F registration response version is not `U2F_V2`.
    #[error("The U2F protocol version is not supported")]
    UnsupportedProtocolVersion,

    /// The signature response names a key handle that was not offered.
    #[error("The key handle is not part of this signature request")]
    UnsupportedKeyHandle,

    /// Client data is not a JSON object or lacks `type`, `challenge` or `origin`.
    #[error("The client data is missing required fields or is not an object")]
    InvalidClientData,

    /// Client data `type` is not the one this ceremony expects.
    #[error("The clientData type is not valid for this ceremony")]
    InvalidClientDataType,

    /// The challenge echoed by the client is not the issued one.
    #[error("The clientData challenge does not match the issued challenge")]
    MismatchedChallenge,

    /// The origin host does not equal the relying party id.
    #[error("The clientData origin does not match the relying party id")]
    InvalidRPOrigin,

    /// The rpIdHash in authenticator data is not SHA-256 of the rpId.
    #[error("The relying party id hash does not match the authenticator data")]
    InvalidRPIDHash,

    /// The UP flag is clear.
    #[error("The user present bit is not set, and required")]
    UserNotPresent,

    /// The UV flag is clear while verification is required.
    #[error("The user verified bit is not set, and required")]
    UserNotVerified,

    /// Extensions were requested or returned.
    #[error("Extensions are not supported")]
    ExtensionsNotSupported,

    /// Client data carries a `tokenBinding` member.
    #[error("Token binding is not supported")]
    TokenBindingNotSupported,

    /// A `tokenBinding` member has status `present` but no id.
    #[error("The token binding is malformed")]
    InvalidTokenBinding,

    /// User handles are not supported.
    #[error("User handles are not supported")]
    UserHandleNotSupported,

    /// `id` and `rawId` of a credential decode to different bytes.
    #[error("The credential id and raw id do not match")]
    CredentialIdMismatch,

    /// The credential type is not public-key.
    #[error("The credential type is not public-key")]
    InvalidCredentialType,

    /// Registration authenticator data has no AT flag.
    #[error("The authenticator data is missing attested credential data")]
    MissingAttestationCredentialData,

    /// The credential public key is not a CBOR map.
    #[error("The credential public key is not a CBOR map")]
    InvalidCredentialPublicKey,

    /// Unknown attestation statement format.
    #[error("The attestation statement format is not supported")]
    AttestationNotSupported,

    /// The attestation statement contains `ecdaaKeyId`.
    #[error("ECDAA attestation is not supported")]
    AttestationEcdaaNotSupported,

    /// A packed attestation statement without `x5c`.
    #[error("Self attestation is not supported")]
    AttestationSelfNotSupported,

    /// The attestation statement map is not valid.
    #[error("The attestation statement map is not valid")]
    AttestationStatementMapInvalid,

    /// The attestation statement signature is not present.
    #[error("The attestation statement signature is not present")]
    AttestationStatementSigMissing,

    /// The attestation signature does not verify against the attestation key.
    #[error("The attestation statement signature is not valid")]
    AttestationStatementSigInvalid,

    /// The attestation statement x5c (trust root) is not present.
    #[error("The attestation statement x5c (trust root) is not present")]
    AttestationStatementX5CMissing,

    /// An `x5c` entry is not a parseable certificate.
    #[error("The attestation statement x5c (trust root) is not valid")]
    AttestationStatementX5CInvalid,

    /// The packed attestation leaf lacks a required subject field or Basic Constraints.
    #[error("The attestation certificate does not meet the format requirements")]
    AttestationCertificateRequirementsNotMet,

    /// The leaf AAGUID extension differs from the AAGUID in authenticator data.
    #[error("The attestation certificate AAGUID does not match the authenticator data")]
    AttestationCertificateAAGUIDMismatch,

    /// The attestation certificate chain is not valid.
    #[error("The attestation certificate chain is not valid")]
    InvalidCertificateChain,

    /// No configured anchor accepts the attestation.
    #[error("The attestation is not trusted by any configured trust anchor")]
    AttestationTrustFailure,

    /// A trust anchor file could not be read.
    #[error("A trust anchor file could not be read")]
    TrustAnchorLoadFailure,

    /// The repository already holds this credential id.
    #[error("The credential id already exists")]
    CredentialAlreadyExists,

    /// The credential id is absent from `allowCredentials`. An empty list allows nothing.
    #[error("The credential id is not in the allowed credentials list")]
    CredentialNotAllowed,

    /// The credential is not known to the credential repository.
    #[error("The credential is not known to the credential repository")]
    CredentialNotFound,

    /// The signature counter is not greater than the stored one.
    #[error("The signature counter did not increase")]
    CounterRegression,

    /// The assertion signature does not verify.
    #[error("The assertion signature is not valid")]
    AuthenticationFailure,

    /// The COSE key contains invalid CBOR which can not be processed.
    #[error("The COSE key contains invalid CBOR which can not be processed")]
    COSEKeyInvalidCBORValue,

    /// The COSE key contains an unsupported key type.
    #[error("The COSE key contains an unsupported key type")]
    COSEKeyInvalidType,

    /// The COSE key contains an unsupported algorithm.
    #[error("The COSE key contains an unsupported algorithm")]
    COSEKeyInvalidAlgorithm,

    /// The COSE key contains an invalid ECDSA X/Y coordinate.
    #[error("The COSE key contains an invalid ECDSA X/Y coordinate")]
    COSEKeyECDSAXYInvalid,

    /// The COSE key contains an invalid ECDSA curve.
    #[error("The COSE key contains an invalid ECDSA curve")]
    COSEKeyECDSAInvalidCurve,

    /// The COSE key contains an invalid RSA modulus or exponent.
    #[error("The COSE key contains an invalid RSA modulus or exponent")]
    COSEKeyRSANEInvalid,

    /// A base64 value could not be decoded.
    #[error("A base64 value could not be decoded")]
    ParseBase64Failure(#[from] b64DecodeError),

    /// A CBOR structure could not be decoded.
    #[error("A CBOR structure could not be decoded")]
    ParseCBORFailure(#[from] CBORError),

    /// A JSON structure could not be decoded.
    #[error("A JSON structure could not be decoded")]
    ParseJSONFailure(#[from] JSONError),

    /// The origin is not a valid url.
    #[error("The origin is not a valid url")]
    ParseURLFailure(#[from] URLParseError),

    /// An OpenSSL Error has occurred.
    #[error("An OpenSSL Error has occurred")]
    OpenSSLError(#[from] OpenSSLErrorStack),
}

impl PartialEq for WebauthnError {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl WebauthnError {
    /// Classify this error. See [ErrorKind].
    pub fn kind(&self) -> ErrorKind {
        match self {
            WebauthnError::TruncatedInput
            | WebauthnError::MalformedResponse
            | WebauthnError::U2FErrorResponse
            | WebauthnError::InvalidClientData
            | WebauthnError::InvalidTokenBinding
            | WebauthnError::CredentialIdMismatch
            | WebauthnError::InvalidCredentialType
            | WebauthnError::MissingAttestationCredentialData
            | WebauthnError::InvalidCredentialPublicKey
            | WebauthnError::AttestationStatementMapInvalid
            | WebauthnError::AttestationStatementSigMissing
            | WebauthnError::AttestationStatementX5CMissing
            | WebauthnError::AttestationStatementX5CInvalid
            | WebauthnError::COSEKeyInvalidCBORValue
            | WebauthnError::COSEKeyInvalidType
            | WebauthnError::COSEKeyInvalidAlgorithm
            | WebauthnError::COSEKeyECDSAXYInvalid
            | WebauthnError::COSEKeyECDSAInvalidCurve
            | WebauthnError::COSEKeyRSANEInvalid
            | WebauthnError::ParseBase64Failure(_)
            | WebauthnError::ParseCBORFailure(_)
            | WebauthnError::ParseJSONFailure(_)
            | WebauthnError::ParseURLFailure(_)
            | WebauthnError::OpenSSLError(_)
            | WebauthnError::TrustAnchorLoadFailure => ErrorKind::MalformedInput,

            WebauthnError::UnsupportedProtocolVersion
            | WebauthnError::ExtensionsNotSupported
            | WebauthnError::TokenBindingNotSupported
            | WebauthnError::UserHandleNotSupported
            | WebauthnError::AttestationNotSupported
            | WebauthnError::AttestationEcdaaNotSupported
            | WebauthnError::AttestationSelfNotSupported => ErrorKind::UnsupportedFeature,

            WebauthnError::UnsupportedKeyHandle
            | WebauthnError::InvalidClientDataType
            | WebauthnError::MismatchedChallenge
            | WebauthnError::InvalidRPOrigin
            | WebauthnError::InvalidRPIDHash
            | WebauthnError::UserNotPresent
            | WebauthnError::UserNotVerified
            | WebauthnError::AttestationStatementSigInvalid
            | WebauthnError::AttestationCertificateRequirementsNotMet
            | WebauthnError::AttestationCertificateAAGUIDMismatch
            | WebauthnError::InvalidCertificateChain
            | WebauthnError::CredentialAlreadyExists
            | WebauthnError::CredentialNotAllowed
            | WebauthnError::CredentialNotFound
            | WebauthnError::CounterRegression
            | WebauthnError::AuthenticationFailure => ErrorKind::ValidationFailure,

            WebauthnError::AttestationTrustFailure => ErrorKind::TrustFailure,
        }
    }
}
