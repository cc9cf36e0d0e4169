//! JSON structures exchanged with the browser's `navigator.credentials` API.
//!
//! Options flow out to the client ([CreationChallengeResponse], [RequestChallengeResponse]),
//! credentials flow back in ([RegisterPublicKeyCredential], [PublicKeyCredential]).

use std::collections::BTreeMap;

mod attest;
mod auth;
mod options;

pub use attest::*;
pub use auth::*;
pub use options::*;

/// Representation of an AAGUID
/// <https://www.w3.org/TR/webauthn/#aaguid>
pub type Aaguid = [u8; 16];

/// A raw credential id as issued by an authenticator.
pub type CredentialID = Vec<u8>;

/// Client extension inputs, keyed by extension identifier.
pub type AuthenticationExtensions = BTreeMap<String, serde_json::Value>;

/// A credential's `id` is the base64url text form of `rawId`, and its `type` must be
/// `public-key`.
pub(crate) fn check_credential_identity(
    id: &str,
    raw_id: &[u8],
    type_: &str,
) -> Result<(), crate::error::WebauthnError> {
    use crate::error::WebauthnError;

    let decoded_id = base64::decode_config(id, base64::URL_SAFE_NO_PAD).map_err(|e| {
        debug!(?e, "credential id is not base64url");
        WebauthnError::CredentialIdMismatch
    })?;
    if decoded_id != raw_id {
        debug!("credential id does not match raw id");
        return Err(WebauthnError::CredentialIdMismatch);
    }
    if type_ != crate::constants::PUBLIC_KEY_CREDENTIAL_TYPE {
        debug!(%type_, "unsupported credential type");
        return Err(WebauthnError::InvalidCredentialType);
    }
    Ok(())
}
