//! Internal structures for parsing authenticator responses.
//!
//! <https://w3c.github.io/webauthn/#sctn-attestation>

use base64urlsafedata::Base64UrlSafeData;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::constants::*;
use crate::error::*;
use crate::proto::{Aaguid, AuthenticatorAssertionResponseRaw, AuthenticatorAttestationResponseRaw};
use crate::reader::ByteReader;

/// The value of `type` in collected client data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ClientDataType {
    /// A WebAuthn registration.
    #[serde(rename = "webauthn.create")]
    Create,
    /// A WebAuthn assertion.
    #[serde(rename = "webauthn.get")]
    Get,
    /// A legacy U2F registration.
    #[serde(rename = "navigator.id.finishEnrollment")]
    U2FRegister,
    /// A legacy U2F sign.
    #[serde(rename = "navigator.id.getAssertion")]
    U2FSign,
}

impl ClientDataType {
    /// The wire name of this type.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientDataType::Create => CLIENT_DATA_TYPE_CREATE,
            ClientDataType::Get => CLIENT_DATA_TYPE_GET,
            ClientDataType::U2FRegister => CLIENT_DATA_TYPE_U2F_REGISTER,
            ClientDataType::U2FSign => CLIENT_DATA_TYPE_U2F_SIGN,
        }
    }
}

/// Token binding state reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingStatus {
    /// Token binding was used, `id` must be present.
    Present,
    /// The client supports token binding but did not negotiate it.
    Supported,
    /// The client does not support token binding.
    NotSupported,
}

/// <https://w3c.github.io/webauthn/#dictdef-tokenbinding>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenBinding {
    /// The token binding status.
    pub status: TokenBindingStatus,
    /// The base64url token binding id. Required when `status` is `present`.
    pub id: Option<String>,
}

impl TokenBinding {
    fn validate(&self) -> Result<(), WebauthnError> {
        if self.status == TokenBindingStatus::Present && self.id.is_none() {
            debug!("token binding is present without an id");
            return Err(WebauthnError::InvalidTokenBinding);
        }
        Ok(())
    }
}

/// <https://w3c.github.io/webauthn/#dictdef-collectedclientdata>
///
/// Members a browser adds beyond these (`crossOrigin`, `clientExtensions`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    /// The ceremony this client data was produced for.
    #[serde(rename = "type")]
    pub type_: ClientDataType,
    /// The challenge as issued by the relying party.
    pub challenge: Base64UrlSafeData,
    /// The origin the browser reports for the calling page.
    pub origin: String,
    /// Token binding state, if the browser reported it.
    pub token_binding: Option<TokenBinding>,
}

impl TryFrom<&[u8]> for CollectedClientData {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<CollectedClientData, WebauthnError> {
        let ccd: CollectedClientData = serde_json::from_slice(data).map_err(|e| {
            debug!(?e, "collected client data is not valid");
            WebauthnError::InvalidClientData
        })?;
        if let Some(tb) = &ccd.token_binding {
            tb.validate()?;
        }
        Ok(ccd)
    }
}

/// The credential created by a registration.
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    /// The authenticator model.
    pub aaguid: Aaguid,
    /// The new credential id.
    pub credential_id: Vec<u8>,
    /// The COSE encoded public key. Always a CBOR map.
    pub credential_pk: serde_cbor_2::Value,
}

/// <https://w3c.github.io/webauthn/#sctn-authenticator-data>
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    /// SHA-256 of the rp id the authenticator scoped the credential to.
    pub rp_id_hash: [u8; RP_ID_HASH_LEN],
    /// The raw flags byte.
    pub flags: u8,
    /// The signature counter.
    pub counter: u32,
    /// Present when the AT flag is set.
    pub acd: Option<AttestedCredentialData>,
    /// Present when the ED flag is set.
    pub extensions: Option<serde_cbor_2::Value>,
}

impl AuthenticatorData {
    /// UP flag.
    pub fn user_present(&self) -> bool {
        self.flags & FLAG_USER_PRESENT != 0
    }

    /// UV flag.
    pub fn user_verified(&self) -> bool {
        self.flags & FLAG_USER_VERIFIED != 0
    }
}

impl TryFrom<&[u8]> for AuthenticatorData {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        let mut reader = ByteReader::new(data);

        let rp_id_hash = reader.read_array::<RP_ID_HASH_LEN>()?;
        let flags = reader.read_u8()?;
        let counter = reader.read_u32_be()?;

        let acd = if flags & FLAG_ATTESTED_CREDENTIAL_DATA != 0 {
            let aaguid = reader.read_array::<AAGUID_LEN>()?;
            let cred_id_len = reader.read_u16_be()?;
            let credential_id = reader.read(cred_id_len as usize)?.to_vec();
            let credential_pk = reader.read_cbor()?;
            if !matches!(credential_pk, serde_cbor_2::Value::Map(_)) {
                debug!("credential public key is not a cbor map");
                return Err(WebauthnError::InvalidCredentialPublicKey);
            }
            Some(AttestedCredentialData {
                aaguid,
                credential_id,
                credential_pk,
            })
        } else {
            None
        };

        let extensions = if flags & FLAG_EXTENSION_DATA != 0 {
            Some(reader.read_cbor()?)
        } else {
            None
        };

        if !reader.is_empty() {
            debug!(
                trailing = reader.remaining(),
                "authenticator data has trailing bytes"
            );
        }

        trace!(flags, counter, "parsed authenticator data");

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            counter,
            acd,
            extensions,
        })
    }
}

/// The attestation statement map, keyed by CBOR text.
pub type AttestationStatement = BTreeMap<serde_cbor_2::Value, serde_cbor_2::Value>;

/// A decoded attestation object.
/// <https://w3c.github.io/webauthn/#sctn-attestation>
#[derive(Debug, Clone)]
pub struct AttestationObject {
    /// The attestation statement format identifier.
    pub fmt: String,
    /// The format specific statement.
    pub att_stmt: AttestationStatement,
    /// The parsed authenticator data.
    pub auth_data: AuthenticatorData,
    /// The authenticator data exactly as signed.
    pub auth_data_bytes: Vec<u8>,
}

fn text_key(k: &str) -> serde_cbor_2::Value {
    serde_cbor_2::Value::Text(k.to_string())
}

impl TryFrom<&[u8]> for AttestationObject {
    type Error = WebauthnError;

    fn try_from(data: &[u8]) -> Result<AttestationObject, WebauthnError> {
        let mut reader = ByteReader::new(data);
        let value = reader.read_cbor()?;
        let m = cbor_try_map!(&value).map_err(|_| WebauthnError::AttestationStatementMapInvalid)?;

        let fmt = m
            .get(&text_key("fmt"))
            .ok_or(WebauthnError::AttestationStatementMapInvalid)
            .and_then(|v| {
                cbor_try_string!(v).map_err(|_| WebauthnError::AttestationStatementMapInvalid)
            })?
            .clone();

        let att_stmt = m
            .get(&text_key("attStmt"))
            .ok_or(WebauthnError::AttestationStatementMapInvalid)
            .and_then(|v| {
                cbor_try_map!(v).map_err(|_| WebauthnError::AttestationStatementMapInvalid)
            })?
            .clone();

        let auth_data_bytes = m
            .get(&text_key("authData"))
            .ok_or(WebauthnError::AttestationStatementMapInvalid)
            .and_then(|v| {
                cbor_try_bytes!(v).map_err(|_| WebauthnError::AttestationStatementMapInvalid)
            })?
            .clone();

        let auth_data = AuthenticatorData::try_from(auth_data_bytes.as_slice())?;

        trace!(%fmt, "parsed attestation object");

        Ok(AttestationObject {
            fmt,
            att_stmt,
            auth_data,
            auth_data_bytes,
        })
    }
}

/// A registration response with every member decoded.
#[derive(Debug, Clone)]
pub struct AuthenticatorAttestationResponse {
    /// The decoded attestation object.
    pub attestation_object: AttestationObject,
    /// The decoded client data.
    pub client_data_json: CollectedClientData,
    /// The client data exactly as hashed by the authenticator.
    pub client_data_json_bytes: Vec<u8>,
}

impl TryFrom<&AuthenticatorAttestationResponseRaw> for AuthenticatorAttestationResponse {
    type Error = WebauthnError;

    fn try_from(aarr: &AuthenticatorAttestationResponseRaw) -> Result<Self, Self::Error> {
        let ccdj = CollectedClientData::try_from(aarr.client_data_json.as_ref())?;
        let ao = AttestationObject::try_from(aarr.attestation_object.as_ref())?;

        Ok(AuthenticatorAttestationResponse {
            attestation_object: ao,
            client_data_json: ccdj,
            client_data_json_bytes: aarr.client_data_json.0.clone(),
        })
    }
}

/// An assertion response with every member decoded.
#[derive(Debug, Clone)]
pub struct AuthenticatorAssertionResponse {
    /// The decoded authenticator data.
    pub authenticator_data: AuthenticatorData,
    /// The authenticator data exactly as signed.
    pub authenticator_data_bytes: Vec<u8>,
    /// The decoded client data.
    pub client_data: CollectedClientData,
    /// The client data exactly as hashed by the authenticator.
    pub client_data_bytes: Vec<u8>,
    /// The assertion signature.
    pub signature: Vec<u8>,
    /// The user handle, if the authenticator returned one.
    pub user_handle: Option<Vec<u8>>,
}

impl TryFrom<&AuthenticatorAssertionResponseRaw> for AuthenticatorAssertionResponse {
    type Error = WebauthnError;

    fn try_from(aarr: &AuthenticatorAssertionResponseRaw) -> Result<Self, Self::Error> {
        Ok(AuthenticatorAssertionResponse {
            authenticator_data: AuthenticatorData::try_from(aarr.authenticator_data.as_ref())?,
            authenticator_data_bytes: aarr.authenticator_data.0.clone(),
            client_data: CollectedClientData::try_from(aarr.client_data_json.as_ref())?,
            client_data_bytes: aarr.client_data_json.0.clone(),
            signature: aarr.signature.0.clone(),
            user_handle: aarr.user_handle.as_ref().map(|uh| uh.0.clone()),
        })
    }
}
