//! Types related to attestation (Registration)

use base64urlsafedata::Base64UrlSafeData;
use serde::{Deserialize, Serialize};

use super::options::*;
use super::{check_credential_identity, AuthenticationExtensions};
use crate::error::WebauthnError;

/// <https://w3c.github.io/webauthn/#dictionary-makecredentialoptions>
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialCreationOptions {
    /// The relying party
    pub rp: PublicKeyCredentialRpEntity,
    /// The user.
    pub user: PublicKeyCredentialUserEntity,
    /// The one-time challenge for the credential to sign, as an array of bytes.
    pub challenge: Vec<u8>,
    /// The set of cryptographic types allowed by this server.
    pub pub_key_cred_params: Vec<PubKeyCredParams>,

    /// The timeout for the authenticator to stop accepting the operation
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout: Option<u32>,

    /// Credential ID's that are excluded from being able to be registered.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,

    /// Criteria defining which authenticators may be used in this operation.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,

    /// The requested attestation level from the device.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attestation: Option<AttestationConveyancePreference>,

    /// Non-standard extensions that may be used by the browser/authenticator.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extensions: Option<AuthenticationExtensions>,
}

impl PublicKeyCredentialCreationOptions {
    /// The user verification level the ceremony asked for.
    pub fn user_verification(&self) -> UserVerificationPolicy {
        self.authenticator_selection
            .as_ref()
            .map(|sel| sel.user_verification)
            .unwrap_or_default()
    }
}

/// A JSON serializable challenge which is issued to the user's webbrowser
/// for handling. This is meant to be opaque, that is, you should not need
/// to inspect or alter the content of the struct - you should serialise it
/// and transmit it to the client only.
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreationChallengeResponse {
    /// The options.
    pub public_key: PublicKeyCredentialCreationOptions,
}

/// <https://w3c.github.io/webauthn/#authenticatorattestationresponse>
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthenticatorAttestationResponseRaw {
    /// <https://w3c.github.io/webauthn/#dom-authenticatorattestationresponse-attestationobject>
    #[serde(rename = "attestationObject")]
    pub attestation_object: Base64UrlSafeData,

    /// <https://w3c.github.io/webauthn/#dom-authenticatorresponse-clientdatajson>
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlSafeData,
}

/// A client response to a registration challenge. This contains all required
/// information to assess and assert trust in a credential's legitimacy, followed
/// by registration to a user.
///
/// You should not need to handle the inner content of this structure - you should
/// provide this to the correctly handling function of Webauthn only.
/// <https://w3c.github.io/webauthn/#iface-pkcredential>
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegisterPublicKeyCredential {
    /// The id of the PublicKey credential, likely in base64.
    ///
    /// This is NEVER actually
    /// used in a real registration, because the true credential ID is taken from the
    /// attestation data.
    pub id: String,
    /// The id of the credential, as binary.
    ///
    /// This is NEVER actually
    /// used in a real registration, because the true credential ID is taken from the
    /// attestation data.
    #[serde(rename = "rawId")]
    pub raw_id: Base64UrlSafeData,
    /// <https://w3c.github.io/webauthn/#dom-publickeycredential-response>
    pub response: AuthenticatorAttestationResponseRaw,
    /// The type of credential.
    #[serde(rename = "type", default = "public_key_type")]
    pub type_: String,
}

impl RegisterPublicKeyCredential {
    /// Load a registration credential from the JSON the browser produced.
    pub fn from_json(json: &str) -> Result<Self, WebauthnError> {
        let rpkc: RegisterPublicKeyCredential = serde_json::from_str(json).map_err(|e| {
            debug!(?e, "registration credential is not valid json");
            WebauthnError::ParseJSONFailure(e)
        })?;
        check_credential_identity(&rpkc.id, rpkc.raw_id.as_ref(), &rpkc.type_)?;
        Ok(rpkc)
    }
}
