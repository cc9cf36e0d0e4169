//! Types related to authentication (Assertion)

use base64urlsafedata::Base64UrlSafeData;
use serde::{Deserialize, Serialize};

use super::options::*;
use super::{check_credential_identity, AuthenticationExtensions};
use crate::error::WebauthnError;

/// The requested options for the authentication
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialRequestOptions {
    /// The challenge that should be signed by the authenticator, as an array of bytes.
    pub challenge: Vec<u8>,
    /// The timeout for the authenticator in case of no interaction.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timeout: Option<u32>,
    /// The relying party ID.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rp_id: Option<String>,
    /// The set of credentials that are allowed to sign this challenge.
    #[serde(default)]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    /// The verification policy the browser will request.
    #[serde(default)]
    pub user_verification: UserVerificationPolicy,
    /// extensions.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub extensions: Option<AuthenticationExtensions>,
}

/// A JSON serializable challenge which is issued to the user's webbrowser
/// for handling. This is meant to be opaque, that is, you should not need
/// to inspect or alter the content of the struct - you should serialise it
/// and transmit it to the client only.
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RequestChallengeResponse {
    /// The options.
    pub public_key: PublicKeyCredentialRequestOptions,
}

/// <https://w3c.github.io/webauthn/#authenticatorassertionresponse>
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthenticatorAssertionResponseRaw {
    /// Raw authenticator data.
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: Base64UrlSafeData,

    /// Signed client data.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlSafeData,

    /// Signature
    pub signature: Base64UrlSafeData,

    /// Optional userhandle.
    #[serde(rename = "userHandle", default)]
    pub user_handle: Option<Base64UrlSafeData>,
}

/// A client response to an authentication challenge. This contains all required
/// information to asses and assert trust in a credentials legitimacy, followed
/// by authentication to a user.
///
/// You should not need to handle the inner content of this structure - you should
/// provide this to the correctly handling function of Webauthn only.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PublicKeyCredential {
    /// The credential Id, likely base64
    pub id: String,
    /// The binary of the credential id.
    #[serde(rename = "rawId")]
    pub raw_id: Base64UrlSafeData,
    /// The authenticator response.
    pub response: AuthenticatorAssertionResponseRaw,
    /// The authenticator type.
    #[serde(rename = "type", default = "public_key_type")]
    pub type_: String,
}

impl PublicKeyCredential {
    /// Load an assertion credential from the JSON the browser produced.
    pub fn from_json(json: &str) -> Result<Self, WebauthnError> {
        let pkc: PublicKeyCredential = serde_json::from_str(json).map_err(|e| {
            debug!(?e, "assertion credential is not valid json");
            WebauthnError::ParseJSONFailure(e)
        })?;
        check_credential_identity(&pkc.id, pkc.raw_id.as_ref(), &pkc.type_)?;
        Ok(pkc)
    }

    /// Retrieve the user uniqueid that *may* have been provided by the authenticator during this
    /// authentication.
    pub fn get_user_unique_id(&self) -> Option<&[u8]> {
        self.response.user_handle.as_ref().map(|b| b.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSERTION_JSON: &str = r#"{"id":"AQID","rawId":"AQID","response":{"authenticatorData":"AAEC","clientDataJSON":"e30","signature":"MEQ"},"type":"public-key"}"#;

    #[test]
    fn deserialise_assertion_response() {
        let pkc = PublicKeyCredential::from_json(ASSERTION_JSON).unwrap();
        assert_eq!(pkc.raw_id.0, vec![1, 2, 3]);
        assert_eq!(pkc.response.authenticator_data.0, vec![0, 1, 2]);
        assert_eq!(pkc.response.client_data_json.0, b"{}".to_vec());
        assert_eq!(pkc.get_user_unique_id(), None);

        let with_handle = ASSERTION_JSON.replace(
            r#""signature":"MEQ""#,
            r#""signature":"MEQ","userHandle":"dXNlcg""#,
        );
        let pkc = PublicKeyCredential::from_json(&with_handle).unwrap();
        assert_eq!(pkc.get_user_unique_id(), Some(b"user".as_slice()));
    }

    #[test]
    fn assertion_response_identity_checks() {
        let mismatch = ASSERTION_JSON.replace(r#""rawId":"AQID""#, r#""rawId":"AQIE""#);
        assert_eq!(
            PublicKeyCredential::from_json(&mismatch).unwrap_err(),
            WebauthnError::CredentialIdMismatch
        );

        let missing = ASSERTION_JSON.replace(r#""signature":"MEQ""#, r#""sig":"MEQ""#);
        assert!(matches!(
            PublicKeyCredential::from_json(&missing),
            Err(WebauthnError::ParseJSONFailure(_))
        ));
    }

    #[test]
    fn request_options_wire_form() {
        let rcr = RequestChallengeResponse {
            public_key: PublicKeyCredentialRequestOptions {
                challenge: vec![9, 8, 7],
                timeout: Some(60000),
                rp_id: Some("example.com".to_string()),
                allow_credentials: vec![PublicKeyCredentialDescriptor::new(vec![1, 2])],
                user_verification: UserVerificationPolicy::Discouraged,
                extensions: None,
            },
        };
        assert_eq!(
            serde_json::to_value(&rcr).unwrap(),
            serde_json::json!({
                "publicKey": {
                    "challenge": [9, 8, 7],
                    "timeout": 60000,
                    "rpId": "example.com",
                    "allowCredentials": [{"type": "public-key", "id": [1, 2]}],
                    "userVerification": "discouraged"
                }
            })
        );
    }
}
