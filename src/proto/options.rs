//! Types that define options as to how an authenticator may interact with
//! with the server.

use serde::{Deserialize, Serialize};

use super::CredentialID;
use crate::constants::PUBLIC_KEY_CREDENTIAL_TYPE;

pub(super) fn public_key_type() -> String {
    PUBLIC_KEY_CREDENTIAL_TYPE.to_string()
}

/// Defines the User Authenticator Verification policy. This is documented
/// <https://w3c.github.io/webauthn/#enumdef-userverificationrequirement>, and each
/// variant lists it's effects.
///
/// To be clear, Verification means that the Authenticator perform extra or supplementary
/// interaction with the user to verify who they are. An example of this is Apple Touch Id
/// required a fingerprint to be verified, or a yubico device requiring a pin in addition to
/// a touch event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationPolicy {
    /// Require User Verification bit to be set, and fail the registration or authentication
    /// if false.
    Required,
    /// Prefer User Verification bit to be set, but do not fail if it is not present.
    Preferred,
    /// Request that no verification is performed. Authenticators may still perform it.
    Discouraged,
}

impl Default for UserVerificationPolicy {
    fn default() -> Self {
        UserVerificationPolicy::Preferred
    }
}

/// Relying Party Entity
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
pub struct PublicKeyCredentialRpEntity {
    /// The name of the relying party.
    pub name: String,
    /// An optional icon url.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icon: Option<String>,
    /// The id of the relying party. When absent the browser uses the effective domain.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<String>,
}

/// User Entity
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialUserEntity {
    /// The user's account name.
    pub name: String,
    /// An optional icon url.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icon: Option<String>,
    /// The user handle, sent to the browser as an array of bytes.
    pub id: Vec<u8>,
    /// The user's preferred name for display.
    pub display_name: String,
}

/// Public key cryptographic parameters
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
pub struct PubKeyCredParams {
    /// The type of public-key credential.
    #[serde(rename = "type")]
    pub type_: String,
    /// The algorithm in use defined by COSE.
    pub alg: i64,
}

/// <https://www.w3.org/TR/webauthn/#enumdef-authenticatortransport>
#[derive(Debug, Serialize, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticatorTransport {
    /// <https://www.w3.org/TR/webauthn/#dom-authenticatortransport-usb>
    Usb,
    /// <https://www.w3.org/TR/webauthn/#dom-authenticatortransport-nfc>
    Nfc,
    /// <https://www.w3.org/TR/webauthn/#dom-authenticatortransport-ble>
    Ble,
}

/// <https://www.w3.org/TR/webauthn/#dictdef-publickeycredentialdescriptor>
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
pub struct PublicKeyCredentialDescriptor {
    /// The type of credential
    #[serde(rename = "type", default = "public_key_type")]
    pub type_: String,
    /// The credential id, sent to the browser as an array of bytes.
    pub id: CredentialID,
    /// The allowed transports for this credential. Note this is a hint, and is NOT
    /// enforced.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    /// Describe a `public-key` credential by its id.
    pub fn new(id: CredentialID) -> Self {
        PublicKeyCredentialDescriptor {
            type_: public_key_type(),
            id,
            transports: None,
        }
    }
}

/// The authenticator attachment hint. This is NOT enforced, and is only used
/// to help a user select a relevant authenticator type.
///
/// <https://www.w3.org/TR/webauthn/#attachment>
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthenticatorAttachment {
    /// Request a device that is part of the machine aka inseperable.
    /// <https://www.w3.org/TR/webauthn/#attachment>
    #[serde(rename = "platform")]
    Platform,
    /// Request a device that can be seperated from the machine aka an external token.
    /// <https://www.w3.org/TR/webauthn/#attachment>
    #[serde(rename = "cross-platform")]
    CrossPlatform,
}

/// <https://www.w3.org/TR/webauthn/#dictdef-authenticatorselectioncriteria>
#[derive(Debug, Serialize, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    /// How the authenticator should be attached to the client machine.
    /// Note this is only a hint. It is not enforced in anyway shape or form.
    /// <https://www.w3.org/TR/webauthn/#attachment>
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Demand that the authenticator stores the credential on the device.
    #[serde(default)]
    pub require_resident_key: bool,

    /// The user verification level to request during registration. Depending on if this
    /// authenticator provides verification may affect future interactions as this is
    /// associated to the credential during registration.
    #[serde(default)]
    pub user_verification: UserVerificationPolicy,
}

/// <https://www.w3.org/TR/webauthn/#enumdef-attestationconveyancepreference>
#[derive(Debug, Serialize, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    /// Do not request attestation.
    /// <https://www.w3.org/TR/webauthn/#dom-attestationconveyancepreference-none>
    None,

    /// Request attestation in a semi-anonymized form.
    /// <https://www.w3.org/TR/webauthn/#dom-attestationconveyancepreference-indirect>
    Indirect,

    /// Request attestation in a direct form.
    /// <https://www.w3.org/TR/webauthn/#dom-attestationconveyancepreference-direct>
    Direct,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_id_is_an_integer_array() {
        let desc = PublicKeyCredentialDescriptor::new(vec![1, 2, 255]);
        let json = serde_json::to_string(&desc).unwrap();
        assert_eq!(json, r#"{"type":"public-key","id":[1,2,255]}"#);

        let back: PublicKeyCredentialDescriptor =
            serde_json::from_str(r#"{"id":[1,2,255],"transports":["usb","nfc"]}"#).unwrap();
        assert_eq!(back.type_, "public-key");
        assert_eq!(back.id, vec![1, 2, 255]);
        assert_eq!(
            back.transports,
            Some(vec![AuthenticatorTransport::Usb, AuthenticatorTransport::Nfc])
        );
    }

    #[test]
    fn selection_criteria_defaults() {
        let sel: AuthenticatorSelectionCriteria = serde_json::from_str("{}").unwrap();
        assert_eq!(sel.user_verification, UserVerificationPolicy::Preferred);
        assert!(!sel.require_resident_key);
        assert_eq!(sel.authenticator_attachment, None);

        let json = serde_json::to_value(AuthenticatorSelectionCriteria {
            authenticator_attachment: Some(AuthenticatorAttachment::CrossPlatform),
            require_resident_key: false,
            user_verification: UserVerificationPolicy::Discouraged,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "authenticatorAttachment": "cross-platform",
                "requireResidentKey": false,
                "userVerification": "discouraged"
            })
        );
    }

    #[test]
    fn user_entity_wire_names() {
        let user = PublicKeyCredentialUserEntity {
            name: "admin".to_string(),
            icon: None,
            id: vec![0x61, 0x64],
            display_name: "Admin".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            serde_json::json!({"name": "admin", "id": [97, 100], "displayName": "Admin"})
        );
        assert_eq!(
            serde_json::to_string(&AttestationConveyancePreference::Indirect).unwrap(),
            r#""indirect""#
        );
    }
}
