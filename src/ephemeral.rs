//! An implementation of an Ephemeral (in-memory) webauthn configuration provider.
//! It's only really useful for demo-sites, testing and as an example/reference
//! implementation of the WebauthnConfig trait.
//!
//! By default this implementation requests direct attestation, and only trusts the
//! attestation roots it was given.

use crate::core::WebauthnConfig;
use crate::proto::{AttestationConveyancePreference, AuthenticatorAttachment};
use crate::trust::AttestationCaList;

/// An implementation of an Ephemeral (in-memory) webauthn configuration provider.
pub struct WebauthnEphemeralConfig {
    rp_name: String,
    rp_id: String,
    attachment: Option<AuthenticatorAttachment>,
    attestation_ca_list: Option<AttestationCaList>,
}

impl std::fmt::Debug for WebauthnEphemeralConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "WebauthnEphemeralConfig{{ rp_name: {:?}, rp_id: {:?}, trust_anchors: {:?} }}",
            self.rp_name,
            self.rp_id,
            self.attestation_ca_list.as_ref().map(|l| l.cas.len())
        )
    }
}

impl WebauthnConfig for WebauthnEphemeralConfig {
    /// Returns the relying party name. See the trait documentation for more.
    fn get_relying_party_name(&self) -> &str {
        &self.rp_name
    }

    /// Returns the relying party id. See the trait documentation for more.
    fn get_relying_party_id(&self) -> &str {
        &self.rp_id
    }

    /// Retrieve the authenticator attachment hint. See the trait documentation for more.
    fn get_authenticator_attachment(&self) -> Option<AuthenticatorAttachment> {
        self.attachment
    }

    /// Retrieve the authenticator attestation preference. See the trait documentation for more.
    fn get_attestation_preference(&self) -> AttestationConveyancePreference {
        AttestationConveyancePreference::Direct
    }

    fn get_attestation_ca_list(&self) -> Option<&AttestationCaList> {
        self.attestation_ca_list.as_ref()
    }
}

impl WebauthnEphemeralConfig {
    /// Create a new Webauthn Ephemeral instance. This requires a provided relying party
    /// name and id, and optionally the attestation roots to trust. See the trait
    /// documentation for more detail on relying party name and id.
    pub fn new(
        rp_name: &str,
        rp_id: &str,
        attestation_ca_list: Option<AttestationCaList>,
    ) -> Self {
        WebauthnEphemeralConfig {
            rp_name: rp_name.to_string(),
            rp_id: rp_id.to_string(),
            attachment: None,
            attestation_ca_list,
        }
    }

    /// Hint the kind of authenticator the browser should offer.
    pub fn with_authenticator_attachment(mut self, attachment: AuthenticatorAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}
