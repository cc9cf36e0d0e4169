//! The relying party ceremonies: issuing challenges, and verifying the registration and
//! authentication responses that come back from the browser.
//!
//! To use this library yourself, you will want to reference the `WebauthnConfig` trait to
//! develop site specific policy and configuration, and the `WebauthnCore` struct for Webauthn
//! interactions.
//!
//! The options returned by the `generate_*` functions are the ceremony state. They must be
//! kept server side (for example in the user's session) and handed back to the matching
//! `register_credential` / `authenticate_credential` call.

use url::Url;
use uuid::Uuid;

use crate::attestation::{AttestationFormat, ParsedAttestationData};
use crate::constants::{AUTHENTICATOR_TIMEOUT, CHALLENGE_SIZE_BYTES, PUBLIC_KEY_CREDENTIAL_TYPE};
use crate::crypto::{compute_sha256, ct_eq, COSEAlgorithm, COSEKey};
use crate::error::WebauthnError;
use crate::interface::*;
use crate::internals::{
    AuthenticatorAssertionResponse, AuthenticatorAttestationResponse, ClientDataType,
    CollectedClientData,
};
use crate::proto::*;
use crate::trust::{verify_attestation_ca_chain, AttestationCaList};

/// The configuration and policy of a relying party. Only the name and id are required, the
/// remaining hooks have conservative defaults.
pub trait WebauthnConfig {
    /// Returns a relying party name, shown to the user by the browser and authenticator.
    fn get_relying_party_name(&self) -> &str;

    /// Returns the relying party id. This is the effective domain of your site, without
    /// scheme or port, for example `example.com`. Credentials are scoped to it, and the
    /// origin of every ceremony must have exactly this host.
    fn get_relying_party_id(&self) -> &str;

    /// The algorithms offered to the authenticator, in order of preference.
    fn get_credential_algorithms(&self) -> Vec<COSEAlgorithm> {
        vec![COSEAlgorithm::ES256, COSEAlgorithm::RS256]
    }

    /// The timeout, in milliseconds, the browser should wait for the authenticator.
    fn get_authenticator_timeout(&self) -> u32 {
        AUTHENTICATOR_TIMEOUT
    }

    /// Returns the default attestation type. Options are `None`, `Direct` and `Indirect`.
    /// Defaults to `Direct`, so that attestation can be checked against a trust store.
    fn get_attestation_preference(&self) -> AttestationConveyancePreference {
        AttestationConveyancePreference::Direct
    }

    /// A hint for the kind of authenticator the browser should offer.
    fn get_authenticator_attachment(&self) -> Option<AuthenticatorAttachment> {
        None
    }

    /// Ask the authenticator to store the credential on the device.
    fn get_require_resident_key(&self) -> bool {
        false
    }

    /// The attestation trust anchors. When set, every registration must carry an attestation
    /// chain that terminates at one of these roots.
    fn get_attestation_ca_list(&self) -> Option<&AttestationCaList> {
        None
    }
}

/// This is the core of the Webauthn operations. It provides 4 interfaces that you will likely
/// use the most:
/// * generate_challenge_register_options
/// * register_credential
/// * generate_challenge_authenticate_options
/// * authenticate_credential
///
/// The generate functions return JSON challenges that are intended to be processed by the
/// client browser, and the register and authenticate functions verify what the browser
/// returned.
#[derive(Debug)]
pub struct WebauthnCore<T> {
    config: T,
}

fn has_extensions(extensions: Option<&AuthenticationExtensions>) -> bool {
    extensions.map(|ext| !ext.is_empty()).unwrap_or(false)
}

fn generate_challenge() -> Result<Vec<u8>, WebauthnError> {
    let mut challenge = vec![0; CHALLENGE_SIZE_BYTES];
    openssl::rand::rand_bytes(&mut challenge)?;
    Ok(challenge)
}

impl<T: WebauthnConfig> WebauthnCore<T> {
    /// Create a new Webauthn instance with the supplied configuration.
    pub fn new(config: T) -> Self {
        WebauthnCore { config }
    }

    /// The configuration this instance was built with.
    pub fn config(&self) -> &T {
        &self.config
    }

    /// Generate a new challenge for client registration. The returned
    /// [CreationChallengeResponse] is serialised to JSON and passed by the browser to
    /// `navigator.credentials.create()`.
    ///
    /// `public_key` of the response must also be kept server side, and supplied to
    /// [WebauthnCore::register_credential] once the browser responds.
    pub fn generate_challenge_register_options(
        &self,
        user_id: &[u8],
        user_name: &str,
        display_name: &str,
        policy: UserVerificationPolicy,
        exclude_credentials: Option<Vec<CredentialID>>,
        extensions: Option<AuthenticationExtensions>,
    ) -> Result<CreationChallengeResponse, WebauthnError> {
        let challenge = generate_challenge()?;

        let pub_key_cred_params = self
            .config
            .get_credential_algorithms()
            .into_iter()
            .map(|alg| PubKeyCredParams {
                type_: PUBLIC_KEY_CREDENTIAL_TYPE.to_string(),
                alg: alg.into(),
            })
            .collect();

        let exclude_credentials = exclude_credentials.map(|creds| {
            creds
                .into_iter()
                .map(PublicKeyCredentialDescriptor::new)
                .collect()
        });

        trace!(?policy, "issuing registration challenge");

        Ok(CreationChallengeResponse {
            public_key: PublicKeyCredentialCreationOptions {
                rp: PublicKeyCredentialRpEntity {
                    name: self.config.get_relying_party_name().to_string(),
                    icon: None,
                    id: Some(self.config.get_relying_party_id().to_string()),
                },
                user: PublicKeyCredentialUserEntity {
                    name: user_name.to_string(),
                    icon: None,
                    id: user_id.to_vec(),
                    display_name: display_name.to_string(),
                },
                challenge,
                pub_key_cred_params,
                timeout: Some(self.config.get_authenticator_timeout()),
                exclude_credentials,
                authenticator_selection: Some(AuthenticatorSelectionCriteria {
                    authenticator_attachment: self.config.get_authenticator_attachment(),
                    require_resident_key: self.config.get_require_resident_key(),
                    user_verification: policy,
                }),
                attestation: Some(self.config.get_attestation_preference()),
                extensions,
            },
        })
    }

    /// Generate a challenge for an authenticate request for a user. The returned
    /// [RequestChallengeResponse] is serialised to JSON and passed by the browser to
    /// `navigator.credentials.get()`.
    ///
    /// `public_key` of the response must also be kept server side, and supplied to
    /// [WebauthnCore::authenticate_credential] once the browser responds.
    pub fn generate_challenge_authenticate_options(
        &self,
        allow_credentials: Vec<CredentialID>,
        policy: UserVerificationPolicy,
        extensions: Option<AuthenticationExtensions>,
    ) -> Result<RequestChallengeResponse, WebauthnError> {
        let challenge = generate_challenge()?;

        trace!(?policy, allowed = allow_credentials.len(), "issuing authentication challenge");

        Ok(RequestChallengeResponse {
            public_key: PublicKeyCredentialRequestOptions {
                challenge,
                timeout: Some(self.config.get_authenticator_timeout()),
                rp_id: Some(self.config.get_relying_party_id().to_string()),
                allow_credentials: allow_credentials
                    .into_iter()
                    .map(PublicKeyCredentialDescriptor::new)
                    .collect(),
                user_verification: policy,
                extensions,
            },
        })
    }

    /// The steps shared by both ceremonies: the challenge, the origin, and token binding.
    fn verify_client_data(
        &self,
        client_data: &CollectedClientData,
        expected_type: ClientDataType,
        challenge: &[u8],
        rp_id: &str,
    ) -> Result<(), WebauthnError> {
        // Verify that the value of C.type is the expected ceremony.
        if client_data.type_ != expected_type {
            debug!(
                found = client_data.type_.as_str(),
                expected = expected_type.as_str(),
                "client data type mismatch"
            );
            return Err(WebauthnError::InvalidClientDataType);
        }

        // Verify that the value of C.challenge matches the challenge that was sent to the
        // authenticator.
        if !ct_eq(&client_data.challenge.0, challenge) {
            debug!("client data challenge does not match the issued challenge");
            return Err(WebauthnError::MismatchedChallenge);
        }

        // Verify that the value of C.origin matches the Relying Party's origin.
        let origin = Url::parse(&client_data.origin)?;
        if origin.host_str() != Some(rp_id) {
            debug!(origin = %client_data.origin, %rp_id, "origin does not match rp id");
            return Err(WebauthnError::InvalidRPOrigin);
        }

        // Token Binding is not supported. Any tokenBinding member is rejected, whatever its
        // status.
        if let Some(tb) = &client_data.token_binding {
            debug!(status = ?tb.status, "client data carries token binding");
            return Err(WebauthnError::TokenBindingNotSupported);
        }

        Ok(())
    }

    fn verify_rp_id_hash(rp_id_hash: &[u8], rp_id: &str) -> Result<(), WebauthnError> {
        if !ct_eq(rp_id_hash, &compute_sha256(rp_id.as_bytes())) {
            debug!(%rp_id, "authenticator data rp id hash does not match");
            return Err(WebauthnError::InvalidRPIDHash);
        }
        Ok(())
    }

    fn verify_user_flags(
        user_present: bool,
        user_verified: bool,
        policy: UserVerificationPolicy,
    ) -> Result<(), WebauthnError> {
        if !user_present {
            debug!("user present flag is not set");
            return Err(WebauthnError::UserNotPresent);
        }
        if policy == UserVerificationPolicy::Required && !user_verified {
            debug!("user verification was required but not performed");
            return Err(WebauthnError::UserNotVerified);
        }
        Ok(())
    }

    /// Verify a credential registration. `options` are the creation options issued by
    /// [WebauthnCore::generate_challenge_register_options] for this ceremony. `rp_id`
    /// overrides the relying party id of the options and the configuration.
    ///
    /// On success the caller must persist the credential id, public key and counter of the
    /// [RegistrationResult]. The repository is only read.
    pub fn register_credential<R>(
        &self,
        reg: &RegisterPublicKeyCredential,
        options: &PublicKeyCredentialCreationOptions,
        rp_id: Option<&str>,
        repository: &R,
    ) -> Result<RegistrationResult, WebauthnError>
    where
        R: CredentialRepository + ?Sized,
    {
        // Let C, the client data claimed as collected during the credential creation, be the
        // result of running an implementation-specific JSON parser on JSONtext. The
        // attestation object is decoded at the same time.
        let data = AuthenticatorAttestationResponse::try_from(&reg.response)?;

        let rp_id = rp_id
            .or(options.rp.id.as_deref())
            .unwrap_or_else(|| self.config.get_relying_party_id());

        self.verify_client_data(
            &data.client_data_json,
            ClientDataType::Create,
            &options.challenge,
            rp_id,
        )?;

        // Compute the hash of response.clientDataJSON using SHA-256.
        let client_data_json_hash = compute_sha256(&data.client_data_json_bytes);

        let ao = &data.attestation_object;
        let auth_data = &ao.auth_data;

        // Verify that the rpIdHash in authData is the SHA-256 hash of the RP ID expected by the
        // Relying Party.
        Self::verify_rp_id_hash(&auth_data.rp_id_hash, rp_id)?;

        // Verify that the User Present bit is set, and the User Verified bit if user
        // verification is required for this registration.
        Self::verify_user_flags(
            auth_data.user_present(),
            auth_data.user_verified(),
            options.user_verification(),
        )?;

        // No extension is processed. A requested extension is either not echoed or echoed and
        // not understood, so both fail.
        if has_extensions(options.extensions.as_ref()) || auth_data.extensions.is_some() {
            debug!("registration extensions were requested or returned");
            return Err(WebauthnError::ExtensionsNotSupported);
        }

        // Determine the attestation statement format by performing a USASCII case-sensitive
        // match on fmt against the set of supported formats.
        let attestation_format = AttestationFormat::try_from(ao.fmt.as_str())?;
        trace!(fmt = attestation_format.name(), "verifying attestation statement");

        // Verify that attStmt is a correct attestation statement, conveying a valid attestation
        // signature.
        let valid = attestation_format.verify(
            &ao.att_stmt,
            auth_data,
            &ao.auth_data_bytes,
            &client_data_json_hash,
        )?;
        if !valid {
            return Err(WebauthnError::AttestationStatementSigInvalid);
        }

        let acd = auth_data
            .acd
            .as_ref()
            .ok_or(WebauthnError::MissingAttestationCredentialData)?;
        let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
        let aaguid = Uuid::from_bytes(acd.aaguid);

        // Assess the attestation trustworthiness using the configured trust anchors.
        let attestation = attestation_format.trust_path(&ao.att_stmt)?;
        if let Some(ca_list) = self.config.get_attestation_ca_list() {
            match &attestation {
                ParsedAttestationData::Basic(chain) => {
                    let ca = verify_attestation_ca_chain(chain, ca_list, Some(&aaguid))?;
                    trace!(subject = ?ca.ca.subject_name(), "attestation is trusted");
                }
                ParsedAttestationData::None => {
                    debug!("trust anchors are configured but the attestation is none");
                    return Err(WebauthnError::AttestationTrustFailure);
                }
            }
        }

        // Check that the credentialId is not yet registered to any other user.
        if repository.has_credential_id(&acd.credential_id) {
            debug!("credential id is already registered");
            return Err(WebauthnError::CredentialAlreadyExists);
        }

        Ok(RegistrationResult {
            credential_id: acd.credential_id.clone(),
            credential_public_key,
            counter: auth_data.counter,
            user_verified: auth_data.user_verified(),
            aaguid,
            attestation_format,
            attestation,
        })
    }

    /// Verify an authentication. `options` are the request options issued by
    /// [WebauthnCore::generate_challenge_authenticate_options] for this ceremony. `rp_id`
    /// overrides the relying party id of the options and the configuration.
    ///
    /// The new signature counter is written to `repository` only when every check passes.
    pub fn authenticate_credential<R>(
        &self,
        rsp: &PublicKeyCredential,
        options: &PublicKeyCredentialRequestOptions,
        rp_id: Option<&str>,
        repository: &R,
    ) -> Result<AuthenticationResult, WebauthnError>
    where
        R: CredentialRepository + ?Sized,
    {
        let cred_id = rsp.raw_id.0.as_slice();

        // Verify that credential.id identifies one of the public key credentials that were
        // listed in allowCredentials. An empty list allows nothing.
        if !options
            .allow_credentials
            .iter()
            .any(|ac| ac.id.as_slice() == cred_id)
        {
            debug!("credential is not in the allowed list");
            return Err(WebauthnError::CredentialNotAllowed);
        }

        // User handles identify the user for discoverable credentials, which are not handled
        // here.
        if rsp.response.user_handle.is_some() {
            debug!("assertion carries a user handle");
            return Err(WebauthnError::UserHandleNotSupported);
        }

        // Using credential's id attribute, look up the corresponding credential public key.
        let credential_public_key = repository
            .get_credential_public_key(cred_id)
            .ok_or(WebauthnError::CredentialNotFound)?;

        let data = AuthenticatorAssertionResponse::try_from(&rsp.response)?;

        let rp_id = rp_id
            .or(options.rp_id.as_deref())
            .unwrap_or_else(|| self.config.get_relying_party_id());

        self.verify_client_data(
            &data.client_data,
            ClientDataType::Get,
            &options.challenge,
            rp_id,
        )?;

        let auth_data = &data.authenticator_data;

        // Verify that the rpIdHash in authData is the SHA-256 hash of the RP ID expected by the
        // Relying Party.
        Self::verify_rp_id_hash(&auth_data.rp_id_hash, rp_id)?;

        Self::verify_user_flags(
            auth_data.user_present(),
            auth_data.user_verified(),
            options.user_verification,
        )?;

        if has_extensions(options.extensions.as_ref()) || auth_data.extensions.is_some() {
            debug!("assertion extensions were requested or returned");
            return Err(WebauthnError::ExtensionsNotSupported);
        }

        // Let hash be the result of computing a hash over the cData using SHA-256, and verify
        // that sig is a valid signature over the binary concatenation of authData and hash.
        let client_data_hash = compute_sha256(&data.client_data_bytes);
        let verification_data: Vec<u8> = data
            .authenticator_data_bytes
            .iter()
            .chain(client_data_hash.iter())
            .copied()
            .collect();

        let verified =
            credential_public_key.verify_signature(&data.signature, &verification_data)?;
        if !verified {
            error!("assertion signature failed to verify");
            return Err(WebauthnError::AuthenticationFailure);
        }

        // If the signature counter value authData.signCount is greater than the signature
        // counter value stored in conjunction with credential's id attribute, update the
        // stored signature counter value. Otherwise the authenticator may be cloned.
        let stored_counter = repository
            .get_credential_counter(cred_id)
            .ok_or(WebauthnError::CredentialNotFound)?;
        if auth_data.counter <= stored_counter {
            warn!(
                stored = stored_counter,
                reported = auth_data.counter,
                "signature counter did not advance"
            );
            return Err(WebauthnError::CounterRegression);
        }

        repository.update_credential_counter(cred_id, auth_data.counter);

        Ok(AuthenticationResult {
            credential_id: cred_id.to_vec(),
            counter: auth_data.counter,
            user_verified: auth_data.user_verified(),
        })
    }
}
