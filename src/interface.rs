//! Types that are expected to be serialised in applications, and the storage
//! seam the ceremonies consult.

use uuid::Uuid;

use crate::attestation::{AttestationFormat, ParsedAttestationData};
use crate::crypto::COSEKey;
use crate::proto::CredentialID;

pub use crate::proto::UserVerificationPolicy;

/// Storage of registered credentials, consulted by
/// [WebauthnCore::authenticate_credential](crate::WebauthnCore::authenticate_credential)
/// and [WebauthnCore::register_credential](crate::WebauthnCore::register_credential).
///
/// Implementations may be shared between threads. `update_credential_counter` must be
/// serialised per credential id, otherwise two concurrent replays of the same assertion can
/// both pass the counter check.
pub trait CredentialRepository {
    /// Is this credential id already registered.
    fn has_credential_id(&self, cred_id: &[u8]) -> bool;

    /// The public key stored for this credential, if it is known.
    fn get_credential_public_key(&self, cred_id: &[u8]) -> Option<COSEKey>;

    /// The last signature counter persisted for this credential, if it is known.
    fn get_credential_counter(&self, cred_id: &[u8]) -> Option<u32>;

    /// Persist a new signature counter. Only called once an assertion has fully verified.
    fn update_credential_counter(&self, cred_id: &[u8], counter: u32);
}

/// A verified registration. The caller persists `credential_id`, `credential_public_key`
/// and `counter` so the credential can be used in later authentications.
#[derive(Debug, Clone)]
pub struct RegistrationResult {
    /// The credential id chosen by the authenticator.
    pub credential_id: CredentialID,
    /// The credential public key.
    pub credential_public_key: COSEKey,
    /// The signature counter at registration time.
    pub counter: u32,
    /// Whether the user was verified during registration.
    pub user_verified: bool,
    /// The authenticator model.
    pub aaguid: Uuid,
    /// The attestation statement format the authenticator used.
    pub attestation_format: AttestationFormat,
    /// The attestation trust path.
    pub attestation: ParsedAttestationData,
}

/// A verified authentication. The new counter has already been persisted through the
/// [CredentialRepository].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResult {
    /// The credential that was used.
    pub credential_id: CredentialID,
    /// The signature counter reported by the authenticator.
    pub counter: u32,
    /// Whether the user was verified during this authentication.
    pub user_verified: bool,
}
