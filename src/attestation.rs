//! Attestation information and verifications procedures.
//!
//! Each supported statement format is a variant of [AttestationFormat], selected by the
//! `fmt` member of the attestation object. A structurally broken statement is an error.
//! A statement that is well formed but whose signature does not verify is `Ok(false)`.

use openssl::x509;
use serde_cbor_2::Value;

use crate::certificate::{
    assert_packed_attest_req, attestation_certificate, check_chain, validate_aaguid_extension,
};
use crate::constants::U2F_PUBLIC_KEY_LENGTH;
use crate::crypto::{self, COSEKey};
use crate::error::WebauthnError;
use crate::internals::{AttestationStatement, AttestedCredentialData, AuthenticatorData};

/// The attestation statement formats this library can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationFormat {
    /// <https://w3c.github.io/webauthn/#sctn-packed-attestation>
    Packed,
    /// <https://w3c.github.io/webauthn/#sctn-fido-u2f-attestation>
    FIDOU2F,
    /// <https://w3c.github.io/webauthn/#sctn-none-attestation>
    None,
}

impl TryFrom<&str> for AttestationFormat {
    type Error = WebauthnError;

    fn try_from(a: &str) -> Result<AttestationFormat, Self::Error> {
        match a {
            "packed" => Ok(AttestationFormat::Packed),
            "fido-u2f" => Ok(AttestationFormat::FIDOU2F),
            "none" => Ok(AttestationFormat::None),
            _ => {
                debug!(fmt = %a, "unsupported attestation format");
                Err(WebauthnError::AttestationNotSupported)
            }
        }
    }
}

/// The trust path an attestation statement carried.
#[derive(Debug, Clone)]
pub enum ParsedAttestationData {
    /// The credential is authenticated by a signing X509 certificate chain from a
    /// vendor or provider, leaf first.
    Basic(Vec<x509::X509>),
    /// No attestation was provided with this credential.
    None,
}

fn stmt_get<'a>(att_stmt: &'a AttestationStatement, key: &str) -> Option<&'a Value> {
    att_stmt.get(&Value::Text(key.to_string()))
}

fn stmt_sig(att_stmt: &AttestationStatement) -> Result<&[u8], WebauthnError> {
    stmt_get(att_stmt, "sig")
        .ok_or(WebauthnError::AttestationStatementSigMissing)
        .and_then(|v| {
            cbor_try_bytes!(v).map_err(|_| WebauthnError::AttestationStatementSigMissing)
        })
        .map(|v| v.as_slice())
}

/// The DER certificates of `x5c`, or `None` when the member is absent.
fn stmt_x5c(att_stmt: &AttestationStatement) -> Result<Option<Vec<&[u8]>>, WebauthnError> {
    let Some(x5c) = stmt_get(att_stmt, "x5c") else {
        return Ok(None);
    };
    let arr = cbor_try_array!(x5c).map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
    if arr.is_empty() {
        return Err(WebauthnError::AttestationStatementX5CMissing);
    }
    arr.iter()
        .map(|v| {
            cbor_try_bytes!(v)
                .map(|b| b.as_slice())
                .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn attested_credential(
    auth_data: &AuthenticatorData,
) -> Result<&AttestedCredentialData, WebauthnError> {
    auth_data
        .acd
        .as_ref()
        .ok_or(WebauthnError::MissingAttestationCredentialData)
}

impl AttestationFormat {
    /// The `fmt` identifier of this format.
    pub fn name(self) -> &'static str {
        match self {
            AttestationFormat::Packed => "packed",
            AttestationFormat::FIDOU2F => "fido-u2f",
            AttestationFormat::None => "none",
        }
    }

    /// Verify an attestation statement of this format.
    ///
    /// `auth_data_bytes` must be the authenticator data exactly as received, and
    /// `client_data_hash` the SHA-256 of the raw client data JSON.
    pub fn verify(
        self,
        att_stmt: &AttestationStatement,
        auth_data: &AuthenticatorData,
        auth_data_bytes: &[u8],
        client_data_hash: &[u8],
    ) -> Result<bool, WebauthnError> {
        match self {
            AttestationFormat::None => verify_none_attestation(att_stmt),
            AttestationFormat::FIDOU2F => {
                verify_fidou2f_attestation(att_stmt, auth_data, client_data_hash)
            }
            AttestationFormat::Packed => {
                verify_packed_attestation(att_stmt, auth_data, auth_data_bytes, client_data_hash)
            }
        }
    }

    /// Extract the certificate chain a verified statement was signed with.
    pub fn trust_path(
        self,
        att_stmt: &AttestationStatement,
    ) -> Result<ParsedAttestationData, WebauthnError> {
        match self {
            AttestationFormat::None => Ok(ParsedAttestationData::None),
            AttestationFormat::FIDOU2F | AttestationFormat::Packed => {
                let x5c = stmt_x5c(att_stmt)?.ok_or(WebauthnError::AttestationStatementX5CMissing)?;
                x5c.into_iter()
                    .map(attestation_certificate)
                    .collect::<Result<Vec<_>, _>>()
                    .map(ParsedAttestationData::Basic)
            }
        }
    }
}

// https://w3c.github.io/webauthn/#sctn-none-attestation
fn verify_none_attestation(att_stmt: &AttestationStatement) -> Result<bool, WebauthnError> {
    if !att_stmt.is_empty() {
        debug!(members = att_stmt.len(), "none attestation statement is not empty");
        return Ok(false);
    }
    Ok(true)
}

// https://w3c.github.io/webauthn/#sctn-fido-u2f-attestation
fn verify_fidou2f_attestation(
    att_stmt: &AttestationStatement,
    auth_data: &AuthenticatorData,
    client_data_hash: &[u8],
) -> Result<bool, WebauthnError> {
    let sig = stmt_sig(att_stmt)?;

    // Check that x5c has exactly one element and let att_cert be that element.
    let x5c = stmt_x5c(att_stmt)?.ok_or(WebauthnError::AttestationStatementX5CMissing)?;
    let [att_cert_der] = x5c.as_slice() else {
        debug!(len = x5c.len(), "fido-u2f x5c must hold exactly one certificate");
        return Err(WebauthnError::AttestationStatementX5CInvalid);
    };
    let att_cert = attestation_certificate(att_cert_der)?;

    let acd = attested_credential(auth_data)?;

    // Convert the COSE_KEY formatted credentialPublicKey to Raw ANSI X9.62 public key
    // format. Both coordinates must be 32 bytes.
    let credential_public_key = COSEKey::try_from(&acd.credential_pk)?;
    let public_key_u2f = credential_public_key.get_alg_key_ecc_x962_raw()?;
    if public_key_u2f.len() != U2F_PUBLIC_KEY_LENGTH {
        debug!("fido-u2f credential key is not a p-256 point");
        return Err(WebauthnError::COSEKeyECDSAXYInvalid);
    }

    // 0x00 || rpIdHash || clientDataHash || credentialId || publicKeyU2F
    let r: [u8; 1] = [0x00];
    let verification_data: Vec<u8> = r
        .iter()
        .chain(auth_data.rp_id_hash.iter())
        .chain(client_data_hash.iter())
        .chain(acd.credential_id.iter())
        .chain(public_key_u2f.iter())
        .copied()
        .collect();

    let verified = crypto::verify_signature(&att_cert, sig, &verification_data)?;
    if !verified {
        error!("fido-u2f attestation signature failed to verify");
    }
    Ok(verified)
}

// https://w3c.github.io/webauthn/#sctn-packed-attestation
fn verify_packed_attestation(
    att_stmt: &AttestationStatement,
    auth_data: &AuthenticatorData,
    auth_data_bytes: &[u8],
    client_data_hash: &[u8],
) -> Result<bool, WebauthnError> {
    let sig = stmt_sig(att_stmt)?;

    let Some(x5c) = stmt_x5c(att_stmt)? else {
        if stmt_get(att_stmt, "ecdaaKeyId").is_some() {
            return Err(WebauthnError::AttestationEcdaaNotSupported);
        }
        return Err(WebauthnError::AttestationSelfNotSupported);
    };

    let acd = attested_credential(auth_data)?;
    let att_cert = check_chain(&x5c)?;

    let verification_data: Vec<u8> = auth_data_bytes
        .iter()
        .chain(client_data_hash.iter())
        .copied()
        .collect();

    if !crypto::verify_signature(&att_cert, sig, &verification_data)? {
        error!("packed attestation signature failed to verify");
        return Ok(false);
    }

    assert_packed_attest_req(&att_cert)?;
    validate_aaguid_extension(&att_cert, &acd.aaguid)?;

    Ok(true)
}
