//! Cryptographic operation wrapper for Webauthn. This module exists to
//! allow ease of auditing, safe operation wrappers for the webauthn library,
//! and cryptographic provider abstraction. This module uses OpenSSL
//! as the cryptographic primitive provider.

#![allow(non_camel_case_types)]

use openssl::{bn, ec, hash, nid, pkey, rsa, sha, sign, x509};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

use crate::certificate::pem_wrap;
use crate::constants::{P256_SPKI_DER_PREFIX, U2F_PUBLIC_KEY_LENGTH};
use crate::error::*;

/// A COSE signature algorithm identifier. Only the algorithms this library can
/// verify are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum COSEAlgorithm {
    /// ECDSA with SHA-256, usually on P-256
    ES256,
    /// ECDSA with SHA-384, usually on P-384
    ES384,
    /// ECDSA with SHA-512, usually on P-521
    ES512,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256,
}

impl TryFrom<i128> for COSEAlgorithm {
    type Error = WebauthnError;

    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            -7 => Ok(COSEAlgorithm::ES256),
            -35 => Ok(COSEAlgorithm::ES384),
            -36 => Ok(COSEAlgorithm::ES512),
            -257 => Ok(COSEAlgorithm::RS256),
            _ => Err(WebauthnError::COSEKeyInvalidAlgorithm),
        }
    }
}

impl TryFrom<i64> for COSEAlgorithm {
    type Error = WebauthnError;

    fn try_from(i: i64) -> Result<Self, Self::Error> {
        COSEAlgorithm::try_from(i128::from(i))
    }
}

impl From<COSEAlgorithm> for i64 {
    fn from(c: COSEAlgorithm) -> Self {
        match c {
            COSEAlgorithm::ES256 => -7,
            COSEAlgorithm::ES384 => -35,
            COSEAlgorithm::ES512 => -36,
            COSEAlgorithm::RS256 => -257,
        }
    }
}

impl COSEAlgorithm {
    fn digest(self) -> hash::MessageDigest {
        match self {
            COSEAlgorithm::ES256 | COSEAlgorithm::RS256 => hash::MessageDigest::sha256(),
            COSEAlgorithm::ES384 => hash::MessageDigest::sha384(),
            COSEAlgorithm::ES512 => hash::MessageDigest::sha512(),
        }
    }
}

// +---------+-------+----------+------------------------------------+
// | Name    | Value | Key Type | Description                        |
// +---------+-------+----------+------------------------------------+
// | P-256   | 1     | EC2      | NIST P-256 also known as secp256r1 |
// | P-384   | 2     | EC2      | NIST P-384 also known as secp384r1 |
// | P-521   | 3     | EC2      | NIST P-521 also known as secp521r1 |
// +---------+-------+----------+------------------------------------+
/// An ECDSACurve identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ECDSACurve {
    /// Identifies this curve as SECP256R1 (X9_62_PRIME256V1 in OpenSSL)
    SECP256R1 = 1,
    /// Identifies this curve as SECP384R1
    SECP384R1 = 2,
    /// Identifies this curve as SECP521R1
    SECP521R1 = 3,
}

impl TryFrom<i128> for ECDSACurve {
    type Error = WebauthnError;
    fn try_from(u: i128) -> Result<Self, Self::Error> {
        match u {
            1 => Ok(ECDSACurve::SECP256R1),
            2 => Ok(ECDSACurve::SECP384R1),
            3 => Ok(ECDSACurve::SECP521R1),
            _ => Err(WebauthnError::COSEKeyECDSAInvalidCurve),
        }
    }
}

impl ECDSACurve {
    fn to_openssl_nid(self) -> nid::Nid {
        match self {
            ECDSACurve::SECP256R1 => nid::Nid::X9_62_PRIME256V1,
            ECDSACurve::SECP384R1 => nid::Nid::SECP384R1,
            ECDSACurve::SECP521R1 => nid::Nid::SECP521R1,
        }
    }

    /// The byte length of a single coordinate on this curve.
    pub fn coordinate_size(self) -> usize {
        match self {
            ECDSACurve::SECP256R1 => 32,
            ECDSACurve::SECP384R1 => 48,
            ECDSACurve::SECP521R1 => 66,
        }
    }
}

const COSE_KTY_EC2: i128 = 2;
const COSE_KTY_RSA: i128 = 3;

/// A COSE Elliptic Curve Public Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEEC2Key {
    /// The curve that this key references.
    pub curve: ECDSACurve,
    /// The key's public X coordinate.
    pub x: Vec<u8>,
    /// The key's public Y coordinate.
    pub y: Vec<u8>,
}

/// A COSE RSA PublicKey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSERSAKey {
    /// An RSA modulus
    pub n: Vec<u8>,
    /// An RSA exponent
    pub e: Vec<u8>,
}

/// The type of Key contained within a COSE value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum COSEKeyType {
    /// Identifies this as an Elliptic Curve EC2 key
    EC_EC2(COSEEC2Key),
    /// Identifies this as an RSA key
    RSA(COSERSAKey),
}

/// A COSE Key as provided by the Authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEKey {
    /// The signature algorithm this key is used with
    pub type_: COSEAlgorithm,
    /// The public key
    pub key: COSEKeyType,
}

impl TryFrom<&serde_cbor_2::Value> for COSEKey {
    type Error = WebauthnError;
    fn try_from(d: &serde_cbor_2::Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d)?;

        // See also https://tools.ietf.org/html/rfc8152#section-3.1
        //   1: kty, 3: alg, then negative labels are specific to the key type.
        let key_type_value = m
            .get(&serde_cbor_2::Value::Integer(1))
            .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
        let key_type = cbor_try_i128!(key_type_value)?;

        let content_type_value = m
            .get(&serde_cbor_2::Value::Integer(3))
            .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
        let type_ = COSEAlgorithm::try_from(cbor_try_i128!(content_type_value)?)?;

        let key = match (key_type, type_) {
            (COSE_KTY_EC2, COSEAlgorithm::ES256 | COSEAlgorithm::ES384 | COSEAlgorithm::ES512) => {
                // crv (-1), x (-2) and y (-3)
                let curve_type_value = m
                    .get(&serde_cbor_2::Value::Integer(-1))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let curve = ECDSACurve::try_from(cbor_try_i128!(curve_type_value)?)?;

                let x_value = m
                    .get(&serde_cbor_2::Value::Integer(-2))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let x = cbor_try_bytes!(x_value)?;

                let y_value = m
                    .get(&serde_cbor_2::Value::Integer(-3))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let y = cbor_try_bytes!(y_value)?;

                let coord_len = curve.coordinate_size();
                if x.len() != coord_len || y.len() != coord_len {
                    return Err(WebauthnError::COSEKeyECDSAXYInvalid);
                }

                COSEKeyType::EC_EC2(COSEEC2Key {
                    curve,
                    x: x.clone(),
                    y: y.clone(),
                })
            }
            (COSE_KTY_RSA, COSEAlgorithm::RS256) => {
                // n (-1), e (-2)
                let n_value = m
                    .get(&serde_cbor_2::Value::Integer(-1))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let n = cbor_try_bytes!(n_value)?;

                let e_value = m
                    .get(&serde_cbor_2::Value::Integer(-2))
                    .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
                let e = cbor_try_bytes!(e_value)?;

                if n.len() != 256 || e.len() != 3 {
                    return Err(WebauthnError::COSEKeyRSANEInvalid);
                }

                COSEKeyType::RSA(COSERSAKey {
                    n: n.clone(),
                    e: e.clone(),
                })
            }
            _ => {
                debug!(?key_type, ?type_, "unsupported cose key type");
                return Err(WebauthnError::COSEKeyInvalidType);
            }
        };

        let cose_key = COSEKey { type_, key };

        // "Applications MUST check that the curve and the key type are
        //  consistent and reject a key if they are not."
        cose_key.validate()?;
        Ok(cose_key)
    }
}

impl COSEKey {
    /// Build a P-256 key from a U2F style uncompressed point `0x04 || x || y`.
    pub fn from_u2f_point(point: &[u8]) -> Result<Self, WebauthnError> {
        if point.len() != U2F_PUBLIC_KEY_LENGTH || point[0] != 0x04 {
            return Err(WebauthnError::COSEKeyECDSAXYInvalid);
        }
        let cose_key = COSEKey {
            type_: COSEAlgorithm::ES256,
            key: COSEKeyType::EC_EC2(COSEEC2Key {
                curve: ECDSACurve::SECP256R1,
                x: point[1..33].to_vec(),
                y: point[33..65].to_vec(),
            }),
        };
        cose_key.validate()?;
        Ok(cose_key)
    }

    /// The uncompressed point `0x04 || x || y` of an EC2 key.
    pub(crate) fn get_alg_key_ecc_x962_raw(&self) -> Result<Vec<u8>, WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ecpk) => {
                let r: [u8; 1] = [0x04];
                Ok(r.iter()
                    .chain(ecpk.x.iter())
                    .chain(ecpk.y.iter())
                    .copied()
                    .collect())
            }
            COSEKeyType::RSA(_) => {
                debug!("requested an ec point from an rsa key");
                Err(WebauthnError::COSEKeyInvalidType)
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), WebauthnError> {
        self.get_openssl_pkey().map(|_| ())
    }

    fn get_openssl_pkey(&self) -> Result<pkey::PKey<pkey::Public>, WebauthnError> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let ec_group = ec::EcGroup::from_curve_name(ec2k.curve.to_openssl_nid())?;
                let xbn = bn::BigNum::from_slice(&ec2k.x)?;
                let ybn = bn::BigNum::from_slice(&ec2k.y)?;

                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)
                    .map_err(|e| {
                        debug!(?e, "ec point is not on the curve");
                        WebauthnError::COSEKeyECDSAXYInvalid
                    })?;
                ec_key.check_key().map_err(|e| {
                    debug!(?e, "ec key check failed");
                    WebauthnError::COSEKeyECDSAXYInvalid
                })?;

                Ok(pkey::PKey::from_ec_key(ec_key)?)
            }
            COSEKeyType::RSA(rsak) => {
                let nbn = bn::BigNum::from_slice(&rsak.n)?;
                let ebn = bn::BigNum::from_slice(&rsak.e)?;
                let rsa_key = rsa::Rsa::from_public_components(nbn, ebn)
                    .map_err(|_| WebauthnError::COSEKeyRSANEInvalid)?;
                Ok(pkey::PKey::from_rsa(rsa_key)?)
            }
        }
    }

    /// Verifies data was signed with this [COSEKey]. A signature that does not verify
    /// is `Ok(false)`.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> Result<bool, WebauthnError> {
        let pkey = self.get_openssl_pkey()?;
        verify_with_pkey(&pkey, self.type_.digest(), signature, verification_data)
    }
}

fn verify_with_pkey(
    pkey: &pkey::PKeyRef<pkey::Public>,
    digest: hash::MessageDigest,
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, WebauthnError> {
    let mut verifier = sign::Verifier::new(digest, pkey)?;
    verifier.update(verification_data)?;
    // A malformed signature is reported by openssl as an error rather than a
    // failed verification; both are a failed signature here.
    Ok(verifier.verify(signature).unwrap_or_else(|e| {
        warn!(?e, "signature could not be verified");
        false
    }))
}

/// Validate an x509 signature is valid for the supplied data, using SHA-256.
pub fn verify_signature(
    cert: &x509::X509Ref,
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, WebauthnError> {
    let pkey = cert.public_key()?;
    verify_with_pkey(
        &pkey,
        hash::MessageDigest::sha256(),
        signature,
        verification_data,
    )
}

/// DER SubjectPublicKeyInfo for a raw uncompressed P-256 point.
pub fn p256_spki_der(point: &[u8]) -> Result<Vec<u8>, WebauthnError> {
    if point.len() != U2F_PUBLIC_KEY_LENGTH || point[0] != 0x04 {
        return Err(WebauthnError::COSEKeyECDSAXYInvalid);
    }
    let mut der = Vec::with_capacity(P256_SPKI_DER_PREFIX.len() + point.len());
    der.extend_from_slice(&P256_SPKI_DER_PREFIX);
    der.extend_from_slice(point);
    Ok(der)
}

/// PEM encoded SubjectPublicKeyInfo for a raw uncompressed P-256 point.
pub fn p256_public_key_pem(point: &[u8]) -> Result<String, WebauthnError> {
    p256_spki_der(point).map(|der| pem_wrap("PUBLIC KEY", &der))
}

/// Verify an ECDSA-SHA256 signature with a raw uncompressed P-256 point.
pub fn verify_p256_point_signature(
    point: &[u8],
    signature: &[u8],
    verification_data: &[u8],
) -> Result<bool, WebauthnError> {
    let der = p256_spki_der(point)?;
    let pkey = pkey::PKey::public_key_from_der(&der).map_err(|e| {
        debug!(?e, "invalid p256 public key point");
        WebauthnError::COSEKeyECDSAXYInvalid
    })?;
    verify_with_pkey(
        &pkey,
        hash::MessageDigest::sha256(),
        signature,
        verification_data,
    )
}

/// Constant time equality. Inputs of different lengths are unequal.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && openssl::memcmp::eq(a, b)
}

/// Compute the sha256 of a slice of data.
pub fn compute_sha256(data: &[u8]) -> [u8; 32] {
    sha::sha256(data)
}
