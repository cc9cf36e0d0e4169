//! Legacy FIDO U2F registration and signing.
//!
//! The browser receives a [RegistrationRequest] or [SignatureRequest] as JSON, and the
//! device answer is loaded with [RegistrationResponse::from_json] or
//! [SignatureResponse::from_json]. Parsing rejects anything structurally wrong; `is_valid`
//! then answers whether the response proves what it claims.

use base64urlsafedata::Base64UrlSafeData;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::certificate::{attestation_certificate, der_to_pem, unused_bytes_fix};
use crate::constants::*;
use crate::crypto::{compute_sha256, ct_eq, p256_public_key_pem, verify_p256_point_signature};
use crate::error::WebauthnError;
use crate::reader::ByteReader;
use crate::trust::{verify_attestation_ca_chain, AttestationCaList};

fn decode_b64url(s: &str) -> Result<Vec<u8>, WebauthnError> {
    base64::decode_config(s, base64::URL_SAFE_NO_PAD).map_err(|e| {
        debug!(?e, "invalid base64url value");
        WebauthnError::ParseBase64Failure(e)
    })
}

fn encode_b64url(data: &[u8]) -> String {
    base64::encode_config(data, base64::URL_SAFE_NO_PAD)
}

fn random_challenge() -> Result<Vec<u8>, WebauthnError> {
    let mut challenge = vec![0; CHALLENGE_SIZE_BYTES];
    openssl::rand::rand_bytes(&mut challenge)?;
    Ok(challenge)
}

/// An opaque credential handle issued by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHandle(Vec<u8>);

impl KeyHandle {
    /// The raw handle bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The handle as base64url without padding.
    pub fn to_b64(&self) -> String {
        encode_b64url(&self.0)
    }
}

impl From<Vec<u8>> for KeyHandle {
    fn from(v: Vec<u8>) -> Self {
        KeyHandle(v)
    }
}

/// An uncompressed P-256 point, `0x04 || x || y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey(Vec<u8>);

impl TryFrom<&[u8]> for PublicKey {
    type Error = WebauthnError;

    fn try_from(point: &[u8]) -> Result<Self, Self::Error> {
        if point.len() != U2F_PUBLIC_KEY_LENGTH {
            return Err(WebauthnError::MalformedResponse);
        }
        Ok(PublicKey(point.to_vec()))
    }
}

impl PublicKey {
    /// The raw point bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A key that has completed registration.
///
/// Serializes to the `{version, keyHandle}` object a browser expects in a sign request.
#[derive(Debug, Clone)]
pub struct RegisteredKey {
    version: String,
    key_handle: KeyHandle,
    public_key: PublicKey,
    attestation_certificate: Vec<u8>,
}

impl RegisteredKey {
    /// Construct from stored registration material. `attestation_certificate` is DER.
    pub fn new(
        version: &str,
        key_handle: KeyHandle,
        public_key: PublicKey,
        attestation_certificate: Vec<u8>,
    ) -> Self {
        RegisteredKey {
            version: version.to_string(),
            key_handle,
            public_key,
            attestation_certificate,
        }
    }

    /// The U2F protocol version the key registered with.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The device key handle.
    pub fn key_handle(&self) -> &KeyHandle {
        &self.key_handle
    }

    /// The credential public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The attestation certificate DER, with the unused-bits repair already applied.
    pub fn attestation_certificate(&self) -> &[u8] {
        &self.attestation_certificate
    }

    /// The attestation certificate, PEM wrapped.
    pub fn attestation_certificate_pem(&self) -> String {
        der_to_pem(&self.attestation_certificate)
    }

    /// The public key as a PEM SubjectPublicKeyInfo.
    pub fn public_key_pem(&self) -> Result<String, WebauthnError> {
        p256_public_key_pem(self.public_key.as_bytes())
    }
}

impl Serialize for RegisteredKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RegisteredKey", 2)?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("keyHandle", &self.key_handle.to_b64())?;
        state.end()
    }
}

/// A registration challenge for the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    version: String,
    challenge: Base64UrlSafeData,
    app_id: String,
}

impl RegistrationRequest {
    /// A new request with a fresh random challenge.
    pub fn new(app_id: &str) -> Result<Self, WebauthnError> {
        random_challenge().map(|challenge| Self::with_challenge(app_id, challenge))
    }

    /// A request for a challenge that was issued earlier.
    pub fn with_challenge(app_id: &str, challenge: Vec<u8>) -> Self {
        RegistrationRequest {
            version: U2F_PROTOCOL_VERSION.to_string(),
            challenge: Base64UrlSafeData(challenge),
            app_id: app_id.to_string(),
        }
    }

    /// The application id, usually the site origin.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The raw challenge bytes.
    pub fn challenge(&self) -> &[u8] {
        &self.challenge.0
    }
}

/// A sign challenge covering a set of registered keys.
#[derive(Debug, Clone)]
pub struct SignatureRequest {
    app_id: String,
    challenge: Vec<u8>,
    registered_keys: BTreeMap<String, RegisteredKey>,
}

impl SignatureRequest {
    /// A new request with a fresh random challenge.
    pub fn new(app_id: &str, registered_keys: Vec<RegisteredKey>) -> Result<Self, WebauthnError> {
        random_challenge().map(|challenge| Self::with_challenge(app_id, challenge, registered_keys))
    }

    /// A request for a challenge that was issued earlier.
    pub fn with_challenge(
        app_id: &str,
        challenge: Vec<u8>,
        registered_keys: Vec<RegisteredKey>,
    ) -> Self {
        let mut req = SignatureRequest {
            app_id: app_id.to_string(),
            challenge,
            registered_keys: BTreeMap::new(),
        };
        for key in registered_keys {
            req.add_registered_key(key);
        }
        req
    }

    /// Add a key, replacing any key with the same handle.
    pub fn add_registered_key(&mut self, key: RegisteredKey) {
        self.registered_keys.insert(key.key_handle.to_b64(), key);
    }

    /// Is a key with this handle part of the request.
    pub fn has_registered_key(&self, key_handle: &KeyHandle) -> bool {
        self.registered_keys.contains_key(&key_handle.to_b64())
    }

    /// Find the registered key for a handle returned by the device.
    pub fn get_registered_key(&self, key_handle: &KeyHandle) -> Result<&RegisteredKey, WebauthnError> {
        self.registered_keys
            .get(&key_handle.to_b64())
            .ok_or(WebauthnError::UnsupportedKeyHandle)
    }

    /// The keys in this request, ordered by handle.
    pub fn registered_keys(&self) -> impl Iterator<Item = &RegisteredKey> {
        self.registered_keys.values()
    }

    /// The application id, usually the site origin.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// The raw challenge bytes.
    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }
}

impl Serialize for SignatureRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let keys: Vec<&RegisteredKey> = self.registered_keys.values().collect();
        let mut state = serializer.serialize_struct("SignatureRequest", 3)?;
        state.serialize_field("appId", &self.app_id)?;
        state.serialize_field("challenge", &encode_b64url(&self.challenge))?;
        state.serialize_field("registeredKeys", &keys)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct ClientDataJson {
    typ: String,
    challenge: String,
    origin: String,
    cid_pubkey: Option<serde_json::Value>,
}

/// The browser's client data for a U2F operation.
#[derive(Debug, Clone)]
pub struct ClientData {
    raw: Vec<u8>,
    typ: String,
    challenge: Vec<u8>,
    origin: String,
    cid_pubkey: Option<serde_json::Value>,
}

impl ClientData {
    /// Decode from the base64url text the browser returns.
    pub fn from_b64(data: &str) -> Result<Self, WebauthnError> {
        let raw = decode_b64url(data)?;
        let parsed: ClientDataJson = serde_json::from_slice(&raw).map_err(|e| {
            debug!(?e, "u2f client data is not a valid object");
            WebauthnError::InvalidClientData
        })?;
        Ok(ClientData {
            challenge: decode_b64url(&parsed.challenge)?,
            typ: parsed.typ,
            origin: parsed.origin,
            cid_pubkey: parsed.cid_pubkey,
            raw,
        })
    }

    /// The exact bytes that were hashed into the device signature.
    pub fn raw_data(&self) -> &[u8] {
        &self.raw
    }

    /// The client data type.
    pub fn typ(&self) -> &str {
        &self.typ
    }

    /// The decoded challenge.
    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    /// The origin the browser reports.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The channel id public key, if the browser sent one.
    pub fn channel_id_public_key(&self) -> Option<&serde_json::Value> {
        self.cid_pubkey.as_ref()
    }
}

/// Load a response object, rejecting device error responses.
fn response_json<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T, WebauthnError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let object = value.as_object().ok_or(WebauthnError::MalformedResponse)?;
    if object.contains_key("errorCode") {
        debug!(error_code = ?object.get("errorCode"), "u2f device returned an error");
        return Err(WebauthnError::U2FErrorResponse);
    }
    serde_json::from_value(value).map_err(|e| {
        debug!(?e, "u2f response is missing required fields");
        WebauthnError::MalformedResponse
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationResponseJson {
    version: Option<String>,
    challenge: Option<String>,
    client_data: Option<String>,
    registration_data: Option<String>,
}

/// A device's answer to a [RegistrationRequest].
#[derive(Debug, Clone)]
pub struct RegistrationResponse {
    client_data: ClientData,
    registered_key: RegisteredKey,
    signature: Vec<u8>,
}

impl RegistrationResponse {
    /// Load a registration response from the JSON the browser produced.
    pub fn from_json(json: &str) -> Result<Self, WebauthnError> {
        let data: RegistrationResponseJson = response_json(json)?;

        let version = data.version.ok_or(WebauthnError::MalformedResponse)?;
        if version != U2F_PROTOCOL_VERSION {
            debug!(%version, "unsupported u2f version");
            return Err(WebauthnError::UnsupportedProtocolVersion);
        }

        let client_data = ClientData::from_b64(
            data.client_data
                .as_deref()
                .ok_or(WebauthnError::MalformedResponse)?,
        )?;
        if client_data.typ() != CLIENT_DATA_TYPE_U2F_REGISTER {
            debug!(typ = %client_data.typ(), "unexpected u2f client data type");
            return Err(WebauthnError::InvalidClientDataType);
        }

        let challenge =
            decode_b64url(data.challenge.as_deref().ok_or(WebauthnError::MalformedResponse)?)?;
        if !ct_eq(&challenge, client_data.challenge()) {
            debug!("response challenge does not match client data challenge");
            return Err(WebauthnError::MismatchedChallenge);
        }

        let registration_data = decode_b64url(
            data.registration_data
                .as_deref()
                .ok_or(WebauthnError::MalformedResponse)?,
        )?;
        let (public_key, key_handle, certificate, signature) =
            Self::parse_registration_data(&registration_data).map_err(|e| {
                debug!(?e, "invalid u2f registration data");
                WebauthnError::MalformedResponse
            })?;

        Ok(RegistrationResponse {
            client_data,
            registered_key: RegisteredKey::new(&version, key_handle, public_key, certificate),
            signature,
        })
    }

    fn parse_registration_data(
        data: &[u8],
    ) -> Result<(PublicKey, KeyHandle, Vec<u8>, Vec<u8>), WebauthnError> {
        let mut reader = ByteReader::new(data);

        if reader.read_u8()? != U2F_RESERVED_BYTE {
            return Err(WebauthnError::MalformedResponse);
        }

        let public_key = PublicKey::try_from(reader.read(U2F_PUBLIC_KEY_LENGTH)?)?;

        let key_handle_len = reader.read_u8()?;
        let key_handle = KeyHandle(reader.read(key_handle_len as usize)?.to_vec());

        // The certificate length comes from its own DER header (SEQUENCE, 0x82, len_hi, len_lo).
        let cert_header = reader.read_array::<4>()?;
        let cert_len = (cert_header[2] as usize) << 8 | cert_header[3] as usize;
        let cert_body = reader.read(cert_len)?;

        let mut certificate = Vec::with_capacity(cert_header.len() + cert_body.len());
        certificate.extend_from_slice(&cert_header);
        certificate.extend_from_slice(cert_body);

        let signature = reader.read_remaining().to_vec();
        trace!(
            key_handle_len,
            cert_len,
            sig_len = signature.len(),
            "parsed u2f registration data"
        );

        Ok((
            public_key,
            key_handle,
            unused_bytes_fix(&certificate),
            signature,
        ))
    }

    /// The decoded client data.
    pub fn client_data(&self) -> &ClientData {
        &self.client_data
    }

    /// The key this response registers.
    pub fn registered_key(&self) -> &RegisteredKey {
        &self.registered_key
    }

    /// The attestation signature.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Check this response answers `request`, and that the device signature verifies against
    /// its attestation certificate. When `attestation_cas` is given and not empty, the
    /// certificate must also chain to one of those roots.
    pub fn is_valid(
        &self,
        request: &RegistrationRequest,
        attestation_cas: Option<&AttestationCaList>,
    ) -> Result<bool, WebauthnError> {
        if !ct_eq(request.challenge(), self.client_data.challenge()) {
            debug!("challenge mismatch");
            return Ok(false);
        }
        if !ct_eq(
            request.app_id().as_bytes(),
            self.client_data.origin().as_bytes(),
        ) {
            debug!("application id does not match origin");
            return Ok(false);
        }

        let certificate = attestation_certificate(self.registered_key.attestation_certificate())?;

        if let Some(ca_list) = attestation_cas.filter(|cas| !cas.is_empty()) {
            match verify_attestation_ca_chain(&[certificate.clone()], ca_list, None) {
                Ok(_) => {}
                Err(WebauthnError::AttestationTrustFailure) => return Ok(false),
                Err(e) => return Err(e),
            }
        }

        let mut data = Vec::with_capacity(1 + 32 + 32 + 255 + U2F_PUBLIC_KEY_LENGTH);
        data.push(0x00);
        data.extend_from_slice(&compute_sha256(self.client_data.origin().as_bytes()));
        data.extend_from_slice(&compute_sha256(self.client_data.raw_data()));
        data.extend_from_slice(self.registered_key.key_handle().as_bytes());
        data.extend_from_slice(self.registered_key.public_key().as_bytes());

        crate::crypto::verify_signature(&certificate, &self.signature, &data)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureResponseJson {
    key_handle: Option<String>,
    client_data: Option<String>,
    signature_data: Option<String>,
}

/// A device's answer to a [SignatureRequest].
#[derive(Debug, Clone)]
pub struct SignatureResponse {
    client_data: ClientData,
    key_handle: KeyHandle,
    user_presence_byte: u8,
    counter: u32,
    signature: Vec<u8>,
}

impl SignatureResponse {
    /// Load a signature response from the JSON the browser produced.
    pub fn from_json(json: &str) -> Result<Self, WebauthnError> {
        let data: SignatureResponseJson = response_json(json)?;

        let key_handle = KeyHandle(decode_b64url(
            data.key_handle
                .as_deref()
                .ok_or(WebauthnError::MalformedResponse)?,
        )?);

        let client_data = ClientData::from_b64(
            data.client_data
                .as_deref()
                .ok_or(WebauthnError::MalformedResponse)?,
        )?;
        if client_data.typ() != CLIENT_DATA_TYPE_U2F_SIGN {
            debug!(typ = %client_data.typ(), "unexpected u2f client data type");
            return Err(WebauthnError::InvalidClientDataType);
        }

        let signature_data = decode_b64url(
            data.signature_data
                .as_deref()
                .ok_or(WebauthnError::MalformedResponse)?,
        )?;
        let mut reader = ByteReader::new(&signature_data);
        let (user_presence_byte, counter) = reader
            .read_u8()
            .and_then(|up| reader.read_u32_be().map(|counter| (up, counter)))
            .map_err(|_| WebauthnError::MalformedResponse)?;
        let signature = reader.read_remaining().to_vec();

        Ok(SignatureResponse {
            client_data,
            key_handle,
            user_presence_byte,
            counter,
            signature,
        })
    }

    /// The decoded client data.
    pub fn client_data(&self) -> &ClientData {
        &self.client_data
    }

    /// The handle of the key that signed.
    pub fn key_handle(&self) -> &KeyHandle {
        &self.key_handle
    }

    /// Was the user presence byte set.
    pub fn is_user_present(&self) -> bool {
        self.user_presence_byte != 0
    }

    /// The device signature counter.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// The assertion signature.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Check this response answers `request` with a signature from the registered key.
    /// If `current_counter` is known, the response counter must be strictly greater.
    pub fn is_valid(
        &self,
        request: &SignatureRequest,
        current_counter: Option<u32>,
    ) -> Result<bool, WebauthnError> {
        if !ct_eq(request.challenge(), self.client_data.challenge()) {
            debug!("challenge mismatch");
            return Ok(false);
        }
        if !ct_eq(
            request.app_id().as_bytes(),
            self.client_data.origin().as_bytes(),
        ) {
            debug!("application id does not match origin");
            return Ok(false);
        }
        if let Some(current) = current_counter {
            if current >= self.counter {
                debug!(current, counter = self.counter, "counter did not increase");
                return Ok(false);
            }
        }

        let registered_key = request.get_registered_key(&self.key_handle)?;

        let mut data = Vec::with_capacity(32 + 1 + 4 + 32);
        data.extend_from_slice(&compute_sha256(self.client_data.origin().as_bytes()));
        data.push(self.user_presence_byte);
        data.extend_from_slice(&self.counter.to_be_bytes());
        data.extend_from_slice(&compute_sha256(self.client_data.raw_data()));

        verify_p256_point_signature(
            registered_key.public_key().as_bytes(),
            &self.signature,
            &data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::AttestationCaList;

    const YUBICO_U2F_ROOT_CA_SERIAL_457200631_PEM: &[u8] = b"-----BEGIN CERTIFICATE-----
MIIDHjCCAgagAwIBAgIEG0BT9zANBgkqhkiG9w0BAQsFADAuMSwwKgYDVQQDEyNZ
dWJpY28gVTJGIFJvb3QgQ0EgU2VyaWFsIDQ1NzIwMDYzMTAgFw0xNDA4MDEwMDAw
MDBaGA8yMDUwMDkwNDAwMDAwMFowLjEsMCoGA1UEAxMjWXViaWNvIFUyRiBSb290
IENBIFNlcmlhbCA0NTcyMDA2MzEwggEiMA0GCSqGSIb3DQEBAQUAA4IBDwAwggEK
AoIBAQC/jwYuhBVlqaiYWEMsrWFisgJ+PtM91eSrpI4TK7U53mwCIawSDHy8vUmk
5N2KAj9abvT9NP5SMS1hQi3usxoYGonXQgfO6ZXyUA9a+KAkqdFnBnlyugSeCOep
8EdZFfsaRFtMjkwz5Gcz2Py4vIYvCdMHPtwaz0bVuzneueIEz6TnQjE63Rdt2zbw
nebwTG5ZybeWSwbzy+BJ34ZHcUhPAY89yJQXuE0IzMZFcEBbPNRbWECRKgjq//qT
9nmDOFVlSRCt2wiqPSzluwn+v+suQEBsUjTGMEd25tKXXTkNW21wIWbxeSyUoTXw
LvGS6xlwQSgNpk2qXYwf8iXg7VWZAgMBAAGjQjBAMB0GA1UdDgQWBBQgIvz0bNGJ
hjgpToksyKpP9xv9oDAPBgNVHRMECDAGAQH/AgEAMA4GA1UdDwEB/wQEAwIBBjAN
BgkqhkiG9w0BAQsFAAOCAQEAjvjuOMDSa+JXFCLyBKsycXtBVZsJ4Ue3LbaEsPY4
MYN/hIQ5ZM5p7EjfcnMG4CtYkNsfNHc0AhBLdq45rnT87q/6O3vUEtNMafbhU6kt
hX7Y+9XFN9NpmYxr+ekVY5xOxi8h9JDIgoMP4VB1uS0aunL1IGqrNooL9mmFnL2k
LVVee6/VR6C5+KSTCMCWppMuJIZII2v9o4dkoZ8Y7QRjQlLfYzd3qGtKbw7xaF1U
sG/5xUb/Btwb2X2g4InpiB/yt/3CpQXpiWX/K4mBvUKiGn05ZsqeY1gx4g0xLBqc
U9psmyPzK+Vsgw2jeRQ5JlKDyqE0hebfC1tvFu0CCrJFcw==
-----END CERTIFICATE-----";

    const APP_ID: &str = "https://twofactors:4043";

    const REGISTRATION_DATA: &str = "BQRXlpZUqJXsfHYh7MCh1us-yprazMqTJyjWXocA0j_UT59xmzHgf1mkT9Dr82nGtYPX396PrUQx4_54haTZo8g6QFrNackWqHMDTcWCFyB7bYzjtetvJFUNhCuhFVWf8FirNPPfq7M09n5Ep0n5uFesFfa8s9vivFZuRbP6-3LQHKEwggItMIIBF6ADAgECAgQFtgV5MAsGCSqGSIb3DQEBCzAuMSwwKgYDVQQDEyNZdWJpY28gVTJGIFJvb3QgQ0EgU2VyaWFsIDQ1NzIwMDYzMTAgFw0xNDA4MDEwMDAwMDBaGA8yMDUwMDkwNDAwMDAwMFowKDEmMCQGA1UEAwwdWXViaWNvIFUyRiBFRSBTZXJpYWwgOTU4MTUwMzMwWTATBgcqhkjOPQIBBggqhkjOPQMBBwNCAAT9uN6zoe1w62NsBm62AGmWpflw_LXbiPw7MF1B5ZZvDBtUuFL-8KCQftF_O__CnU0yG5z4qEos6qA4yr011ZjeoyYwJDAiBgkrBgEEAYLECgIEFTEuMy42LjEuNC4xLjQxNDgyLjEuMTALBgkqhkiG9w0BAQsDggEBAH7T-2zMJSAT-C8hjCo32mAx0g5_MIHa_K6xKPx_myM5FL-2TWE18XziIfp2T0U-8Sc6jOlllWRCuy8eR0g_c33LyYtYU3f-9QsnDgKJ-IQ28a3PSbJiHuXjAt9VW5q3QnLgafkYFJs97E8SIosQwPiN42r1inS7RCuFrgBTZL2mcCBY_B8th5tTARHqYOhsY_F_pZRMyD8KommEiz7jiKbAnmsFlT_LuPR-g6J-AHKmPDKtZIZOkm1xEvoZl_eDllb7syvo94idDwFFUZonr92ORrBMpCkNhUC2NLiGFh51iMhimdzdZDXRZ4o6bwp0gpxN0_cMNSTR3fFteK3SG2QwRAIgDh1xe2NkrGHygQQsdbUbsIDo5rzK98uGFdtRnnkAcMECIAueb-X0G1j67XwU3JRd8_9bAJiFBnzTxvTWifRUtiUm";
    const REGISTRATION_CHALLENGE: &str = "3lp3lcuYSHo3yrGfuLvQ5NEd-LWDTHRVaDIKXfBvh8s";
    const REGISTRATION_CLIENT_DATA: &str = "eyJ0eXAiOiJuYXZpZ2F0b3IuaWQuZmluaXNoRW5yb2xsbWVudCIsImNoYWxsZW5nZSI6IjNscDNsY3VZU0hvM3lyR2Z1THZRNU5FZC1MV0RUSFJWYURJS1hmQnZoOHMiLCJvcmlnaW4iOiJodHRwczovL3R3b2ZhY3RvcnM6NDA0MyIsImNpZF9wdWJrZXkiOiJ1bnVzZWQifQ";

    const KEY_HANDLE: &str =
        "Ws1pyRaocwNNxYIXIHttjOO1628kVQ2EK6EVVZ_wWKs089-rszT2fkSnSfm4V6wV9ryz2-K8Vm5Fs_r7ctAcoQ";
    const SIGNATURE_CLIENT_DATA: &str = "eyJ0eXAiOiJuYXZpZ2F0b3IuaWQuZ2V0QXNzZXJ0aW9uIiwiY2hhbGxlbmdlIjoiRi16a3NSaDV0aHpLeVpSNk8wRnI3UXhsWi14RVg5X21OSDhIM2NIbl9QbyIsIm9yaWdpbiI6Imh0dHBzOi8vdHdvZmFjdG9yczo0MDQzIiwiY2lkX3B1YmtleSI6InVudXNlZCJ9";
    const SIGNATURE_DATA: &str = "AQAAALowRQIgU-oyzSNitffUGZgRSEijbBytbz8ZwxZvnKSVC90oAm8CIQDoMW5ZtwUooptNB5M-2W_jSjT0yNOkWnU_w1e9aj7vMA";
    const SIGNATURE_CHALLENGE: &str = "F-zksRh5thzKyZR6O0Fr7QxlZ-xEX9_mNH8H3cHn_Po";

    fn registration_json() -> String {
        format!(
            r#"{{"registrationData":"{}","version":"U2F_V2","challenge":"{}","clientData":"{}"}}"#,
            REGISTRATION_DATA, REGISTRATION_CHALLENGE, REGISTRATION_CLIENT_DATA
        )
    }

    fn signature_json() -> String {
        format!(
            r#"{{"keyHandle":"{}","clientData":"{}","signatureData":"{}"}}"#,
            KEY_HANDLE, SIGNATURE_CLIENT_DATA, SIGNATURE_DATA
        )
    }

    fn registration_request() -> RegistrationRequest {
        RegistrationRequest::with_challenge(APP_ID, decode_b64url(REGISTRATION_CHALLENGE).unwrap())
    }

    #[test]
    fn load_registration_response() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let response = RegistrationResponse::from_json(&registration_json()).unwrap();

        let client_data = response.client_data();
        assert_eq!(
            client_data.raw_data(),
            br#"{"typ":"navigator.id.finishEnrollment","challenge":"3lp3lcuYSHo3yrGfuLvQ5NEd-LWDTHRVaDIKXfBvh8s","origin":"https://twofactors:4043","cid_pubkey":"unused"}"#
        );
        assert_eq!(client_data.typ(), CLIENT_DATA_TYPE_U2F_REGISTER);
        assert_eq!(client_data.origin(), APP_ID);
        assert_eq!(
            client_data.challenge(),
            decode_b64url(REGISTRATION_CHALLENGE).unwrap()
        );
        assert_eq!(
            client_data.channel_id_public_key(),
            Some(&serde_json::Value::String("unused".to_string()))
        );

        let key = response.registered_key();
        assert_eq!(key.version(), "U2F_V2");
        assert_eq!(
            key.public_key().as_bytes(),
            decode_b64url("BFeWllSolex8diHswKHW6z7KmtrMypMnKNZehwDSP9RPn3GbMeB_WaRP0Ovzaca1g9ff3o-tRDHj_niFpNmjyDo")
                .unwrap()
        );
        assert_eq!(key.key_handle().to_b64(), KEY_HANDLE);
        assert_eq!(
            key.public_key_pem().unwrap(),
            "-----BEGIN PUBLIC KEY-----\n\
             MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEV5aWVKiV7Hx2IezAodbrPsqa2szK\n\
             kyco1l6HANI/1E+fcZsx4H9ZpE/Q6/NpxrWD19/ej61EMeP+eIWk2aPIOg==\n\
             -----END PUBLIC KEY-----\n"
        );
        assert_eq!(
            key.attestation_certificate_pem(),
            "-----BEGIN CERTIFICATE-----\n\
             MIICLTCCARegAwIBAgIEBbYFeTALBgkqhkiG9w0BAQswLjEsMCoGA1UEAxMjWXVi\n\
             aWNvIFUyRiBSb290IENBIFNlcmlhbCA0NTcyMDA2MzEwIBcNMTQwODAxMDAwMDAw\n\
             WhgPMjA1MDA5MDQwMDAwMDBaMCgxJjAkBgNVBAMMHVl1YmljbyBVMkYgRUUgU2Vy\n\
             aWFsIDk1ODE1MDMzMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAE/bjes6HtcOtj\n\
             bAZutgBplqX5cPy124j8OzBdQeWWbwwbVLhS/vCgkH7Rfzv/wp1NMhuc+KhKLOqg\n\
             OMq9NdWY3qMmMCQwIgYJKwYBBAGCxAoCBBUxLjMuNi4xLjQuMS40MTQ4Mi4xLjEw\n\
             CwYJKoZIhvcNAQELA4IBAQB+0/tszCUgE/gvIYwqN9pgMdIOfzCB2vyusSj8f5sj\n\
             ORS/tk1hNfF84iH6dk9FPvEnOozpZZVkQrsvHkdIP3N9y8mLWFN3/vULJw4CifiE\n\
             NvGtz0myYh7l4wLfVVuat0Jy4Gn5GBSbPexPEiKLEMD4jeNq9Yp0u0Qrha4AU2S9\n\
             pnAgWPwfLYebUwER6mDobGPxf6WUTMg/CqJphIs+44imwJ5rBZU/y7j0foOifgBy\n\
             pjwyrWSGTpJtcRL6GZf3g5ZW+7Mr6PeInQ8BRVGaJ6/djkawTKQpDYVAtjS4hhYe\n\
             dYjIYpnc3WQ10WeKOm8KdIKcTdP3DDUk0d3xbXit0htk\n\
             -----END CERTIFICATE-----\n"
        );
        assert_eq!(
            serde_json::to_value(key).unwrap(),
            serde_json::json!({"version": "U2F_V2", "keyHandle": KEY_HANDLE})
        );
        assert_eq!(
            response.signature(),
            decode_b64url("MEQCIA4dcXtjZKxh8oEELHW1G7CA6Oa8yvfLhhXbUZ55AHDBAiALnm_l9BtY-u18FNyUXfP_WwCYhQZ808b01on0VLYlJg")
                .unwrap()
        );
    }

    #[test]
    fn registration_response_is_valid() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let response = RegistrationResponse::from_json(&registration_json()).unwrap();
        let request = registration_request();

        assert!(response.is_valid(&request, None).unwrap());

        let yubico = AttestationCaList::from_pem(YUBICO_U2F_ROOT_CA_SERIAL_457200631_PEM).unwrap();
        assert!(response.is_valid(&request, Some(&yubico)).unwrap());

        // An unrelated trust anchor.
        let (_, other_ca) = crate::certificate::tests::build_ca("Not Yubico");
        let other = AttestationCaList::from_pem(&other_ca.to_pem().unwrap()).unwrap();
        assert!(!response.is_valid(&request, Some(&other)).unwrap());
    }

    #[test]
    fn registration_response_wrong_request() {
        let response = RegistrationResponse::from_json(&registration_json()).unwrap();

        let mut challenge = decode_b64url(REGISTRATION_CHALLENGE).unwrap();
        challenge[0] ^= 0x01;
        let request = RegistrationRequest::with_challenge(APP_ID, challenge);
        assert!(!response.is_valid(&request, None).unwrap());

        let request = RegistrationRequest::with_challenge(
            "https://example.com",
            decode_b64url(REGISTRATION_CHALLENGE).unwrap(),
        );
        assert!(!response.is_valid(&request, None).unwrap());
    }

    #[test]
    fn registration_response_rejections() {
        assert_eq!(
            RegistrationResponse::from_json(r#"{"errorCode": 4}"#).unwrap_err(),
            WebauthnError::U2FErrorResponse
        );
        assert_eq!(
            RegistrationResponse::from_json("[]").unwrap_err(),
            WebauthnError::MalformedResponse
        );
        assert!(RegistrationResponse::from_json("not json").is_err());

        let bad_version = registration_json().replace("U2F_V2", "U2F_V3");
        assert_eq!(
            RegistrationResponse::from_json(&bad_version).unwrap_err(),
            WebauthnError::UnsupportedProtocolVersion
        );

        let no_data = format!(
            r#"{{"version":"U2F_V2","challenge":"{}","clientData":"{}"}}"#,
            REGISTRATION_CHALLENGE, REGISTRATION_CLIENT_DATA
        );
        assert_eq!(
            RegistrationResponse::from_json(&no_data).unwrap_err(),
            WebauthnError::MalformedResponse
        );

        let other_challenge = registration_json().replace(
            &format!(r#""challenge":"{}""#, REGISTRATION_CHALLENGE),
            r#""challenge":"AAAA""#,
        );
        assert_eq!(
            RegistrationResponse::from_json(&other_challenge).unwrap_err(),
            WebauthnError::MismatchedChallenge
        );

        // Signature client data used for registration.
        let wrong_type = format!(
            r#"{{"registrationData":"{}","version":"U2F_V2","challenge":"{}","clientData":"{}"}}"#,
            REGISTRATION_DATA, SIGNATURE_CHALLENGE, SIGNATURE_CLIENT_DATA
        );
        assert_eq!(
            RegistrationResponse::from_json(&wrong_type).unwrap_err(),
            WebauthnError::InvalidClientDataType
        );
    }

    #[test]
    fn registration_data_truncated() {
        let full = decode_b64url(REGISTRATION_DATA).unwrap();
        // Every prefix that cuts into the fixed fields or the certificate must be rejected.
        // The signature is the open ended remainder, so stop where it begins.
        let sig_len = 70;
        for len in 0..(full.len() - sig_len) {
            let json = format!(
                r#"{{"registrationData":"{}","version":"U2F_V2","challenge":"{}","clientData":"{}"}}"#,
                encode_b64url(&full[..len]),
                REGISTRATION_CHALLENGE,
                REGISTRATION_CLIENT_DATA
            );
            assert_eq!(
                RegistrationResponse::from_json(&json).unwrap_err(),
                WebauthnError::MalformedResponse,
                "prefix {} was accepted",
                len
            );
        }

        let mut bad_reserved = full;
        bad_reserved[0] = 0x04;
        let json = format!(
            r#"{{"registrationData":"{}","version":"U2F_V2","challenge":"{}","clientData":"{}"}}"#,
            encode_b64url(&bad_reserved),
            REGISTRATION_CHALLENGE,
            REGISTRATION_CLIENT_DATA
        );
        assert_eq!(
            RegistrationResponse::from_json(&json).unwrap_err(),
            WebauthnError::MalformedResponse
        );
    }

    #[test]
    fn client_data_requires_fields() {
        let missing_origin = encode_b64url(br#"{"typ":"navigator.id.getAssertion","challenge":"AAAA"}"#);
        assert_eq!(
            ClientData::from_b64(&missing_origin).unwrap_err(),
            WebauthnError::InvalidClientData
        );
        let not_object = encode_b64url(b"\"text\"");
        assert_eq!(
            ClientData::from_b64(&not_object).unwrap_err(),
            WebauthnError::InvalidClientData
        );
        let no_cid = encode_b64url(
            br#"{"typ":"navigator.id.getAssertion","challenge":"AAAA","origin":"https://a"}"#,
        );
        let cd = ClientData::from_b64(&no_cid).unwrap();
        assert!(cd.channel_id_public_key().is_none());
    }

    fn signature_request() -> SignatureRequest {
        let registration = RegistrationResponse::from_json(&registration_json()).unwrap();
        SignatureRequest::with_challenge(
            APP_ID,
            decode_b64url(SIGNATURE_CHALLENGE).unwrap(),
            vec![registration.registered_key().clone()],
        )
    }

    #[test]
    fn load_signature_response() {
        let response = SignatureResponse::from_json(&signature_json()).unwrap();
        assert_eq!(response.key_handle().to_b64(), KEY_HANDLE);
        assert_eq!(response.client_data().typ(), CLIENT_DATA_TYPE_U2F_SIGN);
        assert!(response.is_user_present());
        assert_eq!(response.counter(), 186);
        assert!(!response.signature().is_empty());
    }

    #[test]
    fn signature_response_counter() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let response = SignatureResponse::from_json(&signature_json()).unwrap();
        let request = signature_request();

        assert!(response.is_valid(&request, None).unwrap());
        assert!(response.is_valid(&request, Some(180)).unwrap());
        assert!(response.is_valid(&request, Some(185)).unwrap());
        assert!(!response.is_valid(&request, Some(186)).unwrap());
        assert!(!response.is_valid(&request, Some(187)).unwrap());
        assert!(!response.is_valid(&request, Some(u32::MAX)).unwrap());
    }

    #[test]
    fn signature_response_unknown_key_handle() {
        let response = SignatureResponse::from_json(&signature_json()).unwrap();
        let request = SignatureRequest::with_challenge(
            APP_ID,
            decode_b64url(SIGNATURE_CHALLENGE).unwrap(),
            vec![],
        );
        assert_eq!(
            response.is_valid(&request, Some(180)).unwrap_err(),
            WebauthnError::UnsupportedKeyHandle
        );
    }

    #[test]
    fn signature_response_wrong_challenge() {
        let response = SignatureResponse::from_json(&signature_json()).unwrap();
        let registration = RegistrationResponse::from_json(&registration_json()).unwrap();
        let request = SignatureRequest::with_challenge(
            APP_ID,
            vec![0; 32],
            vec![registration.registered_key().clone()],
        );
        assert!(!response.is_valid(&request, None).unwrap());
    }

    #[test]
    fn signature_response_rejections() {
        assert_eq!(
            SignatureResponse::from_json(r#"{"errorCode": 1, "keyHandle": "AA"}"#).unwrap_err(),
            WebauthnError::U2FErrorResponse
        );
        let truncated = format!(
            r#"{{"keyHandle":"{}","clientData":"{}","signatureData":"AQAA"}}"#,
            KEY_HANDLE, SIGNATURE_CLIENT_DATA
        );
        assert_eq!(
            SignatureResponse::from_json(&truncated).unwrap_err(),
            WebauthnError::MalformedResponse
        );
        let wrong_type = format!(
            r#"{{"keyHandle":"{}","clientData":"{}","signatureData":"{}"}}"#,
            KEY_HANDLE, REGISTRATION_CLIENT_DATA, SIGNATURE_DATA
        );
        assert_eq!(
            SignatureResponse::from_json(&wrong_type).unwrap_err(),
            WebauthnError::InvalidClientDataType
        );
    }

    #[test]
    fn requests_serialize() {
        let request = RegistrationRequest::new(APP_ID).unwrap();
        assert_eq!(request.challenge().len(), CHALLENGE_SIZE_BYTES);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["version"], "U2F_V2");
        assert_eq!(json["appId"], APP_ID);
        let challenge = json["challenge"].as_str().unwrap();
        assert_eq!(decode_b64url(challenge).unwrap(), request.challenge());

        let round_trip: RegistrationRequest = serde_json::from_value(json).unwrap();
        assert_eq!(round_trip, request);

        let request = signature_request();
        assert!(request.has_registered_key(&KeyHandle(decode_b64url(KEY_HANDLE).unwrap())));
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["appId"], APP_ID);
        assert_eq!(json["challenge"], SIGNATURE_CHALLENGE);
        assert_eq!(
            json["registeredKeys"],
            serde_json::json!([{"version": "U2F_V2", "keyHandle": KEY_HANDLE}])
        );
    }
}
