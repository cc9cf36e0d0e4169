//! Attestation trust anchors.

use openssl::{hash, stack, x509};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use uuid::Uuid;

use crate::error::WebauthnError;

/// A trusted attestation root, optionally restricted to a set of authenticator models.
#[derive(Debug, Clone)]
pub struct AttestationCa {
    /// The x509 root CA of the attestation chain that a security key will be attested to.
    pub ca: x509::X509,
    /// If not empty, the set of acceptable AAGUIDS (Device Ids) that are allowed to be
    /// attested as trusted by this CA. AAGUIDS that are not in this set, but signed by
    /// this CA will NOT be trusted.
    pub aaguids: BTreeSet<Uuid>,
}

impl TryFrom<&[u8]> for AttestationCa {
    type Error = WebauthnError;

    fn try_from(pem: &[u8]) -> Result<Self, Self::Error> {
        Ok(AttestationCa {
            ca: x509::X509::from_pem(pem)?,
            aaguids: BTreeSet::default(),
        })
    }
}

impl From<x509::X509> for AttestationCa {
    fn from(ca: x509::X509) -> Self {
        AttestationCa {
            ca,
            aaguids: BTreeSet::default(),
        }
    }
}

impl AttestationCa {
    /// Retrieve the Key Identifier for this Attestation Ca
    pub fn get_kid(&self) -> Result<Vec<u8>, WebauthnError> {
        self.ca
            .digest(hash::MessageDigest::sha256())
            .map(|bytes| bytes.to_vec())
            .map_err(WebauthnError::OpenSSLError)
    }

    /// Restrict this CA to the given authenticator models.
    pub fn insert_aaguid(&mut self, aaguid: Uuid) {
        self.aaguids.insert(aaguid);
    }

    /// Create an attestation CA from a DER certificate.
    pub fn new_from_der(data: &[u8]) -> Result<Self, WebauthnError> {
        Ok(AttestationCa::from(x509::X509::from_der(data)?))
    }

    fn permits(&self, aaguid: Option<&Uuid>) -> bool {
        match aaguid {
            Some(aaguid) if !self.aaguids.is_empty() => self.aaguids.contains(aaguid),
            _ => true,
        }
    }
}

/// A list of AttestationCas, keyed by the sha256 digest of the certificate.
#[derive(Debug, Default, Clone)]
pub struct AttestationCaList {
    /// The set of CA's that we trust in this Operation
    pub cas: BTreeMap<Vec<u8>, AttestationCa>,
}

impl TryFrom<AttestationCa> for AttestationCaList {
    type Error = WebauthnError;

    fn try_from(att_ca: AttestationCa) -> Result<Self, Self::Error> {
        let mut new = Self::default();
        new.insert(att_ca)?;
        Ok(new)
    }
}

impl AttestationCaList {
    /// Load every certificate from a buffer of one or more concatenated PEM certificates.
    pub fn from_pem(pem: &[u8]) -> Result<Self, WebauthnError> {
        let certs = x509::X509::stack_from_pem(pem)?;
        if certs.is_empty() {
            debug!("no certificates found in pem input");
            return Err(WebauthnError::AttestationStatementX5CMissing);
        }
        let mut new = Self::default();
        for ca in certs {
            new.insert(AttestationCa::from(ca))?;
        }
        Ok(new)
    }

    /// Load trust anchors from a set of PEM files.
    pub fn from_pem_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, WebauthnError> {
        let mut new = Self::default();
        for path in paths {
            let pem = std::fs::read(path.as_ref()).map_err(|e| {
                error!(path = ?path.as_ref(), ?e, "unable to read trust anchor file");
                WebauthnError::TrustAnchorLoadFailure
            })?;
            for (_, ca) in Self::from_pem(&pem)?.cas {
                new.insert(ca)?;
            }
        }
        Ok(new)
    }

    /// Determine if this attestation list contains any members.
    pub fn is_empty(&self) -> bool {
        self.cas.is_empty()
    }

    /// Insert a new att_ca into this Attestation Ca List
    pub fn insert(&mut self, att_ca: AttestationCa) -> Result<Option<AttestationCa>, WebauthnError> {
        let kid = att_ca.get_kid()?;
        Ok(self.cas.insert(kid, att_ca))
    }
}

/// Verify that `chain` (leaf first) terminates at one of the CAs in `ca_list`. Returns the
/// CA that was used. When an `aaguid` is given, a CA restricted to specific models must
/// list it.
pub fn verify_attestation_ca_chain<'a>(
    chain: &[x509::X509],
    ca_list: &'a AttestationCaList,
    aaguid: Option<&Uuid>,
) -> Result<&'a AttestationCa, WebauthnError> {
    if ca_list.is_empty() {
        debug!("attestation trust store is empty");
        return Err(WebauthnError::AttestationTrustFailure);
    }

    let (leaf, intermediates) = chain
        .split_first()
        .ok_or(WebauthnError::AttestationStatementX5CMissing)?;

    let mut chain_stack = stack::Stack::new()?;
    for crt in intermediates {
        chain_stack.push(crt.clone())?;
    }

    let mut ca_store = x509::store::X509StoreBuilder::new()?;
    for ca_crt in ca_list.cas.values() {
        ca_store.add_cert(ca_crt.ca.clone())?;
    }
    let ca_store = ca_store.build();

    let mut ca_ctx = x509::X509StoreContext::new()?;
    let root_kid = ca_ctx
        .init(&ca_store, leaf, &chain_stack, |ctx| {
            let valid = ctx.verify_cert()?;
            if !valid {
                debug!(
                    error = %ctx.error(),
                    depth = ctx.error_depth(),
                    "attestation chain is not trusted"
                );
                return Ok(None);
            }
            let root = ctx
                .chain()
                .and_then(|verified| verified.iter().last())
                .map(|ca_cert| ca_cert.digest(hash::MessageDigest::sha256()))
                .transpose()?;
            Ok(root.map(|dgst| dgst.to_vec()))
        })
        .map_err(|e| {
            error!(?e, "openssl error during attestation chain verification");
            WebauthnError::OpenSSLError(e)
        })?
        .ok_or(WebauthnError::AttestationTrustFailure)?;

    let att_ca = ca_list
        .cas
        .get(&root_kid)
        .ok_or(WebauthnError::AttestationTrustFailure)?;

    if !att_ca.permits(aaguid) {
        debug!(?aaguid, "authenticator model is not permitted by this CA");
        return Err(WebauthnError::AttestationTrustFailure);
    }

    Ok(att_ca)
}
