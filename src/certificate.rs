//! X.509 handling for attestation certificates: the historical "unused bits" repair,
//! PEM wrapping, chain validation and the packed attestation leaf requirements.

use openssl::sha::sha256;
use openssl::stack;
use openssl::x509::{self, store, verify, X509PurposeId};
use std::cmp::Ordering;
use x509_parser::oid_registry::Oid;

use crate::constants::PACKED_ATTESTATION_SUBJECT_OU;
use crate::error::WebauthnError;
use crate::proto::Aaguid;

/// SHA-256 digests of DER certificates shipped by U2F devices with an incorrectly encoded
/// unused-bits byte in the signature BIT STRING. The byte 257 positions from the end of
/// each of these must be zeroed before the certificate can be parsed.
///
/// This table must not change order or content. It describes deployed hardware.
const UNUSED_BITS_QUIRK_HASHES: [[u8; 32]; 6] = [
    // 349bca1031f8c82c4ceca38b9cebf1a69df9fb3b94eed99eb3fb9aa3822d26e8
    [
        0x34, 0x9b, 0xca, 0x10, 0x31, 0xf8, 0xc8, 0x2c, 0x4c, 0xec, 0xa3, 0x8b, 0x9c, 0xeb, 0xf1, 0xa6,
        0x9d, 0xf9, 0xfb, 0x3b, 0x94, 0xee, 0xd9, 0x9e, 0xb3, 0xfb, 0x9a, 0xa3, 0x82, 0x2d, 0x26, 0xe8,
    ],
    // dd574527df608e47ae45fbba75a2afdd5c20fd94a02419381813cd55a2a3398f
    [
        0xdd, 0x57, 0x45, 0x27, 0xdf, 0x60, 0x8e, 0x47, 0xae, 0x45, 0xfb, 0xba, 0x75, 0xa2, 0xaf, 0xdd,
        0x5c, 0x20, 0xfd, 0x94, 0xa0, 0x24, 0x19, 0x38, 0x18, 0x13, 0xcd, 0x55, 0xa2, 0xa3, 0x39, 0x8f,
    ],
    // 1d8764f0f7cd1352df6150045c8f638e517270e8b5dda1c63ade9c2280240cae
    [
        0x1d, 0x87, 0x64, 0xf0, 0xf7, 0xcd, 0x13, 0x52, 0xdf, 0x61, 0x50, 0x04, 0x5c, 0x8f, 0x63, 0x8e,
        0x51, 0x72, 0x70, 0xe8, 0xb5, 0xdd, 0xa1, 0xc6, 0x3a, 0xde, 0x9c, 0x22, 0x80, 0x24, 0x0c, 0xae,
    ],
    // d0edc9a91a1677435a953390865d208c55b3183c6759c9b5a7ff494c322558eb
    [
        0xd0, 0xed, 0xc9, 0xa9, 0x1a, 0x16, 0x77, 0x43, 0x5a, 0x95, 0x33, 0x90, 0x86, 0x5d, 0x20, 0x8c,
        0x55, 0xb3, 0x18, 0x3c, 0x67, 0x59, 0xc9, 0xb5, 0xa7, 0xff, 0x49, 0x4c, 0x32, 0x25, 0x58, 0xeb,
    ],
    // 6073c436dcd064a48127ddbf6032ac1a66fd59a0c24434f070d4e564c124c897
    [
        0x60, 0x73, 0xc4, 0x36, 0xdc, 0xd0, 0x64, 0xa4, 0x81, 0x27, 0xdd, 0xbf, 0x60, 0x32, 0xac, 0x1a,
        0x66, 0xfd, 0x59, 0xa0, 0xc2, 0x44, 0x34, 0xf0, 0x70, 0xd4, 0xe5, 0x64, 0xc1, 0x24, 0xc8, 0x97,
    ],
    // ca993121846c464d666096d35f13bf44c1b05af205f9b4a1e00cf6cc10c5e511
    [
        0xca, 0x99, 0x31, 0x21, 0x84, 0x6c, 0x46, 0x4d, 0x66, 0x60, 0x96, 0xd3, 0x5f, 0x13, 0xbf, 0x44,
        0xc1, 0xb0, 0x5a, 0xf2, 0x05, 0xf9, 0xb4, 0xa1, 0xe0, 0x0c, 0xf6, 0xcc, 0x10, 0xc5, 0xe5, 0x11,
    ],
];

const UNUSED_BITS_QUIRK_OFFSET: usize = 257;

/// Repair the unused-bits byte of a known-bad certificate. Any other input is returned as is.
pub fn unused_bytes_fix(der: &[u8]) -> Vec<u8> {
    repair_unused_bits(der, &UNUSED_BITS_QUIRK_HASHES)
}

fn repair_unused_bits(der: &[u8], known: &[[u8; 32]]) -> Vec<u8> {
    let mut der = der.to_vec();
    let digest = sha256(&der);
    if known.contains(&digest) && der.len() >= UNUSED_BITS_QUIRK_OFFSET {
        debug!("applying unused bits repair to known certificate");
        let idx = der.len() - UNUSED_BITS_QUIRK_OFFSET;
        der[idx] = 0;
    }
    der
}

pub(crate) fn pem_wrap(label: &str, der: &[u8]) -> String {
    let encoded = base64::encode(der);
    let mut pem = format!("-----BEGIN {}-----\n", label);
    for line in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {}-----\n", label));
    pem
}

/// Apply [unused_bytes_fix] and wrap the result as a PEM certificate.
pub fn der_to_pem(der: &[u8]) -> String {
    pem_wrap("CERTIFICATE", &unused_bytes_fix(der))
}

/// Parse a DER certificate, applying [unused_bytes_fix] first.
pub fn attestation_certificate(der: &[u8]) -> Result<x509::X509, WebauthnError> {
    x509::X509::from_der(&unused_bytes_fix(der)).map_err(|e| {
        debug!(?e, "unable to parse attestation certificate");
        WebauthnError::AttestationStatementX5CInvalid
    })
}

/// The CA component of the basic constraints extension, or `None` if the
/// extension is absent.
fn basic_constraints_ca(cert: &x509::X509Ref) -> Result<Option<bool>, WebauthnError> {
    let der = cert.to_der()?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der)
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
    let bc = parsed
        .basic_constraints()
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
    Ok(bc.map(|ext| ext.value.ca))
}

fn names_equal(a: &x509::X509NameRef, b: &x509::X509NameRef) -> Result<bool, WebauthnError> {
    Ok(a.try_cmp(b)? == Ordering::Equal)
}

/// Verify `cert` for `purpose`, trusting only `issuer`.
fn check_purpose(
    cert: &x509::X509Ref,
    issuer: &x509::X509,
    purpose: X509PurposeId,
) -> Result<bool, WebauthnError> {
    let mut ca_store = store::X509StoreBuilder::new()?;
    // The issuer may itself be an intermediate, so it is accepted as a trust anchor.
    ca_store.set_flags(verify::X509VerifyFlags::PARTIAL_CHAIN)?;
    ca_store.set_purpose(purpose)?;
    ca_store.add_cert(issuer.clone())?;
    let ca_store = ca_store.build();

    let chain_stack = stack::Stack::new()?;
    let mut ca_ctx = x509::X509StoreContext::new()?;
    let res = ca_ctx.init(&ca_store, cert, &chain_stack, |ctx| {
        let valid = ctx.verify_cert()?;
        if !valid {
            debug!(error = ?ctx.error(), "certificate purpose check failed");
        }
        Ok(valid)
    })?;
    Ok(res)
}

/// Validate an ordered certificate list, leaf first. Returns the leaf certificate.
///
/// Each certificate's issuer must be the next certificate's subject and must verify
/// against it. Every certificate after the leaf must be a CA, and the final certificate
/// must be a self issued CA. A single certificate is returned without any chain checks.
pub fn check_chain<T: AsRef<[u8]>>(x5c: &[T]) -> Result<x509::X509, WebauthnError> {
    let certs = x5c
        .iter()
        .map(|der| attestation_certificate(der.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let (leaf, rest) = certs
        .split_first()
        .ok_or(WebauthnError::AttestationStatementX5CInvalid)?;

    if rest.is_empty() {
        return Ok(leaf.clone());
    }

    let mut purpose = X509PurposeId::ANY;
    for pair in certs.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);

        if !names_equal(current.issuer_name(), next.subject_name())? {
            debug!("certificate issuer does not match the next subject");
            return Err(WebauthnError::InvalidCertificateChain);
        }

        if !check_purpose(current, next, purpose)? {
            return Err(WebauthnError::InvalidCertificateChain);
        }

        if basic_constraints_ca(next)? != Some(true) {
            debug!("intermediate certificate is not a CA");
            return Err(WebauthnError::InvalidCertificateChain);
        }

        purpose = X509PurposeId::CRL_SIGN;
    }

    // The terminal certificate must be a self issued root.
    let root = certs.last().ok_or(WebauthnError::InvalidCertificateChain)?;
    if !names_equal(root.issuer_name(), root.subject_name())? {
        debug!("final certificate is not self issued");
        return Err(WebauthnError::InvalidCertificateChain);
    }
    if basic_constraints_ca(root)? != Some(true) {
        debug!("final certificate is not a CA");
        return Err(WebauthnError::InvalidCertificateChain);
    }

    Ok(leaf.clone())
}

/// Requirements on a packed attestation certificate.
/// <https://www.w3.org/TR/webauthn/#packed-attestation-cert-requirements>
pub fn assert_packed_attest_req(cert: &x509::X509Ref) -> Result<(), WebauthnError> {
    // Version MUST be set to 3 (which is indicated by an ASN.1 INTEGER with value 2).
    if cert.version() != 2 {
        debug!(version = cert.version(), "packed certificate is not v3");
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    // Subject-OU: Literal string "Authenticator Attestation"
    let has_ou = cert
        .subject_name()
        .entries_by_nid(openssl::nid::Nid::ORGANIZATIONALUNITNAME)
        .any(|entry| {
            matches!(entry.data().as_utf8(), Ok(ou) if &**ou == PACKED_ATTESTATION_SUBJECT_OU)
        });
    if !has_ou {
        debug!("packed certificate subject OU is missing or incorrect");
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    // The Basic Constraints extension MUST have the CA component set to false.
    if basic_constraints_ca(cert)? != Some(false) {
        debug!("packed certificate basic constraints are not CA:FALSE");
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    Ok(())
}

/// id-fido-gen-ce-aaguid
const FIDO_GEN_CE_AAGUID_OID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4);

/// If the certificate carries the FIDO AAGUID extension, it must equal `aaguid`.
pub fn validate_aaguid_extension(
    cert: &x509::X509Ref,
    aaguid: &Aaguid,
) -> Result<(), WebauthnError> {
    let der = cert.to_der()?;
    let (_, parsed) = x509_parser::parse_x509_certificate(&der)
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;

    let Some(extension) = parsed
        .extensions()
        .iter()
        .find(|extension| extension.oid == FIDO_GEN_CE_AAGUID_OID)
    else {
        return Ok(());
    };

    let (_, octets) = der_parser::der::parse_der_octetstring(extension.value)
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
    let cert_aaguid = octets
        .as_slice()
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;

    if cert_aaguid == aaguid.as_slice() {
        Ok(())
    } else {
        debug!("certificate aaguid does not match authenticator data");
        Err(WebauthnError::AttestationCertificateAAGUIDMismatch)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hex_literal::hex;
    use openssl::asn1::Asn1Time;
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::x509::extension::{BasicConstraints, KeyUsage};
    use openssl::x509::{X509NameBuilder, X509};

    pub(crate) fn build_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    pub(crate) fn build_ca(cn: &str) -> (PKey<Private>, X509) {
        let key = build_key();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("C", "AU").unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        (key, builder.build())
    }

    /// A packed style attestation leaf signed by `ca`.
    pub(crate) fn build_leaf(
        ca_key: &PKey<Private>,
        ca_cert: &X509,
        ou: &str,
        ca_flag: bool,
    ) -> (PKey<Private>, X509) {
        let key = build_key();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("C", "AU").unwrap();
        name.append_entry_by_text("O", "Webauthn U2F Core").unwrap();
        name.append_entry_by_text("OU", ou).unwrap();
        name.append_entry_by_text("CN", "Test Attestation Leaf").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(2).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(ca_cert.subject_name()).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        let mut bc = BasicConstraints::new();
        if ca_flag {
            bc.ca();
        }
        builder.append_extension(bc.build().unwrap()).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.sign(ca_key, MessageDigest::sha256()).unwrap();
        (key, builder.build())
    }

    #[test]
    fn unused_bytes_fix_untouched() {
        let data = vec![0x30u8; 300];
        assert_eq!(unused_bytes_fix(&data), data);
        // Short input must not underflow.
        assert_eq!(unused_bytes_fix(&[0x30]), vec![0x30]);
    }

    #[test]
    fn unused_bits_repair_zeroes_listed_certificate() {
        let data: Vec<u8> = (0..300u32).map(|i| (i % 251) as u8 + 1).collect();
        let known = [sha256(&data)];
        let fixed = repair_unused_bits(&data, &known);
        assert_eq!(fixed.len(), data.len());
        assert_eq!(fixed[300 - 257], 0);
        assert_ne!(data[300 - 257], 0);
        for (i, (a, b)) in data.iter().zip(fixed.iter()).enumerate() {
            if i != 300 - 257 {
                assert_eq!(a, b);
            }
        }

        // A listed digest on an input shorter than the offset is left alone.
        let short = vec![0x30u8; 200];
        assert_eq!(repair_unused_bits(&short, &[sha256(&short)]), short);

        // The production table does not list arbitrary data.
        assert_eq!(unused_bytes_fix(&data), data);
        assert_eq!(UNUSED_BITS_QUIRK_HASHES.len(), 6);
        assert_eq!(UNUSED_BITS_QUIRK_HASHES[0][..4], [0x34, 0x9b, 0xca, 0x10]);
    }

    #[test]
    fn pem_wrapping() {
        let der = vec![0u8; 100];
        let pem = der_to_pem(&der);
        let lines: Vec<_> = pem.lines().collect();
        assert_eq!(lines[0], "-----BEGIN CERTIFICATE-----");
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines[2].len(), 64);
        assert_eq!(lines[3].len(), 8);
        assert_eq!(lines[4], "-----END CERTIFICATE-----");
        assert!(pem.ends_with('\n'));
    }

    #[test]
    fn chain_single_certificate() {
        let (ca_key, ca) = build_ca("Single Root");
        let (_, leaf) = build_leaf(&ca_key, &ca, PACKED_ATTESTATION_SUBJECT_OU, false);
        let leaf_der = leaf.to_der().unwrap();
        let out = check_chain(&[leaf_der.clone()]).unwrap();
        assert_eq!(out.to_der().unwrap(), leaf_der);
    }

    #[test]
    fn chain_leaf_and_root() {
        let (ca_key, ca) = build_ca("Chain Root");
        let (_, leaf) = build_leaf(&ca_key, &ca, PACKED_ATTESTATION_SUBJECT_OU, false);
        let x5c = vec![leaf.to_der().unwrap(), ca.to_der().unwrap()];
        let out = check_chain(&x5c).unwrap();
        assert_eq!(out.to_der().unwrap(), x5c[0]);
    }

    #[test]
    fn chain_wrong_issuer() {
        let (ca_key, ca) = build_ca("Chain Root");
        let (_, other) = build_ca("Unrelated Root");
        let (_, leaf) = build_leaf(&ca_key, &ca, PACKED_ATTESTATION_SUBJECT_OU, false);
        let x5c = vec![leaf.to_der().unwrap(), other.to_der().unwrap()];
        assert_eq!(
            check_chain(&x5c).unwrap_err(),
            WebauthnError::InvalidCertificateChain
        );
    }

    #[test]
    fn chain_terminal_not_ca() {
        let (ca_key, ca) = build_ca("Chain Root");
        let (leaf_key, leaf) = build_leaf(&ca_key, &ca, PACKED_ATTESTATION_SUBJECT_OU, false);
        // A certificate "issued" by a non CA leaf.
        let (_, grandchild) = build_leaf(&leaf_key, &leaf, PACKED_ATTESTATION_SUBJECT_OU, false);
        let x5c = vec![grandchild.to_der().unwrap(), leaf.to_der().unwrap()];
        assert_eq!(
            check_chain(&x5c).unwrap_err(),
            WebauthnError::InvalidCertificateChain
        );
    }

    #[test]
    fn chain_empty_and_garbage() {
        let empty: Vec<Vec<u8>> = Vec::new();
        assert_eq!(
            check_chain(&empty).unwrap_err(),
            WebauthnError::AttestationStatementX5CInvalid
        );
        assert_eq!(
            check_chain(&[vec![0x30, 0x03, 0x02, 0x01, 0x01]]).unwrap_err(),
            WebauthnError::AttestationStatementX5CInvalid
        );
    }

    #[test]
    fn packed_requirements() {
        let (ca_key, ca) = build_ca("Packed Root");
        let (_, good) = build_leaf(&ca_key, &ca, PACKED_ATTESTATION_SUBJECT_OU, false);
        assert!(assert_packed_attest_req(&good).is_ok());

        let (_, bad_ou) = build_leaf(&ca_key, &ca, "Something Else", false);
        assert_eq!(
            assert_packed_attest_req(&bad_ou).unwrap_err(),
            WebauthnError::AttestationCertificateRequirementsNotMet
        );

        let (_, is_ca) = build_leaf(&ca_key, &ca, PACKED_ATTESTATION_SUBJECT_OU, true);
        assert_eq!(
            assert_packed_attest_req(&is_ca).unwrap_err(),
            WebauthnError::AttestationCertificateRequirementsNotMet
        );

        // The root has no OU at all.
        assert!(assert_packed_attest_req(&ca).is_err());
    }

    #[test]
    fn aaguid_extension_absent_is_accepted() {
        let (ca_key, ca) = build_ca("Aaguid Root");
        let (_, leaf) = build_leaf(&ca_key, &ca, PACKED_ATTESTATION_SUBJECT_OU, false);
        assert!(validate_aaguid_extension(&leaf, &[7u8; 16]).is_ok());
    }

    // Yubico 5Ci packed attestation leaf. Carries the AAGUID extension.
    const YUBICO5CI_PACKED_LEAF: &str = concat!(
        "MIICvTCCAaWgAwIBAgIEK/F8eDANBgkqhkiG9w0BAQsFADAuMSwwKgYDVQQDEyNZdWJpY28gVTJGIFJvb3QgQ0Eg",
        "U2VyaWFsIDQ1NzIwMDYzMTAgFw0xNDA4MDEwMDAwMDBaGA8yMDUwMDkwNDAwMDAwMFowbjELMAkGA1UEBhMCU0Ux",
        "EjAQBgNVBAoMCVl1YmljbyBBQjEiMCAGA1UECwwZQXV0aGVudGljYXRvciBBdHRlc3RhdGlvbjEnMCUGA1UEAwwe",
        "WXViaWNvIFUyRiBFRSBTZXJpYWwgNzM3MjQ2MzI4MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEdMLHhCPIcS6b",
        "SPJZWGb8cECuTN8H13fVha8Ek5nt+pI8vrSflxb59Vp4bDQlH8jzXj3oW1ZwUDjHC6EnGWB5i6NsMGowIgYJKwYB",
        "BAGCxAoCBBUxLjMuNi4xLjQuMS40MTQ4Mi4xLjcwEwYLKwYBBAGC5RwCAQEEBAMCAiQwIQYLKwYBBAGC5RwBAQQE",
        "EgQQxe9V/62aS5+1gK3rr+Am0DAMBgNVHRMBAf8EAjAAMA0GCSqGSIb3DQEBCwUAA4IBAQCLbpN2nXhNbunZANJx",
        "An/Cd+S4JuZsObnUiLnLLS0FPWa01TY8F7oJ8bE+aFa4kTe6NQQfi8+yiZrQ8N+JL4f7gNdQPSrH+r3iFd4SvroD",
        "e1jaJO4J9LeiFjmRdcVa+5cqNF4G1fPCofvw9W4lKnObuPakr0x/icdVq1MXhYdUtQk6Zr5mBnc4FhN9qi7DXqLH",
        "D5G7ZFUmGwfIcD2+0m1f1mwQS8yRD5+/aDCf3vutwddoi3crtivzyromwbKklR4qHunJ75LGZLZA8pJ/mXnUQ6TT",
        "sgRqPvPXgQPbSyGMf2z/DIPbQqCD/Bmc4dj9o6LozheBdDtcZCAjSPTAd/ui",
    );

    #[test]
    fn aaguid_extension_compared() {
        let der = base64::decode(YUBICO5CI_PACKED_LEAF).unwrap();
        let leaf = attestation_certificate(&der).unwrap();
        assert!(assert_packed_attest_req(&leaf).is_ok());

        let aaguid = hex!("c5ef55ffad9a4b9fb580adebafe026d0");
        assert!(validate_aaguid_extension(&leaf, &aaguid).is_ok());

        assert!(matches!(
            validate_aaguid_extension(&leaf, &[0u8; 16]),
            Err(WebauthnError::AttestationCertificateAAGUIDMismatch)
        ));
        let mut flipped = aaguid;
        flipped[15] ^= 0x01;
        assert!(matches!(
            validate_aaguid_extension(&leaf, &flipped),
            Err(WebauthnError::AttestationCertificateAAGUIDMismatch)
        ));
    }
}
