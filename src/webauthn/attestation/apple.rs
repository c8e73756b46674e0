use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

use super::{ProviderOutput, StatementContext};
use crate::cbor::{cbor_array, cbor_bytes, cbor_get_str};
use crate::config::AttestationConfig;
use crate::der;
use crate::keys::PublicKey;
use crate::webauthn::types::VerifyError;

/// Apple App Attestation Root CA.
const APPLE_APP_ATTEST_ROOT: &str = include_str!("apple_app_attest_root.pem");

/// Extension carrying `SHA256(authData || clientDataHash)`.
const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";

/// `apple-appattest`
pub fn verify(ctx: &StatementContext<'_>) -> Result<ProviderOutput, VerifyError> {
    // 1. Fresh key, expected environment
    if ctx.auth_data.sign_counter != 0 {
        return Err(VerifyError::CounterMustBeZero);
    }
    if &ctx.attested.aaguid != ctx.config.app_attest_environment.aaguid() {
        return Err(VerifyError::AaguidMismatch);
    }

    let x5c = cbor_get_str(ctx.statement, "x5c")
        .and_then(cbor_array)
        .ok_or(VerifyError::MissingField("x5c"))?;
    let receipt = cbor_get_str(ctx.statement, "receipt")
        .and_then(cbor_bytes)
        .ok_or(VerifyError::MissingField("receipt"))?;

    let certs = x5c
        .iter()
        .map(|v| {
            let der = cbor_bytes(v).ok_or(VerifyError::MalformedCertificate("x5c entry is not bytes".into()))?;
            X509Certificate::from_der(der)
                .map(|(_, cert)| cert)
                .map_err(|e| VerifyError::MalformedCertificate(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let leaf = certs
        .first()
        .ok_or(VerifyError::MalformedCertificate("x5c is empty".into()))?;

    // 2. Chain up to the pinned root
    let (_, root_pem) = parse_x509_pem(APPLE_APP_ATTEST_ROOT.as_bytes())
        .map_err(|e| VerifyError::CertificateChainInvalid(format!("pinned root: {e}")))?;
    let root = root_pem
        .parse_x509()
        .map_err(|e| VerifyError::CertificateChainInvalid(format!("pinned root: {e}")))?;
    verify_chain(&certs, &root, verification_time(ctx.config)?)?;

    // 3. Nonce
    let nonce: [u8; 32] = Sha256::digest(ctx.signed_data()).into();
    let ext = leaf
        .extensions()
        .iter()
        .find(|e| e.oid.to_id_string() == OID_APPLE_NONCE)
        .ok_or(VerifyError::NonceMismatch)?;
    let embedded = der::unwrap_octet_string(ext.value)
        .ok_or(VerifyError::MalformedCertificate("nonce extension is not an OCTET STRING".into()))?;
    if embedded != nonce.as_slice() {
        return Err(VerifyError::NonceMismatch);
    }

    // 4. Key id
    let point: &[u8] = &leaf.public_key().subject_public_key.data;
    PublicKey::from_apple_app_attest(point).map_err(|e| VerifyError::CertificateInvalid(e.to_string()))?;
    check_key_id(point, &ctx.attested.credential_id)?;

    tracing::debug!(chain_len = certs.len(), "app attest statement verified");
    Ok(ProviderOutput { public_key: Some(point.to_vec()), receipt: Some(receipt.to_vec()) })
}

/// App Attest names a key by `SHA256(point)`.
fn check_key_id(point: &[u8], credential_id: &[u8]) -> Result<(), VerifyError> {
    let key_id: [u8; 32] = Sha256::digest(point).into();
    if key_id.as_slice() != credential_id {
        return Err(VerifyError::KeyIdMismatch);
    }
    Ok(())
}

fn verification_time(config: &AttestationConfig) -> Result<ASN1Time, VerifyError> {
    let secs = config
        .verification_time
        .unwrap_or_else(SystemTime::now)
        .duration_since(UNIX_EPOCH)
        .map_err(|e| VerifyError::CertificateChainInvalid(e.to_string()))?
        .as_secs();
    ASN1Time::from_timestamp(secs as i64).map_err(|e| VerifyError::CertificateChainInvalid(e.to_string()))
}

/// Each certificate of `certs || root` must be valid at `at` and be issued
/// and signed by the next one. The root closes the chain by signing itself.
fn verify_chain<'a>(certs: &[X509Certificate<'a>], root: &X509Certificate<'a>, at: ASN1Time) -> Result<(), VerifyError> {
    let chain: Vec<&X509Certificate<'a>> = certs.iter().chain(std::iter::once(root)).collect();

    for (i, cert) in chain.iter().enumerate() {
        if !cert.validity().is_valid_at(at) {
            return Err(VerifyError::CertificateChainInvalid(format!(
                "certificate {i} is not valid at {at}"
            )));
        }
        let issuer = chain.get(i + 1).copied().unwrap_or(root);
        if cert.issuer().as_raw() != issuer.subject().as_raw() {
            return Err(VerifyError::CertificateChainInvalid(format!(
                "certificate {i} is not issued by {}",
                issuer.subject()
            )));
        }
        cert.verify_signature(Some(issuer.public_key()))
            .map_err(|e| VerifyError::CertificateChainInvalid(format!("certificate {i}: {e}")))?;
        if i > 0 && !is_ca(cert) {
            return Err(VerifyError::CertificateChainInvalid(format!("certificate {i} is not a CA")));
        }
    }
    Ok(())
}

fn is_ca(cert: &X509Certificate<'_>) -> bool {
    matches!(cert.basic_constraints(), Ok(Some(bc)) if bc.value.ca)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> ASN1Time {
        ASN1Time::from_timestamp(secs).unwrap()
    }

    #[test]
    fn test_key_id_is_point_hash() {
        let mut point = vec![0x04];
        point.extend_from_slice(&[0x3C; 64]);
        let key_id = Sha256::digest(&point);
        check_key_id(&point, &key_id).unwrap();

        let mut other = key_id.to_vec();
        other[31] ^= 0x01;
        assert!(matches!(check_key_id(&point, &other), Err(VerifyError::KeyIdMismatch)));
        assert!(matches!(check_key_id(&point, &key_id[..16]), Err(VerifyError::KeyIdMismatch)));
        assert!(matches!(check_key_id(&point, &[]), Err(VerifyError::KeyIdMismatch)));
    }

    #[test]
    fn test_pinned_root_is_self_signed_ca() {
        let (_, pem) = parse_x509_pem(APPLE_APP_ATTEST_ROOT.as_bytes()).unwrap();
        let root = pem.parse_x509().unwrap();
        assert!(is_ca(&root));
        assert!(has_cn(&root, "Apple App Attestation Root CA"));
        // 2030-01-01
        verify_chain(&[], &root, at(1_893_456_000)).unwrap();
    }

    #[test]
    fn test_root_expired() {
        let (_, pem) = parse_x509_pem(APPLE_APP_ATTEST_ROOT.as_bytes()).unwrap();
        let root = pem.parse_x509().unwrap();
        // 2050-01-01
        assert!(matches!(
            verify_chain(&[], &root, at(2_524_608_000)),
            Err(VerifyError::CertificateChainInvalid(_))
        ));
    }

    #[test]
    fn test_foreign_certificate_breaks_chain() {
        let (_, pem) = parse_x509_pem(APPLE_APP_ATTEST_ROOT.as_bytes()).unwrap();
        let root = pem.parse_x509().unwrap();
        let (_, foreign) =
            X509Certificate::from_der(include_bytes!("../../../tests/fixtures/packed_attestation.der")).unwrap();
        assert!(matches!(
            verify_chain(&[foreign], &root, at(1_893_456_000)),
            Err(VerifyError::CertificateChainInvalid(_))
        ));
    }

    fn has_cn(cert: &X509Certificate<'_>, cn: &str) -> bool {
        cert.subject().iter_common_name().any(|a| a.as_str().is_ok_and(|s| s == cn))
    }
}
