use x509_parser::prelude::*;

use super::{ProviderOutput, StatementContext};
use crate::cbor::{cbor_array, cbor_bytes, cbor_get_str, cbor_int};
use crate::der;
use crate::keys::{CoseAlgorithm, PublicKey};
use crate::webauthn::types::VerifyError;

/// id-fido-gen-ce-aaguid
const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";

/// `packed`: basic (x5c), ECDAA (rejected) or self attestation.
pub fn verify(ctx: &StatementContext<'_>) -> Result<ProviderOutput, VerifyError> {
    let alg = cbor_get_str(ctx.statement, "alg")
        .and_then(cbor_int)
        .ok_or(VerifyError::MissingField("alg"))?;
    let sig = cbor_get_str(ctx.statement, "sig")
        .and_then(cbor_bytes)
        .ok_or(VerifyError::MissingField("sig"))?;

    if let Some(x5c) = cbor_get_str(ctx.statement, "x5c") {
        let certs = cbor_array(x5c).ok_or(VerifyError::MalformedCertificate("x5c is not an array".into()))?;
        let leaf = certs
            .first()
            .and_then(cbor_bytes)
            .ok_or(VerifyError::MalformedCertificate("x5c has no leaf certificate".into()))?;
        verify_basic(ctx, alg, sig, leaf)?;
    } else if cbor_get_str(ctx.statement, "ecdaaKeyId").is_some() {
        return Err(VerifyError::NotImplemented("ECDAA attestation"));
    } else {
        verify_self(ctx, alg, sig)?;
    }
    Ok(ProviderOutput::default())
}

fn verify_basic(ctx: &StatementContext<'_>, alg: i64, sig: &[u8], leaf_der: &[u8]) -> Result<(), VerifyError> {
    let alg = CoseAlgorithm::try_from(alg)?;
    let (_, leaf) = X509Certificate::from_der(leaf_der)
        .map_err(|e| VerifyError::MalformedCertificate(e.to_string()))?;

    // 1. Signature under the leaf key
    let key = PublicKey::from_spki(alg, leaf.public_key())
        .map_err(|e| VerifyError::CertificateInvalid(e.to_string()))?;
    if !key.verify(&ctx.signed_data(), sig)? {
        return Err(VerifyError::AttestationSignatureInvalid);
    }

    // 2. Certificate requirements
    if leaf.version() != X509Version::V3 {
        return Err(VerifyError::CertificateInvalid("not a version 3 certificate".into()));
    }
    let subject = leaf.subject();
    if !has_value(subject.iter_country()) {
        return Err(VerifyError::CertificateInvalid("subject has no country".into()));
    }
    if !has_value(subject.iter_organization()) {
        return Err(VerifyError::CertificateInvalid("subject has no organization".into()));
    }

    if let Some(ext) = leaf.extensions().iter().find(|e| e.oid.to_id_string() == OID_FIDO_GEN_CE_AAGUID) {
        let aaguid = der::unwrap_octet_string(ext.value)
            .ok_or(VerifyError::MalformedCertificate("AAGUID extension is not an OCTET STRING".into()))?;
        if aaguid != ctx.attested.aaguid.as_slice() {
            return Err(VerifyError::AaguidMismatch);
        }
    }

    let basic = leaf
        .basic_constraints()
        .map_err(|e| VerifyError::MalformedCertificate(e.to_string()))?;
    if basic.is_some_and(|bc| bc.value.ca) {
        return Err(VerifyError::CertificateInvalid("attestation certificate is a CA".into()));
    }

    tracing::debug!(alg = alg.id(), "packed basic attestation verified");
    Ok(())
}

fn verify_self(ctx: &StatementContext<'_>, alg: i64, sig: &[u8]) -> Result<(), VerifyError> {
    let key = PublicKey::from_cose(&ctx.attested.credential_public_key)?;
    let key_alg = key.algorithm().id();
    if key_alg != alg {
        return Err(VerifyError::AlgorithmMismatch { statement: alg, key: key_alg });
    }
    if !key.verify(&ctx.signed_data(), sig)? {
        return Err(VerifyError::AttestationSignatureInvalid);
    }
    tracing::debug!(alg, "packed self attestation verified");
    Ok(())
}

fn has_value<'a, 'b: 'a>(mut attrs: impl Iterator<Item = &'a AttributeTypeAndValue<'b>>) -> bool {
    attrs.any(|attr| attr.as_str().is_ok_and(|s| !s.is_empty()))
}
