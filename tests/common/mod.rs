#![allow(dead_code)]

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ciborium::value::Value;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};

use fidoverify::config::RelyingParty;
use fidoverify::keys::PublicKey;
use fidoverify::webauthn::{AttestedCredentialData, AuthenticatorData, AuthenticatorFlags};

pub const RP_ID: &str = "login.example.com";
pub const ORIGIN: &str = "https://login.example.com";

/// AAGUID carried in the packed fixture certificates.
pub const FIXTURE_AAGUID: [u8; 16] = [
    0xf1, 0xd0, 0x6b, 0x4e, 0x3a, 0x17, 0x4c, 0x80, 0xb1, 0xd2, 0x9e, 0x3f, 0x00, 0x00, 0x00, 0x01,
];

pub fn bv(b: &[u8]) -> Value { Value::Bytes(b.to_vec()) }
pub fn tv(s: &str)  -> Value { Value::Text(s.to_string()) }
pub fn iv(i: i64)   -> Value { Value::Integer(i.into()) }
pub fn mv(pairs: Vec<(Value, Value)>) -> Value { Value::Map(pairs) }

pub fn rp() -> RelyingParty {
    RelyingParty::new(RP_ID, ORIGIN)
}

pub fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read(&path).unwrap_or_else(|e| panic!("{path}: {e}"))
}

pub fn client_data_json(type_: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    serde_json::json!({
        "type": type_,
        "challenge": URL_SAFE_NO_PAD.encode(challenge),
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

/// Key whose public half is stored in packed fixture certificates.
pub fn fixture_leaf_key() -> SigningKey {
    SigningKey::from_slice(&[0x22; 32]).unwrap()
}

pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_slice(&[seed; 32]).unwrap()
}

pub fn point(key: &SigningKey) -> Vec<u8> {
    key.verifying_key().to_encoded_point(false).as_bytes().to_vec()
}

pub fn cose_es256(key: &SigningKey) -> Vec<u8> {
    PublicKey::from_fido_u2f(&point(key)).unwrap().to_cose().unwrap()
}

pub fn sign(key: &SigningKey, msg: &[u8]) -> Vec<u8> {
    let sig: Signature = key.sign(msg);
    sig.to_der().as_bytes().to_vec()
}

pub fn auth_data(rp_id: &str, flags: u8, counter: u32, attested: Option<AttestedCredentialData>) -> Vec<u8> {
    AuthenticatorData {
        rp_id_hash: Sha256::digest(rp_id.as_bytes()).into(),
        flags: AuthenticatorFlags(flags),
        sign_counter: counter,
        attested_credential_data: attested,
        extensions: None,
    }
    .to_bytes()
    .unwrap()
}

pub fn attested(aaguid: [u8; 16], credential_id: &[u8], key: &SigningKey) -> AttestedCredentialData {
    AttestedCredentialData {
        aaguid,
        credential_id: credential_id.to_vec(),
        credential_public_key: cose_es256(key),
    }
}

pub fn attestation_object(fmt: &str, auth_data: &[u8], statement: Vec<(Value, Value)>) -> Vec<u8> {
    let obj = mv(vec![
        (tv("fmt"), tv(fmt)),
        (tv("attStmt"), mv(statement)),
        (tv("authData"), bv(auth_data)),
    ]);
    let mut out = Vec::new();
    ciborium::into_writer(&obj, &mut out).unwrap();
    out
}

/// `authData || SHA-256(client_data_json)`, what attestation and assertion
/// signatures cover.
pub fn signed_payload(auth_data: &[u8], client_data_json: &[u8]) -> Vec<u8> {
    let mut msg = auth_data.to_vec();
    msg.extend_from_slice(&Sha256::digest(client_data_json));
    msg
}
