use sha2::{Digest, Sha256};

use super::authenticator_data::{AuthenticatorData, AuthenticatorDataExpectations};
use super::client_data::CollectedClientData;
use super::credential::Credential;
use super::types::{AttestationType, CeremonyType, VerifyError};
use crate::cbor::{self, cbor_bytes, cbor_get_str};
use crate::config::{RelyingPartyConfig, VerificationPolicy};
use crate::keys::PublicKey;

/// How the authenticator data and signature reached us.
#[derive(Debug, Clone, Copy)]
pub enum AssertionPayload<'a> {
    Split { authenticator_data: &'a [u8], signature: &'a [u8] },
    /// CBOR `{ "signature": bstr, "authenticatorData": bstr }`, as App Attest
    /// clients send it.
    Combined(&'a [u8]),
}

impl AssertionPayload<'_> {
    /// `(authenticator_data, signature)`
    pub fn split(&self) -> Result<(Vec<u8>, Vec<u8>), VerifyError> {
        match *self {
            Self::Split { authenticator_data, signature } => Ok((authenticator_data.to_vec(), signature.to_vec())),
            Self::Combined(blob) => {
                let map = cbor::decode_map(blob).map_err(VerifyError::MalformedCbor)?;
                let auth_data = cbor_get_str(&map, "authenticatorData")
                    .and_then(cbor_bytes)
                    .ok_or(VerifyError::MissingField("authenticatorData"))?;
                let signature = cbor_get_str(&map, "signature")
                    .and_then(cbor_bytes)
                    .ok_or(VerifyError::MissingField("signature"))?;
                Ok((auth_data.to_vec(), signature.to_vec()))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssertionRequest<'a> {
    pub client_data_json:   &'a [u8],
    pub payload:            AssertionPayload<'a>,
    /// Bytes hashed into the signature base instead of `client_data_json`.
    pub signed_client_data: Option<&'a [u8]>,
    pub credential_id:      &'a [u8],
    pub stored_challenge:   &'a [u8],
    pub credential:         &'a Credential,
    /// The authenticator omits attested credential data on assertion; use
    /// the stored AAGUID, credential id and key instead.
    pub use_saved_attested_credential_data: bool,
    /// The client reported the `appid` extension as used.
    pub appid_extension:    bool,
}

/// Facts from a verified assertion the caller needs to update storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct VerifiedAssertion {
    pub sign_count:    u32,
    pub user_present:  bool,
    pub user_verified: bool,
}

pub fn verify_assertion(
    req: &AssertionRequest<'_>,
    rp: &impl RelyingPartyConfig,
    policy: &VerificationPolicy,
) -> Result<VerifiedAssertion, VerifyError> {
    let credential = req.credential;
    if req.credential_id != credential.raw_id.as_slice() {
        return Err(VerifyError::CredentialIdMismatch);
    }

    // 1. Authenticator data and signature
    let (raw_auth_data, signature) = req.payload.split()?;

    // 2. Legacy AppID
    let app_id = (credential.attestation_type == AttestationType::FidoU2f && req.appid_extension)
        .then(|| rp.legacy_app_id());

    // 3. Client data
    let client_data = CollectedClientData::from_json(req.client_data_json)?;
    client_data.verify(req.stored_challenge, CeremonyType::Get, rp.rp_origin())?;

    // 4. Authenticator data
    let mut auth_data = AuthenticatorData::parse(&raw_auth_data, req.use_saved_attested_credential_data)?;
    let injected = req
        .use_saved_attested_credential_data
        .then(|| credential.attested_credential_data());
    auth_data.verify(
        &AuthenticatorDataExpectations {
            rp_id:           rp.rp_id(),
            app_id,
            require_up:      policy.require_user_presence,
            require_uv:      policy.require_user_verification,
            last_sign_count: credential.sign_counter,
            counter_policy:  policy.counter_policy,
        },
        injected,
    )?;

    // 5. Signature base
    let client_data_hash = Sha256::digest(req.signed_client_data.unwrap_or(req.client_data_json));
    let mut signature_base = raw_auth_data;
    signature_base.extend_from_slice(&client_data_hash);

    // 6. Signature
    let valid = match credential.attestation_type {
        AttestationType::AppleAppAttest => {
            let nonce = Sha256::digest(&signature_base);
            PublicKey::from_apple_app_attest(&credential.public_key)?.verify(&nonce, &signature)?
        }
        _ if app_id.is_some() => PublicKey::from_fido_u2f(&credential.public_key)?.verify(&signature_base, &signature)?,
        _ => PublicKey::from_cose(&credential.public_key)?.verify(&signature_base, &signature)?,
    };
    if !valid {
        return Err(VerifyError::SignatureInvalid);
    }

    tracing::info!(
        cred_id = credential.id_hex(),
        counter = auth_data.sign_counter,
        "Assertion verified"
    );
    Ok(VerifiedAssertion {
        sign_count:    auth_data.sign_counter,
        user_present:  auth_data.flags.user_present(),
        user_verified: auth_data.flags.user_verified(),
    })
}
