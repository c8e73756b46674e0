//! Registration (attestation) verification.
//!
//! [`verify_attestation`] checks client data, decodes the attestation object,
//! validates authenticator data, then hands the statement to the provider
//! for its format. Only a fully verified registration yields a
//! [`Credential`].

pub mod apple;
pub mod none;
pub mod packed;

use ciborium::value::Value;
use sha2::{Digest, Sha256};

use super::authenticator_data::{AttestedCredentialData, AuthenticatorData, AuthenticatorDataExpectations};
use super::client_data::CollectedClientData;
use super::credential::{Credential, CredentialBuilder};
use super::types::{AttestationFormat, CeremonyType, VerifyError};
use crate::cbor::{self, CborMap, cbor_bytes, cbor_get_str, cbor_map, cbor_text};
use crate::config::{AttestationConfig, RelyingPartyConfig};

/// A decoded attestation object.
#[derive(Debug, Clone)]
pub struct AttestationObject {
    pub format:        AttestationFormat,
    /// Authenticator data exactly as signed.
    pub raw_auth_data: Vec<u8>,
    pub auth_data:     AuthenticatorData,
    pub statement:     CborMap,
}

impl AttestationObject {
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, VerifyError> {
        let map = cbor::decode_map(bytes).map_err(VerifyError::MalformedCbor)?;

        let format = cbor_get_str(&map, "fmt")
            .and_then(cbor_text)
            .ok_or(VerifyError::MissingField("fmt"))?
            .parse::<AttestationFormat>()?;
        let raw_auth_data = cbor_get_str(&map, "authData")
            .and_then(cbor_bytes)
            .ok_or(VerifyError::MissingField("authData"))?
            .to_vec();
        let statement = cbor_get_str(&map, "attStmt")
            .and_then(cbor_map)
            .ok_or(VerifyError::MissingField("attStmt"))?
            .to_vec();

        let auth_data = AuthenticatorData::parse(&raw_auth_data, false)?;
        if auth_data.attested_credential_data.is_none() {
            return Err(VerifyError::AttestedDataMissing);
        }

        Ok(Self { format, raw_auth_data, auth_data, statement })
    }
}

/// Everything a statement provider needs.
pub struct StatementContext<'a> {
    pub raw_auth_data:    &'a [u8],
    pub auth_data:        &'a AuthenticatorData,
    pub attested:         &'a AttestedCredentialData,
    pub client_data_hash: &'a [u8; 32],
    pub statement:        &'a [(Value, Value)],
    pub config:           &'a AttestationConfig,
}

impl StatementContext<'_> {
    /// `authData || clientDataHash`, the bytes attestation signatures cover.
    pub fn signed_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.raw_auth_data.len() + 32);
        data.extend_from_slice(self.raw_auth_data);
        data.extend_from_slice(self.client_data_hash);
        data
    }
}

/// What a provider contributes to the credential. `public_key` replaces the
/// COSE_Key from authenticator data when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderOutput {
    pub public_key: Option<Vec<u8>>,
    pub receipt:    Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct AttestationRequest<'a> {
    pub client_data_json:   &'a [u8],
    pub attestation_object: &'a [u8],
    /// Bytes hashed into the client data hash instead of `client_data_json`.
    pub signed_client_data: Option<&'a [u8]>,
    /// Credential id the client reported, if any.
    pub credential_id:      Option<&'a [u8]>,
    pub session_id:         &'a str,
    /// Challenge stored with the ceremony being answered.
    pub challenge:          &'a [u8],
}

pub fn verify_attestation(
    req: &AttestationRequest<'_>,
    rp: &impl RelyingPartyConfig,
    config: &AttestationConfig,
) -> Result<Credential, VerifyError> {
    // 1. Client data
    let client_data = CollectedClientData::from_json(req.client_data_json)?;
    client_data.verify(req.challenge, CeremonyType::Create, rp.rp_origin())?;

    // 2. Attestation object
    let mut object = AttestationObject::from_cbor(req.attestation_object)?;

    // 3. Client data hash
    let client_data_hash: [u8; 32] =
        Sha256::digest(req.signed_client_data.unwrap_or(req.client_data_json)).into();

    // 4. Authenticator data
    let policy = &config.policy;
    object.auth_data.verify(
        &AuthenticatorDataExpectations {
            rp_id:           rp.rp_id(),
            app_id:          None,
            require_up:      policy.require_user_presence,
            require_uv:      policy.require_user_verification,
            last_sign_count: 0,
            counter_policy:  policy.counter_policy,
        },
        None,
    )?;
    let attested = object
        .auth_data
        .attested_credential_data
        .as_ref()
        .ok_or(VerifyError::AttestedDataMissing)?;
    if let Some(claimed) = req.credential_id {
        if claimed != attested.credential_id.as_slice() {
            return Err(VerifyError::CredentialIdMismatch);
        }
    }

    // 5. Credential skeleton
    let builder = CredentialBuilder::new(attested, object.auth_data.sign_counter, req.session_id);

    // 6. Format-specific statement
    let ctx = StatementContext {
        raw_auth_data: &object.raw_auth_data,
        auth_data: &object.auth_data,
        attested,
        client_data_hash: &client_data_hash,
        statement: &object.statement,
        config,
    };
    tracing::debug!(format = object.format.as_str(), "verifying attestation statement");
    let output = match object.format {
        AttestationFormat::None => none::verify(&ctx)?,
        AttestationFormat::Packed => packed::verify(&ctx)?,
        AttestationFormat::AppleAppAttest => apple::verify(&ctx)?,
    };

    // 7. Credential
    let mut builder = builder.attestation_type(object.format.into()).receipt(output.receipt);
    if let Some(public_key) = output.public_key {
        builder = builder.public_key(public_key);
    }
    let credential = builder.build();

    tracing::info!(
        cred_id = credential.id_hex(),
        format = object.format.as_str(),
        counter = credential.sign_counter,
        "Attestation verified"
    );
    Ok(credential)
}
