pub mod challenge;
pub mod config;
pub mod error;
pub mod keys;
pub mod store;
pub mod webauthn;

pub(crate) mod cbor;
pub(crate) mod der;

pub use error::{Error, Result};

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

use config::Command;
use webauthn::{AssertionPayload, AssertionRequest, AttestationRequest, Credential};

pub fn run(cfg: config::Config) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let level = match cfg.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    let rp = cfg.relying_party();
    tracing::info!(rp_id = %rp.id, origin = %rp.origin, "Starting fidoverify");

    match &cfg.command {
        Command::Attestation { client_data, attestation_object, challenge, session_id, signed_client_data } => {
            let client_data_json = std::fs::read(client_data)?;
            let attestation_object = read_base64(attestation_object)?;
            let signed = signed_client_data.as_deref().map(std::fs::read).transpose()?;
            let challenge = decode_challenge(challenge)?;

            let req = AttestationRequest {
                client_data_json: &client_data_json,
                attestation_object: &attestation_object,
                signed_client_data: signed.as_deref(),
                credential_id: None,
                session_id,
                challenge: &challenge,
            };
            let credential = webauthn::verify_attestation(&req, &rp, &cfg.attestation_config())?;
            println!("{}", serde_json::to_string_pretty(&credential)?);
        }
        Command::Assertion {
            client_data,
            authenticator_data,
            signature,
            assertion,
            credential,
            challenge,
            signed_client_data,
            use_saved_attested_data,
            appid_extension,
        } => {
            let client_data_json = std::fs::read(client_data)?;
            let credential: Credential = serde_json::from_slice(&std::fs::read(credential)?)?;
            let signed = signed_client_data.as_deref().map(std::fs::read).transpose()?;
            let challenge = decode_challenge(challenge)?;

            let (combined, split) = match (assertion, authenticator_data, signature) {
                (Some(path), _, _) => (read_base64(path)?, None),
                (None, Some(ad), Some(sig)) => (Vec::new(), Some((read_base64(ad)?, read_base64(sig)?))),
                _ => anyhow::bail!("either --assertion or --authenticator-data with --signature is required"),
            };
            let payload = match &split {
                Some((authenticator_data, signature)) => AssertionPayload::Split { authenticator_data, signature },
                None => AssertionPayload::Combined(&combined),
            };

            let req = AssertionRequest {
                client_data_json: &client_data_json,
                payload,
                signed_client_data: signed.as_deref(),
                credential_id: &credential.raw_id,
                stored_challenge: &challenge,
                credential: &credential,
                use_saved_attested_credential_data: *use_saved_attested_data,
                appid_extension: *appid_extension,
            };
            let verified = webauthn::verify_assertion(&req, &rp, &cfg.policy())?;
            println!("{}", serde_json::to_string_pretty(&verified)?);
        }
    }
    Ok(())
}

/// Read a file of base64 text, standard or URL-safe alphabet.
fn read_base64(path: &Path) -> anyhow::Result<Vec<u8>> {
    let text = std::fs::read_to_string(path)?;
    let text = text.trim();
    STANDARD
        .decode(text)
        .or_else(|_| URL_SAFE_NO_PAD.decode(text.trim_end_matches('=')))
        .map_err(|e| anyhow::anyhow!("{}: invalid base64: {e}", path.display()))
}

fn decode_challenge(challenge: &str) -> anyhow::Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(challenge.trim_end_matches('='))
        .map_err(|e| anyhow::anyhow!("invalid --challenge: {e}"))
}
