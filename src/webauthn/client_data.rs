use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use super::types::{CeremonyType, VerifyError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBinding {
    pub status: String,
    pub id:     Option<String>,
}

/// `CollectedClientData` with the challenge already base64url-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedClientData {
    pub type_:         String,
    pub challenge:     Vec<u8>,
    pub origin:        String,
    pub token_binding: Option<TokenBinding>,
    pub cross_origin:  bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClientData {
    #[serde(rename = "type")]
    type_:         String,
    challenge:     String,
    origin:        String,
    token_binding: Option<RawTokenBinding>,
    #[serde(default)]
    cross_origin:  bool,
}

#[derive(Deserialize)]
struct RawTokenBinding {
    status: String,
    id:     Option<String>,
}

impl CollectedClientData {
    pub fn from_json(json: &[u8]) -> Result<Self, VerifyError> {
        let raw: RawClientData = serde_json::from_slice(json)
            .map_err(|e| VerifyError::MalformedClientData(e.to_string()))?;
        let challenge = decode_base64url(&raw.challenge)
            .ok_or_else(|| VerifyError::MalformedClientData("challenge is not base64url".into()))?;
        Ok(Self {
            type_: raw.type_,
            challenge,
            origin: raw.origin,
            token_binding: raw.token_binding.map(|tb| TokenBinding { status: tb.status, id: tb.id }),
            cross_origin: raw.cross_origin,
        })
    }

    /// Check type, challenge, origin and token binding against the ceremony
    /// this client data claims to answer.
    pub fn verify(
        &self,
        stored_challenge: &[u8],
        ceremony: CeremonyType,
        expected_origin: &str,
    ) -> Result<(), VerifyError> {
        let expected_type = ceremony.client_data_type();
        if self.type_ != expected_type {
            return Err(VerifyError::CeremonyTypeMismatch {
                expected: expected_type,
                found: self.type_.clone(),
            });
        }

        // ct_eq already answers 0 for slices of different length
        if !bool::from(self.challenge.as_slice().ct_eq(stored_challenge)) {
            return Err(VerifyError::ChallengeMismatch);
        }

        let origin = normalize_origin(&self.origin);
        if !origin.eq_ignore_ascii_case(&normalize_origin(expected_origin)) {
            return Err(VerifyError::OriginMismatch {
                expected: expected_origin.to_string(),
                found: self.origin.clone(),
            });
        }

        if let Some(tb) = &self.token_binding {
            match tb.status.as_str() {
                "present" => {
                    if tb.id.as_deref().is_none_or(str::is_empty) {
                        return Err(VerifyError::TokenBindingInvalid);
                    }
                }
                "supported" | "not-supported" => {}
                _ => return Err(VerifyError::TokenBindingInvalid),
            }
        }

        tracing::debug!(ceremony = expected_type, origin = %origin, "client data verified");
        Ok(())
    }
}

/// Reduce a URL to `scheme://host[:port]`. Strings without a tuple origin
/// (app origins such as `ios:bundle-id:...`) are compared as given.
fn normalize_origin(origin: &str) -> String {
    match url::Url::parse(origin) {
        Ok(url) if url.origin().is_tuple() => url.origin().ascii_serialization(),
        _ => origin.to_string(),
    }
}

/// Decode base64url, with or without `=` padding.
pub(crate) fn decode_base64url(s: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(s.trim_end_matches('=')).ok()
}
