use serde::{Deserialize, Serialize};

use super::authenticator_data::AttestedCredentialData;
use super::types::AttestationType;

/// A registered credential as the store persists it.
///
/// `public_key` is a COSE_Key for every attestation type except
/// `apple-appattest`, where it is the raw uncompressed P-256 point from the
/// attestation certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(with = "b64url")]
    pub raw_id:           Vec<u8>,
    #[serde(with = "b64url")]
    pub public_key:       Vec<u8>,
    pub attestation_type: AttestationType,
    #[serde(with = "b64url")]
    pub aaguid:           [u8; 16],
    pub sign_counter:     u32,
    #[serde(default)]
    pub clone_warning:    bool,
    #[serde(default, with = "b64url_opt", skip_serializing_if = "Option::is_none")]
    pub receipt:          Option<Vec<u8>>,
    pub session_id:       String,
    pub created_at:       u64,
    pub updated_at:       u64,
}

impl Credential {
    pub fn id_hex(&self) -> String {
        super::hex(&self.raw_id)
    }

    /// Stored values to substitute when an authenticator omits attested
    /// credential data from an assertion.
    pub fn attested_credential_data(&self) -> AttestedCredentialData {
        AttestedCredentialData {
            aaguid:                self.aaguid,
            credential_id:         self.raw_id.clone(),
            credential_public_key: self.public_key.clone(),
        }
    }
}

/// Assembles a [`Credential`] from verified attestation output.
#[derive(Debug, Clone)]
pub struct CredentialBuilder {
    raw_id:           Vec<u8>,
    aaguid:           [u8; 16],
    public_key:       Vec<u8>,
    sign_counter:     u32,
    session_id:       String,
    attestation_type: AttestationType,
    receipt:          Option<Vec<u8>>,
    created_at:       Option<u64>,
}

impl CredentialBuilder {
    /// Start from attested credential data; the public key defaults to the
    /// COSE_Key it carries.
    pub fn new(acd: &AttestedCredentialData, sign_counter: u32, session_id: impl Into<String>) -> Self {
        Self {
            raw_id: acd.credential_id.clone(),
            aaguid: acd.aaguid,
            public_key: acd.credential_public_key.clone(),
            sign_counter,
            session_id: session_id.into(),
            attestation_type: AttestationType::None,
            receipt: None,
            created_at: None,
        }
    }

    pub fn public_key(mut self, public_key: Vec<u8>) -> Self {
        self.public_key = public_key;
        self
    }

    pub fn attestation_type(mut self, attestation_type: AttestationType) -> Self {
        self.attestation_type = attestation_type;
        self
    }

    pub fn receipt(mut self, receipt: Option<Vec<u8>>) -> Self {
        self.receipt = receipt;
        self
    }

    pub fn created_at(mut self, unix_secs: u64) -> Self {
        self.created_at = Some(unix_secs);
        self
    }

    pub fn build(self) -> Credential {
        let now = self.created_at.unwrap_or_else(unix_now);
        Credential {
            raw_id: self.raw_id,
            public_key: self.public_key,
            attestation_type: self.attestation_type,
            aaguid: self.aaguid,
            sign_counter: self.sign_counter,
            clone_warning: false,
            receipt: self.receipt,
            session_id: self.session_id,
            created_at: now,
            updated_at: now,
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub(crate) mod b64url {
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, T: AsRef<[u8]>>(value: &T, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&URL_SAFE_NO_PAD.encode(value))
    }

    pub fn deserialize<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let s = String::deserialize(d)?;
        let bytes = crate::webauthn::client_data::decode_base64url(&s)
            .ok_or_else(|| D::Error::custom("invalid base64url"))?;
        T::try_from(bytes).map_err(|_| D::Error::custom("unexpected length"))
    }
}

pub(crate) mod b64url_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => super::b64url::serialize(bytes, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super::b64url")] Vec<u8>);
        Ok(Option::<Wrapped>::deserialize(d)?.map(|Wrapped(bytes)| bytes))
    }
}
