use serde::{Deserialize, Serialize};

use crate::keys::KeyError;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    // malformed input
    #[error("cbor: {0}")]                           MalformedCbor(String),
    #[error("client data: {0}")]                    MalformedClientData(String),
    #[error("missing field: {0}")]                  MissingField(&'static str),
    #[error("authenticator data too short")]        TooShort,
    #[error("credential id too long: {0} bytes")]   CredentialIdTooLong(usize),
    #[error("unexpected trailing bytes")]           UnexpectedTrailingBytes,
    #[error("extension data missing")]              ExtensionsDataMissing,
    #[error("certificate: {0}")]                    MalformedCertificate(String),
    #[error("key: {0}")]                            Key(#[from] KeyError),

    // client data mismatch
    #[error("ceremony type mismatch: expected {expected}, got {found}")]
    CeremonyTypeMismatch { expected: &'static str, found: String },
    #[error("challenge mismatch")]                  ChallengeMismatch,
    #[error("origin mismatch: expected {expected}, got {found}")]
    OriginMismatch { expected: String, found: String },
    #[error("invalid token binding")]               TokenBindingInvalid,

    // authenticator data
    #[error("attested credential data missing")]    AttestedDataMissing,
    #[error("RP ID hash mismatch")]                 RpIdMismatch,
    #[error("user presence required")]              UserPresenceRequired,
    #[error("user verification required")]          UserVerificationRequired,
    #[error("signature counter went from {stored} to {received}")]
    CounterRegression { stored: u32, received: u32 },

    // attestation
    #[error("attestation statement must be empty")] UnexpectedAttestationStatement,
    #[error("credential id mismatch")]              CredentialIdMismatch,
    #[error("statement alg {statement} does not match key alg {key}")]
    AlgorithmMismatch { statement: i64, key: i64 },
    #[error("attestation signature invalid")]       AttestationSignatureInvalid,
    #[error("attestation certificate: {0}")]        CertificateInvalid(String),
    #[error("AAGUID mismatch")]                     AaguidMismatch,
    #[error("signature counter must be zero")]      CounterMustBeZero,
    #[error("certificate chain: {0}")]              CertificateChainInvalid(String),
    #[error("nonce mismatch")]                      NonceMismatch,
    #[error("key id mismatch")]                     KeyIdMismatch,

    // assertion
    #[error("assertion signature invalid")]         SignatureInvalid,

    // unsupported
    #[error("not implemented: {0}")]                NotImplemented(&'static str),
    #[error("unsupported attestation format: {0}")] UnsupportedFormat(String),
}

/// Coarse classification of verification failures. None of them is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    ClientDataMismatch,
    AuthenticatorDataInvalid,
    AttestationInvalid,
    AssertionSignatureInvalid,
    UnsupportedFeature,
}

impl ErrorKind {
    /// Status a transport boundary would answer with.
    pub fn http_status(self) -> u16 {
        match self {
            Self::MalformedInput | Self::ClientDataMismatch | Self::UnsupportedFeature => 400,
            Self::AuthenticatorDataInvalid
            | Self::AttestationInvalid
            | Self::AssertionSignatureInvalid => 401,
        }
    }
}

impl VerifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedCbor(_)
            | Self::MalformedClientData(_)
            | Self::MissingField(_)
            | Self::TooShort
            | Self::CredentialIdTooLong(_)
            | Self::UnexpectedTrailingBytes
            | Self::ExtensionsDataMissing
            | Self::MalformedCertificate(_) => ErrorKind::MalformedInput,
            Self::Key(KeyError::UnsupportedAlgorithm(_))
            | Self::Key(KeyError::UnsupportedKeyType(_))
            | Self::Key(KeyError::UnsupportedCurve(_)) => ErrorKind::UnsupportedFeature,
            Self::Key(_) => ErrorKind::MalformedInput,
            Self::CeremonyTypeMismatch { .. }
            | Self::ChallengeMismatch
            | Self::OriginMismatch { .. }
            | Self::TokenBindingInvalid => ErrorKind::ClientDataMismatch,
            Self::AttestedDataMissing
            | Self::RpIdMismatch
            | Self::UserPresenceRequired
            | Self::UserVerificationRequired
            | Self::CounterRegression { .. } => ErrorKind::AuthenticatorDataInvalid,
            Self::UnexpectedAttestationStatement
            | Self::CredentialIdMismatch
            | Self::AlgorithmMismatch { .. }
            | Self::AttestationSignatureInvalid
            | Self::CertificateInvalid(_)
            | Self::AaguidMismatch
            | Self::CounterMustBeZero
            | Self::CertificateChainInvalid(_)
            | Self::NonceMismatch
            | Self::KeyIdMismatch => ErrorKind::AttestationInvalid,
            Self::SignatureInvalid => ErrorKind::AssertionSignatureInvalid,
            Self::NotImplemented(_) | Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFeature,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CeremonyType {
    Create,
    Get,
}

impl CeremonyType {
    /// The `type` member client data carries for this ceremony.
    pub fn client_data_type(self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }
}

/// Attestation statement formats this crate can verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttestationFormat {
    None,
    Packed,
    AppleAppAttest,
}

impl AttestationFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Packed => "packed",
            Self::AppleAppAttest => "apple-appattest",
        }
    }
}

impl std::str::FromStr for AttestationFormat {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "packed" => Ok(Self::Packed),
            "apple-appattest" => Ok(Self::AppleAppAttest),
            other => Err(VerifyError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Attestation type recorded on a stored credential. `FidoU2f` only appears
/// on credentials registered before this verifier existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttestationType {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "packed")]
    Packed,
    #[serde(rename = "apple-appattest")]
    AppleAppAttest,
    #[serde(rename = "fido-u2f")]
    FidoU2f,
}

impl From<AttestationFormat> for AttestationType {
    fn from(format: AttestationFormat) -> Self {
        match format {
            AttestationFormat::None => Self::None,
            AttestationFormat::Packed => Self::Packed,
            AttestationFormat::AppleAppAttest => Self::AppleAppAttest,
        }
    }
}
