pub mod assertion;
pub mod attestation;
pub mod authenticator_data;
pub mod client_data;
pub mod credential;
pub mod types;

pub use assertion::{AssertionPayload, AssertionRequest, VerifiedAssertion, verify_assertion};
pub use attestation::{AttestationObject, AttestationRequest, verify_attestation};
pub use authenticator_data::{AttestedCredentialData, AuthenticatorData, AuthenticatorFlags};
pub use client_data::CollectedClientData;
pub use credential::{Credential, CredentialBuilder};
pub use types::{AttestationFormat, AttestationType, CeremonyType, ErrorKind, VerifyError};

pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
