//! Storage collaborators. Verification never touches storage itself; the
//! caller commits a verified ceremony through [`CeremonyStore`], whose writes
//! succeed at most once per ceremony.

pub mod ceremony;
pub mod memory;

pub use ceremony::Ceremony;
pub use memory::MemoryStore;

use crate::webauthn::Credential;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,
    #[error("Condition failed: {0}")]
    ConditionFailed(&'static str),
    #[error("Credential already registered")]
    AlreadyExists,
    #[error("Counter not monotone: stored {stored}, received {received}")]
    CounterNotMonotone { stored: u32, received: u32 },
    #[error("Backend: {0}")]
    Backend(String),
}

pub trait CeremonyStore: Send + Sync {
    fn put_ceremony(&self, ceremony: Ceremony) -> Result<(), StoreError>;

    fn get_ceremony(&self, challenge_id: &[u8]) -> Result<Ceremony, StoreError>;

    fn get_existing_ceremony_and_credential(
        &self,
        challenge_id: &[u8],
        credential_id: &[u8],
    ) -> Result<(Ceremony, Credential), StoreError>;

    /// Delete `ceremony` and insert `credential` in one step, provided the
    /// ceremony still exists and its session matches.
    fn write_new_credential(&self, ceremony: &Ceremony, credential: &Credential) -> Result<(), StoreError>;

    /// Move the credential's counter to `new_sign_count` and delete the
    /// ceremony in one step. A counter below the stored one is refused.
    fn increment_credential_counter(
        &self,
        credential_id: &[u8],
        new_sign_count: u32,
        ceremony_id: &[u8],
    ) -> Result<(), StoreError>;
}

/// Issues the access token handed to a client once it has authenticated
/// with a credential.
pub trait AccessTokenProvider {
    fn token_for_credential(&self, credential_id: &[u8]) -> Result<String, StoreError>;
}
