use serde::{Deserialize, Serialize};

use crate::challenge::ChallengeGenerator;
use crate::config::CEREMONY_TTL_SECS;
use crate::webauthn::CeremonyType;
use crate::webauthn::credential::{b64url, b64url_opt, unix_now};

/// One challenge-bound registration or login, consumed at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ceremony {
    /// The challenge itself; also the ceremony's key.
    #[serde(with = "b64url")]
    pub challenge_id:  Vec<u8>,
    pub session_id:    String,
    #[serde(default, with = "b64url_opt", skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<Vec<u8>>,
    pub ceremony_type: CeremonyType,
    pub created_at:    u64,
    /// Lifetime in seconds.
    pub ttl:           u64,
}

impl Ceremony {
    pub fn new(
        challenges: &dyn ChallengeGenerator,
        session_id: impl Into<String>,
        ceremony_type: CeremonyType,
        credential_id: Option<Vec<u8>>,
    ) -> Self {
        Self {
            challenge_id: challenges.generate(),
            session_id: session_id.into(),
            credential_id,
            ceremony_type,
            created_at: unix_now(),
            ttl: CEREMONY_TTL_SECS,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.created_at.saturating_add(self.ttl)
    }
}
