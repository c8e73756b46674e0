use rand::RngCore;

use crate::config::CHALLENGE_LEN;

/// Source of ceremony challenges. Passed to whoever starts a ceremony so
/// tests can supply deterministic bytes.
pub trait ChallengeGenerator: Send + Sync {
    fn generate(&self) -> Vec<u8>;
}

/// Challenges from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy)]
pub struct RandomChallenge {
    pub len: usize,
}

impl Default for RandomChallenge {
    fn default() -> Self {
        Self { len: CHALLENGE_LEN }
    }
}

impl ChallengeGenerator for RandomChallenge {
    fn generate(&self) -> Vec<u8> {
        let mut challenge = vec![0u8; self.len];
        rand::thread_rng().fill_bytes(&mut challenge);
        challenge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_challenge_length_and_freshness() {
        let g = RandomChallenge::default();
        let a = g.generate();
        let b = g.generate();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert_eq!(RandomChallenge { len: 16 }.generate().len(), 16);
    }
}
