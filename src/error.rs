#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Verify: {0}")]
    Verify(#[from] crate::webauthn::VerifyError),
    #[error("Key: {0}")]
    Key(#[from] crate::keys::KeyError),
    #[error("Store: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Status an HTTP boundary would answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Verify(e) => e.kind().http_status(),
            Self::Key(_) => 400,
            Self::Store(crate::store::StoreError::NotFound) => 404,
            Self::Store(crate::store::StoreError::ConditionFailed(_))
            | Self::Store(crate::store::StoreError::AlreadyExists) => 409,
            Self::Store(_) => 502,
            Self::Io(_) | Self::Internal(_) => 500,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use crate::webauthn::VerifyError;

    #[test]
    fn test_http_status() {
        assert_eq!(Error::from(VerifyError::TooShort).http_status(), 400);
        assert_eq!(Error::from(VerifyError::SignatureInvalid).http_status(), 401);
        assert_eq!(Error::from(StoreError::Backend("timeout".into())).http_status(), 502);
        assert_eq!(Error::from(StoreError::ConditionFailed("session mismatch")).http_status(), 409);
    }
}
