//! Public keys and signature verification for the algorithms WebAuthn
//! authenticators use: ECDSA over P-256/P-384/P-521, RSASSA-PKCS1-v1_5 with
//! SHA-256, and Ed25519.
//!
//! Keys arrive as COSE_Key maps, raw X9.62 points (FIDO U2F and Apple App
//! Attest) or X.509 SubjectPublicKeyInfo.

pub mod cose;
pub mod spki;

use p256::ecdsa::signature::Verifier as _;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(i64),
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(i64),
    #[error("unsupported curve: {0}")]
    UnsupportedCurve(i64),
    #[error("algorithm {alg:?} cannot be used with {curve}")]
    CurveMismatch { alg: CoseAlgorithm, curve: &'static str },
    #[error("missing COSE key parameter {0}")]
    MissingParameter(i64),
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("cbor: {0}")]
    Cbor(String),
}

/// COSE algorithm identifiers with an implemented verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseAlgorithm {
    Es256,
    Es384,
    Es512,
    EdDsa,
    Rs256,
}

impl CoseAlgorithm {
    pub fn id(self) -> i64 {
        match self {
            Self::Es256 => -7,
            Self::Es384 => -35,
            Self::Es512 => -36,
            Self::EdDsa => -8,
            Self::Rs256 => -257,
        }
    }
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = KeyError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            -7   => Ok(Self::Es256),
            -35  => Ok(Self::Es384),
            -36  => Ok(Self::Es512),
            -8   => Ok(Self::EdDsa),
            -257 => Ok(Self::Rs256),
            other => Err(KeyError::UnsupportedAlgorithm(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    pub fn cose_id(self) -> i64 {
        match self {
            Self::P256 => 1,
            Self::P384 => 2,
            Self::P521 => 3,
        }
    }

    pub fn coordinate_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// The ECDSA algorithm bound to this curve in WebAuthn.
    fn algorithm(self) -> CoseAlgorithm {
        match self {
            Self::P256 => CoseAlgorithm::Es256,
            Self::P384 => CoseAlgorithm::Es384,
            Self::P521 => CoseAlgorithm::Es512,
        }
    }

    pub(crate) fn for_algorithm(alg: CoseAlgorithm) -> Option<Self> {
        match alg {
            CoseAlgorithm::Es256 => Some(Self::P256),
            CoseAlgorithm::Es384 => Some(Self::P384),
            CoseAlgorithm::Es512 => Some(Self::P521),
            CoseAlgorithm::EdDsa | CoseAlgorithm::Rs256 => None,
        }
    }
}

impl TryFrom<i64> for EcCurve {
    type Error = KeyError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            1 => Ok(Self::P256),
            2 => Ok(Self::P384),
            3 => Ok(Self::P521),
            other => Err(KeyError::UnsupportedCurve(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2Key {
    pub alg:   CoseAlgorithm,
    pub curve: EcCurve,
    pub x:     Vec<u8>,
    pub y:     Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKey {
    pub alg: CoseAlgorithm,
    pub n:   Vec<u8>,
    pub e:   Vec<u8>,
}

/// Octet key pair; Ed25519 is the only curve WebAuthn registers for EdDSA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkpKey {
    pub alg: CoseAlgorithm,
    pub x:   Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ec2(Ec2Key),
    Rsa(RsaKey),
    Okp(OkpKey),
}

impl PublicKey {
    pub fn algorithm(&self) -> CoseAlgorithm {
        match self {
            Self::Ec2(k) => k.alg,
            Self::Rsa(k) => k.alg,
            Self::Okp(k) => k.alg,
        }
    }

    /// Build an EC2 key and check the coordinates fit the curve the algorithm demands.
    pub fn ec2(alg: CoseAlgorithm, curve: EcCurve, x: &[u8], y: &[u8]) -> Result<Self, KeyError> {
        if curve.algorithm() != alg {
            return Err(KeyError::CurveMismatch { alg, curve: curve.name() });
        }
        let len = curve.coordinate_len();
        if x.len() != len || y.len() != len {
            return Err(KeyError::InvalidKey(format!(
                "{} coordinates must be {len} bytes",
                curve.name()
            )));
        }
        Ok(Self::Ec2(Ec2Key { alg, curve, x: x.to_vec(), y: y.to_vec() }))
    }

    /// Verify `signature` over `message` with the key's declared algorithm.
    ///
    /// ECDSA signatures are ASN.1 DER, EdDSA signatures are 64 raw bytes and
    /// RSA signatures are the raw modulus-sized integer. A signature that does
    /// not decode is reported as `Ok(false)`; an unusable key is an error.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        match self {
            Self::Ec2(key) => key.verify(message, signature),
            Self::Rsa(key) => key.verify(message, signature),
            Self::Okp(key) => key.verify(message, signature),
        }
    }
}

impl Ec2Key {
    /// Uncompressed SEC1 encoding: `0x04 || x || y`.
    pub fn sec1_uncompressed(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + self.x.len() + self.y.len());
        point.push(0x04);
        point.extend_from_slice(&self.x);
        point.extend_from_slice(&self.y);
        point
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let point = self.sec1_uncompressed();
        let curve = self.curve.name();
        let invalid = |e: p256::ecdsa::Error| KeyError::InvalidKey(format!("{curve}: {e}"));
        match self.curve {
            EcCurve::P256 => {
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point).map_err(invalid)?;
                let Ok(sig) = p256::ecdsa::Signature::from_der(signature) else {
                    return Ok(false);
                };
                Ok(key.verify(message, &sig).is_ok())
            }
            EcCurve::P384 => {
                let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point).map_err(invalid)?;
                let Ok(sig) = p384::ecdsa::Signature::from_der(signature) else {
                    return Ok(false);
                };
                Ok(key.verify(message, &sig).is_ok())
            }
            EcCurve::P521 => {
                let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                    .map_err(|e| KeyError::InvalidKey(format!("{curve}: {e}")))?;
                let Ok(sig) = p521::ecdsa::Signature::from_der(signature) else {
                    return Ok(false);
                };
                Ok(key.verify(message, &sig).is_ok())
            }
        }
    }
}

impl RsaKey {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let key = rsa::RsaPublicKey::new(
            rsa::BigUint::from_bytes_be(&self.n),
            rsa::BigUint::from_bytes_be(&self.e),
        )
        .map_err(|e| KeyError::InvalidKey(format!("RSA: {e}")))?;
        let key = rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(key);
        let Ok(sig) = rsa::pkcs1v15::Signature::try_from(signature) else {
            return Ok(false);
        };
        Ok(key.verify(message, &sig).is_ok())
    }
}

impl OkpKey {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        let bytes: [u8; 32] = self
            .x
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidKey("Ed25519 key must be 32 bytes".into()))?;
        let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|e| KeyError::InvalidKey(format!("Ed25519: {e}")))?;
        let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
            return Ok(false);
        };
        Ok(key.verify(message, &sig).is_ok())
    }
}
