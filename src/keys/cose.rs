use ciborium::value::Value;

use super::{CoseAlgorithm, EcCurve, KeyError, OkpKey, PublicKey, RsaKey};
use crate::cbor::{self, cbor_bytes, cbor_get, cbor_int};

// COSE_Key common parameters (RFC 9052 §7.1)
const KTY: i64 = 1;
const ALG: i64 = 3;
// EC2 / OKP parameters
const CRV: i64 = -1;
const X: i64 = -2;
const Y: i64 = -3;
// RSA parameters
const N: i64 = -1;
const E: i64 = -2;

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

const CRV_ED25519: i64 = 6;

impl PublicKey {
    /// Parse a CBOR-encoded COSE_Key. The whole input must be one map.
    pub fn from_cose(bytes: &[u8]) -> Result<Self, KeyError> {
        let map = cbor::decode_map(bytes).map_err(KeyError::Cbor)?;
        Self::from_cose_map(&map)
    }

    pub fn from_cose_value(value: &Value) -> Result<Self, KeyError> {
        match value {
            Value::Map(map) => Self::from_cose_map(map),
            _ => Err(KeyError::Cbor("COSE_Key must be a map".into())),
        }
    }

    fn from_cose_map(map: &[(Value, Value)]) -> Result<Self, KeyError> {
        let int = |label| cbor_get(map, label).and_then(cbor_int).ok_or(KeyError::MissingParameter(label));
        let bytes = |label| cbor_get(map, label).and_then(cbor_bytes).ok_or(KeyError::MissingParameter(label));

        let kty = int(KTY)?;
        let alg = CoseAlgorithm::try_from(int(ALG)?)?;

        match kty {
            KTY_EC2 => {
                let curve = EcCurve::try_from(int(CRV)?)?;
                Self::ec2(alg, curve, bytes(X)?, bytes(Y)?)
            }
            KTY_RSA => {
                if alg != CoseAlgorithm::Rs256 {
                    return Err(KeyError::CurveMismatch { alg, curve: "RSA" });
                }
                Ok(Self::Rsa(RsaKey { alg, n: bytes(N)?.to_vec(), e: bytes(E)?.to_vec() }))
            }
            KTY_OKP => {
                let crv = int(CRV)?;
                if crv != CRV_ED25519 {
                    return Err(KeyError::UnsupportedCurve(crv));
                }
                if alg != CoseAlgorithm::EdDsa {
                    return Err(KeyError::CurveMismatch { alg, curve: "Ed25519" });
                }
                let x = bytes(X)?;
                if x.len() != 32 {
                    return Err(KeyError::InvalidKey("Ed25519 key must be 32 bytes".into()));
                }
                Ok(Self::Okp(OkpKey { alg, x: x.to_vec() }))
            }
            other => Err(KeyError::UnsupportedKeyType(other)),
        }
    }

    /// Parse a FIDO U2F public key: `0x04 || X[32] || Y[32]`.
    pub fn from_fido_u2f(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != 65 || bytes[0] != 0x04 {
            return Err(KeyError::InvalidKey(format!(
                "expected 65-byte uncompressed P-256 point, got {} bytes",
                bytes.len()
            )));
        }
        Self::ec2(CoseAlgorithm::Es256, EcCurve::P256, &bytes[1..33], &bytes[33..65])
    }

    /// Parse the public key Apple App Attest hands out: an uncompressed
    /// X9.62 P-256 point, the same layout as a U2F key.
    pub fn from_apple_app_attest(bytes: &[u8]) -> Result<Self, KeyError> {
        Self::from_fido_u2f(bytes)
    }

    /// Encode as a COSE_Key map (kty, alg, then the key-type parameters).
    pub fn to_cose(&self) -> Result<Vec<u8>, KeyError> {
        let int = |i: i64| Value::Integer(i.into());
        let entries = match self {
            Self::Ec2(key) => vec![
                (int(KTY), int(KTY_EC2)),
                (int(ALG), int(key.alg.id())),
                (int(CRV), int(key.curve.cose_id())),
                (int(X), Value::Bytes(key.x.clone())),
                (int(Y), Value::Bytes(key.y.clone())),
            ],
            Self::Rsa(key) => vec![
                (int(KTY), int(KTY_RSA)),
                (int(ALG), int(key.alg.id())),
                (int(N), Value::Bytes(key.n.clone())),
                (int(E), Value::Bytes(key.e.clone())),
            ],
            Self::Okp(key) => vec![
                (int(KTY), int(KTY_OKP)),
                (int(ALG), int(key.alg.id())),
                (int(CRV), int(CRV_ED25519)),
                (int(X), Value::Bytes(key.x.clone())),
            ],
        };
        cbor::encode(&Value::Map(entries)).map_err(KeyError::Cbor)
    }
}
