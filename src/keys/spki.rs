use x509_parser::public_key::PublicKey as ParsedKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use super::{CoseAlgorithm, EcCurve, KeyError, OkpKey, PublicKey, RsaKey};

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_ED25519: &str = "1.3.101.112";

impl PublicKey {
    /// Interpret a certificate's SubjectPublicKeyInfo as a key for `alg`.
    /// The SPKI key type and size must fit the algorithm.
    pub fn from_spki(alg: CoseAlgorithm, spki: &SubjectPublicKeyInfo<'_>) -> Result<Self, KeyError> {
        let key_oid = spki.algorithm.algorithm.to_id_string();
        let data: &[u8] = &spki.subject_public_key.data;

        match alg {
            CoseAlgorithm::Es256 | CoseAlgorithm::Es384 | CoseAlgorithm::Es512 => {
                if key_oid != OID_EC_PUBLIC_KEY {
                    return Err(KeyError::InvalidKey(format!("{key_oid} is not an EC key")));
                }
                let curve = EcCurve::for_algorithm(alg).ok_or(KeyError::UnsupportedAlgorithm(alg.id()))?;
                let len = curve.coordinate_len();
                if data.len() != 1 + 2 * len || data[0] != 0x04 {
                    return Err(KeyError::InvalidKey(format!(
                        "certificate key is not an uncompressed point of {} bytes",
                        1 + 2 * len
                    )));
                }
                Self::ec2(alg, curve, &data[1..1 + len], &data[1 + len..])
            }
            CoseAlgorithm::Rs256 => {
                if key_oid != OID_RSA_ENCRYPTION {
                    return Err(KeyError::InvalidKey(format!("{key_oid} is not an RSA key")));
                }
                match spki.parsed() {
                    Ok(ParsedKey::RSA(rsa)) => Ok(Self::Rsa(RsaKey {
                        alg,
                        n: rsa.modulus.to_vec(),
                        e: rsa.exponent.to_vec(),
                    })),
                    _ => Err(KeyError::InvalidKey("malformed RSA public key".into())),
                }
            }
            CoseAlgorithm::EdDsa => {
                if key_oid != OID_ED25519 || data.len() != 32 {
                    return Err(KeyError::InvalidKey("certificate key is not Ed25519".into()));
                }
                Ok(Self::Okp(OkpKey { alg, x: data.to_vec() }))
            }
        }
    }
}
