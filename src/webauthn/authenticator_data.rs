use sha2::{Digest, Sha256};

use super::types::VerifyError;
use crate::cbor;
use crate::config::CounterPolicy;

const RP_ID_HASH_LEN: usize = 32;
const FIXED_LEN: usize = 37;
const AAGUID_END: usize = FIXED_LEN + 16;
const CRED_ID_START: usize = AAGUID_END + 2;
const MAX_CREDENTIAL_ID_LEN: usize = 1023;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthenticatorFlags(pub u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT:       u8 = 0x01;
    pub const USER_VERIFIED:      u8 = 0x04;
    pub const BACKUP_ELIGIBLE:    u8 = 0x08;
    pub const BACKED_UP:          u8 = 0x10;
    pub const ATTESTED_CRED_DATA: u8 = 0x40;
    pub const EXTENSION_DATA:     u8 = 0x80;

    fn has(self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn user_present(self) -> bool      { self.has(Self::USER_PRESENT) }
    pub fn user_verified(self) -> bool     { self.has(Self::USER_VERIFIED) }
    pub fn backup_eligible(self) -> bool   { self.has(Self::BACKUP_ELIGIBLE) }
    pub fn backed_up(self) -> bool         { self.has(Self::BACKED_UP) }
    pub fn attested_data(self) -> bool     { self.has(Self::ATTESTED_CRED_DATA) }
    pub fn extension_data(self) -> bool    { self.has(Self::EXTENSION_DATA) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    pub aaguid:                [u8; 16],
    pub credential_id:         Vec<u8>,
    /// CBOR COSE_Key exactly as the authenticator encoded it.
    pub credential_public_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatorData {
    pub rp_id_hash:               [u8; 32],
    pub flags:                    AuthenticatorFlags,
    pub sign_counter:             u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    pub extensions:               Option<Vec<u8>>,
}

/// What `AuthenticatorData::verify` checks the parsed data against.
#[derive(Debug, Clone)]
pub struct AuthenticatorDataExpectations<'a> {
    pub rp_id:             &'a str,
    /// Legacy U2F AppID whose hash is accepted in place of the RP ID hash.
    pub app_id:            Option<&'a str>,
    pub require_up:        bool,
    pub require_uv:        bool,
    pub last_sign_count:   u32,
    pub counter_policy:    CounterPolicy,
}

impl AuthenticatorData {
    /// Parse authenticator data.
    ///
    /// With `allow_missing_attested_data` set, an AT flag with no attested
    /// credential data behind it is tolerated so the caller can inject the
    /// stored values in [`AuthenticatorData::verify`].
    pub fn parse(raw: &[u8], allow_missing_attested_data: bool) -> Result<Self, VerifyError> {
        if raw.len() < FIXED_LEN {
            return Err(VerifyError::TooShort);
        }
        let mut rp_id_hash = [0u8; RP_ID_HASH_LEN];
        rp_id_hash.copy_from_slice(&raw[..RP_ID_HASH_LEN]);
        let flags = AuthenticatorFlags(raw[32]);
        let sign_counter = u32::from_be_bytes([raw[33], raw[34], raw[35], raw[36]]);

        let mut pos = FIXED_LEN;
        let mut attested_credential_data = None;

        if flags.attested_data() {
            if raw.len() > CRED_ID_START {
                let (acd, consumed) = parse_attested_credential_data(&raw[FIXED_LEN..])?;
                attested_credential_data = Some(acd);
                pos += consumed;
            } else if !allow_missing_attested_data {
                return Err(VerifyError::AttestedDataMissing);
            }
        }

        let mut extensions = None;
        if flags.extension_data() {
            if pos == raw.len() {
                return Err(VerifyError::ExtensionsDataMissing);
            }
            extensions = Some(raw[pos..].to_vec());
            pos = raw.len();
        }

        if pos != raw.len() {
            return Err(VerifyError::UnexpectedTrailingBytes);
        }

        Ok(Self { rp_id_hash, flags, sign_counter, attested_credential_data, extensions })
    }

    /// Check RP binding, flags and the signature counter. When the data
    /// carries no attested credential data, `injected` takes its place.
    pub fn verify(
        &mut self,
        expect: &AuthenticatorDataExpectations<'_>,
        injected: Option<AttestedCredentialData>,
    ) -> Result<(), VerifyError> {
        let rp_hash: [u8; 32] = Sha256::digest(expect.rp_id.as_bytes()).into();
        let app_hash: Option<[u8; 32]> = expect.app_id.map(|id| Sha256::digest(id.as_bytes()).into());
        if self.rp_id_hash != rp_hash && app_hash != Some(self.rp_id_hash) {
            return Err(VerifyError::RpIdMismatch);
        }

        if expect.require_up && !self.flags.user_present() {
            return Err(VerifyError::UserPresenceRequired);
        }
        if expect.require_uv && !self.flags.user_verified() {
            return Err(VerifyError::UserVerificationRequired);
        }

        if !expect.counter_policy.accepts(expect.last_sign_count, self.sign_counter) {
            tracing::warn!(
                stored = expect.last_sign_count,
                received = self.sign_counter,
                "signature counter regression, authenticator may be cloned"
            );
            return Err(VerifyError::CounterRegression {
                stored: expect.last_sign_count,
                received: self.sign_counter,
            });
        }

        if self.attested_credential_data.is_none() {
            match injected {
                Some(acd) => self.attested_credential_data = Some(acd),
                None if self.flags.attested_data() => return Err(VerifyError::AttestedDataMissing),
                None => {}
            }
        }

        tracing::debug!(flags = self.flags.0, counter = self.sign_counter, "authenticator data verified");
        Ok(())
    }

    /// Serialise in the signed layout. Credential ids longer than the
    /// 1023 bytes `parse` accepts are refused.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VerifyError> {
        let mut data = Vec::with_capacity(FIXED_LEN);
        data.extend_from_slice(&self.rp_id_hash);
        data.push(self.flags.0);
        data.extend_from_slice(&self.sign_counter.to_be_bytes());
        if let Some(acd) = &self.attested_credential_data {
            let id_len = acd.credential_id.len();
            if id_len > MAX_CREDENTIAL_ID_LEN {
                return Err(VerifyError::CredentialIdTooLong(id_len));
            }
            data.extend_from_slice(&acd.aaguid);
            data.extend_from_slice(&(id_len as u16).to_be_bytes());
            data.extend_from_slice(&acd.credential_id);
            data.extend_from_slice(&acd.credential_public_key);
        }
        if let Some(ext) = &self.extensions {
            data.extend_from_slice(ext);
        }
        Ok(data)
    }
}

/// Parse `aaguid || id_len || id || COSE_Key` from the start of `data`,
/// returning it with the number of bytes consumed.
fn parse_attested_credential_data(data: &[u8]) -> Result<(AttestedCredentialData, usize), VerifyError> {
    let mut aaguid = [0u8; 16];
    aaguid.copy_from_slice(&data[..16]);

    let id_len = u16::from_be_bytes([data[16], data[17]]) as usize;
    if id_len > MAX_CREDENTIAL_ID_LEN {
        return Err(VerifyError::CredentialIdTooLong(id_len));
    }
    let key_start = 18 + id_len;
    if data.len() <= key_start {
        return Err(VerifyError::TooShort);
    }
    let credential_id = data[18..key_start].to_vec();

    let (_, key_len) = cbor::decode_prefix(&data[key_start..]).map_err(VerifyError::MalformedCbor)?;
    let credential_public_key = data[key_start..key_start + key_len].to_vec();

    Ok((
        AttestedCredentialData { aaguid, credential_id, credential_public_key },
        key_start + key_len,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciborium::value::Value;

    fn bv(b: &[u8]) -> Value { Value::Bytes(b.to_vec()) }
    fn iv(i: i64)   -> Value { Value::Integer(i.into()) }

    fn cose_key() -> Vec<u8> {
        cbor::encode(&Value::Map(vec![
            (iv(1), iv(2)),
            (iv(3), iv(-7)),
            (iv(-1), iv(1)),
            (iv(-2), bv(&[0x11; 32])),
            (iv(-3), bv(&[0x22; 32])),
        ]))
        .unwrap()
    }

    fn rp_hash(rp_id: &str) -> [u8; 32] {
        Sha256::digest(rp_id.as_bytes()).into()
    }

    fn assertion_data(flags: u8, counter: u32) -> AuthenticatorData {
        AuthenticatorData {
            rp_id_hash: rp_hash("example.com"),
            flags: AuthenticatorFlags(flags),
            sign_counter: counter,
            attested_credential_data: None,
            extensions: None,
        }
    }

    fn expect(last: u32) -> AuthenticatorDataExpectations<'static> {
        AuthenticatorDataExpectations {
            rp_id: "example.com",
            app_id: None,
            require_up: false,
            require_uv: false,
            last_sign_count: last,
            counter_policy: CounterPolicy::AllowEqual,
        }
    }

    fn acd() -> AttestedCredentialData {
        AttestedCredentialData {
            aaguid: [0xA5; 16],
            credential_id: vec![0x77; 32],
            credential_public_key: cose_key(),
        }
    }

    #[test]
    fn test_length_floor() {
        assert!(matches!(AuthenticatorData::parse(&[0u8; 36], false), Err(VerifyError::TooShort)));

        let mut raw = [0u8; 37];
        raw[33..37].copy_from_slice(&[0x00, 0x00, 0x01, 0x02]);
        let ad = AuthenticatorData::parse(&raw, false).unwrap();
        assert_eq!(ad.sign_counter, 0x0102);
        assert!(ad.attested_credential_data.is_none());
        assert!(ad.extensions.is_none());
    }

    #[test]
    fn test_parse_attested_credential_data() {
        let mut ad = assertion_data(0x41, 0);
        ad.attested_credential_data = Some(acd());
        let raw = ad.to_bytes().unwrap();
        let parsed = AuthenticatorData::parse(&raw, false).unwrap();
        assert_eq!(parsed, ad);
        assert!(parsed.flags.user_present());
        assert!(parsed.flags.attested_data());
    }

    #[test]
    fn test_attested_data_with_extensions() {
        let ext = cbor::encode(&Value::Map(vec![(Value::Text("credProtect".into()), iv(2))])).unwrap();
        let mut ad = assertion_data(0xC1, 3);
        ad.attested_credential_data = Some(acd());
        ad.extensions = Some(ext.clone());
        let parsed = AuthenticatorData::parse(&ad.to_bytes().unwrap(), false).unwrap();
        assert_eq!(parsed.extensions, Some(ext));
        assert_eq!(parsed.attested_credential_data, Some(acd()));
    }

    #[test]
    fn test_to_bytes_refuses_oversized_credential_id() {
        let mut ad = assertion_data(0x41, 0);
        ad.attested_credential_data = Some(AttestedCredentialData { credential_id: vec![0x11; 1024], ..acd() });
        assert!(matches!(ad.to_bytes(), Err(VerifyError::CredentialIdTooLong(1024))));

        ad.attested_credential_data = Some(AttestedCredentialData { credential_id: vec![0x11; 70_000], ..acd() });
        assert!(matches!(ad.to_bytes(), Err(VerifyError::CredentialIdTooLong(70_000))));

        ad.attested_credential_data = Some(AttestedCredentialData { credential_id: vec![0x11; 1023], ..acd() });
        let parsed = AuthenticatorData::parse(&ad.to_bytes().unwrap(), false).unwrap();
        assert_eq!(parsed.attested_credential_data.map(|a| a.credential_id.len()), Some(1023));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut raw = assertion_data(0x01, 1).to_bytes().unwrap();
        raw.push(0x00);
        assert!(matches!(AuthenticatorData::parse(&raw, false), Err(VerifyError::UnexpectedTrailingBytes)));

        let mut ad = assertion_data(0x41, 0);
        ad.attested_credential_data = Some(acd());
        let mut raw = ad.to_bytes().unwrap();
        raw.extend_from_slice(&[0xA0]);
        assert!(matches!(AuthenticatorData::parse(&raw, false), Err(VerifyError::UnexpectedTrailingBytes)));
    }

    #[test]
    fn test_extension_flag_without_data() {
        let raw = assertion_data(0x81, 1).to_bytes().unwrap();
        assert!(matches!(AuthenticatorData::parse(&raw, false), Err(VerifyError::ExtensionsDataMissing)));
    }

    #[test]
    fn test_credential_id_too_long() {
        let mut raw = assertion_data(0x41, 0).to_bytes().unwrap();
        raw.extend_from_slice(&[0u8; 16]);
        raw.extend_from_slice(&1024u16.to_be_bytes());
        raw.extend_from_slice(&[0u8; 1100]);
        assert!(matches!(
            AuthenticatorData::parse(&raw, false),
            Err(VerifyError::CredentialIdTooLong(1024))
        ));
    }

    #[test]
    fn test_bad_cose_key() {
        let mut raw = assertion_data(0x41, 0).to_bytes().unwrap();
        raw.extend_from_slice(&[0u8; 16]);
        raw.extend_from_slice(&2u16.to_be_bytes());
        raw.extend_from_slice(&[0xAB, 0xCD]);
        raw.push(0xFF); // break stop code is not a valid item start
        assert!(matches!(AuthenticatorData::parse(&raw, false), Err(VerifyError::MalformedCbor(_))));
    }

    #[test]
    fn test_missing_attested_data() {
        let raw = assertion_data(0x41, 1).to_bytes().unwrap();
        assert!(matches!(AuthenticatorData::parse(&raw, false), Err(VerifyError::AttestedDataMissing)));

        let mut ad = AuthenticatorData::parse(&raw, true).unwrap();
        assert!(ad.attested_credential_data.is_none());
        assert!(matches!(ad.verify(&expect(0), None), Err(VerifyError::AttestedDataMissing)));
        ad.verify(&expect(0), Some(acd())).unwrap();
        assert_eq!(ad.attested_credential_data, Some(acd()));
    }

    #[test]
    fn test_rp_id_binding() {
        let mut ad = assertion_data(0x01, 1);
        ad.verify(&expect(0), None).unwrap();

        let mut other = expect(0);
        other.rp_id = "evil.example";
        assert!(matches!(ad.verify(&other, None), Err(VerifyError::RpIdMismatch)));
    }

    #[test]
    fn test_app_id_fallback() {
        let mut ad = assertion_data(0x01, 1);
        ad.rp_id_hash = rp_hash("https://legacy.example.com");
        assert!(matches!(ad.verify(&expect(0), None), Err(VerifyError::RpIdMismatch)));

        let mut with_app_id = expect(0);
        with_app_id.app_id = Some("https://legacy.example.com");
        ad.verify(&with_app_id, None).unwrap();
    }

    #[test]
    fn test_user_presence_and_verification() {
        let mut e = expect(0);
        let mut ad = assertion_data(0x00, 1);
        ad.verify(&e, None).unwrap();

        e.require_up = true;
        assert!(matches!(ad.verify(&e, None), Err(VerifyError::UserPresenceRequired)));
        let mut ad = assertion_data(0x01, 1);
        ad.verify(&e, None).unwrap();

        e.require_uv = true;
        assert!(matches!(ad.verify(&e, None), Err(VerifyError::UserVerificationRequired)));
        let mut ad = assertion_data(0x05, 1);
        ad.verify(&e, None).unwrap();
    }

    #[test]
    fn test_counter_equal_accepted_by_default() {
        let mut ad = assertion_data(0x01, 5);
        ad.verify(&expect(5), None).unwrap();
    }

    #[test]
    fn test_counter_regression() {
        let mut ad = assertion_data(0x01, 4);
        assert!(matches!(
            ad.verify(&expect(5), None),
            Err(VerifyError::CounterRegression { stored: 5, received: 4 })
        ));
    }

    #[test]
    fn test_counter_strict_policy() {
        let mut e = expect(5);
        e.counter_policy = CounterPolicy::StrictlyIncreasing;
        let mut ad = assertion_data(0x01, 5);
        assert!(matches!(ad.verify(&e, None), Err(VerifyError::CounterRegression { .. })));
        let mut ad = assertion_data(0x01, 6);
        ad.verify(&e, None).unwrap();
    }

    #[test]
    fn test_flag_accessors() {
        let f = AuthenticatorFlags(0x1D);
        assert!(f.user_present());
        assert!(f.user_verified());
        assert!(f.backup_eligible());
        assert!(f.backed_up());
        assert!(!f.attested_data());
        assert!(!f.extension_data());
    }
}
