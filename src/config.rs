use std::path::PathBuf;
use std::time::SystemTime;

/// AAGUID Apple App Attest reports for development-signed apps.
pub const APP_ATTEST_AAGUID_DEVELOPMENT: [u8; 16] = *b"appattestdevelop";
/// AAGUID Apple App Attest reports for production apps: "appattest" NUL-padded.
pub const APP_ATTEST_AAGUID_PRODUCTION: [u8; 16] = *b"appattest\0\0\0\0\0\0\0";

/// Default lifetime of a stored ceremony, in seconds.
pub const CEREMONY_TTL_SECS: u64 = 300;
pub const CHALLENGE_LEN: usize = 32;

/// Relying-party identity: the RP ID hashed into authenticator data and the
/// web origin client data must come from.
#[derive(Debug, Clone)]
pub struct RelyingParty {
    pub id:     String,
    pub origin: String,
    /// Legacy FIDO U2F AppID, consulted only for U2F credentials whose client
    /// signalled the `appid` extension. Falls back to `origin`.
    pub app_id: Option<String>,
}

pub trait RelyingPartyConfig {
    fn rp_id(&self) -> &str;
    fn rp_origin(&self) -> &str;

    /// AppID whose hash legacy U2F credentials may present instead of the RP ID hash.
    fn legacy_app_id(&self) -> &str {
        self.rp_origin()
    }
}

impl RelyingPartyConfig for RelyingParty {
    fn rp_id(&self) -> &str {
        &self.id
    }

    fn rp_origin(&self) -> &str {
        &self.origin
    }

    fn legacy_app_id(&self) -> &str {
        self.app_id.as_deref().unwrap_or(&self.origin)
    }
}

impl RelyingParty {
    pub fn new(id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self { id: id.into(), origin: origin.into(), app_id: None }
    }
}

/// How a reported signature counter is compared with the stored one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CounterPolicy {
    /// `received >= stored`. Authenticators that always report 0 pass.
    #[default]
    AllowEqual,
    /// `received > stored`, unless both counters are 0.
    StrictlyIncreasing,
}

impl CounterPolicy {
    pub fn accepts(self, stored: u32, received: u32) -> bool {
        match self {
            Self::AllowEqual => received >= stored,
            Self::StrictlyIncreasing => received > stored || (received == 0 && stored == 0),
        }
    }
}

/// Flag and counter requirements applied to authenticator data.
///
/// The defaults do not require user presence, and they accept a counter
/// equal to the stored one.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerificationPolicy {
    pub require_user_presence:     bool,
    pub require_user_verification: bool,
    pub counter_policy:            CounterPolicy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AppAttestEnvironment {
    #[default]
    Production,
    Development,
}

impl AppAttestEnvironment {
    pub fn aaguid(self) -> &'static [u8; 16] {
        match self {
            Self::Production => &APP_ATTEST_AAGUID_PRODUCTION,
            Self::Development => &APP_ATTEST_AAGUID_DEVELOPMENT,
        }
    }
}

/// Per-deployment settings for registration verification.
#[derive(Debug, Clone, Default)]
pub struct AttestationConfig {
    pub app_attest_environment: AppAttestEnvironment,
    /// Instant certificate validity is checked at; `None` means now.
    pub verification_time:      Option<SystemTime>,
    pub policy:                 VerificationPolicy,
}

#[derive(clap::Parser, Debug, Clone)]
#[command(name = "fidoverify", about = "Verify WebAuthn and App Attest ceremonies offline")]
pub struct Config {
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[arg(long)]
    pub rp_id: String,
    #[arg(long)]
    pub rp_origin: String,
    /// Legacy U2F AppID accepted for `fido-u2f` credentials.
    #[arg(long)]
    pub app_id: Option<String>,
    /// Expect production App Attest AAGUIDs instead of development ones.
    #[arg(long)]
    pub app_attest_production: bool,
    /// Check certificate validity at this Unix time instead of now.
    #[arg(long)]
    pub at: Option<u64>,
    #[arg(long)]
    pub require_user_presence: bool,
    #[arg(long)]
    pub require_user_verification: bool,
    /// Reject a signature counter equal to the stored one.
    #[arg(long)]
    pub strict_counter: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Verify a registration and print the resulting credential as JSON.
    Attestation {
        #[arg(long)]
        client_data: PathBuf,
        /// File holding the base64 attestation object.
        #[arg(long)]
        attestation_object: PathBuf,
        /// Expected challenge, base64url.
        #[arg(long)]
        challenge: String,
        #[arg(long, default_value = "cli")]
        session_id: String,
        /// Hash this file instead of the client data (App Attest flow).
        #[arg(long)]
        signed_client_data: Option<PathBuf>,
    },
    /// Verify a login against a credential previously printed by `attestation`.
    Assertion {
        #[arg(long)]
        client_data: PathBuf,
        /// File holding the base64 authenticator data.
        #[arg(long, conflicts_with = "assertion")]
        authenticator_data: Option<PathBuf>,
        /// File holding the base64 signature.
        #[arg(long, requires = "authenticator_data")]
        signature: Option<PathBuf>,
        /// File holding a base64 CBOR `{signature, authenticatorData}` envelope.
        #[arg(long)]
        assertion: Option<PathBuf>,
        #[arg(long)]
        credential: PathBuf,
        #[arg(long)]
        challenge: String,
        #[arg(long)]
        signed_client_data: Option<PathBuf>,
        /// Substitute the stored AAGUID/credential id/key when the
        /// authenticator omits attested credential data.
        #[arg(long)]
        use_saved_attested_data: bool,
        /// The client reported the `appid` extension as used.
        #[arg(long)]
        appid_extension: bool,
    },
}

impl Config {
    pub fn relying_party(&self) -> RelyingParty {
        RelyingParty {
            id: self.rp_id.clone(),
            origin: self.rp_origin.clone(),
            app_id: self.app_id.clone(),
        }
    }

    pub fn policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            require_user_presence: self.require_user_presence,
            require_user_verification: self.require_user_verification,
            counter_policy: if self.strict_counter {
                CounterPolicy::StrictlyIncreasing
            } else {
                CounterPolicy::AllowEqual
            },
        }
    }

    pub fn attestation_config(&self) -> AttestationConfig {
        AttestationConfig {
            app_attest_environment: if self.app_attest_production {
                AppAttestEnvironment::Production
            } else {
                AppAttestEnvironment::Development
            },
            verification_time: self
                .at
                .map(|secs| SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs)),
            policy: self.policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_counter_policy_allow_equal() {
        let p = CounterPolicy::AllowEqual;
        assert!(p.accepts(5, 5));
        assert!(p.accepts(5, 6));
        assert!(!p.accepts(5, 4));
        assert!(p.accepts(0, 0));
    }

    #[test]
    fn test_counter_policy_strict() {
        let p = CounterPolicy::StrictlyIncreasing;
        assert!(!p.accepts(5, 5));
        assert!(p.accepts(5, 6));
        assert!(!p.accepts(5, 4));
        assert!(p.accepts(0, 0));
    }

    #[test]
    fn test_default_policy_is_lenient() {
        let p = VerificationPolicy::default();
        assert!(!p.require_user_presence);
        assert!(!p.require_user_verification);
        assert_eq!(p.counter_policy, CounterPolicy::AllowEqual);
    }

    #[test]
    fn test_app_attest_aaguids() {
        assert_eq!(&AppAttestEnvironment::Development.aaguid()[..], b"appattestdevelop");
        assert_eq!(&AppAttestEnvironment::Production.aaguid()[..9], b"appattest");
        assert!(AppAttestEnvironment::Production.aaguid()[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_legacy_app_id_falls_back_to_origin() {
        let mut rp = RelyingParty::new("example.com", "https://example.com");
        assert_eq!(rp.legacy_app_id(), "https://example.com");
        rp.app_id = Some("https://example.com/u2f/app-id.json".into());
        assert_eq!(rp.legacy_app_id(), "https://example.com/u2f/app-id.json");
    }

    #[test]
    fn test_cli_parse() {
        let cfg = Config::parse_from([
            "fidoverify",
            "--rp-id", "example.com",
            "--rp-origin", "https://example.com",
            "--at", "1757376000",
            "--strict-counter",
            "attestation",
            "--client-data", "cd.json",
            "--attestation-object", "att.b64",
            "--challenge", "dGVzdA",
        ]);
        assert_eq!(cfg.relying_party().rp_id(), "example.com");
        assert_eq!(cfg.policy().counter_policy, CounterPolicy::StrictlyIncreasing);
        let att = cfg.attestation_config();
        assert_eq!(att.app_attest_environment, AppAttestEnvironment::Development);
        assert!(att.verification_time.is_some());
        assert!(matches!(cfg.command, Command::Attestation { .. }));
    }
}
