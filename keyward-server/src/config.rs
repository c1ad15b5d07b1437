//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::time::Duration;

use keyward_core::{
    AppId, AttestationConveyancePreference, KeywardError, RelyingPartyConfig,
    RelyingPartyIdentity, MAX_REQUEST_TTL,
};

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 8080)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in KB (default: 64)
    pub body_limit_kb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Lifetime of a started but unfinished ceremony (default: 300, capped at one day)
    pub ceremony_ttl_secs: u64,
    /// Relying party ID (default: localhost)
    pub rp_id: String,
    /// Relying party display name (default: Keyward Demo)
    pub rp_name: String,
    /// Origins accepted in client data (default: https://localhost:8443)
    pub rp_origins: Vec<String>,
    /// U2F AppID offered during authentication (default: none)
    pub app_id: Option<String>,
    /// Attestation conveyance requested at registration (default: none)
    pub attestation: AttestationConveyancePreference,
    /// DER certificate files trusted as attestation roots (default: none)
    pub trust_anchor_paths: Vec<String>,
    /// Accept attestation no trust anchor vouches for (default: true)
    pub allow_untrusted_attestation: bool,
    /// Accept client data without token binding info (default: true)
    pub allow_missing_token_binding: bool,
    /// Warn instead of failing on unrequested extensions (default: true)
    pub allow_unrequested_extensions: bool,
    /// Fail authentication on a signature counter regression (default: false)
    pub counter_regression_fatal: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_kb: 64,
            timeout_secs: 30,
            ceremony_ttl_secs: 300,
            rp_id: "localhost".to_string(),
            rp_name: "Keyward Demo".to_string(),
            rp_origins: vec!["https://localhost:8443".to_string()],
            app_id: None,
            attestation: AttestationConveyancePreference::None,
            trust_anchor_paths: Vec::new(),
            allow_untrusted_attestation: true,
            // Browsers no longer send tokenBinding and may add extension outputs
            allow_missing_token_binding: true,
            allow_unrequested_extensions: true,
            counter_regression_fatal: false,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_attestation(value: &str) -> Option<AttestationConveyancePreference> {
    match value.to_lowercase().as_str() {
        "none" => Some(AttestationConveyancePreference::None),
        "indirect" => Some(AttestationConveyancePreference::Indirect),
        "direct" => Some(AttestationConveyancePreference::Direct),
        _ => None,
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|origins| split_list(&origins));

        let rp_origins = std::env::var("WEBAUTHN_RP_ORIGINS")
            .ok()
            .map(|origins| split_list(&origins))
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.rp_origins);

        let attestation = match std::env::var("WEBAUTHN_ATTESTATION") {
            Ok(value) => parse_attestation(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Unknown WEBAUTHN_ATTESTATION, using none");
                defaults.attestation
            }),
            Err(_) => defaults.attestation,
        };

        Self {
            port: env_parse("PORT", defaults.port),
            host,
            allowed_origins,
            body_limit_kb: env_parse("BODY_LIMIT_KB", defaults.body_limit_kb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            ceremony_ttl_secs: env_parse("CEREMONY_TTL_SECS", defaults.ceremony_ttl_secs),
            rp_id: std::env::var("WEBAUTHN_RP_ID").unwrap_or(defaults.rp_id),
            rp_name: std::env::var("WEBAUTHN_RP_NAME").unwrap_or(defaults.rp_name),
            rp_origins,
            app_id: std::env::var("WEBAUTHN_APP_ID").ok().filter(|s| !s.is_empty()),
            attestation,
            trust_anchor_paths: std::env::var("WEBAUTHN_TRUST_ANCHORS")
                .map(|paths| split_list(&paths))
                .unwrap_or_default(),
            allow_untrusted_attestation: env_flag(
                "WEBAUTHN_ALLOW_UNTRUSTED_ATTESTATION",
                defaults.allow_untrusted_attestation,
            ),
            allow_missing_token_binding: env_flag(
                "WEBAUTHN_ALLOW_MISSING_TOKEN_BINDING",
                defaults.allow_missing_token_binding,
            ),
            allow_unrequested_extensions: env_flag(
                "WEBAUTHN_ALLOW_UNREQUESTED_EXTENSIONS",
                defaults.allow_unrequested_extensions,
            ),
            counter_regression_fatal: env_flag(
                "WEBAUTHN_COUNTER_REGRESSION_FATAL",
                defaults.counter_regression_fatal,
            ),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    pub fn ceremony_ttl(&self) -> Duration {
        Duration::from_secs(self.ceremony_ttl_secs).min(MAX_REQUEST_TTL)
    }

    /// Body limit in bytes, saturating for oversized values
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_kb.saturating_mul(1024)
    }

    /// Whether registrations go through the metadata-aware trust resolver
    pub fn resolves_attestation_trust(&self) -> bool {
        self.attestation != AttestationConveyancePreference::None
            || !self.trust_anchor_paths.is_empty()
    }

    /// Relying party settings derived from the WEBAUTHN_* values
    pub fn relying_party(&self) -> Result<RelyingPartyConfig, KeywardError> {
        let identity = RelyingPartyIdentity {
            id: self.rp_id.clone(),
            name: self.rp_name.clone(),
        };
        let mut config = RelyingPartyConfig::new(identity, self.rp_origins.iter().cloned());
        config.app_id = self.app_id.as_deref().map(AppId::new).transpose()?;
        config.attestation_preference = self.attestation;
        config.timeout = Some(self.ceremony_ttl());
        config.allow_untrusted_attestation = self.allow_untrusted_attestation;
        config.allow_missing_token_binding = self.allow_missing_token_binding;
        config.allow_unrequested_extensions = self.allow_unrequested_extensions;
        config.counter_regression_is_fatal = self.counter_regression_fatal;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.rp_id, "localhost");
        assert!(config.allow_untrusted_attestation);
        assert!(config.allow_missing_token_binding);
        assert!(config.allow_unrequested_extensions);
        assert!(!config.counter_regression_fatal);
        assert!(!config.resolves_attestation_trust());
    }

    #[test]
    fn test_oversized_limits_do_not_overflow() {
        let config = Config {
            body_limit_kb: usize::MAX,
            ceremony_ttl_secs: u64::MAX,
            ..Config::default()
        };
        assert_eq!(config.body_limit_bytes(), usize::MAX);
        assert_eq!(config.ceremony_ttl(), MAX_REQUEST_TTL);
        assert_eq!(config.relying_party().unwrap().timeout, Some(MAX_REQUEST_TTL));
    }

    #[test]
    fn test_parse_attestation_preference() {
        assert_eq!(
            parse_attestation("DIRECT"),
            Some(AttestationConveyancePreference::Direct)
        );
        assert_eq!(
            parse_attestation("indirect"),
            Some(AttestationConveyancePreference::Indirect)
        );
        assert_eq!(parse_attestation("enterprise"), None);
    }

    #[test]
    fn test_relying_party_config_from_defaults() {
        let rp = Config::default().relying_party().unwrap();
        assert_eq!(rp.identity.id, "localhost");
        assert!(rp.origins.contains("https://localhost:8443"));
        assert_eq!(rp.timeout, Some(Duration::from_secs(300)));
        assert!(rp.app_id.is_none());
    }

    #[test]
    fn test_invalid_app_id_rejected() {
        let config = Config {
            app_id: Some("http://insecure.example.com".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.relying_party(),
            Err(KeywardError::InvalidAppId(_))
        ));
    }

    #[test]
    fn test_split_list_trims_and_skips_empty() {
        assert_eq!(
            split_list(" https://a.example , ,https://b.example"),
            vec!["https://a.example", "https://b.example"]
        );
    }
}
