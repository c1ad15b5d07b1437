//! FIDO AppID extension value.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::{Host, Url};

use crate::error::{KeywardError, Result};

/// Extension identifier of the AppID extension.
pub const APPID_EXTENSION: &str = "appid";

/// A U2F application ID that passed the facet compatibility checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppId(String);

impl AppId {
    pub fn new(app_id: impl Into<String>) -> Result<Self> {
        let app_id = app_id.into();
        check_is_valid(&app_id)?;
        Ok(Self(app_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_is_valid(app_id: &str) -> Result<()> {
    if !app_id.contains(':') {
        return Err(KeywardError::InvalidAppId(
            "App ID does not look like a valid facet or URL; web facets must start with https://"
                .into(),
        ));
    }
    if app_id.starts_with("http:") {
        return Err(KeywardError::InvalidAppId(
            "HTTP is not supported for App IDs, use HTTPS".into(),
        ));
    }
    if let Some(rest) = app_id.strip_prefix("https://") {
        let url = Url::parse(app_id).map_err(|e| {
            KeywardError::InvalidAppId(format!("App ID looks like an HTTPS URL but is invalid: {}", e))
        })?;

        // Url normalizes an empty path to "/", so inspect the raw text.
        let path = rest.find('/').map(|i| &rest[i..]).unwrap_or("");
        let path = path.split(['?', '#']).next().unwrap_or("");
        if path == "/" {
            return Err(KeywardError::InvalidAppId(
                "App ID URL path is '/'; remove the trailing slash".into(),
            ));
        }

        if matches!(url.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_))) {
            return Err(KeywardError::InvalidAppId(
                "App ID must use a host name, not an IP address".into(),
            ));
        }
    }
    Ok(())
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for AppId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AppId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::new(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_app_ids() {
        for id in [
            "https://example.com",
            "https://example.com/app-id.json",
            "https://login.example.com:8443/facets",
            "android:apk-key-hash:abc123",
            "ios:bundle-id:com.example.app",
        ] {
            AppId::new(id).unwrap_or_else(|e| panic!("{} should be valid: {}", id, e));
        }
    }

    #[test]
    fn test_invalid_app_ids() {
        for id in [
            "example.com",
            "http://example.com",
            "https://example.com/",
            "https://127.0.0.1/app",
            "https://[::1]/app",
            "https://exa mple.com/x",
        ] {
            assert!(
                matches!(AppId::new(id), Err(KeywardError::InvalidAppId(_))),
                "{} should be rejected",
                id
            );
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let app_id = AppId::new("https://example.com/facets").unwrap();
        assert_eq!(
            serde_json::to_string(&app_id).unwrap(),
            "\"https://example.com/facets\""
        );
    }
}
