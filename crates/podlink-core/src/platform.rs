//! The six supported content platforms and their auth-scheme metadata.

use serde::{Deserialize, Serialize};

/// How a platform's tokens age and renew.
///
/// Determines which branch `verify_and_refresh` takes: expiring schemes are
/// checked against `expires_at` and refreshed when stale; the signed-request
/// scheme never expires and is valid until explicitly revoked or marked
/// invalid by a failed API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// OAuth2 with an expiring access token and a separate refresh token.
    OauthRefresh,
    /// OAuth2 long-lived token refreshed by exchanging the current token
    /// (no separate refresh token is issued).
    OauthExchange,
    /// Legacy signed-request credentials that never expire.
    SignedRequest,
}

impl AuthScheme {
    /// True when tokens under this scheme have an expiry at all.
    #[must_use]
    pub fn expires(self) -> bool {
        !matches!(self, AuthScheme::SignedRequest)
    }
}

/// One of the six external platforms a podcast can be present on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Spotify,
    Instagram,
    Tiktok,
    Twitter,
    Facebook,
}

impl Platform {
    /// All platforms, in stable display order.
    pub const ALL: [Platform; 6] = [
        Platform::Youtube,
        Platform::Spotify,
        Platform::Instagram,
        Platform::Tiktok,
        Platform::Twitter,
        Platform::Facebook,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Spotify => "spotify",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
            Platform::Facebook => "facebook",
        }
    }

    /// Parses the lowercase platform id used in storage and env var names.
    #[must_use]
    pub fn parse(s: &str) -> Option<Platform> {
        match s {
            "youtube" => Some(Platform::Youtube),
            "spotify" => Some(Platform::Spotify),
            "instagram" => Some(Platform::Instagram),
            "tiktok" => Some(Platform::Tiktok),
            "twitter" => Some(Platform::Twitter),
            "facebook" => Some(Platform::Facebook),
            _ => None,
        }
    }

    #[must_use]
    pub fn auth_scheme(self) -> AuthScheme {
        match self {
            Platform::Youtube | Platform::Spotify | Platform::Tiktok => AuthScheme::OauthRefresh,
            Platform::Instagram | Platform::Facebook => AuthScheme::OauthExchange,
            Platform::Twitter => AuthScheme::SignedRequest,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_platform() {
        for platform in Platform::ALL {
            assert_eq!(Platform::parse(platform.as_str()), Some(platform));
        }
    }

    #[test]
    fn parse_rejects_unknown_ids() {
        assert_eq!(Platform::parse("myspace"), None);
        assert_eq!(Platform::parse("YouTube"), None);
    }

    #[test]
    fn signed_request_scheme_never_expires() {
        assert!(!Platform::Twitter.auth_scheme().expires());
        assert!(Platform::Youtube.auth_scheme().expires());
        assert!(Platform::Facebook.auth_scheme().expires());
    }

    #[test]
    fn serde_uses_snake_case_ids() {
        let json = serde_json::to_string(&Platform::Tiktok).unwrap();
        assert_eq!(json, "\"tiktok\"");
        let back: Platform = serde_json::from_str("\"youtube\"").unwrap();
        assert_eq!(back, Platform::Youtube);
    }
}
