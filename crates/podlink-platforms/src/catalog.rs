//! Per-platform wiring: endpoints, page sizes, and spacing.
//!
//! Each platform is one [`PlatformSpec`] behind the shared REST
//! implementation — the quirks the core never sees (token endpoints, revoke
//! availability, listing page limits, polite request spacing) live here.

use podlink_core::Platform;

/// Static description of one platform's API surface.
#[derive(Debug, Clone, Copy)]
pub struct PlatformSpec {
    pub platform: Platform,
    pub api_base: &'static str,
    pub token_path: &'static str,
    /// `None` for platforms without a revocation endpoint.
    pub revoke_path: Option<&'static str>,
    /// Listing and detail-batch page limit.
    pub page_size: usize,
    /// Polite minimum spacing between requests to this platform.
    pub min_request_spacing_ms: u64,
}

const YOUTUBE: PlatformSpec = PlatformSpec {
    platform: Platform::Youtube,
    api_base: "https://podcasts.googleapis.com",
    token_path: "/oauth2/v4/token",
    revoke_path: Some("/oauth2/v4/revoke"),
    page_size: 50,
    min_request_spacing_ms: 100,
};

const SPOTIFY: PlatformSpec = PlatformSpec {
    platform: Platform::Spotify,
    api_base: "https://api.spotify.com",
    token_path: "/api/token",
    revoke_path: Some("/api/revoke"),
    page_size: 50,
    min_request_spacing_ms: 200,
};

const INSTAGRAM: PlatformSpec = PlatformSpec {
    platform: Platform::Instagram,
    api_base: "https://graph.instagram.com",
    token_path: "/oauth/access_token",
    revoke_path: None,
    page_size: 25,
    min_request_spacing_ms: 500,
};

const TIKTOK: PlatformSpec = PlatformSpec {
    platform: Platform::Tiktok,
    api_base: "https://open.tiktokapis.com",
    token_path: "/v2/oauth/token",
    revoke_path: Some("/v2/oauth/revoke"),
    page_size: 20,
    min_request_spacing_ms: 500,
};

const TWITTER: PlatformSpec = PlatformSpec {
    platform: Platform::Twitter,
    api_base: "https://api.twitter.com",
    token_path: "/oauth/access_token",
    revoke_path: Some("/oauth/invalidate_token"),
    page_size: 100,
    min_request_spacing_ms: 1_000,
};

const FACEBOOK: PlatformSpec = PlatformSpec {
    platform: Platform::Facebook,
    api_base: "https://graph.facebook.com",
    token_path: "/oauth/access_token",
    revoke_path: None,
    page_size: 25,
    min_request_spacing_ms: 500,
};

/// The spec for one platform.
#[must_use]
pub fn spec_for(platform: Platform) -> &'static PlatformSpec {
    match platform {
        Platform::Youtube => &YOUTUBE,
        Platform::Spotify => &SPOTIFY,
        Platform::Instagram => &INSTAGRAM,
        Platform::Tiktok => &TIKTOK,
        Platform::Twitter => &TWITTER,
        Platform::Facebook => &FACEBOOK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_platform_has_a_spec() {
        for platform in Platform::ALL {
            let spec = spec_for(platform);
            assert_eq!(spec.platform, platform);
            assert!(spec.page_size > 0);
            assert!(spec.api_base.starts_with("https://"));
        }
    }

    #[test]
    fn revoke_availability_matches_platform_reality() {
        assert!(spec_for(Platform::Youtube).revoke_path.is_some());
        assert!(spec_for(Platform::Instagram).revoke_path.is_none());
        assert!(spec_for(Platform::Facebook).revoke_path.is_none());
    }
}
