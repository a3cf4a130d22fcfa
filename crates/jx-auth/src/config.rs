use std::time::Duration;

use url::Url;

/// Jagex account authentication endpoints
pub mod endpoints {
    pub const ISSUER: &str = "https://account.jagex.com/";
    pub const AUTHORIZE: &str = "https://account.jagex.com/oauth2/auth";
    pub const TOKEN: &str = "https://account.jagex.com/oauth2/token";
    pub const USERINFO: &str = "https://account.jagex.com/userinfo";
    pub const JWKS: &str = "https://account.jagex.com/.well-known/jwks.json";
    pub const API: &str = "https://api.jagex.com/v1";
    pub const GAME_SESSIONS: &str = "https://auth.jagex.com/game-session/v1/sessions";
    // The comment in the upstream launcher says auth.jagex.com, but the
    // traffic actually goes to auth.runescape.com.
    pub const GAME_ACCOUNTS: &str = "https://auth.runescape.com/game-session/v1/accounts";
}

/// Official desktop launcher OAuth configuration
pub mod launcher {
    pub const CLIENT_ID: &str = "com_jagex_auth_desktop_launcher";
    pub const REDIRECT_URI: &str = "https://secure.runescape.com/m=weblogin/launcher-redirect";
    pub const SCOPES: &[&str] = &["openid", "offline", "gamesso.token.create", "user.profile.read"];
}

/// Consent-upgrade (game SSO) configuration
pub mod consent {
    pub const CLIENT_ID: &str = "1fddee4e-b100-4f4e-b2b0-097f9088f9d2";
    pub const SCOPE: &str = "openid offline";
    pub const REDIRECT_URI: &str = "http://localhost";
    /// The provider only redirects back to the bare localhost origin, so the
    /// callback listener must own the privileged HTTP port.
    pub const CALLBACK_PORT: u16 = 80;
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpTimeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            request: Duration::from_secs(30),
        }
    }
}

/// Immutable provider configuration passed into every component.
///
/// All endpoints are plain values rather than package-level constants so
/// tests can point a client at a local mock server.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// OIDC issuer, used for ID token `iss` validation
    pub issuer: String,

    /// OAuth authorization endpoint (also hosts the consent upgrade)
    pub authorize_url: Url,

    /// OAuth token endpoint (code exchange and refresh grants)
    pub token_url: Url,

    /// OIDC userinfo endpoint
    pub userinfo_url: Url,

    /// Published signing key set for ID token verification
    pub jwks_url: Url,

    /// Base of the user API (display name lookups)
    pub api_url: Url,

    /// Game session creation endpoint (anonymous POST)
    pub sessions_url: Url,

    /// Character listing endpoint (session-bearer GET)
    pub accounts_url: Url,

    /// Desktop launcher OAuth client id
    pub client_id: String,

    /// Redirect the launcher flow bounces through before the user pastes
    /// the `jagex:` payload back
    pub redirect_uri: String,

    /// Scopes requested by the launcher flow
    pub scopes: Vec<String>,

    /// Downstream client id used by the consent upgrade
    pub consent_client_id: String,

    /// Redirect target for the consent upgrade (the local listener)
    pub consent_redirect_uri: String,

    /// Port the consent callback listener binds
    pub callback_port: u16,

    /// HTTP client timeouts
    pub http_timeouts: HttpTimeouts,

    /// Custom user agent (optional)
    pub user_agent: Option<String>,
}

impl ProviderConfig {
    /// Configuration for the official Jagex account provider
    pub fn jagex() -> Self {
        Self {
            issuer: endpoints::ISSUER.to_string(),
            authorize_url: Url::parse(endpoints::AUTHORIZE).expect("valid authorize URL"),
            token_url: Url::parse(endpoints::TOKEN).expect("valid token URL"),
            userinfo_url: Url::parse(endpoints::USERINFO).expect("valid userinfo URL"),
            jwks_url: Url::parse(endpoints::JWKS).expect("valid jwks URL"),
            api_url: Url::parse(endpoints::API).expect("valid api URL"),
            sessions_url: Url::parse(endpoints::GAME_SESSIONS).expect("valid sessions URL"),
            accounts_url: Url::parse(endpoints::GAME_ACCOUNTS).expect("valid accounts URL"),
            client_id: launcher::CLIENT_ID.to_string(),
            redirect_uri: launcher::REDIRECT_URI.to_string(),
            scopes: launcher::SCOPES.iter().map(|s| s.to_string()).collect(),
            consent_client_id: consent::CLIENT_ID.to_string(),
            consent_redirect_uri: consent::REDIRECT_URI.to_string(),
            callback_port: consent::CALLBACK_PORT,
            http_timeouts: HttpTimeouts::default(),
            user_agent: Some("jx-launcher".to_string()),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::jagex()
    }
}
