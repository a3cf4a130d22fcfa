use serde::{Deserialize, Serialize};

/// Token endpoint response (from both code and refresh_token grants).
///
/// The provider rides an OIDC identity assertion along with the standard
/// OAuth fields; it is modeled as an explicit optional field rather than an
/// extension map so its absence is a checkable decode condition.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Identity assertion side channel
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Display name record for one account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountDisplayName {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub suffix: String,
}

/// OIDC userinfo claims
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub amr: Vec<String>,
    #[serde(default)]
    pub aud: Vec<String>,
    #[serde(default)]
    pub auth_time: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub rat: i64,
    pub sub: String,
}

/// Playable character scoped to a game session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Character {
    #[serde(rename = "accountId")]
    pub account_id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "userHash")]
    pub user_hash: String,
}

/// Structured error body returned by the game-session endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(rename = "traceId", default)]
    pub trace_id: String,
    #[serde(rename = "spanId", default)]
    pub span_id: String,
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub id: String,
}

/// Session negotiation request payload
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    #[serde(rename = "idToken")]
    pub id_token: String,
}

/// Session negotiation response
#[derive(Debug, Clone, Deserialize)]
pub struct SessionResponse {
    #[serde(rename = "sessionId", default)]
    pub session_id: String,
}
