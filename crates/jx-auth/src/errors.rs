use thiserror::Error;

/// Jagex account authentication error types
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to construct request: {0}")]
    RequestConstruction(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {message}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Bearer token expired")]
    TokenExpired,

    #[error("ID token verification failed: {0}")]
    Verification(String),

    #[error("Game ID token already consumed by the provider")]
    IdTokenAlreadyUsed,

    #[error("Provider returned an empty session id")]
    EmptySessionId,

    #[error("Session token invalid, deleted - you must reauthenticate")]
    SessionInvalid,

    #[error("Account has no characters - create one first")]
    NoCharacters,

    #[error("Consent flow failed: {error}: {description}")]
    ConsentDenied { error: String, description: String },

    #[error("Consent callback carried neither an id_token nor an error")]
    ConsentCallbackInvalid,

    #[error("Cannot listen on port {port}, auth will fail: {reason}")]
    PortBind { port: u16, reason: String },

    #[error("Authentication flow cancelled")]
    Cancelled,

    #[error("Invalid launcher code, must start with 'jagex:'")]
    InvalidLauncherCode,

    #[error("JSON serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
