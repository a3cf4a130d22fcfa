use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::account::CredentialRecord;
use crate::config::ProviderConfig;
use crate::errors::{AuthError, Result};
use crate::models::{Character, ProviderErrorBody, SessionRequest, SessionResponse};

/// Provider code signaling the game identity token was already consumed
const ID_TOKEN_ALREADY_USED: &str = "ID_TOKEN_ALREADY_USED";

/// Client for the game-session endpoints.
///
/// Session creation deliberately does not use the OAuth bearer credential;
/// all calls here go through an anonymous client, with character listing
/// bearing the session id instead.
#[derive(Debug, Clone)]
pub struct SessionClient {
    config: ProviderConfig,
    http: Client,
}

impl SessionClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .build()?;
        Ok(Self { config, http })
    }

    /// Redeem the single-use game identity token for a session id.
    ///
    /// The game ID token is cleared on every outcome that consumed it:
    /// unconditionally on success, and on the provider reporting it was
    /// already used, so a later run re-enters the consent stage instead of
    /// replaying a dead token.
    #[instrument(skip(self, record))]
    pub async fn negotiate(&self, record: &mut CredentialRecord) -> Result<()> {
        debug!("Negotiating game session");
        let response = self
            .http
            .post(self.config.sessions_url.clone())
            .header("Accept", "application/json")
            .json(&SessionRequest {
                id_token: record.game_id_token.clone(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            if body.code == ID_TOKEN_ALREADY_USED {
                warn!("Game ID token already used, deleting it");
                record.game_id_token.clear();
                return Err(AuthError::IdTokenAlreadyUsed);
            }
            return Err(AuthError::UnexpectedStatus {
                status,
                message: body.message,
            });
        }

        // Single-use: the token is spent now no matter what follows.
        record.game_id_token.clear();

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("session response: {}", e)))?;

        if session.session_id.is_empty() {
            return Err(AuthError::EmptySessionId);
        }

        record.session_id = session.session_id;
        Ok(())
    }

    /// List the playable characters for the current session.
    ///
    /// A 401 means the session is gone; any other failure is treated the
    /// same way defensively. Either clears the stored session id so the
    /// next run renegotiates.
    #[instrument(skip(self, record))]
    pub async fn list_characters(&self, record: &mut CredentialRecord) -> Result<Vec<Character>> {
        if record.session_id.is_empty() {
            return Err(AuthError::InvalidState(
                "empty session, cannot fetch characters".to_string(),
            ));
        }

        debug!("Fetching characters");
        let response = self
            .http
            .get(self.config.accounts_url.clone())
            .header("Accept", "application/json")
            .bearer_auth(&record.session_id)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!("Session token rejected, deleting it");
            record.session_id.clear();
            return Err(AuthError::SessionInvalid);
        }

        if !status.is_success() {
            // Assume the session is bad rather than retrying against it.
            record.session_id.clear();
            let body: ProviderErrorBody = response.json().await.unwrap_or_default();
            return Err(AuthError::UnexpectedStatus {
                status,
                message: body.message,
            });
        }

        let characters: Vec<Character> = response
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("characters response: {}", e)))?;

        if characters.is_empty() {
            return Err(AuthError::NoCharacters);
        }

        record.characters = characters.clone();
        Ok(characters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> ProviderConfig {
        let base = Url::parse(&server.uri()).unwrap();
        ProviderConfig {
            sessions_url: base.join("/game-session/v1/sessions").unwrap(),
            accounts_url: base.join("/game-session/v1/accounts").unwrap(),
            ..ProviderConfig::jagex()
        }
    }

    fn record_with_game_token() -> CredentialRecord {
        CredentialRecord {
            game_id_token: "game-id-token".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_negotiate_clears_token_and_stores_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game-session/v1/sessions"))
            .and(body_string_contains("game-id-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"sessionId": "session-1"})),
            )
            .mount(&server)
            .await;

        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = record_with_game_token();
        client.negotiate(&mut record).await.unwrap();

        assert_eq!(record.session_id, "session-1");
        assert_eq!(record.game_id_token, "");
    }

    #[tokio::test]
    async fn test_negotiate_already_used_clears_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game-session/v1/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "traceId": "t", "spanId": "s", "status": 400,
                "code": "ID_TOKEN_ALREADY_USED",
                "message": "token already used", "id": "x",
            })))
            .mount(&server)
            .await;

        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = record_with_game_token();
        let err = client.negotiate(&mut record).await.unwrap_err();

        assert!(matches!(err, AuthError::IdTokenAlreadyUsed));
        assert_eq!(record.game_id_token, "");
        assert_eq!(record.session_id, "");
    }

    #[tokio::test]
    async fn test_negotiate_other_failure_keeps_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game-session/v1/sessions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "code": "UNAVAILABLE", "message": "try later",
            })))
            .mount(&server)
            .await;

        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = record_with_game_token();
        let err = client.negotiate(&mut record).await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::UnexpectedStatus { status, .. } if status.as_u16() == 503
        ));
        // Only a consumed token gets cleared.
        assert_eq!(record.game_id_token, "game-id-token");
    }

    #[tokio::test]
    async fn test_negotiate_empty_session_id_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/game-session/v1/sessions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"sessionId": ""})),
            )
            .mount(&server)
            .await;

        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = record_with_game_token();
        let err = client.negotiate(&mut record).await.unwrap_err();

        assert!(matches!(err, AuthError::EmptySessionId));
        // The token was still spent on the provider side.
        assert_eq!(record.game_id_token, "");
        assert_eq!(record.session_id, "");
    }

    #[tokio::test]
    async fn test_list_characters_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/game-session/v1/accounts"))
            .and(header("Authorization", "Bearer session-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"accountId": "a1", "displayName": "Alpha", "userHash": "h1"},
                {"accountId": "a2", "displayName": "Beta", "userHash": "h2"},
            ])))
            .mount(&server)
            .await;

        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = CredentialRecord {
            session_id: "session-1".to_string(),
            ..Default::default()
        };

        let characters = client.list_characters(&mut record).await.unwrap();
        assert_eq!(characters.len(), 2);
        assert_eq!(record.characters[0].display_name, "Alpha");
        assert_eq!(record.characters[1].user_hash, "h2");
    }

    #[tokio::test]
    async fn test_list_characters_401_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/game-session/v1/accounts"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = CredentialRecord {
            session_id: "session-1".to_string(),
            ..Default::default()
        };

        let err = client.list_characters(&mut record).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionInvalid));
        assert_eq!(record.session_id, "");
    }

    #[tokio::test]
    async fn test_list_characters_other_failure_clears_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/game-session/v1/accounts"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "code": "INTERNAL", "message": "boom",
            })))
            .mount(&server)
            .await;

        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = CredentialRecord {
            session_id: "session-1".to_string(),
            ..Default::default()
        };

        let err = client.list_characters(&mut record).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::UnexpectedStatus { status, message } if status.as_u16() == 500 && message == "boom"
        ));
        assert_eq!(record.session_id, "");
    }

    #[tokio::test]
    async fn test_list_characters_empty_list_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/game-session/v1/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = CredentialRecord {
            session_id: "session-1".to_string(),
            ..Default::default()
        };

        let err = client.list_characters(&mut record).await.unwrap_err();
        assert!(matches!(err, AuthError::NoCharacters));
        // Listing worked; the session itself is fine.
        assert_eq!(record.session_id, "session-1");
    }

    #[tokio::test]
    async fn test_list_characters_requires_session() {
        let server = MockServer::start().await;
        let client = SessionClient::new(test_config(&server)).unwrap();
        let mut record = CredentialRecord::default();
        let err = client.list_characters(&mut record).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidState(_)));
    }
}
