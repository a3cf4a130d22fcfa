use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Character;

/// OAuth2 bearer-token set for one Jagex account
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BearerTokens {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: String,
    /// `None` means the token never explicitly expires; the expiry check is
    /// skipped. Distinct from an expired token.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl BearerTokens {
    pub fn new(
        access_token: String,
        token_type: String,
        refresh_token: String,
        expires_in: Option<u64>,
    ) -> Self {
        let expiry = expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64));
        Self {
            access_token,
            token_type,
            refresh_token,
            expiry,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expiry {
            Some(expiry) => Utc::now() >= expiry,
            None => false,
        }
    }
}

/// Persisted credential record for one account.
///
/// Created either by a fresh authorization-code exchange or by loading from
/// the credential store, mutated in place by each pipeline stage, and saved
/// back whenever display-name resolution succeeds.
///
/// Invariant: `game_id_token` and `session_id` are never both non-empty
/// except transiently inside the session negotiation call. The game ID token
/// is single-use and is cleared after exactly one use, success or failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialRecord {
    pub tokens: BearerTokens,

    /// OIDC identity assertion from the primary auth exchange
    #[serde(default)]
    pub id_token: String,

    /// Single-use identity assertion from the consent upgrade; present only
    /// between the consent callback and the session negotiation call
    #[serde(default)]
    pub game_id_token: String,

    /// Opaque game-session identifier; non-empty means session-ready
    #[serde(default)]
    pub session_id: String,

    /// Playable characters scoped to the current session
    #[serde(default)]
    pub characters: Vec<Character>,
}

impl CredentialRecord {
    pub fn new(tokens: BearerTokens, id_token: String) -> Self {
        Self {
            tokens,
            id_token,
            ..Default::default()
        }
    }

    /// The consent upgrade only runs when there is neither a pending game ID
    /// token nor an established session.
    pub fn needs_consent(&self) -> bool {
        self.game_id_token.is_empty() && self.session_id.is_empty()
    }

    pub fn has_session(&self) -> bool {
        !self.session_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_expiry_never_expires() {
        let tokens = BearerTokens {
            access_token: "at".to_string(),
            expiry: None,
            ..Default::default()
        };
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let tokens = BearerTokens {
            access_token: "at".to_string(),
            expiry: Some(Utc::now() - chrono::Duration::seconds(60)),
            ..Default::default()
        };
        assert!(tokens.is_expired());
    }

    #[test]
    fn test_future_expiry_is_not_expired() {
        let tokens = BearerTokens::new(
            "at".to_string(),
            "Bearer".to_string(),
            "rt".to_string(),
            Some(3600),
        );
        assert!(!tokens.is_expired());
    }

    #[test]
    fn test_needs_consent_transitions() {
        let mut record = CredentialRecord::default();
        assert!(record.needs_consent());

        record.game_id_token = "game-token".to_string();
        assert!(!record.needs_consent());

        record.game_id_token.clear();
        record.session_id = "session".to_string();
        assert!(!record.needs_consent());
        assert!(record.has_session());
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = CredentialRecord {
            tokens: BearerTokens::new(
                "at".to_string(),
                "Bearer".to_string(),
                "rt".to_string(),
                None,
            ),
            id_token: "idt".to_string(),
            session_id: "sid".to_string(),
            ..Default::default()
        };

        let json = serde_json::to_string(&record).unwrap();
        let loaded: CredentialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, loaded);
    }
}
