//! ID token verification against the provider's published key set.
//!
//! Verification fails closed: any signature, claims, or binding failure
//! aborts the pipeline before further authenticated calls are made.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::account::CredentialRecord;
use crate::config::ProviderConfig;
use crate::errors::{AuthError, Result};

/// Claims asserted by a verified identity token
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    #[serde(default, deserialize_with = "string_or_seq")]
    pub aud: Vec<String>,
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub nonce: Option<String>,
    /// Access-token binding: base64url of the left half of the hash of the
    /// bearer access token, using the signature algorithm's hash function
    #[serde(default)]
    pub at_hash: Option<String>,
}

/// Verifies the credential record's identity assertion.
///
/// A trait so the orchestrator can be exercised without provider key
/// material; production uses [`JwksVerifier`].
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, record: &CredentialRecord) -> Result<IdTokenClaims>;
}

/// Verifier backed by the provider's JWKS endpoint
pub struct JwksVerifier {
    config: ProviderConfig,
    http: reqwest::Client,
}

impl JwksVerifier {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .build()?;
        Ok(Self { config, http })
    }

    async fn fetch_keys(&self) -> Result<JwkSet> {
        debug!("Fetching provider JWKS");
        let response = self.http.get(self.config.jwks_url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(AuthError::UnexpectedStatus {
                status: response.status(),
                message: "fetching JWKS".to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("JWKS response: {}", e)))
    }
}

#[async_trait]
impl IdTokenVerifier for JwksVerifier {
    /// Check bearer expiry, validate the ID token's signature and claims,
    /// and enforce the access-token binding on desktop launcher tokens.
    #[instrument(skip(self, record))]
    async fn verify(&self, record: &CredentialRecord) -> Result<IdTokenClaims> {
        if record.tokens.is_expired() {
            return Err(AuthError::TokenExpired);
        }
        if record.id_token.is_empty() {
            return Err(AuthError::Verification("empty id token".to_string()));
        }

        let header = decode_header(&record.id_token)
            .map_err(|e| AuthError::Verification(format!("invalid token header: {}", e)))?;

        let keys = self.fetch_keys().await?;
        let jwk = match &header.kid {
            Some(kid) => keys.find(kid),
            None => keys.keys.first(),
        }
        .ok_or_else(|| AuthError::Verification("no matching signing key".to_string()))?;

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::Verification(format!("unusable signing key: {}", e)))?;

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.config.issuer]);
        // The provider issues tokens for several audiences against the same
        // key set; audience is checked separately where it matters.
        validation.validate_aud = false;

        let token = decode::<IdTokenClaims>(&record.id_token, &key, &validation)
            .map_err(|e| AuthError::Verification(e.to_string()))?;

        if is_desktop_launcher(&token.claims, &self.config.client_id) {
            check_access_token_binding(&token.claims, header.alg, &record.tokens.access_token)?;
        }

        Ok(token.claims)
    }
}

/// Whether the assertion's audience marks it as a desktop launcher token,
/// which carries a mandatory access-token binding.
fn is_desktop_launcher(claims: &IdTokenClaims, launcher_client_id: &str) -> bool {
    claims.aud.iter().any(|aud| aud == launcher_client_id)
}

/// Enforce the `at_hash` binding between the identity assertion and the
/// bearer access token.
fn check_access_token_binding(
    claims: &IdTokenClaims,
    alg: Algorithm,
    access_token: &str,
) -> Result<()> {
    let at_hash = claims
        .at_hash
        .as_deref()
        .ok_or_else(|| AuthError::Verification("launcher token missing at_hash".to_string()))?;

    let expected = access_token_hash(alg, access_token)?;
    if at_hash != expected {
        return Err(AuthError::Verification(
            "access token does not match id token binding".to_string(),
        ));
    }
    Ok(())
}

/// Compute the expected `at_hash` value: base64url of the left half of the
/// access token's digest under the signature algorithm's hash function.
fn access_token_hash(alg: Algorithm, access_token: &str) -> Result<String> {
    match alg {
        Algorithm::RS256 | Algorithm::PS256 | Algorithm::ES256 | Algorithm::HS256 => {
            let digest = Sha256::digest(access_token.as_bytes());
            Ok(URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2]))
        }
        other => Err(AuthError::Verification(format!(
            "unsupported signing algorithm for access token binding: {:?}",
            other
        ))),
    }
}

fn string_or_seq<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(aud) => vec![aud],
        OneOrMany::Many(auds) => auds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::BearerTokens;

    fn claims(aud: Vec<&str>, at_hash: Option<&str>) -> IdTokenClaims {
        IdTokenClaims {
            iss: "https://account.jagex.com/".to_string(),
            aud: aud.into_iter().map(String::from).collect(),
            sub: "sub-1".to_string(),
            exp: 4102444800,
            iat: 0,
            nonce: None,
            at_hash: at_hash.map(String::from),
        }
    }

    #[test]
    fn test_access_token_hash_is_left_half_of_sha256() {
        let token = "some-access-token";
        let digest = Sha256::digest(token.as_bytes());
        let expected = URL_SAFE_NO_PAD.encode(&digest[..16]);

        let hash = access_token_hash(Algorithm::RS256, token).unwrap();
        assert_eq!(hash, expected);
        // 16 bytes of digest encode to 22 base64url characters.
        assert_eq!(hash.len(), 22);
    }

    #[test]
    fn test_access_token_hash_rejects_unsupported_alg() {
        let err = access_token_hash(Algorithm::RS384, "token").unwrap_err();
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn test_binding_accepts_matching_hash() {
        let access_token = "some-access-token";
        let expected = access_token_hash(Algorithm::RS256, access_token).unwrap();
        let claims = claims(
            vec!["com_jagex_auth_desktop_launcher"],
            Some(expected.as_str()),
        );
        check_access_token_binding(&claims, Algorithm::RS256, access_token).unwrap();
    }

    #[test]
    fn test_binding_rejects_mismatched_hash() {
        let claims = claims(vec!["com_jagex_auth_desktop_launcher"], Some("bogus"));
        let err =
            check_access_token_binding(&claims, Algorithm::RS256, "some-access-token").unwrap_err();
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn test_binding_rejects_missing_at_hash() {
        let claims = claims(vec!["com_jagex_auth_desktop_launcher"], None);
        let err = check_access_token_binding(&claims, Algorithm::RS256, "token").unwrap_err();
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn test_desktop_launcher_detection() {
        let launcher = claims(vec!["other", "com_jagex_auth_desktop_launcher"], None);
        assert!(is_desktop_launcher(
            &launcher,
            "com_jagex_auth_desktop_launcher"
        ));

        let consent = claims(vec!["1fddee4e-b100-4f4e-b2b0-097f9088f9d2"], None);
        assert!(!is_desktop_launcher(
            &consent,
            "com_jagex_auth_desktop_launcher"
        ));
    }

    #[test]
    fn test_aud_accepts_string_or_array() {
        let single: IdTokenClaims =
            serde_json::from_str(r#"{"iss":"i","aud":"a","sub":"s","exp":1}"#).unwrap();
        assert_eq!(single.aud, vec!["a".to_string()]);

        let many: IdTokenClaims =
            serde_json::from_str(r#"{"iss":"i","aud":["a","b"],"sub":"s","exp":1}"#).unwrap();
        assert_eq!(many.aud.len(), 2);
    }

    #[tokio::test]
    async fn test_expired_bearer_fails_before_any_network() {
        // jwks_url points nowhere routable; the expiry check must fire first.
        let verifier = JwksVerifier::new(ProviderConfig::jagex()).unwrap();
        let record = CredentialRecord {
            tokens: BearerTokens {
                access_token: "at".to_string(),
                expiry: Some(chrono::Utc::now() - chrono::Duration::seconds(1)),
                ..Default::default()
            },
            id_token: "not-a-jwt".to_string(),
            ..Default::default()
        };

        let err = verifier.verify(&record).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
    }
}
