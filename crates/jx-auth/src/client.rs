use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::account::{BearerTokens, CredentialRecord};
use crate::config::ProviderConfig;
use crate::errors::{AuthError, Result};
use crate::models::{AccountDisplayName, TokenResponse, UserInfo};
use crate::pkce::{self, PkcePair};

/// In-flight authorization state between building the authorize URL and
/// exchanging the pasted code.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub url: Url,
    pub pkce: PkcePair,
    pub state: String,
}

/// Parsed `jagex:` launcher redirect payload.
///
/// The launcher flow redirects the browser to a `jagex:` URI the OS hands to
/// the desktop launcher; here the user pastes it back instead.
#[derive(Debug, Clone, Default)]
pub struct LauncherRedirect {
    pub code: String,
    pub state: String,
    pub intent: String,
}

/// Client for the primary authorization-code / refresh / lookup calls
#[derive(Debug, Clone)]
pub struct AuthClient {
    config: ProviderConfig,
    http: Client,
}

impl AuthClient {
    /// Create a new authentication client
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(config.http_timeouts.connect)
            .timeout(config.http_timeouts.request)
            .user_agent(config.user_agent.as_deref().unwrap_or("jx-launcher"))
            .build()?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Build the authorization URL for a brand new account and the pending
    /// state needed to finish the exchange.
    #[instrument(skip(self))]
    pub fn begin_authorization(&self) -> PendingAuthorization {
        let pkce = pkce::generate();
        let state = pkce::random_state();

        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", &state)
            .append_pair("access_type", "offline")
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", pkce.method)
            .append_pair("prompt", "login")
            .append_pair("flow", "launcher");

        debug!("Built authorize URL: {}", url);
        PendingAuthorization { url, pkce, state }
    }

    /// Parse the pasted launcher redirect payload:
    /// `jagex:code=<code>,state=<state>,intent=social_auth`
    pub fn parse_launcher_redirect(input: &str) -> Result<LauncherRedirect> {
        let trimmed = input.trim();
        let payload = trimmed
            .strip_prefix("jagex:")
            .ok_or(AuthError::InvalidLauncherCode)?;

        let mut redirect = LauncherRedirect::default();
        for item in payload.split(',') {
            let Some((key, value)) = item.split_once('=') else {
                continue;
            };
            match key {
                "code" => redirect.code = value.to_string(),
                "state" => redirect.state = value.to_string(),
                "intent" => redirect.intent = value.to_string(),
                _ => {}
            }
        }

        if redirect.code.is_empty() {
            return Err(AuthError::InvalidLauncherCode);
        }
        Ok(redirect)
    }

    /// Exchange the pasted launcher redirect for a fresh credential record.
    #[instrument(skip(self, input, pending))]
    pub async fn complete_authorization(
        &self,
        input: &str,
        pending: &PendingAuthorization,
    ) -> Result<CredentialRecord> {
        let redirect = Self::parse_launcher_redirect(input)?;

        if !redirect.state.is_empty() && redirect.state != pending.state {
            // The paste itself proves the user controls the browser session,
            // so a stale state is suspicious but not fatal.
            warn!("State in pasted redirect does not match the authorize URL");
        }

        self.exchange_code(&redirect.code, &pending.pkce.verifier)
            .await
    }

    /// Authorization-code grant. The response must carry the `id_token`
    /// side channel; its absence is a fatal decode error.
    #[instrument(skip(self, code, verifier))]
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<CredentialRecord> {
        debug!("Exchanging authorization code for tokens");
        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("code_verifier", verifier),
            ])
            .send()
            .await?;

        let token: TokenResponse = Self::decode_token_response(response).await?;
        let id_token = token
            .id_token
            .clone()
            .ok_or_else(|| AuthError::Decode("token response missing id_token".to_string()))?;

        Ok(CredentialRecord::new(Self::bearer_tokens(token, None), id_token))
    }

    /// Refresh-token grant. No-op when the bearer token has not expired.
    ///
    /// When the provider returns the same access token it may omit a fresh
    /// identity assertion; the still-valid prior `id_token` is kept in that
    /// case rather than discarded.
    #[instrument(skip(self, record))]
    pub async fn refresh(&self, record: &mut CredentialRecord) -> Result<()> {
        if !record.tokens.is_expired() {
            debug!("Bearer token still valid, skipping refresh");
            return Ok(());
        }

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", record.tokens.refresh_token.as_str()),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;

        let token: TokenResponse = Self::decode_token_response(response).await?;

        if token.access_token != record.tokens.access_token {
            record.id_token = token.id_token.clone().ok_or_else(|| {
                AuthError::Decode("refresh response missing id_token".to_string())
            })?;
            debug!("Token refreshed");
        }

        let prior_refresh = record.tokens.refresh_token.clone();
        record.tokens = Self::bearer_tokens(token, Some(prior_refresh));
        Ok(())
    }

    /// Resolve the account's display name for the given subject claim.
    #[instrument(skip(self, record))]
    pub async fn display_name(
        &self,
        record: &CredentialRecord,
        sub: &str,
    ) -> Result<AccountDisplayName> {
        let url = format!(
            "{}/users/{}/displayName",
            self.config.api_url.as_str().trim_end_matches('/'),
            sub
        );

        debug!("Fetching display name");
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .bearer_auth(&record.tokens.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::unexpected_status(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("display name response: {}", e)))
    }

    /// Fetch the OIDC userinfo claims for the bearer token.
    #[instrument(skip(self, record))]
    pub async fn user_info(&self, record: &CredentialRecord) -> Result<UserInfo> {
        debug!("Fetching user info");
        let response = self
            .http
            .get(self.config.userinfo_url.clone())
            .header("Accept", "application/json")
            .bearer_auth(&record.tokens.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::unexpected_status(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("userinfo response: {}", e)))
    }

    fn bearer_tokens(token: TokenResponse, prior_refresh: Option<String>) -> BearerTokens {
        let refresh_token = token
            .refresh_token
            .filter(|t| !t.is_empty())
            .or(prior_refresh)
            .unwrap_or_default();

        BearerTokens::new(
            token.access_token,
            token.token_type,
            refresh_token,
            token.expires_in,
        )
    }

    async fn decode_token_response(response: reqwest::Response) -> Result<TokenResponse> {
        if !response.status().is_success() {
            return Err(Self::unexpected_status(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::Decode(format!("token response: {}", e)))
    }

    async fn unexpected_status(response: reqwest::Response) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AuthError::UnexpectedStatus {
            status,
            message: body.chars().take(200).collect(),
        }
    }
}
