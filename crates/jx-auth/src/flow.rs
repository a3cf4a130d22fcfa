//! Account lifecycle orchestration.
//!
//! One linear pipeline per account run:
//! refresh → verify → user info → display name → persist checkpoint →
//! consent upgrade (when needed) → session negotiation (when needed) →
//! character listing → persist final.
//!
//! The record is persisted as soon as the display name is known and again
//! after the session stages whatever their outcome, so partial progress and
//! locally corrected state (cleared single-use tokens, invalidated
//! sessions) are never lost.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use url::Url;

use crate::account::CredentialRecord;
use crate::client::AuthClient;
use crate::config::ProviderConfig;
use crate::consent::{self, ConsentListener};
use crate::errors::Result;
use crate::game_session::SessionClient;
use crate::store::CredentialStore;
use crate::verify::{IdTokenVerifier, JwksVerifier};

/// Seam for surfacing the consent URL to the user.
///
/// Called once the local callback listener is already serving, so following
/// the URL immediately is safe.
pub trait ConsentPrompt: Send + Sync {
    fn show_consent_url(&self, url: &Url, callback_port: u16);
}

/// Result of a completed authentication run
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    /// Display name, which doubles as the storage key
    pub account_name: String,
    pub record: CredentialRecord,
}

/// Orchestrates the full per-account authentication pipeline
pub struct AuthFlow {
    config: ProviderConfig,
    client: AuthClient,
    sessions: SessionClient,
    verifier: Arc<dyn IdTokenVerifier>,
    store: Arc<dyn CredentialStore>,
}

impl AuthFlow {
    /// Build a flow with the production JWKS verifier.
    pub fn new(config: ProviderConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let verifier = Arc::new(JwksVerifier::new(config.clone())?);
        Self::with_verifier(config, store, verifier)
    }

    /// Build a flow with a custom verifier implementation.
    pub fn with_verifier(
        config: ProviderConfig,
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn IdTokenVerifier>,
    ) -> Result<Self> {
        Ok(Self {
            client: AuthClient::new(config.clone())?,
            sessions: SessionClient::new(config.clone())?,
            config,
            verifier,
            store,
        })
    }

    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    /// Run the pipeline over an existing or freshly exchanged record.
    ///
    /// Verification runs after refresh and before any further authenticated
    /// call; any verification failure aborts before requests are wasted.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        mut record: CredentialRecord,
        prompt: &dyn ConsentPrompt,
        cancel: &CancellationToken,
    ) -> Result<AuthOutcome> {
        info!("Refreshing token if needed");
        self.client.refresh(&mut record).await?;

        info!("Verifying id token");
        self.verifier.verify(&record).await?;

        let user_info = self.client.user_info(&record).await?;
        let display_name = self.client.display_name(&record, &user_info.sub).await?;
        let account_name = display_name.display_name;

        // Earliest point the account can be named on disk: checkpoint now so
        // later failures do not cost the tokens we already hold.
        info!(account = %account_name, "Saving credentials to disk");
        self.store.save(&account_name, &record).await?;

        let result = self.session_stages(&mut record, prompt, cancel).await;

        // Persist again regardless: session stages clear invalidated fields
        // as a side effect of their errors, and that correction must stick.
        if let Err(e) = self.store.save(&account_name, &record).await {
            warn!("Failed to save credentials after session stages: {}", e);
        }
        result?;

        Ok(AuthOutcome {
            account_name,
            record,
        })
    }

    async fn session_stages(
        &self,
        record: &mut CredentialRecord,
        prompt: &dyn ConsentPrompt,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if record.needs_consent() {
            self.consent_upgrade(record, prompt, cancel).await?;
        }

        if !record.has_session() {
            self.sessions.negotiate(record).await?;
        }

        // Also proves the (possibly pre-existing) session is still valid.
        self.sessions.list_characters(record).await?;
        Ok(())
    }

    /// Run the consent upgrade: serve the local callback, send the user to
    /// the consent URL, and wait for the captured redirect or cancellation,
    /// whichever fires first.
    async fn consent_upgrade(
        &self,
        record: &mut CredentialRecord,
        prompt: &dyn ConsentPrompt,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let request = consent::consent_url(&self.config, &record.id_token);

        let listener = ConsentListener::bind(self.config.callback_port).await?;
        let port = listener.local_port()?;
        let callback = listener.start(cancel);

        prompt.show_consent_url(&request.url, port);

        let game_id_token = callback.wait().await?;
        info!("Consent complete");

        // Handoff: the listener only ever passes the token over the
        // completion channel; the record is mutated here, in the foreground
        // flow, never from the handler's context.
        record.game_id_token = game_id_token;
        Ok(())
    }
}
