//! Jagex account authentication for game launchers.
//!
//! This crate implements the multi-step token pipeline used to turn a Jagex
//! account login into a game session consumable by an external game client.
//!
//! # Authentication Flow
//!
//! 1. OAuth2 authorization-code exchange with PKCE (the user pastes the
//!    `jagex:` launcher redirect back into the terminal)
//! 2. Token refresh and ID token verification against the provider's
//!    published key set
//! 3. User info and display name resolution
//! 4. Consent upgrade: a transient listener on the local HTTP port captures
//!    the browser redirect carrying a single-use game identity token
//! 5. Game session negotiation and character listing
//!
//! Credentials are persisted per account between runs; see
//! [`store::CredentialStore`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use jx_auth::{AuthFlow, ConsentPrompt, FileCredentialStore, ProviderConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! struct PrintPrompt;
//!
//! impl ConsentPrompt for PrintPrompt {
//!     fn show_consent_url(&self, url: &Url, _callback_port: u16) {
//!         println!("Consent URL, please visit: {}", url);
//!     }
//! }
//!
//! # async fn example() -> jx_auth::Result<()> {
//! let config = ProviderConfig::jagex();
//! let store = Arc::new(FileCredentialStore::new(FileCredentialStore::default_root()?).await?);
//! let flow = AuthFlow::new(config, store.clone())?;
//!
//! // Start a brand new account: the user visits the URL and pastes back
//! // the `jagex:` payload.
//! let pending = flow.client().begin_authorization();
//! println!("Visit this url:\n{}", pending.url);
//! let pasted = "jagex:code=...,state=...,intent=social_auth";
//! let record = flow.client().complete_authorization(pasted, &pending).await?;
//!
//! let outcome = flow
//!     .authenticate(record, &PrintPrompt, &CancellationToken::new())
//!     .await?;
//! println!("Authenticated as {}", outcome.account_name);
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod consent;
pub mod errors;
pub mod file_store;
pub mod flow;
pub mod game_session;
pub mod models;
pub mod pkce;
pub mod store;
pub mod verify;

// Re-export main types
pub use account::{BearerTokens, CredentialRecord};
pub use client::{AuthClient, LauncherRedirect, PendingAuthorization};
pub use config::ProviderConfig;
pub use consent::{probe_port, ConsentCallback, ConsentListener};
pub use errors::{AuthError, Result};
pub use file_store::FileCredentialStore;
pub use flow::{AuthFlow, AuthOutcome, ConsentPrompt};
pub use game_session::SessionClient;
pub use models::{AccountDisplayName, Character, UserInfo};
pub use store::{CredentialStore, MemoryCredentialStore};
pub use verify::{IdTokenClaims, IdTokenVerifier, JwksVerifier};
