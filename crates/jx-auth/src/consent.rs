//! Consent-upgrade callback listener.
//!
//! The consent step redirects the user's browser to `http://localhost`
//! carrying either a fresh game identity token or an error as query
//! parameters. This module owns the transient HTTP listener that captures
//! exactly one such redirect: the bare page load gets a static landing
//! document, the parameterized redirect terminates the listener through a
//! single-fire completion channel.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ProviderConfig;
use crate::errors::{AuthError, Result};
use crate::pkce;

/// Static landing page served on the bare page load before the provider's
/// parameterized redirect arrives.
const LANDING_PAGE: &str = include_str!("consent.html");

/// A built consent-upgrade URL plus the nonces embedded in it
#[derive(Debug, Clone)]
pub struct ConsentRequest {
    pub url: Url,
    pub state: String,
    pub nonce: String,
}

/// Build the consent-upgrade authorization URL for the current identity.
pub fn consent_url(config: &ProviderConfig, id_token: &str) -> ConsentRequest {
    let state = pkce::random_state();
    let nonce = pkce::random_nonce();

    let mut url = config.authorize_url.clone();
    url.query_pairs_mut()
        .append_pair("client_id", &config.consent_client_id)
        .append_pair("response_type", "id_token code")
        .append_pair("scope", crate::config::consent::SCOPE)
        .append_pair("prompt", "consent")
        .append_pair("state", &state)
        .append_pair("id_token_hint", id_token)
        .append_pair("nonce", &nonce)
        .append_pair("redirect_uri", &config.consent_redirect_uri);

    ConsentRequest { url, state, nonce }
}

/// Check that the callback port can be bound before starting any network
/// flow. Binding the well-known HTTP port usually needs a capability grant,
/// and failing here is far friendlier than failing mid-consent.
pub async fn probe_port(port: u16) -> Result<()> {
    match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(e) => Err(AuthError::PortBind {
            port,
            reason: e.to_string(),
        }),
    }
}

/// What a single callback request means for the listener state machine
#[derive(Debug)]
enum CallbackAction {
    /// Bare page load: serve the landing page, keep listening
    Landing,
    /// Terminal success carrying the trimmed game identity token
    Token(String),
    /// Terminal failure
    Failure(AuthError),
}

/// Classify a request path's query parameters.
fn classify_query(path: &str) -> CallbackAction {
    let url = match Url::parse(&format!("http://localhost{}", path)) {
        Ok(url) => url,
        Err(_) => return CallbackAction::Failure(AuthError::ConsentCallbackInvalid),
    };

    if url.query().unwrap_or("").is_empty() {
        return CallbackAction::Landing;
    }

    let mut error = String::new();
    let mut error_description = String::new();
    let mut error_uri = String::new();
    let mut id_token = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "error" => error = value.into_owned(),
            "error_description" => error_description = value.into_owned(),
            "error_uri" => error_uri = value.into_owned(),
            "id_token" => id_token = Some(value.trim().to_string()),
            _ => {}
        }
    }

    if !error.is_empty() {
        return CallbackAction::Failure(AuthError::ConsentDenied {
            error,
            description: combine_error_description(&error_description, &error_uri),
        });
    }

    match id_token {
        Some(token) if !token.is_empty() => CallbackAction::Token(token),
        // A parameterized request with neither an error nor a usable token
        // is a broken redirect, not a success.
        _ => CallbackAction::Failure(AuthError::ConsentCallbackInvalid),
    }
}

/// Combine `error_description` and `error_uri` into one human-readable
/// description: the URI stands in for a missing description, and is
/// appended when both are present.
fn combine_error_description(description: &str, uri: &str) -> String {
    if description.is_empty() && !uri.is_empty() {
        format!("error_uri: {}", uri)
    } else if !description.is_empty() && !uri.is_empty() {
        format!("{}, error_uri: {}", description, uri)
    } else {
        description.to_string()
    }
}

/// Bound-but-not-yet-serving callback listener
pub struct ConsentListener {
    listener: TcpListener,
}

impl ConsentListener {
    /// Bind the callback port. Failure is the distinguished, user-actionable
    /// environment error.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| AuthError::PortBind {
                port,
                reason: e.to_string(),
            })?;
        Ok(Self { listener })
    }

    /// The actually bound port (differs from the requested one when bound
    /// to port 0 in tests).
    pub fn local_port(&self) -> Result<u16> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Start serving as an independent task.
    ///
    /// The returned handle resolves once the listener captures a terminal
    /// redirect or the given cancellation fires; the accept loop watches a
    /// child of the same token, so outer cancellation tears it down
    /// promptly.
    pub fn start(self, cancel: &CancellationToken) -> ConsentCallback {
        let shutdown = cancel.child_token();
        let (done_tx, done_rx) = oneshot::channel();

        let loop_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            serve(self.listener, loop_shutdown, done_tx).await;
            debug!("Consent listener stopped");
        });

        ConsentCallback {
            done: done_rx,
            shutdown,
            task,
        }
    }
}

/// Foreground handle for an in-flight consent capture
pub struct ConsentCallback {
    done: oneshot::Receiver<Result<String>>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsentCallback {
    /// Wait for the terminal redirect or cancellation, whichever fires
    /// first. Always shuts the listener down before returning.
    pub async fn wait(self) -> Result<String> {
        let result = tokio::select! {
            result = self.done => match result {
                Ok(outcome) => outcome,
                // The serve task never drops the sender without sending
                // unless it was cancelled underneath us.
                Err(_) => Err(AuthError::Cancelled),
            },
            _ = self.shutdown.cancelled() => Err(AuthError::Cancelled),
        };

        self.shutdown.cancel();
        self.task.abort();
        result
    }
}

/// Accept loop: serves landing pages until the first terminal request, then
/// signals completion exactly once and stops accepting.
async fn serve(
    listener: TcpListener,
    shutdown: CancellationToken,
    done: oneshot::Sender<Result<String>>,
) {
    // Single-fire producer: taking the sender makes a double signal
    // impossible even if more terminal requests race in.
    let mut done = Some(done);

    loop {
        let (stream, peer) = tokio::select! {
            _ = shutdown.cancelled() => return,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Callback accept failed: {}", e);
                    continue;
                }
            },
        };
        debug!("Consent callback connection from {}", peer);

        match handle_connection(stream).await {
            Ok(Some(outcome)) => {
                if let Some(done) = done.take() {
                    let _ = done.send(outcome);
                }
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("Callback connection error: {}", e),
        }
    }
}

/// Handle one HTTP connection. Returns the terminal outcome, or `None` when
/// the request was a non-terminal landing-page load.
async fn handle_connection(stream: TcpStream) -> Result<Option<Result<String>>> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain the headers; the redirect carries everything in the query.
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    info!("Localhost callback: {}", path);

    let action = classify_query(path);
    let (body, outcome) = match action {
        CallbackAction::Landing => (LANDING_PAGE.to_string(), None),
        CallbackAction::Token(token) => (
            "Authentication complete. You may close this tab.".to_string(),
            Some(Ok(token)),
        ),
        CallbackAction::Failure(err) => (err.to_string(), Some(Err(err))),
    };

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    write_half.write_all(response.as_bytes()).await?;
    write_half.shutdown().await?;

    Ok(outcome)
}
