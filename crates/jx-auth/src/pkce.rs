//! PKCE S256 challenge generation plus the random nonces used by the
//! authorization and consent URLs (RFC 7636).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::RngCore as _;
use sha2::{Digest, Sha256};

/// A PKCE verifier/challenge pair.
///
/// The verifier is sent with the token exchange; the challenge is embedded
/// in the authorization URL. `method` is always `S256`.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
    pub method: &'static str,
}

/// Generates a fresh PKCE S256 pair.
///
/// 32 random bytes, base64url without padding (43 chars) for the verifier;
/// the challenge is the base64url-encoded SHA-256 digest of the verifier's
/// UTF-8 bytes (RFC 7636 section 4.2).
pub fn generate() -> PkcePair {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    let verifier = URL_SAFE_NO_PAD.encode(bytes);

    let digest = Sha256::digest(verifier.as_bytes());
    let challenge = URL_SAFE_NO_PAD.encode(digest);

    PkcePair {
        verifier,
        challenge,
        method: "S256",
    }
}

/// Random CSRF `state` value: 16 random bytes, hex-encoded.
pub fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex(&bytes)
}

/// Random OIDC `nonce` value.
pub fn random_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex(&bytes)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
