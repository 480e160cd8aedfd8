//! PKCE (RFC 7636) verifier/challenge generation and CSRF state tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// A 32-byte random CSRF state token, base64url-encoded without padding.
pub fn generate_state() -> String {
    random_token(32)
}

#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
    pub method: &'static str,
}

impl Pkce {
    /// Generates a 64-byte random code verifier and its S256 challenge.
    pub fn generate() -> Self {
        let verifier = random_token(64);
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
            method: "S256",
        }
    }

    fn challenge_for(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_state_is_url_safe_and_nontrivial() {
        let a = generate_state();
        let b = generate_state();
        assert_ne!(a, b);
        assert!(!a.contains('+') && !a.contains('/') && !a.contains('='));
    }

    #[test]
    fn pkce_challenge_matches_verifier_via_sha256() {
        let pkce = Pkce::generate();
        assert_eq!(pkce.method, "S256");
        assert_eq!(Pkce::challenge_for(&pkce.verifier), pkce.challenge);
    }

    #[test]
    fn pkce_generates_distinct_verifiers() {
        let a = Pkce::generate();
        let b = Pkce::generate();
        assert_ne!(a.verifier, b.verifier);
    }
}
