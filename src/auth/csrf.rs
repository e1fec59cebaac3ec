//! CSRF tokens for the login and signup forms.
//!
//! Tokens are signed with the same codec as sessions but carry no identity.
//! By default a token may be presented any number of times until it expires;
//! with single-use enabled the nonce is remembered until expiry and replays
//! are rejected.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::token::{now_millis, TokenClaims, TokenCodec, TokenKind};
use crate::Result;

/// Name of the CSRF cookie.
pub const CSRF_COOKIE: &str = "csrf_token";

/// Name of the CSRF request header.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Lifetime of a CSRF token.
pub const CSRF_TTL: Duration = Duration::from_secs(30 * 60);

/// Random bytes in a nonce.
const NONCE_BYTES: usize = 32;

/// Claims stored in a CSRF token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsrfClaims {
    /// Random nonce, hex encoded.
    pub t: String,
    /// Expiry, epoch milliseconds.
    pub exp: i64,
}

impl TokenClaims for CsrfClaims {
    const KIND: TokenKind = TokenKind::Csrf;
}

/// Issues and verifies CSRF tokens.
#[derive(Debug)]
pub struct CsrfManager {
    codec: TokenCodec,
    /// Consumed nonces and their expiry, present only in single-use mode.
    consumed: Option<Mutex<HashMap<String, i64>>>,
}

impl CsrfManager {
    /// Create a manager. `single_use` rejects tokens after their first use.
    pub fn new(codec: TokenCodec, single_use: bool) -> Self {
        Self {
            codec,
            consumed: single_use.then(|| Mutex::new(HashMap::new())),
        }
    }

    /// Issue a fresh token.
    pub fn issue(&self) -> Result<String> {
        let mut nonce = [0u8; NONCE_BYTES];
        rand::rng().fill_bytes(&mut nonce);
        let claims = CsrfClaims {
            t: hex::encode(nonce),
            exp: now_millis() + CSRF_TTL.as_millis() as i64,
        };
        self.codec.sign(&claims)
    }

    /// Verify a token taken from the request. Missing tokens fail.
    pub fn verify(&self, token: Option<&str>) -> bool {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return false;
        };
        let Some(claims) = self.codec.verify::<CsrfClaims>(token) else {
            return false;
        };

        match &self.consumed {
            None => true,
            Some(ledger) => {
                let now = now_millis();
                let mut ledger = match ledger.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                ledger.retain(|_, exp| *exp >= now);
                ledger.insert(claims.t, claims.exp).is_none()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::{Identity, Role, SessionManager};

    #[test]
    fn test_issue_and_verify() {
        let csrf = CsrfManager::new(TokenCodec::new("secret"), false);
        let token = csrf.issue().unwrap();

        assert!(csrf.verify(Some(&token)));
        // Reusable until expiry by default.
        assert!(csrf.verify(Some(&token)));
    }

    #[test]
    fn test_missing_or_garbage_token() {
        let csrf = CsrfManager::new(TokenCodec::new("secret"), false);
        assert!(!csrf.verify(None));
        assert!(!csrf.verify(Some("")));
        assert!(!csrf.verify(Some("not-a-token")));
    }

    #[test]
    fn test_nonces_are_unique() {
        let csrf = CsrfManager::new(TokenCodec::new("secret"), false);
        assert_ne!(csrf.issue().unwrap(), csrf.issue().unwrap());
    }

    #[test]
    fn test_single_use_rejects_replay() {
        let csrf = CsrfManager::new(TokenCodec::new("secret"), true);
        let first = csrf.issue().unwrap();
        let second = csrf.issue().unwrap();

        assert!(csrf.verify(Some(&first)));
        assert!(!csrf.verify(Some(&first)));
        assert!(csrf.verify(Some(&second)));
    }

    #[test]
    fn test_session_token_is_not_a_csrf_token() {
        let codec = TokenCodec::new("secret");
        let sessions = SessionManager::new(codec.clone());
        let csrf = CsrfManager::new(codec, false);
        let session = sessions
            .create_session(
                &Identity {
                    id: "1".into(),
                    username: "admin_demo".into(),
                    email: "admin@demo.com".into(),
                    role: Role::Admin,
                },
                false,
            )
            .unwrap();

        assert!(!csrf.verify(Some(&session.token)));
        assert!(sessions.verify_session(&csrf.issue().unwrap()).is_none());
    }
}
