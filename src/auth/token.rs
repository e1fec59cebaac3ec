//! Compact signed tokens.
//!
//! A token is `base64(json) + "." + hex(hmac_sha256(secret, json))`. The JSON
//! is an [`Envelope`] carrying a format version, a kind tag and the claims.
//! Every failure (bad shape, bad encoding, bad signature, wrong kind, expiry)
//! collapses into `None` so callers cannot tell the causes apart.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{HavenError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Separator between payload and signature. Not part of the hex alphabet.
const SEPARATOR: char = '.';

/// Current envelope version.
pub const TOKEN_VERSION: u8 = 1;

/// What a token is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Admin session.
    Session,
    /// Anti-forgery token for form posts.
    Csrf,
}

/// Claims that can travel inside a signed token.
pub trait TokenClaims: Serialize + DeserializeOwned {
    /// Kind tag written into the envelope.
    const KIND: TokenKind;
}

/// Signed wrapper around a set of claims.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    v: u8,
    typ: TokenKind,
    #[serde(flatten)]
    claims: T,
}

/// Current time as Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Signs and verifies tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Create a codec keyed by `secret`.
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> std::result::Result<HmacSha256, hmac::digest::InvalidLength> {
        HmacSha256::new_from_slice(&self.secret)
    }

    /// Sign `claims` into a token string.
    pub fn sign<T: TokenClaims>(&self, claims: &T) -> Result<String> {
        let envelope = Envelope {
            v: TOKEN_VERSION,
            typ: T::KIND,
            claims,
        };
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| HavenError::Validation(format!("unserializable claims: {e}")))?;

        let mut mac = self
            .mac()
            .map_err(|e| HavenError::Config(format!("unusable session secret: {e}")))?;
        mac.update(&payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}{SEPARATOR}{signature}", BASE64.encode(&payload)))
    }

    /// Verify a token against the current time.
    pub fn verify<T: TokenClaims>(&self, token: &str) -> Option<T> {
        self.verify_at(token, now_millis())
    }

    /// Verify a token as of `now` (epoch milliseconds).
    pub fn verify_at<T: TokenClaims>(&self, token: &str, now: i64) -> Option<T> {
        match self.check(token, now) {
            Ok(claims) => Some(claims),
            Err(reason) => {
                tracing::debug!(reason, "token rejected");
                None
            }
        }
    }

    fn check<T: TokenClaims>(&self, token: &str, now: i64) -> std::result::Result<T, &'static str> {
        let mut parts = token.split(SEPARATOR);
        let (Some(payload_b64), Some(signature), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err("malformed");
        };

        let payload = BASE64.decode(payload_b64).map_err(|_| "bad payload encoding")?;
        let provided = hex::decode(signature).map_err(|_| "bad signature encoding")?;
        if hex::encode(&provided) != signature {
            return Err("non-canonical signature");
        }

        let mut mac = self.mac().map_err(|_| "unusable secret")?;
        mac.update(&payload);
        mac.verify_slice(&provided).map_err(|_| "signature mismatch")?;

        let value: serde_json::Value =
            serde_json::from_slice(&payload).map_err(|_| "payload is not json")?;
        if let Some(exp) = value.get("exp").and_then(serde_json::Value::as_f64) {
            if (now as f64) > exp {
                return Err("expired");
            }
        }

        let envelope: Envelope<T> =
            serde_json::from_value(value).map_err(|_| "unexpected claims")?;
        if envelope.v != TOKEN_VERSION {
            return Err("unsupported version");
        }
        if envelope.typ != T::KIND {
            return Err("wrong token kind");
        }
        Ok(envelope.claims)
    }
}
