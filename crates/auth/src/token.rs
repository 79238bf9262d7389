//! Signed session tokens (JWT compact form, HS256).
//!
//! A token is `base64url(header).base64url(claims).base64url(signature)` with
//! claims `{ sub, iat, exp }` in whole Unix seconds. Nothing about a token is
//! stored server side: validity is re-derived from the bytes, the signing key
//! and the clock on every request.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Shortest signing secret accepted at startup.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

/// Default token lifetime in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

const ALGORITHM: &str = "HS256";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("signing key is {len} bytes; at least {min} required")]
    TooShort { len: usize, min: usize },
}

/// Verification failure, in the order the checks run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature does not verify")]
    BadSignature,

    #[error("token has expired")]
    Expired,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssueError {
    #[error("token subject must not be empty")]
    EmptySubject,

    #[error("token expiry overflows the timestamp range")]
    TimestampOverflow,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Process-wide HMAC-SHA-256 signing key.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
}

impl SigningKey {
    pub fn from_bytes(secret: impl AsRef<[u8]>) -> Result<Self, KeyError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SIGNING_KEY_LEN {
            return Err(KeyError::TooShort {
                len: secret.len(),
                min: MIN_SIGNING_KEY_LEN,
            });
        }

        // HMAC accepts keys of any length; the length check above is the only gate.
        let mac = <HmacSha256 as Mac>::new_from_slice(secret).map_err(|_| KeyError::TooShort {
            len: secret.len(),
            min: MIN_SIGNING_KEY_LEN,
        })?;
        Ok(Self { mac })
    }

    fn sign(&self, signing_input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(signing_input);
        mac.finalize().into_bytes().to_vec()
    }

    fn verify(&self, signing_input: &[u8], signature: &[u8]) -> bool {
        let mut mac = self.mac.clone();
        mac.update(signing_input);
        // Constant-time comparison.
        mac.verify_slice(signature).is_ok()
    }
}

impl core::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

/// A freshly issued token plus its validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn expires_in_secs(&self) -> i64 {
        (self.expires_at - self.issued_at).num_seconds()
    }
}

/// Decoded contents of a token that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Issues and verifies session tokens with one signing key and a fixed TTL.
#[derive(Debug, Clone)]
pub struct TokenCodec {
    key: SigningKey,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: SigningKey, ttl: Duration) -> Self {
        Self { key, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `identity`, valid from `now` (truncated to the second)
    /// until `now + ttl`.
    pub fn issue(&self, identity: &str, now: DateTime<Utc>) -> Result<IssuedToken, IssueError> {
        if identity.is_empty() {
            return Err(IssueError::EmptySubject);
        }

        let iat = now.timestamp();
        let exp = iat
            .checked_add(self.ttl.num_seconds())
            .ok_or(IssueError::TimestampOverflow)?;
        let issued_at = DateTime::from_timestamp(iat, 0).ok_or(IssueError::TimestampOverflow)?;
        let expires_at = DateTime::from_timestamp(exp, 0).ok_or(IssueError::TimestampOverflow)?;

        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let claims = Claims {
            sub: identity.to_string(),
            iat,
            exp,
        };

        let mut token = encode_segment(&header)?;
        token.push('.');
        token.push_str(&encode_segment(&claims)?);

        let signature = self.key.sign(token.as_bytes());
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));

        Ok(IssuedToken {
            token,
            issued_at,
            expires_at,
        })
    }

    /// Verify `token` at instant `now`.
    ///
    /// Structure is checked first, then the signature, then expiry, so a
    /// garbled token is never reported as merely expired. A token is valid
    /// strictly before its expiry and invalid from the expiry second on.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken, TokenError> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Malformed);
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Malformed);
        }

        let claims: Claims = decode_segment(claims_b64)?;
        if claims.sub.is_empty() || claims.exp <= claims.iat {
            return Err(TokenError::Malformed);
        }
        let issued_at = DateTime::from_timestamp(claims.iat, 0).ok_or(TokenError::Malformed)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(TokenError::Malformed)?;

        // Header and claims are well formed from here on; a signature segment
        // that does not even decode is just a signature that does not match.
        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::BadSignature)?;

        // The signing input is the header and claims exactly as transmitted.
        let signing_input_len = header_b64.len() + 1 + claims_b64.len();
        if !self
            .key
            .verify(&token.as_bytes()[..signing_input_len], &signature)
        {
            return Err(TokenError::BadSignature);
        }

        if now >= expires_at {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedToken {
            subject: claims.sub,
            issued_at,
            expires_at,
        })
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, IssueError> {
    let json = serde_json::to_vec(value).map_err(|e| IssueError::Encoding(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}
