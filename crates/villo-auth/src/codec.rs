//! Access token decoding.
//!
//! Cyclocity access tokens look like JWTs but the payload segment is
//! compressed: `header.payload.signature`, where `payload` is URL-safe
//! base64 over zlib-deflated JSON. The header advertises this with
//! `"zip":"DEF"`. Only the `exp` claim is needed to drive refreshes.

use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, TimeZone, Utc};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{AuthError, Result};

/// URL-safe base64 that accepts both padded and unpadded input.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Header and claims of an access token, decoded without verification.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub header: Value,
    pub claims: Value,
}

impl DecodedToken {
    /// Whether the header declares a deflated payload.
    pub fn is_deflated(&self) -> bool {
        self.header.get("zip").and_then(Value::as_str) == Some("DEF")
    }

    /// The `exp` claim as a UTC instant.
    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        let exp = self
            .claims
            .get("exp")
            .ok_or_else(|| AuthError::MalformedToken("payload has no 'exp' claim".to_string()))?;
        exp_to_instant(exp)
    }
}

/// Decodes token expiry, remembering the last token it saw.
///
/// The same access token is presented on every API call between two
/// refreshes, so a single-slot cache avoids inflating the payload again on
/// each request. The cache belongs to the codec instance; two sessions
/// with their own codecs never share it.
#[derive(Debug, Default)]
pub struct TokenCodec {
    last: Mutex<Option<(String, DateTime<Utc>)>>,
    decodes: AtomicUsize,
}

impl TokenCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expiry instant of `access_token`.
    pub fn expiry_of(&self, access_token: &str) -> Result<DateTime<Utc>> {
        let mut last = self.last.lock();
        if let Some((token, expires_at)) = last.as_ref()
            && token == access_token
        {
            return Ok(*expires_at);
        }

        self.decodes.fetch_add(1, Ordering::SeqCst);
        let expires_at = decode_payload(access_token)?
            .get("exp")
            .ok_or_else(|| AuthError::MalformedToken("payload has no 'exp' claim".to_string()))
            .and_then(exp_to_instant)?;

        tracing::debug!(expires_at = %expires_at, "Decoded access token expiry");
        *last = Some((access_token.to_string(), expires_at));
        Ok(expires_at)
    }

    /// Number of times a payload was actually decoded (cache misses).
    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    /// Decode header and claims for display. Bypasses the cache.
    pub fn inspect(access_token: &str) -> Result<DecodedToken> {
        let (header, _, _) = split_segments(access_token)?;
        let header_bytes = URL_SAFE_LENIENT
            .decode(header)
            .map_err(|e| AuthError::MalformedToken(format!("header is not base64: {}", e)))?;
        let header: Value = serde_json::from_slice(&header_bytes)
            .map_err(|e| AuthError::MalformedToken(format!("header is not JSON: {}", e)))?;

        Ok(DecodedToken {
            header,
            claims: decode_payload(access_token)?,
        })
    }
}

fn split_segments(token: &str) -> Result<(&str, &str, &str)> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) if !payload.is_empty() => {
            Ok((header, payload, signature))
        }
        _ => Err(AuthError::MalformedToken(
            "expected three dot-separated segments".to_string(),
        )),
    }
}

fn decode_payload(token: &str) -> Result<Value> {
    let (_, payload, _) = split_segments(token)?;
    let compressed = URL_SAFE_LENIENT
        .decode(payload)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not base64: {}", e)))?;
    let json = inflate(&compressed)?;
    serde_json::from_slice(&json)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not JSON: {}", e)))
}

/// zlib-wrapped deflate is what the site emits; raw deflate is accepted too.
fn inflate(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    if ZlibDecoder::new(bytes).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }

    out.clear();
    DeflateDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|e| AuthError::MalformedToken(format!("payload is not deflated: {}", e)))?;
    Ok(out)
}

fn exp_to_instant(exp: &Value) -> Result<DateTime<Utc>> {
    let secs = match exp {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| AuthError::MalformedToken(format!("'exp' is not a timestamp: {}", exp)))?;

    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| AuthError::MalformedToken(format!("'exp' out of range: {}", secs)))
}
