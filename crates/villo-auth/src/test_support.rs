//! Helpers shared by unit tests.

use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use flate2::Compression;
use flate2::write::{DeflateEncoder, ZlibEncoder};
use serde_json::Value;

const HEADER: &str = r#"{"alg":"HS256","zip":"DEF"}"#;

/// Build a token whose payload is zlib-deflated `claims`, like the site does.
pub fn mint_token(claims: &Value) -> String {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(claims.to_string().as_bytes()).unwrap();
    assemble(&encoder.finish().unwrap())
}

/// Same as [`mint_token`] with a headerless deflate stream.
pub fn mint_raw_deflate_token(claims: &Value) -> String {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(claims.to_string().as_bytes()).unwrap();
    assemble(&encoder.finish().unwrap())
}

/// Token expiring `offset_secs` from now.
pub fn token_expiring_in(offset_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    mint_token(&serde_json::json!({ "exp": exp, "nonce": offset_secs }))
}

fn assemble(payload: &[u8]) -> String {
    format!(
        "{}.{}.c2lnbmF0dXJl",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    )
}
