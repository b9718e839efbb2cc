//! Feishu custom-bot request signing.
//!
//! The bot verifies `sign` by computing HMAC-SHA256 keyed with
//! `"{timestamp}\n{secret}"` over an empty message and comparing the standard
//! base64 of the digest. A signature is only valid for the timestamp it was
//! built with.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn sign(secret: &str, timestamp: &str) -> String {
    let key = format!("{}\n{}", timestamp, secret);
    let mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    STANDARD.encode(mac.finalize().into_bytes())
}
