//! Stable dedup keys for delivered messages.
use md5::{Digest, Md5};

use crate::model::Message;

/// First 16 hex characters of the MD5 of `text`. Not a security boundary:
/// it only has to match keys already written to existing ledgers.
pub fn hash16(text: &str) -> String {
    let digest = Md5::digest(text.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(16);
    hex
}

/// `{create_time}_{user_id}_{hash16(text)}`. The text is hashed verbatim.
pub fn identity_of(msg: &Message) -> String {
    format!("{}_{}_{}", msg.create_time, msg.user_id, hash16(&msg.text))
}
