//! Run identifiers and placeholder content hashes.

use uuid::Uuid;

pub const RUN_ID_PREFIX: &str = "run_";

const RUN_ID_BODY_LEN: usize = 12;
const HASH_BODY_LEN: usize = 16;

// URL-safe alphabet, 64 symbols so a byte maps with a 6-bit mask.
const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// Random URL-safe string of `len` characters.
fn random_token(len: usize) -> String {
    let mut out = String::with_capacity(len);
    while out.len() < len {
        let bytes = *Uuid::new_v4().as_bytes();
        // Byte 6 carries the version nibble and byte 8 the variant bits.
        for (i, b) in bytes.iter().enumerate() {
            if i == 6 || i == 8 || out.len() == len {
                continue;
            }
            out.push(ALPHABET[usize::from(b & 0x3f)] as char);
        }
    }
    out
}

/// New run identifier, `run_` followed by 12 URL-safe characters.
pub fn new_run_id() -> String {
    format!("{RUN_ID_PREFIX}{}", random_token(RUN_ID_BODY_LEN))
}

/// Stand-in for a content digest; no file content is hashed.
pub fn placeholder_sha256() -> String {
    format!("sha256_{}", random_token(HASH_BODY_LEN))
}
