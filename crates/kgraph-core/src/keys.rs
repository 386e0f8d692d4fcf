//! Deterministic entity and relation keys.
//!
//! Keys depend only on canonicalised text, never on ingestion order or
//! process state, so the same fact always lands on the same record.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Hex characters kept from each digest.
const KEY_HEX_LEN: usize = 32;

/// Separator between hashed relation components (ASCII unit separator).
const FIELD_SEPARATOR: char = '\u{1f}';

/// Canonical form of a name: NFKC, lowercase, trimmed, inner whitespace
/// collapsed to single spaces.
pub fn canonical(name: &str) -> String {
    let normalized: String = name.nfkc().collect::<String>().to_lowercase();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic key of an entity name.
pub fn entity_key(name: &str) -> String {
    format!("e{}", digest(&canonical(name)))
}

/// Content key of a relation between two entity keys.
pub fn relation_key(from_key: &str, predicate: &str, to_key: &str) -> String {
    let material = format!(
        "{from_key}{FIELD_SEPARATOR}{}{FIELD_SEPARATOR}{to_key}",
        canonical(predicate)
    );
    format!("r{}", digest(&material))
}

/// Positional relation key, unique only by insertion position.
pub fn ordinal_relation_key(graph_id: &str, ordinal: usize) -> String {
    format!("{graph_id}:{ordinal}")
}

/// Short stable hex hash, used for partition suffixes.
pub fn short_hash(value: &str, len: usize) -> String {
    let mut full = digest(value);
    full.truncate(len.min(KEY_HEX_LEN));
    full
}

/// First eight bytes of the SHA-256 of `value`, as an integer.
pub fn hash_u64(value: &str) -> u64 {
    let bytes = Sha256::digest(value.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

fn digest(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(KEY_HEX_LEN);
    hex
}
