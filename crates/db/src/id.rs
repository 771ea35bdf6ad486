//! Public identifiers.
//!
//! Rows are addressed externally by a 24 character lowercase hexadecimal
//! string. The leading 48 bits are the millisecond timestamp of a UUIDv7, so
//! identifiers sort roughly by creation time; the remaining 48 bits are random.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

pub const PUBLIC_ID_LEN: usize = 24;

/// Generate a new public identifier.
pub fn gen_public_id() -> String {
    let uuid = Uuid::now_v7();
    let bytes = uuid.as_bytes();

    bytes[..6]
        .iter()
        .chain(&bytes[10..])
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Whether `s` has the shape of a public identifier.
pub fn is_public_id(s: &str) -> bool {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());
    RE.is_match(s)
}
