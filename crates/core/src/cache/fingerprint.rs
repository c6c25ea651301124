//! Cheap content identity for cache validation.

/// Bytes of text that feed the hash.
const FINGERPRINT_PREFIX_BYTES: usize = 4096;

/// Compute a `<hash>:<length>` fingerprint.
///
/// The hash is a 31-multiplier rolling hash over the first
/// [`FINGERPRINT_PREFIX_BYTES`] bytes; the length is the full character
/// count. Not collision resistant, only meant to notice that a page changed.
pub fn fingerprint(text: &str) -> String {
    let hash = text
        .bytes()
        .take(FINGERPRINT_PREFIX_BYTES)
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    format!("{hash}:{}", text.chars().count())
}
