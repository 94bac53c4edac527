//! Text canonicalization and content hashing.
//!
//! Every cache key in this crate (segment ids, `content_hash`, synthesis
//! fingerprints) is derived from these two functions, so their behavior is
//! the single source of truth for cache correctness.

use sha2::{Digest, Sha256};

/// Canonicalize text for hashing and comparison: normalize line endings,
/// collapse runs of whitespace, trim, and lowercase.
///
/// `canonicalize(canonicalize(x)) == canonicalize(x)` for all `x`.
pub fn canonicalize(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len());
    let mut last_was_space = false;
    for ch in normalized.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

/// Deterministic content hash over canonicalized text, hex-encoded.
///
/// `content_hash(x) == content_hash(x + "\r\n")` since canonicalization
/// absorbs the trailing line-ending change.
pub fn content_hash(text: &str) -> String {
    let canonical = canonicalize(text);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash an arbitrary sequence of already-canonical strings, joined with `_`.
/// Used for cache-key derivation over sorted content hashes and other
/// pre-normalized fingerprint components.
pub fn hash_joined<'a, I: IntoIterator<Item = &'a str>>(parts: I) -> String {
    let joined = parts.into_iter().collect::<Vec<_>>().join("_");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hex::encode(hasher.finalize())
}

/// Sanitize a filename/title fragment into a safe identifier component:
/// lowercase alphanumerics and `-`/`_`, everything else collapsed to `_`.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if ch == '-' || ch == '_' {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "doc".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_is_idempotent() {
        let x = "Hello\r\n  World\t\t!  \r\n";
        let once = canonicalize(x);
        let twice = canonicalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn content_hash_ignores_crlf() {
        let a = content_hash("hello world");
        let b = content_hash("hello world\r\n");
        assert_eq!(a, b);
    }

    #[test]
    fn content_hash_is_deterministic() {
        let a = content_hash("The quick brown fox");
        let b = content_hash("The quick brown fox");
        assert_eq!(a, b);
    }

    #[test]
    fn sanitize_collapses_separators() {
        assert_eq!(sanitize("My Report!! v2.md"), "my_report_v2_md");
    }

    #[test]
    fn sanitize_never_empty() {
        assert_eq!(sanitize("!!!"), "doc");
    }
}
