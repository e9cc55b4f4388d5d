//! # Content Digests
//!
//! SHA-256 digests over canonical JSON. Two uses:
//!
//! - **Fragment identity.** Schema fragments are cloned into nodes, so
//!   build-scoped caches (normalized schemas, composition metadata) are
//!   keyed by the digest of the fragment's content rather than by address.
//! - **Change detection.** The error pipeline hashes `(schemaPath, params)`
//!   pairs so callers can tell whether a validation pass changed anything
//!   without deep comparison.
//!
//! `sha256_digest()` accepts only `&CanonicalJson`, so every digest in the
//! crate family is computed over key-order-independent text.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalJson;

/// A 32-byte SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The raw digest bytes.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Render the digest as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

/// Compute a SHA-256 digest from canonical JSON.
pub fn sha256_digest(data: &CanonicalJson) -> ContentDigest {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest { bytes }
}

/// Compute a SHA-256 hex string from canonical JSON.
pub fn sha256_hex(data: &CanonicalJson) -> String {
    sha256_digest(data).to_hex()
}

/// Content key for a JSON value, used by build-scoped caches.
///
/// `serde_json::Value` always canonicalizes; the fallback digest of the
/// empty string is unreachable in practice but keeps this infallible.
pub fn fragment_digest(value: &serde_json::Value) -> ContentDigest {
    match CanonicalJson::new(value) {
        Ok(cj) => sha256_digest(&cj),
        Err(_) => {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&Sha256::digest(b""));
            ContentDigest { bytes }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sha256_known_vector() {
        // sha256("{}")
        let cj = CanonicalJson::new(&json!({})).unwrap();
        assert_eq!(
            sha256_hex(&cj),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_fragment_digest_ignores_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"type":"string","minLength":1}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"minLength":1,"type":"string"}"#).unwrap();
        assert_eq!(fragment_digest(&a), fragment_digest(&b));
    }

    #[test]
    fn test_fragment_digest_distinguishes_content() {
        assert_ne!(
            fragment_digest(&json!({"type": "string"})),
            fragment_digest(&json!({"type": "number"}))
        );
    }

    #[test]
    fn test_display_prefix() {
        let d = fragment_digest(&json!(1));
        assert!(d.to_string().starts_with("sha256:"));
        assert_eq!(d.to_hex().len(), 64);
    }
}
