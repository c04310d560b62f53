use sha2::{Digest, Sha256};

pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a presented bearer token against the configured SHA-256 digest.
///
/// The digest comparison runs in constant time so response timing does not
/// leak how much of the digest matched.
pub fn verify_token(raw: &str, expected_hash: &str) -> bool {
    let presented = hash_token(raw);
    let expected = expected_hash.trim().to_ascii_lowercase();
    subtle::ConstantTimeEq::ct_eq(presented.as_bytes(), expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token_deterministic() {
        let hash1 = hash_token("torch-token");
        let hash2 = hash_token("torch-token");

        assert_eq!(hash1, hash2, "hashing same token should produce same result");
        assert_eq!(hash1.len(), 64, "SHA256 hash should be 64 hex chars");
    }

    #[test]
    fn test_hash_token_different_inputs() {
        assert_ne!(hash_token("token_a"), hash_token("token_b"));
    }

    #[test]
    fn test_verify_token_valid() {
        let expected = hash_token("s3cret");
        assert!(verify_token("s3cret", &expected), "matching token should verify");
    }

    #[test]
    fn test_verify_token_accepts_uppercase_digest() {
        let expected = hash_token("s3cret").to_ascii_uppercase();
        assert!(verify_token("s3cret", &expected));
    }

    #[test]
    fn test_verify_token_wrong_token() {
        let expected = hash_token("s3cret");
        assert!(!verify_token("guess", &expected), "wrong token should fail");
    }

    #[test]
    fn test_verify_token_malformed_digest() {
        assert!(!verify_token("s3cret", ""), "empty digest should fail");
        assert!(!verify_token("s3cret", "not-a-digest"), "malformed digest should fail");
    }
}
