use rand::Rng;
use sha2::{Digest, Sha256};

/// Reset tokens are valid for one hour after the request.
pub const RESET_TOKEN_TTL_SECS: i64 = 3600;

/// Generate a cryptographically secure password reset token.
/// Returns (raw_token, token_hash); only the hash is ever persisted, the raw
/// token travels in the emailed link.
pub fn generate_reset_token() -> (String, String) {
    let token_bytes: [u8; 32] = rand::thread_rng().gen();
    let token = hex::encode(token_bytes);
    let token_hash = hash_token(&token);
    (token, token_hash)
}

/// One-way digest used to match a presented token against storage.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_hex_and_hashed() {
        let (token, token_hash) = generate_reset_token();

        // Token should be 64 hex characters (32 bytes * 2)
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

        // Hash should also be 64 hex characters (SHA-256 = 32 bytes * 2)
        assert_eq!(token_hash.len(), 64);
        assert!(token_hash.chars().all(|c| c.is_ascii_hexdigit()));

        assert_ne!(token, token_hash);
        assert_eq!(token_hash, hash_token(&token));
    }

    #[test]
    fn generated_tokens_are_unique() {
        let (token1, hash1) = generate_reset_token();
        let (token2, hash2) = generate_reset_token();

        assert_ne!(token1, token2);
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }
}
