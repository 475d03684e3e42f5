use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `input`. Used to store API keys and to
/// build cache-key credential salts without ever persisting the raw secret.
pub fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex_encode(&digest)
}

/// First 32 hex characters (128 bits) of the SHA-256 digest of `input`.
/// Used for short, non-reversible fingerprints in logs and the
/// `x-cache-key-hash` debug header.
pub fn short_fingerprint(input: &str) -> String {
    let full = sha256_hex(input);
    full[..32].to_string()
}

/// admin identity used in audit records: `"token:" + first32hex(sha256(token))`.
pub fn admin_identity(token: &str) -> String {
    format!("token:{}", short_fingerprint(token))
}

/// Constant-time comparison of two strings, used for the admin bearer
/// token check so that response-timing can't leak how many leading bytes
/// matched.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(out, "{byte:02x}").expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_deterministic_and_correct_length() {
        let a = sha256_hex("hello");
        let b = sha256_hex("hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn short_fingerprint_is_prefix_of_full_hash() {
        let full = sha256_hex("some-admin-token");
        let short = short_fingerprint("some-admin-token");
        assert_eq!(short, &full[..32]);
    }

    #[test]
    fn constant_time_eq_matches_standard_equality() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
    }
}
