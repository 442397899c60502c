//! Employee password digests.
//!
//! Stored passwords are the lowercase hex MD5 of the UTF-8 plaintext, which
//! is what existing employee rows hold.

use md5::{Digest, Md5};

/// Password assigned to employees created from the console.
pub const DEFAULT_PASSWORD: &str = "123456";

pub fn hash_password(plain: &str) -> String {
    hex::encode(Md5::digest(plain.as_bytes()))
}

pub fn verify_password(plain: &str, stored: &str) -> bool {
    hash_password(plain).eq_ignore_ascii_case(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_password_digest() {
        assert_eq!(
            hash_password(DEFAULT_PASSWORD),
            "e10adc3949ba59abbe56e057f20f883e"
        );
    }

    #[test]
    fn test_verify_password() {
        let stored = hash_password("s3cret");
        assert!(verify_password("s3cret", &stored));
        assert!(verify_password("s3cret", &stored.to_uppercase()));
        assert!(!verify_password("S3cret", &stored));
    }
}
