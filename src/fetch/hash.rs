// Hash computation utilities

use std::fmt;

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Digest algorithms upstreams publish: SHA-1 (Mojang, Maven), SHA-256 (Paper-style APIs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Get the algorithm prefix for formatted output
    pub fn prefix(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
        }
    }
}

/// An expected digest as published by an upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    pub algorithm: HashAlgorithm,
    /// Lowercase hex digest
    pub hex: String,
}

impl Checksum {
    pub fn new(algorithm: HashAlgorithm, hex: impl Into<String>) -> Self {
        Self {
            algorithm,
            hex: hex.into().trim().to_ascii_lowercase(),
        }
    }

    pub fn sha1(hex: impl Into<String>) -> Self {
        Self::new(HashAlgorithm::Sha1, hex)
    }

    pub fn sha256(hex: impl Into<String>) -> Self {
        Self::new(HashAlgorithm::Sha256, hex)
    }

    pub fn matches(&self, actual_hex: &str) -> bool {
        self.hex.eq_ignore_ascii_case(actual_hex)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.prefix(), self.hex)
    }
}

/// Incremental hasher fed chunk by chunk while a download streams.
pub enum StreamHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha1 => StreamHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => StreamHasher::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            StreamHasher::Sha1(h) => h.update(data),
            StreamHasher::Sha256(h) => h.update(data),
        }
    }

    /// Finish and return the lowercase hex digest
    pub fn finalize_hex(self) -> String {
        match self {
            StreamHasher::Sha1(h) => hex::encode(h.finalize()),
            StreamHasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Lowercase hex digest of an in-memory buffer.
pub fn compute_hash(data: &[u8], algorithm: HashAlgorithm) -> String {
    let mut hasher = StreamHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_sha256() {
        let data = b"hello world";
        let hash = compute_hash(data, HashAlgorithm::Sha256);
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_compute_sha1() {
        let hash = compute_hash(b"hello world", HashAlgorithm::Sha1);
        assert_eq!(hash, "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    }

    #[test]
    fn test_checksum_normalizes_case() {
        let checksum = Checksum::sha1("2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED");
        assert!(checksum.matches("2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"));
        assert_eq!(
            checksum.to_string(),
            "sha1:2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }
}
