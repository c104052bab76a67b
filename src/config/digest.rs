//! Plan digests.
//!
//! A plan run is identified by the SHA-256 of the plan file it was loaded
//! from. The digest is printed in plan summaries and recorded in run reports.

use sha2::{Digest, Sha256};

/// Number of hex characters shown in short digests.
const SHORT_LEN: usize = 12;

/// SHA-256 digest of a plan file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanDigest(String);

impl PlanDigest {
    /// Computes the digest of raw plan bytes.
    #[must_use]
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Returns the full hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first twelve hex characters.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }
}

impl std::fmt::Display for PlanDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
