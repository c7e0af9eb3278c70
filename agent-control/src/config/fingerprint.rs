//! Content identity for rendered collector configurations (`spec.md` §3,
//! `Fingerprint`; §4.1, "fingerprint the rendered bytes").

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A monotonically increasing counter identifying successive `ApplyConfig`
/// attempts, regardless of whether they changed the rendered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl Generation {
    pub const fn initial() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A SHA-256 hex digest over the canonically-serialized rendered
/// configuration bytes. Two renders of the same `UserConfig` produce the
/// same fingerprint regardless of map key order in the source YAML, since
/// rendering always serializes through a `BTreeMap`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_produce_identical_fingerprint() {
        let a = Fingerprint::of(b"receivers:\n  otlp: {}\n");
        let b = Fingerprint::of(b"receivers:\n  otlp: {}\n");
        assert_eq!(a, b);
    }

    #[test]
    fn differing_bytes_produce_differing_fingerprint() {
        let a = Fingerprint::of(b"receivers:\n  otlp: {}\n");
        let b = Fingerprint::of(b"receivers:\n  otlp: {enabled: false}\n");
        assert_ne!(a, b);
    }

    #[test]
    fn generation_increments_monotonically() {
        let g0 = Generation::initial();
        let g1 = g0.next();
        assert!(g1 > g0);
        assert_eq!(g1.0, 1);
    }
}
