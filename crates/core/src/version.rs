//! Optimistic concurrency for stored documents.

/// A document whose writes bump a monotonically increasing version.
pub trait Versioned {
    fn version(&self) -> u64;

    /// Called by stores when a write is committed.
    fn set_version(&mut self, version: u64);
}

/// Optimistic concurrency expectation for a document write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (privileged overwrites, migrations).
    Any,
    /// The document must not exist yet.
    Absent,
    /// Require the stored document to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: Option<u64>) -> bool {
        match (self, actual) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::Absent, None) => true,
            (ExpectedVersion::Absent, Some(_)) => false,
            (ExpectedVersion::Exact(v), Some(a)) => v == a,
            (ExpectedVersion::Exact(_), None) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_requires_same_version() {
        assert!(ExpectedVersion::Exact(3).matches(Some(3)));
        assert!(!ExpectedVersion::Exact(3).matches(Some(4)));
        assert!(!ExpectedVersion::Exact(0).matches(None));
    }

    #[test]
    fn absent_rejects_existing_documents() {
        assert!(ExpectedVersion::Absent.matches(None));
        assert!(!ExpectedVersion::Absent.matches(Some(1)));
        assert!(ExpectedVersion::Any.matches(Some(42)));
    }
}
