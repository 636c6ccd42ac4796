//! Deterministic chunk identity.
//!
//! Every chunk is addressed by a name-based UUID derived from its source
//! document and position. Re-ingesting the same document yields the same IDs,
//! so a retried or repeated upsert overwrites prior vectors instead of
//! duplicating them.

use uuid::Uuid;

/// UUIDv5 of `(source_id, index)` in the URL namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(Uuid);

impl ChunkId {
    #[must_use]
    pub fn derive(source_id: &str, index: usize) -> Self {
        let name = format!("{source_id}: {index}");
        Self(Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()))
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
