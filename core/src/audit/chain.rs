//! Generic BLAKE3 hash chain
//!
//! `AuditChain` is intentionally not `Send`/`Sync` by convention of use: it
//! should be owned exclusively by whatever serializes writes for a single
//! chain (one quest, one guild's activity feed) — hash chains only make
//! sense under single-writer sequencing, which the store's per-row
//! optimistic version counter already gives each quest.

use blake3::Hasher;

/// An append-only entry that can participate in a hash chain.
///
/// Implementors expose the fields `AuditChain` needs to seal them
/// (`sequence`, `previous_hash`, `hash`) and a stable byte representation
/// of their own content (`content_bytes`) for hashing. `content_bytes`
/// MUST NOT include `hash` itself, and should be deterministic.
pub trait ChainedEntry {
    /// Bytes that uniquely represent this entry's content, for hashing.
    fn content_bytes(&self) -> Vec<u8>;
    fn sequence(&self) -> u64;
    fn set_sequence(&mut self, sequence: u64);
    fn previous_hash(&self) -> Option<&str>;
    fn set_previous_hash(&mut self, previous_hash: Option<String>);
    fn hash(&self) -> Option<&str>;
    fn set_hash(&mut self, hash: String);
}

/// Running hash-chain state: the previous entry's hash plus the next
/// sequence number to assign.
#[derive(Debug, Clone)]
pub struct AuditChain {
    previous_hash: Option<String>,
    sequence: u64,
}

impl AuditChain {
    /// Start a new chain at genesis (no previous hash, sequence 0).
    pub fn new() -> Self {
        Self {
            previous_hash: None,
            sequence: 0,
        }
    }

    /// Resume a chain from its last known tip, e.g. after reloading the
    /// most recent row from the store on process restart.
    pub fn resume(previous_hash: String, sequence: u64) -> Self {
        Self {
            previous_hash: Some(previous_hash),
            sequence,
        }
    }

    /// Current sequence number (the last one assigned, 0 if none yet).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Current chain tip hash, if any entries have been sealed.
    pub fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    /// Seal an entry: assign it the next sequence number, link it to the
    /// chain's current tip, compute its BLAKE3 hash, and advance the tip.
    pub fn seal<T: ChainedEntry>(&mut self, mut entry: T) -> T {
        self.sequence += 1;
        entry.set_sequence(self.sequence);
        entry.set_previous_hash(self.previous_hash.clone());

        let hash = Self::compute_hash(&entry);
        entry.set_hash(hash.clone());
        self.previous_hash = Some(hash);

        entry
    }

    fn compute_hash<T: ChainedEntry>(entry: &T) -> String {
        let mut hasher = Hasher::new();
        hasher.update(entry.sequence().to_le_bytes().as_ref());
        if let Some(prev) = entry.previous_hash() {
            hasher.update(prev.as_bytes());
        }
        hasher.update(&entry.content_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

impl Default for AuditChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Error returned when chain verification detects a broken or tampered link.
#[derive(Debug)]
pub struct ChainVerificationError {
    pub sequence: u64,
    pub expected_previous_hash: Option<String>,
    pub actual_previous_hash: Option<String>,
}

impl std::fmt::Display for ChainVerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "audit chain broken at sequence {}: expected previous_hash {:?}, got {:?}",
            self.sequence, self.expected_previous_hash, self.actual_previous_hash
        )
    }
}

impl std::error::Error for ChainVerificationError {}

/// Recompute and check every hash in a sequence of entries (already in
/// sequence order). Returns the first broken link found, if any.
pub fn verify_chain<T: ChainedEntry>(entries: &[T]) -> Result<(), ChainVerificationError> {
    let mut expected_prev: Option<String> = None;

    for entry in entries {
        if entry.previous_hash() != expected_prev.as_deref() {
            return Err(ChainVerificationError {
                sequence: entry.sequence(),
                expected_previous_hash: expected_prev,
                actual_previous_hash: entry.previous_hash().map(str::to_string),
            });
        }

        let recomputed = AuditChain::compute_hash(entry);
        if entry.hash() != Some(recomputed.as_str()) {
            return Err(ChainVerificationError {
                sequence: entry.sequence(),
                expected_previous_hash: expected_prev,
                actual_previous_hash: entry.previous_hash().map(str::to_string),
            });
        }

        expected_prev = entry.hash().map(str::to_string);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct TestEntry {
        body: String,
        sequence: u64,
        previous_hash: Option<String>,
        hash: Option<String>,
    }

    impl ChainedEntry for TestEntry {
        fn content_bytes(&self) -> Vec<u8> {
            self.body.as_bytes().to_vec()
        }
        fn sequence(&self) -> u64 {
            self.sequence
        }
        fn set_sequence(&mut self, sequence: u64) {
            self.sequence = sequence;
        }
        fn previous_hash(&self) -> Option<&str> {
            self.previous_hash.as_deref()
        }
        fn set_previous_hash(&mut self, previous_hash: Option<String>) {
            self.previous_hash = previous_hash;
        }
        fn hash(&self) -> Option<&str> {
            self.hash.as_deref()
        }
        fn set_hash(&mut self, hash: String) {
            self.hash = Some(hash);
        }
    }

    fn entry(body: &str) -> TestEntry {
        TestEntry {
            body: body.to_string(),
            sequence: 0,
            previous_hash: None,
            hash: None,
        }
    }

    #[test]
    fn seals_with_strictly_increasing_sequence() {
        let mut chain = AuditChain::new();
        let a = chain.seal(entry("draft->active"));
        let b = chain.seal(entry("active->completed"));
        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(b.previous_hash.as_deref(), a.hash.as_deref());
    }

    #[test]
    fn verify_chain_detects_tamper() {
        let mut chain = AuditChain::new();
        let a = chain.seal(entry("draft->active"));
        let mut b = chain.seal(entry("active->completed"));
        assert!(verify_chain(&[a.clone(), b.clone()]).is_ok());

        b.body = "active->failed".to_string(); // tamper after sealing
        assert!(verify_chain(&[a, b]).is_err());
    }

    #[test]
    fn resume_continues_sequence_and_links_tip() {
        let mut chain = AuditChain::new();
        let a = chain.seal(entry("draft->active"));

        let mut resumed = AuditChain::resume(a.hash.clone().unwrap(), a.sequence);
        let b = resumed.seal(entry("active->completed"));
        assert_eq!(b.sequence, 2);
        assert_eq!(b.previous_hash.as_deref(), a.hash.as_deref());
    }
}
