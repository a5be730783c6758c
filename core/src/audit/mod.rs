//! BLAKE3 hash-chained audit trail
//!
//! A small, storage-agnostic utility for giving any append-only row sequence
//! (quest state transitions, guild activity feeds) a tamper-evident chain:
//! each entry's hash covers its own content plus the previous entry's hash,
//! so editing or dropping a past entry invalidates every hash after it.

mod chain;

pub use chain::{verify_chain, AuditChain, ChainVerificationError, ChainedEntry};
