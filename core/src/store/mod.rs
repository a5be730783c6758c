//! Single-table store adapter (C1) and key schema (C2).
//!
//! Every entity in the system is a row in one wide-row key-value store,
//! addressed by a compound `(PK, SK)` primary key plus up to three global
//! secondary index projections (`GSI1`, `GSI2`, `GSI3`). [`StoreClient`]
//! exposes the six operations the rest of the system is built on; `keys`
//! hosts the PK/SK/GSI builders so service code never constructs a key
//! string itself.

mod backoff;
pub mod keys;
pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

pub use backoff::Backoff;

/// A store row. Entities marshal to/from this via `serde_json` — see
/// `keys::marshal`/`keys::unmarshal`.
pub type Item = serde_json::Map<String, JsonValue>;

/// An attribute value, re-exported for callers building `SetOp`/`Condition`
/// values without pulling in `serde_json` directly.
pub type Value = JsonValue;

/// Which comparison to apply to the sort key in a `Query`.
#[derive(Debug, Clone)]
pub enum SkCondition {
    BeginsWith(String),
    Between(String, String),
    Eq(String),
    Gt(String),
    Lt(String),
}

/// A conditional-write expression. `Put`/`Update`/`Delete`/`TransactWrite`
/// all accept an optional condition; when supplied and it does not hold,
/// the operation fails with [`StoreError::Conflict`] (DynamoDB calls this
/// `ConditionalCheckFailedException` / `412 PreconditionFailed` — the spec
/// asks that it be surfaced to clients as `409`, which `core::error::Error`
/// handles by folding both into one `Conflict` variant).
#[derive(Debug, Clone)]
pub enum Condition {
    AttributeNotExists(String),
    AttributeExists(String),
    Equals(String, JsonValue),
    /// Shorthand for the optimistic-lock check every mutating quest/goal
    /// write uses: `version = :prev`.
    VersionEquals(i64),
}

/// What `Put`'s caller supplies as its condition — just an alias kept
/// separate from `Condition` so call sites read `PutCondition::none()` /
/// `Condition::AttributeNotExists(..)` without ambiguity about which ops
/// accept which shape. Identical today; kept distinct because `Put`
/// conditions in the real store may grow put-specific shorthands.
pub type PutCondition = Condition;

/// A single `SET`/`ADD`-style mutation applied by `Update`.
#[derive(Debug, Clone)]
pub enum SetOp {
    Set(String, JsonValue),
    /// Atomic numeric increment (DynamoDB `ADD`). Works on integers only;
    /// the in-memory adapter rejects deltas that would produce a
    /// non-integer or negative-when-unsigned result by returning
    /// `StoreError::Conflict` from the relevant condition instead — the
    /// guard itself (e.g. `balance >= :amount`) is expressed as a separate
    /// `Condition`, not encoded in the increment.
    Increment(String, i64),
}

/// One operation inside a `TransactWrite` batch.
#[derive(Debug, Clone)]
pub enum TransactOp {
    Put {
        pk: String,
        sk: String,
        item: Item,
        condition: Option<Condition>,
    },
    Update {
        pk: String,
        sk: String,
        sets: Vec<SetOp>,
        condition: Option<Condition>,
    },
    Delete {
        pk: String,
        sk: String,
        condition: Option<Condition>,
    },
}

/// Opaque pagination cursor. Implementations may encode whatever they need
/// (last evaluated key, offset) — callers only ever round-trip it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor(pub String);

/// Which key-set a `Query` runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    Primary,
    Gsi1,
    Gsi2,
    Gsi3,
}

/// Input to [`StoreClient::query`].
#[derive(Debug, Clone)]
pub struct QueryInput {
    pub index: Index,
    pub pk: String,
    pub sk: Option<SkCondition>,
    pub limit: usize,
    pub forward: bool,
    pub cursor: Option<Cursor>,
}

impl QueryInput {
    pub fn new(pk: impl Into<String>) -> Self {
        Self {
            index: Index::Primary,
            pk: pk.into(),
            sk: None,
            limit: 50,
            forward: true,
            cursor: None,
        }
    }

    pub fn on_index(mut self, index: Index) -> Self {
        self.index = index;
        self
    }

    pub fn sk_begins_with(mut self, prefix: impl Into<String>) -> Self {
        self.sk = Some(SkCondition::BeginsWith(prefix.into()));
        self
    }

    pub fn sk(mut self, condition: SkCondition) -> Self {
        self.sk = Some(condition);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }

    pub fn cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// Result page from [`StoreClient::query`].
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub items: Vec<Item>,
    pub next_cursor: Option<Cursor>,
}

/// Error kinds surfaced by the store adapter (spec §4.1).
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("throttled")]
    Throttled,
    #[error("transient error: {0}")]
    Transient(String),
    #[error("fatal store error: {0}")]
    Fatal(String),
}

impl StoreError {
    /// `Throttled`/`Transient` are retried by the adapter itself with
    /// backoff; everything else propagates immediately.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Throttled | StoreError::Transient(_))
    }
}

/// Typed operations against one wide-row store with up to three global
/// secondary indexes.
///
/// Implementations MUST apply [`Backoff`] internally on `Throttled` up to a
/// configured cap and propagate every other error kind unchanged — callers
/// never see a raw retry loop.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn put(
        &self,
        pk: &str,
        sk: &str,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<(), StoreError>;

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError>;

    async fn query(&self, input: QueryInput) -> Result<QueryResult, StoreError>;

    async fn update(
        &self,
        pk: &str,
        sk: &str,
        sets: Vec<SetOp>,
        condition: Option<Condition>,
    ) -> Result<Item, StoreError>;

    async fn transact_write(&self, ops: Vec<TransactOp>) -> Result<(), StoreError>;

    async fn delete(
        &self,
        pk: &str,
        sk: &str,
        condition: Option<Condition>,
    ) -> Result<(), StoreError>;
}

/// Marshal a `Serialize` domain entity into a store [`Item`], merging in the
/// primary/secondary key attributes `keys::*` builders computed for it.
pub fn marshal<T: serde::Serialize>(entity: &T, keys: HashMap<&str, String>) -> Item {
    let mut item = match serde_json::to_value(entity) {
        Ok(JsonValue::Object(map)) => map,
        _ => Item::new(),
    };
    for (k, v) in keys {
        item.insert(k.to_string(), JsonValue::String(v));
    }
    item
}

/// Inverse of [`marshal`]: deserialize a store [`Item`] back into a domain
/// entity, ignoring key attributes the entity type doesn't itself model.
pub fn unmarshal<T: serde::de::DeserializeOwned>(item: &Item) -> Result<T, StoreError> {
    serde_json::from_value(JsonValue::Object(item.clone()))
        .map_err(|e| StoreError::Fatal(format!("unmarshal failed: {e}")))
}
