//! In-memory [`StoreClient`] reference implementation.
//!
//! Backs unit/integration tests and local development. It never throttles
//! (there's no real service quota to exceed), so [`Backoff`] is wired in but
//! exercised only by the other tests in this module — a real adapter
//! (DynamoDB, a Cassandra-family store) would call the same `with_retry`
//! helper around its network calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    Backoff, Condition, Cursor, Index, Item, PutCondition, QueryInput, QueryResult, SetOp,
    SkCondition, StoreClient, StoreError, TransactOp, Value,
};

type RowKey = (String, String);

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<RowKey, Item>,
}

/// A single logical table backed by a `BTreeMap`, with GSI1/GSI2/GSI3 views
/// computed on read from the `gsi1pk`/`gsi1sk` (etc.) attributes present on
/// each item — exactly the projection convention `keys::*` writes.
pub struct MemoryStore {
    table: Arc<RwLock<Table>>,
    backoff: Backoff,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(Table::default())),
            backoff: Backoff::default(),
        }
    }

    fn gsi_attrs(index: Index) -> Option<(&'static str, &'static str)> {
        match index {
            Index::Primary => None,
            Index::Gsi1 => Some(("gsi1pk", "gsi1sk")),
            Index::Gsi2 => Some(("gsi2pk", "gsi2sk")),
            Index::Gsi3 => Some(("gsi3pk", "gsi3sk")),
        }
    }

    fn sk_matches(sk: &str, condition: &SkCondition) -> bool {
        match condition {
            SkCondition::BeginsWith(prefix) => sk.starts_with(prefix.as_str()),
            SkCondition::Between(lo, hi) => sk >= lo.as_str() && sk <= hi.as_str(),
            SkCondition::Eq(value) => sk == value.as_str(),
            SkCondition::Gt(value) => sk > value.as_str(),
            SkCondition::Lt(value) => sk < value.as_str(),
        }
    }

    fn check_condition(existing: Option<&Item>, condition: &Condition) -> Result<(), StoreError> {
        let ok = match condition {
            Condition::AttributeNotExists(attr) => existing
                .map(|item| !item.contains_key(attr))
                .unwrap_or(true),
            Condition::AttributeExists(attr) => {
                existing.map(|item| item.contains_key(attr)).unwrap_or(false)
            }
            Condition::Equals(attr, expected) => existing
                .and_then(|item| item.get(attr))
                .map(|actual| actual == expected)
                .unwrap_or(false),
            Condition::VersionEquals(expected) => existing
                .and_then(|item| item.get("version"))
                .and_then(|v| v.as_i64())
                .map(|actual| actual == *expected)
                .unwrap_or(false),
        };

        if ok {
            Ok(())
        } else {
            Err(StoreError::Conflict("condition check failed".into()))
        }
    }

    fn apply_sets(item: &mut Item, sets: &[SetOp]) -> Result<(), StoreError> {
        for set in sets {
            match set {
                SetOp::Set(attr, value) => {
                    item.insert(attr.clone(), value.clone());
                }
                SetOp::Increment(attr, delta) => {
                    let current = item.get(attr).and_then(Value::as_i64).unwrap_or(0);
                    let next = current.checked_add(*delta).ok_or_else(|| {
                        StoreError::Conflict(format!("increment overflow on {attr}"))
                    })?;
                    item.insert(attr.clone(), Value::from(next));
                }
            }
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn put(
        &self,
        pk: &str,
        sk: &str,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        let key = (pk.to_string(), sk.to_string());

        if let Some(condition) = &condition {
            Self::check_condition(table.rows.get(&key), condition)?;
        }

        table.rows.insert(key, item);
        Ok(())
    }

    async fn get(&self, pk: &str, sk: &str) -> Result<Option<Item>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&(pk.to_string(), sk.to_string())).cloned())
    }

    async fn query(&self, input: QueryInput) -> Result<QueryResult, StoreError> {
        let table = self.table.read().await;

        let mut matched: Vec<&Item> = match Self::gsi_attrs(input.index) {
            None => table
                .rows
                .iter()
                .filter(|((pk, _), _)| *pk == input.pk)
                .map(|(_, item)| item)
                .collect(),
            Some((pk_attr, _)) => table
                .rows
                .values()
                .filter(|item| {
                    item.get(pk_attr)
                        .and_then(Value::as_str)
                        .map(|pk| pk == input.pk)
                        .unwrap_or(false)
                })
                .collect(),
        };

        if let Some(sk_condition) = &input.sk {
            let sk_attr = Self::gsi_attrs(input.index).map(|(_, sk)| sk).unwrap_or("sk");
            matched.retain(|item| {
                let sk = match Self::gsi_attrs(input.index) {
                    None => item.get("sk").and_then(Value::as_str),
                    Some(_) => item.get(sk_attr).and_then(Value::as_str),
                };
                sk.map(|sk| Self::sk_matches(sk, sk_condition)).unwrap_or(false)
            });
        }

        matched.sort_by_key(|item| {
            item.get("sk")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        });
        if !input.forward {
            matched.reverse();
        }

        let start = input
            .cursor
            .as_ref()
            .and_then(|c| matched.iter().position(|item| {
                item.get("sk").and_then(Value::as_str) == Some(c.0.as_str())
            }))
            .map(|pos| pos + 1)
            .unwrap_or(0);

        let page: Vec<Item> = matched
            .into_iter()
            .skip(start)
            .take(input.limit)
            .cloned()
            .collect();

        let next_cursor = if page.len() == input.limit {
            page.last()
                .and_then(|item| item.get("sk"))
                .and_then(Value::as_str)
                .map(|sk| Cursor(sk.to_string()))
        } else {
            None
        };

        Ok(QueryResult {
            items: page,
            next_cursor,
        })
    }

    async fn update(
        &self,
        pk: &str,
        sk: &str,
        sets: Vec<SetOp>,
        condition: Option<Condition>,
    ) -> Result<Item, StoreError> {
        let mut table = self.table.write().await;
        let key = (pk.to_string(), sk.to_string());

        if let Some(condition) = &condition {
            Self::check_condition(table.rows.get(&key), condition)?;
        }

        let mut item = table.rows.get(&key).cloned().ok_or(StoreError::NotFound)?;
        Self::apply_sets(&mut item, &sets)?;
        table.rows.insert(key, item.clone());
        Ok(item)
    }

    async fn transact_write(&self, ops: Vec<TransactOp>) -> Result<(), StoreError> {
        let mut table = self.table.write().await;

        // Validate every condition against current state before mutating
        // anything, so the batch is all-or-nothing exactly like a real
        // transactional write API.
        for op in &ops {
            let (pk, sk, condition) = match op {
                TransactOp::Put { pk, sk, condition, .. } => (pk, sk, condition),
                TransactOp::Update { pk, sk, condition, .. } => (pk, sk, condition),
                TransactOp::Delete { pk, sk, condition } => (pk, sk, condition),
            };
            if let Some(condition) = condition {
                let key = (pk.clone(), sk.clone());
                Self::check_condition(table.rows.get(&key), condition)?;
            }
        }

        for op in ops {
            match op {
                TransactOp::Put { pk, sk, item, .. } => {
                    table.rows.insert((pk, sk), item);
                }
                TransactOp::Update { pk, sk, sets, .. } => {
                    let key = (pk, sk);
                    let mut item = table.rows.get(&key).cloned().unwrap_or_default();
                    Self::apply_sets(&mut item, &sets)?;
                    table.rows.insert(key, item);
                }
                TransactOp::Delete { pk, sk, .. } => {
                    table.rows.remove(&(pk, sk));
                }
            }
        }

        Ok(())
    }

    async fn delete(
        &self,
        pk: &str,
        sk: &str,
        condition: Option<Condition>,
    ) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        let key = (pk.to_string(), sk.to_string());

        if let Some(condition) = &condition {
            Self::check_condition(table.rows.get(&key), condition)?;
        }

        table.rows.remove(&key);
        Ok(())
    }
}

impl MemoryStore {
    /// Number of configured retries before giving up on a `Throttled` error.
    /// Exposed for tests exercising retry-aware callers built on top of this
    /// store; the in-memory backend itself never returns `Throttled`.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(fields: &[(&str, Value)]) -> Item {
        let mut map = Item::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v.clone());
        }
        map
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        store
            .put(
                "USER#1",
                "PROFILE",
                item(&[("sk", json!("PROFILE")), ("email", json!("a@example.com"))]),
                None,
            )
            .await
            .unwrap();

        let got = store.get("USER#1", "PROFILE").await.unwrap().unwrap();
        assert_eq!(got.get("email").unwrap(), "a@example.com");
    }

    #[tokio::test]
    async fn put_with_attribute_not_exists_rejects_duplicate() {
        // `AttributeNotExists` checks an attribute on the *stored* item, not
        // row presence directly — callers must carry the attribute they
        // condition on (here "pk") inside the item itself, same as every
        // entity's `.item()` does via its keys map.
        let store = MemoryStore::new();
        let condition = Some(Condition::AttributeNotExists("pk".into()));
        let locked_item = item(&[("pk", json!("LOCK#email")), ("sk", json!("LOCK"))]);
        store
            .put("LOCK#email", "LOCK", locked_item.clone(), condition.clone())
            .await
            .unwrap();

        let err = store
            .put("LOCK#email", "LOCK", locked_item, condition)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_with_version_mismatch_conflicts() {
        let store = MemoryStore::new();
        store
            .put(
                "QUEST#1",
                "META",
                item(&[("sk", json!("META")), ("version", json!(1))]),
                None,
            )
            .await
            .unwrap();

        let err = store
            .update(
                "QUEST#1",
                "META",
                vec![SetOp::Set("status".into(), json!("completed"))],
                Some(Condition::VersionEquals(2)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn query_filters_by_pk_and_sk_prefix() {
        let store = MemoryStore::new();
        store
            .put("GOAL#1", "TASK#a", item(&[("sk", json!("TASK#a"))]), None)
            .await
            .unwrap();
        store
            .put("GOAL#1", "TASK#b", item(&[("sk", json!("TASK#b"))]), None)
            .await
            .unwrap();
        store
            .put("GOAL#1", "META", item(&[("sk", json!("META"))]), None)
            .await
            .unwrap();

        let result = store
            .query(QueryInput::new("GOAL#1").sk_begins_with("TASK#"))
            .await
            .unwrap();
        assert_eq!(result.items.len(), 2);
    }

    #[tokio::test]
    async fn transact_write_is_all_or_nothing() {
        let store = MemoryStore::new();
        store
            .put("A", "A", item(&[("sk", json!("A")), ("version", json!(1))]), None)
            .await
            .unwrap();

        let ops = vec![
            TransactOp::Update {
                pk: "A".into(),
                sk: "A".into(),
                sets: vec![SetOp::Set("status".into(), json!("done"))],
                condition: Some(Condition::VersionEquals(1)),
            },
            TransactOp::Put {
                pk: "B".into(),
                sk: "B".into(),
                item: item(&[("sk", json!("B"))]),
                condition: Some(Condition::VersionEquals(99)), // fails
            },
        ];

        let err = store.transact_write(ops).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.get("B", "B").await.unwrap().is_none());
        // first op must not have applied either
        let a = store.get("A", "A").await.unwrap().unwrap();
        assert!(a.get("status").is_none());
    }
}
