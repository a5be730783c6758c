//! Waitlist Service: pre-launch email capture, gated by per-IP rate limiting
//! at the handler layer (spec §6, §8: 5/min/IP on `/waitlist/subscribe`).

use std::sync::Arc;

use questforge_core::store::{keys, Condition, StoreClient};
use questforge_core::error::Result;

use crate::entities::waitlist::WaitlistEntry;

pub struct WaitlistService {
    store: Arc<dyn StoreClient>,
}

impl WaitlistService {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }

    /// First-write-wins: a repeat subscribe for the same email is a no-op,
    /// not an error — callers never need to distinguish new from existing.
    pub async fn subscribe(&self, email: String) -> Result<WaitlistEntry> {
        let entry = WaitlistEntry::new(email.clone());
        let (pk, sk) = keys::waitlist_entry(&email);
        match self
            .store
            .put(&pk, &sk, entry.item(), Some(Condition::AttributeNotExists("pk".to_string())))
            .await
        {
            Ok(()) => Ok(entry),
            Err(questforge_core::store::StoreError::Conflict(_)) => Ok(entry),
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questforge_core::store::memory::MemoryStore;

    fn service() -> WaitlistService {
        WaitlistService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn subscribe_stores_an_entry() {
        let svc = service();
        let entry = svc.subscribe("ada@example.com".into()).await.unwrap();
        assert_eq!(entry.email, "ada@example.com");
    }

    #[tokio::test]
    async fn repeat_subscribe_is_a_no_op_not_an_error() {
        let svc = service();
        svc.subscribe("ada@example.com".into()).await.unwrap();
        let second = svc.subscribe("ada@example.com".into()).await;
        assert!(second.is_ok());
    }
}
