//! Subscription Service (C11): tier management, mock checkout, idempotent
//! webhook application, and the credit ledger.

use std::sync::Arc;

use questforge_core::config::FounderPassConfig;
use questforge_core::error::{Error, Result};
use questforge_core::ids::{TypedId, UserId};
use questforge_core::store::{keys, Condition, SetOp, StoreClient, TransactOp};

use crate::entities::now_ms;
use crate::entities::subscription::{
    CreditDirection, CreditLedgerEntry, Subscription, SubscriptionStatus, Tier, WebhookEvent,
};
use crate::payment::{CheckoutSession, PaymentGateway};

pub struct SubscriptionService {
    store: Arc<dyn StoreClient>,
    gateway: Arc<dyn PaymentGateway>,
    founder_pass: FounderPassConfig,
}

impl SubscriptionService {
    pub fn new(store: Arc<dyn StoreClient>, gateway: Arc<dyn PaymentGateway>, founder_pass: FounderPassConfig) -> Self {
        Self { store, gateway, founder_pass }
    }

    /// Creates the free-tier row on first access; idempotent under races via
    /// `AttributeNotExists`, falling back to a re-read on conflict.
    pub async fn get_or_create(&self, user_id: TypedId<UserId>) -> Result<Subscription> {
        if let Some(existing) = self.fetch(user_id.as_str()).await? {
            return Ok(existing);
        }
        let subscription = Subscription::free_tier(user_id.clone());
        let (pk, sk) = keys::subscription(user_id.as_str());
        match self
            .store
            .put(&pk, &sk, subscription.item(), Some(Condition::AttributeNotExists("pk".to_string())))
            .await
        {
            Ok(()) => Ok(subscription),
            Err(questforge_core::store::StoreError::Conflict(_)) => self
                .fetch(user_id.as_str())
                .await?
                .ok_or_else(|| Error::Internal("subscription disappeared after conflict".into())),
            Err(other) => Err(other.into()),
        }
    }

    /// Lifetime `GUILDMASTER` grant for allow-listed founders (spec §4.11),
    /// applied on signup/login rather than through checkout.
    pub async fn apply_founder_pass_if_eligible(&self, user_id: TypedId<UserId>, email: &str) -> Result<Subscription> {
        let subscription = self.get_or_create(user_id.clone()).await?;
        if subscription.tier == Tier::Guildmaster || !self.founder_pass.grants_founder_pass(user_id.as_str(), email) {
            return Ok(subscription);
        }

        let (pk, sk) = keys::subscription(user_id.as_str());
        let item = self
            .store
            .update(
                &pk,
                &sk,
                vec![
                    SetOp::Set("tier".to_string(), serde_json::json!("GUILDMASTER")),
                    SetOp::Set("status".to_string(), serde_json::json!("active")),
                    SetOp::Set("current_period_end".to_string(), serde_json::Value::Null),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                Some(Condition::AttributeExists("pk".to_string())),
            )
            .await?;
        questforge_core::store::unmarshal(&item)
    }

    pub async fn create_checkout_session(&self, user_id: &str, tier: Tier) -> Result<CheckoutSession> {
        self.gateway.create_checkout_session(user_id, tier_str(tier)).await
    }

    /// Applies a provider webhook event idempotently: a redelivered
    /// `event_id` is a no-op, matched against `processed_event_ids`
    /// (spec §4.11, §8). `checkout.session.completed` also appends exactly
    /// one credit-ledger entry tagged with the source event id, in the same
    /// transaction as the subscription-row update — a replay short-circuits
    /// on `has_processed` before either write happens, so it can't double
    /// grant credits.
    pub async fn handle_webhook(&self, user_id: &str, event_id: String, event: WebhookEvent) -> Result<Subscription> {
        let subscription = self
            .fetch(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("subscription not found".into()))?;
        if subscription.has_processed(&event_id) {
            return Ok(subscription);
        }

        let mut processed = subscription.processed_event_ids.clone();
        processed.push(event_id.clone());

        let mut sets = vec![
            SetOp::Set("processed_event_ids".to_string(), serde_json::json!(processed)),
            SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
        ];
        let mut ops = Vec::new();

        match &event {
            WebhookEvent::CheckoutSessionCompleted { tier } => {
                let amount = tier.monthly_credits();
                let balance_after = subscription.credit_balance + amount;
                sets.push(SetOp::Set("tier".to_string(), serde_json::json!(tier_str(*tier))));
                sets.push(SetOp::Set(
                    "status".to_string(),
                    serde_json::json!(status_str(SubscriptionStatus::Active)),
                ));
                sets.push(SetOp::Set("credit_balance".to_string(), serde_json::json!(balance_after)));

                let entry = CreditLedgerEntry::new(
                    subscription.user_id.clone(),
                    CreditDirection::Credit,
                    amount,
                    format!("{} tier checkout", tier_str(*tier)),
                    balance_after,
                    Some(event_id.clone()),
                );
                let (entry_pk, entry_sk) =
                    keys::credit_ledger_entry(user_id, entry.created_at, entry.id.as_str());
                ops.push(TransactOp::Put {
                    pk: entry_pk,
                    sk: entry_sk,
                    item: entry.item(),
                    condition: None,
                });
            }
            WebhookEvent::CustomerSubscriptionUpdated { tier, status, current_period_end } => {
                sets.push(SetOp::Set("tier".to_string(), serde_json::json!(tier_str(*tier))));
                sets.push(SetOp::Set("status".to_string(), serde_json::json!(status_str(*status))));
                sets.push(SetOp::Set(
                    "current_period_end".to_string(),
                    serde_json::json!(current_period_end),
                ));
            }
            WebhookEvent::CustomerSubscriptionDeleted => {
                sets.push(SetOp::Set(
                    "status".to_string(),
                    serde_json::json!(status_str(SubscriptionStatus::Cancelled)),
                ));
            }
            WebhookEvent::InvoicePaymentFailed => {
                sets.push(SetOp::Set(
                    "status".to_string(),
                    serde_json::json!(status_str(SubscriptionStatus::PastDue)),
                ));
            }
        }

        let (sub_pk, sub_sk) = keys::subscription(user_id);
        ops.insert(
            0,
            TransactOp::Update {
                pk: sub_pk,
                sk: sub_sk,
                sets,
                condition: Some(Condition::AttributeExists("pk".to_string())),
            },
        );

        self.store.transact_write(ops).await?;
        self.fetch(user_id)
            .await?
            .ok_or_else(|| Error::Internal("subscription disappeared after webhook update".into()))
    }

    /// Atomic credit grant: `Increment` on the balance plus a ledger row in
    /// one transaction.
    pub async fn credit(&self, user_id: &str, amount: u32, reason: String) -> Result<()> {
        let subscription = self
            .fetch(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("subscription not found".into()))?;
        let balance_after = subscription.credit_balance + amount;
        let entry = CreditLedgerEntry::new(
            subscription.user_id,
            CreditDirection::Credit,
            amount,
            reason,
            balance_after,
            None,
        );
        let (sub_pk, sub_sk) = keys::subscription(user_id);
        let (entry_pk, entry_sk) = keys::credit_ledger_entry(user_id, entry.created_at, entry.id.as_str());

        let ops = vec![
            TransactOp::Update {
                pk: sub_pk,
                sk: sub_sk,
                sets: vec![
                    SetOp::Increment("credit_balance".to_string(), i64::from(amount)),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                condition: None,
            },
            TransactOp::Put { pk: entry_pk, sk: entry_sk, item: entry.item(), condition: None },
        ];
        self.store.transact_write(ops).await?;
        Ok(())
    }

    /// Conditioned debit: fails with `Error::validation` if the balance
    /// can't cover `amount`; retries once against a fresh read on a
    /// concurrent-write conflict, matching the quest version-CAS pattern.
    pub async fn debit(&self, user_id: &str, amount: u32, reason: String) -> Result<()> {
        match self.try_debit(user_id, amount, reason.clone()).await {
            Err(Error::Conflict(_)) => self.try_debit(user_id, amount, reason).await,
            other => other,
        }
    }

    async fn try_debit(&self, user_id: &str, amount: u32, reason: String) -> Result<()> {
        let subscription = self
            .fetch(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("subscription not found".into()))?;
        if subscription.credit_balance < amount {
            return Err(Error::validation("insufficient credit balance"));
        }
        let balance_after = subscription.credit_balance - amount;
        let entry = CreditLedgerEntry::new(
            subscription.user_id,
            CreditDirection::Debit,
            amount,
            reason,
            balance_after,
            None,
        );
        let (sub_pk, sub_sk) = keys::subscription(user_id);
        let (entry_pk, entry_sk) = keys::credit_ledger_entry(user_id, entry.created_at, entry.id.as_str());

        let ops = vec![
            TransactOp::Update {
                pk: sub_pk,
                sk: sub_sk,
                sets: vec![
                    SetOp::Set("credit_balance".to_string(), serde_json::json!(balance_after)),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                condition: Some(Condition::Equals(
                    "credit_balance".to_string(),
                    serde_json::json!(subscription.credit_balance),
                )),
            },
            TransactOp::Put { pk: entry_pk, sk: entry_sk, item: entry.item(), condition: None },
        ];
        self.store.transact_write(ops).await.map_err(|e| match e {
            questforge_core::store::StoreError::Conflict(msg) => Error::Conflict(msg),
            other => other.into(),
        })?;
        Ok(())
    }

    async fn fetch(&self, user_id: &str) -> Result<Option<Subscription>> {
        let (pk, sk) = keys::subscription(user_id);
        match self.store.get(&pk, &sk).await? {
            Some(item) => Ok(Some(questforge_core::store::unmarshal(&item)?)),
            None => Ok(None),
        }
    }
}

fn tier_str(tier: Tier) -> &'static str {
    match tier {
        Tier::Free => "FREE",
        Tier::Initiate => "INITIATE",
        Tier::Journeyman => "JOURNEYMAN",
        Tier::Sage => "SAGE",
        Tier::Guildmaster => "GUILDMASTER",
    }
}

fn status_str(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::PastDue => "past_due",
        SubscriptionStatus::Cancelled => "cancelled",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questforge_core::config::PaymentConfig;
    use questforge_core::store::memory::MemoryStore;
    use questforge_core::store::QueryInput;

    fn service() -> SubscriptionService {
        let gateway: Arc<dyn PaymentGateway> = Arc::new(crate::payment::MockGateway::new(&PaymentConfig::default()));
        SubscriptionService::new(Arc::new(MemoryStore::new()), gateway, FounderPassConfig::default())
    }

    #[tokio::test]
    async fn first_access_creates_free_tier() {
        let svc = service();
        let user_id: TypedId<UserId> = TypedId::new();
        let sub = svc.get_or_create(user_id).await.unwrap();
        assert_eq!(sub.tier, Tier::Free);
        assert_eq!(sub.credit_balance, 20);
    }

    #[tokio::test]
    async fn webhook_redelivery_is_a_no_op() {
        let svc = service();
        let user_id: TypedId<UserId> = TypedId::new();
        svc.get_or_create(user_id.clone()).await.unwrap();

        let first = svc
            .handle_webhook(
                user_id.as_str(),
                "evt_1".into(),
                WebhookEvent::CustomerSubscriptionUpdated {
                    tier: Tier::Sage,
                    status: SubscriptionStatus::Active,
                    current_period_end: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(first.tier, Tier::Sage);

        svc.credit(user_id.as_str(), 100, "test bonus".into()).await.unwrap();
        let balance_before_replay = svc.fetch(user_id.as_str()).await.unwrap().unwrap().credit_balance;

        let replayed = svc
            .handle_webhook(
                user_id.as_str(),
                "evt_1".into(),
                WebhookEvent::CustomerSubscriptionUpdated {
                    tier: Tier::Guildmaster,
                    status: SubscriptionStatus::Active,
                    current_period_end: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(replayed.tier, Tier::Sage);
        assert_eq!(replayed.credit_balance, balance_before_replay);
    }

    #[tokio::test]
    async fn checkout_completed_grants_one_credit_entry_even_on_replay() {
        let svc = service();
        let user_id: TypedId<UserId> = TypedId::new();
        svc.get_or_create(user_id.clone()).await.unwrap();

        for _ in 0..2 {
            svc.handle_webhook(
                user_id.as_str(),
                "evt_1".into(),
                WebhookEvent::CheckoutSessionCompleted { tier: Tier::Initiate },
            )
            .await
            .unwrap();
        }

        let sub = svc.fetch(user_id.as_str()).await.unwrap().unwrap();
        assert_eq!(sub.tier, Tier::Initiate);
        assert_eq!(sub.credit_balance, Tier::Free.monthly_credits() + Tier::Initiate.monthly_credits());

        let pk = keys::user_pk(user_id.as_str());
        let ledger = svc
            .store
            .query(QueryInput::new(pk).sk_begins_with("CREDIT#"))
            .await
            .unwrap();
        assert_eq!(ledger.items.len(), 1);
    }

    #[tokio::test]
    async fn debit_rejects_insufficient_balance() {
        let svc = service();
        let user_id: TypedId<UserId> = TypedId::new();
        svc.get_or_create(user_id.clone()).await.unwrap();
        let err = svc.debit(user_id.as_str(), 1000, "too much".into()).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn credit_then_debit_nets_balance() {
        let svc = service();
        let user_id: TypedId<UserId> = TypedId::new();
        svc.get_or_create(user_id.clone()).await.unwrap();
        svc.credit(user_id.as_str(), 50, "bonus".into()).await.unwrap();
        svc.debit(user_id.as_str(), 30, "spend".into()).await.unwrap();
        let sub = svc.fetch(user_id.as_str()).await.unwrap().unwrap();
        assert_eq!(sub.credit_balance, 40);
    }
}
