//! Subscription (`USER#<id> / SUBSCRIPTION`) and credit ledger
//! (`USER#<id> / CREDIT#<ts>#<id>`) rows (spec §4.11).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use questforge_core::ids::{CreditEntryId, TypedId, UserId};
use questforge_core::store::{keys, Item};

use super::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Free,
    Initiate,
    Journeyman,
    Sage,
    Guildmaster,
}

impl Tier {
    /// Canonical monthly credit grant per tier (SPEC_FULL §12 Open Question:
    /// the distilled spec left this table unspecified; this is the decided
    /// canonical set, recorded again in DESIGN.md).
    pub fn monthly_credits(self) -> u32 {
        match self {
            Tier::Free => 20,
            Tier::Initiate => 100,
            Tier::Journeyman => 300,
            Tier::Sage => 750,
            Tier::Guildmaster => 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub user_id: TypedId<UserId>,
    pub tier: Tier,
    pub status: SubscriptionStatus,
    pub credit_balance: u32,
    /// External payment-provider subscription/customer id, absent for
    /// founder-pass grants and the default free tier.
    pub provider_subscription_id: Option<String>,
    pub current_period_end: Option<i64>,
    /// Payment-provider webhook event ids already applied, so a redelivered
    /// webhook is a no-op (spec §4.11).
    #[serde(default)]
    pub processed_event_ids: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Subscription {
    pub fn free_tier(user_id: TypedId<UserId>) -> Self {
        let now = now_ms();
        Self {
            entity_type: "Subscription".to_string(),
            credit_balance: Tier::Free.monthly_credits(),
            user_id,
            tier: Tier::Free,
            status: SubscriptionStatus::Active,
            provider_subscription_id: None,
            current_period_end: None,
            processed_event_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_processed(&self, event_id: &str) -> bool {
        self.processed_event_ids.iter().any(|id| id == event_id)
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::subscription(self.user_id.as_str());
        let (gsi1_pk, gsi1_sk) = keys::subscription_gsi1(status_str(self.status), self.user_id.as_str());
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        keys_map.insert("gsi1pk", gsi1_pk);
        keys_map.insert("gsi1sk", gsi1_sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

fn status_str(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::PastDue => "past_due",
        SubscriptionStatus::Cancelled => "cancelled",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditDirection {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditLedgerEntry {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<CreditEntryId>,
    pub user_id: TypedId<UserId>,
    pub direction: CreditDirection,
    pub amount: u32,
    pub reason: String,
    /// Balance immediately after applying this entry, for audit/debugging.
    pub balance_after: u32,
    /// The webhook `event.id` that produced this entry, when one did (spec
    /// §4.11/§8: a replayed `checkout.session.completed` must not duplicate
    /// its credit grant, verifiable by the ledger carrying one entry per
    /// source event).
    pub source_event_id: Option<String>,
    pub created_at: i64,
}

impl CreditLedgerEntry {
    pub fn new(
        user_id: TypedId<UserId>,
        direction: CreditDirection,
        amount: u32,
        reason: String,
        balance_after: u32,
        source_event_id: Option<String>,
    ) -> Self {
        Self {
            entity_type: "CreditLedgerEntry".to_string(),
            id: TypedId::new(),
            user_id,
            direction,
            amount,
            reason,
            balance_after,
            source_event_id,
            created_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::credit_ledger_entry(self.user_id.as_str(), self.created_at, self.id.as_str());
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

/// The four Stripe event types the webhook handler understands (spec
/// §4.11). `type` carries the provider's event-type string verbatim so the
/// handler can deserialize the payload it actually sends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEvent {
    #[serde(rename = "checkout.session.completed")]
    CheckoutSessionCompleted { tier: Tier },
    #[serde(rename = "customer.subscription.updated")]
    CustomerSubscriptionUpdated {
        tier: Tier,
        status: SubscriptionStatus,
        current_period_end: Option<i64>,
    },
    #[serde(rename = "customer.subscription.deleted")]
    CustomerSubscriptionDeleted,
    #[serde(rename = "invoice.payment_failed")]
    InvoicePaymentFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_starts_with_its_monthly_grant() {
        let sub = Subscription::free_tier(TypedId::new());
        assert_eq!(sub.credit_balance, 20);
        assert_eq!(sub.status, SubscriptionStatus::Active);
    }

    #[test]
    fn tier_grants_increase_with_rank() {
        assert!(Tier::Initiate.monthly_credits() > Tier::Free.monthly_credits());
        assert!(Tier::Guildmaster.monthly_credits() > Tier::Sage.monthly_credits());
    }
}
