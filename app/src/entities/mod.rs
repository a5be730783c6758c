//! Domain entities for every row in the §3 key-pattern table.
//!
//! Each module owns one family of rows: a plain `Serialize`/`Deserialize`
//! struct plus a `key()`/`gsi*()` helper pair built from
//! `questforge_core::store::keys`. Marshaling to/from a store [`Item`] goes
//! through `questforge_core::store::{marshal, unmarshal}` — entities never
//! format a key string themselves.

pub mod collaboration;
pub mod goal;
pub mod guild;
pub mod messaging;
pub mod quest;
pub mod subscription;
pub mod user;
pub mod waitlist;

pub use collaboration::{Collaborator, Comment, Invite, InviteStatus, Reaction};
pub use goal::{Goal, GoalStatus, Task, TaskStatus};
pub use guild::{Guild, GuildActivity, GuildMembership, GuildQuest, GuildQuestCompletion, GuildRole};
pub use messaging::ChatMessage;
pub use quest::{Quest, QuestAuditEntry, QuestKind, QuestStatus};
pub use subscription::{CreditLedgerEntry, Subscription, SubscriptionStatus, Tier};
pub use user::{User, UserStatus};
pub use waitlist::WaitlistEntry;

/// Epoch-millisecond timestamp helper shared by every entity module.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
