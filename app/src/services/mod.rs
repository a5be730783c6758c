//! Domain services: one module per [MODULE] in the data model, each a thin
//! layer over `questforge_core::store::StoreClient` plus whatever C3/C4
//! collaborators it needs. REST handlers and GraphQL resolvers both call
//! into these — neither surface carries its own copy of a business rule.

pub mod collaboration;
pub mod goals;
pub mod guilds;
pub mod messaging;
pub mod quests;
pub mod subscriptions;
pub mod users;
pub mod waitlist;

pub use collaboration::CollaborationService;
pub use goals::GoalService;
pub use guilds::GuildService;
pub use messaging::MessagingService;
pub use quests::QuestService;
pub use subscriptions::SubscriptionService;
pub use users::UserService;
pub use waitlist::WaitlistService;
