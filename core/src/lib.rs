//! # questforge-core
//!
//! Protocol- and domain-agnostic plumbing shared by the questforge services:
//! configuration loading, the error taxonomy and its HTTP mapping, the
//! single-table store adapter (put/get/query/update/transact-write/delete
//! over one wide-row store with three global secondary indexes), the
//! dual-issuer request authorizer, the store-backed rate limiter and login
//! lockout service, and websocket room/fan-out primitives.
//!
//! Domain services (users, goals, quests, guilds, ...) live in the `app`
//! crate, which depends on this one the way a consumer service depends on
//! the framework this crate is descended from.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod ids;
pub mod lockout;
pub mod middleware;
pub mod observability;
pub mod responses;
pub mod server;
pub mod store;
pub mod websocket;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::auth::{Authorizer, Principal};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::health::{HealthState, ReadinessProbe};
    pub use crate::ids::{RequestId, TypedId};
    pub use crate::server::Server;
    pub use crate::store::{
        Item, PutCondition, QueryResult, SkCondition, StoreClient, StoreError, Value,
    };
}
