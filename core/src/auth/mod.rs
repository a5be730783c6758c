//! Identity & Authorizer (C3) plus the password/token primitives the user
//! service builds on.
//!
//! [`Authorizer`] implements the dual-issuer validation algorithm; the
//! internal issuer's token minting lives in [`internal::TokenIssuer`], and
//! signed single-use tokens (email confirmation, password reset) live in
//! [`single_use::SingleUseTokenIssuer`]. Route-pattern policy synthesis from
//! a validated [`Principal`] (step 5 of the algorithm) is handled by
//! `crate::middleware::authz`, which consumes the `Principal` this module
//! produces.

pub mod authorizer;
pub mod claims;
pub mod config;
pub mod internal;
pub mod jwks;
pub mod password;
pub mod single_use;

pub use authorizer::Authorizer;
pub use claims::{DenyReason, ExternalClaims, InternalClaims, Principal};
pub use config::{AuthConfig, ExternalIssuerConfig, InternalIssuerConfig, PasswordConfig};
pub use internal::TokenIssuer;
pub use password::{check_password_strength, PasswordHasher};
pub use single_use::{SingleUseTokenIssuer, TokenPurpose};
