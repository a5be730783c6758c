//! Principal lookup shared by every resolver. The schema has no notion of
//! "authenticated" baked in — each field decides whether it needs one, the
//! same split REST's public vs. bearer-gated routes make.

use async_graphql::{Context, Error as GqlError};
use questforge_core::auth::Principal;

pub fn principal<'a>(ctx: &'a Context<'_>) -> Option<&'a Principal> {
    ctx.data::<Option<Principal>>().ok().and_then(|p| p.as_ref())
}

pub fn require_principal<'a>(ctx: &'a Context<'_>) -> Result<&'a Principal, GqlError> {
    principal(ctx).ok_or_else(|| GqlError::new("authentication required"))
}
