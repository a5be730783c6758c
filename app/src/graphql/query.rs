//! Query root (spec §4.12). Resolvers are thin wrappers over the same
//! domain services REST calls — no business rules live here.

use async_graphql::{Context, FieldResult, Object, SimpleObject};

use questforge_core::error::Error;

use crate::graphql::context::require_principal;
use crate::graphql::types::{ChatMessageNode, GoalNode, TaskNode, UserNode};
use crate::AppState;

#[derive(SimpleObject)]
pub struct MeNode {
    pub id: String,
    pub provider: String,
    pub email: Option<String>,
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The calling principal as carried in the bearer token, no store round trip.
    async fn me(&self, ctx: &Context<'_>) -> FieldResult<MeNode> {
        let p = require_principal(ctx)?;
        Ok(MeNode { id: p.sub.clone(), provider: p.provider.clone(), email: p.email.clone() })
    }

    /// The calling principal's full stored profile.
    async fn my_profile(&self, ctx: &Context<'_>) -> FieldResult<UserNode> {
        let p = require_principal(ctx)?;
        let state = ctx.data::<AppState>()?;
        Ok(state.users.get_profile(&p.sub).await?.into())
    }

    async fn my_goals(&self, ctx: &Context<'_>, include_archived: Option<bool>) -> FieldResult<Vec<GoalNode>> {
        let p = require_principal(ctx)?;
        let state = ctx.data::<AppState>()?;
        let goals = state.goals.list_goals(&p.sub, include_archived.unwrap_or(false)).await?;
        Ok(goals.into_iter().map(Into::into).collect())
    }

    async fn my_tasks(&self, ctx: &Context<'_>, goal_id: String) -> FieldResult<Vec<TaskNode>> {
        let p = require_principal(ctx)?;
        let state = ctx.data::<AppState>()?;
        // Ownership check rides on `get_goal`, which 404s for a goal that
        // isn't the caller's — same rule REST's `GET /goals/{id}` applies.
        state.goals.get_goal(&p.sub, &goal_id).await?;
        let tasks = state.goals.list_tasks(&goal_id).await?;
        Ok(tasks.into_iter().map(Into::into).collect())
    }

    async fn active_goals_count(&self, ctx: &Context<'_>, user_id: String) -> FieldResult<u32> {
        let p = require_principal(ctx)?;
        if p.sub != user_id {
            return Err(Error::Forbidden("cannot read another user's goal count".into()).into());
        }
        let state = ctx.data::<AppState>()?;
        let goals = state.goals.list_goals(&user_id, false).await?;
        Ok(goals.len() as u32)
    }

    async fn is_email_available(&self, ctx: &Context<'_>, email: String) -> FieldResult<bool> {
        let state = ctx.data::<AppState>()?;
        Ok(state.users.is_email_available(&email).await?)
    }

    async fn is_nickname_available(&self, ctx: &Context<'_>, nickname: String) -> FieldResult<bool> {
        let state = ctx.data::<AppState>()?;
        Ok(state.users.is_nickname_available(&nickname).await?)
    }

    /// General-room history. Gated on a collaborator row the same way a
    /// guild gates chat on membership (§12 open-question decision #2) —
    /// REST has no equivalent read today, so this resolver is the only
    /// caller of `is_collaborator` for the `"room"` resource type.
    async fn messages(
        &self,
        ctx: &Context<'_>,
        room_id: String,
        after: Option<String>,
        limit: Option<i32>,
    ) -> FieldResult<Vec<ChatMessageNode>> {
        let p = require_principal(ctx)?;
        let state = ctx.data::<AppState>()?;
        if !state.collaboration.is_collaborator("room", &room_id, &p.sub).await? {
            return Err(Error::Forbidden("not a member of this room".into()).into());
        }
        let messages = state
            .messaging
            .room_history(&room_id, after, limit.map(|l| l.max(0) as usize))
            .await?;
        Ok(messages.into_iter().map(Into::into).collect())
    }
}
