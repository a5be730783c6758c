//! Mutation root (spec §4.12).

use std::str::FromStr;

use async_graphql::{Context, FieldResult, InputObject, Object};

use questforge_core::ids::{GoalId, TypedId};

use crate::graphql::context::require_principal;
use crate::graphql::types::{ChatMessageNode, GoalNode, TaskNode, UserNode};
use crate::principal_user_id;
use crate::services::users::SignupInput;
use crate::AppState;

#[derive(InputObject)]
pub struct CreateUserInput {
    pub email: String,
    pub nickname: String,
    pub password: String,
    pub country: String,
    pub birth_date: String,
}

#[derive(InputObject)]
pub struct CreateGoalInput {
    pub title: String,
    pub description: String,
    pub deadline_ms: i64,
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Same validation/uniqueness rules as `POST /auth/signup`; resolver
    /// does not send the confirmation email since it has no mailer context
    /// a client can usefully correlate to — callers confirm via REST.
    async fn create_user(&self, ctx: &Context<'_>, input: CreateUserInput) -> FieldResult<UserNode> {
        let state = ctx.data::<AppState>()?;
        let user = state
            .users
            .signup(SignupInput {
                email: input.email,
                nickname: input.nickname,
                password: input.password,
                country: input.country,
                birth_date: input.birth_date,
            })
            .await?;
        Ok(user.into())
    }

    async fn create_goal(&self, ctx: &Context<'_>, input: CreateGoalInput) -> FieldResult<GoalNode> {
        let p = require_principal(ctx)?;
        let state = ctx.data::<AppState>()?;
        let user_id = principal_user_id(&p.sub)?;
        let goal = state
            .goals
            .create_goal(user_id, input.title, input.description, input.deadline_ms)
            .await?;
        Ok(goal.into())
    }

    async fn add_task(&self, ctx: &Context<'_>, goal_id: String, title: String) -> FieldResult<TaskNode> {
        let p = require_principal(ctx)?;
        let state = ctx.data::<AppState>()?;
        // `get_goal` 404s unless the goal belongs to the caller.
        state.goals.get_goal(&p.sub, &goal_id).await?;
        let typed_goal_id: TypedId<GoalId> = TypedId::from_str(&goal_id)
            .map_err(|_| questforge_core::error::Error::validation_field("goalId", "malformed goal id"))?;
        let task = state.goals.add_task(typed_goal_id, title).await?;
        Ok(task.into())
    }

    async fn send_message(&self, ctx: &Context<'_>, room_id: String, body: String) -> FieldResult<ChatMessageNode> {
        let p = require_principal(ctx)?;
        let state = ctx.data::<AppState>()?;
        if !state.collaboration.is_collaborator("room", &room_id, &p.sub).await? {
            return Err(questforge_core::error::Error::Forbidden("not a member of this room".into()).into());
        }
        let sender_id = principal_user_id(&p.sub)?;
        let message = state.messaging.send_room_message(&room_id, sender_id, body).await?;
        Ok(message.into())
    }
}
