//! C2 key schema: PK/SK/GSI builders for every entity row in the data model.
//!
//! These patterns are reproduced verbatim from the data model's key pattern
//! table; nothing here is free to drift, since the table notes it is
//! authoritative for compatibility with existing items. Service code MUST
//! call these builders rather than formatting key strings itself.

/// `(pk, sk)` pair.
pub type Key = (String, String);
/// `(pk, sk)` pair for a GSI projection.
pub type GsiKey = (String, String);

pub fn user_pk(user_id: &str) -> String {
    format!("USER#{user_id}")
}

pub fn user_profile(user_id: &str) -> Key {
    (user_pk(user_id), format!("PROFILE#{user_id}"))
}

pub fn user_profile_gsi1(user_id: &str, created_at_ms: i64) -> GsiKey {
    (user_pk(user_id), format!("ENTITY#User#{created_at_ms}"))
}

pub fn user_profile_gsi2(nickname: &str, user_id: &str) -> GsiKey {
    (format!("NICK#{nickname}"), format!("PROFILE#{user_id}"))
}

pub fn user_profile_gsi3(email_lower: &str, user_id: &str) -> GsiKey {
    (format!("EMAIL#{email_lower}"), format!("PROFILE#{user_id}"))
}

pub fn email_lock(email_lower: &str) -> Key {
    (format!("EMAIL#{email_lower}"), "UNIQUE#USER".to_string())
}

pub fn waitlist_entry(email: &str) -> Key {
    (format!("WAITLIST#{email}"), format!("WAITLIST#{email}"))
}

pub fn goal(user_id: &str, goal_id: &str) -> Key {
    (user_pk(user_id), format!("GOAL#{goal_id}"))
}

pub fn goal_gsi1(user_id: &str, created_at_ms: i64) -> GsiKey {
    (user_pk(user_id), format!("ENTITY#Goal#{created_at_ms}"))
}

pub fn goal_pk(goal_id: &str) -> String {
    format!("GOAL#{goal_id}")
}

pub fn task(goal_id: &str, task_id: &str) -> Key {
    (goal_pk(goal_id), format!("TASK#{task_id}"))
}

pub fn quest(user_id: &str, quest_id: &str) -> Key {
    (user_pk(user_id), format!("QUEST#{quest_id}"))
}

pub fn quest_gsi1(user_id: &str, created_at_ms: i64) -> GsiKey {
    (user_pk(user_id), format!("ENTITY#Quest#{created_at_ms}"))
}

pub fn quest_pk(quest_id: &str) -> String {
    format!("QUEST#{quest_id}")
}

pub fn quest_audit_entry(quest_id: &str, ts_ms: i64, seq: u64) -> Key {
    (quest_pk(quest_id), format!("AUDIT#{ts_ms}#{seq}"))
}

pub fn guild_pk(guild_id: &str) -> String {
    format!("GUILD#{guild_id}")
}

pub fn guild(guild_id: &str) -> Key {
    (guild_pk(guild_id), guild_pk(guild_id))
}

pub fn guild_gsi1(guild_id: &str) -> GsiKey {
    ("GUILD".to_string(), guild_pk(guild_id))
}

pub fn guild_membership(guild_id: &str, user_id: &str) -> Key {
    (guild_pk(guild_id), format!("MEMBER#{user_id}"))
}

pub fn guild_membership_gsi1(user_id: &str, joined_at_ms: i64) -> GsiKey {
    (user_pk(user_id), format!("GUILD#{joined_at_ms}"))
}

pub fn guild_quest(guild_id: &str, quest_id: &str) -> Key {
    (guild_pk(guild_id), format!("QUEST#{quest_id}"))
}

pub fn guild_quest_completion(guild_id: &str, quest_id: &str, user_id: &str) -> Key {
    (guild_pk(guild_id), format!("COMPLETION#{quest_id}#{user_id}"))
}

pub fn guild_activity(guild_id: &str, ts_ms: i64, activity_id: &str) -> Key {
    (guild_pk(guild_id), format!("ACTIVITY#{ts_ms}#{activity_id}"))
}

pub fn resource_pk(resource_type: &str, resource_id: &str) -> String {
    format!("RESOURCE#{resource_type}#{resource_id}")
}

pub fn collaboration_invite(resource_type: &str, resource_id: &str, invite_id: &str) -> Key {
    (resource_pk(resource_type, resource_id), format!("INVITE#{invite_id}"))
}

pub fn collaboration_invite_gsi1(invitee_id: &str, status: &str, ts_ms: i64) -> GsiKey {
    (user_pk(invitee_id), format!("INVITE#{status}#{ts_ms}"))
}

pub fn collaborator(resource_type: &str, resource_id: &str, user_id: &str) -> Key {
    (resource_pk(resource_type, resource_id), format!("COLLAB#{user_id}"))
}

pub fn collaborator_gsi1(user_id: &str, resource_type: &str, joined_at_ms: i64) -> GsiKey {
    (user_pk(user_id), format!("COLLAB#{resource_type}#{joined_at_ms}"))
}

pub fn comment(resource_type: &str, resource_id: &str, ts_ms: i64, comment_id: &str) -> Key {
    (
        resource_pk(resource_type, resource_id),
        format!("COMMENT#{ts_ms}#{comment_id}"),
    )
}

pub fn reaction(comment_id: &str, user_id: &str, emoji: &str) -> Key {
    (format!("COMMENT#{comment_id}"), format!("REACTION#{user_id}#{emoji}"))
}

pub fn room_pk(room_id: &str) -> String {
    format!("ROOM#{room_id}")
}

pub fn room_chat_message(room_id: &str, ts_ms: i64, msg_id: &str) -> Key {
    (room_pk(room_id), format!("MSG#{ts_ms}#{msg_id}"))
}

pub fn guild_chat_message(guild_id: &str, ts_ms: i64, msg_id: &str) -> Key {
    (guild_pk(guild_id), format!("MSG#{ts_ms}#{msg_id}"))
}

pub fn subscription(user_id: &str) -> Key {
    (user_pk(user_id), "SUBSCRIPTION".to_string())
}

pub fn subscription_gsi1(status: &str, user_id: &str) -> GsiKey {
    (format!("SUB_STATUS#{status}"), user_pk(user_id))
}

pub fn credit_ledger_entry(user_id: &str, ts_ms: i64, entry_id: &str) -> Key {
    (user_pk(user_id), format!("CREDIT#{ts_ms}#{entry_id}"))
}

pub fn rate_limit_bucket(scope: &str, key: &str, epoch_minute: i64) -> Key {
    (format!("RL#{scope}#{key}"), format!("WINDOW#{epoch_minute}"))
}

pub fn login_attempt(key: &str, ts_ms: i64) -> Key {
    (format!("LOGIN#{key}"), format!("ATTEMPT#{ts_ms}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_profile_matches_table() {
        assert_eq!(user_profile("u1"), ("USER#u1".into(), "PROFILE#u1".into()));
        assert_eq!(
            user_profile_gsi3("a@example.com", "u1"),
            ("EMAIL#a@example.com".into(), "PROFILE#u1".into())
        );
    }

    #[test]
    fn guild_membership_gsi1_supports_list_my_guilds() {
        let (pk, sk) = guild_membership_gsi1("u1", 1700000000000);
        assert_eq!(pk, "USER#u1");
        assert_eq!(sk, "GUILD#1700000000000");
    }

    #[test]
    fn guild_chat_lives_under_guild_pk_like_activity() {
        let (pk, _) = guild_chat_message("g1", 1, "m1");
        assert_eq!(pk, "GUILD#g1");
    }
}
