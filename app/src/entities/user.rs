//! User profile row (`USER#<id> / PROFILE#<id>`, GSI1/GSI2/GSI3 per §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use questforge_core::ids::{TypedId, UserId};
use questforge_core::store::{keys, Item};

use super::now_ms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    EmailConfirmationPending,
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: TypedId<UserId>,
    pub email: String,
    pub email_lower: String,
    pub nickname: String,
    pub password_hash: String,
    pub country: String,
    /// ISO-8601 date (`YYYY-MM-DD`); kept as a string rather than
    /// `NaiveDate` since the store round-trips it as plain JSON text.
    pub birth_date: String,
    pub status: UserStatus,
    /// `"member"` or `"admin"`; distinct from the subscription tier.
    pub role: String,
    /// Lifetime `GUILDMASTER` granted via the founder pass list (§4.11).
    #[serde(default)]
    pub founder_pass: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(
        email: String,
        nickname: String,
        password_hash: String,
        country: String,
        birth_date: String,
    ) -> Self {
        let now = now_ms();
        Self {
            entity_type: "User".to_string(),
            id: TypedId::new(),
            email_lower: email.to_lowercase(),
            email,
            nickname,
            password_hash,
            country,
            birth_date,
            status: UserStatus::EmailConfirmationPending,
            role: "member".to_string(),
            founder_pass: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::user_profile(self.id.as_str());
        let (gsi1_pk, gsi1_sk) = keys::user_profile_gsi1(self.id.as_str(), self.created_at);
        let (gsi2_pk, gsi2_sk) = keys::user_profile_gsi2(&self.nickname, self.id.as_str());
        let (gsi3_pk, gsi3_sk) = keys::user_profile_gsi3(&self.email_lower, self.id.as_str());
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        keys_map.insert("gsi1pk", gsi1_pk);
        keys_map.insert("gsi1sk", gsi1_sk);
        keys_map.insert("gsi2pk", gsi2_pk);
        keys_map.insert("gsi2sk", gsi2_sk);
        keys_map.insert("gsi3pk", gsi3_pk);
        keys_map.insert("gsi3sk", gsi3_sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_starts_email_confirmation_pending() {
        let user = User::new(
            "Ada@Example.com".into(),
            "ada".into(),
            "hash".into(),
            "US".into(),
            "1990-01-01".into(),
        );
        assert_eq!(user.status, UserStatus::EmailConfirmationPending);
        assert_eq!(user.email_lower, "ada@example.com");
    }

    #[test]
    fn item_round_trips_through_marshal() {
        let user = User::new(
            "ada@example.com".into(),
            "ada".into(),
            "hash".into(),
            "US".into(),
            "1990-01-01".into(),
        );
        let item = user.item();
        let back: User = questforge_core::store::unmarshal(&item).unwrap();
        assert_eq!(back.email, user.email);
        assert_eq!(back.id, user.id);
    }
}
