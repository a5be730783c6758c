//! User & Profile Service (C5): signup, confirmation, login, password
//! reset, and profile CRUD.

use std::sync::Arc;

use chrono::NaiveDate;

use questforge_core::auth::{PasswordHasher, SingleUseTokenIssuer, TokenIssuer, TokenPurpose};
use questforge_core::config::{FounderPassConfig, SignupConfig};
use questforge_core::error::{Error, Result};
use questforge_core::lockout::LoginLockout;
use questforge_core::store::{
    keys, Condition, Index, QueryInput, SetOp, StoreClient, StoreError, TransactOp,
};

use crate::entities::now_ms;
use crate::entities::user::{User, UserStatus};

pub struct SignupInput {
    pub email: String,
    pub nickname: String,
    pub password: String,
    pub country: String,
    pub birth_date: String,
}

pub struct UpdateProfileInput {
    pub nickname: Option<String>,
    pub country: Option<String>,
}

pub struct LoginOutcome {
    pub access_token: String,
    pub user: User,
}

pub struct UserService {
    store: Arc<dyn StoreClient>,
    hasher: PasswordHasher,
    token_issuer: TokenIssuer,
    single_use: SingleUseTokenIssuer,
    lockout: LoginLockout,
    signup: SignupConfig,
    founder_pass: FounderPassConfig,
}

impl UserService {
    pub fn new(
        store: Arc<dyn StoreClient>,
        hasher: PasswordHasher,
        token_issuer: TokenIssuer,
        single_use: SingleUseTokenIssuer,
        lockout: LoginLockout,
        signup: SignupConfig,
        founder_pass: FounderPassConfig,
    ) -> Self {
        Self {
            store,
            hasher,
            token_issuer,
            single_use,
            lockout,
            signup,
            founder_pass,
        }
    }

    /// Spec §4.5 `Signup`: validate, hash, then a single transaction
    /// writing the profile row and the email uniqueness lock.
    pub async fn signup(&self, input: SignupInput) -> Result<User> {
        validate_email(&input.email)?;
        validate_nickname(&input.nickname)?;
        questforge_core::auth::check_password_strength(&input.password)?;
        self.validate_country(&input.country)?;
        self.validate_birth_date(&input.birth_date)?;

        if self.is_nickname_taken(&input.nickname).await? {
            return Err(Error::Conflict("nickname already in use".into()));
        }

        let password_hash = self.hasher.hash(&input.password)?;
        let mut user = User::new(
            input.email,
            input.nickname,
            password_hash,
            input.country,
            input.birth_date,
        );

        if self.founder_pass.grants_founder_pass(user.id.as_str(), &user.email_lower) {
            user.founder_pass = true;
        }

        let (profile_pk, profile_sk) = keys::user_profile(user.id.as_str());
        let (lock_pk, lock_sk) = keys::email_lock(&user.email_lower);
        let lock_item = serde_json::json!({
            "pk": lock_pk,
            "sk": lock_sk,
            "userId": user.id.as_str(),
        })
        .as_object()
        .cloned()
        .unwrap_or_default();

        let ops = vec![
            TransactOp::Put {
                pk: lock_pk,
                sk: lock_sk,
                item: lock_item,
                condition: Some(Condition::AttributeNotExists("pk".to_string())),
            },
            TransactOp::Put {
                pk: profile_pk,
                sk: profile_sk,
                item: user.item(),
                condition: Some(Condition::AttributeNotExists("pk".to_string())),
            },
        ];

        self.store.transact_write(ops).await.map_err(|e| match e {
            StoreError::Conflict(_) => Error::Conflict("email already in use".into()),
            other => other.into(),
        })?;

        Ok(user)
    }

    /// Mints the single-use token a signup handler hands to the mailer.
    /// Kept separate from `signup` so a caller that wants to resend a
    /// confirmation email doesn't need to re-run the whole signup flow.
    pub fn issue_email_confirmation_token(&self, user_id: &str) -> String {
        self.single_use
            .issue(user_id, TokenPurpose::EmailConfirmation, 3600)
    }

    /// Spec §4.5 `ConfirmEmail`: verify the single-use token, flip status.
    pub async fn confirm_email(&self, token: &str) -> Result<()> {
        let user_id = self.single_use.verify(token, TokenPurpose::EmailConfirmation)?;
        let (pk, sk) = keys::user_profile(&user_id);
        self.store
            .update(
                &pk,
                &sk,
                vec![
                    SetOp::Set("status".to_string(), serde_json::json!("active")),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                Some(Condition::AttributeExists("pk".to_string())),
            )
            .await?;
        Ok(())
    }

    /// Spec §4.5 `Login`: GSI3 lookup by lowercased email, bcrypt compare,
    /// mint a 1h access token. Failures bump attempt counters for both the
    /// email identity and (when known) the caller's IP.
    pub async fn login(&self, email: &str, password: &str, client_ip: Option<&str>) -> Result<LoginOutcome> {
        let email_identity = format!("email:{}", email.to_lowercase());

        let lockout_status = self.lockout.check(&email_identity).await?;
        if lockout_status.locked {
            return Err(Error::TooManyRequests {
                retry_after_secs: lockout_status.lockout_remaining_secs,
            });
        }

        let user = match self.find_by_email(email).await? {
            Some(user) => user,
            None => {
                self.record_login_failure(&email_identity, client_ip).await?;
                return Err(Error::Unauthenticated("invalid credentials".into()));
            }
        };

        let verified = self.hasher.verify(password, &user.password_hash)?;
        if !verified || user.status != UserStatus::Active {
            self.record_login_failure(&email_identity, client_ip).await?;
            return Err(Error::Unauthenticated("invalid credentials".into()));
        }

        self.lockout.record_success(&email_identity).await?;
        if let Some(ip) = client_ip {
            self.lockout.record_success(&format!("ip:{ip}")).await?;
        }

        let access_token =
            self.token_issuer
                .issue_access_token(user.id.as_str(), &user.email, &user.nickname, &user.role)?;

        Ok(LoginOutcome { access_token, user })
    }

    async fn record_login_failure(&self, email_identity: &str, client_ip: Option<&str>) -> Result<()> {
        self.lockout.record_failure(email_identity).await?;
        if let Some(ip) = client_ip {
            self.lockout.record_failure(&format!("ip:{ip}")).await?;
        }
        Ok(())
    }

    /// Spec §4.5 `RequestPasswordReset`: always returns `Ok` regardless of
    /// whether the email matched a confirmed local user, so the response
    /// never reveals account existence. Returns the minted token so the
    /// caller (REST handler) can hand it to the mailer; callers that don't
    /// find a matching confirmed user get `None` and still respond 200.
    pub async fn request_password_reset(&self, email: &str) -> Result<Option<String>> {
        let Some(user) = self.find_by_email(email).await? else {
            return Ok(None);
        };
        if user.status != UserStatus::Active {
            return Ok(None);
        }
        let token = self
            .single_use
            .issue(user.id.as_str(), TokenPurpose::PasswordReset, 3600);
        Ok(Some(token))
    }

    /// Spec §4.5 `ResetPassword`.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        questforge_core::auth::check_password_strength(new_password)?;
        let user_id = self.single_use.verify(token, TokenPurpose::PasswordReset)?;
        let password_hash = self.hasher.hash(new_password)?;

        let (pk, sk) = keys::user_profile(&user_id);
        self.store
            .update(
                &pk,
                &sk,
                vec![
                    SetOp::Set("password_hash".to_string(), serde_json::json!(password_hash)),
                    SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms())),
                ],
                Some(Condition::AttributeExists("pk".to_string())),
            )
            .await?;
        Ok(())
    }

    /// Owner-only profile read.
    pub async fn get_profile(&self, user_id: &str) -> Result<User> {
        self.get_user(user_id).await
    }

    /// Owner-only profile update, capped to nickname/country (spec §4.5:
    /// "updates capped at whitelisted fields").
    pub async fn update_profile(&self, user_id: &str, input: UpdateProfileInput) -> Result<User> {
        if let Some(nickname) = &input.nickname {
            validate_nickname(nickname)?;
            if self.is_nickname_taken(nickname).await? {
                return Err(Error::Conflict("nickname already in use".into()));
            }
        }
        if let Some(country) = &input.country {
            self.validate_country(country)?;
        }

        let mut sets = vec![SetOp::Set("updated_at".to_string(), serde_json::json!(now_ms()))];
        if let Some(nickname) = input.nickname {
            sets.push(SetOp::Set("nickname".to_string(), serde_json::json!(nickname)));
        }
        if let Some(country) = input.country {
            sets.push(SetOp::Set("country".to_string(), serde_json::json!(country)));
        }

        let (pk, sk) = keys::user_profile(user_id);
        let item = self
            .store
            .update(&pk, &sk, sets, Some(Condition::AttributeExists("pk".to_string())))
            .await?;
        questforge_core::store::unmarshal(&item)
    }

    /// `isEmailAvailable` (spec §4.5: "exact presence semantics").
    pub async fn is_email_available(&self, email: &str) -> Result<bool> {
        Ok(self.find_by_email(email).await?.is_none())
    }

    /// `isNicknameAvailable`.
    /// Resolves a `@nickname` mention to the user it belongs to, via the
    /// same GSI2 nickname index `is_nickname_taken` already queries.
    pub async fn find_by_nickname(&self, nickname: &str) -> Result<Option<User>> {
        let (pk, _) = keys::user_profile_gsi2(nickname, "");
        let result = self
            .store
            .query(QueryInput::new(pk).on_index(Index::Gsi2).limit(1))
            .await?;
        match result.items.into_iter().next() {
            Some(item) => Ok(Some(questforge_core::store::unmarshal(&item)?)),
            None => Ok(None),
        }
    }

    pub async fn is_nickname_available(&self, nickname: &str) -> Result<bool> {
        Ok(!self.is_nickname_taken(nickname).await?)
    }

    async fn get_user(&self, user_id: &str) -> Result<User> {
        let (pk, sk) = keys::user_profile(user_id);
        let item = self
            .store
            .get(&pk, &sk)
            .await?
            .ok_or_else(|| Error::NotFound("user not found".into()))?;
        questforge_core::store::unmarshal(&item)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let (pk, _) = keys::user_profile_gsi3(&email.to_lowercase(), "");
        let result = self
            .store
            .query(QueryInput::new(pk).on_index(Index::Gsi3).limit(1))
            .await?;
        match result.items.into_iter().next() {
            Some(item) => Ok(Some(questforge_core::store::unmarshal(&item)?)),
            None => Ok(None),
        }
    }

    async fn is_nickname_taken(&self, nickname: &str) -> Result<bool> {
        let (pk, _) = keys::user_profile_gsi2(nickname, "");
        let result = self
            .store
            .query(QueryInput::new(pk).on_index(Index::Gsi2).limit(1))
            .await?;
        Ok(!result.items.is_empty())
    }

    fn validate_country(&self, country: &str) -> Result<()> {
        if self.signup.allowed_countries.iter().any(|c| c == country) {
            Ok(())
        } else {
            Err(Error::validation_field(
                "country",
                "country is not in the allowed list",
            ))
        }
    }

    fn validate_birth_date(&self, birth_date: &str) -> Result<()> {
        let date = NaiveDate::parse_from_str(birth_date, "%Y-%m-%d")
            .map_err(|_| Error::validation_field("birthDate", "birth date must be YYYY-MM-DD"))?;
        let today = chrono::Utc::now().date_naive();
        let cutoff = today - chrono::Duration::days(365 * i64::from(self.signup.min_age_years));
        if date <= cutoff {
            Ok(())
        } else {
            Err(Error::validation_field(
                "birthDate",
                "birth date does not meet the minimum age requirement",
            ))
        }
    }
}

fn validate_email(email: &str) -> Result<()> {
    if email.len() < 3 || !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(Error::validation_field("email", "invalid email address"));
    }
    Ok(())
}

fn validate_nickname(nickname: &str) -> Result<()> {
    if nickname.is_empty() || nickname.chars().count() > 32 {
        return Err(Error::validation_field(
            "nickname",
            "nickname must be 1-32 characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use questforge_core::auth::config::{InternalIssuerConfig, PasswordConfig};
    use questforge_core::lockout::LockoutConfig;
    use questforge_core::store::memory::MemoryStore;

    fn service() -> UserService {
        let store: Arc<dyn StoreClient> = Arc::new(MemoryStore::new());
        UserService::new(
            store.clone(),
            PasswordHasher::new(PasswordConfig {
                bcrypt_cost: 10,
                min_password_length: 8,
            }),
            TokenIssuer::new(InternalIssuerConfig::default()),
            SingleUseTokenIssuer::new("test-secret"),
            LoginLockout::new(LockoutConfig::default(), store),
            SignupConfig::default(),
            FounderPassConfig::default(),
        )
    }

    fn valid_input() -> SignupInput {
        SignupInput {
            email: "ada@example.com".into(),
            nickname: "ada".into(),
            password: "Str0ng!Pass".into(),
            country: "US".into(),
            birth_date: "1990-01-01".into(),
        }
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_email() {
        let svc = service();
        svc.signup(valid_input()).await.unwrap();
        let mut second = valid_input();
        second.nickname = "ada2".into();
        let err = svc.signup(second).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_nickname() {
        let svc = service();
        svc.signup(valid_input()).await.unwrap();
        let mut second = valid_input();
        second.email = "other@example.com".into();
        let err = svc.signup(second).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn signup_rejects_disallowed_country() {
        let svc = service();
        let mut input = valid_input();
        input.country = "ZZ".into();
        assert!(svc.signup(input).await.is_err());
    }

    #[tokio::test]
    async fn login_fails_before_email_confirmed() {
        let svc = service();
        svc.signup(valid_input()).await.unwrap();
        let err = svc.login("ada@example.com", "Str0ng!Pass", None).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn login_succeeds_after_confirmation() {
        let svc = service();
        let user = svc.signup(valid_input()).await.unwrap();
        let token = svc
            .single_use
            .issue(user.id.as_str(), TokenPurpose::EmailConfirmation, 3600);
        svc.confirm_email(&token).await.unwrap();

        let outcome = svc.login("ada@example.com", "Str0ng!Pass", None).await.unwrap();
        assert!(!outcome.access_token.is_empty());
    }

    #[tokio::test]
    async fn email_and_nickname_availability_reflect_signup_state() {
        let svc = service();
        assert!(svc.is_email_available("ada@example.com").await.unwrap());
        assert!(svc.is_nickname_available("ada").await.unwrap());
        svc.signup(valid_input()).await.unwrap();
        assert!(!svc.is_email_available("ada@example.com").await.unwrap());
        assert!(!svc.is_nickname_available("ada").await.unwrap());
    }
}
