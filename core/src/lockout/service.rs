//! Login lockout service
//!
//! Core service for tracking failed login attempts, enforcing progressive
//! delays, and locking accounts after repeated failures. State lives in the
//! same wide-row store as everything else (`LOGIN#<key>` rows, spec §3),
//! rather than a dedicated Redis deployment — one fewer moving part, and
//! the store adapter already gives us the conditional writes this needs.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use super::config::LockoutConfig;
use super::notification::{LockoutEvent, LockoutNotification, UnlockReason};
use crate::error::Result;
use crate::store::{keys, QueryInput, StoreClient};

#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LockoutStatus {
    pub locked: bool,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub lockout_remaining_secs: u64,
    pub delay_ms: u64,
}

#[derive(Clone)]
pub struct LoginLockout {
    config: LockoutConfig,
    store: Arc<dyn StoreClient>,
    notifications: Vec<Arc<dyn LockoutNotification>>,
}

const LOCK_SK: &str = "LOCK";

impl LoginLockout {
    pub fn new(config: LockoutConfig, store: Arc<dyn StoreClient>) -> Self {
        Self {
            config,
            store,
            notifications: Vec::new(),
        }
    }

    pub fn with_notification(mut self, handler: Arc<dyn LockoutNotification>) -> Self {
        self.notifications.push(handler);
        self
    }

    /// Check the current lockout status for an identity (email or username)
    /// without recording an attempt.
    pub async fn check(&self, identity: &str) -> Result<LockoutStatus> {
        if !self.config.enabled {
            return Ok(LockoutStatus {
                locked: false,
                attempt_count: 0,
                max_attempts: self.config.max_attempts,
                lockout_remaining_secs: 0,
                delay_ms: 0,
            });
        }

        let (pk, lock_sk) = login_pk_and_lock_sk(identity);

        if let Some(lock) = self.store.get(&pk, &lock_sk).await? {
            let locked_until_ms = lock.get("lockedUntilMs").and_then(|v| v.as_i64()).unwrap_or(0);
            let now_ms = now_unix_ms();
            if locked_until_ms > now_ms {
                let attempt_count = self.attempt_count(identity, now_ms).await?;
                return Ok(LockoutStatus {
                    locked: true,
                    attempt_count,
                    max_attempts: self.config.max_attempts,
                    lockout_remaining_secs: ((locked_until_ms - now_ms) / 1000).max(0) as u64,
                    delay_ms: 0,
                });
            }
        }

        let now_ms = now_unix_ms();
        let attempt_count = self.attempt_count(identity, now_ms).await?;
        let delay_ms = self.compute_delay(attempt_count);

        Ok(LockoutStatus {
            locked: false,
            attempt_count,
            max_attempts: self.config.max_attempts,
            lockout_remaining_secs: 0,
            delay_ms,
        })
    }

    /// Record a failed login attempt for an identity.
    ///
    /// Appends an `ATTEMPT#<ts_ms>` row, recounts attempts inside the
    /// configured window, and locks the account once the threshold is
    /// reached. Fires notification events for every failure, the warning
    /// threshold, and account lock.
    pub async fn record_failure(&self, identity: &str) -> Result<LockoutStatus> {
        if !self.config.enabled {
            return Ok(LockoutStatus {
                locked: false,
                attempt_count: 0,
                max_attempts: self.config.max_attempts,
                lockout_remaining_secs: 0,
                delay_ms: 0,
            });
        }

        let now_ms = now_unix_ms();
        let (pk, sk) = keys::login_attempt(identity, now_ms);
        let item = serde_json::json!({ "sk": sk, "tsMs": now_ms })
            .as_object()
            .cloned()
            .unwrap_or_default();
        self.store.put(&pk, &sk, item, None).await?;

        let count = self.attempt_count(identity, now_ms).await?;

        debug!(
            identity = identity,
            attempt_count = count,
            max_attempts = self.config.max_attempts,
            "login failure recorded"
        );

        self.notify(LockoutEvent::FailedAttempt {
            identity: identity.to_string(),
            attempt_count: count,
            max_attempts: self.config.max_attempts,
        });

        if self.config.warning_threshold > 0
            && count == self.config.warning_threshold
            && count < self.config.max_attempts
        {
            self.notify(LockoutEvent::ApproachingThreshold {
                identity: identity.to_string(),
                attempt_count: count,
                remaining_attempts: self.config.max_attempts - count,
            });
        }

        if count >= self.config.max_attempts {
            let (lock_pk, lock_sk) = login_pk_and_lock_sk(identity);
            let locked_until_ms = now_ms + self.config.lockout_duration_secs as i64 * 1000;
            let item = serde_json::json!({ "sk": lock_sk, "lockedUntilMs": locked_until_ms })
                .as_object()
                .cloned()
                .unwrap_or_default();
            self.store.put(&lock_pk, &lock_sk, item, None).await?;

            warn!(
                identity = identity,
                attempt_count = count,
                lockout_duration_secs = self.config.lockout_duration_secs,
                "account locked due to repeated login failures"
            );

            self.notify(LockoutEvent::AccountLocked {
                identity: identity.to_string(),
                attempt_count: count,
                lockout_duration_secs: self.config.lockout_duration_secs,
            });

            return Ok(LockoutStatus {
                locked: true,
                attempt_count: count,
                max_attempts: self.config.max_attempts,
                lockout_remaining_secs: self.config.lockout_duration_secs,
                delay_ms: 0,
            });
        }

        let delay_ms = self.compute_delay(count);

        Ok(LockoutStatus {
            locked: false,
            attempt_count: count,
            max_attempts: self.config.max_attempts,
            lockout_remaining_secs: 0,
            delay_ms,
        })
    }

    /// Record a successful login, clearing all lockout state for the identity.
    pub async fn record_success(&self, identity: &str) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let was_locked = self.clear(identity).await?;

        if was_locked {
            info!(identity = identity, "account unlocked via successful login");
            self.notify(LockoutEvent::AccountUnlocked {
                identity: identity.to_string(),
                reason: UnlockReason::SuccessfulLogin,
            });
        }

        Ok(())
    }

    /// Manually unlock an account (admin action).
    pub async fn unlock(&self, identity: &str) -> Result<()> {
        self.clear(identity).await?;

        info!(identity = identity, "account manually unlocked (admin)");
        self.notify(LockoutEvent::AccountUnlocked {
            identity: identity.to_string(),
            reason: UnlockReason::AdminAction,
        });

        Ok(())
    }

    /// Deletes every attempt row plus the lock row for an identity. Returns
    /// whether the account was actually locked beforehand.
    async fn clear(&self, identity: &str) -> Result<bool> {
        let pk = login_pk(identity);

        let attempts = self
            .store
            .query(QueryInput::new(&pk).sk_begins_with("ATTEMPT#").limit(1000))
            .await?;
        for item in attempts.items {
            if let Some(sk) = item.get("sk").and_then(|v| v.as_str()) {
                self.store.delete(&pk, sk, None).await?;
            }
        }

        let (lock_pk, lock_sk) = login_pk_and_lock_sk(identity);
        let was_locked = self.store.get(&lock_pk, &lock_sk).await?.is_some();
        if was_locked {
            self.store.delete(&lock_pk, &lock_sk, None).await?;
        }

        Ok(was_locked)
    }

    /// Counts attempt rows inside the configured window as of `now_ms`.
    async fn attempt_count(&self, identity: &str, now_ms: i64) -> Result<u32> {
        let pk = login_pk(identity);
        let window_start = now_ms - self.config.window_secs as i64 * 1000;

        let result = self
            .store
            .query(QueryInput::new(&pk).sk_begins_with("ATTEMPT#").limit(1000))
            .await?;

        let count = result
            .items
            .iter()
            .filter(|item| {
                item.get("tsMs")
                    .and_then(|v| v.as_i64())
                    .map(|ts| ts >= window_start)
                    .unwrap_or(false)
            })
            .count();

        Ok(count as u32)
    }

    /// Compute the progressive delay for a given attempt count.
    ///
    /// `min(base_ms * multiplier^(attempts-1), max_ms)`, 0 when progressive
    /// delay is disabled or there have been no attempts yet.
    fn compute_delay(&self, attempt_count: u32) -> u64 {
        if !self.config.progressive_delay_enabled || attempt_count == 0 {
            return 0;
        }

        let exponent = (attempt_count - 1) as f64;
        let delay = self.config.base_delay_ms as f64 * self.config.delay_multiplier.powf(exponent);

        if delay.is_finite() {
            (delay as u64).min(self.config.max_delay_ms)
        } else {
            self.config.max_delay_ms
        }
    }

    fn notify(&self, event: LockoutEvent) {
        for handler in &self.notifications {
            let handler = Arc::clone(handler);
            let event = event.clone();
            tokio::spawn(async move {
                handler.on_event(event).await;
            });
        }
    }
}

fn login_pk(identity: &str) -> String {
    format!("LOGIN#{identity}")
}

fn login_pk_and_lock_sk(identity: &str) -> (String, String) {
    (login_pk(identity), LOCK_SK.to_string())
}

fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn lockout() -> LoginLockout {
        LoginLockout::new(LockoutConfig::default(), Arc::new(MemoryStore::new()))
    }

    #[test]
    fn compute_delay_zero_attempts() {
        assert_eq!(lockout().compute_delay(0), 0);
    }

    #[test]
    fn compute_delay_grows_and_caps() {
        let lockout = lockout();
        assert_eq!(lockout.compute_delay(1), 1000);
        assert_eq!(lockout.compute_delay(2), 2000);
        assert_eq!(lockout.compute_delay(20), lockout.config.max_delay_ms);
    }

    #[tokio::test]
    async fn check_is_clean_before_any_failures() {
        let lockout = lockout();
        let status = lockout.check("a@example.com").await.unwrap();
        assert!(!status.locked);
        assert_eq!(status.attempt_count, 0);
    }

    #[tokio::test]
    async fn account_locks_after_max_attempts() {
        let lockout = lockout();
        let mut status = None;
        for _ in 0..5 {
            status = Some(lockout.record_failure("a@example.com").await.unwrap());
        }
        assert!(status.unwrap().locked);

        let rechecked = lockout.check("a@example.com").await.unwrap();
        assert!(rechecked.locked);
    }

    #[tokio::test]
    async fn successful_login_clears_state() {
        let lockout = lockout();
        for _ in 0..5 {
            lockout.record_failure("a@example.com").await.unwrap();
        }
        lockout.record_success("a@example.com").await.unwrap();
        let status = lockout.check("a@example.com").await.unwrap();
        assert!(!status.locked);
    }
}
