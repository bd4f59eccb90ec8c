// ============================
// crates/backend-lib/src/auth/session.rs
// ============================
//! Bearer grant issuance, lookup and revocation.
use super::{cookies::CookieFactory, digest::TokenHasher, token_generator::generate_secure_token};
use crate::error::AppError;
use crate::metrics::{TOKEN_ISSUED, TOKEN_REVOKED};
use crate::storage::{AccessGrant, NewGrant, TokenKind, TokenStore, User};
use axum_extra::extract::cookie::Cookie;
use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;

/// Cookie lifetime used when the expiry is not in the future
pub const FALLBACK_COOKIE_MINUTES: i64 = 60;

/// A freshly issued grant. The plaintext exists only here.
#[derive(Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub cookie: Cookie<'static>,
    pub grant: AccessGrant,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("grant", &self.grant)
            .finish_non_exhaustive()
    }
}

/// Session manager for issuing and revoking bearer grants
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn TokenStore>,
    hasher: TokenHasher,
    cookies: CookieFactory,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(store: Arc<dyn TokenStore>, hasher: TokenHasher, cookies: CookieFactory) -> Self {
        Self {
            store,
            hasher,
            cookies,
        }
    }

    /// Cookie factory used for responses
    pub fn cookies(&self) -> &CookieFactory {
        &self.cookies
    }

    /// Issue a grant of `kind` for `user`, valid until `expires_at`.
    ///
    /// The store receives only the digest. The cookie lifetime is the rounded
    /// number of minutes until expiry (at least one), or
    /// [`FALLBACK_COOKIE_MINUTES`] when that is not positive; the stored
    /// expiry is never altered.
    pub async fn issue(
        &self,
        user: &User,
        kind: TokenKind,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedToken, AppError> {
        let plaintext = generate_secure_token();
        let grant = self
            .store
            .insert_grant(NewGrant {
                token_hash: self.hasher.digest(&plaintext),
                user_id: user.id,
                kind,
                expires_at: Some(expires_at),
            })
            .await?;

        let minutes = cookie_minutes(Utc::now(), expires_at);
        let cookie = self.cookies.build(kind.cookie_name(), &plaintext, minutes);

        counter!(TOKEN_ISSUED, "kind" => kind.as_str()).increment(1);
        tracing::debug!(user_id = user.id, grant_id = grant.id, %kind, "issued grant");

        Ok(IssuedToken {
            plaintext,
            cookie,
            grant,
        })
    }

    /// Resolve a plaintext to its grant
    pub async fn find_by_plaintext(&self, plaintext: &str) -> Result<Option<AccessGrant>, AppError> {
        if plaintext.is_empty() {
            return Ok(None);
        }
        self.store.find_grant(&self.hasher.digest(plaintext)).await
    }

    /// Delete a resolved grant. Returns whether this call removed it.
    pub async fn delete_grant(&self, grant: &AccessGrant) -> Result<bool, AppError> {
        let removed = self.store.delete_grant(&grant.token_hash).await?;
        if removed {
            counter!(TOKEN_REVOKED, "kind" => grant.kind.as_str()).increment(1);
            tracing::debug!(user_id = grant.user_id, grant_id = grant.id, kind = %grant.kind, "deleted grant");
        }
        Ok(removed)
    }

    /// Put a deleted grant back under its original digest and expiry
    pub async fn reinstate(&self, grant: &AccessGrant) -> Result<AccessGrant, AppError> {
        let restored = self
            .store
            .insert_grant(NewGrant {
                token_hash: grant.token_hash.clone(),
                user_id: grant.user_id,
                kind: grant.kind,
                expires_at: grant.expires_at,
            })
            .await?;
        tracing::debug!(user_id = grant.user_id, grant_id = restored.id, "reinstated grant");
        Ok(restored)
    }

    /// Revoke the grant behind `plaintext`, if any.
    ///
    /// Absent, unknown and already-deleted values are no-ops.
    pub async fn revoke(&self, plaintext: Option<&str>) -> Result<(), AppError> {
        let Some(plaintext) = plaintext else {
            return Ok(());
        };
        if let Some(grant) = self.find_by_plaintext(plaintext).await? {
            self.delete_grant(&grant).await?;
        }
        Ok(())
    }

    /// Cookie that clears `name` on the client
    pub fn forget(&self, name: &str) -> Cookie<'static> {
        self.cookies.forget(name)
    }

    /// Delete every grant a user holds
    pub async fn revoke_all(&self, user: &User) -> Result<usize, AppError> {
        let removed = self.store.delete_user_grants(user.id).await?;
        if removed > 0 {
            counter!(TOKEN_REVOKED, "kind" => "all").increment(removed as u64);
            tracing::info!(user_id = user.id, removed, "revoked all grants");
        }
        Ok(removed)
    }
}

/// Minutes until `expires_at`, rounded, at least one; the fallback when the
/// expiry is not in the future.
pub fn cookie_minutes(now: DateTime<Utc>, expires_at: DateTime<Utc>) -> i64 {
    let remaining_ms = (expires_at - now).num_milliseconds();
    if remaining_ms <= 0 {
        return FALLBACK_COOKIE_MINUTES;
    }
    ((remaining_ms + 30_000) / 60_000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppEnvironment;
    use crate::storage::{MemoryStore, NewUser, UserDirectory};
    use chrono::Duration;
    use tutorhub_common::Role;

    async fn setup() -> (SessionManager, MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                name: "Ann".to_string(),
                email: "a@x.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Admin,
                accepted: true,
            })
            .await
            .unwrap();
        let manager = SessionManager::new(
            Arc::new(store.clone()),
            TokenHasher::new(b"test-key").unwrap(),
            CookieFactory::new(AppEnvironment::Testing, None),
        );
        (manager, store, user)
    }

    #[test]
    fn test_cookie_minutes() {
        let now = Utc::now();
        assert_eq!(cookie_minutes(now, now + Duration::days(1)), 1440);
        assert_eq!(cookie_minutes(now, now + Duration::days(30)), 43200);
        // Rounds rather than truncating a day that is a few µs short
        assert_eq!(
            cookie_minutes(now, now + Duration::days(1) - Duration::microseconds(5)),
            1440
        );
        assert_eq!(cookie_minutes(now, now + Duration::seconds(5)), 1);
        // Non-positive deltas fall back
        assert_eq!(cookie_minutes(now, now), FALLBACK_COOKIE_MINUTES);
        assert_eq!(
            cookie_minutes(now, now - Duration::hours(3)),
            FALLBACK_COOKIE_MINUTES
        );
    }

    #[tokio::test]
    async fn test_issue_then_lookup() {
        let (manager, store, user) = setup().await;
        let expires_at = Utc::now() + Duration::days(30);

        let issued = manager
            .issue(&user, TokenKind::RefreshToken, expires_at)
            .await
            .unwrap();
        assert!(issued.plaintext.len() >= 40);
        assert_eq!(issued.cookie.name(), "refresh");
        assert_eq!(issued.cookie.value(), issued.plaintext);

        let grant = manager
            .find_by_plaintext(&issued.plaintext)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(grant.user_id, user.id);
        assert_eq!(grant.kind, TokenKind::RefreshToken);
        // The stored expiry is the requested instant, not the cookie minutes
        assert_eq!(grant.expires_at, Some(expires_at));

        // Only the digest is stored
        let snapshot = store.snapshot();
        assert_eq!(snapshot.grants.len(), 1);
        assert_ne!(snapshot.grants[0].token_hash, issued.plaintext);
    }

    #[tokio::test]
    async fn test_past_expiry_keeps_stored_expiry() {
        let (manager, _store, user) = setup().await;
        let expires_at = Utc::now() - Duration::minutes(5);

        let issued = manager
            .issue(&user, TokenKind::AccessToken, expires_at)
            .await
            .unwrap();
        assert_eq!(
            issued.cookie.max_age(),
            Some(time::Duration::minutes(FALLBACK_COOKIE_MINUTES))
        );
        assert_eq!(issued.grant.expires_at, Some(expires_at));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (manager, store, user) = setup().await;
        let issued = manager
            .issue(&user, TokenKind::AccessToken, Utc::now() + Duration::days(1))
            .await
            .unwrap();

        manager.revoke(Some(&issued.plaintext)).await.unwrap();
        manager.revoke(Some(&issued.plaintext)).await.unwrap();
        manager.revoke(None).await.unwrap();
        manager.revoke(Some("garbage")).await.unwrap();
        manager.revoke(Some("")).await.unwrap();

        assert_eq!(store.grant_count(), 0);
        assert!(manager
            .find_by_plaintext(&issued.plaintext)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_sessions_coexist() {
        let (manager, store, user) = setup().await;
        let expires_at = Utc::now() + Duration::days(1);
        let first = manager.issue(&user, TokenKind::AccessToken, expires_at).await.unwrap();
        let second = manager.issue(&user, TokenKind::AccessToken, expires_at).await.unwrap();

        assert_ne!(first.plaintext, second.plaintext);
        assert_eq!(store.grant_count(), 2);
        assert!(manager.find_by_plaintext(&first.plaintext).await.unwrap().is_some());

        assert_eq!(manager.revoke_all(&user).await.unwrap(), 2);
    }

    #[test]
    fn test_forget_uses_requested_name() {
        let manager = SessionManager::new(
            Arc::new(MemoryStore::new()),
            TokenHasher::new(b"test-key").unwrap(),
            CookieFactory::new(AppEnvironment::Production, Some("school.example".to_string())),
        );
        let cookie = manager.forget("token");
        assert_eq!(cookie.name(), "token");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.secure(), Some(true));
    }
}
