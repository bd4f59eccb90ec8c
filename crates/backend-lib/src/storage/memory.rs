//! In-memory implementation of the storage traits.
use super::{
    normalize_email, AccessGrant, GrantId, NewGrant, NewUser, TokenStore, User, UserDirectory,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tutorhub_common::UserId;

/// Serializable copy of the whole store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub grants: Vec<AccessGrant>,
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<UserId, User>,
    /// token hash -> grant
    grants: HashMap<String, AccessGrant>,
    next_user_id: UserId,
    next_grant_id: GrantId,
}

/// Store keeping users and grants in process memory.
///
/// Every operation takes the lock once, so each trait call is atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let next_user_id = snapshot.users.iter().map(|u| u.id).max().unwrap_or(0);
        let next_grant_id = snapshot.grants.iter().map(|g| g.id).max().unwrap_or(0);
        let inner = Inner {
            users: snapshot.users.into_iter().map(|u| (u.id, u)).collect(),
            grants: snapshot
                .grants
                .into_iter()
                .map(|g| (g.token_hash.clone(), g))
                .collect(),
            next_user_id,
            next_grant_id,
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Copy the current contents
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        let mut grants: Vec<AccessGrant> = inner.grants.values().cloned().collect();
        grants.sort_by_key(|g| g.id);
        Snapshot {
            users: inner.users.values().cloned().collect(),
            grants,
        }
    }

    /// Replace the rows with `snapshot`. Id counters only move forward.
    pub fn restore(&self, snapshot: Snapshot) {
        let mut inner = self.inner.write();
        inner.users = snapshot.users.into_iter().map(|u| (u.id, u)).collect();
        inner.grants = snapshot
            .grants
            .into_iter()
            .map(|g| (g.token_hash.clone(), g))
            .collect();
    }

    /// Number of stored grants
    pub fn grant_count(&self) -> usize {
        self.inner.read().grants.len()
    }
}

fn missing_user(id: UserId) -> AppError {
    AppError::NotFound(format!("user {id}"))
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let email = normalize_email(&user.email);
        let mut inner = self.inner.write();

        if inner.users.values().any(|u| normalize_email(&u.email) == email) {
            return Err(AppError::InvalidInput(format!(
                "email {email} is already registered"
            )));
        }

        inner.next_user_id += 1;
        let created = User {
            id: inner.next_user_id,
            name: user.name,
            email,
            password_hash: user.password_hash,
            role: user.role,
            accepted: user.accepted,
            reset_otp: None,
            reset_expires_at: None,
            created_at: Utc::now(),
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = normalize_email(email);
        let inner = self.inner.read();
        Ok(inner
            .users
            .values()
            .find(|u| normalize_email(&u.email) == email)
            .cloned())
    }

    async fn find_by_reset_otp(&self, otp: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.read();
        Ok(inner
            .users
            .values()
            .find(|u| u.reset_otp.as_deref() == Some(otp))
            .cloned())
    }

    async fn assign_reset_otp(
        &self,
        id: UserId,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.write();

        let taken = inner
            .users
            .values()
            .any(|u| u.id != id && u.reset_otp.as_deref() == Some(otp));
        if taken {
            return Ok(false);
        }

        let user = inner.users.get_mut(&id).ok_or_else(|| missing_user(id))?;
        user.reset_otp = Some(otp.to_string());
        user.reset_expires_at = Some(expires_at);
        Ok(true)
    }

    async fn consume_reset_otp(&self, id: UserId, otp: &str) -> Result<bool, AppError> {
        let mut inner = self.inner.write();
        match inner.users.get_mut(&id) {
            Some(user) if user.reset_otp.as_deref() == Some(otp) => {
                user.reset_otp = None;
                user.reset_expires_at = None;
                Ok(true)
            },
            _ => Ok(false),
        }
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write();
        let user = inner.users.get_mut(&id).ok_or_else(|| missing_user(id))?;
        user.password_hash = password_hash.to_string();
        user.reset_otp = None;
        user.reset_expires_at = None;
        Ok(())
    }

    async fn set_accepted(&self, id: UserId, accepted: bool) -> Result<(), AppError> {
        let mut inner = self.inner.write();
        let user = inner.users.get_mut(&id).ok_or_else(|| missing_user(id))?;
        user.accepted = accepted;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_grant(&self, grant: NewGrant) -> Result<AccessGrant, AppError> {
        let mut inner = self.inner.write();
        inner.next_grant_id += 1;
        let stored = AccessGrant {
            id: inner.next_grant_id,
            token_hash: grant.token_hash,
            user_id: grant.user_id,
            kind: grant.kind,
            expires_at: grant.expires_at,
            created_at: Utc::now(),
        };
        inner.grants.insert(stored.token_hash.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_grant(&self, token_hash: &str) -> Result<Option<AccessGrant>, AppError> {
        Ok(self.inner.read().grants.get(token_hash).cloned())
    }

    async fn delete_grant(&self, token_hash: &str) -> Result<bool, AppError> {
        Ok(self.inner.write().grants.remove(token_hash).is_some())
    }

    async fn delete_user_grants(&self, user_id: UserId) -> Result<usize, AppError> {
        let mut inner = self.inner.write();
        let before = inner.grants.len();
        inner.grants.retain(|_, g| g.user_id != user_id);
        Ok(before - inner.grants.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TokenKind;
    use chrono::Duration;
    use tutorhub_common::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::Admin,
            accepted: true,
        }
    }

    #[tokio::test]
    async fn test_emails_are_unique_and_case_insensitive() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("Ann@School.example")).await.unwrap();
        assert_eq!(user.email, "ann@school.example");

        let found = store.find_by_email("ANN@school.EXAMPLE").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(store.create_user(new_user("ann@school.example")).await.is_err());
    }

    #[tokio::test]
    async fn test_reset_otp_is_unique_across_users() {
        let store = MemoryStore::new();
        let a = store.create_user(new_user("a@x.com")).await.unwrap();
        let b = store.create_user(new_user("b@x.com")).await.unwrap();
        let expires = Utc::now() + Duration::minutes(10);

        assert!(store.assign_reset_otp(a.id, "123456", expires).await.unwrap());
        // Another user cannot receive the same live code
        assert!(!store.assign_reset_otp(b.id, "123456", expires).await.unwrap());
        // Re-assigning to the holder overwrites
        assert!(store.assign_reset_otp(a.id, "123456", expires).await.unwrap());

        let holder = store.find_by_reset_otp("123456").await.unwrap().unwrap();
        assert_eq!(holder.id, a.id);
    }

    #[tokio::test]
    async fn test_consume_reset_otp_compares_before_clearing() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@x.com")).await.unwrap();
        let expires = Utc::now() + Duration::minutes(10);
        store.assign_reset_otp(user.id, "111111", expires).await.unwrap();

        assert!(!store.consume_reset_otp(user.id, "222222").await.unwrap());
        assert!(store.consume_reset_otp(user.id, "111111").await.unwrap());
        assert!(!store.consume_reset_otp(user.id, "111111").await.unwrap());

        let user = store.find_user(user.id).await.unwrap().unwrap();
        assert!(user.reset_otp.is_none());
        assert!(user.reset_expires_at.is_none());
    }

    #[tokio::test]
    async fn test_update_password_clears_otp() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("a@x.com")).await.unwrap();
        let expires = Utc::now() + Duration::minutes(10);
        store.assign_reset_otp(user.id, "333333", expires).await.unwrap();

        store.update_password(user.id, "new-hash").await.unwrap();
        let user = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.password_hash, "new-hash");
        assert!(user.reset_otp.is_none());
    }

    #[tokio::test]
    async fn test_grant_delete_is_idempotent() {
        let store = MemoryStore::new();
        let grant = store
            .insert_grant(NewGrant {
                token_hash: "digest".to_string(),
                user_id: 1,
                kind: TokenKind::AccessToken,
                expires_at: None,
            })
            .await
            .unwrap();
        assert_eq!(grant.id, 1);

        assert!(store.delete_grant("digest").await.unwrap());
        assert!(!store.delete_grant("digest").await.unwrap());
        assert!(store.find_grant("digest").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_restores_ids() {
        let store = MemoryStore::new();
        store.create_user(new_user("a@x.com")).await.unwrap();
        store.create_user(new_user("b@x.com")).await.unwrap();

        let restored = MemoryStore::from_snapshot(store.snapshot());
        let c = restored.create_user(new_user("c@x.com")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn test_restore_rolls_rows_back() {
        let store = MemoryStore::new();
        let a = store.create_user(new_user("a@x.com")).await.unwrap();
        let before = store.snapshot();

        store.update_password(a.id, "changed").await.unwrap();
        store.create_user(new_user("b@x.com")).await.unwrap();
        store.restore(before);

        let a = store.find_user(a.id).await.unwrap().unwrap();
        assert_eq!(a.password_hash, "hash");
        assert!(store.find_by_email("b@x.com").await.unwrap().is_none());
        // Ids handed out before the rollback are not reused
        let c = store.create_user(new_user("c@x.com")).await.unwrap();
        assert_eq!(c.id, 3);
    }
}
