// ============================
// crates/backend-lib/src/storage/flat_file.rs
// ============================
//! Flat-file implementation of the storage traits.
//!
//! Rows live in memory and every mutation rewrites `users.json` and
//! `grants.json` under the root directory.
use super::{
    AccessGrant, MemoryStore, NewGrant, NewUser, Snapshot, TokenStore, User, UserDirectory,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    fs,
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{fs as tokio_fs, sync::Mutex};
use tutorhub_common::UserId;

const USERS_FILE: &str = "users.json";
const GRANTS_FILE: &str = "grants.json";

/// Flat-file storage backend
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
    rows: MemoryStore,
    /// Serializes mutations and their writes
    write_lock: Arc<Mutex<()>>,
}

impl FlatFileStorage {
    /// Open (or create) a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let users: Vec<User> = read_rows(&root.join(USERS_FILE))?;
        let grants: Vec<AccessGrant> = read_rows(&root.join(GRANTS_FILE))?;
        tracing::debug!(
            root = %root.display(),
            users = users.len(),
            grants = grants.len(),
            "loaded flat-file storage"
        );

        Ok(Self {
            root,
            rows: MemoryStore::from_snapshot(Snapshot { users, grants }),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Apply `change` to the rows and write them out.
    ///
    /// Mutations are serialized. When the write fails the rows go back to
    /// what they were before `change`, so memory never runs ahead of disk.
    async fn write_through<T>(
        &self,
        change: impl Future<Output = Result<T, AppError>>,
        changed: impl FnOnce(&T) -> bool,
    ) -> Result<T, AppError> {
        let _guard = self.write_lock.lock().await;
        let before = self.rows.snapshot();

        let value = change.await?;
        if !changed(&value) {
            return Ok(value);
        }

        if let Err(e) = self.write_snapshot(&self.rows.snapshot()).await {
            tracing::error!(error = %e, root = %self.root.display(), "storage write failed, rolling back");
            // users.json may already hold the new rows
            if let Err(restore) = self.write_snapshot(&before).await {
                tracing::warn!(error = %restore, "could not rewrite previous rows");
            }
            self.rows.restore(before);
            return Err(e);
        }
        Ok(value)
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), AppError> {
        write_rows(&self.root.join(USERS_FILE), &snapshot.users).await?;
        write_rows(&self.root.join(GRANTS_FILE), &snapshot.grants).await
    }
}

fn read_rows<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Write via a temp file + rename so readers never see a partial file
async fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), AppError> {
    let json = serde_json::to_vec_pretty(rows)?;
    let tmp = path.with_extension("json.tmp");
    tokio_fs::write(&tmp, json).await?;
    tokio_fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl UserDirectory for FlatFileStorage {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        self.write_through(self.rows.create_user(user), |_| true).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, AppError> {
        self.rows.find_user(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.rows.find_by_email(email).await
    }

    async fn find_by_reset_otp(&self, otp: &str) -> Result<Option<User>, AppError> {
        self.rows.find_by_reset_otp(otp).await
    }

    async fn assign_reset_otp(
        &self,
        id: UserId,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        self.write_through(self.rows.assign_reset_otp(id, otp, expires_at), |assigned| *assigned)
            .await
    }

    async fn consume_reset_otp(&self, id: UserId, otp: &str) -> Result<bool, AppError> {
        self.write_through(self.rows.consume_reset_otp(id, otp), |consumed| *consumed)
            .await
    }

    async fn update_password(&self, id: UserId, password_hash: &str) -> Result<(), AppError> {
        self.write_through(self.rows.update_password(id, password_hash), |_| true)
            .await
    }

    async fn set_accepted(&self, id: UserId, accepted: bool) -> Result<(), AppError> {
        self.write_through(self.rows.set_accepted(id, accepted), |_| true)
            .await
    }
}

#[async_trait]
impl TokenStore for FlatFileStorage {
    async fn insert_grant(&self, grant: NewGrant) -> Result<AccessGrant, AppError> {
        self.write_through(self.rows.insert_grant(grant), |_| true).await
    }

    async fn find_grant(&self, token_hash: &str) -> Result<Option<AccessGrant>, AppError> {
        self.rows.find_grant(token_hash).await
    }

    async fn delete_grant(&self, token_hash: &str) -> Result<bool, AppError> {
        self.write_through(self.rows.delete_grant(token_hash), |removed| *removed)
            .await
    }

    async fn delete_user_grants(&self, user_id: UserId) -> Result<usize, AppError> {
        self.write_through(self.rows.delete_user_grants(user_id), |removed| *removed > 0)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TokenKind;
    use chrono::Duration;
    use tempfile::tempdir;
    use tutorhub_common::Role;

    #[tokio::test]
    async fn test_rows_survive_reopen() {
        let dir = tempdir().unwrap();

        let storage = FlatFileStorage::new(dir.path()).unwrap();
        let user = storage
            .create_user(NewUser {
                name: "Ann".to_string(),
                email: "ann@school.example".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Teacher,
                accepted: false,
            })
            .await
            .unwrap();
        storage
            .insert_grant(NewGrant {
                token_hash: "digest".to_string(),
                user_id: user.id,
                kind: TokenKind::RefreshToken,
                expires_at: Some(Utc::now() + Duration::days(30)),
            })
            .await
            .unwrap();
        assert!(dir.path().join("users.json").exists());
        assert!(dir.path().join("grants.json").exists());

        let reopened = FlatFileStorage::new(dir.path()).unwrap();
        let found = reopened.find_by_email("ann@school.example").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(!found.accepted);

        let grant = reopened.find_grant("digest").await.unwrap().unwrap();
        assert_eq!(grant.kind, TokenKind::RefreshToken);
        assert_eq!(grant.user_id, user.id);
    }

    #[tokio::test]
    async fn test_deleted_grant_stays_deleted() {
        let dir = tempdir().unwrap();
        let storage = FlatFileStorage::new(dir.path()).unwrap();
        storage
            .insert_grant(NewGrant {
                token_hash: "digest".to_string(),
                user_id: 1,
                kind: TokenKind::AccessToken,
                expires_at: None,
            })
            .await
            .unwrap();
        assert!(storage.delete_grant("digest").await.unwrap());

        let reopened = FlatFileStorage::new(dir.path()).unwrap();
        assert!(reopened.find_grant("digest").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_rows_unchanged() {
        let dir = tempdir().unwrap();
        let storage = FlatFileStorage::new(dir.path()).unwrap();
        let user = storage
            .create_user(NewUser {
                name: "Ann".to_string(),
                email: "ann@school.example".to_string(),
                password_hash: "old".to_string(),
                role: Role::Admin,
                accepted: true,
            })
            .await
            .unwrap();
        storage
            .insert_grant(NewGrant {
                token_hash: "digest".to_string(),
                user_id: user.id,
                kind: TokenKind::AccessToken,
                expires_at: None,
            })
            .await
            .unwrap();

        fs::remove_dir_all(dir.path()).unwrap();

        assert!(storage.update_password(user.id, "new").await.is_err());
        let stored = storage.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "old");

        let inserted = storage
            .insert_grant(NewGrant {
                token_hash: "other".to_string(),
                user_id: user.id,
                kind: TokenKind::AccessToken,
                expires_at: None,
            })
            .await;
        assert!(inserted.is_err());
        assert!(storage.find_grant("other").await.unwrap().is_none());

        assert!(storage.delete_grant("digest").await.is_err());
        assert!(storage.find_grant("digest").await.unwrap().is_some());
    }

    #[test]
    fn test_plaintext_never_written() {
        // Grants only carry the digest they were stored under
        let grant = AccessGrant {
            id: 1,
            token_hash: "digest".to_string(),
            user_id: 1,
            kind: TokenKind::AccessToken,
            expires_at: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&grant).unwrap();
        assert_eq!(json["kind"], "access-token");
        assert_eq!(json.as_object().unwrap().len(), 6);
    }
}
