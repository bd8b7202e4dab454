//! In-memory stand-ins for the Postgres stores, for handler-level tests.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::CredentialStore,
        repo_types::{NewUser, User},
    },
    config::{AppConfig, JwtConfig, StorageConfig, DEFAULT_UPLOAD_MAX_BYTES},
    state::AppState,
    storage::LocalStorage,
    submissions::{
        dto::UPLOADS_PREFIX,
        repo::SubmissionStore,
        repo_types::{NewSubmission, Submission},
    },
};

#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<Vec<User>>,
    submissions: Mutex<Vec<Submission>>,
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn insert_all(&self, new: Vec<NewUser>) -> anyhow::Result<Option<Vec<User>>> {
        let mut users = self.users.lock().unwrap();
        if new.iter().any(|n| users.iter().any(|u| u.username == n.username)) {
            return Ok(None);
        }
        let created: Vec<User> = new
            .into_iter()
            .map(|n| User {
                id: Uuid::new_v4(),
                username: n.username,
                password_hash: n.password_hash,
                role: n.role,
                created_at: OffsetDateTime::now_utc(),
            })
            .collect();
        users.extend(created.iter().cloned());
        Ok(Some(created))
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, new: NewSubmission) -> anyhow::Result<Submission> {
        let row = Submission {
            id: Uuid::new_v4(),
            student_id: new.student_id,
            student_name: new.student_name,
            file_key: new.file_key,
            submitted_at: OffsetDateTime::now_utc(),
        };
        self.submissions.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<Submission>> {
        Ok(self.submissions.lock().unwrap().clone())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<Option<Submission>> {
        let mut rows = self.submissions.lock().unwrap();
        let pos = rows.iter().position(|s| s.id == id);
        Ok(pos.map(|i| rows.remove(i)))
    }
}

pub fn config(upload_dir: &Path) -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        jwt: JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 60 * 24,
        },
        storage: StorageConfig::Local {
            upload_dir: PathBuf::from(upload_dir),
        },
        upload_max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
    }
}

/// App state backed by [`MemoryStore`] and local files under `upload_dir`.
pub async fn state(upload_dir: &Path) -> AppState {
    let store = Arc::new(MemoryStore::default());
    let storage = LocalStorage::new(upload_dir, UPLOADS_PREFIX).await.unwrap();
    AppState::from_parts(
        Arc::new(config(upload_dir)),
        store.clone(),
        store,
        Arc::new(storage),
    )
}
