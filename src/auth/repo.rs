use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User};

/// Persistence for user accounts.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;

    /// Inserts every user or none. `Ok(None)` means a username was already taken.
    async fn insert_all(&self, users: Vec<NewUser>) -> anyhow::Result<Option<Vec<User>>>;
}

#[derive(Clone)]
pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    async fn insert_all(&self, users: Vec<NewUser>) -> anyhow::Result<Option<Vec<User>>> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let mut created = Vec::with_capacity(users.len());
        for u in users {
            let row = sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (id, username, password_hash, role)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (username) DO NOTHING
                RETURNING id, username, password_hash, role, created_at
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&u.username)
            .bind(&u.password_hash)
            .bind(u.role)
            .fetch_optional(&mut *tx)
            .await
            .with_context(|| format!("insert user {}", u.username))?;

            match row {
                Some(user) => created.push(user),
                None => {
                    tx.rollback().await.context("rollback tx")?;
                    return Ok(None);
                }
            }
        }
        tx.commit().await.context("commit tx")?;
        Ok(Some(created))
    }
}
