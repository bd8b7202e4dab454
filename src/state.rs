use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        repo::{CredentialStore, PgCredentialStore},
    },
    config::{AppConfig, StorageConfig},
    storage::{LocalStorage, S3Storage, StorageClient},
    submissions::{
        dto::UPLOADS_PREFIX,
        repo::{PgSubmissionStore, SubmissionStore},
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn CredentialStore>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub storage: Arc<dyn StorageClient>,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        migrate(&db).await;

        let storage: Arc<dyn StorageClient> = match &config.storage {
            StorageConfig::Local { upload_dir } => {
                info!(dir = %upload_dir.display(), "using local upload storage");
                Arc::new(LocalStorage::new(upload_dir.clone(), UPLOADS_PREFIX).await?)
            }
            StorageConfig::S3 {
                endpoint,
                bucket,
                access_key,
                secret_key,
                region,
            } => {
                info!(%endpoint, %bucket, "using s3 upload storage");
                Arc::new(S3Storage::connect(endpoint, bucket, access_key, secret_key, region).await?)
            }
        };

        Ok(Self::from_parts(
            config,
            Arc::new(PgCredentialStore::new(db.clone())),
            Arc::new(PgSubmissionStore::new(db)),
            storage,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn CredentialStore>,
        submissions: Arc<dyn SubmissionStore>,
        storage: Arc<dyn StorageClient>,
    ) -> Self {
        Self {
            jwt: JwtKeys::from_config(&config.jwt),
            config,
            users,
            submissions,
            storage,
        }
    }
}

async fn migrate(db: &PgPool) {
    if let Err(e) = sqlx::migrate!("./migrations").run(db).await {
        warn!(error = %e, "migrations folder not found or migration failed; continuing");
    }
}
