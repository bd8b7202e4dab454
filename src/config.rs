use std::{net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;
pub const MAX_UPLOAD_MAX_BYTES: usize = 1024 * 1024 * 1024;
pub const DEFAULT_TTL_MINUTES: i64 = 60 * 24;
/// One year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub enum StorageConfig {
    /// Files on local disk, served unauthenticated under `/uploads`.
    Local { upload_dir: PathBuf },
    S3 {
        endpoint: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        region: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub upload_max_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = required("DATABASE_URL")?;

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: or("JWT_ISSUER", "assignment-portal"),
            audience: or("JWT_AUDIENCE", "assignment-portal-users"),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", lookup("JWT_TTL_MINUTES"), DEFAULT_TTL_MINUTES)?,
        };
        if !(1..=MAX_TTL_MINUTES).contains(&jwt.ttl_minutes) {
            anyhow::bail!(
                "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {}",
                jwt.ttl_minutes
            );
        }

        let bind_addr: SocketAddr = format!("{}:{}", or("APP_HOST", "0.0.0.0"), or("APP_PORT", "5000"))
            .parse()
            .context("APP_HOST/APP_PORT do not form a socket address")?;

        let storage = match or("STORAGE_BACKEND", "local").to_lowercase().as_str() {
            "local" => StorageConfig::Local {
                upload_dir: PathBuf::from(or("UPLOAD_DIR", "uploads")),
            },
            "s3" => StorageConfig::S3 {
                endpoint: required("S3_ENDPOINT")?,
                bucket: required("S3_BUCKET")?,
                access_key: required("S3_ACCESS_KEY")?,
                secret_key: required("S3_SECRET_KEY")?,
                region: or("S3_REGION", "us-east-1"),
            },
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?}, expected local or s3"),
        };

        let upload_max_bytes =
            parse_or("UPLOAD_MAX_BYTES", lookup("UPLOAD_MAX_BYTES"), DEFAULT_UPLOAD_MAX_BYTES)?;
        if !(1..=MAX_UPLOAD_MAX_BYTES).contains(&upload_max_bytes) {
            anyhow::bail!(
                "UPLOAD_MAX_BYTES must be between 1 and {MAX_UPLOAD_MAX_BYTES}, got {upload_max_bytes}"
            );
        }

        Ok(Self {
            database_url,
            bind_addr,
            jwt,
            storage,
            upload_max_bytes,
        })
    }
}

/// Unset means `default`; a value that is set must parse.
fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} is not a valid number: {v:?}")),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_required_keys_set() {
        let cfg = load(&[("DATABASE_URL", "postgres://localhost/portal"), ("JWT_SECRET", "s3cret")])
            .expect("config loads");
        assert_eq!(cfg.jwt.ttl_minutes, 1440);
        assert_eq!(cfg.jwt.issuer, "assignment-portal");
        assert_eq!(cfg.bind_addr.port(), 5000);
        assert_eq!(cfg.upload_max_bytes, 5 * 1024 * 1024);
        match cfg.storage {
            StorageConfig::Local { upload_dir } => assert_eq!(upload_dir, PathBuf::from("uploads")),
            other => panic!("expected local storage, got {other:?}"),
        }
    }

    #[test]
    fn missing_or_blank_secret_is_rejected() {
        let err = load(&[("DATABASE_URL", "postgres://localhost/portal")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));

        let err = load(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "  ")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn s3_backend_requires_bucket_settings() {
        let err = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "k"),
            ("STORAGE_BACKEND", "s3"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("S3_ENDPOINT"));

        let cfg = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "k"),
            ("STORAGE_BACKEND", "S3"),
            ("S3_ENDPOINT", "http://minio:9000"),
            ("S3_BUCKET", "submissions"),
            ("S3_ACCESS_KEY", "a"),
            ("S3_SECRET_KEY", "b"),
        ])
        .expect("config loads");
        assert!(matches!(cfg.storage, StorageConfig::S3 { ref region, .. } if region == "us-east-1"));
    }

    #[test]
    fn unknown_backend_and_bad_port_fail() {
        assert!(load(&[("DATABASE_URL", "x"), ("JWT_SECRET", "k"), ("STORAGE_BACKEND", "ftp")]).is_err());
        assert!(load(&[("DATABASE_URL", "x"), ("JWT_SECRET", "k"), ("APP_PORT", "nope")]).is_err());
    }

    const BASE: [(&str, &str); 2] = [("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "k")];

    fn load_with(key: &str, value: &str) -> anyhow::Result<AppConfig> {
        let mut pairs = BASE.to_vec();
        pairs.push((key, value));
        load(&pairs)
    }

    #[test]
    fn numeric_settings_must_parse() {
        let err = load_with("JWT_TTL_MINUTES", "a day").unwrap_err();
        assert!(err.to_string().contains("JWT_TTL_MINUTES"), "{err}");
        let err = load_with("UPLOAD_MAX_BYTES", "5MB").unwrap_err();
        assert!(err.to_string().contains("UPLOAD_MAX_BYTES"), "{err}");

        assert_eq!(load_with("JWT_TTL_MINUTES", " 90 ").unwrap().jwt.ttl_minutes, 90);
        assert_eq!(load_with("UPLOAD_MAX_BYTES", "1048576").unwrap().upload_max_bytes, 1 << 20);
    }

    #[test]
    fn token_lifetime_is_bounded() {
        for bad in ["0", "-5", "9999999999999999", "525601"] {
            let err = load_with("JWT_TTL_MINUTES", bad).unwrap_err();
            assert!(err.to_string().contains("JWT_TTL_MINUTES"), "{bad}: {err}");
        }
        let cfg = load_with("JWT_TTL_MINUTES", &MAX_TTL_MINUTES.to_string()).unwrap();
        assert_eq!(cfg.jwt.ttl_minutes, MAX_TTL_MINUTES);
    }

    #[test]
    fn upload_limit_is_bounded() {
        let too_big = usize::MAX.to_string();
        for bad in ["0", "-1", too_big.as_str()] {
            let err = load_with("UPLOAD_MAX_BYTES", bad).unwrap_err();
            assert!(err.to_string().contains("UPLOAD_MAX_BYTES"), "{bad}: {err}");
        }
    }
}
