use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Allowed CORS origin (the dashboard front-end).
    pub client_url: String,
    pub max_upload_bytes: usize,
    /// Detections below this confidence fall back to `Other`.
    pub detection_threshold: f32,
    pub analysis_timeout: Duration,
    pub request_timeout: Duration,
    pub cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            client_url: std::env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
            detection_threshold: env_or("DETECTION_CONFIDENCE_THRESHOLD", 0.4)?,
            analysis_timeout: Duration::from_secs(env_or("ANALYSIS_TIMEOUT_SECS", 90)?),
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT_SECS", 120)?),
            cache_ttl_secs: env_or("CACHE_TTL_SECS", 300)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.detection_threshold) {
            bail!("DETECTION_CONFIDENCE_THRESHOLD must be between 0 and 1");
        }
        if self.max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }
        if self.request_timeout <= self.analysis_timeout {
            bail!("REQUEST_TIMEOUT_SECS must be greater than ANALYSIS_TIMEOUT_SECS");
        }
        Ok(())
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/contracts_test".to_string(),
            redis_url: "redis://localhost".to_string(),
            s3_bucket: "contracts-test".to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            anthropic_api_key: "test".to_string(),
            port: 0,
            rust_log: "debug".to_string(),
            client_url: "http://localhost:3000".to_string(),
            max_upload_bytes: 64 * 1024,
            detection_threshold: 0.4,
            analysis_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            cache_ttl_secs: 60,
        }
    }
}
