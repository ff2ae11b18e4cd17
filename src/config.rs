use std::net::SocketAddr;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL under which uploaded objects are publicly reachable.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// In-memory store is used when unset.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    /// Frontend origin used to build verification links.
    pub public_url: String,
    pub verification_ttl_hours: i64,
    /// Successful logins after which an account verifies itself; 0 disables.
    pub auto_verify_login_threshold: u32,
    pub rsvp_channel_capacity: usize,
    pub mail: Option<MailConfig>,
    pub storage: Option<StorageConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = optional("DATABASE_URL");

        let secret = optional("JWT_SECRET")
            .or_else(|| optional("ACCESS_TOKEN_SECRET"))
            .context("JWT_SECRET (or ACCESS_TOKEN_SECRET) must be set")?;
        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "eventhub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "eventhub-users".into()),
        };

        let mail = optional("MAIL_API_URL").map(|api_url| MailConfig {
            api_url,
            api_key: optional("MAIL_API_KEY"),
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Event Management <no-reply@eventhub.local>".into()),
        });

        let storage = match optional("S3_ENDPOINT") {
            Some(endpoint) => Some(StorageConfig {
                public_url: optional("S3_PUBLIC_URL").unwrap_or_else(|| endpoint.clone()),
                endpoint,
                bucket: std::env::var("S3_BUCKET").context("S3_BUCKET must be set")?,
                access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY must be set")?,
                secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY must be set")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
            }),
            None => None,
        };

        let bind_addr = bind_addr(
            &std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            &std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into()),
        )?;

        Ok(Self {
            bind_addr,
            database_url,
            jwt,
            public_url: std::env::var("APP_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            verification_ttl_hours: parsed("VERIFICATION_TOKEN_TTL_HOURS", 24),
            auto_verify_login_threshold: parsed("AUTO_VERIFY_LOGIN_THRESHOLD", 5),
            rsvp_channel_capacity: parsed("RSVP_CHANNEL_CAPACITY", 256),
            mail,
            storage,
        })
    }
}

fn bind_addr(host: &str, port: &str) -> anyhow::Result<SocketAddr> {
    format!("{}:{}", host.trim(), port.trim())
        .parse()
        .with_context(|| format!("APP_HOST/APP_PORT do not form a socket address: {host}:{port}"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    parse_or(std::env::var(key).ok().as_deref(), default)
}

fn parse_or<T: std::str::FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}
