//! Engine configuration read from environment variables.
//!
//! Every setting has a default; a value that fails to parse falls back to
//! the default with a warning. Platform adapters are only configured when
//! all of their credentials are present.

use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated origins, or `*`. Unset adds no CORS layer.
    pub cors_allowed_origins: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub adapter_timeout: Duration,
    pub allow_redispatch: bool,
}

impl PublishConfig {
    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            ..RetryConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordPressCredentials {
    pub url: String,
    pub username: String,
    pub app_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacebookCredentials {
    pub page_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedInCredentials {
    pub access_token: String,
    /// `urn:li:person:...` or `urn:li:organization:...`
    pub author_urn: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostmarkCredentials {
    pub server_token: String,
    pub from: String,
    pub to: String,
}

/// Credentials for each publishing platform; `None` leaves it unconfigured.
#[derive(Debug, Clone, Default)]
pub struct PlatformCredentials {
    pub wordpress: Option<WordPressCredentials>,
    pub twitter_bearer_token: Option<String>,
    pub facebook: Option<FacebookCredentials>,
    pub linkedin: Option<LinkedInCredentials>,
    pub postmark: Option<PostmarkCredentials>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub server: ServerConfig,
    /// SQLite file for content records; unset keeps records in memory.
    pub content_db: Option<String>,
    pub generation: GenerationConfig,
    pub publish: PublishConfig,
    pub scheduler_interval: Duration,
    /// `token:user-uuid` pairs, comma separated.
    pub auth_tokens: Option<String>,
    pub platforms: PlatformCredentials,
}

pub const DEFAULT_GENERATION_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_GENERATION_MODEL: &str = "deepseek-chat";

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("SERVER_PORT").or_else(|| get("PORT")) {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Invalid SERVER_PORT, using 3000");
                3000
            }),
            None => 3000,
        };

        let server = ServerConfig {
            host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
        };

        let generation = GenerationConfig {
            base_url: get("GENERATION_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GENERATION_BASE_URL.to_string()),
            api_key: get("GENERATION_API_KEY"),
            model: get("GENERATION_MODEL").unwrap_or_else(|| DEFAULT_GENERATION_MODEL.to_string()),
            max_tokens: parse_or(&get, "GENERATION_MAX_TOKENS", 3000),
            temperature: parse_or(&get, "GENERATION_TEMPERATURE", 0.7),
            idle_timeout: Duration::from_secs(parse_or(&get, "GENERATION_IDLE_TIMEOUT_SECS", 60)),
        };

        let publish = PublishConfig {
            max_attempts: parse_or(&get, "PUBLISH_MAX_ATTEMPTS", 3),
            base_delay_ms: parse_or(&get, "PUBLISH_BASE_DELAY_MS", 1000),
            adapter_timeout: Duration::from_secs(parse_or(&get, "ADAPTER_TIMEOUT_SECS", 30)),
            allow_redispatch: parse_or(&get, "ALLOW_REDISPATCH", true),
        };

        let platforms = PlatformCredentials {
            wordpress: match (
                get("WORDPRESS_URL"),
                get("WORDPRESS_USERNAME"),
                get("WORDPRESS_APP_PASSWORD"),
            ) {
                (Some(url), Some(username), Some(app_password)) => Some(WordPressCredentials {
                    url,
                    username,
                    app_password,
                }),
                _ => None,
            },
            twitter_bearer_token: get("TWITTER_BEARER_TOKEN"),
            facebook: match (get("FACEBOOK_PAGE_ID"), get("FACEBOOK_ACCESS_TOKEN")) {
                (Some(page_id), Some(access_token)) => Some(FacebookCredentials {
                    page_id,
                    access_token,
                }),
                _ => None,
            },
            linkedin: match (get("LINKEDIN_ACCESS_TOKEN"), get("LINKEDIN_AUTHOR_URN")) {
                (Some(access_token), Some(author_urn)) => Some(LinkedInCredentials {
                    access_token,
                    author_urn,
                }),
                _ => None,
            },
            postmark: match (
                get("POSTMARK_SERVER_TOKEN"),
                get("POSTMARK_FROM"),
                get("POSTMARK_TO"),
            ) {
                (Some(server_token), Some(from), Some(to)) => Some(PostmarkCredentials {
                    server_token,
                    from,
                    to,
                }),
                _ => None,
            },
        };

        Self {
            server,
            content_db: get("CONTENT_DB"),
            generation,
            publish,
            scheduler_interval: Duration::from_secs(
                parse_or::<u64>(&get, "SCHEDULER_INTERVAL_SECS", 900).max(1),
            ),
            auth_tokens: get("AUTH_TOKENS"),
            platforms,
        }
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e: T::Err| {
            tracing::warn!(
                key,
                value = %raw,
                error = %e,
                default = %default,
                "Invalid setting, using default"
            );
            default
        }),
        None => default,
    }
}
