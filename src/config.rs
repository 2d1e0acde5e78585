use anyhow::{bail, Context};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    OpenAi,
    OpenRouter,
}

impl std::str::FromStr for AiProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(AiProvider::OpenAi),
            "openrouter" => Ok(AiProvider::OpenRouter),
            other => bail!("unknown AI_PROVIDER {other:?} (expected openai or openrouter)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub provider: AiProvider,
    pub api_key: String,
    /// Empty means "provider default".
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub ai: AiConfig,
    pub request_timeout_secs: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dietmind".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dietmind-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let provider: AiProvider = std::env::var("AI_PROVIDER")
            .unwrap_or_else(|_| "openai".into())
            .parse()?;
        let key_var = match provider {
            AiProvider::OpenAi => "OPENAI_API_KEY",
            AiProvider::OpenRouter => "OPENROUTER_API_KEY",
        };
        let ai = AiConfig {
            provider,
            api_key: std::env::var(key_var).with_context(|| format!("{key_var} is not set"))?,
            model: std::env::var("AI_MODEL").ok().filter(|m| !m.trim().is_empty()),
            temperature: std::env::var("AI_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok()),
            timeout_secs: env_or("AI_TIMEOUT_SECS", 120),
        };

        Ok(Self {
            database_url,
            jwt,
            ai,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 180),
        })
    }
}
