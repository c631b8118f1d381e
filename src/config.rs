use std::env;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE: &str = "travique";
const DEFAULT_VERTEX_LOCATION: &str = "us-central1";
const DEFAULT_VERTEX_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_OPENROUTER_MODEL: &str = "deepseek/deepseek-chat-v3-0324:free";
const DEFAULT_MAIL_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const DEFAULT_MAIL_FROM: &str = "no-reply@travique.app";
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Vertex,
    OpenRouter,
}

#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub project_id: Option<String>,
    pub location: String,
    pub model: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub bcrypt_cost: u32,
    pub llm_provider: LlmProvider,
    pub vertex: VertexConfig,
    pub openrouter: OpenRouterConfig,
    pub mail: MailConfig,
    pub predicthq_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub google_cx: Option<String>,
    pub superadmin_email: Option<String>,
    pub superadmin_password: Option<String>,
    pub llm_timeout: Duration,
    pub upstream_timeout: Duration,
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let llm_provider = match optional("LLM_PROVIDER").as_deref() {
            None | Some("vertex") => LlmProvider::Vertex,
            Some("openrouter") => LlmProvider::OpenRouter,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LLM_PROVIDER",
                    value: other.to_string(),
                })
            }
        };

        let cors_origins = optional("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let upstream_secs = parsed("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?;

        Ok(AppConfig {
            host: optional("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parsed("PORT", DEFAULT_PORT)?,
            mongo_uri: required("MONGODB_URI")?,
            database_name: optional("MONGODB_DATABASE")
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            jwt_secret: required("JWT_SECRET")?,
            cors_origins,
            bcrypt_cost: parsed("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            llm_provider,
            vertex: VertexConfig {
                project_id: optional("GOOGLE_CLOUD_PROJECT_ID"),
                location: optional("VERTEX_AI_LOCATION")
                    .unwrap_or_else(|| DEFAULT_VERTEX_LOCATION.to_string()),
                model: optional("VERTEX_AI_MODEL")
                    .unwrap_or_else(|| DEFAULT_VERTEX_MODEL.to_string()),
                access_token: optional("GOOGLE_CLOUD_ACCESS_TOKEN"),
            },
            openrouter: OpenRouterConfig {
                api_key: optional("OPENROUTER_API_KEY"),
                model: optional("OPENROUTER_MODEL")
                    .unwrap_or_else(|| DEFAULT_OPENROUTER_MODEL.to_string()),
            },
            mail: MailConfig {
                api_url: optional("MAIL_API_URL")
                    .unwrap_or_else(|| DEFAULT_MAIL_API_URL.to_string()),
                api_key: optional("MAIL_API_KEY"),
                from: optional("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            },
            predicthq_api_key: optional("PREDICTHQ_API_KEY"),
            google_api_key: optional("GOOGLE_API_KEY"),
            google_cx: optional("GOOGLE_CX"),
            superadmin_email: optional("SUPERADMIN_EMAIL"),
            superadmin_password: optional("SUPERADMIN_PASSWORD"),
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS.max(upstream_secs)),
            upstream_timeout: Duration::from_secs(upstream_secs),
        })
    }

    /// Configuration used by tests and local tooling; nothing is read from the environment.
    pub fn for_tests() -> Self {
        AppConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            mongo_uri: "mongodb://localhost:27017".to_string(),
            database_name: "travique_test".to_string(),
            jwt_secret: "test_secret".to_string(),
            cors_origins: Vec::new(),
            bcrypt_cost: 4,
            llm_provider: LlmProvider::Vertex,
            vertex: VertexConfig {
                project_id: None,
                location: DEFAULT_VERTEX_LOCATION.to_string(),
                model: DEFAULT_VERTEX_MODEL.to_string(),
                access_token: None,
            },
            openrouter: OpenRouterConfig {
                api_key: None,
                model: DEFAULT_OPENROUTER_MODEL.to_string(),
            },
            mail: MailConfig {
                api_url: DEFAULT_MAIL_API_URL.to_string(),
                api_key: None,
                from: DEFAULT_MAIL_FROM.to_string(),
            },
            predicthq_api_key: None,
            google_api_key: None,
            google_cx: None,
            superadmin_email: None,
            superadmin_password: None,
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "MONGODB_URI",
        "JWT_SECRET",
        "PORT",
        "LLM_PROVIDER",
        "CORS_ORIGINS",
        "MONGODB_DATABASE",
        "UPSTREAM_TIMEOUT_SECS",
    ];

    fn clear() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_missing_mongo_uri_fails() {
        clear();
        env::set_var("JWT_SECRET", "s");
        assert_eq!(
            AppConfig::from_env().unwrap_err(),
            ConfigError::Missing("MONGODB_URI")
        );
        clear();
    }

    #[test]
    #[serial]
    fn test_defaults_applied() {
        clear();
        env::set_var("MONGODB_URI", "mongodb://localhost:27017");
        env::set_var("JWT_SECRET", "s");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.database_name, "travique");
        assert_eq!(config.llm_provider, LlmProvider::Vertex);
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.upstream_timeout, Duration::from_secs(15));
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        clear();
    }

    #[test]
    #[serial]
    fn test_invalid_port_and_provider() {
        clear();
        env::set_var("MONGODB_URI", "mongodb://localhost:27017");
        env::set_var("JWT_SECRET", "s");
        env::set_var("PORT", "eighty");
        assert!(matches!(
            AppConfig::from_env(),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));

        env::remove_var("PORT");
        env::set_var("LLM_PROVIDER", "openrouter");
        env::set_var("CORS_ORIGINS", "http://a.test, http://b.test,");
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.llm_provider, LlmProvider::OpenRouter);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);

        env::set_var("LLM_PROVIDER", "bard");
        assert!(AppConfig::from_env().is_err());
        clear();
    }
}
