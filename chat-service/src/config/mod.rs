use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Default Gemini model for chat replies.
const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";

/// Default upper bound on MongoDB server selection during connect.
const DEFAULT_MONGO_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub google: GoogleConfig,
    pub models: ModelConfig,
    /// `None` disables persistence entirely.
    pub mongodb: Option<MongoConfig>,
    pub http: HttpConfig,
    pub persistence: PersistencePolicyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub text_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Answer preflight requests and attach permissive CORS headers.
    pub cors_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistencePolicyConfig {
    /// Return the generated reply even when recording the exchange fails.
    pub return_reply_on_write_failure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub otlp_endpoint: Option<String>,
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let mongodb = match optional_env("MONGODB_URI") {
            Some(uri) => Some(MongoConfig {
                uri,
                database: get_env("MONGODB_DATABASE", Some("chatbot"), false)?,
                collection: get_env("MONGODB_COLLECTION", Some("chats"), false)?,
                connect_timeout_secs: parse_env(
                    "MONGODB_CONNECT_TIMEOUT_SECS",
                    DEFAULT_MONGO_CONNECT_TIMEOUT_SECS,
                )?,
            }),
            None => None,
        };

        Ok(ChatConfig {
            common: common_config,
            google: GoogleConfig {
                api_key: get_env("GEMINI_API_KEY", None, is_prod)?,
            },
            models: ModelConfig {
                text_model: get_env("GEMINI_MODEL", Some(DEFAULT_TEXT_MODEL), is_prod)?,
            },
            mongodb,
            http: HttpConfig {
                cors_enabled: parse_env("CORS_ENABLED", true)?,
            },
            persistence: PersistencePolicyConfig {
                return_reply_on_write_failure: parse_env(
                    "CHAT_RETURN_REPLY_ON_WRITE_FAILURE",
                    false,
                )?,
            },
            logging: LoggingConfig {
                level: get_env("LOG_LEVEL", Some("info"), false)?,
                otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            },
        })
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_env_falls_back_to_default() {
        let value: bool = parse_env("CHAT_SERVICE_TEST_UNSET_FLAG", true).unwrap();
        assert!(value);
    }

    #[test]
    fn parse_env_rejects_garbage() {
        std::env::set_var("CHAT_SERVICE_TEST_BAD_FLAG", "maybe");
        let result: Result<bool, _> = parse_env("CHAT_SERVICE_TEST_BAD_FLAG", false);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn get_env_requires_value_without_default() {
        let result = get_env("CHAT_SERVICE_TEST_MISSING_KEY", None, false);
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn get_env_ignores_default_in_prod() {
        let result = get_env("CHAT_SERVICE_TEST_MISSING_MODEL", Some("x"), true);
        assert!(result.is_err());
    }
}
