use std::path::PathBuf;
use std::time::Duration;

use teloxide::types::ChatId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is missing")]
    Missing(&'static str),
    #[error("{0} environment variable is not valid: {1}")]
    Invalid(&'static str, String),
}

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    /// Private chat that receives notifications and accepts commands.
    pub operator_chat: ChatId,
    pub registry_file: PathBuf,
    /// `None` disables the polling fallback; the event-driven path always
    /// runs.
    pub poll_interval: Option<Duration>,
    pub health_port: u16,
    /// Keep-alive target; pinging is off without it.
    pub external_url: Option<String>,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = required("BOT_TOKEN")?;
        let operator_chat = ChatId(parse("OPERATOR_CHAT_ID", required("OPERATOR_CHAT_ID")?)?);

        let registry_file = optional("REGISTRY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("monitored_groups.json"));

        let poll_interval = match optional("POLL_INTERVAL_SECS") {
            Some(value) => {
                let secs: u64 = parse("POLL_INTERVAL_SECS", value)?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            None => None,
        };

        let health_port = match optional("PORT") {
            Some(value) => parse("PORT", value)?,
            None => 3000,
        };

        Ok(Self {
            bot_token,
            operator_chat,
            registry_file,
            poll_interval,
            health_port,
            external_url: optional("EXTERNAL_URL"),
        })
    }
}
