use std::{net::SocketAddr, time::Duration};

use reqwest::Url;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
const DEFAULT_TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";
const DEFAULT_TMDB_LANGUAGE: &str = "ru-RU";
const DEFAULT_TMDB_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_TIMEOUT_SECS: u32 = 30;
/// Таймаут HTTP-клиента teloxide по умолчанию.
const TELEGRAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(17);
/// Запас сверх long polling таймаута, чтобы клиент не обрывал `getUpdates` раньше Telegram.
const POLL_REQUEST_MARGIN: Duration = Duration::from_secs(10);

/// Вся конфигурация процесса. Собирается один раз при старте и раздаётся компонентам.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub tmdb: TmdbConfig,
    pub mode: RunMode,
    /// Искать фильм по обычному тексту без команды.
    pub free_text_search: bool,
}

#[derive(Debug, Clone)]
pub struct TmdbConfig {
    pub api_key: String,
    pub api_base: String,
    pub image_base: String,
    pub language: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub enum RunMode {
    Webhook(WebhookConfig),
    Polling(PollingConfig),
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Полный адрес, который регистрируется в Telegram: `<WEBHOOK_URL>/<token>`.
    pub url: Url,
    pub listen: SocketAddr,
    pub secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub timeout_secs: u32,
    pub idle_delay: Duration,
    pub error_delay: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            idle_delay: Duration::from_secs(1),
            error_delay: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Таймаут HTTP-клиента для Bot API. В режиме polling он обязан быть больше таймаута `getUpdates`.
    pub fn telegram_request_timeout(&self) -> Duration {
        match &self.mode {
            RunMode::Polling(p) => {
                (Duration::from_secs(p.timeout_secs.into()) + POLL_REQUEST_MARGIN).max(TELEGRAM_REQUEST_TIMEOUT)
            }
            RunMode::Webhook(_) => TELEGRAM_REQUEST_TIMEOUT,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Сборка из произвольного источника переменных (в тестах — из `HashMap`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_token = get("TELEGRAM_TOKEN")
            .or_else(|| get("TELOXIDE_TOKEN"))
            .ok_or(ConfigError::Missing("TELEGRAM_TOKEN"))?;
        let api_key = get("TMDB_API_KEY").ok_or(ConfigError::Missing("TMDB_API_KEY"))?;

        let tmdb = TmdbConfig {
            api_key,
            api_base: get("TMDB_API_BASE")
                .unwrap_or_else(|| DEFAULT_TMDB_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            image_base: get("TMDB_IMAGE_BASE").unwrap_or_else(|| DEFAULT_TMDB_IMAGE_BASE.to_string()),
            language: get("TMDB_LANGUAGE").unwrap_or_else(|| DEFAULT_TMDB_LANGUAGE.to_string()),
            timeout: Duration::from_secs(parse_or("TMDB_TIMEOUT_SECS", get("TMDB_TIMEOUT_SECS"), DEFAULT_TMDB_TIMEOUT_SECS)?),
        };

        let webhook_base = get("WEBHOOK_URL");
        let mode = match get("BOT_MODE").map(|m| m.to_ascii_lowercase()) {
            Some(m) if m == "webhook" => "webhook",
            Some(m) if m == "polling" || m == "poll" => "polling",
            Some(m) => {
                return Err(ConfigError::Invalid {
                    name: "BOT_MODE",
                    value: m,
                    reason: "expected `webhook` or `polling`".into(),
                })
            }
            None if webhook_base.is_some() => "webhook",
            None => "polling",
        };

        let mode = if mode == "webhook" {
            let base = webhook_base.ok_or(ConfigError::Missing("WEBHOOK_URL"))?;
            let url = webhook_url(&base, &telegram_token)?;
            let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
            RunMode::Webhook(WebhookConfig {
                url,
                listen: SocketAddr::from(([0, 0, 0, 0], port)),
                secret: get("WEBHOOK_SECRET"),
            })
        } else {
            RunMode::Polling(PollingConfig {
                timeout_secs: parse_or("POLL_TIMEOUT_SECS", get("POLL_TIMEOUT_SECS"), DEFAULT_POLL_TIMEOUT_SECS)?,
                ..PollingConfig::default()
            })
        };

        let free_text_search = match get("FREE_TEXT_SEARCH") {
            None => false,
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                name: "FREE_TEXT_SEARCH",
                value: v.clone(),
                reason: "expected a boolean".into(),
            })?,
        };

        Ok(Self { telegram_token, tmdb, mode, free_text_search })
    }
}

fn webhook_url(base: &str, token: &str) -> Result<Url, ConfigError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), token);
    let url = Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        name: "WEBHOOK_URL",
        value: base.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Invalid {
            name: "WEBHOOK_URL",
            value: base.to_string(),
            reason: "expected an http(s) url".into(),
        });
    }
    Ok(url)
}

fn parse_or<T: std::str::FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: v.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
