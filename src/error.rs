use thiserror::Error;

/// Ошибки конфигурации: процесс не стартует.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),

    #[error("environment variable {name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Ошибки запроса к TMDB. Для пользователя выглядят как «не найдено».
#[derive(Debug, Error)]
pub enum TmdbError {
    #[error("tmdb responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("tmdb request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl TmdbError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TmdbError::Http(e) if e.is_timeout())
    }
}

/// Ошибки жизненного цикла бота (старт/остановка, сервер).
#[derive(Debug, Error)]
pub enum BotError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to fetch bot identity: {0}")]
    Identity(#[source] teloxide::RequestError),

    #[error("failed to register update channel: {0}")]
    Registration(#[source] teloxide::RequestError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("webhook server failed: {0}")]
    Serve(#[source] std::io::Error),
}
