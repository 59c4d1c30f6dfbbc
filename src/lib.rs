pub mod config;
pub mod error;
pub mod ingest;
pub mod lifecycle;
pub mod render;
pub mod router;
pub mod tg;
pub mod tmdb;

use std::{future::Future, sync::Arc};

use tracing::info;

use crate::config::{Config, RunMode};
use crate::error::BotError;
use crate::lifecycle::LifecycleManager;
use crate::tg::{ChatApi, TelegramApi};
use crate::tmdb::TmdbClient;

/// Собирает клиентов из конфигурации и работает до SIGINT/SIGTERM.
pub async fn run(config: Config) -> Result<(), BotError> {
    let api: Arc<dyn ChatApi> = Arc::new(
        TelegramApi::new(config.telegram_token.clone(), config.telegram_request_timeout()).map_err(BotError::Client)?,
    );
    let tmdb = TmdbClient::new(&config.tmdb).map_err(BotError::Client)?;
    let lifecycle = LifecycleManager::new(config, api.clone(), tmdb);
    serve(&lifecycle, api, ingest::shutdown_signal()).await
}

/// Старт, приём апдейтов до `shutdown`, остановка. Вебхук снимается при любом исходе приёма.
pub async fn serve<F>(lifecycle: &LifecycleManager, api: Arc<dyn ChatApi>, shutdown: F) -> Result<(), BotError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let config = lifecycle.config();
    let served = match &config.mode {
        RunMode::Webhook(w) => {
            // сначала порт, потом setWebhook: Telegram не должен стучаться в пустоту
            let listener = ingest::bind(w).await?;
            let router = lifecycle.start().await?;
            ingest::serve_webhook(listener, router, &config.telegram_token, w, shutdown).await
        }
        RunMode::Polling(p) => {
            let router = lifecycle.start().await?;
            ingest::Poller::new(api, router, p.clone()).run(shutdown).await;
            Ok(())
        }
    };

    lifecycle.stop().await;
    info!("kinobot exited");
    served
}
