//! Запуск и остановка бота.
//!
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`. Вебхук регистрируется в
//! [`LifecycleManager::start`] и снимается в [`LifecycleManager::stop`], который вызывается
//! при любом завершении приёма апдейтов, в том числе аварийном.

use std::sync::Arc;

use reqwest::Url;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{Config, RunMode};
use crate::error::BotError;
use crate::render::ReplyRenderer;
use crate::router::CommandRouter;
use crate::tg::ChatApi;
use crate::tmdb::TmdbClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Текущая регистрация вебхука в Telegram. На токен — максимум одна, повторная перезаписывает.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookRegistration {
    pub registered: bool,
    pub url: Option<Url>,
}

pub struct LifecycleManager {
    config: Config,
    api: Arc<dyn ChatApi>,
    tmdb: TmdbClient,
    state: RwLock<LifecycleState>,
    registration: RwLock<WebhookRegistration>,
}

impl LifecycleManager {
    pub fn new(config: Config, api: Arc<dyn ChatApi>, tmdb: TmdbClient) -> Self {
        Self {
            config,
            api,
            tmdb,
            state: RwLock::new(LifecycleState::Stopped),
            registration: RwLock::new(WebhookRegistration::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub async fn registration(&self) -> WebhookRegistration {
        self.registration.read().await.clone()
    }

    /// Собирает роутер и регистрирует канал доставки апдейтов. Любая ошибка здесь фатальна.
    pub async fn start(&self) -> Result<Arc<CommandRouter>, BotError> {
        self.set_state(LifecycleState::Starting).await;
        match self.try_start().await {
            Ok(router) => {
                self.set_state(LifecycleState::Running).await;
                Ok(router)
            }
            Err(e) => {
                self.set_state(LifecycleState::Stopped).await;
                Err(e)
            }
        }
    }

    async fn try_start(&self) -> Result<Arc<CommandRouter>, BotError> {
        let username = self.api.bot_username().await.map_err(BotError::Identity)?;
        info!(username = username.as_deref().unwrap_or("<none>"), "bot session ready");

        let router = Arc::new(CommandRouter::new(
            self.api.clone(),
            self.tmdb.clone(),
            ReplyRenderer::new(self.config.tmdb.image_base.clone()),
            username,
            self.config.free_text_search,
        ));

        // меню команд — удобство, не повод падать
        if let Err(e) = self.api.publish_commands().await {
            warn!(error = %e, "failed to publish command list");
        }

        match &self.config.mode {
            RunMode::Webhook(w) => {
                self.api
                    .set_webhook(w.url.clone(), w.secret.clone())
                    .await
                    .map_err(BotError::Registration)?;
                *self.registration.write().await = WebhookRegistration { registered: true, url: Some(w.url.clone()) };
                info!(listen = %w.listen, "webhook registered");
            }
            RunMode::Polling(_) => {
                // getUpdates не работает, пока висит старый вебхук
                self.api.delete_webhook().await.map_err(BotError::Registration)?;
                info!("webhook cleared, using long polling");
            }
        }
        Ok(router)
    }

    /// Снимает вебхук. Ошибки только логируются, выход процесса не блокируется. Повторный вызов ничего не делает.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write().await;
            if matches!(*state, LifecycleState::Stopped | LifecycleState::Stopping) {
                return;
            }
            *state = LifecycleState::Stopping;
        }

        let registration = self.registration().await;
        if registration.registered {
            match self.api.delete_webhook().await {
                Ok(()) => info!("webhook deleted"),
                Err(e) => warn!(error = %e, "failed to delete webhook"),
            }
        }
        *self.registration.write().await = WebhookRegistration::default();
        self.set_state(LifecycleState::Stopped).await;
        info!("bot stopped");
    }

    async fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write().await;
        tracing::debug!(from = ?*state, to = ?next, "lifecycle transition");
        *state = next;
    }
}
