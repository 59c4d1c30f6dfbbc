use std::{future::Future, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use teloxide::{requests::ResponseResult, types::Update};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::{PollingConfig, WebhookConfig};
use crate::error::BotError;
use crate::router::{CommandRouter, InboundUpdate};
use crate::tg::ChatApi;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/* ====== Вебхук ====== */

#[derive(Clone)]
struct WebhookState {
    router: Arc<CommandRouter>,
    token: Arc<str>,
    secret: Option<Arc<str>>,
}

/// `POST /{token}` для апдейтов и `GET /healthz`.
pub fn webhook_app(router: Arc<CommandRouter>, token: &str, secret: Option<&str>) -> Router {
    let state = WebhookState { router, token: Arc::from(token), secret: secret.map(Arc::from) };
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/{token}", post(on_update))
        .with_state(state)
}

async fn on_update(
    State(state): State<WebhookState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    if token != *state.token {
        return (StatusCode::NOT_FOUND, "not found");
    }
    if let Some(secret) = state.secret.as_deref() {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(secret) {
            warn!("webhook request with wrong secret token");
            return (StatusCode::FORBIDDEN, "forbidden");
        }
    }

    // 200 в любом случае: Telegram нужен только факт получения
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => handle_update(&state.router, &update).await,
        Err(e) => warn!(error = %e, bytes = body.len(), "malformed update dropped"),
    }
    (StatusCode::OK, "ok")
}

async fn handle_update(router: &CommandRouter, update: &Update) {
    match InboundUpdate::from_update(update) {
        Some(inbound) => {
            let delivery = router.dispatch(&inbound).await;
            debug!(update_id = update.id.0, ?delivery, "update handled");
        }
        None => debug!(update_id = update.id.0, "update without text skipped"),
    }
}

pub async fn bind(cfg: &WebhookConfig) -> Result<TcpListener, BotError> {
    TcpListener::bind(cfg.listen)
        .await
        .map_err(|source| BotError::Bind { addr: cfg.listen, source })
}

/// Обслуживает вебхук до сигнала `shutdown`. Запросы обрабатываются параллельно.
pub async fn serve_webhook<F>(
    listener: TcpListener,
    router: Arc<CommandRouter>,
    token: &str,
    cfg: &WebhookConfig,
    shutdown: F,
) -> Result<(), BotError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = webhook_app(router, token, cfg.secret.as_deref());
    info!(listen = %cfg.listen, "webhook server started");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(BotError::Serve)
}

/* ====== Long polling ====== */

pub struct Poller {
    api: Arc<dyn ChatApi>,
    router: Arc<CommandRouter>,
    cfg: PollingConfig,
    offset: Option<i32>,
}

impl Poller {
    pub fn new(api: Arc<dyn ChatApi>, router: Arc<CommandRouter>, cfg: PollingConfig) -> Self {
        Self { api, router, cfg, offset: None }
    }

    /// Одна пачка апдейтов, строго по порядку. Возвращает размер пачки.
    pub async fn poll_once(&mut self) -> ResponseResult<usize> {
        let updates = self.api.get_updates(self.offset, self.cfg.timeout_secs).await?;
        for update in &updates {
            // сдвигаем offset до обработки: упавший хендлер не должен зациклить пачку
            match i32::try_from(update.id.0).ok().and_then(|id| id.checked_add(1)) {
                Some(next) => self.offset = Some(next),
                None => warn!(update_id = update.id.0, "update id does not fit getUpdates offset, keeping previous"),
            }
            handle_update(&self.router, update).await;
        }
        Ok(updates.len())
    }

    /// Крутится до `shutdown`. Ошибки сети не фатальны: пауза и следующая попытка.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(timeout = self.cfg.timeout_secs, "long polling started");
        let (idle_delay, error_delay) = (self.cfg.idle_delay, self.cfg.error_delay);
        tokio::pin!(shutdown);
        loop {
            let delay = tokio::select! {
                _ = &mut shutdown => break,
                res = self.poll_once() => match res {
                    Ok(0) => Some(idle_delay),
                    Ok(_) => None,
                    Err(e) => {
                        error!(error = %e, "getUpdates failed");
                        Some(error_delay)
                    }
                },
            };
            if let Some(delay) = delay {
                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
        info!("long polling stopped");
    }
}

/* ====== Сигналы ====== */

/// SIGINT (ctrl-c) или SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "SIGTERM handler unavailable, relying on ctrl-c");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}
