use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::{
    types::{ChatId, Update, UpdateKind},
    utils::command::BotCommands,
};
use tracing::{debug, error, warn};

use crate::render::{OutboundReply, ReplyRenderer};
use crate::tg::ChatApi;
use crate::tmdb::{MediaKind, SearchQuery, TmdbClient};

const GREETING: &str = "Привет! Я Кинобот.\n\
    Чтобы найти фильм — напиши /film название фильма\n\
    Чтобы найти сериал — напиши /tv название сериала";

// /token[@bot] [аргументы]
static COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([^\s@]+)(?:@(\S*))?(?:\s+([\s\S]*))?$").expect("command regex"));

/* ====== Команды ====== */
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Команды:")]
pub enum Command {
    #[command(description = "приветствие")]
    Start,
    #[command(description = "помощь")]
    Help,
    #[command(description = "найти фильм: /film название")]
    Film,
    #[command(description = "найти сериал: /tv название")]
    Tv,
}

impl Command {
    /// Токен без слэша, регистр не важен. `/movie` и `/series` — синонимы.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "film" | "movie" => Some(Command::Film),
            "tv" | "series" => Some(Command::Tv),
            _ => None,
        }
    }

    fn media_kind(self) -> Option<MediaKind> {
        match self {
            Command::Film => Some(MediaKind::Movie),
            Command::Tv => Some(MediaKind::Tv),
            Command::Start | Command::Help => None,
        }
    }
}

/// То, что нужно роутеру из апдейта Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub chat_id: ChatId,
    pub command: Option<String>,
    /// `bot` из `/film@bot`.
    pub addressee: Option<String>,
    pub args: String,
}

impl InboundUpdate {
    /// Только сообщения с текстом или подписью; остальное — `None`.
    pub fn from_update(update: &Update) -> Option<Self> {
        let UpdateKind::Message(msg) = &update.kind else { return None };
        let text = msg.text().or_else(|| msg.caption())?;
        Some(Self::from_text(msg.chat.id, text))
    }

    pub fn from_text(chat_id: ChatId, text: &str) -> Self {
        if !text.starts_with('/') {
            return Self { chat_id, command: None, addressee: None, args: text.trim().to_string() };
        }
        match COMMAND_RE.captures(text) {
            Some(caps) => Self {
                chat_id,
                command: caps.get(1).map(|m| m.as_str().to_string()),
                addressee: caps.get(2).map(|m| m.as_str().to_string()),
                args: caps.get(3).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            },
            // одиночный «/» и прочий мусор: команда без имени, её никто не обработает
            None => Self { chat_id, command: Some(String::new()), addressee: None, args: String::new() },
        }
    }
}

/// Что сделать с апдейтом. Вычисляется без побочных эффектов.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Greeting,
    Help,
    UsageHint(MediaKind),
    Search(SearchQuery),
    Ignore,
}

/// Чем закончилась отправка ответа.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Ignored,
    Text,
    Photo,
    /// Фото не ушло, отправили тот же текст без картинки.
    FellBackToText,
    /// Не ушло ничего.
    Dropped,
}

pub struct CommandRouter {
    api: Arc<dyn ChatApi>,
    tmdb: TmdbClient,
    renderer: ReplyRenderer,
    bot_username: Option<String>,
    free_text_search: bool,
}

impl CommandRouter {
    pub fn new(
        api: Arc<dyn ChatApi>,
        tmdb: TmdbClient,
        renderer: ReplyRenderer,
        bot_username: Option<String>,
        free_text_search: bool,
    ) -> Self {
        Self { api, tmdb, renderer, bot_username, free_text_search }
    }

    pub fn route(&self, update: &InboundUpdate) -> Route {
        let Some(token) = update.command.as_deref() else {
            if !self.free_text_search {
                return Route::Ignore;
            }
            return SearchQuery::new(&update.args, MediaKind::Movie).map_or(Route::Ignore, Route::Search);
        };

        // команда другому боту в группе
        if let (Some(to), Some(me)) = (update.addressee.as_deref(), self.bot_username.as_deref()) {
            if !to.eq_ignore_ascii_case(me) {
                return Route::Ignore;
            }
        }

        let Some(cmd) = Command::from_token(token) else { return Route::Ignore };
        match cmd.media_kind() {
            Some(kind) => SearchQuery::new(&update.args, kind).map_or(Route::UsageHint(kind), Route::Search),
            None if cmd == Command::Start => Route::Greeting,
            None => Route::Help,
        }
    }

    pub async fn dispatch(&self, update: &InboundUpdate) -> Delivery {
        let route = self.route(update);
        debug!(chat = update.chat_id.0, ?route, "routed update");
        let reply = match route {
            Route::Ignore => return Delivery::Ignored,
            Route::Greeting => OutboundReply::text(GREETING),
            Route::Help => OutboundReply::text(Command::descriptions().to_string()),
            Route::UsageHint(kind) => OutboundReply::text(usage_hint(kind)),
            Route::Search(query) => {
                let outcome = self.tmdb.search(&query).await;
                self.renderer.render(&outcome, query.kind())
            }
        };
        self.deliver(update.chat_id, &reply).await
    }

    /// Фото с подписью; если Telegram его не принял — тот же текст отдельным сообщением.
    pub async fn deliver(&self, chat: ChatId, reply: &OutboundReply) -> Delivery {
        if let Some(url) = &reply.image_url {
            match self.api.send_photo(chat, url.clone(), &reply.caption).await {
                Ok(()) => return Delivery::Photo,
                Err(e) => warn!(chat = chat.0, %url, error = %e, "send_photo failed, falling back to text"),
            }
            return match self.api.send_text(chat, &reply.caption).await {
                Ok(()) => Delivery::FellBackToText,
                Err(e) => {
                    error!(chat = chat.0, error = %e, "fallback text send failed, reply dropped");
                    Delivery::Dropped
                }
            };
        }
        match self.api.send_text(chat, &reply.caption).await {
            Ok(()) => Delivery::Text,
            Err(e) => {
                error!(chat = chat.0, error = %e, "send_text failed, reply dropped");
                Delivery::Dropped
            }
        }
    }
}

pub fn usage_hint(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "Пожалуйста, укажи название фильма после команды /film",
        MediaKind::Tv => "Пожалуйста, укажи название сериала после команды /tv",
    }
}
