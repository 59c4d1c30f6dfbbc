use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use teloxide::{
    prelude::*,
    types::{InputFile, ParseMode, Update},
    utils::command::BotCommands,
};

use crate::router::Command;

/// Всё, что бот делает с Telegram. Реализация по умолчанию — [`TelegramApi`] поверх teloxide.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// username бота (для команд вида `/film@bot`).
    async fn bot_username(&self) -> ResponseResult<Option<String>>;
    /// Публикует список команд в меню клиента.
    async fn publish_commands(&self) -> ResponseResult<()>;
    async fn set_webhook(&self, url: Url, secret: Option<String>) -> ResponseResult<()>;
    async fn delete_webhook(&self) -> ResponseResult<()>;
    async fn get_updates(&self, offset: Option<i32>, timeout_secs: u32) -> ResponseResult<Vec<Update>>;
    async fn send_text(&self, chat: ChatId, html: &str) -> ResponseResult<()>;
    async fn send_photo(&self, chat: ChatId, photo: Url, caption_html: &str) -> ResponseResult<()>;
}

#[derive(Clone)]
pub struct TelegramApi {
    bot: Bot,
}

impl TelegramApi {
    /// `request_timeout` должен быть больше таймаута long polling, иначе `getUpdates` обрывается клиентом.
    pub fn new(token: impl Into<String>, request_timeout: Duration) -> reqwest::Result<Self> {
        let client = teloxide::net::default_reqwest_settings().timeout(request_timeout).build()?;
        Ok(Self { bot: Bot::with_client(token, client) })
    }
}

#[async_trait]
impl ChatApi for TelegramApi {
    async fn bot_username(&self) -> ResponseResult<Option<String>> {
        let me = self.bot.get_me().await?;
        Ok(me.user.username.clone())
    }

    async fn publish_commands(&self) -> ResponseResult<()> {
        self.bot.set_my_commands(Command::bot_commands()).await?;
        Ok(())
    }

    async fn set_webhook(&self, url: Url, secret: Option<String>) -> ResponseResult<()> {
        let mut req = self.bot.set_webhook(url);
        if let Some(secret) = secret {
            req = req.secret_token(secret);
        }
        req.await?;
        Ok(())
    }

    async fn delete_webhook(&self) -> ResponseResult<()> {
        self.bot.delete_webhook().await?;
        Ok(())
    }

    async fn get_updates(&self, offset: Option<i32>, timeout_secs: u32) -> ResponseResult<Vec<Update>> {
        let mut req = self.bot.get_updates().timeout(timeout_secs);
        if let Some(offset) = offset {
            req = req.offset(offset);
        }
        req.await
    }

    async fn send_text(&self, chat: ChatId, html: &str) -> ResponseResult<()> {
        self.bot.send_message(chat, html).parse_mode(ParseMode::Html).await?;
        Ok(())
    }

    async fn send_photo(&self, chat: ChatId, photo: Url, caption_html: &str) -> ResponseResult<()> {
        self.bot
            .send_photo(chat, InputFile::url(photo))
            .caption(caption_html)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}
