//! Общие заглушки для интеграционных тестов: [`RecordingChat`] вместо Telegram и сборка роутера.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kinobot::config::{Config, TmdbConfig};
use kinobot::render::ReplyRenderer;
use kinobot::router::CommandRouter;
use kinobot::tg::ChatApi;
use kinobot::tmdb::TmdbClient;
use reqwest::Url;
use teloxide::requests::ResponseResult;
use teloxide::types::{ChatId, Update};
use teloxide::RequestError;

pub const TOKEN: &str = "123456:test-token";
pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { chat: i64, text: String },
    Photo { chat: i64, url: String, caption: String },
}

/// Записывает всё, что бот отправил, и умеет падать по заказу.
#[derive(Default)]
pub struct RecordingChat {
    pub sent: Mutex<Vec<Sent>>,
    pub calls: Mutex<Vec<String>>,
    pub offsets: Mutex<Vec<Option<i32>>>,
    pub batches: Mutex<VecDeque<Vec<Update>>>,
    pub fail_photo: AtomicBool,
    pub fail_text: AtomicBool,
    pub fail_identity: AtomicBool,
    pub fail_commands: AtomicBool,
    pub fail_set_webhook: AtomicBool,
    pub fail_delete_webhook: AtomicBool,
}

impl RecordingChat {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_batch(&self, batch: Vec<Update>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    fn call(&self, name: impl Into<String>) {
        self.calls.lock().unwrap().push(name.into());
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn bot_username(&self) -> ResponseResult<Option<String>> {
        self.call("get_me");
        if self.fail_identity.load(Ordering::SeqCst) {
            return Err(to_req_err("unauthorized"));
        }
        Ok(Some("KinoBot".into()))
    }

    async fn publish_commands(&self) -> ResponseResult<()> {
        self.call("set_my_commands");
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(to_req_err("too many requests"));
        }
        Ok(())
    }

    async fn set_webhook(&self, url: Url, secret: Option<String>) -> ResponseResult<()> {
        self.call(format!("set_webhook {url} secret={}", secret.is_some()));
        if self.fail_set_webhook.load(Ordering::SeqCst) {
            return Err(to_req_err("bad webhook: HTTPS url must be provided"));
        }
        Ok(())
    }

    async fn delete_webhook(&self) -> ResponseResult<()> {
        self.call("delete_webhook");
        if self.fail_delete_webhook.load(Ordering::SeqCst) {
            return Err(to_req_err("network down"));
        }
        Ok(())
    }

    async fn get_updates(&self, offset: Option<i32>, _timeout_secs: u32) -> ResponseResult<Vec<Update>> {
        self.offsets.lock().unwrap().push(offset);
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn send_text(&self, chat: ChatId, html: &str) -> ResponseResult<()> {
        if self.fail_text.load(Ordering::SeqCst) {
            return Err(to_req_err("chat not found"));
        }
        self.sent.lock().unwrap().push(Sent::Text { chat: chat.0, text: html.to_string() });
        Ok(())
    }

    async fn send_photo(&self, chat: ChatId, photo: Url, caption_html: &str) -> ResponseResult<()> {
        if self.fail_photo.load(Ordering::SeqCst) {
            return Err(to_req_err("wrong file identifier/HTTP URL specified"));
        }
        self.sent.lock().unwrap().push(Sent::Photo {
            chat: chat.0,
            url: photo.to_string(),
            caption: caption_html.to_string(),
        });
        Ok(())
    }
}

pub fn to_req_err(msg: &str) -> RequestError {
    RequestError::Io(Arc::new(std::io::Error::other(msg.to_string())))
}

pub fn tmdb_config(api_base: &str, timeout: Duration) -> TmdbConfig {
    TmdbConfig {
        api_key: "tmdb-key".into(),
        api_base: api_base.into(),
        image_base: IMAGE_BASE.into(),
        language: "ru-RU".into(),
        timeout,
    }
}

pub fn router(chat: &Arc<RecordingChat>, api_base: &str, free_text_search: bool) -> Arc<CommandRouter> {
    router_with_timeout(chat, api_base, free_text_search, Duration::from_secs(5))
}

pub fn router_with_timeout(
    chat: &Arc<RecordingChat>,
    api_base: &str,
    free_text_search: bool,
    timeout: Duration,
) -> Arc<CommandRouter> {
    let api: Arc<dyn ChatApi> = chat.clone();
    let tmdb = TmdbClient::new(&tmdb_config(api_base, timeout)).unwrap();
    Arc::new(CommandRouter::new(
        api,
        tmdb,
        ReplyRenderer::new(IMAGE_BASE),
        Some("KinoBot".into()),
        free_text_search,
    ))
}

pub fn config(vars: &[(&str, &str)], api_base: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::from([
        ("TELEGRAM_TOKEN".to_string(), TOKEN.to_string()),
        ("TMDB_API_KEY".to_string(), "tmdb-key".to_string()),
        ("TMDB_API_BASE".to_string(), api_base.to_string()),
    ]);
    map.extend(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())));
    Config::from_lookup(|k| map.get(k).cloned()).unwrap()
}

pub fn text_update(update_id: u32, chat_id: i64, text: &str) -> Update {
    serde_json::from_str(&update_json(update_id, chat_id, text).to_string()).unwrap()
}

pub fn update_json(update_id: u32, chat_id: i64, text: &str) -> serde_json::Value {
    serde_json::json!({
        "update_id": update_id,
        "message": {
            "message_id": update_id % 1_000_000,
            "date": 1_700_000_000,
            "chat": {"id": chat_id, "type": "private", "first_name": "Тест"},
            "from": {"id": chat_id, "is_bot": false, "first_name": "Тест"},
            "text": text
        }
    })
}
