use reqwest::Url;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use crate::tmdb::{MediaKind, SearchOutcome, SearchResult};

/// Лимит текстового сообщения Telegram, в UTF-16 code units.
const TEXT_LIMIT: usize = 4096;
const ELLIPSIS: &str = "…";
const NO_RATING: &str = "—";

/// Готовый ответ: подпись (HTML) и, возможно, постер.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub caption: String,
    pub image_url: Option<Url>,
}

impl OutboundReply {
    pub fn text(caption: impl Into<String>) -> Self {
        Self { caption: caption.into(), image_url: None }
    }
}

#[derive(Debug, Clone)]
pub struct ReplyRenderer {
    image_base: String,
}

impl ReplyRenderer {
    pub fn new(image_base: impl Into<String>) -> Self {
        Self { image_base: image_base.into() }
    }

    pub fn render(&self, outcome: &SearchOutcome, kind: MediaKind) -> OutboundReply {
        match outcome {
            SearchOutcome::Found(r) => self.render_found(r, kind),
            SearchOutcome::NotFound | SearchOutcome::TransportError(_) => OutboundReply::text(not_found_text(kind)),
        }
    }

    fn render_found(&self, r: &SearchResult, kind: MediaKind) -> OutboundReply {
        let glyph = match kind {
            MediaKind::Movie => "🎬",
            MediaKind::Tv => "📺",
        };
        let title = match &r.year {
            Some(y) => format!("<b>{}</b> ({})", html_escape(&r.title), y),
            None => format!("<b>{}</b>", html_escape(&r.title)),
        };
        let rating = r.rating.map(|v| format!("{v:.1}")).unwrap_or_else(|| NO_RATING.to_string());
        let head = format!("{glyph} {title}\n\n⭐ Рейтинг: {rating}\n\n");
        let overview = clip_escaped(&r.overview, TEXT_LIMIT.saturating_sub(utf16_len(&head)));
        let caption = head + &overview;

        OutboundReply { caption, image_url: r.poster_path.as_deref().and_then(|p| self.poster_url(p)) }
    }

    /// База + путь постера, склейка без нормализации слэшей.
    pub fn poster_url(&self, poster_path: &str) -> Option<Url> {
        let raw = format!("{}{}", self.image_base, poster_path);
        match Url::parse(&raw) {
            Ok(u) => Some(u),
            Err(e) => {
                warn!(url = %raw, error = %e, "poster url is not valid, sending text only");
                None
            }
        }
    }
}

pub fn not_found_text(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "Фильм не найден",
        MediaKind::Tv => "Сериал не найден",
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Экранирует и укладывает в `budget` UTF-16 единиц. Режем сырой текст по графемам,
/// поэтому сущность `&amp;` и эмодзи не рвутся пополам.
fn clip_escaped(raw: &str, budget: usize) -> String {
    let escaped = html_escape(raw);
    if utf16_len(&escaped) <= budget {
        return escaped;
    }
    let budget = budget.saturating_sub(utf16_len(ELLIPSIS));
    let mut out = String::new();
    let mut used = 0;
    for g in raw.graphemes(true) {
        let piece = html_escape(g);
        let len = utf16_len(&piece);
        if used + len > budget {
            break;
        }
        used += len;
        out.push_str(&piece);
    }
    out + ELLIPSIS
}
