use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::config::TmdbConfig;
use crate::error::TmdbError;

const NO_TITLE: &str = "Без названия";
const NO_OVERVIEW: &str = "Описание недоступно.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    /// Сегмент пути в `/search/{..}`.
    pub fn path_segment(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

/// Непустой поисковый запрос.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    text: String,
    kind: MediaKind,
}

impl SearchQuery {
    /// `None`, если после trim ничего не осталось.
    pub fn new(text: &str, kind: MediaKind) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self { text: text.to_string(), kind })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

/// Лучший (первый) результат поиска, уже с подставленными значениями по умолчанию.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub overview: String,
    pub rating: Option<f64>,
    pub poster_path: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug)]
pub enum SearchOutcome {
    Found(SearchResult),
    NotFound,
    TransportError(TmdbError),
}

#[derive(Clone)]
pub struct TmdbClient {
    api_key: String,
    api_base: String,
    language: String,
    http: Client,
}

impl TmdbClient {
    pub fn new(cfg: &TmdbConfig) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(cfg.timeout)
            .user_agent(concat!("kinobot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            api_key: cfg.api_key.clone(),
            api_base: cfg.api_base.clone(),
            language: cfg.language.clone(),
            http,
        })
    }

    /// Один запрос, без повторов. Сетевые ошибки логируются как error, пустой ответ — как debug.
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        match self.fetch_first(query).await {
            Ok(Some(found)) => SearchOutcome::Found(found),
            Ok(None) => {
                debug!(query = query.text(), kind = query.kind().path_segment(), "tmdb: nothing found");
                SearchOutcome::NotFound
            }
            Err(e) => {
                error!(
                    query = query.text(),
                    kind = query.kind().path_segment(),
                    timeout = e.is_timeout(),
                    error = %e,
                    "tmdb search failed"
                );
                SearchOutcome::TransportError(e)
            }
        }
    }

    async fn fetch_first(&self, query: &SearchQuery) -> Result<Option<SearchResult>, TmdbError> {
        let url = format!(
            "{}/search/{}?api_key={}&language={}&query={}&include_adult=false",
            self.api_base,
            query.kind().path_segment(),
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.language),
            urlencoding::encode(query.text()),
        );
        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(TmdbError::Status(resp.status()));
        }
        let data: SearchResp = resp.json().await?;
        Ok(data.results.into_iter().next().map(|raw| raw.into_result(query.kind())))
    }
}

/* ======= DTOs ======= */

#[derive(Deserialize, Debug)]
struct SearchResp {
    #[serde(default)]
    results: Vec<RawResult>,
}

// фильмы и сериалы отличаются именами полей: title/name, release_date/first_air_date
#[derive(Deserialize, Debug)]
struct RawResult {
    title: Option<String>,
    name: Option<String>,
    overview: Option<String>,
    vote_average: Option<f64>,
    vote_count: Option<u64>,
    poster_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
}

impl RawResult {
    fn into_result(self, kind: MediaKind) -> SearchResult {
        let (title, date) = match kind {
            MediaKind::Movie => (self.title.or(self.name), self.release_date),
            MediaKind::Tv => (self.name.or(self.title), self.first_air_date),
        };
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());
        let overview = self
            .overview
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| NO_OVERVIEW.to_string());
        // TMDB отдаёт 0.0 для фильмов без голосов
        let rating = match (self.vote_average, self.vote_count) {
            (Some(_), Some(0)) => None,
            (r, _) => r,
        };
        let poster_path = self.poster_path.filter(|p| !p.trim().is_empty());
        let year = date.as_deref().and_then(|d| d.get(..4)).filter(|y| y.len() == 4).map(str::to_string);
        SearchResult { title, overview, rating, poster_path, year }
    }
}
