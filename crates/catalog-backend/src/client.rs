use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use catalog_core::config::BackendSettings;
use catalog_core::traits::{SearchBackend, SearchRequest, WorkHitsRequest};
use catalog_core::types::{Collection, Hit, SearchResponse, Vocabulary};
use catalog_core::{Error, Result};

use crate::query::{search_body, work_hits_body};
use crate::wire::{SearchBody, SearchReply, VocabularyReply, WireCollection};

/// `SearchBackend` over HTTP: the page index for searches, the API for the
/// vocabulary and collection tree.
#[derive(Clone)]
pub struct HttpBackend {
    http: Client,
    search_endpoint: String,
    api_base: String,
    timeout_secs: u64,
}

fn base(raw: &str, what: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim()).map_err(|e| Error::InvalidConfig(format!("{what} {raw:?}: {e}")))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

impl HttpBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let search_base = base(&settings.search_url, "backend.search_url")?;
        let api_base = base(&settings.api_url, "backend.api_url")?;

        let mut headers = HeaderMap::new();
        if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| Error::InvalidConfig(format!("backend.api_key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            search_endpoint: format!("{search_base}/indexes/{}/search", settings.index),
            api_base,
            timeout_secs: settings.timeout_secs,
        })
    }

    fn transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Transport(format!("request timed out after {} seconds", self.timeout_secs))
        } else if err.is_connect() {
            Error::Transport(format!("failed to connect: {err}"))
        } else {
            Error::Transport(err.to_string())
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.map_err(|e| self.transport(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport(e))?;
        if !status.is_success() {
            return Err(Error::Backend { status: status.as_u16(), message: body.trim().to_string() });
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn post_search(&self, body: &SearchBody) -> Result<SearchReply> {
        self.send(self.http.post(&self.search_endpoint).json(body)).await
    }

    async fn get_api<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.http.get(format!("{}/{path}", self.api_base))).await
    }
}

#[async_trait]
impl SearchBackend for HttpBackend {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let body = search_body(request);
        let started = Instant::now();
        let reply = self.post_search(&body).await?;
        let response =
            reply.into_response(request.language, request.filter.page.max(1), request.hits_per_page.max(1));
        debug!(
            page = response.page,
            hits = response.hits.len(),
            total_hits = response.total_hits,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "search completed"
        );
        Ok(response)
    }

    async fn work_hits(&self, request: &WorkHitsRequest) -> Result<Vec<Hit>> {
        let reply = self.post_search(&work_hits_body(request)).await?;
        let hits: Vec<Hit> = reply.hits.into_iter().enumerate().map(|(i, h)| h.into_hit(i, None)).collect();
        debug!(work_id = %request.work_id, hits = hits.len(), "work hits fetched");
        Ok(hits)
    }

    async fn vocabulary(&self) -> Result<Vocabulary> {
        let reply: VocabularyReply = self.get_api("vocabulary").await?;
        Ok(reply.into_vocabulary())
    }

    async fn collections(&self) -> Result<Vec<Collection>> {
        let reply: Vec<WireCollection> = self.get_api("collections").await?;
        Ok(reply.into_iter().map(Collection::from).collect())
    }
}
