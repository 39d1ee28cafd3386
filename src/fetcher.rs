use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::NewsSettings;
use crate::error::FetchError;

const USER_AGENT: &str = "PulseNews/1.0";

// Array fields accepted as the entry list, checked in order.
const ENTRY_FIELDS: &[&str] = &["news", "articles", "results"];

/// One page to fetch. `category` is whatever key the source filters by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub category: String,
    pub page: u32,
}

/// A page as returned by a source, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsPage {
    pub entries: Vec<Value>,
    pub has_more: bool,
    /// Page number the server claims to have served, if it said
    pub page: Option<u32>,
    pub total_available: Option<u64>,
}

/// A remote provider of paginated article entries.
pub trait NewsSource: Send + Sync {
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<NewsPage, FetchError>> + Send;
}

/// The backend's `GET /api/news?limit=&page=&category=` endpoint.
pub struct HttpNewsSource {
    client: Client,
    endpoint: Url,
    page_size: u32,
}

impl HttpNewsSource {
    pub fn new(settings: &NewsSettings) -> anyhow::Result<Self> {
        let client = build_client(settings.timeout())?;
        Self::with_client(client, &settings.base_url, settings.page_size)
    }

    pub fn with_client(client: Client, base_url: &str, page_size: u32) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&format!("{}/api/news", base_url.trim_end_matches('/')))?;
        Ok(Self {
            client,
            endpoint,
            page_size,
        })
    }

    pub fn page_url(&self, request: &PageRequest) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("page", &request.page.to_string())
            .append_pair("category", &request.category);
        url
    }
}

impl NewsSource for HttpNewsSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<NewsPage, FetchError> {
        let url = self.page_url(request);
        info!("Fetching {} page {} from {}", request.category, request.page, url);

        let body = get_json(&self.client, url).await?;
        let page = parse_page(body)?;

        debug!(
            "Received {} entries (page {:?}, has_more {}, total {:?})",
            page.entries.len(),
            page.page,
            page.has_more,
            page.total_available
        );
        if let Some(served) = page.page {
            if served != request.page {
                warn!("Requested page {} but server reported page {}", request.page, served);
            }
        }

        Ok(page)
    }
}

pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// GETs `url` and decodes the body as JSON, classifying every failure.
pub async fn get_json(client: &Client, url: Url) -> Result<Value, FetchError> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Checks the top-level shape of a page body and pulls out its parts.
pub fn parse_page(body: Value) -> Result<NewsPage, FetchError> {
    let Value::Object(mut fields) = body else {
        return Err(FetchError::Malformed("expected a JSON object".to_string()));
    };

    let Some(name) = ENTRY_FIELDS.iter().find(|name| fields.contains_key(**name)) else {
        return Err(FetchError::Malformed(
            "missing news array in response".to_string(),
        ));
    };

    let entries = match fields.remove(*name) {
        Some(Value::Array(entries)) => entries,
        _ => {
            return Err(FetchError::Malformed(format!(
                "field `{}` is not an array",
                name
            )))
        }
    };

    Ok(NewsPage {
        entries,
        has_more: continuation_flag(fields.get("has_more")),
        page: fields
            .get("page")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok()),
        total_available: fields.get("total_available").and_then(Value::as_u64),
    })
}

/// Interprets a loosely typed continuation flag. Anything unrecognized is false.
pub fn continuation_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |n| n != 0.0),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        ),
        _ => false,
    }
}
