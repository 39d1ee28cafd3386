use reqwest::Client;
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::config::LocalSettings;
use crate::controller::FeedController;
use crate::db::Database;
use crate::error::FetchError;
use crate::feed::Completion;
use crate::fetcher::{build_client, get_json, parse_page, NewsPage, NewsSource, PageRequest};

/// City news from a newsdata.io style search API.
///
/// The request's category is the city name, used as the search query. The
/// provider paginates with opaque tokens, so only the first page is ever
/// fetched and `has_more` is always false.
pub struct LocalNewsSource {
    client: Client,
    endpoint: Url,
    api_key: String,
    country: String,
    language: String,
    page_size: u32,
}

impl LocalNewsSource {
    pub fn new(settings: &LocalSettings) -> anyhow::Result<Self> {
        let client = build_client(settings.timeout())?;
        Self::with_client(client, settings)
    }

    pub fn with_client(client: Client, settings: &LocalSettings) -> anyhow::Result<Self> {
        Ok(Self {
            client,
            endpoint: Url::parse(&settings.base_url)?,
            api_key: settings.api_key.clone(),
            country: settings.country.clone(),
            language: settings.language.clone(),
            page_size: settings.page_size,
        })
    }

    pub fn city_url(&self, city: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("apikey", &self.api_key)
            .append_pair("country", &self.country)
            .append_pair("language", &self.language)
            .append_pair("q", city)
            .append_pair("page", "1")
            .append_pair("pageSize", &self.page_size.to_string());
        url
    }
}

impl NewsSource for LocalNewsSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<NewsPage, FetchError> {
        if request.page > 1 {
            return Ok(NewsPage::default());
        }

        // The URL carries the API key, keep it out of the logs
        info!("Fetching local news for {}", request.category);
        let body = get_json(&self.client, self.city_url(&request.category)).await?;

        if body.get("status").and_then(Value::as_str) == Some("error") {
            let message = body
                .pointer("/results/message")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider error");
            return Err(FetchError::Malformed(format!("provider error: {}", message)));
        }

        let mut page = parse_page(body)?;
        page.has_more = false;
        Ok(page)
    }
}

/// The local feed together with the cities a user may pick from.
pub struct LocalNews {
    pub feed: FeedController<LocalNewsSource>,
    cities: Vec<String>,
}

impl LocalNews {
    pub fn new(settings: &LocalSettings) -> anyhow::Result<Self> {
        let source = LocalNewsSource::new(settings)?;
        Ok(Self::with_source(source, settings.cities.clone()))
    }

    pub fn with_source(source: LocalNewsSource, cities: Vec<String>) -> Self {
        // No city until one is picked or restored
        Self {
            feed: FeedController::new(source, ""),
            cities,
        }
    }

    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    pub fn is_known_city(&self, city: &str) -> bool {
        self.cities.iter().any(|c| c == city)
    }

    /// Loads news for the city saved by a previous run, if it is still offered.
    pub async fn restore_city(&self, db: &Database) -> anyhow::Result<Option<Completion>> {
        match db.selected_city().await? {
            Some(city) if self.is_known_city(&city) => {
                info!("Restoring local news for {}", city);
                Ok(Some(self.feed.select_category(&city).await))
            }
            Some(city) => {
                warn!("Saved city {} is no longer offered, ignoring", city);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedStatus;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> LocalSettings {
        LocalSettings {
            api_key: "test-key".to_string(),
            base_url: base_url.to_string(),
            country: "in".to_string(),
            language: "en".to_string(),
            page_size: 20,
            timeout_secs: 5,
            cities: vec!["Jaipur".to_string(), "Kota".to_string()],
        }
    }

    fn source_for(server: &MockServer) -> LocalNewsSource {
        let client = build_client(Duration::from_secs(5)).unwrap();
        LocalNewsSource::with_client(client, &settings(&server.uri())).unwrap()
    }

    fn city(name: &str, page: u32) -> PageRequest {
        PageRequest {
            category: name.to_string(),
            page,
        }
    }

    #[test]
    fn test_city_url() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let source =
            LocalNewsSource::with_client(client, &settings("https://newsdata.io/api/1/news"))
                .unwrap();

        assert_eq!(
            source.city_url("Sikar").as_str(),
            "https://newsdata.io/api/1/news?apikey=test-key&country=in&language=en&q=Sikar&page=1&pageSize=20"
        );
    }

    #[test]
    fn test_known_cities() {
        let client = build_client(Duration::from_secs(1)).unwrap();
        let base = settings("https://newsdata.io/api/1/news");
        let source = LocalNewsSource::with_client(client, &base).unwrap();
        let local = LocalNews::with_source(source, base.cities.clone());

        assert!(local.is_known_city("Jaipur"));
        assert!(!local.is_known_city("jaipur"));
        assert!(!local.is_known_city("Mumbai"));
        assert_eq!(local.cities().len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_city_news() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "Jaipur"))
            .and(query_param("apikey", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "totalResults": 2,
                "results": [
                    {
                        "article_id": "n1",
                        "title": "Jaipur metro extension",
                        "link": "https://local.example.com/n1",
                        "description": "Phase two",
                        "image_url": "https://img.example.com/n1.jpg",
                        "source_id": "rajasthanpatrika",
                        "pubDate": "2024-12-09 08:00:00"
                    },
                    { "article_id": "n2", "title": "Pink city festival" }
                ],
                "nextPage": "token123"
            })))
            .mount(&mock_server)
            .await;

        let page = source_for(&mock_server)
            .fetch_page(&city("Jaipur", 1))
            .await
            .unwrap();

        assert_eq!(page.entries.len(), 2);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_provider_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "results": { "message": "API key is invalid", "code": "Unauthorized" }
            })))
            .mount(&mock_server)
            .await;

        let err = source_for(&mock_server)
            .fetch_page(&city("Kota", 1))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Malformed response: provider error: API key is invalid"
        );
    }

    #[tokio::test]
    async fn test_later_pages_are_empty_without_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&mock_server)
            .await;

        let page = source_for(&mock_server)
            .fetch_page(&city("Kota", 2))
            .await
            .unwrap();

        assert!(page.entries.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_local_feed_normalizes_city_articles() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "results": [{
                    "article_id": "n1",
                    "title": "Kota results announced",
                    "link": "https://local.example.com/n1",
                    "source_id": "dainikbhaskar",
                    "pubDate": "2024-12-09 08:00:00"
                }]
            })))
            .mount(&mock_server)
            .await;

        let local = LocalNews::with_source(
            source_for(&mock_server),
            vec!["Kota".to_string()],
        );

        let completion = local.feed.select_category("Kota").await;
        assert_eq!(completion, Completion::Merged { added: 1 });

        let snapshot = local.feed.snapshot();
        assert_eq!(snapshot.status, FeedStatus::Idle);
        assert!(!snapshot.has_more);

        let article = &snapshot.articles[0];
        assert_eq!(article.id, "n1");
        assert_eq!(article.category, "Kota");
        assert_eq!(article.url.as_deref(), Some("https://local.example.com/n1"));
        assert_eq!(article.source, "dainikbhaskar");
        assert_eq!(article.published_at, "2024-12-09 08:00:00");

        assert_eq!(local.feed.load_more().await, None);
    }

    #[tokio::test]
    async fn test_restore_saved_city() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "Jaipur"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "results": [{ "article_id": "j1", "title": "Jaipur update" }]
            })))
            .mount(&mock_server)
            .await;

        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        let local = LocalNews::with_source(
            source_for(&mock_server),
            vec!["Jaipur".to_string(), "Kota".to_string()],
        );

        assert_eq!(local.restore_city(&db).await.unwrap(), None);

        db.set_selected_city("Mumbai").await.unwrap();
        assert_eq!(local.restore_city(&db).await.unwrap(), None);
        assert_eq!(local.feed.snapshot().category, "");

        db.set_selected_city("Jaipur").await.unwrap();
        assert_eq!(
            local.restore_city(&db).await.unwrap(),
            Some(Completion::Merged { added: 1 })
        );
        assert_eq!(local.feed.snapshot().category, "Jaipur");
    }
}
