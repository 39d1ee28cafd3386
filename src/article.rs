use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::error::ValidationError;

pub const DEFAULT_DESCRIPTION: &str = "No description available";
pub const DEFAULT_SOURCE: &str = "PulseNews";

// Candidate source fields per article field, first non-empty wins.
const ID_FIELDS: &[&str] = &["id", "article_id"];
const TITLE_FIELDS: &[&str] = &["title"];
const DESCRIPTION_FIELDS: &[&str] = &["summary", "description", "content"];
const URL_FIELDS: &[&str] = &["url", "link"];
const IMAGE_FIELDS: &[&str] = &["image_url", "urlToImage", "image"];
const SOURCE_FIELDS: &[&str] = &["source", "source_name", "source_id"];
const DATE_FIELDS: &[&str] = &["published_date", "publishedAt", "pubDate"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub source: String,
    pub published_at: String,
    pub category: String,
}

/// Normalizes one page of raw API entries into articles.
///
/// Entries that are not objects or carry no usable title are dropped. Every
/// other field falls back to a default, so a single bad entry never costs
/// the rest of the page. Synthesized ids use the entry's position among the
/// surviving entries: `{category}-{page}-{index}`.
pub fn normalize_entries(
    entries: &[Value],
    category: &str,
    page: u32,
    fetched_at: DateTime<Utc>,
) -> Vec<Article> {
    let fetched_at = fetched_at.to_rfc3339();

    let articles: Vec<Article> = entries
        .iter()
        .filter_map(|entry| {
            let fields = entry.as_object()?;
            let title = string_field(fields, TITLE_FIELDS)?;
            Some((fields, title))
        })
        .enumerate()
        .map(|(index, (fields, title))| Article {
            id: text_field(fields, ID_FIELDS)
                .unwrap_or_else(|| format!("{}-{}-{}", category, page, index)),
            title,
            description: string_field(fields, DESCRIPTION_FIELDS)
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            url: string_field(fields, URL_FIELDS),
            image_url: normalize_image_url(string_field(fields, IMAGE_FIELDS).as_deref()),
            source: source_field(fields).unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            published_at: string_field(fields, DATE_FIELDS)
                .unwrap_or_else(|| fetched_at.clone()),
            category: category.to_string(),
        })
        .collect();

    let dropped = entries.len() - articles.len();
    if dropped > 0 {
        debug!(
            "Dropped {} of {} entries without a title ({} page {})",
            dropped,
            entries.len(),
            category,
            page
        );
    }

    articles
}

/// Applies the image URL rule, logging and discarding rejected values.
pub fn normalize_image_url(raw: Option<&str>) -> Option<String> {
    let raw = raw?;
    match validate_image_url(raw) {
        Ok(url) => Some(url),
        Err(e) => {
            debug!("Rejected image URL: {}", e);
            None
        }
    }
}

/// Accepts absolute http(s) URLs and upgrades schemeless `//host/...` ones
/// to https. Root-relative paths have no host to resolve against and are
/// rejected, as is anything else that does not parse.
pub fn validate_image_url(raw: &str) -> Result<String, ValidationError> {
    let raw = raw.trim();

    let candidate = if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{}", rest)
    } else if raw.starts_with('/') {
        return Err(ValidationError::RelativeUrl(raw.to_string()));
    } else {
        raw.to_string()
    };

    let parsed = Url::parse(&candidate).map_err(|e| ValidationError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(ValidationError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(candidate)
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn string_field(fields: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|name| fields.get(*name).and_then(Value::as_str).and_then(non_empty))
}

/// Like `string_field`, but numeric values count too (some APIs use integer ids).
fn text_field(fields: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|name| match fields.get(*name)? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Sources arrive either as a plain name or as `{ "id": ..., "name": ... }`.
fn source_field(fields: &Map<String, Value>) -> Option<String> {
    SOURCE_FIELDS.iter().find_map(|name| match fields.get(*name)? {
        Value::String(s) => non_empty(s),
        Value::Object(inner) => inner.get("name").and_then(Value::as_str).and_then(non_empty),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 9, 12, 0, 0).unwrap()
    }

    mod image_url_tests {
        use super::*;

        #[test]
        fn test_absolute_https_accepted() {
            assert_eq!(
                validate_image_url("https://cdn.example.com/a.jpg"),
                Ok("https://cdn.example.com/a.jpg".to_string())
            );
        }

        #[test]
        fn test_absolute_http_accepted() {
            assert_eq!(
                validate_image_url("http://cdn.example.com/a.jpg"),
                Ok("http://cdn.example.com/a.jpg".to_string())
            );
        }

        #[test]
        fn test_schemeless_upgraded_to_https() {
            assert_eq!(
                normalize_image_url(Some("//cdn.example.com/a.jpg")),
                Some("https://cdn.example.com/a.jpg".to_string())
            );
        }

        #[test]
        fn test_root_relative_rejected() {
            assert_eq!(
                validate_image_url("/local/a.jpg"),
                Err(ValidationError::RelativeUrl("/local/a.jpg".to_string()))
            );
            assert_eq!(normalize_image_url(Some("/local/a.jpg")), None);
        }

        #[test]
        fn test_bare_host_rejected() {
            assert!(matches!(
                validate_image_url("cdn.example.com/a.jpg"),
                Err(ValidationError::InvalidUrl { .. })
            ));
        }

        #[test]
        fn test_other_schemes_rejected() {
            assert_eq!(
                validate_image_url("ftp://files.example.com/a.jpg"),
                Err(ValidationError::UnsupportedScheme("ftp".to_string()))
            );
            assert!(validate_image_url("data:image/png;base64,AAAA").is_err());
        }

        #[test]
        fn test_surrounding_whitespace_trimmed() {
            assert_eq!(
                validate_image_url("  https://cdn.example.com/a.jpg "),
                Ok("https://cdn.example.com/a.jpg".to_string())
            );
        }

        #[test]
        fn test_absent_stays_absent() {
            assert_eq!(normalize_image_url(None), None);
        }
    }

    mod normalize_tests {
        use super::*;

        #[test]
        fn test_full_entry() {
            let entries = vec![json!({
                "id": "abc",
                "title": "  Markets rally  ",
                "summary": "Stocks up",
                "url": "https://news.example.com/abc",
                "image_url": "https://cdn.example.com/abc.jpg",
                "source": "Wire",
                "published_date": "2024-12-09T10:00:00Z"
            })];

            let articles = normalize_entries(&entries, "business", 1, fetched_at());

            assert_eq!(
                articles,
                vec![Article {
                    id: "abc".to_string(),
                    title: "Markets rally".to_string(),
                    description: "Stocks up".to_string(),
                    url: Some("https://news.example.com/abc".to_string()),
                    image_url: Some("https://cdn.example.com/abc.jpg".to_string()),
                    source: "Wire".to_string(),
                    published_at: "2024-12-09T10:00:00Z".to_string(),
                    category: "business".to_string(),
                }]
            );
        }

        #[test]
        fn test_defaults_for_missing_fields() {
            let entries = vec![json!({ "title": "Bare" })];

            let articles = normalize_entries(&entries, "top", 3, fetched_at());

            assert_eq!(articles.len(), 1);
            let article = &articles[0];
            assert_eq!(article.id, "top-3-0");
            assert_eq!(article.description, DEFAULT_DESCRIPTION);
            assert_eq!(article.source, DEFAULT_SOURCE);
            assert_eq!(article.url, None);
            assert_eq!(article.image_url, None);
            assert_eq!(article.published_at, fetched_at().to_rfc3339());
        }

        #[test]
        fn test_entries_without_title_dropped() {
            let entries = vec![
                json!({ "id": "1", "title": "Kept" }),
                json!({ "id": "2", "title": "   " }),
                json!({ "id": "3" }),
                json!({ "id": "4", "title": 42 }),
                json!(null),
                json!("not an object"),
                json!({ "id": "5", "title": "Also kept" }),
            ];

            let articles = normalize_entries(&entries, "top", 1, fetched_at());

            let ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(ids, vec!["1", "5"]);
        }

        #[test]
        fn test_synthesized_ids_count_surviving_entries() {
            let entries = vec![
                json!({ "title": "First" }),
                json!({ "title": "" }),
                json!({ "title": "Second" }),
            ];

            let articles = normalize_entries(&entries, "sports", 2, fetched_at());

            assert_eq!(articles[0].id, "sports-2-0");
            assert_eq!(articles[1].id, "sports-2-1");
        }

        #[test]
        fn test_numeric_id_stringified() {
            let entries = vec![json!({ "id": 1234, "title": "Numbered" })];
            let articles = normalize_entries(&entries, "top", 1, fetched_at());
            assert_eq!(articles[0].id, "1234");
        }

        #[test]
        fn test_empty_id_synthesized() {
            let entries = vec![json!({ "id": "", "title": "No id" })];
            let articles = normalize_entries(&entries, "health", 1, fetched_at());
            assert_eq!(articles[0].id, "health-1-0");
        }

        #[test]
        fn test_alias_order_first_non_empty_wins() {
            let entries = vec![json!({
                "title": "Aliases",
                "summary": "",
                "description": "From description",
                "content": "From content",
                "link": "https://news.example.com/linked",
                "urlToImage": "//cdn.example.com/x.jpg",
                "publishedAt": "2024-01-01T00:00:00Z",
                "pubDate": "2023-01-01 00:00:00"
            })];

            let article = &normalize_entries(&entries, "science", 1, fetched_at())[0];

            assert_eq!(article.description, "From description");
            assert_eq!(article.url.as_deref(), Some("https://news.example.com/linked"));
            assert_eq!(article.image_url.as_deref(), Some("https://cdn.example.com/x.jpg"));
            assert_eq!(article.published_at, "2024-01-01T00:00:00Z");
        }

        #[test]
        fn test_source_object_name() {
            let entries = vec![json!({
                "title": "Nested source",
                "source": { "id": null, "name": "The Daily" }
            })];
            let article = &normalize_entries(&entries, "top", 1, fetched_at())[0];
            assert_eq!(article.source, "The Daily");
        }

        #[test]
        fn test_source_id_fallback() {
            let entries = vec![json!({ "title": "Local", "source_id": "timesofindia" })];
            let article = &normalize_entries(&entries, "Jaipur", 1, fetched_at())[0];
            assert_eq!(article.source, "timesofindia");
        }

        #[test]
        fn test_bad_image_does_not_drop_article() {
            let entries = vec![json!({ "title": "Relative image", "image_url": "/local/a.jpg" })];
            let articles = normalize_entries(&entries, "top", 1, fetched_at());
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].image_url, None);
        }

        #[test]
        fn test_article_serde_round_trip_field_names() {
            let entries = vec![json!({ "id": "a", "title": "T" })];
            let article = normalize_entries(&entries, "top", 1, fetched_at()).remove(0);

            let value = serde_json::to_value(&article).unwrap();
            assert!(value.get("image_url").is_some());
            assert!(value.get("published_at").is_some());

            let back: Article = serde_json::from_value(value).unwrap();
            assert_eq!(back, article);
        }
    }
}
