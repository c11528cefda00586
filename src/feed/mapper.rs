use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, MappingError};
use crate::models::ArticleRecord;

const PUBLISHED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    #[serde(default)]
    pub name: Option<String>,
}

/// One entry of the remote result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteArticle {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub source: Option<RemoteSource>,
}

#[derive(Debug, Deserialize)]
struct RemoteResponse {
    #[serde(default)]
    articles: Vec<serde_json::Value>,
}

/// Decode a response body. Entries that cannot be decoded are skipped; only a
/// body that is not a result set at all fails.
pub fn parse_response(body: &[u8]) -> Result<Vec<RemoteArticle>, FetchError> {
    let response: RemoteResponse = serde_json::from_slice(body)?;

    let articles = response
        .articles
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RemoteArticle>(entry) {
            Ok(article) => Some(article),
            Err(e) => {
                let err = MappingError {
                    field: "article",
                    reason: e.to_string(),
                };
                tracing::warn!(error = %err, "Skipping malformed article entry");
                None
            }
        })
        .collect();

    Ok(articles)
}

/// Parse a remote `yyyy-MM-dd'T'HH:mm:ss'Z'` timestamp (UTC) to epoch millis.
/// RFC 3339 is accepted as well, which covers fractional seconds and offsets.
pub fn parse_published_at(raw: &str) -> Result<i64, MappingError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, PUBLISHED_AT_FORMAT) {
        return Ok(naive.and_utc().timestamp_millis());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| MappingError {
            field: "publishedAt",
            reason: format!("{:?}: {}", raw, e),
        })
}

/// Map remote entries to cache records for `topic`.
///
/// A missing or unparseable timestamp falls back to `ingested_at` instead of
/// failing.
pub fn to_records(articles: Vec<RemoteArticle>, topic: &str, ingested_at: i64) -> Vec<ArticleRecord> {
    articles
        .into_iter()
        .map(|article| {
            let parsed = match article.published_at.as_deref() {
                Some(raw) => parse_published_at(raw),
                None => Err(MappingError {
                    field: "publishedAt",
                    reason: "missing".to_string(),
                }),
            };
            let published_at = parsed.unwrap_or_else(|e| {
                tracing::debug!(topic, url = %article.url, error = %e, "Using ingestion time");
                ingested_at
            });

            ArticleRecord {
                title: article.title.unwrap_or_default(),
                description: article.description.unwrap_or_default(),
                image_url: article.url_to_image,
                source: article.source.and_then(|s| s.name).unwrap_or_default(),
                published_at,
                url: article.url,
                topic: topic.to_string(),
            }
        })
        .collect()
}
