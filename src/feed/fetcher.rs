use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, FetchError, Result};
use crate::models::Language;

use super::mapper::{parse_response, RemoteArticle};

const EVERYTHING_PATH: &str = "v2/everything";

/// Where articles for a topic come from.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch(
        &self,
        topic: &str,
        language: Language,
    ) -> std::result::Result<Vec<RemoteArticle>, FetchError>;
}

/// HTTP client for a NewsAPI-compatible `v2/everything` endpoint.
pub struct NewsApiClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl NewsApiClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("invalid api_base_url {:?}: {}", base_url, e)))?;
        let endpoint = base
            .join(EVERYTHING_PATH)
            .map_err(|e| AppError::Config(format!("invalid api_base_url {:?}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("news-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl ArticleSource for NewsApiClient {
    async fn fetch(
        &self,
        topic: &str,
        language: Language,
    ) -> std::result::Result<Vec<RemoteArticle>, FetchError> {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", topic), ("language", language.code())]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apiKey", key.as_str())]);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        parse_response(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> NewsApiClient {
        NewsApiClient::new(
            &format!("{}/", server.uri()),
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sends_topic_language_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("q", "rust lang"))
            .and(query_param("language", "de"))
            .and(query_param("apiKey", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"ok","totalResults":1,"articles":[
                    {"source":{"id":null,"name":"Heise"},"title":"Rust 2.0","description":"d",
                     "url":"https://heise.de/rust","urlToImage":null,"publishedAt":"2024-05-01T08:00:00Z"}
                ]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let articles = client(&server).fetch("rust lang", Language::German).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].url, "https://heise.de/rust");
        assert_eq!(
            articles[0].source.as_ref().and_then(|s| s.name.as_deref()),
            Some("Heise")
        );
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client(&server).fetch("go", Language::English).await.unwrap_err();

        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn base_url_path_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/proxy/v2/everything"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"articles":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let client = NewsApiClient::new(
            &format!("{}/proxy/", server.uri()),
            None,
            Duration::from_secs(5),
        )
        .unwrap();

        assert!(client.fetch("go", Language::English).await.unwrap().is_empty());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = NewsApiClient::new("not a url", None, Duration::from_secs(5));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
