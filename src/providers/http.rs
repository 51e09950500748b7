//! Shared HTTP client for provider catalog endpoints.

use super::ProviderError;
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Thin JSON-over-HTTP wrapper shared by every provider.
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Clone)]
pub struct ProviderHttp {
    client: reqwest::Client,
}

impl ProviderHttp {
    /// Create a client with a per-request timeout, so a stalled provider can
    /// never hold up a run.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to create provider HTTP client")?;
        Ok(Self { client })
    }

    /// GET `url` with `query` and decode the JSON body.
    ///
    /// A 404 is an absent page and yields `Ok(None)`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        bearer_token: Option<&str>,
    ) -> Result<Option<T>, ProviderError> {
        let mut request = self.client.get(url).query(query);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        debug!("GET {} {:?}", url, query);
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::stub_server::StubServer;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Page {
        results: Vec<u32>,
    }

    fn http() -> ProviderHttp {
        ProviderHttp::new("catalog-ingest-test", Duration::from_secs(5)).unwrap()
    }

    async fn server() -> StubServer {
        StubServer::start(|target| match target.split('?').next().unwrap_or("") {
            "/ok" => (200, r#"{"results": [1, 2]}"#.to_string()),
            "/blank" => (200, "  \n".to_string()),
            "/missing" => (404, "not found".to_string()),
            "/broken" => (200, r#"{"results": [1,"#.to_string()),
            _ => (503, "unavailable".to_string()),
        })
        .await
    }

    #[tokio::test]
    async fn test_decodes_json_body_and_sends_query() {
        let server = server().await;
        let url = format!("{}/ok", server.base_url);
        let page: Option<Page> = http()
            .get_json(&url, &[("tags", "rock".to_string()), ("offset", "50".to_string())], None)
            .await
            .unwrap();

        assert_eq!(page, Some(Page { results: vec![1, 2] }));
        assert_eq!(server.targets(), vec!["/ok?tags=rock&offset=50"]);
        let head = server.request_heads()[0].to_ascii_lowercase();
        assert!(head.contains("user-agent: catalog-ingest-test"));
        assert!(!head.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_absent_pages_are_not_errors() {
        let server = server().await;
        for path in ["/missing", "/blank"] {
            let url = format!("{}{}", server.base_url, path);
            let page: Option<Page> = http().get_json(&url, &[], None).await.unwrap();
            assert_eq!(page, None, "{}", path);
        }
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let server = server().await;
        let url = format!("{}/down", server.base_url);
        let err = http().get_json::<Page>(&url, &[], None).await.unwrap_err();
        match err {
            ProviderError::Status { status, url: failed } => {
                assert_eq!(status, 503);
                assert_eq!(failed, url);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_maps_to_decode() {
        let server = server().await;
        let url = format!("{}/broken", server.base_url);
        let err = http().get_json::<Page>(&url, &[], None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent() {
        let server = server().await;
        let url = format!("{}/ok", server.base_url);
        let _: Option<Page> = http().get_json(&url, &[], Some("secret-token")).await.unwrap();
        let head = server.request_heads()[0].to_ascii_lowercase();
        assert!(head.contains("authorization: bearer secret-token"));
    }
}
