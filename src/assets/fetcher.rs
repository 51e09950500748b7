//! Downloading of external assets.

use super::{AssetError, AssetKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    /// `Content-Type` reported by the origin, if any.
    pub declared_content_type: Option<String>,
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Download `url` completely.
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, AssetError>;
}

pub struct HttpAssetFetcher {
    client: reqwest::Client,
}

impl HttpAssetFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to create asset HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AssetFetcher for HttpAssetFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedAsset, AssetError> {
        let download_error = |source| AssetError::Download {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(download_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let declared_content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(download_error)?;
        if bytes.is_empty() {
            return Err(AssetError::EmptyBody(url.to_string()));
        }

        Ok(FetchedAsset {
            bytes: bytes.to_vec(),
            declared_content_type,
        })
    }
}

/// Content type to store an asset with: the declared header unless it is
/// missing or generic, else sniffed from the bytes, else the kind's default.
pub fn detect_content_type(asset: &FetchedAsset, kind: AssetKind) -> String {
    let declared = asset
        .declared_content_type
        .as_deref()
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| {
            !value.is_empty() && value != "application/octet-stream" && value != "binary/octet-stream"
        });
    if let Some(content_type) = declared {
        return content_type;
    }

    if let Some(sniffed) = infer::get(&asset.bytes) {
        return sniffed.mime_type().to_string();
    }

    kind.default_content_type().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn asset(bytes: &[u8], declared: Option<&str>) -> FetchedAsset {
        FetchedAsset {
            bytes: bytes.to_vec(),
            declared_content_type: declared.map(str::to_string),
        }
    }

    #[test]
    fn test_declared_content_type_wins() {
        let fetched = asset(PNG_HEADER, Some("image/webp; q=1"));
        assert_eq!(detect_content_type(&fetched, AssetKind::Cover), "image/webp");
    }

    #[test]
    fn test_sniffs_when_declared_type_is_generic() {
        let fetched = asset(PNG_HEADER, Some("application/octet-stream"));
        assert_eq!(detect_content_type(&fetched, AssetKind::Cover), "image/png");

        let fetched = asset(PNG_HEADER, None);
        assert_eq!(detect_content_type(&fetched, AssetKind::Cover), "image/png");
    }

    #[test]
    fn test_falls_back_to_kind_default() {
        let fetched = asset(b"????", None);
        assert_eq!(detect_content_type(&fetched, AssetKind::Audio), "audio/mpeg");
        assert_eq!(detect_content_type(&fetched, AssetKind::Cover), "image/jpeg");
    }
}
