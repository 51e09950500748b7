//! Owned object storage for relocated assets.

use super::AssetError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Narrow interface over the object store the catalog serves media from.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any previous object.
    async fn put_object(&self, path: &str, bytes: &[u8], content_type: &str)
        -> Result<(), AssetError>;

    /// Existing access token of the object, if one was minted.
    async fn access_token(&self, path: &str) -> Result<Option<String>, AssetError>;

    /// Create and persist a new access token for an existing object.
    async fn mint_access_token(&self, path: &str) -> Result<String, AssetError>;

    /// Public download URL for `path` authorized by `token`.
    fn public_url(&self, path: &str, token: &str) -> String;

    /// Whether `url` already points into this store's public URL space.
    fn owns_url(&self, url: &str) -> bool;
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ObjectMeta {
    content_type: String,
    access_token: Option<String>,
}

/// Object store on the local filesystem.
///
/// Each object is a plain file under `root`, with its metadata (content type,
/// access token) in a `<file>.meta.json` sidecar. Objects are served elsewhere
/// under `public_base_url`.
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_file(&self, path: &str) -> Result<PathBuf, AssetError> {
        let relative = Path::new(path);
        let is_safe = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_safe {
            return Err(AssetError::store(path, "invalid object path"));
        }
        Ok(self.root.join(relative))
    }

    fn meta_file(object_file: &Path) -> PathBuf {
        let mut name = object_file.as_os_str().to_owned();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    async fn read_meta(&self, path: &str) -> Result<Option<ObjectMeta>, AssetError> {
        let object_file = self.object_file(path)?;
        if !tokio::fs::try_exists(&object_file)
            .await
            .map_err(|e| AssetError::store(path, e))?
        {
            return Ok(None);
        }
        match tokio::fs::read(Self::meta_file(&object_file)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| AssetError::store(path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Some(ObjectMeta::default())),
            Err(e) => Err(AssetError::store(path, e)),
        }
    }

    async fn write_meta(&self, path: &str, meta: &ObjectMeta) -> Result<(), AssetError> {
        let object_file = self.object_file(path)?;
        let document = serde_json::to_vec(meta).map_err(|e| AssetError::store(path, e))?;
        tokio::fs::write(Self::meta_file(&object_file), document)
            .await
            .map_err(|e| AssetError::store(path, e))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put_object(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), AssetError> {
        let object_file = self.object_file(path)?;
        if let Some(parent) = object_file.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AssetError::store(path, e))?;
        }
        // A re-upload keeps the token so published URLs stay valid
        let access_token = self.read_meta(path).await?.and_then(|m| m.access_token);
        tokio::fs::write(&object_file, bytes)
            .await
            .map_err(|e| AssetError::store(path, e))?;
        self.write_meta(
            path,
            &ObjectMeta {
                content_type: content_type.to_string(),
                access_token,
            },
        )
        .await?;
        debug!("Stored {} ({} bytes, {})", path, bytes.len(), content_type);
        Ok(())
    }

    async fn access_token(&self, path: &str) -> Result<Option<String>, AssetError> {
        match self.read_meta(path).await? {
            Some(meta) => Ok(meta.access_token),
            None => Err(AssetError::MissingObject(path.to_string())),
        }
    }

    async fn mint_access_token(&self, path: &str) -> Result<String, AssetError> {
        let mut meta = self
            .read_meta(path)
            .await?
            .ok_or_else(|| AssetError::MissingObject(path.to_string()))?;
        let token = uuid::Uuid::new_v4().to_string();
        meta.access_token = Some(token.clone());
        self.write_meta(path, &meta).await?;
        Ok(token)
    }

    fn public_url(&self, path: &str, token: &str) -> String {
        format!(
            "{}/{}?token={}",
            self.public_base_url,
            path,
            urlencoding::encode(token)
        )
    }

    fn owns_url(&self, url: &str) -> bool {
        url.strip_prefix(&self.public_base_url)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
    }
}
