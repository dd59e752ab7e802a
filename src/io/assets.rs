//! Static asset retrieval (avatars and QR codes)
//!
//! Assets are opaque files served by the registrar under fixed path prefixes.
//! Filenames come from participant records, so they are checked before being
//! used in a URL or joined onto a local directory.

use crate::io::api::ApiClient;
use bytes::Bytes;
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Avatar,
    QrCode,
}

impl AssetKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Avatar => "avatar",
            AssetKind::QrCode => "qr",
        }
    }
}

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("unsafe asset filename '{0}'")]
    UnsafeFilename(String),

    #[error("cannot build {kind} url: {message}")]
    Url { kind: &'static str, message: String },

    #[error("{kind} download failed: {source}")]
    Transport {
        kind: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{kind} '{filename}' not available (HTTP {status})")]
    Status { kind: &'static str, filename: String, status: u16 },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reject empty names, path separators, parent references and hidden files
pub fn validate_filename(filename: &str) -> Result<&str, AssetError> {
    let unsafe_name = filename.is_empty()
        || filename.starts_with('.')
        || filename.contains(['/', '\\', '\0'])
        || filename.contains("..");
    if unsafe_name {
        return Err(AssetError::UnsafeFilename(filename.to_string()));
    }
    Ok(filename)
}

impl ApiClient {
    fn asset_prefix(&self, kind: AssetKind) -> &str {
        match kind {
            AssetKind::Avatar => &self.prefixes.avatar,
            AssetKind::QrCode => &self.prefixes.qr,
        }
    }

    /// Public URL of an asset
    pub fn asset_url(&self, kind: AssetKind, filename: &str) -> Result<Url, AssetError> {
        let filename = validate_filename(filename)?;
        let prefix = self.asset_prefix(kind);
        self.url_for(prefix.split('/').chain(std::iter::once(filename)))
            .map_err(|e| AssetError::Url { kind: kind.as_str(), message: e.to_string() })
    }

    /// Download an asset's bytes
    pub async fn fetch_asset(&self, kind: AssetKind, filename: &str) -> Result<Bytes, AssetError> {
        let url = self.asset_url(kind, filename)?;
        let start = Instant::now();
        let result = self.fetch_url(kind, filename, url).await;
        self.record(start, result.is_ok());

        if let Err(e) = &result {
            warn!(kind = %kind.as_str(), filename = %filename, error = %e, "asset_fetch_failed");
        }
        result
    }

    async fn fetch_url(
        &self,
        kind: AssetKind,
        filename: &str,
        url: Url,
    ) -> Result<Bytes, AssetError> {
        let response = self
            .http()
            .get(url)
            .send()
            .await
            .map_err(|source| AssetError::Transport { kind: kind.as_str(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::Status {
                kind: kind.as_str(),
                filename: filename.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|source| AssetError::Transport { kind: kind.as_str(), source })
    }

    /// Download an asset into `dir`, keeping its filename. Returns the written path.
    pub async fn save_asset(
        &self,
        kind: AssetKind,
        filename: &str,
        dir: &Path,
    ) -> Result<PathBuf, AssetError> {
        let bytes = self.fetch_asset(kind, filename).await?;
        let path = dir.join(validate_filename(filename)?);
        write_asset(&path, &bytes).await?;

        info!(
            kind = %kind.as_str(),
            path = %path.display(),
            bytes = %bytes.len(),
            "asset_saved"
        );
        Ok(path)
    }
}

/// Write bytes to `path`, creating parent directories as needed
pub async fn write_asset(path: &Path, bytes: &[u8]) -> Result<(), AssetError> {
    let to_error =
        |source: std::io::Error| AssetError::Write { path: path.display().to_string(), source };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(to_error)?;
        }
    }
    tokio::fs::write(path, bytes).await.map_err(to_error)
}
