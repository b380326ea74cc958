//! Binary attachment downloads with per-session memoization.
//!
//! The cache is keyed by asset id: the same asset referenced from several
//! messages (or several conversations in one run) is fetched exactly once.
//! A failed download is cached as a reference-only asset so it is not
//! retried for every later reference either.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use chatarc_core::Asset;

use crate::error::{ClientError, Result};
use crate::requester::RateLimitedRequester;
use crate::transport::Method;

/// Pointer metadata carried alongside an asset reference; used to name and
/// classify the asset, and to keep `size`/`mime_type` meaningful even when
/// the download fails.
#[derive(Debug, Clone, Default)]
pub struct AssetHint {
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

pub struct AssetFetcher {
    cache: HashMap<String, Asset>,
    network_fetches: u64,
}

impl AssetFetcher {
    pub fn new() -> AssetFetcher {
        AssetFetcher {
            cache: HashMap::new(),
            network_fetches: 0,
        }
    }

    /// Network downloads performed so far (cache hits excluded).
    pub fn network_fetches(&self) -> u64 {
        self.network_fetches
    }

    /// Fetch an asset through the backend's file-download endpoint.
    ///
    /// Always yields an `Asset`; download failures degrade to a
    /// reference-only asset built from the hint. Only fatal conditions
    /// (cancellation, auth expiry) propagate as errors.
    pub async fn fetch(
        &mut self,
        requester: &mut RateLimitedRequester,
        base_url: &str,
        asset_id: &str,
        hint: &AssetHint,
    ) -> Result<Asset> {
        if let Some(cached) = self.cache.get(asset_id) {
            debug!(asset_id, "asset cache hit");
            return Ok(cached.clone());
        }

        let downloaded = self.download(requester, base_url, asset_id, hint).await;
        self.finish(asset_id, hint, downloaded)
    }

    /// Fetch a generated asset straight from its URL, without the
    /// authenticated download-endpoint indirection.
    pub async fn fetch_direct(
        &mut self,
        requester: &mut RateLimitedRequester,
        url: &str,
        asset_id: &str,
        hint: &AssetHint,
    ) -> Result<Asset> {
        if let Some(cached) = self.cache.get(asset_id) {
            debug!(asset_id, "asset cache hit");
            return Ok(cached.clone());
        }

        let downloaded = self.download_url(requester, url, asset_id, hint).await;
        self.finish(asset_id, hint, downloaded)
    }

    fn finish(&mut self, asset_id: &str, hint: &AssetHint, result: Result<Asset>) -> Result<Asset> {
        let asset = match result {
            Ok(asset) => asset,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(asset_id, error = %err, "asset download failed, keeping reference only");
                reference_from_hint(asset_id, hint)
            }
        };
        self.cache.insert(asset_id.to_owned(), asset.clone());
        Ok(asset)
    }

    async fn download(
        &mut self,
        requester: &mut RateLimitedRequester,
        base_url: &str,
        asset_id: &str,
        hint: &AssetHint,
    ) -> Result<Asset> {
        // two-step shape: the authenticated endpoint answers with a signed
        // download URL, the binary lives behind that URL
        let meta_url = format!("{}/files/{}/download", base_url, asset_id);
        let response = requester.execute(Method::Get, &meta_url, None).await?;
        let meta: Value = serde_json::from_slice(&response.body)
            .map_err(|err| ClientError::decode(format!("download metadata for {asset_id}"), err))?;

        let download_url = meta
            .get("download_url")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClientError::network(&meta_url, 1, "response carried no download_url")
            })?;

        let mut merged = hint.clone();
        if merged.name.is_none() {
            merged.name = meta
                .get("file_name")
                .and_then(Value::as_str)
                .map(str::to_owned);
        }

        self.download_url(requester, download_url, asset_id, &merged)
            .await
    }

    async fn download_url(
        &mut self,
        requester: &mut RateLimitedRequester,
        url: &str,
        asset_id: &str,
        hint: &AssetHint,
    ) -> Result<Asset> {
        let response = requester.execute_raw(url).await?;
        self.network_fetches += 1;

        let mut asset = reference_from_hint(asset_id, hint);
        asset.size = response.body.len() as u64;
        asset.bytes = Some(response.body);
        Ok(asset)
    }
}

impl Default for AssetFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn reference_from_hint(asset_id: &str, hint: &AssetHint) -> Asset {
    Asset::reference(
        asset_id,
        hint.name
            .clone()
            .unwrap_or_else(|| asset_id.to_owned()),
        hint.size.unwrap_or(0),
        hint.mime_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_owned()),
    )
}
