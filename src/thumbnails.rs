use crate::catalog::{Asset, AssetId};
use crate::mesh;
use crate::render::{RenderedThumbnail, ThumbnailRenderer};
use crate::service::CatalogService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Fetches raw model bytes for an absolute on-disk path. The catalog service
/// exposes a local file endpoint for this; tests substitute in-memory bytes.
#[async_trait(?Send)]
pub trait ResourceFetcher {
    async fn fetch(&self, absolute_path: &str) -> Result<Vec<u8>>;
}

pub struct HttpResourceFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpResourceFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn resource_url(base_url: &str, absolute_path: &str) -> String {
    format!("{}/localfile/?path={}", base_url, urlencoding::encode(absolute_path))
}

#[async_trait(?Send)]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch(&self, absolute_path: &str) -> Result<Vec<u8>> {
        let url = resource_url(&self.base_url, absolute_path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let bytes = response.bytes().await.with_context(|| format!("read body of {url}"))?;
        if bytes.is_empty() {
            anyhow::bail!("Empty response body from {url}");
        }
        Ok(bytes.to_vec())
    }
}

/// Produces a thumbnail for one asset, or `None` when no renderer can run on
/// this machine. Seam between reconciliation and the fetch/decode/render
/// machinery.
#[async_trait(?Send)]
pub trait ThumbnailSource {
    fn available(&self) -> bool;
    async fn thumbnail_for(&mut self, asset: &Asset) -> Result<Option<RenderedThumbnail>>;
}

/// The real pipeline: fetch model bytes, decode them, render offscreen.
pub struct ThumbnailPipeline {
    fetcher: Box<dyn ResourceFetcher>,
    renderer: ThumbnailRenderer,
}

impl ThumbnailPipeline {
    pub fn new(fetcher: Box<dyn ResourceFetcher>, resolution: u32) -> Self {
        Self { fetcher, renderer: ThumbnailRenderer::new(resolution) }
    }
}

#[async_trait(?Send)]
impl ThumbnailSource for ThumbnailPipeline {
    fn available(&self) -> bool {
        crate::render::gpu_available()
    }

    async fn thumbnail_for(&mut self, asset: &Asset) -> Result<Option<RenderedThumbnail>> {
        let bytes = self
            .fetcher
            .fetch(&asset.absolute_path)
            .await
            .with_context(|| format!("fetch model for {}", asset.filename))?;
        let model = mesh::decode_model(&bytes)
            .with_context(|| format!("decode model for {}", asset.filename))?;
        self.renderer.render(&model)
    }
}

/// Session-local map from asset identity to rendered image data URL. Keyed by
/// identity, never by view position, so a stale in-flight render lands
/// harmlessly.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    images: HashMap<AssetId, String>,
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: AssetId) -> Option<&str> {
        self.images.get(&id).map(String::as_str)
    }

    pub fn insert(&mut self, id: AssetId, data_url: String) {
        self.images.insert(id, data_url);
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub cached: usize,
    pub generated: usize,
    pub failed: usize,
}

/// One sequential sweep over the asset list. Assets carrying both an image
/// and a positive triangle count are copied into the cache and skipped;
/// assets with an image but no count keep their image and only gain a fresh
/// count (the asset still tallies as cached, and a failed re-count is not a
/// failure); everything else gets a full render. New images and counts are
/// patched into the local snapshot immediately and persisted to the service
/// in the background, so one slow or failed save never stalls the sweep.
pub async fn reconcile(
    cache: &mut ThumbnailCache,
    assets: &mut [Asset],
    source: &mut dyn ThumbnailSource,
    service: &Arc<dyn CatalogService>,
) -> ReconcileStats {
    let mut stats = ReconcileStats::default();
    if !source.available() {
        warn!("[thumbnails] renderer unavailable, skipping reconciliation");
        for asset in assets.iter().filter(|a| a.has_thumbnail()) {
            cache.insert(asset.id, asset.thumbnail.clone());
            stats.cached += 1;
        }
        return stats;
    }

    for asset in assets.iter_mut() {
        if asset.has_thumbnail() && asset.poly_count > 0 {
            cache.insert(asset.id, asset.thumbnail.clone());
            stats.cached += 1;
            continue;
        }

        if asset.has_thumbnail() {
            // Re-count only: the existing image stays, and the asset counts
            // as cached whether or not the re-count succeeds.
            cache.insert(asset.id, asset.thumbnail.clone());
            stats.cached += 1;
            match source.thumbnail_for(asset).await {
                Ok(Some(rendered)) => {
                    if rendered.poly_count > 0 {
                        asset.poly_count = rendered.poly_count;
                        persist_poly_count(service, asset.id, rendered.poly_count);
                    }
                }
                Ok(None) => {
                    warn!("[thumbnails] renderer unavailable, stopping reconciliation early");
                    break;
                }
                Err(err) => {
                    warn!("[thumbnails] failed to re-count {}: {err:#}", asset.filename);
                }
            }
            continue;
        }

        match source.thumbnail_for(asset).await {
            Ok(Some(rendered)) => {
                asset.thumbnail = rendered.data_url.clone();
                cache.insert(asset.id, rendered.data_url.clone());
                persist_thumbnail(service, asset.id, rendered.data_url);
                if rendered.poly_count > 0 {
                    asset.poly_count = rendered.poly_count;
                    persist_poly_count(service, asset.id, rendered.poly_count);
                }
                stats.generated += 1;
            }
            Ok(None) => {
                // Renderer went away mid-pass; leave the rest for next time.
                warn!("[thumbnails] renderer unavailable, stopping reconciliation early");
                break;
            }
            Err(err) => {
                warn!("[thumbnails] failed to generate for {}: {err:#}", asset.filename);
                stats.failed += 1;
            }
        }
    }

    if stats.generated > 0 || stats.failed > 0 {
        info!(
            "[thumbnails] reconciled: {} cached, {} generated, {} failed",
            stats.cached, stats.generated, stats.failed
        );
    }
    stats
}

fn persist_thumbnail(service: &Arc<dyn CatalogService>, id: AssetId, data_url: String) {
    let service = Arc::clone(service);
    tokio::spawn(async move {
        if let Err(err) = service.save_thumbnail(id, data_url).await {
            warn!("[thumbnails] failed to persist thumbnail for asset {id}: {err:#}");
        }
    });
}

fn persist_poly_count(service: &Arc<dyn CatalogService>, id: AssetId, poly_count: i64) {
    let service = Arc::clone(service);
    tokio::spawn(async move {
        if let Err(err) = service.save_poly_count(id, poly_count).await {
            warn!("[thumbnails] failed to persist poly count for asset {id}: {err:#}");
        }
    });
}

/// Local half of the regenerate-all sweep: forget every cached image and
/// count so the next reconciliation re-renders the lot.
pub fn invalidate_all(cache: &mut ThumbnailCache, assets: &mut [Asset]) {
    cache.clear();
    for asset in assets.iter_mut() {
        asset.thumbnail.clear();
        asset.poly_count = 0;
    }
}
