use crate::catalog::{Asset, AssetId, Collection, CollectionId, FolderId, Tag, TagId, TagWithCount, WatchFolder};
use crate::composer::ViewComposer;
use crate::config::AppConfig;
use crate::filter::{FilterState, SmartView, SortField};
use crate::selection::{ClickModifiers, DetailAction, SelectionState};
use crate::service::{CatalogService, EditorBridge, EditorStatus, HttpCatalogService};
use crate::thumbnails::{
    self, HttpResourceFetcher, ReconcileStats, ThumbnailCache, ThumbnailPipeline, ThumbnailSource,
};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

/// Session orchestrator: owns the filter/selection/cache state, mirrors of
/// the service's tag/collection/folder lists, and the thumbnail pipeline.
/// One instance lives for the whole process.
pub struct App {
    service: Arc<dyn CatalogService>,
    editor: EditorBridge,
    pipeline: Option<Box<dyn ThumbnailSource>>,
    thumbnail_resolution: u32,

    filter: FilterState,
    composer: ViewComposer,
    selection: SelectionState,
    cache: ThumbnailCache,
    reconcile_pending: bool,

    master: Vec<Asset>,
    tags: Vec<TagWithCount>,
    collections: Vec<Collection>,
    folders: Vec<WatchFolder>,
    editor_status: EditorStatus,
    notices: VecDeque<String>,
}

impl App {
    pub fn new(config: &AppConfig) -> Self {
        let service: Arc<dyn CatalogService> =
            Arc::new(HttpCatalogService::new(config.service.base_url.clone()));
        Self::with_service(config, service)
    }

    /// Construction over an arbitrary service implementation; tests use an
    /// in-memory one. The thumbnail pipeline stays unset until
    /// [`App::init`] discovers the file server, or a test injects a source.
    pub fn with_service(config: &AppConfig, service: Arc<dyn CatalogService>) -> Self {
        Self {
            service,
            editor: EditorBridge::new(config.editor.port),
            pipeline: None,
            thumbnail_resolution: config.thumbnails.resolution,
            filter: FilterState::new(),
            composer: ViewComposer::new(config.views.recent_limit),
            selection: SelectionState::new(),
            cache: ThumbnailCache::new(),
            reconcile_pending: false,
            master: Vec::new(),
            tags: Vec::new(),
            collections: Vec::new(),
            folders: Vec::new(),
            editor_status: EditorStatus { connected: false, error: None },
            notices: VecDeque::new(),
        }
    }

    /// Replaces the thumbnail source; tests inject a scripted one.
    pub fn set_thumbnail_source(&mut self, source: Box<dyn ThumbnailSource>) {
        self.pipeline = Some(source);
    }

    /// Initial load: discover the file server, mirror the sidebar lists,
    /// compose the default view, and kick off the first reconciliation.
    pub async fn init(&mut self) -> Result<()> {
        match self.service.file_server_base().await {
            Ok(base) if !base.is_empty() => {
                self.pipeline = Some(Box::new(ThumbnailPipeline::new(
                    Box::new(HttpResourceFetcher::new(base)),
                    self.thumbnail_resolution,
                )));
            }
            Ok(_) => warn!("[app] no file server available, thumbnails disabled"),
            Err(err) => warn!("[app] file server discovery failed: {err:#}"),
        }

        self.refresh_sidebar().await;
        self.recompose().await;
        self.run_pending_reconciliation().await;
        self.editor_status = self.editor.ping().await;
        info!(
            "[app] session ready: {} assets, {} tags, {} collections, {} folders",
            self.master.len(),
            self.tags.len(),
            self.collections.len(),
            self.folders.len()
        );
        Ok(())
    }

    // --- state accessors -------------------------------------------------

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn master(&self) -> &[Asset] {
        &self.master
    }

    pub fn tags(&self) -> &[TagWithCount] {
        &self.tags
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn folders(&self) -> &[WatchFolder] {
        &self.folders
    }

    pub fn editor_status(&self) -> &EditorStatus {
        &self.editor_status
    }

    pub fn displayed_assets(&self) -> &[Asset] {
        self.composer.displayed()
    }

    /// The list the grid renders: displayed assets with search and sort
    /// applied. Recomputed on demand, no I/O.
    pub fn filtered_assets(&self) -> Vec<Asset> {
        self.composer.filtered(&self.filter)
    }

    /// Pops every pending transient notice, oldest first.
    pub fn drain_notices(&mut self) -> Vec<String> {
        self.notices.drain(..).collect()
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.notices.push_back(message.into());
    }

    // --- filtering -------------------------------------------------------

    pub async fn set_view(&mut self, view: SmartView) {
        self.filter.set_view(view);
        self.recompose().await;
    }

    pub async fn toggle_included_tag(&mut self, tag: &str) {
        self.filter.toggle_included_tag(tag);
        self.recompose().await;
    }

    pub async fn toggle_excluded_tag(&mut self, tag: &str) {
        self.filter.toggle_excluded_tag(tag);
        self.recompose().await;
    }

    pub async fn toggle_single_tag(&mut self, tag: &str) {
        self.filter.toggle_single_tag(tag);
        self.recompose().await;
    }

    pub async fn toggle_collection(&mut self, id: CollectionId) {
        self.filter.toggle_collection(id);
        self.recompose().await;
    }

    pub async fn clear_tag_filters(&mut self) {
        self.filter.clear_tag_filters();
        self.recompose().await;
    }

    pub async fn set_folder_scope(&mut self, scope: Option<String>) {
        self.filter.set_folder_scope(scope);
        self.recompose().await;
    }

    /// Search and sort only touch the derived stage, no recomposition.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filter.set_query(query);
    }

    pub fn set_sort(&mut self, field: SortField) {
        self.filter.set_sort(field);
    }

    /// Recomposes the displayed list. A successful composition schedules a
    /// reconciliation pass instead of awaiting one, so filter changes return
    /// as soon as the new list is known; the shell drives pending passes
    /// between events via [`App::run_pending_reconciliation`].
    async fn recompose(&mut self) {
        let composed =
            self.composer.compose(&self.filter, self.service.as_ref(), &mut self.master).await;
        if composed {
            self.reconcile_pending = true;
        }
    }

    pub fn reconciliation_pending(&self) -> bool {
        self.reconcile_pending
    }

    /// Runs the reconciliation pass scheduled by the last composition, if
    /// any. A composition that lands while a pass is in flight simply
    /// schedules the next one.
    pub async fn run_pending_reconciliation(&mut self) -> ReconcileStats {
        if !self.reconcile_pending {
            return ReconcileStats::default();
        }
        self.reconcile_pending = false;
        self.reconcile().await
    }

    /// Sweeps the master asset list, then mirrors freshly patched images and
    /// counts into the displayed snapshots.
    async fn reconcile(&mut self) -> ReconcileStats {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return ReconcileStats::default();
        };
        let stats = thumbnails::reconcile(
            &mut self.cache,
            &mut self.master,
            pipeline.as_mut(),
            &self.service,
        )
        .await;
        for shown in self.composer.displayed_mut() {
            if let Some(owned) = self.master.iter().find(|a| a.id == shown.id) {
                shown.thumbnail = owned.thumbnail.clone();
                shown.poly_count = owned.poly_count;
            }
        }
        stats
    }

    // --- selection & detail ----------------------------------------------

    pub fn handle_asset_click(
        &mut self,
        asset: AssetId,
        index: usize,
        mods: ClickModifiers,
    ) -> DetailAction {
        let order: Vec<AssetId> = self.filtered_assets().iter().map(|a| a.id).collect();
        self.selection.handle_click(asset, index, mods, &order)
    }

    pub fn select_all_visible(&mut self) {
        let order: Vec<AssetId> = self.filtered_assets().iter().map(|a| a.id).collect();
        self.selection.select_all_visible(&order);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // --- favorites -------------------------------------------------------

    pub async fn toggle_favorite(&mut self, id: AssetId) {
        match self.service.toggle_favorite(id).await {
            Ok(_) => {
                // Refresh the master list so the flag is current even for
                // assets outside the displayed view, then recompose.
                match self.service.list_assets().await {
                    Ok(assets) => self.master = assets,
                    Err(err) => warn!("[app] asset list refresh failed: {err:#}"),
                }
                self.recompose().await;
            }
            Err(err) => {
                warn!("[app] toggle favorite failed for asset {id}: {err:#}");
                self.notify("Could not update favorite");
            }
        }
    }

    pub async fn bulk_set_favorite(&mut self, favorited: bool) {
        let ids: Vec<AssetId> = self.selection.selected().iter().copied().collect();
        if ids.is_empty() {
            return;
        }
        match self.service.bulk_set_favorite(ids, favorited).await {
            Ok(()) => self.recompose().await,
            Err(err) => {
                warn!("[app] bulk favorite failed: {err:#}");
                self.notify("Could not update favorites");
            }
        }
    }

    // --- tags ------------------------------------------------------------

    pub async fn add_tag(&mut self, id: AssetId, name: &str) -> Vec<Tag> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Vec::new();
        }
        match self.service.add_tag(id, name).await {
            Ok(tags) => {
                self.refresh_sidebar().await;
                tags
            }
            Err(err) => {
                warn!("[app] add tag failed for asset {id}: {err:#}");
                self.notify("Could not add tag");
                Vec::new()
            }
        }
    }

    pub async fn remove_tag(&mut self, id: AssetId, tag: TagId) -> Vec<Tag> {
        match self.service.remove_tag(id, tag).await {
            Ok(tags) => {
                self.refresh_sidebar().await;
                tags
            }
            Err(err) => {
                warn!("[app] remove tag failed for asset {id}: {err:#}");
                self.notify("Could not remove tag");
                Vec::new()
            }
        }
    }

    pub async fn bulk_tag_selected(&mut self, name: &str) {
        let name = name.trim().to_lowercase();
        let ids: Vec<AssetId> = self.selection.selected().iter().copied().collect();
        if name.is_empty() || ids.is_empty() {
            return;
        }
        match self.service.bulk_tag(ids, name).await {
            Ok(()) => {
                self.refresh_sidebar().await;
                self.recompose().await;
            }
            Err(err) => {
                warn!("[app] bulk tag failed: {err:#}");
                self.notify("Could not tag selected assets");
            }
        }
    }

    pub async fn tags_for_asset(&mut self, id: AssetId) -> Vec<Tag> {
        match self.service.tags_for_asset(id).await {
            Ok(tags) => tags,
            Err(err) => {
                warn!("[app] tag lookup failed for asset {id}: {err:#}");
                Vec::new()
            }
        }
    }

    // --- collections -----------------------------------------------------

    pub async fn create_collection(&mut self, name: &str, icon: String) {
        let name = name.trim().to_string();
        if name.is_empty() {
            return;
        }
        match self.service.create_collection(name, icon).await {
            Ok(_) => self.refresh_sidebar().await,
            Err(err) => {
                warn!("[app] create collection failed: {err:#}");
                self.notify("Could not create collection");
            }
        }
    }

    pub async fn delete_collection(&mut self, id: CollectionId) {
        match self.service.delete_collection(id).await {
            Ok(()) => {
                if self.filter.active_collection() == Some(id) {
                    self.filter.toggle_collection(id);
                }
                self.refresh_sidebar().await;
                self.recompose().await;
            }
            Err(err) => {
                warn!("[app] delete collection failed for {id}: {err:#}");
                self.notify("Could not delete collection");
            }
        }
    }

    pub async fn add_to_collection(&mut self, collection: CollectionId, asset: AssetId) {
        match self.service.add_to_collection(collection, asset).await {
            Ok(()) => self.refresh_sidebar().await,
            Err(err) => {
                warn!("[app] add to collection failed: {err:#}");
                self.notify("Could not add to collection");
            }
        }
    }

    pub async fn remove_from_collection(&mut self, collection: CollectionId, asset: AssetId) {
        match self.service.remove_from_collection(collection, asset).await {
            Ok(()) => {
                self.refresh_sidebar().await;
                self.recompose().await;
            }
            Err(err) => {
                warn!("[app] remove from collection failed: {err:#}");
                self.notify("Could not remove from collection");
            }
        }
    }

    pub async fn bulk_add_selected_to_collection(&mut self, collection: CollectionId) {
        let ids: Vec<AssetId> = self.selection.selected().iter().copied().collect();
        if ids.is_empty() {
            return;
        }
        match self.service.bulk_add_to_collection(collection, ids).await {
            Ok(()) => self.refresh_sidebar().await,
            Err(err) => {
                warn!("[app] bulk add to collection failed: {err:#}");
                self.notify("Could not add selected assets to collection");
            }
        }
    }

    pub async fn collections_for_asset(&mut self, id: AssetId) -> Vec<Collection> {
        match self.service.collections_for_asset(id).await {
            Ok(collections) => collections,
            Err(err) => {
                warn!("[app] collection lookup failed for asset {id}: {err:#}");
                Vec::new()
            }
        }
    }

    // --- watch folders ---------------------------------------------------

    pub async fn add_watch_folder(&mut self) {
        match self.service.add_watch_folder().await {
            Ok(assets) => {
                self.master = assets;
                self.refresh_sidebar().await;
                self.recompose().await;
            }
            Err(err) => {
                warn!("[app] add watch folder failed: {err:#}");
                self.notify("Could not add folder");
            }
        }
    }

    pub async fn remove_watch_folder(&mut self, id: FolderId) {
        match self.service.remove_watch_folder(id).await {
            Ok(()) => {
                match self.service.list_assets().await {
                    Ok(assets) => self.master = assets,
                    Err(err) => warn!("[app] asset list refresh failed: {err:#}"),
                }
                self.refresh_sidebar().await;
                self.recompose().await;
                if let Some(detail) = self.selection.detail() {
                    if !self.master.iter().any(|a| a.id == detail) {
                        self.selection.close_detail();
                    }
                }
            }
            Err(err) => {
                warn!("[app] remove watch folder failed for {id}: {err:#}");
                self.notify("Could not remove folder");
            }
        }
    }

    // --- deletion --------------------------------------------------------

    pub async fn delete_asset(&mut self, id: AssetId) {
        match self.service.delete_asset(id).await {
            Ok(()) => {
                if self.selection.detail() == Some(id) {
                    self.selection.close_detail();
                }
                self.recompose().await;
            }
            Err(err) => {
                warn!("[app] delete failed for asset {id}: {err:#}");
                self.notify("Could not delete asset");
            }
        }
    }

    pub async fn delete_selected(&mut self) {
        let ids: Vec<AssetId> = self.selection.selected().iter().copied().collect();
        if ids.is_empty() {
            return;
        }
        match self.service.delete_assets(ids).await {
            Ok(removed) => {
                self.notify(format!("Deleted {removed} assets"));
                self.selection.clear();
                self.recompose().await;
            }
            Err(err) => {
                warn!("[app] bulk delete failed: {err:#}");
                self.notify("Could not delete selected assets");
            }
        }
    }

    // --- editor bridge & desktop -----------------------------------------

    pub async fn ping_editor(&mut self) -> bool {
        self.editor_status = self.editor.ping().await;
        self.editor_status.ok()
    }

    /// Sends the asset to the companion editor and records the usage.
    pub async fn send_to_editor(&mut self, id: AssetId) {
        let Some(asset) = self.master.iter().find(|a| a.id == id).cloned() else {
            return;
        };
        self.editor_status = self.editor.send(vec![asset.absolute_path]).await;
        if let Some(error) = self.editor_status.error.clone() {
            self.notify(error);
            return;
        }
        if let Err(err) = self.service.mark_asset_used(id).await {
            warn!("[app] mark used failed for asset {id}: {err:#}");
        }
    }

    pub async fn send_selected_to_editor(&mut self) {
        let paths: Vec<String> = {
            let selected = self.selection.selected();
            self.master
                .iter()
                .filter(|a| selected.contains(&a.id))
                .map(|a| a.absolute_path.clone())
                .collect()
        };
        if paths.is_empty() {
            return;
        }
        let ids: Vec<AssetId> = self.selection.selected().iter().copied().collect();
        self.editor_status = self.editor.send(paths).await;
        if let Some(error) = self.editor_status.error.clone() {
            self.notify(error);
            return;
        }
        for id in ids {
            if let Err(err) = self.service.mark_asset_used(id).await {
                warn!("[app] mark used failed for asset {id}: {err:#}");
            }
        }
    }

    pub fn copy_asset_path(&mut self, id: AssetId) {
        let Some(asset) = self.master.iter().find(|a| a.id == id) else {
            return;
        };
        if let Err(err) = crate::desktop::copy_text(&asset.absolute_path) {
            warn!("[app] clipboard copy failed: {err:#}");
            self.notify("Could not copy path");
        } else {
            self.notify("Path copied");
        }
    }

    pub fn reveal_asset(&self, id: AssetId) {
        if let Some(asset) = self.master.iter().find(|a| a.id == id) {
            crate::desktop::reveal_in_file_browser(&asset.absolute_path);
        }
    }

    // --- thumbnails ------------------------------------------------------

    /// Explicit regenerate-all: clear persisted thumbnails on the service,
    /// forget every local image and count, then re-render the lot.
    pub async fn regenerate_all_thumbnails(&mut self) {
        match self.service.clear_all_thumbnails().await {
            Ok(cleared) => {
                info!("[app] cleared {cleared} persisted thumbnails");
                thumbnails::invalidate_all(&mut self.cache, &mut self.master);
                thumbnails::invalidate_all(&mut self.cache, self.composer.displayed_mut());
                let stats = self.reconcile().await;
                self.notify(format!(
                    "Regenerated thumbnails: {} rendered, {} failed",
                    stats.generated, stats.failed
                ));
            }
            Err(err) => {
                warn!("[app] clear thumbnails failed: {err:#}");
                self.notify("Could not clear thumbnails");
            }
        }
    }

    // --- internals -------------------------------------------------------

    /// Query failures here degrade to stale sidebar lists, same policy as
    /// the composer.
    async fn refresh_sidebar(&mut self) {
        match self.service.tags_with_counts().await {
            Ok(tags) => self.tags = tags,
            Err(err) => warn!("[app] tag list refresh failed: {err:#}"),
        }
        match self.service.list_collections().await {
            Ok(collections) => self.collections = collections,
            Err(err) => warn!("[app] collection list refresh failed: {err:#}"),
        }
        match self.service.list_watch_folders().await {
            Ok(folders) => self.folders = folders,
            Err(err) => warn!("[app] folder list refresh failed: {err:#}"),
        }
    }
}

pub const CONFIG_PATH: &str = "modelshelf.json";

pub async fn run_with_overrides(overrides: crate::config::AppConfigOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default(CONFIG_PATH);
    config.apply_overrides(&overrides);
    run(config).await
}

/// Headless session entry point used by the binary: load, compose the
/// default view, reconcile thumbnails, and report.
pub async fn run(config: AppConfig) -> Result<()> {
    let mut app = App::new(&config);
    app.init().await?;
    let filtered = app.filtered_assets();
    info!(
        "[app] composed default view: {} displayed, {} after search/sort, editor connected: {}",
        app.displayed_assets().len(),
        filtered.len(),
        app.editor_status().connected
    );
    Ok(())
}
