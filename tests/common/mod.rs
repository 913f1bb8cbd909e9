#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use modelshelf::catalog::{
    Asset, AssetId, Collection, CollectionId, FolderId, Tag, TagId, TagWithCount, WatchFolder,
};
use modelshelf::render::RenderedThumbnail;
use modelshelf::service::CatalogService;
use modelshelf::thumbnails::ThumbnailSource;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).single().expect("timestamp")
}

pub fn asset(id: i64, path: &str) -> Asset {
    let filename = path.rsplit(['/', '\\']).next().unwrap_or(path).to_string();
    Asset {
        id: AssetId(id),
        absolute_path: path.to_string(),
        filename,
        file_size: 1000 + id,
        folder_id: FolderId(1),
        modified_at: timestamp(id),
        thumbnail: String::new(),
        poly_count: 0,
        favorited: false,
        last_used_at: None,
        created_at: timestamp(id),
        updated_at: timestamp(id),
    }
}

#[derive(Default)]
pub struct CatalogState {
    pub assets: Vec<Asset>,
    pub asset_tags: HashMap<AssetId, HashSet<String>>,
    pub collections: Vec<Collection>,
    pub collection_members: HashMap<CollectionId, HashSet<AssetId>>,
    pub folders: Vec<WatchFolder>,
    pub saved_thumbnails: HashMap<AssetId, String>,
    pub saved_poly_counts: HashMap<AssetId, i64>,
    pub used: Vec<AssetId>,
    pub calls: Vec<String>,
    pub fail_queries: bool,
    pub fail_excluded_query: bool,
    pub fail_saves: bool,
    pub file_server: String,
}

/// In-memory stand-in for the remote catalog service. Query methods respect
/// the `fail_*` switches so tests can exercise the stale-on-error paths.
pub struct InMemoryCatalog {
    pub state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            state: Mutex::new(CatalogState {
                assets,
                file_server: "http://127.0.0.1:34115".to_string(),
                ..CatalogState::default()
            }),
        }
    }

    pub fn tag_asset(&self, id: AssetId, tag: &str) {
        let mut state = self.state.lock().expect("state lock");
        state.asset_tags.entry(id).or_default().insert(tag.to_string());
    }

    pub fn with_state<T>(&self, f: impl FnOnce(&mut CatalogState) -> T) -> T {
        f(&mut self.state.lock().expect("state lock"))
    }

    fn query<T>(&self, name: &str, f: impl FnOnce(&CatalogState) -> T) -> Result<T> {
        let mut state = self.state.lock().expect("state lock");
        state.calls.push(name.to_string());
        if state.fail_queries {
            bail!("injected failure for {name}");
        }
        Ok(f(&state))
    }

    fn tag_names(state: &CatalogState, id: AssetId) -> HashSet<String> {
        state.asset_tags.get(&id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn list_assets(&self) -> Result<Vec<Asset>> {
        self.query("list_assets", |s| s.assets.clone())
    }

    async fn assets_by_tag(&self, tag: &str) -> Result<Vec<Asset>> {
        self.query("assets_by_tag", |s| {
            s.assets
                .iter()
                .filter(|a| Self::tag_names(s, a.id).contains(tag))
                .cloned()
                .collect()
        })
    }

    async fn assets_by_tags(&self, tags: &[String]) -> Result<Vec<Asset>> {
        self.query("assets_by_tags", |s| {
            s.assets
                .iter()
                .filter(|a| {
                    let names = Self::tag_names(s, a.id);
                    tags.iter().all(|t| names.contains(t))
                })
                .cloned()
                .collect()
        })
    }

    async fn asset_ids_by_tags(&self, tags: &[String]) -> Result<Vec<AssetId>> {
        let mut state = self.state.lock().expect("state lock");
        state.calls.push("asset_ids_by_tags".to_string());
        if state.fail_queries || state.fail_excluded_query {
            bail!("injected failure for asset_ids_by_tags");
        }
        Ok(state
            .assets
            .iter()
            .filter(|a| {
                let names = Self::tag_names(&state, a.id);
                tags.iter().any(|t| names.contains(t))
            })
            .map(|a| a.id)
            .collect())
    }

    async fn collection_assets(&self, id: CollectionId) -> Result<Vec<Asset>> {
        self.query("collection_assets", |s| {
            let members = s.collection_members.get(&id).cloned().unwrap_or_default();
            s.assets.iter().filter(|a| members.contains(&a.id)).cloned().collect()
        })
    }

    async fn untagged_assets(&self) -> Result<Vec<Asset>> {
        self.query("untagged_assets", |s| {
            s.assets.iter().filter(|a| Self::tag_names(s, a.id).is_empty()).cloned().collect()
        })
    }

    async fn favorited_assets(&self) -> Result<Vec<Asset>> {
        self.query("favorited_assets", |s| s.assets.iter().filter(|a| a.favorited).cloned().collect())
    }

    async fn recently_added_assets(&self) -> Result<Vec<Asset>> {
        self.query("recently_added_assets", |s| {
            let mut assets = s.assets.clone();
            assets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            assets
        })
    }

    async fn recently_used_assets(&self) -> Result<Vec<Asset>> {
        self.query("recently_used_assets", |s| {
            let mut assets: Vec<Asset> =
                s.assets.iter().filter(|a| a.last_used_at.is_some()).cloned().collect();
            assets.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
            assets
        })
    }

    async fn save_thumbnail(&self, id: AssetId, data_url: String) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        if state.fail_saves {
            bail!("injected save failure");
        }
        state.saved_thumbnails.insert(id, data_url.clone());
        if let Some(asset) = state.assets.iter_mut().find(|a| a.id == id) {
            asset.thumbnail = data_url;
        }
        Ok(())
    }

    async fn save_poly_count(&self, id: AssetId, count: i64) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        if state.fail_saves {
            bail!("injected save failure");
        }
        state.saved_poly_counts.insert(id, count);
        if let Some(asset) = state.assets.iter_mut().find(|a| a.id == id) {
            asset.poly_count = count;
        }
        Ok(())
    }

    async fn toggle_favorite(&self, id: AssetId) -> Result<bool> {
        let mut state = self.state.lock().expect("state lock");
        let asset = state
            .assets
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| anyhow!("unknown asset {id}"))?;
        asset.favorited = !asset.favorited;
        Ok(asset.favorited)
    }

    async fn bulk_set_favorite(&self, ids: Vec<AssetId>, favorited: bool) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        for asset in state.assets.iter_mut() {
            if ids.contains(&asset.id) {
                asset.favorited = favorited;
            }
        }
        Ok(())
    }

    async fn mark_asset_used(&self, id: AssetId) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.used.push(id);
        if let Some(asset) = state.assets.iter_mut().find(|a| a.id == id) {
            asset.last_used_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete_asset(&self, id: AssetId) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.assets.retain(|a| a.id != id);
        Ok(())
    }

    async fn delete_assets(&self, ids: Vec<AssetId>) -> Result<usize> {
        let mut state = self.state.lock().expect("state lock");
        let before = state.assets.len();
        state.assets.retain(|a| !ids.contains(&a.id));
        Ok(before - state.assets.len())
    }

    async fn clear_all_thumbnails(&self) -> Result<u64> {
        let mut state = self.state.lock().expect("state lock");
        let cleared = state.assets.iter().filter(|a| a.has_thumbnail()).count() as u64;
        for asset in state.assets.iter_mut() {
            asset.thumbnail.clear();
            asset.poly_count = 0;
        }
        state.saved_thumbnails.clear();
        state.saved_poly_counts.clear();
        Ok(cleared)
    }

    async fn add_tag(&self, id: AssetId, name: String) -> Result<Vec<Tag>> {
        self.tag_asset(id, &name);
        self.tags_for_asset(id).await
    }

    async fn remove_tag(&self, id: AssetId, tag: TagId) -> Result<Vec<Tag>> {
        let name = {
            let tags = self.list_tags().await?;
            tags.iter().find(|t| t.id == tag).map(|t| t.name.clone())
        };
        if let Some(name) = name {
            let mut state = self.state.lock().expect("state lock");
            if let Some(names) = state.asset_tags.get_mut(&id) {
                names.remove(&name);
            }
        }
        self.tags_for_asset(id).await
    }

    async fn bulk_tag(&self, ids: Vec<AssetId>, name: String) -> Result<()> {
        for id in ids {
            self.tag_asset(id, &name);
        }
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        let state = self.state.lock().expect("state lock");
        let mut names: Vec<String> =
            state.asset_tags.values().flatten().cloned().collect::<HashSet<_>>().into_iter().collect();
        names.sort();
        Ok(names
            .into_iter()
            .enumerate()
            .map(|(i, name)| Tag { id: TagId(i as i64 + 1), name })
            .collect())
    }

    async fn tags_with_counts(&self) -> Result<Vec<TagWithCount>> {
        let tags = self.list_tags().await?;
        let state = self.state.lock().expect("state lock");
        Ok(tags
            .into_iter()
            .map(|tag| {
                let count =
                    state.asset_tags.values().filter(|names| names.contains(&tag.name)).count() as i64;
                TagWithCount { id: tag.id, name: tag.name, count }
            })
            .collect())
    }

    async fn tags_for_asset(&self, id: AssetId) -> Result<Vec<Tag>> {
        let all = self.list_tags().await?;
        let state = self.state.lock().expect("state lock");
        let names = state.asset_tags.get(&id).cloned().unwrap_or_default();
        Ok(all.into_iter().filter(|t| names.contains(&t.name)).collect())
    }

    async fn create_collection(&self, name: String, icon: String) -> Result<Collection> {
        let mut state = self.state.lock().expect("state lock");
        let id = CollectionId(state.collections.len() as i64 + 1);
        let collection = Collection {
            id,
            name,
            description: String::new(),
            icon,
            asset_count: 0,
            created_at: Utc::now(),
        };
        state.collections.push(collection.clone());
        Ok(collection)
    }

    async fn delete_collection(&self, id: CollectionId) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.collections.retain(|c| c.id != id);
        state.collection_members.remove(&id);
        Ok(())
    }

    async fn add_to_collection(&self, collection: CollectionId, asset: AssetId) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.collection_members.entry(collection).or_default().insert(asset);
        Ok(())
    }

    async fn remove_from_collection(&self, collection: CollectionId, asset: AssetId) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        if let Some(members) = state.collection_members.get_mut(&collection) {
            members.remove(&asset);
        }
        Ok(())
    }

    async fn bulk_add_to_collection(
        &self,
        collection: CollectionId,
        ids: Vec<AssetId>,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.collection_members.entry(collection).or_default().extend(ids);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        let state = self.state.lock().expect("state lock");
        Ok(state.collections.clone())
    }

    async fn collections_for_asset(&self, id: AssetId) -> Result<Vec<Collection>> {
        let state = self.state.lock().expect("state lock");
        Ok(state
            .collections
            .iter()
            .filter(|c| {
                state.collection_members.get(&c.id).map(|m| m.contains(&id)).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn add_watch_folder(&self) -> Result<Vec<Asset>> {
        let state = self.state.lock().expect("state lock");
        Ok(state.assets.clone())
    }

    async fn remove_watch_folder(&self, id: FolderId) -> Result<()> {
        let mut state = self.state.lock().expect("state lock");
        state.folders.retain(|f| f.id != id);
        Ok(())
    }

    async fn list_watch_folders(&self) -> Result<Vec<WatchFolder>> {
        let state = self.state.lock().expect("state lock");
        Ok(state.folders.clone())
    }

    async fn file_server_base(&self) -> Result<String> {
        let state = self.state.lock().expect("state lock");
        Ok(state.file_server.clone())
    }
}

/// Scripted thumbnail source: each asset id maps to a rendered result, a
/// failure, or (absent) a renderer-unavailable response. Invocations are
/// recorded in order.
pub struct ScriptedThumbnails {
    pub available: bool,
    pub results: HashMap<AssetId, Result<RenderedThumbnail, String>>,
    pub invoked: Vec<AssetId>,
}

impl ScriptedThumbnails {
    pub fn new() -> Self {
        Self { available: true, results: HashMap::new(), invoked: Vec::new() }
    }

    pub fn succeed(&mut self, id: i64, poly_count: i64) {
        let data_url = format!("data:image/png;base64,render-{id}");
        self.results.insert(
            AssetId(id),
            Ok(RenderedThumbnail { png: vec![id as u8], data_url, poly_count }),
        );
    }

    pub fn fail(&mut self, id: i64, message: &str) {
        self.results.insert(AssetId(id), Err(message.to_string()));
    }
}

#[async_trait(?Send)]
impl ThumbnailSource for ScriptedThumbnails {
    fn available(&self) -> bool {
        self.available
    }

    async fn thumbnail_for(&mut self, asset: &Asset) -> Result<Option<RenderedThumbnail>> {
        self.invoked.push(asset.id);
        match self.results.get(&asset.id) {
            Some(Ok(rendered)) => Ok(Some(rendered.clone())),
            Some(Err(message)) => Err(anyhow!("{message}")),
            None => Ok(None),
        }
    }
}

/// Lets detached persistence tasks spawned during reconciliation run to
/// completion on the current-thread runtime.
pub async fn drain_spawned_tasks() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
