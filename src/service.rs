use crate::catalog::{
    Asset, AssetId, Collection, CollectionId, FolderId, Tag, TagId, TagWithCount, WatchFolder,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Remote catalog operations the client consumes. Storage, crawling, and the
/// interactive folder chooser all live behind this seam; every call may fail.
#[async_trait]
pub trait CatalogService: Send + Sync {
    // Asset queries.
    async fn list_assets(&self) -> Result<Vec<Asset>>;
    async fn assets_by_tag(&self, tag: &str) -> Result<Vec<Asset>>;
    /// Assets carrying every one of the given tags (conjunction).
    async fn assets_by_tags(&self, tags: &[String]) -> Result<Vec<Asset>>;
    /// Ids of assets carrying any of the given tags (disjunction).
    async fn asset_ids_by_tags(&self, tags: &[String]) -> Result<Vec<AssetId>>;
    async fn collection_assets(&self, id: CollectionId) -> Result<Vec<Asset>>;
    async fn untagged_assets(&self) -> Result<Vec<Asset>>;
    async fn favorited_assets(&self) -> Result<Vec<Asset>>;
    async fn recently_added_assets(&self) -> Result<Vec<Asset>>;
    async fn recently_used_assets(&self) -> Result<Vec<Asset>>;

    // Asset mutation.
    async fn save_thumbnail(&self, id: AssetId, data_url: String) -> Result<()>;
    async fn save_poly_count(&self, id: AssetId, count: i64) -> Result<()>;
    /// Returns the new favorite state.
    async fn toggle_favorite(&self, id: AssetId) -> Result<bool>;
    async fn bulk_set_favorite(&self, ids: Vec<AssetId>, favorited: bool) -> Result<()>;
    async fn mark_asset_used(&self, id: AssetId) -> Result<()>;
    async fn delete_asset(&self, id: AssetId) -> Result<()>;
    /// Returns the number of assets removed.
    async fn delete_assets(&self, ids: Vec<AssetId>) -> Result<usize>;
    /// Returns the number of thumbnails cleared.
    async fn clear_all_thumbnails(&self) -> Result<u64>;

    // Tags.
    async fn add_tag(&self, id: AssetId, name: String) -> Result<Vec<Tag>>;
    async fn remove_tag(&self, id: AssetId, tag: TagId) -> Result<Vec<Tag>>;
    async fn bulk_tag(&self, ids: Vec<AssetId>, name: String) -> Result<()>;
    async fn list_tags(&self) -> Result<Vec<Tag>>;
    async fn tags_with_counts(&self) -> Result<Vec<TagWithCount>>;
    async fn tags_for_asset(&self, id: AssetId) -> Result<Vec<Tag>>;

    // Collections.
    async fn create_collection(&self, name: String, icon: String) -> Result<Collection>;
    async fn delete_collection(&self, id: CollectionId) -> Result<()>;
    async fn add_to_collection(&self, collection: CollectionId, asset: AssetId) -> Result<()>;
    async fn remove_from_collection(&self, collection: CollectionId, asset: AssetId) -> Result<()>;
    async fn bulk_add_to_collection(&self, collection: CollectionId, ids: Vec<AssetId>)
        -> Result<()>;
    async fn list_collections(&self) -> Result<Vec<Collection>>;
    async fn collections_for_asset(&self, id: AssetId) -> Result<Vec<Collection>>;

    // Watch folders.
    /// Opens the service-side folder chooser; returns the refreshed asset
    /// list (unchanged when the chooser was cancelled).
    async fn add_watch_folder(&self) -> Result<Vec<Asset>>;
    async fn remove_watch_folder(&self, id: FolderId) -> Result<()>;
    async fn list_watch_folders(&self) -> Result<Vec<WatchFolder>>;

    /// Base URL of the local file-serving endpoint; empty when unavailable.
    async fn file_server_base(&self) -> Result<String>;
}

/// HTTP+JSON implementation of [`CatalogService`] against a base URL.
#[derive(Debug, Clone)]
pub struct HttpCatalogService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        response.json().await.with_context(|| format!("decode response from {url}"))
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> Result<T> {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url}"))?;
        response.json().await.with_context(|| format!("decode response from {url}"))
    }

    async fn post_unit(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = self.url(path);
        self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url}"))?;
        Ok(())
    }

    async fn delete_unit(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.client
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("DELETE {url}"))?
            .error_for_status()
            .with_context(|| format!("DELETE {url}"))?;
        Ok(())
    }
}

#[async_trait]
impl CatalogService for HttpCatalogService {
    async fn list_assets(&self) -> Result<Vec<Asset>> {
        self.get_json("/api/assets").await
    }

    async fn assets_by_tag(&self, tag: &str) -> Result<Vec<Asset>> {
        self.get_json(&format!("/api/assets?tag={}", urlencoding::encode(tag))).await
    }

    async fn assets_by_tags(&self, tags: &[String]) -> Result<Vec<Asset>> {
        self.post_json("/api/assets/by-tags", json!({ "tags": tags })).await
    }

    async fn asset_ids_by_tags(&self, tags: &[String]) -> Result<Vec<AssetId>> {
        self.post_json("/api/assets/ids-by-tags", json!({ "tags": tags })).await
    }

    async fn collection_assets(&self, id: CollectionId) -> Result<Vec<Asset>> {
        self.get_json(&format!("/api/collections/{id}/assets")).await
    }

    async fn untagged_assets(&self) -> Result<Vec<Asset>> {
        self.get_json("/api/assets/untagged").await
    }

    async fn favorited_assets(&self) -> Result<Vec<Asset>> {
        self.get_json("/api/assets/favorited").await
    }

    async fn recently_added_assets(&self) -> Result<Vec<Asset>> {
        self.get_json("/api/assets/recently-added").await
    }

    async fn recently_used_assets(&self) -> Result<Vec<Asset>> {
        self.get_json("/api/assets/recently-used").await
    }

    async fn save_thumbnail(&self, id: AssetId, data_url: String) -> Result<()> {
        self.post_unit(&format!("/api/assets/{id}/thumbnail"), json!({ "data": data_url })).await
    }

    async fn save_poly_count(&self, id: AssetId, count: i64) -> Result<()> {
        self.post_unit(&format!("/api/assets/{id}/poly-count"), json!({ "count": count })).await
    }

    async fn toggle_favorite(&self, id: AssetId) -> Result<bool> {
        self.post_json(&format!("/api/assets/{id}/favorite/toggle"), json!({})).await
    }

    async fn bulk_set_favorite(&self, ids: Vec<AssetId>, favorited: bool) -> Result<()> {
        self.post_unit("/api/assets/favorite", json!({ "ids": ids, "favorited": favorited })).await
    }

    async fn mark_asset_used(&self, id: AssetId) -> Result<()> {
        self.post_unit(&format!("/api/assets/{id}/used"), json!({})).await
    }

    async fn delete_asset(&self, id: AssetId) -> Result<()> {
        self.delete_unit(&format!("/api/assets/{id}")).await
    }

    async fn delete_assets(&self, ids: Vec<AssetId>) -> Result<usize> {
        self.post_json("/api/assets/delete", json!({ "ids": ids })).await
    }

    async fn clear_all_thumbnails(&self) -> Result<u64> {
        self.post_json("/api/thumbnails/clear", json!({})).await
    }

    async fn add_tag(&self, id: AssetId, name: String) -> Result<Vec<Tag>> {
        self.post_json(&format!("/api/assets/{id}/tags"), json!({ "name": name })).await
    }

    async fn remove_tag(&self, id: AssetId, tag: TagId) -> Result<Vec<Tag>> {
        let url = self.url(&format!("/api/assets/{id}/tags/{tag}"));
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .with_context(|| format!("DELETE {url}"))?
            .error_for_status()
            .with_context(|| format!("DELETE {url}"))?;
        response.json().await.with_context(|| format!("decode response from {url}"))
    }

    async fn bulk_tag(&self, ids: Vec<AssetId>, name: String) -> Result<()> {
        self.post_unit("/api/tags/bulk", json!({ "ids": ids, "name": name })).await
    }

    async fn list_tags(&self) -> Result<Vec<Tag>> {
        self.get_json("/api/tags").await
    }

    async fn tags_with_counts(&self) -> Result<Vec<TagWithCount>> {
        self.get_json("/api/tags/counts").await
    }

    async fn tags_for_asset(&self, id: AssetId) -> Result<Vec<Tag>> {
        self.get_json(&format!("/api/assets/{id}/tags")).await
    }

    async fn create_collection(&self, name: String, icon: String) -> Result<Collection> {
        self.post_json("/api/collections", json!({ "name": name, "icon": icon })).await
    }

    async fn delete_collection(&self, id: CollectionId) -> Result<()> {
        self.delete_unit(&format!("/api/collections/{id}")).await
    }

    async fn add_to_collection(&self, collection: CollectionId, asset: AssetId) -> Result<()> {
        self.post_unit(&format!("/api/collections/{collection}/assets"), json!({ "id": asset }))
            .await
    }

    async fn remove_from_collection(&self, collection: CollectionId, asset: AssetId) -> Result<()> {
        self.delete_unit(&format!("/api/collections/{collection}/assets/{asset}")).await
    }

    async fn bulk_add_to_collection(
        &self,
        collection: CollectionId,
        ids: Vec<AssetId>,
    ) -> Result<()> {
        self.post_unit(&format!("/api/collections/{collection}/assets/bulk"), json!({ "ids": ids }))
            .await
    }

    async fn list_collections(&self) -> Result<Vec<Collection>> {
        self.get_json("/api/collections").await
    }

    async fn collections_for_asset(&self, id: AssetId) -> Result<Vec<Collection>> {
        self.get_json(&format!("/api/assets/{id}/collections")).await
    }

    async fn add_watch_folder(&self) -> Result<Vec<Asset>> {
        self.post_json("/api/folders", json!({})).await
    }

    async fn remove_watch_folder(&self, id: FolderId) -> Result<()> {
        self.delete_unit(&format!("/api/folders/{id}")).await
    }

    async fn list_watch_folders(&self) -> Result<Vec<WatchFolder>> {
        self.get_json("/api/folders").await
    }

    async fn file_server_base(&self) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct FileServer {
            base_url: String,
        }
        let info: FileServer = self.get_json("/api/fileserver").await?;
        Ok(info.base_url)
    }
}

/// Connection status of the companion 3D editor's import addon.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EditorStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EditorStatus {
    pub fn ok(&self) -> bool {
        self.connected && self.error.is_none()
    }
}

const EDITOR_PING_TIMEOUT: Duration = Duration::from_secs(1);
const EDITOR_SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// Bridge to the companion editor's local import addon. Unreachable is a
/// status, never an error: callers poll this and show a connectivity dot.
#[derive(Debug, Clone)]
pub struct EditorBridge {
    client: reqwest::Client,
    port: u16,
}

impl EditorBridge {
    pub fn new(port: u16) -> Self {
        Self { client: reqwest::Client::new(), port }
    }

    fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}/import", self.port)
    }

    pub async fn ping(&self) -> EditorStatus {
        match self.client.get(self.endpoint()).timeout(EDITOR_PING_TIMEOUT).send().await {
            Ok(_) => EditorStatus { connected: true, error: None },
            Err(_) => EditorStatus {
                connected: false,
                error: Some("Editor addon not reachable".to_string()),
            },
        }
    }

    /// Sends absolute file paths to the editor for import.
    pub async fn send(&self, paths: Vec<String>) -> EditorStatus {
        let body = json!({ "action": "import", "files": paths });
        let response = self
            .client
            .post(self.endpoint())
            .timeout(EDITOR_SEND_TIMEOUT)
            .json(&body)
            .send()
            .await;
        match response {
            Ok(response) if response.status().is_success() => {
                EditorStatus { connected: true, error: None }
            }
            Ok(response) => EditorStatus {
                connected: true,
                error: Some(format!("Editor returned {}", response.status())),
            },
            Err(_) => EditorStatus {
                connected: false,
                error: Some(
                    "Editor addon not running. Open the editor and enable the import addon."
                        .to_string(),
                ),
            },
        }
    }
}
