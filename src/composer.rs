use crate::catalog::Asset;
use crate::filter::{FilterState, PrimaryDimension, SmartView, SortDirection, SortField};
use crate::service::CatalogService;
use std::collections::HashSet;
use tracing::warn;

/// Turns filter state into the displayed asset list by running exactly one
/// primary service query per composition and applying the overlay dimensions
/// client-side. Query failures keep the previously displayed list.
#[derive(Debug)]
pub struct ViewComposer {
    displayed: Vec<Asset>,
    recent_limit: usize,
}

impl ViewComposer {
    /// `recent_limit` caps the recently-added and recently-used views;
    /// 0 means uncapped.
    pub fn new(recent_limit: usize) -> Self {
        Self { displayed: Vec::new(), recent_limit }
    }

    /// The last successfully composed list, before search and sort.
    pub fn displayed(&self) -> &[Asset] {
        &self.displayed
    }

    /// Mutable view for the reconciliation pass, which patches freshly
    /// rendered thumbnails and counts into the snapshot.
    pub fn displayed_mut(&mut self) -> &mut [Asset] {
        &mut self.displayed
    }

    /// Recomposes the displayed list. When the primary dimension is the
    /// all-assets view, `master` is refreshed from the query result before
    /// overlays narrow it. Returns false when the list was left stale because
    /// a query failed.
    pub async fn compose(
        &mut self,
        filter: &FilterState,
        service: &dyn CatalogService,
        master: &mut Vec<Asset>,
    ) -> bool {
        let primary = filter.primary();
        let fetched = match &primary {
            PrimaryDimension::Collection(id) => service.collection_assets(*id).await,
            PrimaryDimension::IncludedTags(tags) => service.assets_by_tags(tags).await,
            PrimaryDimension::SingleTag(tag) => service.assets_by_tag(tag).await,
            PrimaryDimension::View(SmartView::All) => service.list_assets().await,
            PrimaryDimension::View(SmartView::Untagged) => service.untagged_assets().await,
            PrimaryDimension::View(SmartView::Favorites) => service.favorited_assets().await,
            PrimaryDimension::View(SmartView::RecentlyAdded) => {
                service.recently_added_assets().await
            }
            PrimaryDimension::View(SmartView::RecentlyUsed) => service.recently_used_assets().await,
        };
        let mut assets = match fetched {
            Ok(assets) => assets,
            Err(err) => {
                warn!("[composer] primary query failed, keeping previous list: {err:#}");
                return false;
            }
        };

        if primary == PrimaryDimension::View(SmartView::All) {
            *master = assets.clone();
        }

        if self.recent_limit > 0
            && matches!(
                primary,
                PrimaryDimension::View(SmartView::RecentlyAdded | SmartView::RecentlyUsed)
            )
        {
            assets.truncate(self.recent_limit);
        }

        if let Some(scope) = filter.folder_scope() {
            assets.retain(|a| path_in_scope(scope, &a.absolute_path));
        }

        if !filter.excluded_tags().is_empty() {
            let excluded = match service.asset_ids_by_tags(filter.excluded_tags()).await {
                Ok(ids) => ids.into_iter().collect::<HashSet<_>>(),
                Err(err) => {
                    warn!("[composer] excluded-tag query failed, keeping previous list: {err:#}");
                    return false;
                }
            };
            assets.retain(|a| !excluded.contains(&a.id));
        }

        self.displayed = assets;
        true
    }

    /// Derived stage: search then sort, pure over the displayed list. Runs on
    /// every state change without touching the service.
    pub fn filtered(&self, filter: &FilterState) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.displayed.clone();

        let query = filter.query().trim().to_lowercase();
        if !query.is_empty() {
            assets.retain(|a| a.filename.to_lowercase().contains(&query));
        }

        let field = filter.sort_field();
        let descending = filter.sort_direction() == SortDirection::Descending;
        assets.sort_by(|a, b| {
            let ord = match field {
                SortField::Name => a.filename.to_lowercase().cmp(&b.filename.to_lowercase()),
                SortField::DateAdded => a.created_at.cmp(&b.created_at),
                SortField::FileModified => a.modified_at.cmp(&b.modified_at),
                SortField::FileSize => a.file_size.cmp(&b.file_size),
            };
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        assets
    }
}

/// Whether `path` lies inside the folder `scope`. Matches the scope itself
/// and true descendants; sibling folders sharing the scope as a name prefix
/// do not match.
pub fn path_in_scope(scope: &str, path: &str) -> bool {
    match path.strip_prefix(scope) {
        Some("") => true,
        Some(rest) => rest.starts_with('/') || rest.starts_with('\\'),
        None => false,
    }
}
