use crate::catalog::CollectionId;

/// Predefined asset queries selectable as an alternative to manual filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmartView {
    #[default]
    All,
    Untagged,
    Favorites,
    RecentlyAdded,
    RecentlyUsed,
}

impl SmartView {
    pub fn label(self) -> &'static str {
        match self {
            SmartView::All => "All assets",
            SmartView::Untagged => "Untagged",
            SmartView::Favorites => "Favorites",
            SmartView::RecentlyAdded => "Recently Added",
            SmartView::RecentlyUsed => "Recently Used",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Name,
    DateAdded,
    FileModified,
    FileSize,
}

impl SortField {
    /// Direction used when this field first becomes active: names are browsed
    /// A-to-Z, recency and size are browsed largest/most-recent first.
    pub fn default_direction(self) -> SortDirection {
        match self {
            SortField::Name => SortDirection::Ascending,
            _ => SortDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// The single mutually-exclusive filter mode governing which service query
/// produces the displayed list.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimaryDimension {
    Collection(CollectionId),
    IncludedTags(Vec<String>),
    SingleTag(String),
    View(SmartView),
}

/// All filter-state cells. Primary dimensions (collection, included tags,
/// single legacy tag, smart view) are mutually exclusive; folder scope and
/// excluded tags are overlays composable with any primary dimension.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    active_collection: Option<CollectionId>,
    included_tags: Vec<String>,
    excluded_tags: Vec<String>,
    single_tag: Option<String>,
    view: SmartView,
    folder_scope: Option<String>,
    query: String,
    sort_field: SortField,
    sort_direction: SortDirection,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SmartView {
        self.view
    }

    pub fn active_collection(&self) -> Option<CollectionId> {
        self.active_collection
    }

    pub fn included_tags(&self) -> &[String] {
        &self.included_tags
    }

    pub fn excluded_tags(&self) -> &[String] {
        &self.excluded_tags
    }

    pub fn single_tag(&self) -> Option<&str> {
        self.single_tag.as_deref()
    }

    pub fn folder_scope(&self) -> Option<&str> {
        self.folder_scope.as_deref()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sort_field(&self) -> SortField {
        self.sort_field
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// Resolves the precedence order for the composer: collection, then
    /// included-tag conjunction, then the legacy single tag, then the view.
    pub fn primary(&self) -> PrimaryDimension {
        if let Some(id) = self.active_collection {
            PrimaryDimension::Collection(id)
        } else if !self.included_tags.is_empty() {
            PrimaryDimension::IncludedTags(self.included_tags.clone())
        } else if let Some(tag) = &self.single_tag {
            PrimaryDimension::SingleTag(tag.clone())
        } else {
            PrimaryDimension::View(self.view)
        }
    }

    /// Number of primary dimensions currently active besides the smart view
    /// fallback. Always 0 or 1 after any transition below.
    pub fn active_primary_count(&self) -> usize {
        let mut count = 0;
        if self.active_collection.is_some() {
            count += 1;
        }
        if !self.included_tags.is_empty() {
            count += 1;
        }
        if self.single_tag.is_some() {
            count += 1;
        }
        if self.view != SmartView::All {
            count += 1;
        }
        count
    }

    fn clear_primary(&mut self) {
        self.active_collection = None;
        self.included_tags.clear();
        self.single_tag = None;
        self.view = SmartView::All;
    }

    /// Toggles a tag in the included set. Activating the included-tag
    /// dimension clears every other primary dimension, and an included tag
    /// can never simultaneously be excluded.
    pub fn toggle_included_tag(&mut self, tag: &str) {
        self.active_collection = None;
        self.single_tag = None;
        self.view = SmartView::All;
        self.excluded_tags.retain(|t| t != tag);
        if let Some(pos) = self.included_tags.iter().position(|t| t == tag) {
            self.included_tags.remove(pos);
        } else {
            self.included_tags.push(tag.to_string());
        }
    }

    /// Toggles a tag in the excluded overlay. Does not touch the primary
    /// dimension, but removes the tag from the included set first.
    pub fn toggle_excluded_tag(&mut self, tag: &str) {
        self.included_tags.retain(|t| t != tag);
        if let Some(pos) = self.excluded_tags.iter().position(|t| t == tag) {
            self.excluded_tags.remove(pos);
        } else {
            self.excluded_tags.push(tag.to_string());
        }
    }

    /// Activates the legacy single-tag filter, or deactivates it when the
    /// same tag is already active.
    pub fn toggle_single_tag(&mut self, tag: &str) {
        let was_active = self.single_tag.as_deref() == Some(tag);
        self.clear_primary();
        if !was_active {
            self.single_tag = Some(tag.to_string());
        }
    }

    pub fn toggle_collection(&mut self, id: CollectionId) {
        let was_active = self.active_collection == Some(id);
        self.clear_primary();
        if !was_active {
            self.active_collection = Some(id);
        }
    }

    pub fn set_view(&mut self, view: SmartView) {
        self.clear_primary();
        self.view = view;
    }

    /// Drops every tag-based filter (included, excluded, single) and returns
    /// to the all-assets view.
    pub fn clear_tag_filters(&mut self) {
        self.clear_primary();
        self.excluded_tags.clear();
    }

    pub fn set_folder_scope(&mut self, scope: Option<String>) {
        self.folder_scope = scope;
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Re-selecting the active sort field flips its direction; switching to a
    /// different field resets to that field's natural direction.
    pub fn set_sort(&mut self, field: SortField) {
        if self.sort_field == field {
            self.sort_direction = self.sort_direction.toggled();
        } else {
            self.sort_field = field;
            self.sort_direction = field.default_direction();
        }
    }
}
