use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(AssetId);
id_newtype!(TagId);
id_newtype!(CollectionId);
id_newtype!(FolderId);

/// One indexed model file. Owned by the catalog service; the client holds
/// read-only snapshots plus locally patched thumbnail/poly-count fields that
/// are pending server confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub absolute_path: String,
    pub filename: String,
    pub file_size: i64,
    pub folder_id: FolderId,
    pub modified_at: DateTime<Utc>,
    /// Base64 PNG data URL; empty when no thumbnail has been rendered yet.
    #[serde(default)]
    pub thumbnail: String,
    /// Triangle count; 0 means unknown.
    #[serde(default)]
    pub poly_count: i64,
    #[serde(default)]
    pub favorited: bool,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Asset {
    pub fn has_thumbnail(&self) -> bool {
        !self.thumbnail.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// Tag plus usage count; used for display ranking only, never for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagWithCount {
    pub id: TagId,
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub asset_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchFolder {
    pub id: FolderId,
    pub path: String,
    pub created_at: DateTime<Utc>,
}
