use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "ServiceConfig::default_base_url")]
    pub base_url: String,
}

impl ServiceConfig {
    fn default_base_url() -> String {
        "http://127.0.0.1:34115".to_string()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { base_url: Self::default_base_url() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditorConfig {
    #[serde(default = "EditorConfig::default_port")]
    pub port: u16,
}

impl EditorConfig {
    const fn default_port() -> u16 {
        29877
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self { port: Self::default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailConfig {
    #[serde(default = "ThumbnailConfig::default_resolution")]
    pub resolution: u32,
}

impl ThumbnailConfig {
    const fn default_resolution() -> u32 {
        256
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self { resolution: Self::default_resolution() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    /// Cap on the recently-added and recently-used smart views.
    #[serde(default = "ViewConfig::default_recent_limit")]
    pub recent_limit: usize,
}

impl ViewConfig {
    const fn default_recent_limit() -> usize {
        200
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self { recent_limit: Self::default_recent_limit() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub editor: EditorConfig,
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
    #[serde(default)]
    pub views: ViewConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub base_url: Option<String>,
    pub editor_port: Option<u16>,
    pub thumbnail_resolution: Option<u32>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(base_url) = &overrides.base_url {
            self.service.base_url = base_url.clone();
        }
        if let Some(port) = overrides.editor_port {
            self.editor.port = port;
        }
        if let Some(resolution) = overrides.thumbnail_resolution {
            self.thumbnails.resolution = resolution;
        }
    }
}
