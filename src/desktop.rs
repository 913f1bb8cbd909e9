use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Puts text on the system clipboard. The handle is opened per call.
pub fn copy_text(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("Failed to open system clipboard")?;
    clipboard.set_text(text.to_string()).context("Failed to write to clipboard")?;
    debug!("[desktop] copied {} chars to clipboard", text.len());
    Ok(())
}

/// Opens the platform file browser with the given file highlighted.
pub fn reveal_in_file_browser(path: impl AsRef<Path>) {
    showfile::show_path_in_file_manager(path.as_ref());
}
