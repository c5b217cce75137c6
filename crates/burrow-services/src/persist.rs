//! Persistence — where a completed transfer ends up.
//!
//! The reserved clipboard filename routes the payload to a clipboard sink
//! as text; anything else becomes a file in the output directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use burrow_core::CLIPBOARD_FILENAME;

/// Where a payload was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    File(PathBuf),
    Clipboard,
}

pub trait Persistence: Send + Sync {
    fn persist(&self, filename: &str, data: &[u8]) -> Result<Delivered>;
}

/// Receives clipboard transfers.
pub trait ClipboardSink: Send + Sync {
    fn set_text(&self, text: &str) -> Result<()>;
}

pub struct DirectoryPersistence {
    output_dir: PathBuf,
    clipboard: Option<Arc<dyn ClipboardSink>>,
}

impl DirectoryPersistence {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            clipboard: None,
        }
    }

    /// Route clipboard transfers to `sink` instead of writing a file.
    pub fn with_clipboard(mut self, sink: Arc<dyn ClipboardSink>) -> Self {
        self.clipboard = Some(sink);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Persistence for DirectoryPersistence {
    fn persist(&self, filename: &str, data: &[u8]) -> Result<Delivered> {
        if filename == CLIPBOARD_FILENAME {
            if let Some(sink) = &self.clipboard {
                // Non-UTF-8 clipboard payloads are delivered as empty text.
                let text = std::str::from_utf8(data).unwrap_or_default();
                sink.set_text(text).context("failed to set clipboard text")?;
                tracing::info!(chars = text.chars().count(), "clipboard updated");
                return Ok(Delivered::Clipboard);
            }
        }

        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed to create output dir: {}", self.output_dir.display())
        })?;
        let path = self.output_dir.join(safe_file_name(filename));
        std::fs::write(&path, data)
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!(path = %path.display(), bytes = data.len(), "file saved");
        Ok(Delivered::File(path))
    }
}

/// Final path component of an untrusted wire filename.
fn safe_file_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("received.bin")
        .to_string()
}
