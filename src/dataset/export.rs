//! Export of the whole dataset as a downloadable line-delimited JSON artifact.
//!
//! Where the artifact ends up is decided by a [`SaveDestination`]: a browser
//! download, a directory, a fixed file, or a native "save as" dialog supplied by
//! a desktop shell. The store only produces the bytes.

use std::path::PathBuf;

use tracing::info;

use crate::dataset::core::errors::DatasetResult;
use crate::dataset::store::{ConversationStore, write_atomically};

/// File name suggested for exports.
pub const EXPORT_FILE_NAME: &str = "dataset.jsonl";

/// Content type used when serving exports.
pub const EXPORT_CONTENT_TYPE: &str = "application/json";

/// An export ready to hand to a destination.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExportArtifact {
    /// Suggested file name.
    pub file_name: &'static str,
    /// MIME type.
    pub content_type: &'static str,
    /// Document bytes (UTF-8 line-delimited JSON).
    pub bytes: Vec<u8>,
}

impl ExportArtifact {
    /// Build the artifact from the current store contents.
    ///
    /// # Errors
    /// Returns [`crate::dataset::DatasetError::EmptyStore`] if there is nothing to export.
    pub fn from_store(store: &ConversationStore) -> DatasetResult<Self> {
        let document = store.export_document()?;
        Ok(Self {
            file_name: EXPORT_FILE_NAME,
            content_type: EXPORT_CONTENT_TYPE,
            bytes: document.into_bytes(),
        })
    }

    /// Number of conversations in the artifact.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.bytes.iter().filter(|&&b| b == b'\n').count()
    }

    /// `Content-Disposition` header value for an attachment download.
    #[must_use]
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

/// Somewhere an export can be written.
///
/// `Ok(None)` means the user backed out (for example, closed a dialog).
pub trait SaveDestination {
    /// Write `bytes`, using `suggested_name` if the destination picks names.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    fn save(&self, bytes: &[u8], suggested_name: &str) -> DatasetResult<Option<PathBuf>>;
}

impl<F> SaveDestination for F
where
    F: Fn(&[u8], &str) -> DatasetResult<Option<PathBuf>>,
{
    fn save(&self, bytes: &[u8], suggested_name: &str) -> DatasetResult<Option<PathBuf>> {
        self(bytes, suggested_name)
    }
}

/// Writes exports into a directory under the suggested name.
#[derive(Clone, Debug)]
pub struct DirectoryDestination {
    dir: PathBuf,
}

impl DirectoryDestination {
    /// Target `dir`; it is created on first save if missing.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SaveDestination for DirectoryDestination {
    fn save(&self, bytes: &[u8], suggested_name: &str) -> DatasetResult<Option<PathBuf>> {
        let path = self.dir.join(suggested_name);
        write_atomically(&path, bytes)?;
        Ok(Some(path))
    }
}

/// Writes exports to one fixed path, ignoring the suggested name.
#[derive(Clone, Debug)]
pub struct FileDestination {
    path: PathBuf,
}

impl FileDestination {
    /// Target `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SaveDestination for FileDestination {
    fn save(&self, bytes: &[u8], _suggested_name: &str) -> DatasetResult<Option<PathBuf>> {
        write_atomically(&self.path, bytes)?;
        Ok(Some(self.path.clone()))
    }
}

/// Export the store through `destination`.
///
/// Returns the path written, or `None` if the destination declined.
///
/// # Errors
/// Returns [`crate::dataset::DatasetError::EmptyStore`] on an empty store, or
/// the destination's error.
pub fn export_to<D>(store: &ConversationStore, destination: &D) -> DatasetResult<Option<PathBuf>>
where
    D: SaveDestination + ?Sized,
{
    let artifact = ExportArtifact::from_store(store)?;
    let saved = destination.save(&artifact.bytes, artifact.file_name)?;
    match &saved {
        Some(path) => info!(
            "exported {} conversations to {}",
            artifact.line_count(),
            path.display()
        ),
        None => info!("export cancelled"),
    }
    Ok(saved)
}
