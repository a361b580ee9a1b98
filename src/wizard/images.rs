use std::{
    collections::HashMap,
    fmt,
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::api::UploadService;

const PREVIEW_SCHEME: &str = "preview://";

/// Local-only reference to an image that has not been uploaded yet.
/// Valid only inside the session that created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EphemeralRef(String);

impl EphemeralRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EphemeralRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a project's ordered image list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageRef {
    Persisted(String),
    Ephemeral(EphemeralRef),
}

impl ImageRef {
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, ImageRef::Ephemeral(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Image upload failed: {0:#}")]
    Upload(anyhow::Error),

    #[error("Upload returned {received} result(s) for {sent} file(s)")]
    Mismatch { sent: usize, received: usize },

    #[error("No pending image for {0}")]
    UnknownPreview(EphemeralRef),
}

/// The local resource behind an ephemeral reference: a copy of the picked
/// file inside the session's preview directory.
#[derive(Debug)]
struct PendingImage {
    preview: PathBuf,
    source: PathBuf,
}

impl PendingImage {
    fn release(self) {
        if let Err(e) = fs::remove_file(&self.preview) {
            warn!(preview = ?self.preview, error = %e, "failed to release image preview");
        }
    }
}

/// Tracks previewed-but-unsaved images next to the persisted ones and swaps
/// the former for uploaded references at save time.
///
/// Every [`EphemeralRef`] in a draft's image list has exactly one pending
/// entry here until it is discarded or resolved.
pub struct ImageReconciler {
    preview_dir: TempDir,
    pending: HashMap<EphemeralRef, PendingImage>,
}

impl fmt::Debug for ImageReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageReconciler")
            .field("preview_dir", &self.preview_dir.path())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ImageReconciler {
    pub fn new() -> anyhow::Result<Self> {
        let preview_dir = tempfile::Builder::new()
            .prefix("estatedesk_previews")
            .tempdir()
            .context("Failed to create image preview directory")?;
        Ok(Self {
            preview_dir,
            pending: HashMap::new(),
        })
    }

    /// Copy `file` into the preview directory, append a new ephemeral
    /// reference for it to `images` and return that reference.
    pub fn stage_preview(
        &mut self,
        images: &mut Vec<ImageRef>,
        file: &Path,
    ) -> anyhow::Result<EphemeralRef> {
        let preview_name = match file.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let preview = self.preview_dir.path().join(&preview_name);
        fs::copy(file, &preview)
            .with_context(|| format!("Failed to copy image {:?} to {:?}", file, preview))?;

        let reference = EphemeralRef(format!("{}{}", PREVIEW_SCHEME, preview_name));
        debug!(%reference, source = ?file, "staged image preview");
        self.pending.insert(
            reference.clone(),
            PendingImage {
                preview,
                source: file.to_path_buf(),
            },
        );
        images.push(ImageRef::Ephemeral(reference.clone()));
        Ok(reference)
    }

    /// Remove `image` from `images`. An ephemeral reference also drops its
    /// pending entry and releases the preview. Returns whether anything was
    /// removed.
    pub fn discard(&mut self, images: &mut Vec<ImageRef>, image: &ImageRef) -> bool {
        let before = images.len();
        images.retain(|existing| existing != image);
        if let ImageRef::Ephemeral(reference) = image {
            if let Some(pending) = self.pending.remove(reference) {
                pending.release();
            }
        }
        images.len() != before
    }

    /// Path of the local copy backing `reference`, for display.
    pub fn preview_path(&self, reference: &EphemeralRef) -> Option<&Path> {
        self.pending
            .get(reference)
            .map(|pending| pending.preview.as_path())
    }

    /// The file originally picked for `reference`.
    pub fn source_path(&self, reference: &EphemeralRef) -> Option<&Path> {
        self.pending
            .get(reference)
            .map(|pending| pending.source.as_path())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Upload every pending image referenced by `images` as one batch and
    /// return the list with each ephemeral reference replaced, in place, by
    /// its uploaded reference. Persisted entries pass through untouched.
    ///
    /// Nothing is substituted or released unless the whole batch succeeds.
    pub async fn resolve_all<U: UploadService>(
        &mut self,
        images: &[ImageRef],
        uploads: &U,
    ) -> Result<Vec<String>, ResolveError> {
        let mut batch: Vec<&EphemeralRef> = vec![];
        for image in images {
            if let ImageRef::Ephemeral(reference) = image {
                if !self.pending.contains_key(reference) {
                    return Err(ResolveError::UnknownPreview(reference.clone()));
                }
                if !batch.contains(&reference) {
                    batch.push(reference);
                }
            }
        }

        let mut resolved: HashMap<EphemeralRef, String> = HashMap::new();
        if !batch.is_empty() {
            let files: Vec<PathBuf> = batch
                .iter()
                .filter_map(|reference| self.pending.get(*reference))
                .map(|pending| pending.preview.clone())
                .collect();
            let uploaded = uploads
                .upload_batch(&files)
                .await
                .map_err(ResolveError::Upload)?;
            if uploaded.len() != files.len() {
                return Err(ResolveError::Mismatch {
                    sent: files.len(),
                    received: uploaded.len(),
                });
            }
            resolved = batch
                .iter()
                .map(|reference| (*reference).clone())
                .zip(uploaded.into_iter().map(|image| image.url))
                .collect();
        }

        let persisted = substitute(images, &resolved)?;
        for reference in resolved.keys() {
            if let Some(pending) = self.pending.remove(reference) {
                pending.release();
            }
        }
        Ok(persisted)
    }

    /// Release every pending preview. Used when the session closes.
    pub fn release_all(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.release();
        }
    }
}

impl Drop for ImageReconciler {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Replace each ephemeral entry of `images` by its value in `resolved`,
/// keeping positions.
pub fn substitute(
    images: &[ImageRef],
    resolved: &HashMap<EphemeralRef, String>,
) -> Result<Vec<String>, ResolveError> {
    images
        .iter()
        .map(|image| match image {
            ImageRef::Persisted(url) => Ok(url.clone()),
            ImageRef::Ephemeral(reference) => resolved
                .get(reference)
                .cloned()
                .ok_or_else(|| ResolveError::UnknownPreview(reference.clone())),
        })
        .collect()
}
