//! In-memory photo metadata for the current run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// A captured photo and its upload status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub uri: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub uploaded: bool,
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl Photo {
    /// A pending photo. A `file://` prefix on `uri` is stripped.
    pub fn new(uri: impl Into<PathBuf>) -> Self {
        let uri = uri.into();
        Self {
            uri: normalize_path(&uri).into_owned(),
            timestamp: Utc::now(),
            uploaded: false,
            uploaded_at: None,
        }
    }
}

/// Strip a `file://` prefix from a photo handle.
pub fn normalize_handle(handle: &str) -> PathBuf {
    PathBuf::from(handle.strip_prefix(FILE_SCHEME).unwrap_or(handle))
}

/// [`normalize_handle`] for a path, borrowing when there is nothing to strip.
pub fn normalize_path(uri: &Path) -> Cow<'_, Path> {
    match uri.to_str().and_then(|s| s.strip_prefix(FILE_SCHEME)) {
        Some(stripped) => Cow::Owned(PathBuf::from(stripped)),
        None => Cow::Borrowed(uri),
    }
}

/// Ordered collection of photos keyed by uri.
#[derive(Debug, Clone, Default)]
pub struct PhotoStore {
    photos: Vec<Photo>,
}

impl PhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a photo. Returns false if its uri is already present.
    pub fn add(&mut self, photo: Photo) -> bool {
        if self.get(&photo.uri).is_some() {
            tracing::debug!(uri = %photo.uri.display(), "photo already tracked");
            return false;
        }
        self.photos.push(photo);
        true
    }

    pub fn add_many(&mut self, photos: impl IntoIterator<Item = Photo>) -> usize {
        photos.into_iter().filter(|p| self.add(p.clone())).count()
    }

    pub fn get(&self, uri: &Path) -> Option<&Photo> {
        let uri = normalize_path(uri);
        self.photos.iter().find(|p| p.uri == *uri)
    }

    pub fn all(&self) -> &[Photo] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn uploaded(&self) -> Vec<&Photo> {
        self.photos.iter().filter(|p| p.uploaded).collect()
    }

    pub fn pending(&self) -> Vec<&Photo> {
        self.photos.iter().filter(|p| !p.uploaded).collect()
    }

    pub fn remove(&mut self, uri: &Path) -> Option<Photo> {
        let uri = normalize_path(uri);
        let idx = self.photos.iter().position(|p| p.uri == *uri)?;
        Some(self.photos.remove(idx))
    }

    /// Mark one photo uploaded. Unknown uris are ignored.
    pub fn mark_uploaded(&mut self, uri: &Path) -> bool {
        let uri = normalize_path(uri);
        match self.photos.iter_mut().find(|p| p.uri == *uri) {
            Some(photo) => {
                photo.uploaded = true;
                photo.uploaded_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub fn mark_many_uploaded<'a>(&mut self, uris: impl IntoIterator<Item = &'a Path>) -> usize {
        uris.into_iter().filter(|uri| self.mark_uploaded(uri)).count()
    }

    pub fn clear(&mut self) {
        self.photos.clear();
    }
}
