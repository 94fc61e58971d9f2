//! Upload coordinator: the single owner of photo upload state.
//!
//! Every submit runs to completion or error and reports back as a plain
//! value. Failures are stored as a readable message in `last_error` and never
//! escape as `Err`. While a submit is running the coordinator is busy; a
//! second submit in that window is rejected without touching the network and
//! without touching `last_error`, which belongs to the running submit.

use crate::client::{FaceBackend, MatchDecision};
use crate::store::{normalize_path, Photo, PhotoStore};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const REGISTRATION_PHOTO_COUNT: usize = 5;
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.2;

#[derive(Debug, Default)]
struct UploadState {
    photos: PhotoStore,
    busy: bool,
    error: Option<String>,
}

pub struct UploadCoordinator<B> {
    backend: B,
    match_threshold: f32,
    state: Mutex<UploadState>,
}

/// Clears the busy flag when the submit finishes or is torn down.
struct BusyGuard<'a> {
    state: &'a Mutex<UploadState>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        lock(self.state).busy = false;
    }
}

fn lock(state: &Mutex<UploadState>) -> MutexGuard<'_, UploadState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B: FaceBackend> UploadCoordinator<B> {
    pub fn new(backend: B, match_threshold: f32) -> Self {
        Self {
            backend,
            match_threshold,
            state: Mutex::new(UploadState::default()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.state).busy
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn photos(&self) -> Vec<Photo> {
        lock(&self.state).photos.all().to_vec()
    }

    pub fn photo(&self, uri: &Path) -> Option<Photo> {
        lock(&self.state).photos.get(uri).cloned()
    }

    pub fn pending_photos(&self) -> Vec<Photo> {
        lock(&self.state).photos.pending().into_iter().cloned().collect()
    }

    pub fn uploaded_photos(&self) -> Vec<Photo> {
        lock(&self.state).photos.uploaded().into_iter().cloned().collect()
    }

    /// Track a freshly captured photo as pending.
    pub fn record_capture(&self, uri: impl Into<PathBuf>) {
        lock(&self.state).photos.add(Photo::new(uri));
    }

    pub fn remove_photo(&self, uri: &Path) -> Option<Photo> {
        lock(&self.state).photos.remove(uri)
    }

    /// Forget all photos and any stored error.
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.photos.clear();
        state.error = None;
    }

    fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "upload rejected");
        lock(&self.state).error = Some(message);
    }

    fn begin(&self) -> Option<BusyGuard<'_>> {
        let mut state = lock(&self.state);
        if state.busy {
            return None;
        }
        state.busy = true;
        state.error = None;
        Some(BusyGuard { state: &self.state })
    }

    /// Upload one captured photo for matching. `None` on any failure, with
    /// the reason available from [`last_error`](Self::last_error).
    pub async fn submit_detection_photo(&self, uri: &Path) -> Option<MatchDecision> {
        if uri.as_os_str().is_empty() {
            self.fail("Photo not found");
            return None;
        }
        let Some(_busy) = self.begin() else {
            tracing::warn!(path = %uri.display(), "detect upload rejected: upload in progress");
            return None;
        };
        let normalized = normalize_path(uri);
        let uri: &Path = &normalized;
        lock(&self.state).photos.add(Photo::new(uri));

        match self.backend.detect_face(uri, self.match_threshold).await {
            Ok(decision) => {
                lock(&self.state).photos.mark_uploaded(uri);
                tracing::info!(
                    path = %uri.display(),
                    label = decision.label(),
                    similarity = decision.similarity(),
                    "detect upload complete"
                );
                Some(decision)
            }
            Err(e) => {
                tracing::error!(path = %uri.display(), error = %e, "detect upload failed");
                lock(&self.state).error = Some(e.to_string());
                None
            }
        }
    }

    /// Upload one photo per face direction and enroll `person_name`.
    /// All photos are marked uploaded on success; none are on failure.
    pub async fn submit_registration_batch(&self, uris: &[PathBuf], person_name: &str) -> bool {
        if uris.is_empty() {
            self.fail("No photos provided");
            return false;
        }
        if uris.len() != REGISTRATION_PHOTO_COUNT {
            self.fail(format!(
                "Please capture all {REGISTRATION_PHOTO_COUNT} photos (got {})",
                uris.len()
            ));
            return false;
        }
        let person_name = person_name.trim();
        if person_name.is_empty() {
            self.fail("Person name is required");
            return false;
        }
        let Some(_busy) = self.begin() else {
            tracing::warn!(person_name, "registration upload rejected: upload in progress");
            return false;
        };
        let uris: Vec<PathBuf> = uris.iter().map(|uri| normalize_path(uri).into_owned()).collect();
        lock(&self.state)
            .photos
            .add_many(uris.iter().map(|uri| Photo::new(uri.clone())));

        match self.backend.register_faces(&uris, person_name).await {
            Ok(()) => {
                lock(&self.state)
                    .photos
                    .mark_many_uploaded(uris.iter().map(PathBuf::as_path));
                tracing::info!(person_name, photos = uris.len(), "registration upload complete");
                true
            }
            Err(e) => {
                tracing::error!(person_name, error = %e, "registration upload failed");
                lock(&self.state).error = Some(e.to_string());
                false
            }
        }
    }
}
