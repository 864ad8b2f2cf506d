//! Revocable handles over finished artifacts.
//!
//! A handle is a cheap token (`artifact:<id>`) that resolves to the artifact
//! bytes until it is released. Release is explicit and idempotent; once
//! released, a handle resolves to nothing even if clones of it are still
//! around.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::{RawArtifact, DEFAULT_AUDIO_CONTENT_TYPE};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactHandle {
    id: u64,
    uri: String,
}

impl ArtifactHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[derive(Debug)]
struct StoredArtifact {
    bytes: Arc<[u8]>,
    content_type: String,
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: AtomicU64,
    live: DashMap<u64, StoredArtifact>,
}

/// Owns artifact bytes on behalf of the handles it hands out. Clones share
/// the same storage.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    inner: Arc<StoreInner>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, artifact: RawArtifact) -> ArtifactHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let content_type = artifact
            .content_type
            .unwrap_or_else(|| DEFAULT_AUDIO_CONTENT_TYPE.to_string());
        self.inner.live.insert(
            id,
            StoredArtifact {
                bytes: artifact.bytes.into(),
                content_type,
            },
        );
        ArtifactHandle {
            id,
            uri: format!("artifact:{id}"),
        }
    }

    pub fn resolve(&self, handle: &ArtifactHandle) -> Option<Arc<[u8]>> {
        self.inner
            .live
            .get(&handle.id)
            .map(|stored| Arc::clone(&stored.bytes))
    }

    pub fn content_type(&self, handle: &ArtifactHandle) -> Option<String> {
        self.inner
            .live
            .get(&handle.id)
            .map(|stored| stored.content_type.clone())
    }

    /// Returns `false` if the handle was already released.
    pub fn release(&self, handle: &ArtifactHandle) -> bool {
        self.inner.live.remove(&handle.id).is_some()
    }

    pub fn is_live(&self, handle: &ArtifactHandle) -> bool {
        self.inner.live.contains_key(&handle.id)
    }

    pub fn live_count(&self) -> usize {
        self.inner.live.len()
    }
}
