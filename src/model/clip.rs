use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::track::TrackKind;
use crate::timecode::TimeCode;

/// Media classification of an imported source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipKind {
    Script,
    VideoOrImage,
    Audio,
}

impl ClipKind {
    /// Track compatibility predicate: which lane this source may sit on.
    pub fn accepts(&self, track: TrackKind) -> bool {
        matches!(
            (self, track),
            (ClipKind::Script, TrackKind::Script)
                | (ClipKind::VideoOrImage, TrackKind::Video)
                | (ClipKind::Audio, TrackKind::Audio)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClipKind::Script => "Script",
            ClipKind::VideoOrImage => "VideoOrImage",
            ClipKind::Audio => "Audio",
        }
    }
}

/// Lazily populated ordered frame cache: local frame index → encoded PNG
/// bytes. Shared behind a lock so export workers read it concurrently while
/// the decode collaborator fills it. Writes are idempotent (same input,
/// same output), so a racing double-populate is wasted work, not corruption.
pub type FrameCache = Arc<RwLock<BTreeMap<u64, Arc<Vec<u8>>>>>;

/// An imported media source: probed metadata plus the shared frame cache.
///
/// The cache is runtime state and never serialized; reopening a project
/// starts with cold caches that the decode collaborator refills on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectClip {
    pub id: Uuid,
    pub path: PathBuf,
    /// Decoded source length.
    pub length: TimeCode,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub kind: ClipKind,
    /// Still images and script sources have no intrinsic end.
    pub unlimited_length: bool,
    #[serde(skip)]
    pub thumbnail: Option<Arc<Vec<u8>>>,
    #[serde(skip, default = "new_frame_cache")]
    frames: FrameCache,
}

fn new_frame_cache() -> FrameCache {
    Arc::new(RwLock::new(BTreeMap::new()))
}

impl ProjectClip {
    pub fn new(
        path: impl Into<PathBuf>,
        length: TimeCode,
        fps: f64,
        width: u32,
        height: u32,
        kind: ClipKind,
        unlimited_length: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            length,
            fps,
            width,
            height,
            kind,
            unlimited_length,
            thumbnail: None,
            frames: new_frame_cache(),
        }
    }

    /// Encoded bytes for a local frame index, if already decoded.
    pub fn cached_frame(&self, index: u64) -> Option<Arc<Vec<u8>>> {
        self.frames.read().ok()?.get(&index).cloned()
    }

    /// Insert one decoded frame. Last write wins; identical by construction.
    pub fn cache_frame(&self, index: u64, encoded: Vec<u8>) {
        if let Ok(mut frames) = self.frames.write() {
            frames.insert(index, Arc::new(encoded));
        }
    }

    pub fn cached_frame_count(&self) -> usize {
        self.frames.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut frames) = self.frames.write() {
            frames.clear();
        }
    }

    /// Shared handle for bulk population by the decode collaborator.
    pub fn frame_cache(&self) -> FrameCache {
        Arc::clone(&self.frames)
    }
}
