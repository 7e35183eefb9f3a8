use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::RenderConfig;
use crate::error::Result;
use crate::media::{OverlayRequest, TextRenderer};
use crate::model::{
    ItemKind, ProjectClip, ScriptRenderSettings, TimelineTrack, TrackItem, TrackKind,
};
use crate::render::Frame;

/// Immutable copy of everything a render needs, taken when the render
/// starts. Structural edits made while an export runs affect later renders
/// only, and workers never observe a half-mutated timeline.
#[derive(Debug, Clone)]
pub struct RenderSnapshot {
    pub fps: f64,
    pub canvas: (u32, u32),
    pub tracks: Vec<TimelineTrack>,
    pub clips: HashMap<Uuid, ProjectClip>,
    pub settings: ScriptRenderSettings,
}

impl RenderSnapshot {
    /// Number of output frames: the rightmost edge across all tracks.
    pub fn total_frames(&self) -> u64 {
        self.tracks
            .iter()
            .map(|t| t.end_frame())
            .fold(0.0, f64::max)
            .ceil() as u64
    }

    pub fn clip(&self, id: Uuid) -> Option<&ProjectClip> {
        self.clips.get(&id)
    }
}

/// Per-frame layered compositor.
///
/// Thread-safe: export workers call [`FrameCompositor::compose`] for
/// independent frame indices against the shared snapshot. The rendered
/// script-overlay cache is keyed by item id; a racing double render costs a
/// duplicate computation, never a wrong bitmap, since rendering the same
/// verse twice yields the same bytes.
pub struct FrameCompositor {
    snapshot: Arc<RenderSnapshot>,
    text_renderer: Arc<dyn TextRenderer>,
    script_cache: Mutex<HashMap<Uuid, Arc<Frame>>>,
    placeholder_luma: u8,
}

impl FrameCompositor {
    pub fn new(
        snapshot: Arc<RenderSnapshot>,
        text_renderer: Arc<dyn TextRenderer>,
        config: &RenderConfig,
    ) -> Self {
        Self {
            snapshot,
            text_renderer,
            script_cache: Mutex::new(HashMap::new()),
            placeholder_luma: config.placeholder_luma,
        }
    }

    pub fn snapshot(&self) -> &RenderSnapshot {
        &self.snapshot
    }

    /// Visual items active at this frame in render order: tracks by index,
    /// script lanes last so overlays always sit on top.
    fn active_layers(&self, frame_index: u64) -> Vec<&TrackItem> {
        let frame = frame_index as f64;
        let mut layers = Vec::new();
        for track in self
            .snapshot
            .tracks
            .iter()
            .filter(|t| t.kind == TrackKind::Video)
            .chain(
                self.snapshot
                    .tracks
                    .iter()
                    .filter(|t| t.kind == TrackKind::Script),
            )
        {
            for item in track.items_at(frame) {
                let local = item.local_frame(frame);
                if local >= item.start().total_frames() && local <= item.end().total_frames() {
                    layers.push(item);
                }
            }
        }
        layers
    }

    /// Compose one output frame: fetch each active layer's source bytes,
    /// resize to canvas, and blend back-to-front with fade opacity.
    pub fn compose(&self, frame_index: u64) -> Result<Frame> {
        let (width, height) = self.snapshot.canvas;
        let mut canvas = Frame::new_canvas(width, height);

        for item in self.active_layers(frame_index) {
            let local = item.local_frame(frame_index as f64);
            let layer = match item.kind() {
                ItemKind::Script => self.script_overlay(item)?,
                _ => self.clip_frame(item, local),
            };
            let layer = layer.resized(width, height);
            canvas.blend_layer(&layer, item.opacity_at(local));
        }
        Ok(canvas)
    }

    /// Compose and PNG-encode in one step for the export staging path.
    pub fn compose_encoded(&self, frame_index: u64) -> Result<Vec<u8>> {
        self.compose(frame_index)?.to_png_bytes()
    }

    /// Source frame for a visual item from its clip's cache. A still image
    /// repeats its single cached frame; a missing frame composes as a flat
    /// placeholder rather than failing the whole export.
    fn clip_frame(&self, item: &TrackItem, local_frame: f64) -> Frame {
        let (width, height) = self.snapshot.canvas;
        let luma = self.placeholder_luma;
        let placeholder = || Frame::new_filled(width, height, [luma, luma, luma, 255]);

        let Some(clip) = self.snapshot.clip(item.clip_id) else {
            warn!("Item {} references unknown clip {}", item.id, item.clip_id);
            return placeholder();
        };

        let index = if clip.unlimited_length {
            0
        } else {
            local_frame.trunc().max(0.0) as u64
        };
        let encoded = clip
            .cached_frame(index)
            .or_else(|| clip.cached_frame(0).filter(|_| clip.unlimited_length));

        match encoded {
            Some(bytes) => Frame::from_png_bytes(&bytes).unwrap_or_else(|e| {
                warn!("Corrupt cached frame {} of clip {}: {}", index, clip.id, e);
                placeholder()
            }),
            None => {
                debug!("Frame {} of clip {} not cached, using placeholder", index, clip.id);
                placeholder()
            }
        }
    }

    /// Rendered overlay for a script item, computed once per item id and
    /// reused for every frame the item covers. Best-effort: the lock is not
    /// held across the render call, so two workers may both render the
    /// first frame of an item and one write wins.
    fn script_overlay(&self, item: &TrackItem) -> Result<Frame> {
        if let Some(cached) = self
            .script_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&item.id).cloned())
        {
            return Ok((*cached).clone());
        }

        let verse = item
            .verse()
            .cloned()
            .unwrap_or_else(|| crate::model::VerseBlock::new(0, 0, ""));
        let request = OverlayRequest {
            item_id: item.id,
            verse,
        };
        let overlays = self
            .text_renderer
            .render(std::slice::from_ref(&request), &self.snapshot.settings)?;

        let frame = match overlays.into_iter().next() {
            Some(overlay) => Frame::from_png_bytes(&overlay.png_bytes)?,
            None => {
                let (width, height) = self.snapshot.canvas;
                Frame::new_transparent(width, height)
            }
        };

        if let Ok(mut cache) = self.script_cache.lock() {
            cache.insert(item.id, Arc::new(frame.clone()));
        }
        Ok(frame)
    }

    pub fn cached_overlays(&self) -> usize {
        self.script_cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}
