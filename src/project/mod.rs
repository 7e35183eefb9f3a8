//! # Project Aggregate
//!
//! The aggregate root: tracks, source clips, render settings, the needle,
//! and the undo engine. Every structural mutation goes through the methods
//! here so the matching [`UndoUnit`] is recorded at commit time, and export
//! renders from a value snapshot rather than live state.

pub mod persist;
pub mod playback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, TimelineError};
use crate::media::{MediaProbe, MediaWriter, TextRenderer};
use crate::model::{
    ClipKind, ProjectClip, ScriptRenderSettings, TimelineTrack, TrackItem, TrackKind,
};
use crate::render::{
    CancelToken, ExportPipeline, ExportProgress, ExportReport, Frame, FrameCompositor,
    RenderSnapshot,
};
use crate::timecode::TimeCode;
use crate::undo::{UndoEngine, UndoUnit};

pub use persist::{open_project, save_project};
pub use playback::PlaybackClock;

/// Output container for exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Mp4,
    Mkv,
}

impl ExportFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "Mp4",
            ExportFormat::Mkv => "Mkv",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Mkv => "mkv",
        }
    }
}

/// A complete editing session: the only entity with global lifecycle.
#[derive(Debug)]
pub struct Project {
    pub id: Uuid,
    pub fps: f64,
    tracks: Vec<TimelineTrack>,
    clips: Vec<ProjectClip>,
    pub settings: ScriptRenderSettings,
    needle: TimeCode,
    pub export_directory: PathBuf,
    pub export_format: ExportFormat,
    pub created_at: String,
    pub modified_at: String,
    undo: UndoEngine,
}

impl Project {
    pub fn new(fps: f64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4(),
            fps,
            tracks: Vec::new(),
            clips: Vec::new(),
            settings: ScriptRenderSettings::default(),
            needle: TimeCode::zero(fps),
            export_directory: PathBuf::from("."),
            export_format: ExportFormat::Mp4,
            created_at: now.clone(),
            modified_at: now,
            undo: UndoEngine::new(),
        }
    }

    fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }

    // ==========================================
    // QUERIES
    // ==========================================

    pub fn tracks(&self) -> &[TimelineTrack] {
        &self.tracks
    }

    pub fn clips(&self) -> &[ProjectClip] {
        &self.clips
    }

    pub fn track(&self, id: Uuid) -> Option<&TimelineTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn clip(&self, id: Uuid) -> Option<&ProjectClip> {
        self.clips.iter().find(|c| c.id == id)
    }

    /// The track currently holding an item, with the item itself.
    pub fn find_item(&self, item_id: Uuid) -> Option<(&TimelineTrack, &TrackItem)> {
        self.tracks
            .iter()
            .find_map(|t| t.item(item_id).map(|i| (t, i)))
    }

    fn track_index_of_item(&self, item_id: Uuid) -> Result<usize> {
        self.tracks
            .iter()
            .position(|t| t.item(item_id).is_some())
            .ok_or_else(|| {
                TimelineError::ItemNotFound {
                    id: item_id.to_string(),
                }
                .into()
            })
    }

    fn require_track(&mut self, track_id: Uuid) -> Result<&mut TimelineTrack> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == track_id)
            .ok_or_else(|| {
                TimelineError::TrackNotFound {
                    id: track_id.to_string(),
                }
                .into()
            })
    }

    /// Rightmost edge over all tracks, in frames.
    pub fn total_frames(&self) -> f64 {
        self.tracks.iter().map(|t| t.end_frame()).fold(0.0, f64::max)
    }

    pub fn needle(&self) -> TimeCode {
        self.needle
    }

    pub fn set_needle(&mut self, needle: TimeCode) {
        let frames = needle.total_frames().clamp(0.0, self.total_frames());
        self.needle = TimeCode::new(frames, self.fps);
    }

    /// One playback tick: advance the needle a single frame.
    pub fn advance_needle(&mut self) -> TimeCode {
        self.set_needle(self.needle.offset_frames(1.0));
        self.needle
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    // ==========================================
    // TRACK / CLIP STRUCTURE
    // ==========================================

    pub fn add_track(&mut self, kind: TrackKind) -> Uuid {
        let track = TimelineTrack::new(kind);
        let id = track.id;
        self.undo.record(UndoUnit::TrackAdd {
            track: track.clone(),
        });
        self.tracks.push(track);
        self.touch();
        id
    }

    pub fn remove_track(&mut self, track_id: Uuid) -> Result<()> {
        let index = self
            .tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or_else(|| TimelineError::TrackNotFound {
                id: track_id.to_string(),
            })?;
        let track = self.tracks.remove(index);
        self.undo.record(UndoUnit::TrackRemove { track, index });
        self.touch();
        Ok(())
    }

    /// Probe and register a media file. Thumbnail generation is
    /// best-effort; a probe failure is the only hard error.
    pub fn import_clip(&mut self, path: &Path, probe: &dyn MediaProbe) -> Result<Uuid> {
        let metadata = probe.probe(path)?;
        let mut clip = ProjectClip::new(
            path,
            TimeCode::new(metadata.frame_count, metadata.fps),
            metadata.fps,
            metadata.width,
            metadata.height,
            metadata.kind,
            metadata.unlimited_length,
        );
        match probe.thumbnail(path) {
            Ok(bytes) => clip.thumbnail = Some(Arc::new(bytes)),
            Err(e) => warn!("Thumbnail for {} failed: {}", path.display(), e),
        }
        info!(
            "Imported clip {} ({}, {:.0} frames)",
            path.display(),
            clip.kind.name(),
            clip.length.total_frames()
        );
        Ok(self.register_clip(clip))
    }

    /// Register a pre-built clip (script pseudo-sources have no media file).
    pub fn register_clip(&mut self, clip: ProjectClip) -> Uuid {
        let id = clip.id;
        self.undo.record(UndoUnit::ClipAdd { clip: clip.clone() });
        self.clips.push(clip);
        self.touch();
        id
    }

    /// Remove a clip and every item that references it, as one atomic unit.
    pub fn remove_clip(&mut self, clip_id: Uuid) -> Result<()> {
        let index = self
            .clips
            .iter()
            .position(|c| c.id == clip_id)
            .ok_or_else(|| TimelineError::ClipNotFound {
                id: clip_id.to_string(),
            })?;

        let mut units = Vec::new();
        for track in &mut self.tracks {
            let orphaned: Vec<Uuid> = track
                .items()
                .iter()
                .filter(|i| i.clip_id == clip_id)
                .map(|i| i.id)
                .collect();
            for item_id in orphaned {
                if let Some(item) = track.remove_item(item_id) {
                    units.push(UndoUnit::ItemRemove {
                        track_id: track.id,
                        item,
                    });
                }
            }
        }
        let clip = self.clips.remove(index);
        units.push(UndoUnit::ClipRemove { clip });
        self.undo.record(UndoUnit::Composite(units));
        self.touch();
        Ok(())
    }

    // ==========================================
    // ITEM MUTATIONS
    // ==========================================

    pub fn add_item(&mut self, track_id: Uuid, item: TrackItem) -> Result<Uuid> {
        let item_id = item.id;
        let track = self.require_track(track_id)?;
        track.add_item(item.clone())?;
        self.undo.record(UndoUnit::ItemAdd { track_id, item });
        self.touch();
        Ok(item_id)
    }

    /// Batched add: the whole group undoes atomically.
    pub fn add_items(&mut self, track_id: Uuid, items: Vec<TrackItem>) -> Result<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(items.len());
        let mut units = Vec::with_capacity(items.len());
        {
            let track = self.require_track(track_id)?;
            for item in items {
                ids.push(item.id);
                track.add_item(item.clone())?;
                units.push(UndoUnit::ItemAdd { track_id, item });
            }
        }
        self.undo.record(UndoUnit::Composite(units));
        self.touch();
        Ok(ids)
    }

    pub fn remove_item(&mut self, item_id: Uuid) -> Result<()> {
        let index = self.track_index_of_item(item_id)?;
        let track_id = self.tracks[index].id;
        let item = self.tracks[index]
            .remove_item(item_id)
            .expect("position checked above");
        self.undo.record(UndoUnit::ItemRemove { track_id, item });
        self.touch();
        Ok(())
    }

    pub fn remove_items(&mut self, item_ids: &[Uuid]) -> Result<()> {
        let mut units = Vec::with_capacity(item_ids.len());
        for &item_id in item_ids {
            let index = self.track_index_of_item(item_id)?;
            let track_id = self.tracks[index].id;
            if let Some(item) = self.tracks[index].remove_item(item_id) {
                units.push(UndoUnit::ItemRemove { track_id, item });
            }
        }
        self.undo.record(UndoUnit::Composite(units));
        self.touch();
        Ok(())
    }

    /// Split an item at an absolute timeline frame. Returns the id of the
    /// right fragment.
    pub fn cut_item(&mut self, item_id: Uuid, timeline_frame: f64) -> Result<Uuid> {
        let index = self.track_index_of_item(item_id)?;
        let track_id = self.tracks[index].id;
        let outcome = self.tracks[index].cut(item_id, timeline_frame)?;
        let right_id = outcome.right.id;
        self.undo.record(UndoUnit::Composite(vec![
            UndoUnit::ItemResize {
                track_id,
                item_id: outcome.left_id,
                before: outcome.left_before,
                after: outcome.left_after,
            },
            UndoUnit::ItemAdd {
                track_id,
                item: outcome.right,
            },
        ]));
        self.touch();
        Ok(right_id)
    }

    /// Left-border drag by a signed frame delta.
    pub fn resize_item_left(&mut self, item_id: Uuid, delta_frames: f64) -> Result<()> {
        let index = self.track_index_of_item(item_id)?;
        let track_id = self.tracks[index].id;
        let delta = self.tracks[index].resize_left(item_id, delta_frames)?;
        self.undo.record(UndoUnit::ItemResize {
            track_id,
            item_id,
            before: delta.before,
            after: delta.after,
        });
        self.touch();
        Ok(())
    }

    /// Right-border drag by a signed frame delta.
    pub fn resize_item_right(&mut self, item_id: Uuid, delta_frames: f64) -> Result<()> {
        let index = self.track_index_of_item(item_id)?;
        let track_id = self.tracks[index].id;
        let delta = self.tracks[index].resize_right(item_id, delta_frames)?;
        self.undo.record(UndoUnit::ItemResize {
            track_id,
            item_id,
            before: delta.before,
            after: delta.after,
        });
        self.touch();
        Ok(())
    }

    /// Set fade envelopes. Values clamp silently; recorded as a resize.
    pub fn set_item_fades(&mut self, item_id: Uuid, fade_in: f64, fade_out: f64) -> Result<()> {
        let index = self.track_index_of_item(item_id)?;
        let track_id = self.tracks[index].id;
        let item = self.tracks[index]
            .item_mut(item_id)
            .expect("position checked above");
        let before = item.geometry();
        item.set_fade_in_frames(fade_in);
        item.set_fade_out_frames(fade_out);
        let after = item.geometry();
        self.undo.record(UndoUnit::ItemResize {
            track_id,
            item_id,
            before,
            after,
        });
        self.touch();
        Ok(())
    }

    /// Script ripple: move a verse's right edge and its successor's left
    /// edge together.
    pub fn resize_script_neighbor(&mut self, item_id: Uuid, delta_frames: f64) -> Result<()> {
        let index = self.track_index_of_item(item_id)?;
        let track_id = self.tracks[index].id;
        let deltas = self.tracks[index].resize_script_neighbor(item_id, delta_frames)?;
        self.undo.record(UndoUnit::Composite(
            deltas
                .into_iter()
                .map(|d| UndoUnit::ItemResize {
                    track_id,
                    item_id: d.item_id,
                    before: d.before,
                    after: d.after,
                })
                .collect(),
        ));
        self.touch();
        Ok(())
    }

    /// Move an item, within its track or onto another compatible track,
    /// resolving collisions direction-aware on the destination.
    pub fn move_item(
        &mut self,
        item_id: Uuid,
        dest_track_id: Uuid,
        desired_start: f64,
    ) -> Result<()> {
        let source_index = self.track_index_of_item(item_id)?;
        let source_track_id = self.tracks[source_index].id;

        if source_track_id == dest_track_id {
            let delta = self.tracks[source_index].move_item(item_id, desired_start)?;
            self.undo.record(UndoUnit::ItemResize {
                track_id: source_track_id,
                item_id,
                before: delta.before,
                after: delta.after,
            });
            self.touch();
            return Ok(());
        }

        // Cross-track drop: gated by destination kind before anything moves.
        let dest_index = self
            .tracks
            .iter()
            .position(|t| t.id == dest_track_id)
            .ok_or_else(|| TimelineError::TrackNotFound {
                id: dest_track_id.to_string(),
            })?;
        let item_kind = self.tracks[source_index]
            .item(item_id)
            .expect("position checked above")
            .kind();
        if !self.tracks[dest_index].kind.accepts(item_kind) {
            return Err(TimelineError::IncompatibleKind {
                track_kind: self.tracks[dest_index].kind.name().to_string(),
            }
            .into());
        }

        let mut item = self.tracks[source_index]
            .remove_item(item_id)
            .expect("position checked above");
        let removed = UndoUnit::ItemRemove {
            track_id: source_track_id,
            item: item.clone(),
        };

        let duration = item.duration().total_frames();
        let moving_forward = desired_start > item.position().total_frames();
        let resolved =
            self.tracks[dest_index].resolved_start(None, desired_start, duration, moving_forward);
        item.set_position(TimeCode::new(resolved, self.fps));

        let added = UndoUnit::ItemAdd {
            track_id: dest_track_id,
            item: item.clone(),
        };
        self.tracks[dest_index].add_item(item)?;
        self.undo.record(UndoUnit::Composite(vec![removed, added]));
        self.touch();
        debug!(
            "Moved item {} to track {} at frame {}",
            item_id, dest_track_id, resolved
        );
        Ok(())
    }

    // ==========================================
    // UNDO / REDO
    // ==========================================

    pub fn undo(&mut self) -> bool {
        let changed = self.undo.undo(&mut self.tracks, &mut self.clips);
        if changed {
            self.touch();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.undo.redo(&mut self.tracks, &mut self.clips);
        if changed {
            self.touch();
        }
        changed
    }

    // ==========================================
    // RENDERING
    // ==========================================

    /// Value snapshot for rendering: workers never see later edits.
    pub fn snapshot(&self, canvas: (u32, u32)) -> RenderSnapshot {
        RenderSnapshot {
            fps: self.fps,
            canvas,
            tracks: self.tracks.clone(),
            clips: self.clips.iter().map(|c| (c.id, c.clone())).collect(),
            settings: self.settings.clone(),
        }
    }

    /// Compose a single frame for preview at the given index.
    pub fn preview_frame(
        &self,
        frame_index: u64,
        config: &Config,
        text_renderer: Arc<dyn TextRenderer>,
    ) -> Result<Frame> {
        let compositor = FrameCompositor::new(
            Arc::new(self.snapshot(config.render.canvas)),
            text_renderer,
            &config.render,
        );
        compositor.compose(frame_index)
    }

    /// Fill visual frame caches that are still cold. Idempotent.
    pub fn warm_caches(&self, probe: &dyn MediaProbe) {
        for clip in &self.clips {
            if clip.kind == ClipKind::VideoOrImage && clip.cached_frame_count() == 0 {
                match probe.populate_cache(clip) {
                    Ok(count) => debug!("Warmed {} frames for clip {}", count, clip.id),
                    Err(e) => warn!("Cache warm for {} failed: {}", clip.path.display(), e),
                }
            }
        }
    }

    /// Full export: warm caches, snapshot, render in parallel, encode, mux.
    #[allow(clippy::too_many_arguments)]
    pub async fn export_to(
        &self,
        output: PathBuf,
        config: Config,
        text_renderer: Arc<dyn TextRenderer>,
        writer: Arc<dyn MediaWriter>,
        probe: Arc<dyn MediaProbe>,
        progress: Arc<dyn Fn(ExportProgress) + Send + Sync>,
        cancel: CancelToken,
    ) -> Result<ExportReport> {
        info!("Starting export of project {}", self.id);
        self.warm_caches(probe.as_ref());

        let snapshot = Arc::new(self.snapshot(config.render.canvas));
        let handle = tokio::task::spawn_blocking(move || {
            let compositor = FrameCompositor::new(snapshot, text_renderer, &config.render);
            let pipeline = ExportPipeline::new(compositor, writer, probe, config);
            pipeline.export(&output, &move |p| progress(p), &cancel)
        });
        handle
            .await
            .map_err(|e| crate::error::EditorError::generic(format!("export task failed: {e}")))?
    }
}
