use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{RenderError, Result};
use crate::media::{AudioSegment, MediaProbe, MediaWriter};
use crate::model::ItemKind;
use crate::render::compositor::FrameCompositor;

/// Cooperative cancellation flag threaded through the parallel frame loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Progress report delivered after each composed frame.
#[derive(Debug, Clone, Copy)]
pub struct ExportProgress {
    pub processed: usize,
    pub total: usize,
}

impl ExportProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }
}

/// Summary of a finished export.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub path: PathBuf,
    pub frame_count: usize,
    pub duration: f64,
    pub file_size: u64,
}

/// Per-frame parallel renderer feeding the encode collaborator.
///
/// Frames are composed data-parallel from the compositor's snapshot. No
/// ordering exists between workers; the `(index, bytes)` results are sorted
/// once at the end. Audio is assembled separately and muxed last.
pub struct ExportPipeline {
    compositor: FrameCompositor,
    writer: Arc<dyn MediaWriter>,
    probe: Arc<dyn MediaProbe>,
    config: Config,
}

impl ExportPipeline {
    pub fn new(
        compositor: FrameCompositor,
        writer: Arc<dyn MediaWriter>,
        probe: Arc<dyn MediaProbe>,
        config: Config,
    ) -> Self {
        Self {
            compositor,
            writer,
            probe,
            config,
        }
    }

    /// Render every frame, encode, assemble audio, and mux the final file.
    pub fn export(
        &self,
        output: &Path,
        progress: &(dyn Fn(ExportProgress) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<ExportReport> {
        let total = self.compositor.snapshot().total_frames() as usize;
        if total == 0 {
            return Err(RenderError::EmptyTimeline.into());
        }

        info!("Exporting {} frames to {}", total, output.display());
        // Unique per invocation so concurrent exports never share staging.
        static EXPORT_SEQ: AtomicU64 = AtomicU64::new(0);
        let staging = std::env::temp_dir().join(format!(
            "versecut_export_{}_{}",
            std::process::id(),
            EXPORT_SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&staging)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.render.worker_threads)
            .build()
            .map_err(|e| RenderError::InvalidParameters {
                details: e.to_string(),
            })?;
        let rendered = pool.install(|| self.render_all(total, progress, cancel));
        let rendered = match rendered {
            Ok(frames) => frames,
            Err(e) => {
                if !self.config.export.keep_temp {
                    let _ = std::fs::remove_dir_all(&staging);
                }
                return Err(e);
            }
        };

        // Stage frames in index order for the encode collaborator.
        let mut frame_paths = Vec::with_capacity(rendered.len());
        for (index, bytes) in &rendered {
            let path = staging.join(format!("frame_{index:06}.png"));
            std::fs::write(&path, bytes)?;
            frame_paths.push(path);
        }

        let fps = self.compositor.snapshot().fps;
        let video_only = staging.join("video_only.mp4");
        self.writer.encode_frames(&frame_paths, fps, &video_only)?;

        match self.assemble_audio(&staging)? {
            Some(audio_path) => self.writer.mux(&video_only, &audio_path, output)?,
            None => {
                // No audio items anywhere: the video-only stream is final.
                std::fs::copy(&video_only, output)?;
            }
        }

        if !self.config.export.keep_temp {
            let _ = std::fs::remove_dir_all(&staging);
        }

        let file_size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        let report = ExportReport {
            path: output.to_path_buf(),
            frame_count: total,
            duration: total as f64 / fps,
            file_size,
        };
        info!(
            "Export complete: {} frames, {:.1}s, {:.1} MB",
            report.frame_count,
            report.duration,
            report.file_size as f64 / 1024.0 / 1024.0
        );
        Ok(report)
    }

    /// Compose a single frame for interactive preview.
    pub fn preview(&self, frame_index: u64) -> Result<crate::render::Frame> {
        self.compositor.compose(frame_index)
    }

    /// Data-parallel frame rendering. Workers push unordered results; the
    /// collected vector is sorted by frame index afterwards; that sort is
    /// the only ordering guarantee in the pipeline.
    fn render_all(
        &self,
        total: usize,
        progress: &(dyn Fn(ExportProgress) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<Vec<(u64, Vec<u8>)>> {
        let processed = AtomicUsize::new(0);

        let mut rendered: Vec<(u64, Vec<u8>)> = (0..total as u64)
            .into_par_iter()
            .map(|index| -> Result<(u64, Vec<u8>)> {
                if cancel.is_cancelled() {
                    return Err(RenderError::Cancelled {
                        completed: processed.load(Ordering::SeqCst),
                    }
                    .into());
                }
                let bytes = self.compositor.compose_encoded(index)?;
                let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                progress(ExportProgress {
                    processed: done,
                    total,
                });
                Ok((index, bytes))
            })
            .collect::<Result<Vec<_>>>()?;

        rendered.sort_by_key(|&(index, _)| index);
        debug!("Rendered {} frames", rendered.len());
        Ok(rendered)
    }

    /// Pull each audio item's `[start, end)` window, pad position gaps with
    /// silence, and write the concatenated stream as one WAV.
    fn assemble_audio(&self, staging: &Path) -> Result<Option<PathBuf>> {
        let snapshot = self.compositor.snapshot();
        let fps = snapshot.fps;

        // All audio items across audio tracks, in timeline order.
        let mut windows: Vec<(f64, &crate::model::TrackItem)> = snapshot
            .tracks
            .iter()
            .filter(|t| t.kind == crate::model::TrackKind::Audio)
            .flat_map(|t| t.items())
            .filter(|i| i.kind() == ItemKind::Audio)
            .map(|i| (i.position().total_frames() / fps, i))
            .collect();
        windows.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        if windows.is_empty() {
            return Ok(None);
        }

        let mut segments: Vec<(f64, AudioSegment)> = Vec::new();
        for (position_sec, item) in windows {
            let Some(clip) = snapshot.clip(item.clip_id) else {
                warn!("Audio item {} references unknown clip", item.id);
                continue;
            };
            let start_sec = item.start().total_frames() / fps;
            let end_sec = item.end().total_frames() / fps;
            match self.probe.audio_window(&clip.path, start_sec, end_sec) {
                Ok(segment) => segments.push((position_sec, segment)),
                Err(e) => warn!("Audio window for item {} failed: {}", item.id, e),
            }
        }
        let Some(first) = segments.first() else {
            return Ok(None);
        };

        let spec = hound::WavSpec {
            channels: first.1.channels,
            sample_rate: first.1.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let audio_path = staging.join("audio_track.wav");
        let mut wav = hound::WavWriter::create(&audio_path, spec).map_err(|e| {
            RenderError::EncodingFailed {
                reason: format!("WAV create failed: {e}"),
            }
        })?;

        let mut cursor_sec = 0.0;
        for (position_sec, segment) in &segments {
            let gap = position_sec - cursor_sec;
            if gap > 0.0 {
                for sample in segment.silence_like(gap).samples {
                    wav.write_sample(sample).map_err(|e| RenderError::EncodingFailed {
                        reason: format!("WAV write failed: {e}"),
                    })?;
                }
            }
            for &sample in &segment.samples {
                wav.write_sample(sample).map_err(|e| RenderError::EncodingFailed {
                    reason: format!("WAV write failed: {e}"),
                })?;
            }
            let seconds =
                segment.samples.len() as f64 / (segment.sample_rate as f64 * segment.channels as f64);
            cursor_sec = position_sec + seconds;
        }
        wav.finalize().map_err(|e| RenderError::EncodingFailed {
            reason: format!("WAV finalize failed: {e}"),
        })?;

        debug!("Assembled audio stream: {}", audio_path.display());
        Ok(Some(audio_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EditorError, MediaError};
    use crate::media::{ClipMetadata, OverlayRequest, RenderedOverlay, TextRenderer};
    use crate::model::{
        ClipKind, ProjectClip, ScriptRenderSettings, SourceLength, TimelineTrack, TrackItem,
        TrackKind,
    };
    use crate::render::compositor::RenderSnapshot;
    use crate::render::Frame;
    use crate::timecode::TimeCode;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use uuid::Uuid;

    const FPS: f64 = 25.0;

    fn tc(frames: f64) -> TimeCode {
        TimeCode::new(frames, FPS)
    }

    struct NoTextRenderer;

    impl TextRenderer for NoTextRenderer {
        fn render(
            &self,
            requests: &[OverlayRequest],
            _settings: &ScriptRenderSettings,
        ) -> Result<Vec<RenderedOverlay>> {
            Ok(requests
                .iter()
                .map(|r| RenderedOverlay {
                    item_id: r.item_id,
                    width: 4,
                    height: 4,
                    png_bytes: Vec::new(),
                })
                .collect())
        }
    }

    /// Encode collaborator double: records staged frames, fabricates output.
    #[derive(Default)]
    struct RecordingWriter {
        encoded: Mutex<Vec<PathBuf>>,
        muxed: Mutex<Option<usize>>,
    }

    impl MediaWriter for RecordingWriter {
        fn encode_frames(&self, frame_paths: &[PathBuf], _fps: f64, output: &Path) -> Result<()> {
            *self.encoded.lock().unwrap() = frame_paths.to_vec();
            std::fs::write(output, b"video")?;
            Ok(())
        }

        fn mux(&self, _video: &Path, audio: &Path, output: &Path) -> Result<()> {
            // Count the assembled samples before staging is cleaned up.
            let reader = hound::WavReader::open(audio).unwrap();
            *self.muxed.lock().unwrap() = Some(reader.len() as usize);
            std::fs::write(output, b"muxed")?;
            Ok(())
        }
    }

    /// Decode collaborator double: one second of stereo silence per window.
    struct SilenceProbe;

    impl MediaProbe for SilenceProbe {
        fn probe(&self, path: &Path) -> Result<ClipMetadata> {
            Err(MediaError::LoadFailed {
                path: path.display().to_string(),
            }
            .into())
        }

        fn populate_cache(&self, _clip: &ProjectClip) -> Result<usize> {
            Ok(0)
        }

        fn thumbnail(&self, _path: &Path) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn audio_window(&self, _path: &Path, start_sec: f64, end_sec: f64) -> Result<AudioSegment> {
            let sample_rate = 8000u32;
            let frames = ((end_sec - start_sec) * sample_rate as f64) as usize;
            Ok(AudioSegment {
                sample_rate,
                channels: 2,
                samples: vec![0; frames * 2],
            })
        }
    }

    fn visual_snapshot(total_frames: f64) -> RenderSnapshot {
        let clip = ProjectClip::new(
            "/media/a.mp4",
            tc(1000.0),
            FPS,
            4,
            4,
            ClipKind::VideoOrImage,
            false,
        );
        for i in 0..total_frames as u64 {
            clip.cache_frame(
                i,
                Frame::new_filled(4, 4, [0, 200, 0, 255])
                    .to_png_bytes()
                    .unwrap(),
            );
        }
        let mut track = TimelineTrack::new(TrackKind::Video);
        track
            .add_item(TrackItem::visual(
                clip.id,
                tc(0.0),
                tc(0.0),
                tc(total_frames),
                SourceLength::Bounded(tc(1000.0)),
            ))
            .unwrap();
        RenderSnapshot {
            fps: FPS,
            canvas: (4, 4),
            tracks: vec![track],
            clips: HashMap::from([(clip.id, clip)]),
            settings: ScriptRenderSettings::default(),
        }
    }

    fn pipeline_for(snapshot: RenderSnapshot) -> (ExportPipeline, Arc<RecordingWriter>) {
        let writer = Arc::new(RecordingWriter::default());
        let config = Config::default();
        let compositor = FrameCompositor::new(
            Arc::new(snapshot),
            Arc::new(NoTextRenderer),
            &config.render,
        );
        (
            ExportPipeline::new(compositor, writer.clone(), Arc::new(SilenceProbe), config),
            writer,
        )
    }

    #[test]
    fn export_stages_every_frame_in_index_order() {
        let (pipeline, writer) = pipeline_for(visual_snapshot(6.0));
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("final.mp4");

        let report = pipeline.export(&out, &|_| {}, &CancelToken::new()).unwrap();

        assert_eq!(report.frame_count, 6);
        assert!((report.duration - 6.0 / FPS).abs() < 1e-9);
        assert!(out.exists());

        let staged = writer.encoded.lock().unwrap().clone();
        assert_eq!(staged.len(), 6);
        let mut sorted = staged.clone();
        sorted.sort();
        assert_eq!(staged, sorted);
    }

    #[test]
    fn progress_reaches_one_hundred_percent() {
        let (pipeline, _writer) = pipeline_for(visual_snapshot(5.0));
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("final.mp4");

        let seen = Mutex::new(Vec::new());
        pipeline
            .export(&out, &|p| seen.lock().unwrap().push(p), &CancelToken::new())
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 5);
        let last = seen.iter().max_by_key(|p| p.processed).unwrap();
        assert_eq!(last.processed, 5);
        assert_eq!(last.percent(), 100.0);
    }

    #[test]
    fn cancelled_export_reports_cancelled() {
        let (pipeline, _writer) = pipeline_for(visual_snapshot(20.0));
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("final.mp4");

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = pipeline.export(&out, &|_| {}, &cancel).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Render(RenderError::Cancelled { .. })
        ));
        assert!(!out.exists());
    }

    #[test]
    fn empty_timeline_refuses_export() {
        let snapshot = RenderSnapshot {
            fps: FPS,
            canvas: (4, 4),
            tracks: vec![TimelineTrack::new(TrackKind::Video)],
            clips: HashMap::new(),
            settings: ScriptRenderSettings::default(),
        };
        let (pipeline, _writer) = pipeline_for(snapshot);
        let err = pipeline
            .export(Path::new("/tmp/none.mp4"), &|_| {}, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            EditorError::Render(RenderError::EmptyTimeline)
        ));
    }

    #[test]
    fn audio_items_are_windowed_padded_and_muxed() {
        let mut snapshot = visual_snapshot(50.0);

        let audio_clip = ProjectClip::new(
            "/media/song.wav",
            tc(1000.0),
            FPS,
            0,
            0,
            ClipKind::Audio,
            false,
        );
        let mut audio_track = TimelineTrack::new(TrackKind::Audio);
        // One second in (25 frames), playing source window 0..25 frames (1s).
        audio_track
            .add_item(TrackItem::audio(
                audio_clip.id,
                tc(25.0),
                tc(0.0),
                tc(25.0),
                tc(1000.0),
            ))
            .unwrap();
        snapshot.clips.insert(audio_clip.id, audio_clip);
        snapshot.tracks.push(audio_track);

        let (pipeline, writer) = pipeline_for(snapshot);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("final.mp4");
        pipeline.export(&out, &|_| {}, &CancelToken::new()).unwrap();

        // 1 s leading silence + 1 s window, stereo at 8 kHz.
        let samples = writer.muxed.lock().unwrap().expect("mux not called");
        assert_eq!(samples, 2 * 8000 * 2);
        assert_eq!(std::fs::read(&out).unwrap(), b"muxed");
    }
}
