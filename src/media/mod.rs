//! # External Media Collaborators
//!
//! The engine consumes three collaborators behind traits: a text renderer
//! that turns verse payloads into overlay bitmaps, a decode/probe side that
//! classifies sources and fills frame caches, and an encode side that turns
//! frame sequences into containers. The compositing core never touches a
//! codec directly.

pub mod probe;
pub mod text;
pub mod writer;

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;
use crate::model::{ClipKind, ProjectClip, ScriptRenderSettings, VerseBlock};

pub use probe::FfmpegProbe;
pub use text::BlankTextRenderer;
pub use writer::FfmpegWriter;

/// Probed source metadata.
#[derive(Debug, Clone)]
pub struct ClipMetadata {
    pub kind: ClipKind,
    pub frame_count: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub unlimited_length: bool,
}

/// One overlay to render: which item asked, and its verse payload.
#[derive(Debug, Clone)]
pub struct OverlayRequest {
    pub item_id: Uuid,
    pub verse: VerseBlock,
}

/// A rendered overlay bitmap, PNG-encoded.
#[derive(Debug, Clone)]
pub struct RenderedOverlay {
    pub item_id: Uuid,
    pub width: u32,
    pub height: u32,
    pub png_bytes: Vec<u8>,
}

/// Interleaved PCM pulled from one audio trim window.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioSegment {
    /// Silence of the given duration at this segment's format.
    pub fn silence_like(&self, seconds: f64) -> AudioSegment {
        let frames = (seconds * self.sample_rate as f64) as usize;
        AudioSegment {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples: vec![0; frames * self.channels as usize],
        }
    }
}

/// Text-layout/shaping collaborator: verse payloads in, bitmaps out.
/// Results are keyed back to the requesting item by id.
pub trait TextRenderer: Send + Sync {
    fn render(
        &self,
        requests: &[OverlayRequest],
        settings: &ScriptRenderSettings,
    ) -> Result<Vec<RenderedOverlay>>;
}

/// Decode collaborator: classify sources, fill frame caches, pull audio.
pub trait MediaProbe: Send + Sync {
    /// Probe a file for track-type classification and timing metadata.
    fn probe(&self, path: &Path) -> Result<ClipMetadata>;

    /// Fill the clip's frame cache: every frame for video, a single frame
    /// for images. Returns the number of frames cached.
    fn populate_cache(&self, clip: &ProjectClip) -> Result<usize>;

    /// Small preview image, PNG-encoded.
    fn thumbnail(&self, path: &Path) -> Result<Vec<u8>>;

    /// Decoded PCM for one `[start, end)` window, in seconds.
    fn audio_window(&self, path: &Path, start_sec: f64, end_sec: f64) -> Result<AudioSegment>;
}

/// Encode collaborator: frame sequences and A/V muxing.
pub trait MediaWriter: Send + Sync {
    /// Encode an ordered list of staged frame images into a video-only file.
    fn encode_frames(&self, frame_paths: &[PathBuf], fps: f64, output: &Path) -> Result<()>;

    /// Remux a video-only file with an audio-only file into the final
    /// container, replacing any audio the video file carried.
    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()>;
}
