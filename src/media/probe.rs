use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use image::GenericImageView;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{MediaError, Result};
use crate::media::{AudioSegment, ClipMetadata, MediaProbe};
use crate::model::{ClipKind, ProjectClip};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "m4v", "flv"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "aac", "ogg", "m4a"];

/// Collision-free scratch path for one extraction.
fn scratch_path(prefix: &str, extension: &str) -> PathBuf {
    static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);
    std::env::temp_dir().join(format!(
        "{prefix}_{}_{}.{extension}",
        std::process::id(),
        SCRATCH_SEQ.fetch_add(1, Ordering::SeqCst)
    ))
}

/// Decode collaborator backed by external `ffmpeg`/`ffprobe` commands.
pub struct FfmpegProbe;

#[derive(Deserialize)]
struct ProbeDocument {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    avg_frame_rate: Option<String>,
}

impl FfmpegProbe {
    pub fn new() -> Result<Self> {
        let available = Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if available {
            info!("Initialized media probe with external FFmpeg");
            Ok(Self)
        } else {
            Err(MediaError::LoadFailed {
                path: "FFmpeg command not found".to_string(),
            }
            .into())
        }
    }

    fn extension(path: &Path) -> String {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default()
    }

    fn is_image(path: &Path) -> bool {
        IMAGE_EXTENSIONS.contains(&Self::extension(path).as_str())
    }

    fn is_video(path: &Path) -> bool {
        VIDEO_EXTENSIONS.contains(&Self::extension(path).as_str())
    }

    fn is_audio(path: &Path) -> bool {
        AUDIO_EXTENSIONS.contains(&Self::extension(path).as_str())
    }

    pub fn is_supported(path: &Path) -> bool {
        Self::is_image(path) || Self::is_video(path) || Self::is_audio(path)
    }

    fn probe_image(&self, path: &Path) -> Result<ClipMetadata> {
        let img = image::open(path).map_err(|_| MediaError::LoadFailed {
            path: path.display().to_string(),
        })?;
        let (width, height) = img.dimensions();
        Ok(ClipMetadata {
            kind: ClipKind::VideoOrImage,
            frame_count: 1.0,
            fps: 30.0,
            width,
            height,
            unlimited_length: true,
        })
    }

    fn run_ffprobe(&self, path: &Path, stream_selector: &str) -> Result<ProbeDocument> {
        let output = Command::new("ffprobe")
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                stream_selector,
            ])
            .arg(path)
            .output()
            .map_err(|_| MediaError::LoadFailed {
                path: format!("{}: ffprobe failed", path.display()),
            })?;

        if !output.status.success() {
            return Err(MediaError::LoadFailed {
                path: format!("{}: ffprobe exited with error", path.display()),
            }
            .into());
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            MediaError::LoadFailed {
                path: format!("{}: invalid ffprobe output: {e}", path.display()),
            }
            .into()
        })
    }

    fn parse_frame_rate(raw: Option<&str>) -> f64 {
        let Some(raw) = raw else { return 30.0 };
        match raw.split_once('/') {
            Some((num, den)) => {
                let num: f64 = num.parse().unwrap_or(30.0);
                let den: f64 = den.parse().unwrap_or(1.0);
                if den == 0.0 {
                    30.0
                } else {
                    num / den
                }
            }
            None => raw.parse().unwrap_or(30.0),
        }
    }

    fn probe_video(&self, path: &Path) -> Result<ClipMetadata> {
        let doc = self.run_ffprobe(path, "v:0")?;
        let stream = doc.streams.first().ok_or_else(|| MediaError::LoadFailed {
            path: format!("{}: no video stream", path.display()),
        })?;

        let fps = Self::parse_frame_rate(stream.avg_frame_rate.as_deref());
        let duration: f64 = stream
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0);

        let metadata = ClipMetadata {
            kind: ClipKind::VideoOrImage,
            frame_count: (duration * fps).trunc(),
            fps,
            width: stream.width.unwrap_or(1920),
            height: stream.height.unwrap_or(1080),
            unlimited_length: false,
        };
        info!(
            "Probed video {}: {}x{} @ {:.1}fps, {:.0} frames",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.frame_count
        );
        Ok(metadata)
    }

    fn probe_audio(&self, path: &Path) -> Result<ClipMetadata> {
        let doc = self.run_ffprobe(path, "a:0")?;
        let stream = doc.streams.first().ok_or_else(|| MediaError::LoadFailed {
            path: format!("{}: no audio stream", path.display()),
        })?;
        let duration: f64 = stream
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0);

        // Audio positions are tracked in video frames for timeline math.
        let fps = 30.0;
        Ok(ClipMetadata {
            kind: ClipKind::Audio,
            frame_count: (duration * fps).trunc(),
            fps,
            width: 0,
            height: 0,
            unlimited_length: false,
        })
    }

    fn dump_video_frames(&self, clip: &ProjectClip) -> Result<usize> {
        let temp_dir = scratch_path(&format!("versecut_cache_{}", clip.id.simple()), "d");
        std::fs::create_dir_all(&temp_dir)?;

        let pattern = temp_dir.join("frame_%06d.png");
        let output = Command::new("ffmpeg")
            .args(["-i"])
            .arg(&clip.path)
            .args(["-vsync", "0", "-y"])
            .arg(&pattern)
            .output()
            .map_err(|e| MediaError::ExtractionFailed {
                reason: format!("FFmpeg execution failed: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let _ = std::fs::remove_dir_all(&temp_dir);
            return Err(MediaError::ExtractionFailed {
                reason: format!("FFmpeg failed: {stderr}"),
            }
            .into());
        }

        let mut staged: Vec<_> = std::fs::read_dir(&temp_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .collect();
        staged.sort();

        let mut cached = 0usize;
        for (index, frame_path) in staged.iter().enumerate() {
            match std::fs::read(frame_path) {
                Ok(bytes) => {
                    clip.cache_frame(index as u64, bytes);
                    cached += 1;
                }
                Err(e) => warn!("Skipping staged frame {}: {}", frame_path.display(), e),
            }
        }
        let _ = std::fs::remove_dir_all(&temp_dir);

        debug!("Cached {} frames for clip {}", cached, clip.id);
        Ok(cached)
    }
}

impl MediaProbe for FfmpegProbe {
    fn probe(&self, path: &Path) -> Result<ClipMetadata> {
        if Self::is_image(path) {
            self.probe_image(path)
        } else if Self::is_audio(path) {
            self.probe_audio(path)
        } else if Self::is_video(path) {
            self.probe_video(path)
        } else {
            Err(MediaError::UnsupportedFormat {
                format: Self::extension(path),
            }
            .into())
        }
    }

    fn populate_cache(&self, clip: &ProjectClip) -> Result<usize> {
        match clip.kind {
            ClipKind::VideoOrImage if Self::is_image(&clip.path) => {
                // A still image is a one-frame cache; compositing repeats it.
                let bytes = std::fs::read(&clip.path)?;
                let encoded = if Self::extension(&clip.path) == "png" {
                    bytes
                } else {
                    let img = image::open(&clip.path).map_err(|_| MediaError::LoadFailed {
                        path: clip.path.display().to_string(),
                    })?;
                    crate::render::Frame::new(img.to_rgba8()).to_png_bytes()?
                };
                clip.cache_frame(0, encoded);
                Ok(1)
            }
            ClipKind::VideoOrImage => self.dump_video_frames(clip),
            // Audio and script sources carry no visual frames.
            _ => Ok(0),
        }
    }

    fn thumbnail(&self, path: &Path) -> Result<Vec<u8>> {
        if Self::is_image(path) {
            let img = image::open(path).map_err(|_| MediaError::LoadFailed {
                path: path.display().to_string(),
            })?;
            let thumb = img.thumbnail(320, 180);
            return crate::render::Frame::new(thumb.to_rgba8()).to_png_bytes();
        }

        let temp = scratch_path("versecut_thumb", "png");
        let output = Command::new("ffmpeg")
            .args(["-ss", "1.0", "-i"])
            .arg(path)
            .args(["-vframes", "1", "-vf", "scale=320:-1", "-y"])
            .arg(&temp)
            .output()
            .map_err(|e| MediaError::ExtractionFailed {
                reason: format!("FFmpeg execution failed: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::ExtractionFailed {
                reason: format!("Thumbnail extraction failed: {stderr}"),
            }
            .into());
        }

        let bytes = std::fs::read(&temp)?;
        let _ = std::fs::remove_file(&temp);
        Ok(bytes)
    }

    fn audio_window(&self, path: &Path, start_sec: f64, end_sec: f64) -> Result<AudioSegment> {
        let temp = scratch_path("versecut_audio", "wav");

        let output = Command::new("ffmpeg")
            .args(["-ss", &start_sec.to_string(), "-to", &end_sec.to_string(), "-i"])
            .arg(path)
            .args(["-vn", "-acodec", "pcm_s16le", "-y"])
            .arg(&temp)
            .output()
            .map_err(|e| MediaError::ExtractionFailed {
                reason: format!("FFmpeg execution failed: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let _ = std::fs::remove_file(&temp);
            return Err(MediaError::ExtractionFailed {
                reason: format!("Audio extraction failed: {stderr}"),
            }
            .into());
        }

        let mut reader = hound::WavReader::open(&temp).map_err(|e| MediaError::ExtractionFailed {
            reason: format!("WAV read failed: {e}"),
        })?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| MediaError::ExtractionFailed {
                reason: format!("WAV decode failed: {e}"),
            })?;
        let _ = std::fs::remove_file(&temp);

        Ok(AudioSegment {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }
}
