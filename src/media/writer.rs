use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::config::ExportConfig;
use crate::error::{MediaError, Result};
use crate::media::MediaWriter;

/// Encode collaborator backed by external FFmpeg commands.
///
/// Frames are staged as PNG files by the export pipeline; this writer turns
/// the staged sequence into a video-only file and remuxes it with the
/// assembled audio stream.
pub struct FfmpegWriter {
    config: ExportConfig,
}

impl FfmpegWriter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn check_ffmpeg_available() -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn quality_to_crf(&self) -> u8 {
        (51 - ((self.config.quality as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }

    fn create_frame_list(&self, frame_paths: &[PathBuf], fps: f64) -> Result<PathBuf> {
        static LIST_SEQ: AtomicU64 = AtomicU64::new(0);
        let list_path = std::env::temp_dir().join(format!(
            "versecut_frames_{}_{}.txt",
            std::process::id(),
            LIST_SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        let mut file = File::create(&list_path)?;

        let frame_duration = 1.0 / fps;

        for frame_path in frame_paths {
            // Use absolute path to avoid path resolution issues
            let absolute_path = frame_path
                .canonicalize()
                .unwrap_or_else(|_| frame_path.clone());

            writeln!(file, "file '{}'", absolute_path.display())?;
            writeln!(file, "duration {:.6}", frame_duration)?;
        }

        if let Some(last_frame) = frame_paths.last() {
            let absolute_path = last_frame
                .canonicalize()
                .unwrap_or_else(|_| last_frame.clone());
            writeln!(file, "file '{}'", absolute_path.display())?;
        }

        Ok(list_path)
    }
}

impl MediaWriter for FfmpegWriter {
    fn encode_frames(&self, frame_paths: &[PathBuf], fps: f64, output: &Path) -> Result<()> {
        if frame_paths.is_empty() {
            return Err(MediaError::EncodingFailed {
                reason: "No frames to encode".to_string(),
            }
            .into());
        }
        if !Self::check_ffmpeg_available() {
            return Err(MediaError::EncodingFailed {
                reason: "FFmpeg not found. Please install FFmpeg.".to_string(),
            }
            .into());
        }

        let frame_list = self.create_frame_list(frame_paths, fps)?;
        debug!(
            "Encoding {} frames at {:.2} fps to {}",
            frame_paths.len(),
            fps,
            output.display()
        );

        let result = Command::new("ffmpeg")
            .args(["-f", "concat", "-safe", "0", "-i"])
            .arg(&frame_list)
            .args(["-c:v", &self.config.codec, "-r", &fps.to_string()])
            .args(["-pix_fmt", "yuv420p", "-crf", &self.quality_to_crf().to_string(), "-y"])
            .arg(output)
            .output()
            .map_err(|e| MediaError::EncodingFailed {
                reason: format!("FFmpeg execution failed: {e}"),
            })?;
        let _ = std::fs::remove_file(&frame_list);

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MediaError::EncodingFailed {
                reason: format!("FFmpeg failed: {stderr}"),
            }
            .into());
        }

        info!("Encoded video-only stream: {}", output.display());
        Ok(())
    }

    fn mux(&self, video: &Path, audio: &Path, output: &Path) -> Result<()> {
        let result = Command::new("ffmpeg")
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-c:v", "copy", "-c:a", "aac", "-map", "0:v:0", "-map", "1:a:0", "-shortest", "-y"])
            .arg(output)
            .output()
            .map_err(|e| MediaError::MuxFailed {
                reason: format!("FFmpeg execution failed: {e}"),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(MediaError::MuxFailed {
                reason: format!("FFmpeg failed: {stderr}"),
            }
            .into());
        }

        info!("Muxed final container: {}", output.display());
        Ok(())
    }
}
