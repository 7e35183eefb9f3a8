//! # Versecut
//!
//! A frame-accurate non-linear editing engine for scripted verse-overlay
//! videos: a multi-track timeline of heterogeneous media (script-text
//! overlays, video, audio, still images) with trim/cut/move/fade editing,
//! undo/redo, and a parallel per-frame compositing and export pipeline.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use versecut::{
//!     config::Config,
//!     media::{BlankTextRenderer, FfmpegProbe, FfmpegWriter},
//!     model::TrackKind,
//!     project::Project,
//!     render::CancelToken,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let mut project = Project::new(25.0);
//! let _video_track = project.add_track(TrackKind::Video);
//!
//! let probe = Arc::new(FfmpegProbe::new()?);
//! let writer = Arc::new(FfmpegWriter::new(config.export.clone()));
//! let renderer = Arc::new(BlankTextRenderer::new(1920, 1080));
//!
//! let report = project
//!     .export_to(
//!         "output.mp4".into(),
//!         config,
//!         renderer,
//!         writer,
//!         probe,
//!         Arc::new(|p| println!("{:.0}%", p.percent())),
//!         CancelToken::new(),
//!     )
//!     .await?;
//! println!("exported {} frames", report.frame_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`timecode`] - Frame-accurate time values
//! - [`model`] - Clips, track items, and track mutation algorithms
//! - [`undo`] - Reversible command units and the undo/redo stacks
//! - [`project`] - The aggregate root, persistence, and the playback clock
//! - [`render`] - Per-frame compositing and the parallel export pipeline
//! - [`media`] - External decode/encode/text-render collaborators
//! - [`config`] - Engine configuration

pub mod config;
pub mod error;
pub mod media;
pub mod model;
pub mod project;
pub mod render;
pub mod timecode;
pub mod undo;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{EditorError, OpResult, Result},
    project::Project,
    render::{CancelToken, ExportReport},
    timecode::TimeCode,
};
