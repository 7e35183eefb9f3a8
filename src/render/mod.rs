//! # Frame Compositing and Export
//!
//! Per-frame layered composition over a timeline snapshot, and the parallel
//! export pipeline that feeds composed frames to the encode collaborator.

pub mod compositor;
pub mod frame;
pub mod pipeline;

pub use compositor::{FrameCompositor, RenderSnapshot};
pub use frame::Frame;
pub use pipeline::{CancelToken, ExportPipeline, ExportProgress, ExportReport};
