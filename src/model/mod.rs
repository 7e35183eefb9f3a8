//! # Timeline Data Model
//!
//! Source clips, placed track items, and the track mutation algorithms
//! (cut, trim, move, script ripple).

pub mod clip;
pub mod item;
pub mod settings;
pub mod track;
pub mod verse;

pub use clip::{ClipKind, ProjectClip};
pub use item::{ItemGeometry, ItemKind, ItemPayload, SourceLength, TrackItem, FADE_TAIL_GAP};
pub use settings::{Color, ScriptRenderSettings};
pub use track::{CutOutcome, GeometryDelta, TimelineTrack, TrackKind};
pub use verse::{Translation, VerseBlock};
