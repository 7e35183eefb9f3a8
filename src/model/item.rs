use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::verse::VerseBlock;
use crate::timecode::TimeCode;

/// Frames reserved at the tail of an item that fades may never consume.
pub const FADE_TAIL_GAP: f64 = 25.0;

/// Source extent of a placed item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SourceLength {
    /// Trim window must stay inside the decoded source.
    Bounded(TimeCode),
    /// Still images and script overlays: no intrinsic end, start pinned at 0.
    Unlimited,
}

/// Kind discriminator for payload-independent checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Script,
    Audio,
    Visual,
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Script => "ScriptItem",
            ItemKind::Audio => "AudioItem",
            ItemKind::Visual => "VideoOrImageItem",
        }
    }
}

/// Variant payload of a track item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ItemPayload {
    Script { verse: VerseBlock },
    Audio,
    Visual,
}

impl ItemPayload {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemPayload::Script { .. } => ItemKind::Script,
            ItemPayload::Audio => ItemKind::Audio,
            ItemPayload::Visual => ItemKind::Visual,
        }
    }
}

/// Mutable placement fields captured for undo deltas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemGeometry {
    pub position: TimeCode,
    pub start: TimeCode,
    pub end: TimeCode,
    pub fade_in_frames: f64,
    pub fade_out_frames: f64,
}

/// A placed, trimmed occurrence of a source clip on a track.
///
/// `position` is where the item sits on the global timeline; `start`/`end`
/// delimit the trim window inside the source. Setters clamp silently;
/// an out-of-range write is corrected, never rejected, and the corrected
/// value is what callers observe afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackItem {
    pub id: Uuid,
    pub clip_id: Uuid,
    position: TimeCode,
    start: TimeCode,
    end: TimeCode,
    source: SourceLength,
    fade_in_frames: f64,
    fade_out_frames: f64,
    pub selected: bool,
    pub payload: ItemPayload,
}

impl TrackItem {
    /// Bounded visual item (video or still image).
    pub fn visual(
        clip_id: Uuid,
        position: TimeCode,
        start: TimeCode,
        end: TimeCode,
        source: SourceLength,
    ) -> Self {
        Self::with_payload(clip_id, position, start, end, source, ItemPayload::Visual)
    }

    pub fn audio(
        clip_id: Uuid,
        position: TimeCode,
        start: TimeCode,
        end: TimeCode,
        source_length: TimeCode,
    ) -> Self {
        Self::with_payload(
            clip_id,
            position,
            start,
            end,
            SourceLength::Bounded(source_length),
            ItemPayload::Audio,
        )
    }

    /// Script overlay: unlimited source, trim window starts at zero.
    pub fn script(clip_id: Uuid, position: TimeCode, length: TimeCode, verse: VerseBlock) -> Self {
        let fps = position.fps();
        Self::with_payload(
            clip_id,
            position,
            TimeCode::zero(fps),
            length,
            SourceLength::Unlimited,
            ItemPayload::Script { verse },
        )
    }

    fn with_payload(
        clip_id: Uuid,
        position: TimeCode,
        start: TimeCode,
        end: TimeCode,
        source: SourceLength,
        payload: ItemPayload,
    ) -> Self {
        let mut item = Self {
            id: Uuid::new_v4(),
            clip_id,
            position,
            start,
            end,
            source,
            fade_in_frames: 0.0,
            fade_out_frames: 0.0,
            selected: false,
            payload,
        };
        // Normalize an invalid initial window the same way setters would.
        item.set_end(end);
        item.set_start(start);
        item
    }

    /// Rebuild a persisted item. Values pass through the same clamps the
    /// setters apply, so a hand-edited document deserializes into a valid
    /// item instead of failing.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: Uuid,
        clip_id: Uuid,
        position: TimeCode,
        start: TimeCode,
        end: TimeCode,
        source: SourceLength,
        fade_in_frames: f64,
        fade_out_frames: f64,
        payload: ItemPayload,
    ) -> Self {
        let mut item = Self::with_payload(clip_id, position, start, end, source, payload);
        item.id = id;
        item.set_fade_in_frames(fade_in_frames);
        item.set_fade_out_frames(fade_out_frames);
        item
    }

    pub fn kind(&self) -> ItemKind {
        self.payload.kind()
    }

    pub fn position(&self) -> TimeCode {
        self.position
    }

    pub fn start(&self) -> TimeCode {
        self.start
    }

    pub fn end(&self) -> TimeCode {
        self.end
    }

    pub fn source(&self) -> SourceLength {
        self.source
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self.source, SourceLength::Unlimited)
    }

    pub fn fade_in_frames(&self) -> f64 {
        self.fade_in_frames
    }

    pub fn fade_out_frames(&self) -> f64 {
        self.fade_out_frames
    }

    pub fn duration(&self) -> TimeCode {
        self.end - self.start
    }

    pub fn right_edge(&self) -> TimeCode {
        self.position + self.duration()
    }

    /// True if the absolute timeline frame falls inside this item's span.
    pub fn covers(&self, timeline_frame: f64) -> bool {
        timeline_frame >= self.position.total_frames()
            && timeline_frame < self.right_edge().total_frames()
    }

    /// Source-local frame for an absolute timeline frame.
    pub fn local_frame(&self, timeline_frame: f64) -> f64 {
        timeline_frame - self.position.total_frames() + self.start.total_frames()
    }

    pub fn set_position(&mut self, position: TimeCode) {
        self.position = TimeCode::new(position.total_frames().max(0.0), position.fps());
    }

    /// Clamped trim-window start. On unlimited sources start is pinned at
    /// zero; trim-left gestures go through the track, which shifts position
    /// and extends the end instead.
    pub fn set_start(&mut self, new_start: TimeCode) {
        if self.is_unlimited() {
            self.start = TimeCode::zero(self.start.fps());
            return;
        }
        let mut frames = new_start.total_frames().max(0.0);
        if frames >= self.end.total_frames() {
            frames = self.end.total_frames() - 1.0;
        }
        self.start = TimeCode::new(frames, self.start.fps());
    }

    /// Clamped trim-window end: never past a bounded source, never at or
    /// before start.
    pub fn set_end(&mut self, new_end: TimeCode) {
        let mut frames = new_end.total_frames();
        if let SourceLength::Bounded(length) = self.source {
            frames = frames.min(length.total_frames());
        }
        if frames <= self.start.total_frames() {
            frames = self.start.total_frames() + 1.0;
        }
        self.end = TimeCode::new(frames, self.end.fps());
    }

    fn max_fade(&self) -> f64 {
        (self.duration().total_frames() - FADE_TAIL_GAP).max(0.0)
    }

    pub fn set_fade_in_frames(&mut self, frames: f64) {
        self.fade_in_frames = frames.clamp(0.0, self.max_fade());
    }

    pub fn set_fade_out_frames(&mut self, frames: f64) {
        self.fade_out_frames = frames.clamp(0.0, self.max_fade());
    }

    /// Re-apply fade clamps after a duration change.
    pub fn reclamp_fades(&mut self) {
        self.set_fade_in_frames(self.fade_in_frames);
        self.set_fade_out_frames(self.fade_out_frames);
    }

    pub fn geometry(&self) -> ItemGeometry {
        ItemGeometry {
            position: self.position,
            start: self.start,
            end: self.end,
            fade_in_frames: self.fade_in_frames,
            fade_out_frames: self.fade_out_frames,
        }
    }

    /// Restore a previously captured geometry verbatim (undo path: the
    /// captured values were valid when taken, so no re-clamping).
    pub fn restore_geometry(&mut self, geometry: ItemGeometry) {
        self.position = geometry.position;
        self.start = geometry.start;
        self.end = geometry.end;
        self.fade_in_frames = geometry.fade_in_frames;
        self.fade_out_frames = geometry.fade_out_frames;
    }

    /// Opacity at a source-local frame in `[start, end]`.
    ///
    /// 1.0 outside the fade windows; a linear ramp up over the first
    /// `fade_in_frames` and down over the last `fade_out_frames` of the
    /// visible span. Overlapping windows take the lower ramp.
    pub fn opacity_at(&self, local_frame: f64) -> f64 {
        let rel = local_frame - self.start.total_frames();
        let duration = self.duration().total_frames();

        let mut opacity: f64 = 1.0;
        if self.fade_in_frames > 0.0 && rel < self.fade_in_frames {
            opacity = opacity.min(rel / self.fade_in_frames);
        }
        if self.fade_out_frames > 0.0 && rel > duration - self.fade_out_frames {
            opacity = opacity.min((duration - rel) / self.fade_out_frames);
        }
        opacity.clamp(0.0, 1.0)
    }

    pub fn verse(&self) -> Option<&VerseBlock> {
        match &self.payload {
            ItemPayload::Script { verse } => Some(verse),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounded_item() -> TrackItem {
        // 25 fps, sits at frame 100, shows source frames 200..800.
        TrackItem::visual(
            Uuid::new_v4(),
            TimeCode::new(100.0, 25.0),
            TimeCode::new(200.0, 25.0),
            TimeCode::new(800.0, 25.0),
            SourceLength::Bounded(TimeCode::new(1000.0, 25.0)),
        )
    }

    #[test]
    fn duration_and_right_edge() {
        let item = bounded_item();
        assert_eq!(item.duration().total_frames(), 600.0);
        assert_eq!(item.right_edge().total_frames(), 700.0);
    }

    #[test]
    fn set_start_clamps_before_end() {
        let mut item = bounded_item();
        item.set_start(TimeCode::new(900.0, 25.0));
        assert_eq!(item.start().total_frames(), 799.0);

        item.set_start(TimeCode::new(-5.0, 25.0));
        assert_eq!(item.start().total_frames(), 0.0);
    }

    #[test]
    fn set_end_clamps_to_source_and_start() {
        let mut item = bounded_item();
        item.set_end(TimeCode::new(5000.0, 25.0));
        assert_eq!(item.end().total_frames(), 1000.0);

        item.set_end(TimeCode::new(100.0, 25.0));
        assert_eq!(item.end().total_frames(), item.start().total_frames() + 1.0);
    }

    #[test]
    fn clamp_is_idempotent_on_valid_values() {
        let mut item = bounded_item();
        let before = item.geometry();
        item.set_start(item.start());
        item.set_end(item.end());
        item.set_fade_in_frames(item.fade_in_frames());
        item.set_fade_out_frames(item.fade_out_frames());
        assert_eq!(item.geometry(), before);
    }

    #[test]
    fn unlimited_start_is_pinned() {
        let mut item = TrackItem::script(
            Uuid::new_v4(),
            TimeCode::new(0.0, 25.0),
            TimeCode::new(300.0, 25.0),
            VerseBlock::new(1, 1, "text"),
        );
        item.set_start(TimeCode::new(50.0, 25.0));
        assert_eq!(item.start().total_frames(), 0.0);
        // No source bound either.
        item.set_end(TimeCode::new(100_000.0, 25.0));
        assert_eq!(item.end().total_frames(), 100_000.0);
    }

    #[test]
    fn fade_clamps_leave_tail_gap() {
        let mut item = bounded_item();
        item.set_end(TimeCode::new(950.0, 25.0)); // duration 750
        item.set_fade_in_frames(1000.0);
        assert_eq!(item.fade_in_frames(), 725.0);

        item.set_fade_out_frames(-3.0);
        assert_eq!(item.fade_out_frames(), 0.0);
    }

    #[test]
    fn fade_clamp_floors_at_zero_for_short_items() {
        let mut item = bounded_item();
        item.set_end(TimeCode::new(210.0, 25.0)); // duration 10 < tail gap
        item.set_fade_in_frames(5.0);
        assert_eq!(item.fade_in_frames(), 0.0);
    }

    #[test]
    fn opacity_ramps_are_monotonic_and_bounded() {
        let mut item = bounded_item();
        item.set_fade_in_frames(100.0);
        item.set_fade_out_frames(100.0);

        let start = item.start().total_frames();
        let duration = item.duration().total_frames();

        // Rising edge.
        let mut last = -1.0;
        for f in 0..=100 {
            let o = item.opacity_at(start + f as f64);
            assert!((0.0..=1.0).contains(&o));
            assert!(o >= last);
            last = o;
        }
        // Plateau.
        assert_eq!(item.opacity_at(start + 300.0), 1.0);
        // Falling edge.
        let mut last = 2.0;
        for f in 0..=100 {
            let o = item.opacity_at(start + duration - 100.0 + f as f64);
            assert!((0.0..=1.0).contains(&o));
            assert!(o <= last);
            last = o;
        }
        assert_eq!(item.opacity_at(start + duration), 0.0);
    }

    #[test]
    fn opacity_is_full_without_fades() {
        let item = bounded_item();
        assert_eq!(item.opacity_at(item.start().total_frames()), 1.0);
        assert_eq!(item.opacity_at(item.end().total_frames()), 1.0);
    }

    #[test]
    fn covers_and_local_frame_mapping() {
        let item = bounded_item();
        assert!(item.covers(100.0));
        assert!(item.covers(699.0));
        assert!(!item.covers(700.0));
        assert!(!item.covers(99.0));

        // Timeline frame 100 maps to source frame 200.
        assert_eq!(item.local_frame(100.0), 200.0);
        assert_eq!(item.local_frame(350.0), 450.0);
    }
}
