use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TimelineError};
use crate::model::item::{ItemGeometry, ItemKind, TrackItem};
use crate::timecode::TimeCode;

/// Media kind of a timeline lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Script,
    Video,
    Audio,
}

impl TrackKind {
    /// Which item kinds may sit on this lane.
    pub fn accepts(&self, item: ItemKind) -> bool {
        matches!(
            (self, item),
            (TrackKind::Script, ItemKind::Script)
                | (TrackKind::Video, ItemKind::Visual)
                | (TrackKind::Audio, ItemKind::Audio)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrackKind::Script => "Script",
            TrackKind::Video => "Video",
            TrackKind::Audio => "Audio",
        }
    }
}

/// Everything a cut changed, for undo capture.
#[derive(Debug, Clone)]
pub struct CutOutcome {
    pub left_id: Uuid,
    pub left_before: ItemGeometry,
    pub left_after: ItemGeometry,
    /// The appended right fragment, by value.
    pub right: TrackItem,
}

/// Geometry delta of one item touched by a mutation.
#[derive(Debug, Clone)]
pub struct GeometryDelta {
    pub item_id: Uuid,
    pub before: ItemGeometry,
    pub after: ItemGeometry,
}

/// Ordered lane of non-overlapping items of one media kind.
///
/// Non-overlap is a per-operation responsibility: every mutation that can
/// collide resolves the collision itself rather than validating afterwards.
/// Script lanes additionally keep verses contiguous via
/// [`TimelineTrack::resize_script_neighbor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineTrack {
    pub id: Uuid,
    pub kind: TrackKind,
    items: Vec<TrackItem>,
}

impl TimelineTrack {
    pub fn new(kind: TrackKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            items: Vec::new(),
        }
    }

    pub fn items(&self) -> &[TrackItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: Uuid) -> Option<&TrackItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn item_mut(&mut self, id: Uuid) -> Option<&mut TrackItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    fn require(&self, id: Uuid) -> Result<usize> {
        self.items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| TimelineError::ItemNotFound { id: id.to_string() }.into())
    }

    fn sort(&mut self) {
        self.items.sort_by(|a, b| {
            a.position()
                .total_frames()
                .partial_cmp(&b.position().total_frames())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Append an item, rejecting incompatible kinds. Collision resolution is
    /// the caller's gesture-level concern; adds land where they are placed.
    pub fn add_item(&mut self, item: TrackItem) -> Result<()> {
        if !self.kind.accepts(item.kind()) {
            return Err(TimelineError::IncompatibleKind {
                track_kind: self.kind.name().to_string(),
            }
            .into());
        }
        self.items.push(item);
        self.sort();
        Ok(())
    }

    pub fn remove_item(&mut self, id: Uuid) -> Option<TrackItem> {
        let index = self.items.iter().position(|i| i.id == id)?;
        Some(self.items.remove(index))
    }

    /// All items whose span covers the absolute timeline frame.
    pub fn items_at(&self, timeline_frame: f64) -> impl Iterator<Item = &TrackItem> {
        self.items.iter().filter(move |i| i.covers(timeline_frame))
    }

    /// Rightmost edge of the lane, in frames.
    pub fn end_frame(&self) -> f64 {
        self.items
            .iter()
            .map(|i| i.right_edge().total_frames())
            .fold(0.0, f64::max)
    }

    /// Split one item at an absolute timeline frame.
    ///
    /// The left fragment keeps its position and trim start; the right
    /// fragment is a clone placed at the cut with the remainder of the trim
    /// window, so `left.duration + right.duration == original.duration`
    /// exactly and `left.right_edge == right.position`.
    ///
    /// Fades: visual/audio fragments keep the edge fade facing away from the
    /// cut (left keeps fade-in, right keeps fade-out), re-clamped; script
    /// fragments re-fade from scratch.
    pub fn cut(&mut self, item_id: Uuid, timeline_frame: f64) -> Result<CutOutcome> {
        let index = self.require(item_id)?;
        let item = &self.items[index];

        let lo = item.position().total_frames();
        let hi = item.right_edge().total_frames();
        if timeline_frame <= lo || timeline_frame >= hi {
            return Err(TimelineError::CutOutOfRange {
                frame: timeline_frame,
                lo,
                hi,
            }
            .into());
        }

        let fps = item.position().fps();
        let local_cut = timeline_frame - lo;
        let old_end = item.end();
        let left_before = item.geometry();

        let mut right = item.clone();
        right.id = Uuid::new_v4();

        let left = &mut self.items[index];
        left.set_end(left.start() + TimeCode::new(local_cut, fps));
        match left.kind() {
            ItemKind::Script => {
                left.set_fade_in_frames(0.0);
                left.set_fade_out_frames(0.0);
            }
            _ => left.set_fade_out_frames(0.0),
        }
        left.reclamp_fades();
        let left_after = left.geometry();
        let new_left_end = left.end();

        right.set_position(TimeCode::new(timeline_frame, fps));
        if right.is_unlimited() {
            // Start stays pinned at zero; the remainder of the window moves
            // into the end so the two durations still sum exactly.
            right.set_end(TimeCode::new(old_end.total_frames() - local_cut, fps));
        } else {
            right.set_end(old_end);
            right.set_start(new_left_end);
        }
        match right.kind() {
            ItemKind::Script => {
                right.set_fade_in_frames(0.0);
                right.set_fade_out_frames(0.0);
            }
            _ => right.set_fade_in_frames(0.0),
        }
        right.reclamp_fades();

        debug!(
            "cut item {} at frame {}: left {}..{}, right {}..{}",
            item_id,
            timeline_frame,
            left_after.start.total_frames(),
            left_after.end.total_frames(),
            right.start().total_frames(),
            right.end().total_frames(),
        );

        let outcome = CutOutcome {
            left_id: item_id,
            left_before,
            left_after,
            right: right.clone(),
        };
        self.items.push(right);
        self.sort();
        Ok(outcome)
    }

    /// Left-border drag: move the trim start by the gesture delta and shift
    /// position by the same amount so the right edge stays fixed. On
    /// unlimited sources the start stays pinned; position shifts and the end
    /// extends instead, preserving apparent duration.
    pub fn resize_left(&mut self, item_id: Uuid, delta_frames: f64) -> Result<GeometryDelta> {
        let index = self.require(item_id)?;
        let item = &mut self.items[index];
        let before = item.geometry();
        let fps = item.position().fps();

        if item.is_unlimited() {
            // Position cannot cross zero; the applied shift is whatever room
            // remains, and the end grows by exactly that amount.
            let old_position = item.position().total_frames();
            let applied = (old_position + delta_frames).max(0.0) - old_position;
            item.set_position(TimeCode::new(old_position + applied, fps));
            let end = item.end().total_frames();
            item.set_end(TimeCode::new(end - applied, fps));
        } else {
            let old_start = item.start().total_frames();
            item.set_start(TimeCode::new(old_start + delta_frames, fps));
            let applied = item.start().total_frames() - old_start;
            let position = item.position().total_frames();
            item.set_position(TimeCode::new(position + applied, fps));
        }
        item.reclamp_fades();

        let after = item.geometry();
        self.sort();
        Ok(GeometryDelta {
            item_id,
            before,
            after,
        })
    }

    /// Right-border drag: trim end only.
    pub fn resize_right(&mut self, item_id: Uuid, delta_frames: f64) -> Result<GeometryDelta> {
        let index = self.require(item_id)?;
        let item = &mut self.items[index];
        let before = item.geometry();
        let fps = item.end().fps();

        let end = item.end().total_frames();
        item.set_end(TimeCode::new(end + delta_frames, fps));
        item.reclamp_fades();

        Ok(GeometryDelta {
            item_id,
            before,
            after: self.items[index].geometry(),
        })
    }

    /// Destination start after collision resolution against every *other*
    /// item on this lane: an overlapping drop snaps to just after the
    /// collider when the drag moves forward, just before it otherwise.
    pub fn resolved_start(
        &self,
        exclude: Option<Uuid>,
        desired_start: f64,
        duration: f64,
        moving_forward: bool,
    ) -> f64 {
        let mut start = desired_start.max(0.0);
        for other in &self.items {
            if Some(other.id) == exclude {
                continue;
            }
            let other_start = other.position().total_frames();
            let other_end = other.right_edge().total_frames();
            if start < other_end && start + duration > other_start {
                start = if moving_forward {
                    other_end
                } else {
                    (other_start - duration).max(0.0)
                };
            }
        }
        start
    }

    /// Same-track move with collision snapping.
    pub fn move_item(&mut self, item_id: Uuid, desired_start: f64) -> Result<GeometryDelta> {
        let index = self.require(item_id)?;
        let before = self.items[index].geometry();
        let duration = self.items[index].duration().total_frames();
        let moving_forward = desired_start > before.position.total_frames();

        let resolved = self.resolved_start(Some(item_id), desired_start, duration, moving_forward);
        let fps = before.position.fps();
        self.items[index].set_position(TimeCode::new(resolved, fps));
        let after = self.items[index].geometry();
        self.sort();
        Ok(GeometryDelta {
            item_id,
            before,
            after,
        })
    }

    /// Script items ordered by chapter/verse, with their lane indices.
    fn verse_order(&self) -> Vec<(usize, (u32, u32))> {
        let mut order: Vec<(usize, (u32, u32))> = self
            .items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| item.verse().map(|v| (i, v.order_key())))
            .collect();
        order.sort_by_key(|&(_, key)| key);
        order
    }

    /// Ripple resize for script lanes: moving one verse's right edge moves
    /// the next verse's left edge with it, so coverage stays contiguous.
    /// The neighbor's own right edge does not move.
    pub fn resize_script_neighbor(
        &mut self,
        item_id: Uuid,
        delta_frames: f64,
    ) -> Result<Vec<GeometryDelta>> {
        let index = self.require(item_id)?;
        if self.items[index].verse().is_none() {
            return Err(TimelineError::IncompatibleKind {
                track_kind: self.kind.name().to_string(),
            }
            .into());
        }

        let order = self.verse_order();
        let rank = order.iter().position(|&(i, _)| i == index);
        let neighbor_index = rank
            .and_then(|r| order.get(r + 1))
            .map(|&(i, _)| i);

        let mut deltas = Vec::new();
        let edge_before = self.items[index].right_edge().total_frames();
        deltas.push(self.resize_right(item_id, delta_frames)?);
        let applied = self.items[index].right_edge().total_frames() - edge_before;

        if let Some(neighbor_index) = neighbor_index {
            let neighbor_id = self.items[neighbor_index].id;
            deltas.push(self.resize_left(neighbor_id, applied)?);
        }
        Ok(deltas)
    }

    /// Restore a geometry snapshot on one item (undo path).
    pub fn restore_geometry(&mut self, item_id: Uuid, geometry: ItemGeometry) -> Result<()> {
        let index = self.require(item_id)?;
        self.items[index].restore_geometry(geometry);
        self.sort();
        Ok(())
    }
}
