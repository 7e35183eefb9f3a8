//! # Undo Engine
//!
//! Command-pattern stack of reversible deltas over the project's tracks and
//! clips. Each mutating project operation records one [`UndoUnit`] capturing
//! enough state to invert itself; composite units group per-item deltas so a
//! batch undoes atomically.

use tracing::debug;
use uuid::Uuid;

use crate::model::{ItemGeometry, ProjectClip, TimelineTrack, TrackItem};

/// One reversible structural mutation.
#[derive(Debug, Clone)]
pub enum UndoUnit {
    ItemAdd {
        track_id: Uuid,
        item: TrackItem,
    },
    ItemRemove {
        track_id: Uuid,
        item: TrackItem,
    },
    ItemResize {
        track_id: Uuid,
        item_id: Uuid,
        before: ItemGeometry,
        after: ItemGeometry,
    },
    ClipAdd {
        clip: ProjectClip,
    },
    ClipRemove {
        clip: ProjectClip,
    },
    TrackAdd {
        /// Captured at creation, before any items landed on it.
        track: TimelineTrack,
    },
    TrackRemove {
        track: TimelineTrack,
        index: usize,
    },
    /// Whole group undoes/redoes atomically, inverse in reverse order.
    Composite(Vec<UndoUnit>),
}

impl UndoUnit {
    /// Apply the inverse of this unit.
    pub fn undo_on(&self, tracks: &mut Vec<TimelineTrack>, clips: &mut Vec<ProjectClip>) {
        match self {
            UndoUnit::ItemAdd { track_id, item } => {
                if let Some(track) = tracks.iter_mut().find(|t| t.id == *track_id) {
                    track.remove_item(item.id);
                }
            }
            UndoUnit::ItemRemove { track_id, item } => {
                if let Some(track) = tracks.iter_mut().find(|t| t.id == *track_id) {
                    let _ = track.add_item(item.clone());
                }
            }
            UndoUnit::ItemResize {
                track_id,
                item_id,
                before,
                ..
            } => {
                if let Some(track) = tracks.iter_mut().find(|t| t.id == *track_id) {
                    let _ = track.restore_geometry(*item_id, *before);
                }
            }
            UndoUnit::ClipAdd { clip } => {
                clips.retain(|c| c.id != clip.id);
            }
            UndoUnit::ClipRemove { clip } => {
                clips.push(clip.clone());
            }
            UndoUnit::TrackAdd { track } => {
                tracks.retain(|t| t.id != track.id);
            }
            UndoUnit::TrackRemove { track, index } => {
                let index = (*index).min(tracks.len());
                tracks.insert(index, track.clone());
            }
            UndoUnit::Composite(units) => {
                for unit in units.iter().rev() {
                    unit.undo_on(tracks, clips);
                }
            }
        }
    }

    /// Re-apply this unit after an undo.
    pub fn redo_on(&self, tracks: &mut Vec<TimelineTrack>, clips: &mut Vec<ProjectClip>) {
        match self {
            UndoUnit::ItemAdd { track_id, item } => {
                if let Some(track) = tracks.iter_mut().find(|t| t.id == *track_id) {
                    let _ = track.add_item(item.clone());
                }
            }
            UndoUnit::ItemRemove { track_id, item } => {
                if let Some(track) = tracks.iter_mut().find(|t| t.id == *track_id) {
                    track.remove_item(item.id);
                }
            }
            UndoUnit::ItemResize {
                track_id,
                item_id,
                after,
                ..
            } => {
                if let Some(track) = tracks.iter_mut().find(|t| t.id == *track_id) {
                    let _ = track.restore_geometry(*item_id, *after);
                }
            }
            UndoUnit::ClipAdd { clip } => {
                clips.push(clip.clone());
            }
            UndoUnit::ClipRemove { clip } => {
                clips.retain(|c| c.id != clip.id);
            }
            UndoUnit::TrackAdd { track } => {
                // Re-insert the empty track; later item units replay onto it.
                tracks.push(track.clone());
            }
            UndoUnit::TrackRemove { track, .. } => {
                tracks.retain(|t| t.id != track.id);
            }
            UndoUnit::Composite(units) => {
                for unit in units {
                    unit.redo_on(tracks, clips);
                }
            }
        }
    }
}

/// Stack-based undo/redo engine. Owned by the project it serves, so tests
/// construct isolated instances instead of reaching for a process global.
#[derive(Debug, Default)]
pub struct UndoEngine {
    undo_stack: Vec<UndoUnit>,
    redo_stack: Vec<UndoUnit>,
    limit: Option<usize>,
}

impl UndoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounded engine: the oldest units fall off once `limit` is reached.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Record a committed mutation. Clears the redo stack: a new edit
    /// forks history.
    pub fn record(&mut self, unit: UndoUnit) {
        self.redo_stack.clear();
        self.undo_stack.push(unit);
        if let Some(limit) = self.limit {
            if self.undo_stack.len() > limit {
                let excess = self.undo_stack.len() - limit;
                self.undo_stack.drain(..excess);
            }
        }
        debug!("undo stack depth {}", self.undo_stack.len());
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Pop the newest unit, apply its inverse, park it for redo.
    pub fn undo(&mut self, tracks: &mut Vec<TimelineTrack>, clips: &mut Vec<ProjectClip>) -> bool {
        match self.undo_stack.pop() {
            Some(unit) => {
                unit.undo_on(tracks, clips);
                self.redo_stack.push(unit);
                true
            }
            None => false,
        }
    }

    /// Re-apply the newest undone unit and push it back for undo.
    pub fn redo(&mut self, tracks: &mut Vec<TimelineTrack>, clips: &mut Vec<ProjectClip>) -> bool {
        match self.redo_stack.pop() {
            Some(unit) => {
                unit.redo_on(tracks, clips);
                self.undo_stack.push(unit);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SourceLength, TrackKind, VerseBlock};
    use crate::timecode::TimeCode;

    const FPS: f64 = 25.0;

    fn tc(frames: f64) -> TimeCode {
        TimeCode::new(frames, FPS)
    }

    fn visual(position: f64, start: f64, end: f64) -> TrackItem {
        TrackItem::visual(
            Uuid::new_v4(),
            tc(position),
            tc(start),
            tc(end),
            SourceLength::Bounded(tc(10_000.0)),
        )
    }

    fn setup() -> (Vec<TimelineTrack>, Vec<ProjectClip>, UndoEngine) {
        (
            vec![TimelineTrack::new(TrackKind::Video)],
            Vec::new(),
            UndoEngine::new(),
        )
    }

    #[test]
    fn item_add_round_trip() {
        let (mut tracks, mut clips, mut engine) = setup();
        let track_id = tracks[0].id;
        let item = visual(0.0, 0.0, 100.0);
        let item_id = item.id;

        tracks[0].add_item(item.clone()).unwrap();
        engine.record(UndoUnit::ItemAdd { track_id, item });

        assert!(engine.undo(&mut tracks, &mut clips));
        assert!(tracks[0].item(item_id).is_none());

        assert!(engine.redo(&mut tracks, &mut clips));
        assert!(tracks[0].item(item_id).is_some());
    }

    #[test]
    fn resize_round_trip_restores_exact_state() {
        let (mut tracks, mut clips, mut engine) = setup();
        let track_id = tracks[0].id;
        let item = visual(100.0, 200.0, 800.0);
        let item_id = item.id;
        tracks[0].add_item(item).unwrap();

        let delta = tracks[0].resize_left(item_id, 50.0).unwrap();
        let after_apply = tracks[0].item(item_id).unwrap().geometry();
        engine.record(UndoUnit::ItemResize {
            track_id,
            item_id,
            before: delta.before,
            after: delta.after,
        });

        engine.undo(&mut tracks, &mut clips);
        assert_eq!(tracks[0].item(item_id).unwrap().geometry(), delta.before);

        engine.redo(&mut tracks, &mut clips);
        assert_eq!(tracks[0].item(item_id).unwrap().geometry(), after_apply);
    }

    #[test]
    fn composite_undoes_atomically_in_reverse() {
        let (mut tracks, mut clips, mut engine) = setup();
        let track_id = tracks[0].id;

        let a = visual(0.0, 0.0, 100.0);
        let b = visual(100.0, 0.0, 100.0);
        let (a_id, b_id) = (a.id, b.id);
        tracks[0].add_item(a.clone()).unwrap();
        tracks[0].add_item(b.clone()).unwrap();
        engine.record(UndoUnit::Composite(vec![
            UndoUnit::ItemAdd { track_id, item: a },
            UndoUnit::ItemAdd { track_id, item: b },
        ]));

        engine.undo(&mut tracks, &mut clips);
        assert!(tracks[0].is_empty());

        engine.redo(&mut tracks, &mut clips);
        assert!(tracks[0].item(a_id).is_some());
        assert!(tracks[0].item(b_id).is_some());
    }

    #[test]
    fn new_edit_clears_redo() {
        let (mut tracks, mut clips, mut engine) = setup();
        let track_id = tracks[0].id;
        let item = visual(0.0, 0.0, 100.0);
        tracks[0].add_item(item.clone()).unwrap();
        engine.record(UndoUnit::ItemAdd { track_id, item });

        engine.undo(&mut tracks, &mut clips);
        assert!(engine.can_redo());

        let second = visual(200.0, 0.0, 100.0);
        tracks[0].add_item(second.clone()).unwrap();
        engine.record(UndoUnit::ItemAdd {
            track_id,
            item: second,
        });
        assert!(!engine.can_redo());
    }

    #[test]
    fn limit_drops_oldest_units() {
        let (mut tracks, _clips, engine) = setup();
        let track_id = tracks[0].id;
        let mut engine_limited = UndoEngine::with_limit(2);

        for i in 0..4 {
            let item = visual(i as f64 * 100.0, 0.0, 50.0);
            tracks[0].add_item(item.clone()).unwrap();
            engine_limited.record(UndoUnit::ItemAdd { track_id, item });
        }
        assert_eq!(engine_limited.undo_depth(), 2);
        // Unbounded default keeps everything.
        assert_eq!(engine.undo_depth(), 0);
    }

    #[test]
    fn track_remove_round_trip_preserves_index() {
        let mut tracks = vec![
            TimelineTrack::new(TrackKind::Script),
            TimelineTrack::new(TrackKind::Video),
            TimelineTrack::new(TrackKind::Audio),
        ];
        let mut clips = Vec::new();
        let mut engine = UndoEngine::new();

        let removed = tracks.remove(1);
        let removed_id = removed.id;
        engine.record(UndoUnit::TrackRemove {
            track: removed,
            index: 1,
        });

        engine.undo(&mut tracks, &mut clips);
        assert_eq!(tracks[1].id, removed_id);

        engine.redo(&mut tracks, &mut clips);
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| t.id != removed_id));
    }

    #[test]
    fn verse_script_items_survive_round_trip() {
        let mut tracks = vec![TimelineTrack::new(TrackKind::Script)];
        let mut clips = Vec::new();
        let mut engine = UndoEngine::new();
        let track_id = tracks[0].id;

        let item = TrackItem::script(
            Uuid::new_v4(),
            tc(0.0),
            tc(300.0),
            VerseBlock::new(3, 16, "For God so loved"),
        );
        let item_id = item.id;
        tracks[0].add_item(item.clone()).unwrap();
        engine.record(UndoUnit::ItemAdd { track_id, item });

        engine.undo(&mut tracks, &mut clips);
        engine.redo(&mut tracks, &mut clips);
        let restored = tracks[0].item(item_id).unwrap();
        assert_eq!(restored.verse().unwrap().text, "For God so loved");
    }
}
