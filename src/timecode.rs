use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Frame-accurate time value tied to a frame rate.
///
/// A `TimeCode` is a count of frames plus the rate those frames play at.
/// Hours/minutes/seconds/frame are derived on demand, never stored.
/// Conversions truncate: `from_time` followed by `to_string` is not
/// round-trip-stable when the seconds/fps combination leaves a fractional
/// frame remainder.
///
/// Arithmetic combines `total_frames` directly and carries the fps of the
/// *left* operand; comparisons look at `total_frames` only. The type does
/// not convert between frame rates; callers keep one fps per project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeCode {
    total_frames: f64,
    fps: f64,
}

impl TimeCode {
    pub fn new(total_frames: f64, fps: f64) -> Self {
        Self { total_frames, fps }
    }

    /// Zero-length timecode at the given rate.
    pub fn zero(fps: f64) -> Self {
        Self::new(0.0, fps)
    }

    pub fn from_seconds(seconds: f64, fps: f64) -> Self {
        Self::new((seconds * fps).trunc(), fps)
    }

    pub fn from_millis(millis: f64, fps: f64) -> Self {
        Self::from_seconds(millis / 1000.0, fps)
    }

    pub fn from_time(hours: u32, minutes: u32, seconds: u32, fps: f64) -> Self {
        let total_seconds = hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds as f64;
        Self::new((total_seconds * fps).trunc(), fps)
    }

    pub fn total_frames(&self) -> f64 {
        self.total_frames
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn total_seconds(&self) -> f64 {
        if self.fps == 0.0 {
            return 0.0;
        }
        self.total_frames / self.fps
    }

    pub fn hours(&self) -> u32 {
        (self.total_seconds() / 3600.0) as u32
    }

    pub fn minutes(&self) -> u32 {
        ((self.total_seconds() / 60.0) as u64 % 60) as u32
    }

    pub fn seconds(&self) -> u32 {
        (self.total_seconds() as u64 % 60) as u32
    }

    /// Frame component after whole seconds are removed.
    pub fn frame(&self) -> u32 {
        if self.fps == 0.0 {
            return 0;
        }
        let whole_seconds = self.total_seconds().trunc();
        (self.total_frames - whole_seconds * self.fps).trunc() as u32
    }

    /// Same frame count, shifted by a signed number of frames (floored at 0).
    pub fn offset_frames(&self, delta: f64) -> Self {
        Self::new((self.total_frames + delta).max(0.0), self.fps)
    }

    pub fn is_zero(&self) -> bool {
        self.total_frames == 0.0
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours(),
            self.minutes(),
            self.seconds(),
            self.frame()
        )
    }
}

impl Add for TimeCode {
    type Output = TimeCode;

    fn add(self, rhs: TimeCode) -> TimeCode {
        TimeCode::new(self.total_frames + rhs.total_frames, self.fps)
    }
}

impl Sub for TimeCode {
    type Output = TimeCode;

    fn sub(self, rhs: TimeCode) -> TimeCode {
        TimeCode::new(self.total_frames - rhs.total_frames, self.fps)
    }
}

impl PartialEq for TimeCode {
    fn eq(&self, other: &Self) -> bool {
        self.total_frames == other.total_frames
    }
}

impl PartialOrd for TimeCode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.total_frames.partial_cmp(&other.total_frames)
    }
}

// fps participates in identity only here.
impl Hash for TimeCode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.total_frames.to_bits().hash(state);
        self.fps.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_round_trip() {
        for frames in [0.0, 1.0, 24.0, 1949.0, 90000.0] {
            let tc = TimeCode::new(frames, 25.0);
            assert_eq!(tc.total_frames(), frames);
        }
    }

    #[test]
    fn component_identity_within_truncation() {
        let tc = TimeCode::new(93_725.0, 25.0);
        let rebuilt = tc.hours() as f64 * 3600.0 * 25.0
            + tc.minutes() as f64 * 60.0 * 25.0
            + tc.seconds() as f64 * 25.0
            + tc.frame() as f64;
        assert!((rebuilt - tc.total_frames()).abs() < 1.0);
    }

    #[test]
    fn from_seconds_scenario() {
        // 65 s at 30 fps: 1950 frames, rendered as one minute five seconds.
        let tc = TimeCode::from_seconds(65.0, 30.0);
        assert_eq!(tc.total_frames(), 1950.0);
        assert_eq!(tc.to_string(), "00:01:05:00");
    }

    #[test]
    fn from_time_components() {
        let tc = TimeCode::from_time(1, 2, 3, 25.0);
        assert_eq!(tc.total_frames(), (3600.0 + 120.0 + 3.0) * 25.0);
        assert_eq!(tc.hours(), 1);
        assert_eq!(tc.minutes(), 2);
        assert_eq!(tc.seconds(), 3);
        assert_eq!(tc.frame(), 0);
    }

    #[test]
    fn from_millis_truncates() {
        let tc = TimeCode::from_millis(1001.0, 25.0);
        // 1.001 s * 25 fps = 25.025 frames, truncated.
        assert_eq!(tc.total_frames(), 25.0);
    }

    #[test]
    fn display_zero_pads() {
        assert_eq!(TimeCode::zero(25.0).to_string(), "00:00:00:00");
        assert_eq!(TimeCode::new(26.0, 25.0).to_string(), "00:00:01:01");
    }

    #[test]
    fn arithmetic_carries_left_fps() {
        let a = TimeCode::new(100.0, 25.0);
        let b = TimeCode::new(50.0, 30.0);
        let sum = a + b;
        assert_eq!(sum.total_frames(), 150.0);
        assert_eq!(sum.fps(), 25.0);

        let diff = a - b;
        assert_eq!(diff.total_frames(), 50.0);
        assert_eq!(diff.fps(), 25.0);
    }

    #[test]
    fn ordering_ignores_fps() {
        let a = TimeCode::new(10.0, 25.0);
        let b = TimeCode::new(10.0, 30.0);
        assert_eq!(a, b);
        assert!(TimeCode::new(9.0, 30.0) < a);
    }

    #[test]
    fn hash_includes_fps() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |tc: &TimeCode| {
            let mut h = DefaultHasher::new();
            tc.hash(&mut h);
            h.finish()
        };
        let a = TimeCode::new(10.0, 25.0);
        let b = TimeCode::new(10.0, 30.0);
        assert_eq!(a, b);
        assert_ne!(hash(&a), hash(&b));
    }
}
