use serde::{Deserialize, Serialize};

use crate::assets::AssetId;
use crate::error::TimelineError;

/// Per-segment motion applied to the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Animation {
    PanZoom,
    ZoomIn,
    Static,
    SlideLeft,
    /// Renders like `Static` for now
    SlideRight,
}

/// How a segment enters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Fade,
    Cut,
    /// Renders like `Cut` for now
    Dissolve,
}

/// One time range mapped to an image, caption, animation and transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSegment {
    /// Start in seconds
    pub start_time: f64,

    /// End in seconds
    pub end_time: f64,

    /// Image shown during the segment. Not owned; the asset may be gone.
    pub asset_id: AssetId,

    pub caption: String,
    pub animation: Animation,
    pub transition: Transition,
}

impl TimelineSegment {
    /// Whether `t` falls inside the closed range `[start, end]`
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_time && t <= self.end_time
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Local progress in `[0, 1]`
    ///
    /// A zero-length segment is always complete.
    pub fn progress(&self, t: f64) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 1.0;
        }
        let progress = (t - self.start_time) / duration;
        if progress.is_nan() {
            return 1.0;
        }
        progress.clamp(0.0, 1.0)
    }

    /// Seconds elapsed since the segment started
    pub fn elapsed(&self, t: f64) -> f64 {
        t - self.start_time
    }

    fn validate(&self, index: usize) -> Result<(), TimelineError> {
        let valid = self.start_time.is_finite()
            && self.end_time.is_finite()
            && self.start_time < self.end_time;

        if valid {
            Ok(())
        } else {
            Err(TimelineError::InvalidRange {
                index,
                start: self.start_time,
                end: self.end_time,
            })
        }
    }
}

/// Ordered segments with validated ranges
///
/// Segments may overlap. Lookups take the first declared segment that
/// contains the timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TimelineSegment>", into = "Vec<TimelineSegment>")]
pub struct Timeline {
    segments: Vec<TimelineSegment>,
}

impl Timeline {
    /// Build a timeline, rejecting any segment with `start >= end`
    pub fn new(segments: Vec<TimelineSegment>) -> Result<Self, TimelineError> {
        for (index, segment) in segments.iter().enumerate() {
            segment.validate(index)?;
        }
        Ok(Self { segments })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// First declared segment whose range contains `t`
    pub fn active_segment(&self, t: f64) -> Option<&TimelineSegment> {
        self.segments.iter().find(|segment| segment.contains(t))
    }

    pub fn segments(&self) -> &[TimelineSegment] {
        &self.segments
    }

    /// Latest end time over all segments
    pub fn end_time(&self) -> f64 {
        self.segments
            .iter()
            .map(|segment| segment.end_time)
            .fold(0.0, f64::max)
    }

    /// Distinct asset ids in first-use order
    pub fn referenced_assets(&self) -> Vec<&AssetId> {
        let mut ids: Vec<&AssetId> = Vec::new();
        for segment in &self.segments {
            if !ids.contains(&&segment.asset_id) {
                ids.push(&segment.asset_id);
            }
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl TryFrom<Vec<TimelineSegment>> for Timeline {
    type Error = TimelineError;

    fn try_from(segments: Vec<TimelineSegment>) -> Result<Self, Self::Error> {
        Timeline::new(segments)
    }
}

impl From<Timeline> for Vec<TimelineSegment> {
    fn from(timeline: Timeline) -> Self {
        timeline.segments
    }
}
