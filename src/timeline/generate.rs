use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assets::{AssetId, AssetItem};
use crate::audio::AudioData;
use crate::config::VideoConfig;
use crate::error::{Result, TimelineError};
use crate::timeline::types::{Animation, Timeline, TimelineSegment, Transition};

/// One record as returned by a timeline generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSegment {
    pub start_time: f64,
    pub end_time: f64,

    /// 0-based index into the image list handed to the generator
    pub image_index: i64,

    #[serde(default)]
    pub caption: String,
    pub animation: Animation,
    pub transition: Transition,
}

/// Everything a generator gets to look at
pub struct GenerationRequest<'a> {
    pub audio: &'a AudioData,
    pub images: Vec<&'a AssetItem>,
    pub config: &'a VideoConfig,
}

/// Source of timeline records, such as a script file or a remote model
pub trait TimelineGenerator {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Produce ordered segment records for the request
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<GeneratedSegment>>;
}

/// Reads pre-generated records from a JSON file
pub struct JsonScriptGenerator {
    path: PathBuf,
}

impl JsonScriptGenerator {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse records from a JSON string
    pub fn parse(json: &str) -> std::result::Result<Vec<GeneratedSegment>, TimelineError> {
        serde_json::from_str(json).map_err(|e| TimelineError::Malformed {
            reason: e.to_string(),
        })
    }
}

impl TimelineGenerator for JsonScriptGenerator {
    fn name(&self) -> &str {
        "json-script"
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Vec<GeneratedSegment>> {
        debug!(
            "Reading script {:?} for {:.1}s of audio and {} images ({:?} style)",
            self.path,
            request.audio.duration,
            request.images.len(),
            request.config.style
        );

        let content = std::fs::read_to_string(&self.path).map_err(|e| TimelineError::GenerationFailed {
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        Ok(Self::parse(&content)?)
    }
}

/// Turn generator records into a timeline
///
/// Image indices map onto `image_ids`; an out-of-range index falls back to
/// the first image. Any invalid record rejects the whole batch.
pub fn adopt(records: &[GeneratedSegment], image_ids: &[AssetId]) -> std::result::Result<Timeline, TimelineError> {
    let Some(fallback) = image_ids.first() else {
        return Err(TimelineError::Malformed {
            reason: "no images to map segments onto".to_string(),
        });
    };

    let segments = records
        .iter()
        .map(|record| {
            let asset_id = usize::try_from(record.image_index)
                .ok()
                .and_then(|index| image_ids.get(index))
                .unwrap_or_else(|| {
                    warn!("Image index {} out of range, using first image", record.image_index);
                    fallback
                })
                .clone();

            TimelineSegment {
                start_time: record.start_time,
                end_time: record.end_time,
                asset_id,
                caption: record.caption.clone(),
                animation: record.animation,
                transition: record.transition,
            }
        })
        .collect();

    let timeline = Timeline::new(segments)?;
    info!("Adopted timeline with {} segments ({:.1}s)", timeline.len(), timeline.end_time());
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(start: f64, end: f64, index: i64) -> GeneratedSegment {
        GeneratedSegment {
            start_time: start,
            end_time: end,
            image_index: index,
            caption: format!("segment {}", index),
            animation: Animation::ZoomIn,
            transition: Transition::Fade,
        }
    }

    fn ids() -> Vec<AssetId> {
        vec!["first".to_string(), "second".to_string()]
    }

    #[test]
    fn test_maps_indices_to_ids() {
        let timeline = adopt(&[record(0.0, 2.0, 1), record(2.0, 4.0, 0)], &ids()).unwrap();

        assert_eq!(timeline.segments()[0].asset_id, "second");
        assert_eq!(timeline.segments()[1].asset_id, "first");
        assert_eq!(timeline.segments()[0].caption, "segment 1");
    }

    #[test]
    fn test_out_of_range_index_falls_back_to_first() {
        let timeline = adopt(&[record(0.0, 1.0, 7), record(1.0, 2.0, -1)], &ids()).unwrap();

        assert!(timeline.segments().iter().all(|s| s.asset_id == "first"));
    }

    #[test]
    fn test_invalid_record_rejects_batch() {
        let result = adopt(&[record(0.0, 1.0, 0), record(3.0, 2.0, 1)], &ids());
        assert!(matches!(result, Err(TimelineError::InvalidRange { index: 1, .. })));
    }

    #[test]
    fn test_requires_images() {
        assert!(matches!(adopt(&[record(0.0, 1.0, 0)], &[]), Err(TimelineError::Malformed { .. })));
    }

    #[test]
    fn test_parse_generator_json() {
        let json = r#"[
            {"startTime": 0, "endTime": 3.2, "imageIndex": 0, "caption": "Hello there", "animation": "zoom_in", "transition": "fade"},
            {"startTime": 3.2, "endTime": 6, "imageIndex": 1, "animation": "slide_left", "transition": "cut"}
        ]"#;

        let records = JsonScriptGenerator::parse(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].caption, "");
        assert_eq!(records[1].animation, Animation::SlideLeft);

        assert!(JsonScriptGenerator::parse(r#"[{"startTime": 0}]"#).is_err());
    }
}
