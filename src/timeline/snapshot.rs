use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::assets::{AssetId, AssetKind, AssetLibrary};
use crate::config::VideoConfig;
use crate::error::Result;
use crate::timeline::types::Timeline;

/// Default file name for saved projects
pub const SNAPSHOT_FILE_NAME: &str = "project_data.json";

/// Asset metadata kept in a snapshot. Raw bytes are never written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotAsset {
    pub id: AssetId,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub name: String,
}

/// Metadata-only project document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub config: VideoConfig,
    pub timeline: Timeline,
    pub images: Vec<SnapshotAsset>,
}

impl ProjectSnapshot {
    pub fn capture(config: &VideoConfig, timeline: &Timeline, library: &AssetLibrary) -> Self {
        Self {
            config: *config,
            timeline: timeline.clone(),
            images: library
                .images()
                .map(|item| SnapshotAsset {
                    id: item.id.clone(),
                    kind: item.kind,
                    name: item.original_file_name.clone(),
                })
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        info!("Project saved to {:?} ({} segments, {} images)",
              path.as_ref(), self.timeline.len(), self.images.len());
        Ok(())
    }

    /// Read a snapshot back. Timeline ranges are validated on the way in.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Snapshot asset ids that the library no longer has
    pub fn missing_assets(&self, library: &AssetLibrary) -> Vec<&AssetId> {
        self.images
            .iter()
            .map(|asset| &asset.id)
            .filter(|id| library.get(id).is_none())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptionStyle;
    use crate::timeline::types::{Animation, TimelineSegment, Transition};
    use tempfile::tempdir;

    fn sample() -> (VideoConfig, Timeline, AssetLibrary) {
        let mut library = AssetLibrary::with_seed(21);
        let id = library.add(AssetKind::Image, "beach.jpg", vec![9; 16]);
        library.add(AssetKind::Audio, "voice.wav", vec![0; 16]);

        let timeline = Timeline::new(vec![TimelineSegment {
            start_time: 0.0,
            end_time: 4.0,
            asset_id: id,
            caption: "Welcome".to_string(),
            animation: Animation::PanZoom,
            transition: Transition::Fade,
        }]).unwrap();

        let config = VideoConfig {
            caption_style: CaptionStyle::Bold,
            ..VideoConfig::default()
        };
        (config, timeline, library)
    }

    #[test]
    fn test_snapshot_lists_images_without_bytes() {
        let (config, timeline, library) = sample();
        let snapshot = ProjectSnapshot::capture(&config, &timeline, &library);
        let json = snapshot.to_json().unwrap();

        assert_eq!(snapshot.images.len(), 1);
        assert!(json.contains("\"type\": \"image\""));
        assert!(json.contains("\"name\": \"beach.jpg\""));
        assert!(json.contains("\"captionStyle\": \"Bold\""));
        assert!(json.contains("\"aspectRatio\": \"16:9\""));
        assert!(!json.contains("voice.wav"));
    }

    #[test]
    fn test_save_and_load() {
        let (config, timeline, library) = sample();
        let dir = tempdir().unwrap();
        let path = dir.path().join(SNAPSHOT_FILE_NAME);

        let snapshot = ProjectSnapshot::capture(&config, &timeline, &library);
        snapshot.save(&path).unwrap();
        let loaded = ProjectSnapshot::load(&path).unwrap();

        assert_eq!(loaded, snapshot);
        assert!(loaded.missing_assets(&library).is_empty());
        assert_eq!(loaded.missing_assets(&AssetLibrary::with_seed(1)).len(), 1);
    }
}
