use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AssetError, Result};

/// Opaque asset identifier
pub type AssetId = String;

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_LENGTH: usize = 9;

/// What an uploaded asset is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
    Music,
}

type LiveSet = Mutex<HashSet<String>>;

/// Registry of resource handles that are still alive
///
/// Every asset gets an `asset://` handle when it is added. The handle is
/// revoked when its [`AssetItem`] is dropped, so a non-zero
/// [`live_count`](Self::live_count) after all assets are gone means
/// something is still holding on to an item.
#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    live: Arc<LiveSet>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint(&self, id: &str) -> ResourceUrl {
        let url = format!("asset://{}", id);
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.clone());
        ResourceUrl {
            url,
            table: Arc::downgrade(&self.live),
        }
    }

    /// Number of handles not yet revoked
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.live
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(url)
    }
}

/// Revocable handle to an asset's source bytes
#[derive(Debug)]
pub struct ResourceUrl {
    url: String,
    table: Weak<LiveSet>,
}

impl ResourceUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ResourceUrl {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            if let Ok(mut live) = table.lock() {
                live.remove(&self.url);
                debug!("Revoked resource {}", self.url);
            }
        }
    }
}

/// An uploaded asset. Owns its source bytes and resource handle.
#[derive(Debug)]
pub struct AssetItem {
    pub id: AssetId,
    pub kind: AssetKind,
    pub original_file_name: String,
    bytes: Arc<[u8]>,
    resource: ResourceUrl,
}

impl AssetItem {
    /// Shared view of the encoded source bytes
    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn resource_url(&self) -> &str {
        self.resource.as_str()
    }
}

/// All assets of a session, in upload order
#[derive(Debug)]
pub struct AssetLibrary {
    items: Vec<AssetItem>,
    resources: ResourceTable,
    rng: SmallRng,
}

impl AssetLibrary {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    /// Library with reproducible identifiers
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            items: Vec::new(),
            resources: ResourceTable::new(),
            rng,
        }
    }

    fn next_id(&mut self) -> AssetId {
        loop {
            let id: String = (0..ID_LENGTH)
                .map(|_| ID_ALPHABET[self.rng.gen_range(0..ID_ALPHABET.len())] as char)
                .collect();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    /// Add an asset from encoded bytes and return its new id
    pub fn add<S: Into<String>>(&mut self, kind: AssetKind, original_file_name: S, bytes: Vec<u8>) -> AssetId {
        let id = self.next_id();
        let resource = self.resources.mint(&id);
        let original_file_name = original_file_name.into();

        debug!("Added {:?} asset {} ({}, {} bytes)", kind, id, original_file_name, bytes.len());

        self.items.push(AssetItem {
            id: id.clone(),
            kind,
            original_file_name,
            bytes: bytes.into(),
            resource,
        });
        id
    }

    /// Read a file from disk and add it as an asset
    pub fn add_file<P: AsRef<Path>>(&mut self, kind: AssetKind, path: P) -> Result<AssetId> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|_| AssetError::ReadFailed { path: path.display().to_string() })?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unnamed")
            .to_string();
        Ok(self.add(kind, name, bytes))
    }

    /// Remove an asset, releasing its resource handle
    pub fn remove(&mut self, id: &str) -> Option<AssetItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&AssetItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Image assets in upload order
    pub fn images(&self) -> impl Iterator<Item = &AssetItem> {
        self.items.iter().filter(|item| item.kind == AssetKind::Image)
    }

    pub fn image_ids(&self) -> Vec<AssetId> {
        self.images().map(|item| item.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }
}

impl Default for AssetLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_base36() {
        let mut library = AssetLibrary::with_seed(7);
        let id = library.add(AssetKind::Image, "a.png", vec![1, 2, 3]);

        assert_eq!(id.len(), ID_LENGTH);
        assert!(id.bytes().all(|b| ID_ALPHABET.contains(&b)));
    }

    #[test]
    fn test_remove_revokes_resource() {
        let mut library = AssetLibrary::with_seed(1);
        let first = library.add(AssetKind::Image, "a.png", vec![0; 4]);
        let second = library.add(AssetKind::Image, "b.png", vec![0; 4]);
        let url = library.get(&first).unwrap().resource_url().to_string();

        assert_eq!(library.resources().live_count(), 2);
        assert!(library.resources().is_live(&url));

        let removed = library.remove(&first);
        assert!(removed.is_some());
        // Still owned by the caller
        assert!(library.resources().is_live(&url));

        drop(removed);
        assert!(!library.resources().is_live(&url));
        assert_eq!(library.resources().live_count(), 1);
        assert_eq!(library.image_ids(), vec![second]);
    }

    #[test]
    fn test_images_excludes_audio() {
        let mut library = AssetLibrary::with_seed(3);
        library.add(AssetKind::Audio, "voice.wav", vec![]);
        let image = library.add(AssetKind::Image, "shot.jpg", vec![]);
        library.add(AssetKind::Music, "bed.mp3", vec![]);

        assert_eq!(library.image_ids(), vec![image]);
        assert_eq!(library.len(), 3);
    }

    #[test]
    fn test_add_missing_file() {
        let mut library = AssetLibrary::new();
        let result = library.add_file(AssetKind::Image, "/no/such/image.png");
        assert!(result.is_err());
        assert!(library.is_empty());
    }
}
