use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tracing::{debug, warn};

use crate::assets::types::{AssetId, AssetLibrary};
use crate::error::AssetError;

/// Result of looking an asset up in the cache
#[derive(Debug, Clone)]
pub enum AssetLookup {
    Ready(Arc<RgbaImage>),
    Pending,
    Unavailable,
}

impl AssetLookup {
    pub fn raster(&self) -> Option<&Arc<RgbaImage>> {
        match self {
            AssetLookup::Ready(raster) => Some(raster),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AssetLookup::Pending)
    }
}

#[derive(Debug)]
enum Slot {
    Pending,
    Ready(Arc<RgbaImage>),
    Unavailable,
}

struct Decoded {
    id: AssetId,
    result: std::result::Result<RgbaImage, AssetError>,
}

/// Lazily decoded rasters keyed by asset id
///
/// Decoding runs on the shared rayon pool. Finished decodes are collected
/// by [`pump`](Self::pump), which every [`get_or_load`](Self::get_or_load)
/// call does first. Nothing is evicted except through
/// [`evict`](Self::evict) when an asset is removed.
pub struct AssetCache {
    slots: HashMap<AssetId, Slot>,
    tx: Sender<Decoded>,
    rx: Receiver<Decoded>,
    pool: Arc<rayon::ThreadPool>,
}

impl AssetCache {
    pub fn new(pool: Arc<rayon::ThreadPool>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            slots: HashMap::new(),
            tx,
            rx,
            pool,
        }
    }

    /// Return the raster if decoded, starting the decode on first request
    pub fn get_or_load(&mut self, library: &AssetLibrary, id: &str) -> AssetLookup {
        self.pump();

        if self.slots.contains_key(id) {
            return self.peek(id);
        }

        let Some(item) = library.get(id) else {
            debug!("Segment references missing asset {}", id);
            return AssetLookup::Unavailable;
        };

        let bytes = item.bytes();
        let id = item.id.clone();
        let tx = self.tx.clone();
        self.slots.insert(id.clone(), Slot::Pending);

        debug!("Decoding asset {} ({} bytes)", id, bytes.len());
        self.pool.spawn(move || {
            let result = image::load_from_memory(&bytes)
                .map(|image| image.to_rgba8())
                .map_err(|e| AssetError::DecodeFailed {
                    id: id.clone(),
                    reason: e.to_string(),
                });
            // The cache may be gone by the time the decode finishes
            let _ = tx.send(Decoded { id, result });
        });

        AssetLookup::Pending
    }

    /// Side-effect free lookup used by the compositor
    pub fn peek(&self, id: &str) -> AssetLookup {
        match self.slots.get(id) {
            Some(Slot::Ready(raster)) => AssetLookup::Ready(Arc::clone(raster)),
            Some(Slot::Pending) => AssetLookup::Pending,
            Some(Slot::Unavailable) | None => AssetLookup::Unavailable,
        }
    }

    /// Collect finished decodes. Returns how many slots were settled.
    pub fn pump(&mut self) -> usize {
        let mut settled = 0;
        while let Ok(decoded) = self.rx.try_recv() {
            if self.settle(decoded) {
                settled += 1;
            }
        }
        settled
    }

    fn settle(&mut self, decoded: Decoded) -> bool {
        // Removed while decoding
        let Some(slot) = self.slots.get_mut(&decoded.id) else {
            return false;
        };
        if !matches!(slot, Slot::Pending) {
            return false;
        }

        *slot = match decoded.result {
            Ok(raster) => {
                debug!("Asset {} ready ({}x{})", decoded.id, raster.width(), raster.height());
                Slot::Ready(Arc::new(raster))
            }
            Err(e) => {
                warn!("Asset {} unavailable: {}", decoded.id, e);
                Slot::Unavailable
            }
        };
        true
    }

    /// Block until no decode is pending or the timeout elapses.
    /// Returns true when everything requested has settled.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.pump();

        while self.pending_count() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(decoded) => {
                    self.settle(decoded);
                }
                Err(RecvTimeoutError::Timeout) => return false,
                // We hold a sender ourselves, so this cannot happen
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    /// Drop the cached raster of a removed asset
    pub fn evict(&mut self, id: &str) {
        if self.slots.remove(id).is_some() {
            debug!("Evicted asset {}", id);
        }
    }

    pub fn ready_count(&self) -> usize {
        self.slots.values().filter(|slot| matches!(slot, Slot::Ready(_))).count()
    }

    pub fn pending_count(&self) -> usize {
        self.slots.values().filter(|slot| matches!(slot, Slot::Pending)).count()
    }

    /// Whether at least one of the given ids has a decoded raster
    pub fn any_ready<'a, I: IntoIterator<Item = &'a AssetId>>(&self, ids: I) -> bool {
        ids.into_iter().any(|id| matches!(self.slots.get(id), Some(Slot::Ready(_))))
    }

    /// Put an already decoded raster in the cache
    pub fn insert_ready<S: Into<AssetId>>(&mut self, id: S, raster: RgbaImage) {
        self.slots.insert(id.into(), Slot::Ready(Arc::new(raster)));
    }
}
