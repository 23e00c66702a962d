//! Content-addressed asset cache.
//!
//! Maps the content hash of a mesh to the target-scene asset built from it
//! and counts the elements referencing that asset. Identical meshes are
//! uploaded once; the asset is released when its last reference goes.

use rustc_hash::FxHashMap;

use crate::target::AssetHandle;

#[derive(Debug, Clone, Copy)]
struct AssetEntry {
    handle: AssetHandle,
    ref_count: u32,
}

/// Result of [`AssetCache::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    Built(AssetHandle),
    Reused(AssetHandle),
}

impl Acquired {
    #[inline]
    #[must_use]
    pub fn handle(self) -> AssetHandle {
        match self {
            Acquired::Built(h) | Acquired::Reused(h) => h,
        }
    }
}

#[derive(Debug, Default)]
pub struct AssetCache {
    entries: FxHashMap<u128, AssetEntry>,
    by_handle: FxHashMap<AssetHandle, u128>,
}

impl AssetCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the asset cached for `content_hash`, adding one reference, or
    /// builds it with `build` and caches it with one reference.
    pub fn acquire(&mut self, content_hash: u128, build: impl FnOnce() -> AssetHandle) -> Acquired {
        if let Some(entry) = self.entries.get_mut(&content_hash) {
            entry.ref_count += 1;
            return Acquired::Reused(entry.handle);
        }

        let handle = build();
        self.entries.insert(
            content_hash,
            AssetEntry {
                handle,
                ref_count: 1,
            },
        );
        self.by_handle.insert(handle, content_hash);
        Acquired::Built(handle)
    }

    /// Drops one reference. Returns the handle when that was the last one;
    /// the caller then removes the asset from the target scene.
    ///
    /// Releasing an unknown handle is a bookkeeping bug.
    pub fn release(&mut self, handle: AssetHandle) -> Option<AssetHandle> {
        let Some(&hash) = self.by_handle.get(&handle) else {
            log::error!("Releasing an asset the cache does not own");
            debug_assert!(false, "asset refcount underflow");
            return None;
        };
        let entry = self.entries.get_mut(&hash)?;
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return None;
        }
        self.entries.remove(&hash);
        self.by_handle.remove(&handle);
        Some(handle)
    }

    #[must_use]
    pub fn ref_count(&self, handle: AssetHandle) -> u32 {
        self.by_handle
            .get(&handle)
            .and_then(|hash| self.entries.get(hash))
            .map_or(0, |e| e.ref_count)
    }

    #[must_use]
    pub fn handle_for(&self, content_hash: u128) -> Option<AssetHandle> {
        self.entries.get(&content_hash).map(|e| e.handle)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
