//! Image preload cache - LRU map fed by a priority queue
//!
//! Keeps decoded images for files near the browser selection so that
//! stepping through a directory feels instant. Completely independent of
//! the video pipeline: no shared state, all work happens on the main
//! thread one image per idle step.

use image::DynamicImage;
use log::trace;
use lru::LruCache;
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// One queued preload, ordered so the smallest distance pops first
#[derive(Debug, PartialEq, Eq)]
struct Pending {
    /// Distance in browser rows from the current selection
    distance: usize,
    path: PathBuf,
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; invert so nearer files win
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| other.path.cmp(&self.path))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

pub struct PreloadCache {
    cache: LruCache<PathBuf, DynamicImage>,
    pending: BinaryHeap<Pending>,
}

impl PreloadCache {
    pub fn new(capacity: usize) -> Self {
        PreloadCache {
            cache: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN)),
            pending: BinaryHeap::new(),
        }
    }

    /// Fetch a cached image, loading it synchronously on a miss
    pub fn get_or_load(&mut self, path: &Path) -> Option<DynamicImage> {
        if let Some(img) = self.cache.get(path) {
            return Some(img.clone());
        }
        let img = image::open(path).ok()?;
        self.cache.put(path.to_path_buf(), img.clone());
        Some(img)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.cache.contains(path)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Replace the pending queue with image paths ordered by distance from
    /// the current selection
    pub fn schedule<'a, I>(&mut self, around_selection: I)
    where
        I: IntoIterator<Item = (usize, &'a Path)>,
    {
        self.pending.clear();
        for (distance, path) in around_selection {
            if !self.cache.contains(path) {
                self.pending.push(Pending {
                    distance,
                    path: path.to_path_buf(),
                });
            }
        }
    }

    /// Load at most one pending image; returns false when the queue is
    /// empty. Called from idle iterations of the event loop.
    pub fn step(&mut self) -> bool {
        let Some(next) = self.pending.pop() else {
            return false;
        };
        if self.cache.contains(&next.path) {
            return !self.pending.is_empty();
        }
        match image::open(&next.path) {
            Ok(img) => {
                trace!("preloaded {}", next.path.display());
                self.cache.put(next.path, img);
            }
            Err(e) => trace!("preload skipped {}: {}", next.path.display(), e),
        }
        !self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
        self.pending.clear();
    }
}
