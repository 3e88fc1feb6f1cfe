//! Pixel ranges of a cache that background decoding has made stale

use std::sync::Mutex;

use super::lock;

/// Pixel columns `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRegion {
    pub start: usize,
    pub end: usize,
}

impl InvalidRegion {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Overlapping or within one column of `other`
    fn touches(&self, other: &InvalidRegion) -> bool {
        self.start <= other.end + 1 && self.end + 1 >= other.start
    }

    fn absorb(&mut self, other: &InvalidRegion) {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
    }
}

/// Set of disjoint, non-adjacent invalid regions guarded by one lock
///
/// Regions are kept in arrival order (newest first) rather than sorted. The
/// merge pass after an insert only compares index-neighbours and stops at the
/// first region starting past the inserted range.
#[derive(Debug, Default)]
pub struct InvalidRegions {
    regions: Mutex<Vec<InvalidRegion>>,
}

impl InvalidRegions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.regions).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.regions).is_empty()
    }

    /// Copy of the current regions in container order
    pub fn snapshot(&self) -> Vec<InvalidRegion> {
        lock(&self.regions).clone()
    }

    /// Add `[start, end)`, merging with any region it touches or abuts
    pub fn insert(&self, start: usize, end: usize) {
        let added = InvalidRegion::new(start, end);
        let mut regions = lock(&self.regions);

        match regions.iter_mut().find(|region| region.touches(&added)) {
            Some(region) => region.absorb(&added),
            None => regions.insert(0, added),
        }

        let mut i = 1;
        while i < regions.len() {
            let prev = regions[i - 1];
            let current = if regions[i].touches(&prev) {
                regions[i].absorb(&prev);
                regions.remove(i - 1);
                regions[i - 1]
            } else {
                let current = regions[i];
                i += 1;
                current
            };
            if current.start > added.end {
                break;
            }
        }
    }

    /// Run `recompute` on every region, clearing the set only if all succeed
    ///
    /// The lock is held throughout, so an insert from another thread lands
    /// either before the drain (and is recomputed) or after it.
    pub fn drain_with<E>(
        &self,
        mut recompute: impl FnMut(InvalidRegion) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut regions = lock(&self.regions);
        for &region in regions.iter() {
            recompute(region)?;
        }
        regions.clear();
        Ok(())
    }

    pub fn clear(&self) {
        lock(&self.regions).clear();
    }
}
