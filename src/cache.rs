//! Per-size-class memoization of built alpha maps.

use std::sync::{Arc, OnceLock};

use crate::blending::{AlphaMap, AlphaMapBuilder};
use crate::geometry::SizeClass;
use crate::pixel::PixelBuffer;

/// One lazily built alpha map per size class.
///
/// Each slot is a [`OnceLock`], so concurrent callers asking for the same
/// uncached class block on a single build instead of racing. Entries are never
/// evicted; replacing the calibration means replacing the cache.
#[derive(Debug, Default)]
pub struct AlphaMapCache {
    slots: [OnceLock<Arc<AlphaMap>>; 2],
}

impl AlphaMapCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached map for `class`, building it with `builder` on first use.
    pub fn get_or_build(
        &self,
        class: SizeClass,
        size: u32,
        capture: Option<&PixelBuffer>,
        builder: &dyn AlphaMapBuilder,
    ) -> Arc<AlphaMap> {
        let map = self.slots[class.index()].get_or_init(|| {
            log::debug!("building {size}x{size} alpha map for {class:?}");
            Arc::new(builder.build(capture, size))
        });
        Arc::clone(map)
    }

    /// The cached map for `class`, if it has been built.
    #[must_use]
    pub fn get(&self, class: SizeClass) -> Option<Arc<AlphaMap>> {
        self.slots[class.index()].get().cloned()
    }
}
