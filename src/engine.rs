//! Core overlay removal engine.

use std::sync::Arc;

use crate::blending::{self, AlphaMap, AlphaMapBuilder, MaxChannelBuilder};
use crate::cache::AlphaMapCache;
use crate::calibration::{Calibration, CalibrationSource};
use crate::error::Result;
use crate::geometry::{GeometryConfig, Rect, SizeClass};
use crate::pixel::PixelBuffer;

/// Options controlling per-run processing behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Force a specific size class instead of selecting by dimensions.
    pub force_size: Option<SizeClass>,
    /// Enable verbose logging.
    pub verbose: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// The overlay engine holding calibration captures and their alpha maps.
///
/// Create once and reuse for multiple images. Alpha maps are built lazily on
/// first use of each size class and cached until the calibration changes.
/// The engine is `Sync`: any number of threads may call
/// [`WatermarkEngine::remove`] on their own buffers at once.
pub struct WatermarkEngine {
    calibration: Calibration,
    geometry: GeometryConfig,
    cache: AlphaMapCache,
    builder: Arc<dyn AlphaMapBuilder>,
}

impl WatermarkEngine {
    /// Create an engine with the default layout and alpha map builder.
    #[must_use]
    pub fn new(calibration: Calibration) -> Self {
        Self::with_builder(calibration, GeometryConfig::default(), Arc::new(MaxChannelBuilder))
    }

    /// Create an engine from whatever a calibration source provides.
    #[must_use]
    pub fn from_source(source: &dyn CalibrationSource) -> Self {
        Self::new(Calibration::load_from(source))
    }

    /// Create an engine with a custom layout table and alpha map builder.
    #[must_use]
    pub fn with_builder(
        calibration: Calibration,
        geometry: GeometryConfig,
        builder: Arc<dyn AlphaMapBuilder>,
    ) -> Self {
        if !calibration.is_complete() {
            log::warn!("calibration captures incomplete; affected images pass through unchanged");
        }
        Self {
            calibration,
            geometry,
            cache: AlphaMapCache::new(),
            builder,
        }
    }

    /// Replace the layout table. Cached alpha maps are dropped.
    #[must_use]
    pub fn with_geometry(mut self, geometry: GeometryConfig) -> Self {
        self.geometry = geometry;
        self.cache = AlphaMapCache::new();
        self
    }

    /// Whether both size classes have usable calibration captures.
    #[must_use]
    pub fn has_assets(&self) -> bool {
        self.calibration.is_complete()
    }

    /// The current calibration captures.
    #[must_use]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// The layout table in use.
    #[must_use]
    pub fn geometry(&self) -> &GeometryConfig {
        &self.geometry
    }

    /// Swap in new calibration captures, invalidating every cached alpha map.
    pub fn set_calibration(&mut self, calibration: Calibration) {
        log::debug!("calibration replaced; clearing alpha map cache");
        self.calibration = calibration;
        self.cache = AlphaMapCache::new();
    }

    /// Determine the size class for an image of the given dimensions.
    #[must_use]
    pub fn size_class_for(&self, width: u32, height: u32) -> SizeClass {
        self.geometry.size_class_for(width, height)
    }

    /// Resolve size class and overlay rectangle, honoring `force_size`.
    #[must_use]
    pub fn resolve(
        &self,
        width: u32,
        height: u32,
        force_size: Option<SizeClass>,
    ) -> (SizeClass, Rect) {
        match force_size {
            Some(class) => (class, self.geometry.rect_for(class, width, height)),
            None => self.geometry.resolve(width, height),
        }
    }

    /// The alpha map for `class`, built on first request.
    #[must_use]
    pub fn alpha_map(&self, class: SizeClass) -> Arc<AlphaMap> {
        let size = self.geometry.class_config(class).logo_size;
        self.cache.get_or_build(
            class,
            size,
            self.calibration.capture(class),
            self.builder.as_ref(),
        )
    }

    /// Remove the overlay from an image in-place.
    ///
    /// Applies reverse alpha blending at the expected overlay position. The
    /// `force_size` parameter overrides automatic size selection. Returns the
    /// size class that was used.
    pub fn remove(&self, image: &mut PixelBuffer, force_size: Option<SizeClass>) -> SizeClass {
        let (class, rect) = self.resolve(image.width(), image.height(), force_size);
        if !rect.fits_within(image.width(), image.height()) {
            log::debug!(
                "overlay {rect:?} exceeds {}x{} image; clipping",
                image.width(),
                image.height()
            );
        }
        let alpha_map = self.alpha_map(class);
        blending::remove_watermark_alpha_blend(image, rect, &alpha_map);
        class
    }

    /// Remove the overlay from an owned buffer and hand it back.
    #[must_use]
    pub fn remove_watermark(&self, mut image: PixelBuffer) -> PixelBuffer {
        self.remove(&mut image, None);
        image
    }

    /// Remove the overlay from raw RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidInput`] for a zero-dimension buffer or a
    /// byte length other than `width * height * 4`.
    pub fn remove_from_raw(&self, width: u32, height: u32, rgba: Vec<u8>) -> Result<Vec<u8>> {
        let image = PixelBuffer::from_raw(width, height, rgba)?;
        Ok(self.remove_watermark(image).into_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn calibration() -> Calibration {
        Calibration::new(
            Some(PixelBuffer::filled(48, 48, [128, 128, 128, 255]).unwrap()),
            Some(PixelBuffer::filled(96, 96, [64, 64, 64, 255]).unwrap()),
        )
    }

    #[test]
    fn resolve_honors_forced_size() {
        let engine = WatermarkEngine::new(Calibration::default());
        let (class, rect) = engine.resolve(800, 600, Some(SizeClass::Large));
        assert_eq!(class, SizeClass::Large);
        assert_eq!((rect.x, rect.y, rect.width), (800 - 160, 600 - 160, 96));

        assert_eq!(engine.resolve(800, 600, None).0, SizeClass::Small);
    }

    #[test]
    fn has_assets_tracks_calibration() {
        let mut engine = WatermarkEngine::new(Calibration::default());
        assert!(!engine.has_assets());
        engine.set_calibration(calibration());
        assert!(engine.has_assets());
    }

    #[test]
    fn set_calibration_invalidates_cached_maps() {
        let mut engine = WatermarkEngine::new(Calibration::default());
        assert!(engine.alpha_map(SizeClass::Small).is_blank());

        engine.set_calibration(calibration());
        let map = engine.alpha_map(SizeClass::Small);
        assert!((map.values()[0] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn alpha_map_size_follows_layout() {
        let mut geometry = GeometryConfig::default();
        geometry.small.logo_size = 40;
        let engine = WatermarkEngine::new(calibration()).with_geometry(geometry);
        let map = engine.alpha_map(SizeClass::Small);
        assert_eq!((map.width(), map.height()), (40, 40));
    }

    #[test]
    fn remove_from_raw_rejects_bad_buffers() {
        let engine = WatermarkEngine::new(calibration());
        assert!(matches!(
            engine.remove_from_raw(0, 0, Vec::new()),
            Err(Error::InvalidInput { .. })
        ));
        assert!(engine.remove_from_raw(10, 10, vec![0; 10]).is_err());
    }

    #[test]
    fn missing_calibration_passes_image_through() {
        let engine = WatermarkEngine::new(Calibration::default());
        let image = PixelBuffer::filled(300, 200, [250, 240, 230, 255]).unwrap();
        let out = engine.remove_watermark(image.clone());
        assert_eq!(out, image);
    }
}
