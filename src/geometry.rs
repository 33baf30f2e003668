//! Overlay placement: size classes, the layout table, and rectangle resolution.
//!
//! The overlay is anchored to the bottom-right corner. Its size class is picked
//! from the image dimensions: both sides above the threshold selects
//! [`SizeClass::Large`], anything else [`SizeClass::Small`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Overlay size classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    /// 48x48 overlay, 32px margins (images where either dimension <= 1024).
    Small,
    /// 96x96 overlay, 64px margins (images where both dimensions > 1024).
    Large,
}

impl SizeClass {
    /// Both size classes, small first.
    pub const ALL: [SizeClass; 2] = [SizeClass::Small, SizeClass::Large];

    /// Stable index, used to key per-class storage.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            SizeClass::Small => 0,
            SizeClass::Large => 1,
        }
    }

    /// File name of the calibration capture for this class.
    #[must_use]
    pub fn capture_file_name(self) -> &'static str {
        match self {
            SizeClass::Small => "bg_48.png",
            SizeClass::Large => "bg_96.png",
        }
    }
}

/// Largest accepted overlay side length.
pub const MAX_LOGO_SIZE: u32 = 4096;

/// Largest accepted margin.
pub const MAX_MARGIN: u32 = 65_536;

/// Logo size and margins of one size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeClassConfig {
    /// Side length of the square overlay in pixels.
    pub logo_size: u32,
    /// Gap between the overlay and the right image edge.
    pub margin_right: u32,
    /// Gap between the overlay and the bottom image edge.
    pub margin_bottom: u32,
}

/// Selection threshold plus the two size class entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeometryConfig {
    /// Both dimensions must exceed this for the large class.
    pub threshold: u32,
    /// Entry used below the threshold.
    pub small: SizeClassConfig,
    /// Entry used above the threshold.
    pub large: SizeClassConfig,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            threshold: 1024,
            small: SizeClassConfig {
                logo_size: 48,
                margin_right: 32,
                margin_bottom: 32,
            },
            large: SizeClassConfig {
                logo_size: 96,
                margin_right: 64,
                margin_bottom: 64,
            },
        }
    }
}

impl GeometryConfig {
    /// Load a layout table from a JSON file.
    ///
    /// Missing keys fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Config`] if it
    /// is not valid JSON, and [`Error::InvalidConfig`] if a logo size is zero or
    /// a logo size or margin exceeds [`MAX_LOGO_SIZE`] or [`MAX_MARGIN`].
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate a layout table from JSON text.
    ///
    /// # Errors
    ///
    /// See [`GeometryConfig::from_json_file`].
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that both entries describe a non-empty overlay of bounded size.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the offending class.
    pub fn validate(&self) -> Result<()> {
        for class in SizeClass::ALL {
            let cfg = self.class_config(class);
            if cfg.logo_size == 0 || cfg.logo_size > MAX_LOGO_SIZE {
                return Err(Error::InvalidConfig(format!(
                    "{class:?} logo size must be in 1..={MAX_LOGO_SIZE}, got {}",
                    cfg.logo_size
                )));
            }
            if cfg.margin_right > MAX_MARGIN || cfg.margin_bottom > MAX_MARGIN {
                return Err(Error::InvalidConfig(format!(
                    "{class:?} margins must not exceed {MAX_MARGIN}"
                )));
            }
        }
        Ok(())
    }

    /// The entry for a size class.
    #[must_use]
    pub fn class_config(&self, class: SizeClass) -> SizeClassConfig {
        match class {
            SizeClass::Small => self.small,
            SizeClass::Large => self.large,
        }
    }

    /// Pick the size class for an image of the given dimensions.
    ///
    /// - **Large**: width AND height > threshold
    /// - **Small**: otherwise (including exactly threshold x threshold)
    #[must_use]
    pub fn size_class_for(&self, width: u32, height: u32) -> SizeClass {
        if width > self.threshold && height > self.threshold {
            SizeClass::Large
        } else {
            SizeClass::Small
        }
    }

    /// Overlay rectangle of `class` on a `width` x `height` image.
    ///
    /// No clamping: on images smaller than margin + logo the origin goes negative.
    #[must_use]
    pub fn rect_for(&self, class: SizeClass, width: u32, height: u32) -> Rect {
        let cfg = self.class_config(class);
        Rect {
            x: i64::from(width) - i64::from(cfg.margin_right) - i64::from(cfg.logo_size),
            y: i64::from(height) - i64::from(cfg.margin_bottom) - i64::from(cfg.logo_size),
            width: cfg.logo_size,
            height: cfg.logo_size,
        }
    }

    /// Resolve both the size class and its rectangle for an image.
    #[must_use]
    pub fn resolve(&self, width: u32, height: u32) -> (SizeClass, Rect) {
        let class = self.size_class_for(width, height);
        let rect = self.rect_for(class, width, height);
        log::debug!("{width}x{height} -> {class:?} overlay at {rect:?}");
        (class, rect)
    }
}

/// An overlay rectangle in target-image coordinates. The origin may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge.
    pub x: i64,
    /// Top edge.
    pub y: i64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// The part of a [`Rect`] that lies inside an image, as half-open pixel ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clipped {
    /// First image column inside the rectangle.
    pub x0: u32,
    /// First image row inside the rectangle.
    pub y0: u32,
    /// One past the last image column.
    pub x1: u32,
    /// One past the last image row.
    pub y1: u32,
}

impl Rect {
    /// Intersect with a `width` x `height` image, or `None` if nothing overlaps.
    #[must_use]
    pub fn clip(&self, width: u32, height: u32) -> Option<Clipped> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + i64::from(self.width)).min(i64::from(width));
        let y1 = (self.y + i64::from(self.height)).min(i64::from(height));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        // All four lie in [0, u32::MAX] after the min/max above.
        Some(Clipped {
            x0: u32::try_from(x0).ok()?,
            y0: u32::try_from(y0).ok()?,
            x1: u32::try_from(x1).ok()?,
            y1: u32::try_from(y1).ok()?,
        })
    }

    /// Whether the rectangle lies entirely inside the image.
    #[must_use]
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x + i64::from(self.width) <= i64::from(width)
            && self.y + i64::from(self.height) <= i64::from(height)
    }
}
