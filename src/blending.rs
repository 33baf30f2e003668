//! Alpha blending math for overlay removal.
//!
//! The overlay is applied via forward alpha blending of a white logo:
//! `watermarked = alpha * 255 + (1 - alpha) * original`
//!
//! This module derives per-pixel alpha from a calibration capture and provides
//! the reverse operation to recover original pixels.

use crate::geometry::{Clipped, Rect};
use crate::pixel::{PixelBuffer, CHANNELS};

/// Alpha threshold: ignore pixels with negligible overlay effect (noise).
pub const ALPHA_THRESHOLD: f64 = 0.002;

/// Maximum alpha: clamp to avoid division by near-zero in reverse blending.
pub const MAX_ALPHA: f64 = 0.99;

/// Color of the overlay foreground (white) on every channel.
pub const LOGO_VALUE: f64 = 255.0;

/// Per-pixel overlay opacity in `[0, 1]`, row-major.
///
/// Values are stored as `f32`; blending arithmetic widens them to `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMap {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl AlphaMap {
    /// A map of the given size with no overlay contribution anywhere.
    #[must_use]
    pub fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            values: vec![0.0; width as usize * height as usize],
        }
    }

    /// Build a map from explicit values.
    ///
    /// Returns `None` if `values.len() != width * height`.
    #[must_use]
    pub fn from_values(width: u32, height: u32, values: Vec<f32>) -> Option<Self> {
        (values.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            values,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Flat row-major alpha values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Whether every value is below the processing threshold.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|&a| f64::from(a) < ALPHA_THRESHOLD)
    }
}

/// Calculate an alpha map from a calibration capture.
///
/// The capture shows the overlay rendered on a black background, so the alpha
/// at each pixel is `max(R, G, B) / 255.0`. The capture's own alpha channel is
/// ignored. The map has the capture's dimensions.
#[must_use]
pub fn calculate_alpha_map(capture: &PixelBuffer) -> AlphaMap {
    let values = capture
        .as_raw()
        .chunks_exact(CHANNELS)
        .map(max_channel_alpha)
        .collect();
    AlphaMap {
        width: capture.width(),
        height: capture.height(),
        values,
    }
}

/// Calculate a `size` x `size` alpha map, cropping or zero-padding the capture.
///
/// This matches drawing the capture onto a `size` x `size` canvas anchored at
/// the top-left. A missing capture, or one no more than 1px wide, yields an
/// all-zero map.
#[must_use]
pub fn fit_alpha_map(capture: Option<&PixelBuffer>, size: u32) -> AlphaMap {
    let Some(capture) = capture.filter(|c| is_valid_capture(c)) else {
        log::warn!("calibration capture for {size}x{size} overlay missing or invalid");
        return AlphaMap::zeroed(size, size);
    };

    if capture.width() == size && capture.height() == size {
        return calculate_alpha_map(capture);
    }

    log::debug!(
        "fitting {}x{} calibration capture to {size}x{size}",
        capture.width(),
        capture.height()
    );
    let mut map = AlphaMap::zeroed(size, size);
    let stride = size as usize;
    for y in 0..size.min(capture.height()) {
        for x in 0..size.min(capture.width()) {
            if let Some(px) = capture.pixel(x, y) {
                map.values[y as usize * stride + x as usize] = max_channel_alpha(&px);
            }
        }
    }
    map
}

/// Whether a capture is usable; width <= 1 marks a placeholder.
#[must_use]
pub fn is_valid_capture(capture: &PixelBuffer) -> bool {
    capture.width() > 1
}

#[allow(clippy::cast_possible_truncation)]
fn max_channel_alpha(px: &[u8]) -> f32 {
    let max_val = px[0].max(px[1]).max(px[2]);
    // Divide in f64, then narrow once.
    (f64::from(max_val) / 255.0) as f32
}

/// Derives an alpha map for one size class.
///
/// The engine calls this at most once per size class through its cache.
pub trait AlphaMapBuilder: Send + Sync {
    /// Build a `size` x `size` map from the capture, or a zero map without one.
    fn build(&self, capture: Option<&PixelBuffer>, size: u32) -> AlphaMap;
}

/// The standard builder: `max(R, G, B) / 255` per pixel via [`fit_alpha_map`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxChannelBuilder;

impl AlphaMapBuilder for MaxChannelBuilder {
    fn build(&self, capture: Option<&PixelBuffer>, size: u32) -> AlphaMap {
        fit_alpha_map(capture, size)
    }
}

/// Remove the overlay from an image using reverse alpha blending.
///
/// Applies `original = (watermarked - alpha * 255) / (1 - alpha)` to the RGB
/// channels in `f64`, rounding to the nearest integer and clamping to `[0, 255]`.
/// Alpha channels are left untouched. Pixels with alpha below 0.002 are left
/// unchanged and alpha is capped at 0.99.
///
/// The rectangle is clipped to the image; positions outside it are never
/// visited. The alpha map is indexed `row * rect.width + col` relative to the
/// rectangle's origin.
pub fn remove_watermark_alpha_blend(image: &mut PixelBuffer, rect: Rect, alpha_map: &AlphaMap) {
    let Some(clip) = rect.clip(image.width(), image.height()) else {
        log::debug!(
            "overlay {rect:?} lies outside {}x{} image",
            image.width(),
            image.height()
        );
        return;
    };

    for_each_overlay_pixel(image, rect, clip, alpha_map, |px, alpha| {
        // Skip pixels with negligible overlay effect
        if alpha < ALPHA_THRESHOLD {
            return;
        }

        // Clamp alpha to avoid division instability
        let alpha = alpha.min(MAX_ALPHA);
        let inv_alpha = 1.0 - alpha;

        for ch in px.iter_mut().take(3) {
            let watermarked = f64::from(*ch);
            let original = (watermarked - alpha * LOGO_VALUE) / inv_alpha;
            *ch = to_channel(original);
        }
    });
}

/// Composite the white overlay onto an image: the forward operation.
///
/// `watermarked = round(alpha * 255 + (1 - alpha) * original)` on RGB, over the
/// clipped rectangle. Used to simulate overlaid images.
pub fn apply_watermark(image: &mut PixelBuffer, rect: Rect, alpha_map: &AlphaMap) {
    let Some(clip) = rect.clip(image.width(), image.height()) else {
        return;
    };

    for_each_overlay_pixel(image, rect, clip, alpha_map, |px, alpha| {
        let alpha = alpha.clamp(0.0, 1.0);
        for ch in px.iter_mut().take(3) {
            let original = f64::from(*ch);
            *ch = to_channel(alpha * LOGO_VALUE + (1.0 - alpha) * original);
        }
    });
}

fn for_each_overlay_pixel(
    image: &mut PixelBuffer,
    rect: Rect,
    clip: Clipped,
    alpha_map: &AlphaMap,
    mut f: impl FnMut(&mut [u8], f64),
) {
    for iy in clip.y0..clip.y1 {
        for ix in clip.x0..clip.x1 {
            // Offsets are non-negative and below rect.width/height after clipping.
            let row = i64::from(iy) - rect.y;
            let col = i64::from(ix) - rect.x;
            let Ok(alpha_idx) = usize::try_from(row * i64::from(rect.width) + col) else {
                continue;
            };
            let Some(&alpha) = alpha_map.values.get(alpha_idx) else {
                continue;
            };
            if let Some(px) = image.pixel_mut(ix, iy) {
                f(px, f64::from(alpha));
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
