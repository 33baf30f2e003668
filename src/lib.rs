//! Remove the visible Gemini overlay via reverse alpha blending.
//!
//! Gemini composites a semi-transparent white star logo into the bottom-right
//! corner of generated images, at one of two sizes. Given a calibration
//! capture of that logo on a black background, this crate derives the per-pixel
//! opacity and inverts the blend to recover the original pixels.
//!
//! # Quick Start
//!
//! ```no_run
//! use gemini_unblend::{DirectorySource, WatermarkEngine};
//!
//! let engine = WatermarkEngine::from_source(&DirectorySource::new("assets"));
//! let img = gemini_unblend::load_image("photo.png".as_ref()).unwrap();
//! let cleaned = engine.remove_watermark(img);
//! gemini_unblend::save_image(&cleaned, "clean_photo.png".as_ref()).unwrap();
//! ```
//!
//! # Calibration
//!
//! Captures are injected through [`CalibrationSource`]. A missing capture is
//! not an error: the engine builds an all-zero alpha map and leaves images of
//! that size class untouched.
//!
//! ```no_run
//! use gemini_unblend::{Calibration, CalibrationSource, DirectorySource, WatermarkEngine};
//!
//! let user = DirectorySource::new("/home/me/.config/gemini-unblend");
//! let bundled = DirectorySource::new("assets");
//! let engine = WatermarkEngine::new(Calibration::load_from(&user.or(bundled)));
//! if !engine.has_assets() {
//!     eprintln!("calibration captures missing");
//! }
//! ```

#![deny(missing_docs)]

mod batch;
pub mod blending;
pub mod cache;
pub mod calibration;
mod engine;
pub mod error;
pub mod geometry;
pub mod pixel;
pub mod sink;

pub use batch::{
    collect_images, default_output_path, is_supported_image, load_image, output_name, save_image,
    ProcessResult,
};
pub use blending::{AlphaMap, AlphaMapBuilder, MaxChannelBuilder};
pub use calibration::{Calibration, CalibrationSource, DirectorySource, Fallback};
pub use engine::{ProcessOptions, WatermarkEngine};
pub use error::{Error, Result};
pub use geometry::{GeometryConfig, Rect, SizeClass, SizeClassConfig};
pub use pixel::PixelBuffer;
pub use sink::{DirectorySink, ResultSink, ZipSink, DEFAULT_ARCHIVE_NAME};
