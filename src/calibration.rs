//! Calibration captures and the sources they are loaded from.
//!
//! A calibration capture is the overlay rendered alone on a black background.
//! Sources never fail: a missing or unreadable capture is reported as `None`
//! and the engine degrades to a no-op for that size class.

use std::path::{Path, PathBuf};

use crate::blending::is_valid_capture;
use crate::error::{Error, Result};
use crate::geometry::SizeClass;
use crate::pixel::PixelBuffer;

/// Anything that can supply a calibration capture per size class.
pub trait CalibrationSource {
    /// The capture for `class`, or `None` if this source has none.
    fn load(&self, class: SizeClass) -> Option<PixelBuffer>;

    /// Try this source first, then `other` for any class it lacks.
    fn or<B: CalibrationSource>(self, other: B) -> Fallback<Self, B>
    where
        Self: Sized,
    {
        Fallback {
            primary: self,
            secondary: other,
        }
    }
}

/// The captures held in memory, one optional buffer per size class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Calibration {
    /// Capture for [`SizeClass::Small`].
    pub small: Option<PixelBuffer>,
    /// Capture for [`SizeClass::Large`].
    pub large: Option<PixelBuffer>,
}

impl Calibration {
    /// Build from explicit captures.
    #[must_use]
    pub fn new(small: Option<PixelBuffer>, large: Option<PixelBuffer>) -> Self {
        Self { small, large }
    }

    /// Pull both captures from a source.
    #[must_use]
    pub fn load_from(source: &dyn CalibrationSource) -> Self {
        Self {
            small: source.load(SizeClass::Small),
            large: source.load(SizeClass::Large),
        }
    }

    /// The capture for `class`.
    #[must_use]
    pub fn capture(&self, class: SizeClass) -> Option<&PixelBuffer> {
        match class {
            SizeClass::Small => self.small.as_ref(),
            SizeClass::Large => self.large.as_ref(),
        }
    }

    /// Whether `class` has a usable capture.
    #[must_use]
    pub fn has(&self, class: SizeClass) -> bool {
        self.capture(class).is_some_and(is_valid_capture)
    }

    /// Whether both size classes have usable captures.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        SizeClass::ALL.iter().all(|&c| self.has(c))
    }
}

impl CalibrationSource for Calibration {
    fn load(&self, class: SizeClass) -> Option<PixelBuffer> {
        self.capture(class).cloned()
    }
}

/// Reads `bg_48.png` and `bg_96.png` from a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    /// A source rooted at `dir`. The directory need not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the capture file for `class`.
    #[must_use]
    pub fn path_for(&self, class: SizeClass) -> PathBuf {
        self.dir.join(class.capture_file_name())
    }

    /// Store a capture so later loads find it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the PNG cannot be
    /// encoded or written.
    pub fn store(&self, class: SizeClass, capture: &PixelBuffer) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(class), capture.to_png()?)?;
        Ok(())
    }
}

impl CalibrationSource for DirectorySource {
    fn load(&self, class: SizeClass) -> Option<PixelBuffer> {
        let path = self.path_for(class);
        if !path.is_file() {
            log::debug!("no calibration capture at {}", path.display());
            return None;
        }
        match read_capture(&path) {
            Ok(capture) => Some(capture),
            Err(e) => {
                log::warn!("ignoring calibration capture {}: {e}", path.display());
                None
            }
        }
    }
}

fn read_capture(path: &Path) -> Result<PixelBuffer> {
    let bytes = std::fs::read(path)?;
    let img = image::load_from_memory(&bytes)
        .map_err(Error::CalibrationDecode)?
        .to_rgba8();
    PixelBuffer::try_from(img)
}

/// Two sources consulted in order; built with [`CalibrationSource::or`].
#[derive(Debug, Clone)]
pub struct Fallback<A, B> {
    primary: A,
    secondary: B,
}

impl<A: CalibrationSource, B: CalibrationSource> CalibrationSource for Fallback<A, B> {
    fn load(&self, class: SizeClass) -> Option<PixelBuffer> {
        self.primary
            .load(class)
            .filter(is_valid_capture)
            .or_else(|| self.secondary.load(class))
    }
}
