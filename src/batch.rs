//! File-level processing: decode, unblend, encode, and hand results to a sink.

use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::engine::{ProcessOptions, WatermarkEngine};
use crate::error::{Error, Result};
use crate::geometry::SizeClass;
use crate::pixel::PixelBuffer;
use crate::sink::ResultSink;

/// Result of processing a single image file.
#[derive(Debug)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether unblending was skipped (no calibration for its size class).
    /// A skipped image is still written, unchanged.
    pub skipped: bool,
    /// Size class applied, once resolved.
    pub size_class: Option<SizeClass>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            skipped: false,
            size_class: None,
            message: String::new(),
        }
    }

    fn failed(path: &Path, message: String) -> Self {
        Self {
            message,
            ..Self::new(path)
        }
    }
}

struct Cleaned {
    image: PixelBuffer,
    class: SizeClass,
    skipped: bool,
}

impl Cleaned {
    fn apply_to(&self, result: &mut ProcessResult) {
        result.size_class = Some(self.class);
        result.skipped = self.skipped;
        result.message = if self.skipped {
            format!(
                "No calibration capture for {:?} overlay; image left unchanged",
                self.class
            )
        } else {
            "Watermark removed".to_string()
        };
    }
}

impl WatermarkEngine {
    fn clean(&self, input: &Path, opts: &ProcessOptions) -> Result<Cleaned> {
        let mut image = load_image(input)?;
        let (class, _) = self.resolve(image.width(), image.height(), opts.force_size);
        let skipped = self.alpha_map(class).is_blank();
        if skipped {
            log::debug!("{}: no {class:?} calibration, passing through", input.display());
        } else {
            self.remove(&mut image, opts.force_size);
        }
        Ok(Cleaned {
            image,
            class,
            skipped,
        })
    }

    /// Process a single image file: load, remove, save.
    ///
    /// The output format follows the output extension. When the size class
    /// has no calibration the image is saved unchanged and marked skipped.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: &Path, opts: &ProcessOptions) -> ProcessResult {
        let mut result = ProcessResult::new(input);

        let cleaned = match self.clean(input, opts) {
            Ok(cleaned) => cleaned,
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    result.message = format!("Failed to create output directory: {e}");
                    return result;
                }
            }
        }

        match save_image(&cleaned.image, output) {
            Ok(()) => {
                result.success = true;
                cleaned.apply_to(&mut result);
            }
            Err(e) => {
                result.message = format!("Failed to save: {e}");
            }
        }

        result
    }

    /// Process many image files, feeding each cleaned PNG to `sink`.
    ///
    /// Images are decoded and unblended in parallel when the `cli` feature is
    /// enabled (via rayon), then written to the sink in input order as
    /// `clean_<stem>.png`. Images without calibration for their size class are
    /// written unchanged and marked skipped. A failing image is reported without
    /// affecting the others.
    pub fn process_batch(
        &self,
        inputs: &[PathBuf],
        sink: &mut dyn ResultSink,
        opts: &ProcessOptions,
    ) -> Vec<ProcessResult> {
        let encode = |input: &PathBuf| self.encode_one(input, opts);

        #[cfg(feature = "cli")]
        let encoded: Vec<_> = {
            use rayon::prelude::*;
            inputs.par_iter().map(encode).collect()
        };

        #[cfg(not(feature = "cli"))]
        let encoded: Vec<_> = inputs.iter().map(encode).collect();

        let mut results = Vec::with_capacity(encoded.len());
        for (mut result, bytes) in encoded {
            if let Some(bytes) = bytes {
                let name = output_name(&result.path);
                if let Err(e) = sink.accept(&name, &bytes) {
                    result.success = false;
                    result.skipped = false;
                    result.message = format!("Failed to write {name}: {e}");
                }
            }
            results.push(result);
        }

        if let Err(e) = sink.finish() {
            log::error!("failed to finalize output: {e}");
            for result in results.iter_mut().filter(|r| r.success) {
                result.success = false;
                result.skipped = false;
                result.message = format!("Failed to finalize output: {e}");
            }
        }

        let ok = results.iter().filter(|r| r.success && !r.skipped).count();
        log::info!("processed {ok} of {} images", results.len());
        results
    }

    /// Process all supported images in a directory into `sink`.
    ///
    /// See [`WatermarkEngine::process_batch`].
    pub fn process_directory(
        &self,
        input_dir: &Path,
        sink: &mut dyn ResultSink,
        opts: &ProcessOptions,
    ) -> Vec<ProcessResult> {
        match collect_images(input_dir) {
            Ok(inputs) => self.process_batch(&inputs, sink, opts),
            Err(e) => vec![ProcessResult::failed(
                input_dir,
                format!("Failed to read directory: {e}"),
            )],
        }
    }

    fn encode_one(&self, input: &Path, opts: &ProcessOptions) -> (ProcessResult, Option<Vec<u8>>) {
        let mut result = ProcessResult::new(input);
        let encoded = self.clean(input, opts).and_then(|cleaned| {
            let bytes = cleaned.image.to_png()?;
            Ok((cleaned, bytes))
        });

        match encoded {
            Ok((cleaned, bytes)) => {
                result.success = true;
                cleaned.apply_to(&mut result);
                (result, Some(bytes))
            }
            Err(e) => {
                log::debug!("{}: {e}", input.display());
                result.message = format!("Failed to process: {e}");
                (result, None)
            }
        }
    }
}

/// Decode an image file into an RGBA buffer.
///
/// # Errors
///
/// Returns [`Error::Image`] if the file cannot be opened or decoded.
pub fn load_image(path: &Path) -> Result<PixelBuffer> {
    let img = image::open(path)?.to_rgba8();
    PixelBuffer::try_from(img)
}

/// List supported image files in a directory, sorted by path.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be read.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| is_supported_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save an RGBA image with format-specific settings.
///
/// JPEG drops the alpha channel and is written at quality 100.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &PixelBuffer, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    let dyn_img = img.to_dynamic()?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&dyn_img.to_rgb8())?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            dyn_img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Name under which a cleaned image is stored.
///
/// Example: `"photo.jpg"` becomes `"clean_photo.png"`.
#[must_use]
pub fn output_name(input: &Path) -> String {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    format!("clean_{stem}.png")
}

/// Generate a default output path next to the input.
///
/// Example: `"/tmp/photo.jpg"` becomes `"/tmp/clean_photo.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(output_name(input))
}
