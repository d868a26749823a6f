//! Border detector and file-level driver.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::{self, LineSums, Verdict};
use crate::error::{Error, Result};
use crate::params::DetectionParams;

/// Result of processing a single image file.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    /// Path of the processed file.
    pub path: PathBuf,
    /// Whether processing succeeded.
    pub success: bool,
    /// Whether the file was skipped (too small to score, assumed border-free).
    pub skipped: bool,
    /// Classification outcome. `false` for skipped and failed files.
    pub has_border: bool,
    /// Line sums, when the image was classified.
    pub line_sums: Option<LineSums>,
    /// Human-readable status message.
    pub message: String,
}

impl ProcessResult {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            success: false,
            skipped: false,
            has_border: false,
            line_sums: None,
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

/// Border detector holding validated parameters.
///
/// Create once with [`BorderDetector::new()`] and reuse for multiple images.
/// The detector is stateless between calls, so a shared reference can be used
/// from several threads at once.
#[derive(Debug, Clone, Default)]
pub struct BorderDetector {
    params: DetectionParams,
}

impl BorderDetector {
    /// Create a detector with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if `params` is out of range.
    pub fn new(params: DetectionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Parameters in use.
    #[must_use]
    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Classify an RGB image.
    ///
    /// # Errors
    ///
    /// See [`classifier::classify_borders`].
    pub fn detect(&self, image: &RgbImage) -> Result<Verdict> {
        classifier::classify_borders(image, &self.params)
    }

    /// Classify an image of any color type. Gray and alpha inputs are converted to RGB.
    ///
    /// # Errors
    ///
    /// See [`classifier::classify_borders`].
    pub fn detect_dynamic(&self, image: &DynamicImage) -> Result<Verdict> {
        self.detect(&image.to_rgb8())
    }

    /// Decode an encoded image (PNG, JPEG, ...) and classify it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidImage`] for empty or undecodable input, otherwise
    /// see [`classifier::classify_borders`].
    pub fn detect_bytes(&self, bytes: &[u8]) -> Result<Verdict> {
        if bytes.is_empty() {
            return Err(Error::InvalidImage("zero-byte input".to_string()));
        }
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| Error::InvalidImage(format!("cannot decode: {e}")))?;
        self.detect_dynamic(&decoded)
    }

    /// Process a single image file: load, classify, optionally save the annotation.
    ///
    /// Images too small for the border strips are reported as skipped and
    /// treated as border-free.
    #[must_use]
    pub fn process_file(&self, input: &Path, output: Option<&Path>) -> ProcessResult {
        let mut result = ProcessResult::new(input);

        let dyn_img = match image::open(input) {
            Ok(img) => img,
            Err(e) => {
                result.message = format!("Failed to load: {e}");
                return result;
            }
        };

        let verdict = match self.detect_dynamic(&dyn_img) {
            Ok(verdict) => verdict,
            Err(e) if e.is_degenerate_shape() => {
                debug!(path = %input.display(), error = %e, "skipping degenerate image");
                result.success = true;
                result.skipped = true;
                result.message = format!(
                    "Image too small ({}x{}), assuming no border",
                    dyn_img.width(),
                    dyn_img.height()
                );
                return result;
            }
            Err(e) => {
                warn!(path = %input.display(), error = %e, "classification failed");
                result.message = format!("Failed to classify: {e}");
                return result;
            }
        };

        result.has_border = verdict.has_border;
        result.line_sums = Some(verdict.line_sums);
        info!(
            path = %input.display(),
            has_border = verdict.has_border,
            horizontal = verdict.line_sums.horizontal,
            vertical = verdict.line_sums.vertical,
            "classified"
        );

        if let Some(output) = output {
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        result.message = format!("Failed to create output directory: {e}");
                        return result;
                    }
                }
            }
            if let Err(e) = save_image(&verdict.annotated, output) {
                result.message = format!("Failed to save: {e}");
                return result;
            }
        }

        result.success = true;
        result.message = format!(
            "{} (H={}, V={})",
            if verdict.has_border { "Border" } else { "No border" },
            verdict.line_sums.horizontal,
            verdict.line_sums.vertical,
        );
        result
    }

    /// Process all supported images in a directory, sorted by path.
    ///
    /// Annotated images are written into `output_dir` under their original
    /// file names when it is given. Uses parallel iteration when the `cli`
    /// feature is enabled (via rayon).
    #[must_use]
    pub fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
    ) -> Vec<ProcessResult> {
        let mut entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![ProcessResult::failed(
                    input_dir,
                    format!("Failed to read directory: {e}"),
                )];
            }
        };
        entries.sort();

        if let Some(dir) = output_dir {
            if !dir.exists() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    return vec![ProcessResult::failed(
                        dir,
                        format!("Failed to create output directory: {e}"),
                    )];
                }
            }
        }

        let run = |input: &PathBuf| {
            let output = output_dir.zip(input.file_name()).map(|(d, f)| d.join(f));
            self.process_file(input, output.as_deref())
        };

        #[cfg(feature = "cli")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(run).collect()
        }

        #[cfg(not(feature = "cli"))]
        {
            entries.iter().map(run).collect()
        }
    }
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

/// Save an RGB image with format-specific quality settings.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save_image(img: &RgbImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    match format {
        ImageFormat::Jpeg => {
            let file = std::io::BufWriter::new(std::fs::File::create(path)?);
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 95);
            encoder.encode_image(img)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save_with_format(path, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default annotation path from an input path.
///
/// Example: `"flag.jpg"` becomes `"flag_borders.jpg"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let ext = input.extension().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_borders.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn new_rejects_invalid_params() {
        let params = DetectionParams {
            kernel_len: 0,
            ..DetectionParams::default()
        };
        assert!(matches!(
            BorderDetector::new(params),
            Err(Error::InvalidParameter { name: "kernel_len", .. })
        ));
    }

    #[test]
    fn detect_bytes_rejects_empty_and_garbage() {
        let detector = BorderDetector::default();
        assert!(matches!(
            detector.detect_bytes(&[]),
            Err(Error::InvalidImage(_))
        ));
        assert!(matches!(
            detector.detect_bytes(b"not an image"),
            Err(Error::InvalidImage(_))
        ));
    }

    #[test]
    fn detect_bytes_decodes_png() {
        let img = RgbImage::from_pixel(60, 40, Rgb([10, 200, 30]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();

        let verdict = BorderDetector::default()
            .detect_bytes(buf.get_ref())
            .unwrap();
        assert!(!verdict.has_border);
        assert_eq!(verdict.annotated.dimensions(), (60, 40));
    }

    #[test]
    fn default_output_path_appends_borders_suffix() {
        let p = default_output_path(Path::new("/tmp/flag.jpg"));
        assert_eq!(p, PathBuf::from("/tmp/flag_borders.jpg"));

        let p = default_output_path(Path::new("image.png"));
        assert_eq!(
            p.file_name().unwrap().to_str().unwrap(),
            "image_borders.png"
        );
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("flag.jpg")));
        assert!(is_supported_image(Path::new("flag.JPEG")));
        assert!(is_supported_image(Path::new("flag.png")));
        assert!(is_supported_image(Path::new("flag.webp")));
        assert!(is_supported_image(Path::new("flag.bmp")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("flag.gif")));
        assert!(!is_supported_image(Path::new("labels.json")));
        assert!(!is_supported_image(Path::new("flag")));
    }

    #[test]
    fn save_image_rejects_unknown_extension() {
        let img = RgbImage::new(4, 4);
        assert!(matches!(
            save_image(&img, Path::new("out.xyz")),
            Err(Error::UnsupportedFormat(_))
        ));
    }
}
