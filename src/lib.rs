//! Detect frame-like borders around generated flag images.
//!
//! Image generators often paint a decorative frame around a flag. This crate
//! finds long horizontal and vertical straight lines near the image edges and
//! decides, from how many there are and how flat the outermost strips look,
//! whether the image is framed.
//!
//! # Quick Start
//!
//! ```no_run
//! use flag_border_detection::BorderDetector;
//!
//! let detector = BorderDetector::default();
//! let img = image::open("flag.png").unwrap().to_rgb8();
//! let verdict = detector.detect(&img).unwrap();
//! println!(
//!     "border: {} (H={}, V={})",
//!     verdict.has_border, verdict.line_sums.horizontal, verdict.line_sums.vertical
//! );
//! verdict.annotated.save("flag_borders.png").unwrap();
//! ```
//!
//! # Pipeline
//!
//! 1. [`lines`]: Canny edges, oriented opening and closing, and a component
//!    length filter produce horizontal and vertical line masks.
//! 2. [`scoring`]: line pixels are counted in the four border strips, and the
//!    grayscale deviation of narrower strips measures their flatness.
//! 3. [`classifier`]: three independent checks turn the sums and deviations
//!    into a verdict.
//!
//! Tuning lives in [`DetectionParams`], which can be loaded from JSON:
//!
//! ```
//! use flag_border_detection::DetectionParams;
//!
//! let params = DetectionParams::from_json(r#"{"kernel_len": 40}"#).unwrap();
//! assert_eq!(params.kernel_len, 40);
//! assert_eq!(params.min_line_length, 100);
//! ```

#![deny(missing_docs)]

pub mod classifier;
pub mod edges;
mod engine;
pub mod error;
pub mod evaluation;
pub mod lines;
pub mod morphology;
pub mod params;
pub mod retry;
pub mod scoring;

pub use classifier::{classify_borders, Branch, LineSums, Verdict};
pub use engine::{
    default_output_path, is_supported_image, save_image, BorderDetector, ProcessResult,
};
pub use error::{Error, Result};
pub use lines::{extract_lines, LineMasks};
pub use params::{Aperture, DecisionThresholds, DetectionParams};
pub use scoring::{count_strip_pixels, edge_deviation, EdgeDeviations, StripCounts, StripSize};
