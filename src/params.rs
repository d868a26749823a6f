//! Tuning parameters for the border detection pipeline.
//!
//! Every knob lives in [`DetectionParams`], built once by the caller (directly,
//! or deserialized from a JSON config file) and passed by reference into the
//! pipeline. Nothing here reads the environment.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sobel aperture used for the Canny gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Aperture {
    /// 3x3 kernel.
    #[serde(rename = "3")]
    Three,
    /// 5x5 kernel.
    #[serde(rename = "5")]
    Five,
    /// 7x7 kernel. Favors long straight gradients over texture detail.
    #[default]
    #[serde(rename = "7")]
    Seven,
}

impl Aperture {
    /// Kernel side length in pixels.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::Three => 3,
            Self::Five => 5,
            Self::Seven => 7,
        }
    }

    /// Separable Sobel factors: `(derivative, smoothing)`.
    pub(crate) fn kernels(self) -> (&'static [i32], &'static [i32]) {
        match self {
            Self::Three => (&[-1, 0, 1], &[1, 2, 1]),
            Self::Five => (&[-1, -2, 0, 2, 1], &[1, 4, 6, 4, 1]),
            Self::Seven => (&[-1, -4, -5, 0, 5, 4, 1], &[1, 6, 15, 20, 15, 6, 1]),
        }
    }
}

/// Score tiers and the flatness test used by the decision rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionThresholds {
    /// Line sum that counts as a strong signal on one axis.
    pub high_score: u64,
    /// Line sum that counts as a moderate signal on both axes.
    pub middle_score: u64,
    /// Minimum perpendicular line sum required next to a strong signal.
    pub low_score: u64,
    /// Fraction of each dimension used for the flatness strips.
    pub narrow_edge_perc: f64,
    /// A strip is flat when its blurred grayscale deviation is below this.
    pub deviation_threshold: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            high_score: 5000,
            middle_score: 1000,
            low_score: 100,
            narrow_edge_perc: 0.07,
            deviation_threshold: 10.0,
        }
    }
}

/// Options controlling the border detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Minimum bounding-box length of a kept line component.
    pub min_line_length: u32,
    /// Opening iterations applied to the edge map.
    pub iterations: u32,
    /// Length of the oriented structuring element.
    pub kernel_len: u32,
    /// Fraction of each dimension used for the line-count strips.
    pub edge_perc: f64,
    /// Closing iterations used to bridge gaps in detected lines.
    pub close_iterations: u32,
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
    /// Sobel aperture for the Canny gradient.
    pub aperture: Aperture,
    /// RGB color used to paint detected lines on the annotated output.
    pub highlight: [u8; 3],
    /// Decision rule thresholds.
    pub thresholds: DecisionThresholds,
    /// Return the intermediate line masks alongside the verdict.
    pub keep_masks: bool,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            min_line_length: 100,
            iterations: 2,
            kernel_len: 30,
            edge_perc: 0.3,
            close_iterations: 4,
            canny_low: 50.0,
            canny_high: 150.0,
            aperture: Aperture::Seven,
            highlight: [255, 0, 0],
            thresholds: DecisionThresholds::default(),
            keep_masks: false,
        }
    }
}

impl DetectionParams {
    /// Load parameters from a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the document is malformed, or
    /// [`Error::InvalidParameter`] if a value is out of range.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Check every parameter for range errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        positive("min_line_length", self.min_line_length)?;
        positive("iterations", self.iterations)?;
        positive("kernel_len", self.kernel_len)?;
        positive("close_iterations", self.close_iterations)?;
        fraction("edge_perc", self.edge_perc)?;
        fraction("narrow_edge_perc", self.thresholds.narrow_edge_perc)?;

        if !(self.canny_low.is_finite() && self.canny_low >= 0.0) {
            return Err(Error::parameter("canny_low", "must be a non-negative number"));
        }
        if !self.canny_high.is_finite() || self.canny_high < self.canny_low {
            return Err(Error::parameter(
                "canny_high",
                format!("must be at least canny_low ({})", self.canny_low),
            ));
        }

        let t = &self.thresholds;
        if !(t.deviation_threshold.is_finite() && t.deviation_threshold > 0.0) {
            return Err(Error::parameter(
                "deviation_threshold",
                "must be a positive number",
            ));
        }
        if t.low_score > t.high_score || t.middle_score > t.high_score {
            return Err(Error::parameter(
                "high_score",
                "must not be below low_score or middle_score",
            ));
        }
        Ok(())
    }
}

fn positive(name: &'static str, value: u32) -> Result<()> {
    if value == 0 {
        return Err(Error::parameter(name, "must be positive"));
    }
    Ok(())
}

/// Strip fractions must leave the opposing strips disjoint.
fn fraction(name: &'static str, value: f64) -> Result<()> {
    if !(value.is_finite() && value > 0.0 && value < 0.5) {
        return Err(Error::parameter(
            name,
            format!("must be in the open range (0, 0.5), got {value}"),
        ));
    }
    Ok(())
}
