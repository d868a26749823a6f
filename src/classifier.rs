//! Border decision rule.
//!
//! Three independent checks over the line sums, each gated by a flatness test
//! on the narrow border strips:
//! 1. **Strong horizontal**: `H > high` and `V > low`, top and bottom flat.
//! 2. **Strong vertical**: `V > high` and `H > low`, left and right flat.
//! 3. **Moderate both**: `H > middle` and `V > middle`, either pair flat.
//!
//! Any check that fires sets the verdict; none can clear it. Deviations are
//! computed at most once per call, and only when a check needs them.

use image::{GrayImage, RgbImage};
use serde::Serialize;
use tracing::debug;

use crate::edges::to_grayscale;
use crate::error::{Error, Result};
use crate::lines::{annotate, extract_from_gray, LineMasks};
use crate::params::{DecisionThresholds, DetectionParams};
use crate::scoring::{count_strip_pixels, strip_deviations, EdgeDeviations, StripSize};

/// Which check of the decision rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    /// Strong horizontal line signal with flat top and bottom strips.
    StrongHorizontal,
    /// Strong vertical line signal with flat left and right strips.
    StrongVertical,
    /// Moderate signal on both axes with one flat pair of strips.
    ModerateBoth,
}

/// Line-pixel totals inside the border strips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LineSums {
    /// Horizontal-mask pixels in the top and bottom strips.
    pub horizontal: u64,
    /// Vertical-mask pixels in the left and right strips.
    pub vertical: u64,
}

/// Outcome of the decision rule alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// Whether any check fired.
    pub has_border: bool,
    /// Checks that fired, in evaluation order.
    pub fired: Vec<Branch>,
    /// Strip deviations, if any check needed them.
    pub deviations: Option<EdgeDeviations>,
}

/// Intermediate masks returned when [`DetectionParams::keep_masks`] is set.
#[derive(Debug, Clone)]
pub struct DiagnosticMasks {
    /// Filtered line masks.
    pub lines: LineMasks,
    /// Dilated union of both masks, as painted on the annotated image.
    pub visualization: GrayImage,
}

/// Result of classifying one image.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Whether the image is judged to have a frame-like border.
    pub has_border: bool,
    /// Line sums the decision was based on.
    pub line_sums: LineSums,
    /// Grayscale source with detected lines painted in the highlight color.
    pub annotated: RgbImage,
    /// Checks that fired.
    pub fired: Vec<Branch>,
    /// Strip deviations, if they were computed.
    pub deviations: Option<EdgeDeviations>,
    /// Intermediate masks, if requested.
    pub masks: Option<DiagnosticMasks>,
}

impl Verdict {
    /// Split into `(has_border, (horizontal_sum, vertical_sum), annotated)`.
    #[must_use]
    pub fn into_parts(self) -> (bool, (u64, u64), RgbImage) {
        (
            self.has_border,
            (self.line_sums.horizontal, self.line_sums.vertical),
            self.annotated,
        )
    }
}

pub(crate) fn ensure_not_empty(image: &RgbImage) -> Result<()> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::InvalidImage(format!("image has zero dimension ({w}x{h})")));
    }
    Ok(())
}

/// Classify whether `image` has a frame-like border.
///
/// # Errors
///
/// - [`Error::InvalidImage`] if the image has a zero dimension.
/// - [`Error::InvalidParameter`] if `params` is out of range, if the image is
///   too small for the `edge_perc` strips, or if a check needs deviations and
///   the image is too small for the narrow strips.
/// - [`Error::Computation`] if a strip statistic cannot be computed.
pub fn classify_borders(image: &RgbImage, params: &DetectionParams) -> Result<Verdict> {
    ensure_not_empty(image)?;
    params.validate()?;

    let (w, h) = image.dimensions();
    let strip = StripSize::for_dimensions(w, h, params.edge_perc, "edge_strip")?;

    let gray = to_grayscale(image);
    let lines = extract_from_gray(&gray, params);
    let line_sums = LineSums {
        horizontal: count_strip_pixels(&lines.horizontal, strip).horizontal(),
        vertical: count_strip_pixels(&lines.vertical, strip).vertical(),
    };
    debug!(
        horizontal = line_sums.horizontal,
        vertical = line_sums.vertical,
        "border line sums"
    );

    // Narrow strips are sized only when a check needs deviations.
    let decision = decide(line_sums, &params.thresholds, || {
        let narrow = StripSize::for_dimensions(
            w,
            h,
            params.thresholds.narrow_edge_perc,
            "narrow_edge_strip",
        )?;
        strip_deviations(&gray, narrow)
    })?;

    let visualization = lines.visualization();
    let annotated = annotate(&gray, &visualization, params.highlight);
    let masks = params.keep_masks.then(|| DiagnosticMasks {
        lines,
        visualization,
    });

    Ok(Verdict {
        has_border: decision.has_border,
        line_sums,
        annotated,
        fired: decision.fired,
        deviations: decision.deviations,
        masks,
    })
}

fn cached<F>(cache: &mut Option<EdgeDeviations>, compute: &mut F) -> Result<EdgeDeviations>
where
    F: FnMut() -> Result<EdgeDeviations>,
{
    if let Some(dev) = *cache {
        return Ok(dev);
    }
    let dev = compute()?;
    debug!(
        top = dev.top,
        bottom = dev.bottom,
        left = dev.left,
        right = dev.right,
        "edge deviations"
    );
    *cache = Some(dev);
    Ok(dev)
}

/// Apply the decision rule to `sums`, pulling deviations from `deviations` on demand.
///
/// `deviations` is invoked at most once.
///
/// # Errors
///
/// Propagates any error returned by `deviations`.
pub fn decide<F>(
    sums: LineSums,
    thresholds: &DecisionThresholds,
    mut deviations: F,
) -> Result<Decision>
where
    F: FnMut() -> Result<EdgeDeviations>,
{
    let t = thresholds;
    let flat = |v: f64| v < t.deviation_threshold;
    let (h, v) = (sums.horizontal, sums.vertical);

    let mut cache = None;
    let mut fired = Vec::new();

    if h > t.high_score && v > t.low_score {
        let dev = cached(&mut cache, &mut deviations)?;
        if flat(dev.top) && flat(dev.bottom) {
            fired.push(Branch::StrongHorizontal);
        }
    }
    if v > t.high_score && h > t.low_score {
        let dev = cached(&mut cache, &mut deviations)?;
        if flat(dev.left) && flat(dev.right) {
            fired.push(Branch::StrongVertical);
        }
    }
    if h > t.middle_score && v > t.middle_score {
        let dev = cached(&mut cache, &mut deviations)?;
        if (flat(dev.left) && flat(dev.right)) || (flat(dev.top) && flat(dev.bottom)) {
            fired.push(Branch::ModerateBoth);
        }
    }

    if !fired.is_empty() {
        debug!(?fired, "border checks fired");
    }
    Ok(Decision {
        has_border: !fired.is_empty(),
        fired,
        deviations: cache,
    })
}
