//! Edge-region statistics.
//!
//! Two measurements over the four border strips of an image:
//! white-pixel counts of a line mask, and the grayscale standard deviation of
//! a blurred copy of the source. Neither thresholds anything.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::filter::separable_filter_equal;
use serde::Serialize;

use crate::edges::to_grayscale;
use crate::error::{Error, Result};

/// Binomial 5-tap Gaussian, `[1, 4, 6, 4, 1] / 16`. Every tap is exact in `f32`.
const GAUSS_5: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];
const GAUSS_RADIUS: u32 = 2;

/// Thickness of the border strips, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StripSize {
    /// Rows in the top and bottom strips: `floor(height * edge_perc)`.
    pub rows: u32,
    /// Columns in the left and right strips: `floor(width * edge_perc)`.
    pub cols: u32,
}

impl StripSize {
    /// Compute strip sizes for an image of `width x height`.
    ///
    /// `name` identifies the strip set in the error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if either strip would be empty.
    pub fn for_dimensions(
        width: u32,
        height: u32,
        edge_perc: f64,
        name: &'static str,
    ) -> Result<Self> {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let size = |dim: u32| (f64::from(dim) * edge_perc).floor() as u32;
        let strip = Self {
            rows: size(height),
            cols: size(width),
        };
        if strip.rows == 0 || strip.cols == 0 {
            return Err(Error::parameter(
                name,
                format!("{width}x{height} image leaves an empty strip at edge_perc={edge_perc}"),
            ));
        }
        Ok(strip)
    }
}

/// White-pixel counts per border strip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StripCounts {
    /// Top strip.
    pub top: u64,
    /// Bottom strip.
    pub bottom: u64,
    /// Left strip.
    pub left: u64,
    /// Right strip.
    pub right: u64,
}

impl StripCounts {
    /// Top plus bottom.
    #[must_use]
    pub fn horizontal(&self) -> u64 {
        self.top + self.bottom
    }

    /// Left plus right.
    #[must_use]
    pub fn vertical(&self) -> u64 {
        self.left + self.right
    }
}

/// Count 255-valued pixels of `mask` in each border strip.
///
/// Strips overlap at the corners; a corner pixel counts toward both strips.
#[must_use]
pub fn count_strip_pixels(mask: &GrayImage, strip: StripSize) -> StripCounts {
    let (w, h) = mask.dimensions();
    let bottom_start = h.saturating_sub(strip.rows);
    let right_start = w.saturating_sub(strip.cols);

    let mut counts = StripCounts::default();
    for (x, y, px) in mask.enumerate_pixels() {
        if px[0] != 255 {
            continue;
        }
        if y < strip.rows {
            counts.top += 1;
        }
        if y >= bottom_start {
            counts.bottom += 1;
        }
        if x < strip.cols {
            counts.left += 1;
        }
        if x >= right_start {
            counts.right += 1;
        }
    }
    counts
}

/// Grayscale standard deviation per border strip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeDeviations {
    /// Top strip.
    pub top: f64,
    /// Bottom strip.
    pub bottom: f64,
    /// Left strip.
    pub left: f64,
    /// Right strip.
    pub right: f64,
}

/// Standard deviation of blurred grayscale intensity in each border strip.
///
/// The image is converted to grayscale and blurred twice with a 5x5 Gaussian
/// before measuring, so single-pixel speckle does not register as variation.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `edge_perc` leaves an empty strip.
pub fn edge_deviation(image: &RgbImage, edge_perc: f64) -> Result<EdgeDeviations> {
    edge_deviation_luma(&to_grayscale(image), edge_perc)
}

/// Single-channel variant of [`edge_deviation`].
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `edge_perc` leaves an empty strip.
pub fn edge_deviation_luma(gray: &GrayImage, edge_perc: f64) -> Result<EdgeDeviations> {
    let strip = StripSize::for_dimensions(gray.width(), gray.height(), edge_perc, "edge_strip")?;
    strip_deviations(gray, strip)
}

pub(crate) fn strip_deviations(gray: &GrayImage, strip: StripSize) -> Result<EdgeDeviations> {
    let blurred = gaussian_blur_5x5(&gaussian_blur_5x5(gray));
    let (w, h) = blurred.dimensions();
    Ok(EdgeDeviations {
        top: region_stddev(&blurred, 0, 0, w, strip.rows)?,
        bottom: region_stddev(&blurred, 0, h - strip.rows, w, strip.rows)?,
        left: region_stddev(&blurred, 0, 0, strip.cols, h)?,
        right: region_stddev(&blurred, w - strip.cols, 0, strip.cols, h)?,
    })
}

/// Reflect an out-of-range index back into `0..len` without repeating the edge pixel.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn reflect_101(i: i64, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let len = i64::from(len);
    let period = 2 * (len - 1);
    let i = i.rem_euclid(period);
    (if i >= len { period - i } else { i }) as u32
}

/// Separable 5x5 Gaussian blur with reflected borders, rounded back to 8 bits.
///
/// `imageproc` filters pad by replication, so the input is first given a
/// reflected margin as wide as the kernel radius and the margin is cropped
/// off afterwards.
#[must_use]
pub fn gaussian_blur_5x5(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let r = GAUSS_RADIUS;
    let padded: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(w + 2 * r, h + 2 * r, |x, y| {
            let sx = reflect_101(i64::from(x) - i64::from(r), w);
            let sy = reflect_101(i64::from(y) - i64::from(r), h);
            Luma([f32::from(gray.get_pixel(sx, sy)[0])])
        });
    let blurred = separable_filter_equal(&padded, &GAUSS_5);

    GrayImage::from_fn(w, h, |x, y| {
        let v = blurred.get_pixel(x + r, y + r)[0];
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let v = v.round().clamp(0.0, 255.0) as u8;
        Luma([v])
    })
}

/// Population standard deviation of a rectangular region.
fn region_stddev(gray: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> Result<f64> {
    let n = u64::from(w) * u64::from(h);
    if n == 0 {
        return Err(Error::Computation(format!(
            "standard deviation of empty {w}x{h} region at ({x0}, {y0})"
        )));
    }

    let mut sum = 0_u64;
    let mut sum_sq = 0_u64;
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let v = u64::from(gray.get_pixel(x, y)[0]);
            sum += v;
            sum_sq += v * v;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let (n, sum, sum_sq) = (n as f64, sum as f64, sum_sq as f64);
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    let stddev = variance.sqrt();
    if !stddev.is_finite() {
        return Err(Error::Computation(format!(
            "non-finite standard deviation over {w}x{h} region"
        )));
    }
    Ok(stddev)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_size_floors_and_rejects_empty() {
        let strip = StripSize::for_dimensions(400, 300, 0.07, "narrow").unwrap();
        assert_eq!(strip, StripSize { rows: 21, cols: 28 });

        let err = StripSize::for_dimensions(10, 10, 0.07, "narrow_edge_strip").unwrap_err();
        assert!(err.is_degenerate_shape());
    }

    #[test]
    fn counts_respect_strip_bounds() {
        let mut mask = GrayImage::new(100, 50);
        // Row inside the top strip, row in the middle, column in the right strip.
        for x in 0..100 {
            mask.put_pixel(x, 2, Luma([255]));
            mask.put_pixel(x, 25, Luma([255]));
        }
        for y in 10..20 {
            mask.put_pixel(95, y, Luma([255]));
        }
        let counts = count_strip_pixels(&mask, StripSize { rows: 5, cols: 10 });
        assert_eq!(counts.top, 100);
        assert_eq!(counts.bottom, 0);
        assert_eq!(counts.left, 20);
        assert_eq!(counts.right, 30);
        assert_eq!(counts.horizontal(), 100);
        assert_eq!(counts.vertical(), 50);
    }

    #[test]
    fn counts_ignore_non_white_pixels() {
        let mask = GrayImage::from_pixel(20, 20, Luma([128]));
        let counts = count_strip_pixels(&mask, StripSize { rows: 4, cols: 4 });
        assert_eq!(counts, StripCounts::default());
    }

    #[test]
    fn blur_preserves_flat_regions() {
        let gray = GrayImage::from_pixel(9, 7, Luma([173]));
        let blurred = gaussian_blur_5x5(&gray);
        assert!(blurred.pixels().all(|p| p[0] == 173));
    }

    #[test]
    fn blur_spreads_an_impulse() {
        let mut gray = GrayImage::new(9, 9);
        gray.put_pixel(4, 4, Luma([255]));
        let blurred = gaussian_blur_5x5(&gray);
        // 255 * 36 / 256 rounds to 36.
        assert_eq!(blurred.get_pixel(4, 4)[0], 36);
        assert_eq!(blurred.get_pixel(0, 0)[0], 0);
        assert_eq!(blurred.get_pixel(4, 2)[0], 6);
    }

    #[test]
    fn blur_reflects_without_repeating_the_edge() {
        // A lit first column: reflection puts it only under the center tap (6/16),
        // replication would also count it under the two left taps (11/16).
        let gray = GrayImage::from_fn(8, 6, |x, _| Luma([if x == 0 { 255 } else { 0 }]));
        let blurred = gaussian_blur_5x5(&gray);
        assert!((0..6).all(|y| blurred.get_pixel(0, y)[0] == 96));
        assert!((0..6).all(|y| blurred.get_pixel(1, y)[0] == 64));
        assert!((0..6).all(|y| blurred.get_pixel(3, y)[0] == 0));
    }

    #[test]
    fn blur_handles_single_pixel_images() {
        let gray = GrayImage::from_pixel(1, 1, Luma([77]));
        assert_eq!(gaussian_blur_5x5(&gray).get_pixel(0, 0)[0], 77);
    }

    #[test]
    fn reflect_101_folds_indices() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(-2, 2), 0);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn flat_strips_have_zero_deviation() {
        let image = RgbImage::from_pixel(200, 100, image::Rgb([10, 200, 30]));
        let dev = edge_deviation(&image, 0.07).unwrap();
        assert!(dev.top.abs() < 1e-9);
        assert!(dev.bottom.abs() < 1e-9);
        assert!(dev.left.abs() < 1e-9);
        assert!(dev.right.abs() < 1e-9);
    }

    #[test]
    fn striped_strip_has_large_deviation() {
        // Vertical stripes 8 px wide alternate 0/255; the blur cannot flatten them.
        let gray = GrayImage::from_fn(200, 200, |x, _| Luma([if (x / 8) % 2 == 0 { 0 } else { 255 }]));
        let dev = edge_deviation_luma(&gray, 0.07).unwrap();
        assert!(dev.top > 50.0, "top deviation {}", dev.top);
        assert!(dev.bottom > 50.0, "bottom deviation {}", dev.bottom);
    }

    #[test]
    fn region_stddev_of_known_values() {
        // Values 0, 2, 4, 6: mean 3, population variance 5.
        let gray = GrayImage::from_fn(4, 1, |x, _| Luma([u8::try_from(2 * x).unwrap()]));
        let sd = region_stddev(&gray, 0, 0, 4, 1).unwrap();
        assert!((sd - 5.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn region_stddev_rejects_empty_region() {
        let gray = GrayImage::new(4, 4);
        assert!(matches!(
            region_stddev(&gray, 0, 0, 0, 4),
            Err(Error::Computation(_))
        ));
    }
}
