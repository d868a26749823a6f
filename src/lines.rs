//! Long straight line extraction.
//!
//! Pipeline per orientation: Canny edges → oriented opening (keeps runs at
//! least `kernel_len` long) → oriented closing (bridges anti-aliasing gaps) →
//! connected-component filter (keeps components whose bounding box is at
//! least `min_line_length` long, with their holes filled).

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use crate::edges::{canny, to_grayscale};
use crate::error::Result;
use crate::morphology::{self, LineKernel, Orientation};
use crate::params::DetectionParams;

/// Binary masks (0/255) of long horizontal and vertical line segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMasks {
    /// Pixels belonging to long horizontal lines.
    pub horizontal: GrayImage,
    /// Pixels belonging to long vertical lines.
    pub vertical: GrayImage,
}

impl LineMasks {
    /// Union of both masks.
    #[must_use]
    pub fn combined(&self) -> GrayImage {
        let mut union = self.horizontal.clone();
        for (dst, src) in union.pixels_mut().zip(self.vertical.pixels()) {
            dst.0[0] = dst.0[0].max(src.0[0]);
        }
        union
    }

    /// Union of both masks grown by two 3x3 dilations, for display only.
    #[must_use]
    pub fn visualization(&self) -> GrayImage {
        morphology::dilate_square(&self.combined(), 3, 2)
    }
}

/// Extract long horizontal and vertical line masks from a color image.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidImage`] for an empty image and
/// [`crate::Error::InvalidParameter`] for invalid `params`.
pub fn extract_lines(image: &RgbImage, params: &DetectionParams) -> Result<LineMasks> {
    crate::classifier::ensure_not_empty(image)?;
    params.validate()?;
    Ok(extract_from_gray(&to_grayscale(image), params))
}

pub(crate) fn extract_from_gray(gray: &GrayImage, params: &DetectionParams) -> LineMasks {
    let edges = canny(
        gray,
        params.canny_low,
        params.canny_high,
        params.aperture,
    );

    LineMasks {
        horizontal: oriented_lines(&edges, Orientation::Horizontal, params),
        vertical: oriented_lines(&edges, Orientation::Vertical, params),
    }
}

fn oriented_lines(edges: &GrayImage, orientation: Orientation, params: &DetectionParams) -> GrayImage {
    let span = match orientation {
        Orientation::Horizontal => edges.width(),
        Orientation::Vertical => edges.height(),
    };
    if params.kernel_len > span {
        debug!(
            ?orientation,
            kernel_len = params.kernel_len,
            span,
            "kernel longer than image, no lines possible"
        );
        return GrayImage::new(edges.width(), edges.height());
    }

    let kernel = LineKernel::new(orientation, params.kernel_len);
    let opened = morphology::open(edges, kernel, params.iterations);
    let merged = morphology::close(&opened, kernel, params.close_iterations);
    filter_components(&merged, params.min_line_length)
}

/// Axis-aligned bounding box of a labelled component.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Bounds {
    fn longer_side(self) -> u32 {
        (self.max_x - self.min_x + 1).max(self.max_y - self.min_y + 1)
    }
}

/// Keep 8-connected components whose bounding box has a side of at least
/// `min_len` pixels, drawn filled.
fn filter_components(mask: &GrayImage, min_len: u32) -> GrayImage {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0_u8]));
    let count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;

    let mut bounds: Vec<Option<Bounds>> = vec![None; count + 1];
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0] as usize;
        if label == 0 {
            continue;
        }
        bounds[label] = Some(match bounds[label] {
            None => Bounds {
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            },
            Some(b) => Bounds {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }

    let keep: Vec<bool> = bounds
        .iter()
        .map(|b| b.is_some_and(|b| b.longer_side() >= min_len))
        .collect();
    let kept = keep.iter().filter(|&&k| k).count();
    debug!(components = count, kept, min_len, "filtered line components");

    let mut filtered = GrayImage::new(mask.width(), mask.height());
    for ((_, _, label), dst) in labels.enumerate_pixels().zip(filtered.pixels_mut()) {
        if keep[label[0] as usize] {
            dst.0 = [255];
        }
    }
    fill_holes(&mut filtered);
    filtered
}

/// Set every background pixel that is not 4-connected to the image border.
fn fill_holes(mask: &mut GrayImage) {
    let w = mask.width() as usize;
    let h = mask.height() as usize;
    if w < 3 || h < 3 {
        return;
    }

    let data: &mut [u8] = mask;
    let mut outside = vec![false; w * h];
    let mut stack: Vec<usize> = Vec::new();
    let seed = |idx: usize, outside: &mut Vec<bool>, stack: &mut Vec<usize>| {
        if data[idx] == 0 && !outside[idx] {
            outside[idx] = true;
            stack.push(idx);
        }
    };
    for x in 0..w {
        seed(x, &mut outside, &mut stack);
        seed((h - 1) * w + x, &mut outside, &mut stack);
    }
    for y in 0..h {
        seed(y * w, &mut outside, &mut stack);
        seed(y * w + w - 1, &mut outside, &mut stack);
    }

    while let Some(idx) = stack.pop() {
        let (x, y) = (idx % w, idx / w);
        let mut neighbors = [None; 4];
        if x > 0 {
            neighbors[0] = Some(idx - 1);
        }
        if x + 1 < w {
            neighbors[1] = Some(idx + 1);
        }
        if y > 0 {
            neighbors[2] = Some(idx - w);
        }
        if y + 1 < h {
            neighbors[3] = Some(idx + w);
        }
        for n in neighbors.into_iter().flatten() {
            seed(n, &mut outside, &mut stack);
        }
    }

    for (px, &out) in data.iter_mut().zip(&outside) {
        if !out {
            *px = 255;
        }
    }
}

/// Paint `overlay` pixels in `highlight` over a grayscale rendition of the source.
#[must_use]
pub fn annotate(gray: &GrayImage, overlay: &GrayImage, highlight: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
        if overlay.get_pixel(x, y)[0] == 255 {
            Rgb(highlight)
        } else {
            let v = gray.get_pixel(x, y)[0];
            Rgb([v, v, v])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] == 255).count()
    }

    #[test]
    fn component_filter_drops_short_blobs() {
        let mut mask = GrayImage::new(200, 50);
        for x in 10..160 {
            mask.put_pixel(x, 10, Luma([255]));
        }
        for x in 10..60 {
            mask.put_pixel(x, 30, Luma([255]));
        }
        let filtered = filter_components(&mask, 100);
        assert_eq!(lit(&filtered), 150);
        assert_eq!(filtered.get_pixel(10, 30)[0], 0);
    }

    #[test]
    fn component_filter_fills_enclosed_holes() {
        let mut mask = GrayImage::new(160, 40);
        for x in 10..130 {
            mask.put_pixel(x, 10, Luma([255]));
            mask.put_pixel(x, 20, Luma([255]));
        }
        for y in 10..=20 {
            mask.put_pixel(10, y, Luma([255]));
            mask.put_pixel(129, y, Luma([255]));
        }
        let filtered = filter_components(&mask, 100);
        assert_eq!(filtered.get_pixel(60, 15)[0], 255);
        assert_eq!(lit(&filtered), 120 * 11);
    }

    #[test]
    fn uniform_image_has_no_lines() {
        let image = RgbImage::from_pixel(120, 90, Rgb([30, 120, 200]));
        let masks = extract_lines(&image, &DetectionParams::default()).unwrap();
        assert_eq!(lit(&masks.horizontal), 0);
        assert_eq!(lit(&masks.vertical), 0);
    }

    #[test]
    fn long_step_edge_lands_in_matching_mask() {
        let image = RgbImage::from_fn(300, 200, |_, y| {
            if y < 100 {
                Rgb([20, 20, 20])
            } else {
                Rgb([220, 220, 220])
            }
        });
        let masks = extract_lines(&image, &DetectionParams::default()).unwrap();
        assert_eq!(lit(&masks.horizontal), 300);
        assert_eq!(lit(&masks.vertical), 0);
        assert!((0..300).all(|x| masks.horizontal.get_pixel(x, 99)[0] == 255));
    }

    #[test]
    fn kernel_longer_than_image_yields_empty_masks() {
        let image = RgbImage::from_fn(20, 20, |x, _| {
            if x < 10 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let masks = extract_lines(&image, &DetectionParams::default()).unwrap();
        assert_eq!(lit(&masks.horizontal), 0);
        assert_eq!(lit(&masks.vertical), 0);
    }

    #[test]
    fn annotation_paints_overlay_and_keeps_shape() {
        let gray = GrayImage::from_pixel(8, 6, Luma([90]));
        let mut overlay = GrayImage::new(8, 6);
        overlay.put_pixel(3, 2, Luma([255]));
        let annotated = annotate(&gray, &overlay, [255, 0, 0]);
        assert_eq!(annotated.dimensions(), (8, 6));
        assert_eq!(*annotated.get_pixel(3, 2), Rgb([255, 0, 0]));
        assert_eq!(*annotated.get_pixel(0, 0), Rgb([90, 90, 90]));
    }

    #[test]
    fn visualization_covers_combined_lines() {
        let mut horizontal = GrayImage::new(30, 30);
        horizontal.put_pixel(15, 15, Luma([255]));
        let mut vertical = GrayImage::new(30, 30);
        vertical.put_pixel(5, 5, Luma([255]));
        let masks = LineMasks {
            horizontal,
            vertical,
        };
        assert_eq!(lit(&masks.combined()), 2);
        assert_eq!(lit(&masks.visualization()), 50);
    }
}
