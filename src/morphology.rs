//! Binary morphology with oriented line structuring elements.
//!
//! Masks are 0/255 [`GrayImage`]s. Each row (or column) is decomposed into
//! runs of foreground pixels and the operation is applied to the runs, so the
//! cost is linear in the image size regardless of kernel length.
//!
//! Erosion ignores pixels outside the image, dilation treats them as
//! background, so an opening never shortens a line that touches the border.
//!
//! The element covers `len / 2` pixels before its anchor and the rest after it.
//! Dilation grows a run by the mirrored reach, so an opening gives back
//! surviving runs at their exact position for every `len`. Implementations
//! that reuse the erosion anchor for dilation shift such runs by one pixel
//! when `len` is even.

use image::GrayImage;

/// Direction of a line structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// `len x 1` element, keeps horizontal runs.
    Horizontal,
    /// `1 x len` element, keeps vertical runs.
    Vertical,
}

/// A `1 x len` rectangular structuring element anchored at its center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineKernel {
    /// Direction of the element.
    pub orientation: Orientation,
    /// Element length in pixels (must be positive).
    pub len: u32,
}

impl LineKernel {
    /// Create a kernel. A zero length is treated as 1.
    #[must_use]
    pub fn new(orientation: Orientation, len: u32) -> Self {
        Self {
            orientation,
            len: len.max(1),
        }
    }

    /// Pixels covered before and after the anchor.
    fn reach(self) -> (usize, usize) {
        let len = self.len as usize;
        let before = len / 2;
        (before, len - 1 - before)
    }
}

/// Inclusive run of foreground pixels along one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Run {
    start: usize,
    end: usize,
}

fn erode_runs(runs: &mut Vec<Run>, len: usize, (before, after): (usize, usize)) {
    runs.retain_mut(|run| {
        let start = if run.start == 0 { 0 } else { run.start + before };
        let end = if run.end == len - 1 {
            Some(run.end)
        } else {
            run.end.checked_sub(after)
        };
        match end {
            Some(end) if start <= end => {
                *run = Run { start, end };
                true
            }
            _ => false,
        }
    });
}

fn dilate_runs(runs: &mut Vec<Run>, len: usize, (before, after): (usize, usize)) {
    let mut merged: Vec<Run> = Vec::with_capacity(runs.len());
    for run in runs.iter() {
        let grown = Run {
            start: run.start.saturating_sub(before),
            end: (run.end + after).min(len - 1),
        };
        match merged.last_mut() {
            Some(last) if grown.start <= last.end + 1 => last.end = last.end.max(grown.end),
            _ => merged.push(grown),
        }
    }
    *runs = merged;
}

/// Apply `op` to the foreground runs of every line along `orientation`.
fn map_runs(
    mask: &GrayImage,
    orientation: Orientation,
    mut op: impl FnMut(&mut Vec<Run>, usize),
) -> GrayImage {
    let w = mask.width() as usize;
    let h = mask.height() as usize;
    let mut result = GrayImage::new(mask.width(), mask.height());
    if w == 0 || h == 0 {
        return result;
    }

    let (lines, len) = match orientation {
        Orientation::Horizontal => (h, w),
        Orientation::Vertical => (w, h),
    };
    let index = |line: usize, pos: usize| match orientation {
        Orientation::Horizontal => line * w + pos,
        Orientation::Vertical => pos * w + line,
    };

    let src = mask.as_raw();
    let out: &mut [u8] = &mut result;
    let mut runs = Vec::new();
    for line in 0..lines {
        runs.clear();
        let mut start = None;
        for pos in 0..len {
            match (src[index(line, pos)] != 0, start) {
                (true, None) => start = Some(pos),
                (false, Some(s)) => {
                    runs.push(Run { start: s, end: pos - 1 });
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push(Run { start: s, end: len - 1 });
        }

        op(&mut runs, len);

        for run in &runs {
            for pos in run.start..=run.end {
                out[index(line, pos)] = 255;
            }
        }
    }
    result
}

/// Erode `mask` with `kernel`, `iterations` times.
#[must_use]
pub fn erode(mask: &GrayImage, kernel: LineKernel, iterations: u32) -> GrayImage {
    let reach = kernel.reach();
    map_runs(mask, kernel.orientation, |runs, len| {
        for _ in 0..iterations {
            erode_runs(runs, len, reach);
        }
    })
}

/// Dilate `mask` with `kernel`, `iterations` times.
#[must_use]
pub fn dilate(mask: &GrayImage, kernel: LineKernel, iterations: u32) -> GrayImage {
    let reach = kernel.reach();
    map_runs(mask, kernel.orientation, |runs, len| {
        for _ in 0..iterations {
            dilate_runs(runs, len, reach);
        }
    })
}

/// Opening: `iterations` erosions followed by `iterations` dilations.
///
/// Removes every run shorter than the combined erosion length.
#[must_use]
pub fn open(mask: &GrayImage, kernel: LineKernel, iterations: u32) -> GrayImage {
    let reach = kernel.reach();
    map_runs(mask, kernel.orientation, |runs, len| {
        for _ in 0..iterations {
            erode_runs(runs, len, reach);
        }
        for _ in 0..iterations {
            dilate_runs(runs, len, reach);
        }
    })
}

/// Closing: `iterations` dilations followed by `iterations` erosions.
///
/// Bridges gaps shorter than the combined dilation length.
#[must_use]
pub fn close(mask: &GrayImage, kernel: LineKernel, iterations: u32) -> GrayImage {
    let reach = kernel.reach();
    map_runs(mask, kernel.orientation, |runs, len| {
        for _ in 0..iterations {
            dilate_runs(runs, len, reach);
        }
        for _ in 0..iterations {
            erode_runs(runs, len, reach);
        }
    })
}

/// Dilate with a `size x size` square, `iterations` times.
#[must_use]
pub fn dilate_square(mask: &GrayImage, size: u32, iterations: u32) -> GrayImage {
    let rows = dilate(mask, LineKernel::new(Orientation::Horizontal, size), iterations);
    dilate(&rows, LineKernel::new(Orientation::Vertical, size), iterations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn row_mask(width: u32, on: &[std::ops::Range<u32>]) -> GrayImage {
        GrayImage::from_fn(width, 1, |x, _| {
            Luma([if on.iter().any(|r| r.contains(&x)) { 255 } else { 0 }])
        })
    }

    fn lit(mask: &GrayImage) -> Vec<u32> {
        (0..mask.width())
            .filter(|&x| mask.get_pixel(x, 0)[0] == 255)
            .collect()
    }

    #[test]
    fn opening_keeps_long_runs_exactly() {
        let mask = row_mask(100, &[10..60]);
        let opened = open(&mask, LineKernel::new(Orientation::Horizontal, 30), 1);
        assert_eq!(lit(&opened), (10..60).collect::<Vec<_>>());
    }

    #[test]
    fn opening_removes_short_runs() {
        let mask = row_mask(100, &[10..30, 50..90]);
        let opened = open(&mask, LineKernel::new(Orientation::Horizontal, 30), 1);
        assert_eq!(lit(&opened), (50..90).collect::<Vec<_>>());
    }

    #[test]
    fn iterated_opening_needs_longer_runs() {
        // Two erosions by 30 erase anything shorter than 59 pixels.
        let mask = row_mask(200, &[20..78, 100..159]);
        let opened = open(&mask, LineKernel::new(Orientation::Horizontal, 30), 2);
        assert_eq!(lit(&opened), (100..159).collect::<Vec<_>>());
    }

    #[test]
    fn runs_touching_the_border_survive_opening() {
        // 41 pixels would be erased in the interior but survive at the border.
        let mask = row_mask(100, &[0..41, 50..91]);
        let opened = open(&mask, LineKernel::new(Orientation::Horizontal, 30), 2);
        assert_eq!(lit(&opened), (0..41).collect::<Vec<_>>());
    }

    #[test]
    fn closing_bridges_small_gaps() {
        let mask = row_mask(400, &[150..190, 195..240]);
        let closed = close(&mask, LineKernel::new(Orientation::Horizontal, 30), 4);
        assert_eq!(lit(&closed), (150..240).collect::<Vec<_>>());
    }

    #[test]
    fn vertical_kernel_works_on_columns() {
        let mut mask = GrayImage::new(5, 80);
        for y in 10..70 {
            mask.put_pixel(2, y, Luma([255]));
        }
        for x in 0..5 {
            mask.put_pixel(x, 40, Luma([255]));
        }
        let opened = open(&mask, LineKernel::new(Orientation::Vertical, 30), 1);
        let lit: Vec<(u32, u32)> = opened
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(lit.len(), 60);
        assert!(lit.iter().all(|&(x, _)| x == 2));
    }

    #[test]
    fn square_dilation_grows_in_both_directions() {
        let mut mask = GrayImage::new(11, 11);
        mask.put_pixel(5, 5, Luma([255]));
        let grown = dilate_square(&mask, 3, 2);
        let count = grown.pixels().filter(|p| p[0] == 255).count();
        assert_eq!(count, 25);
        assert_eq!(grown.get_pixel(3, 3)[0], 255);
        assert_eq!(grown.get_pixel(2, 5)[0], 0);
    }

    #[test]
    fn erosion_and_dilation_are_inverse_on_interior_runs() {
        let mask = row_mask(100, &[40..60]);
        let kernel = LineKernel::new(Orientation::Horizontal, 5);
        let eroded = erode(&mask, kernel, 1);
        assert_eq!(lit(&eroded), (42..58).collect::<Vec<_>>());
        let restored = dilate(&eroded, kernel, 1);
        assert_eq!(lit(&restored), (40..60).collect::<Vec<_>>());
    }
}
