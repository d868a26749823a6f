//! Grayscale conversion and Canny edge detection.
//!
//! The gradient uses an unnormalized separable Sobel kernel of configurable
//! aperture with replicated borders, followed by non-maximum suppression and
//! hysteresis on the L1 gradient magnitude. No pre-blur is applied: a large
//! aperture already smooths the gradient.

use image::{GrayImage, RgbImage};

use crate::params::Aperture;

/// `tan(22.5°)`: below this slope the gradient counts as horizontal.
const TAN_22_5: f32 = 0.414_213_56;
/// `tan(67.5°)`: above this slope the gradient counts as vertical.
const TAN_67_5: f32 = 2.414_213_6;

/// Convert an RGB image to grayscale with luma weights `0.299, 0.587, 0.114`.
///
/// Uses 14-bit fixed point so the result is exact and platform independent.
#[must_use]
pub fn to_grayscale(image: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let lum = 4899 * u32::from(r) + 9617 * u32::from(g) + 1868 * u32::from(b);
        #[allow(clippy::cast_possible_truncation)]
        {
            dst.0 = [((lum + (1 << 13)) >> 14) as u8];
        }
    }
    gray
}

/// Horizontal and vertical Sobel responses for every pixel, row-major.
struct Gradients {
    gx: Vec<i32>,
    gy: Vec<i32>,
}

/// Index `i + k - radius`, clamped into `0..len` (replicated border).
fn clamp_index(i: usize, k: usize, radius: usize, len: usize) -> usize {
    (i + k).saturating_sub(radius).min(len - 1)
}

fn sobel(gray: &GrayImage, aperture: Aperture) -> Gradients {
    let (deriv, smooth) = aperture.kernels();
    let radius = deriv.len() / 2;
    let w = gray.width() as usize;
    let h = gray.height() as usize;
    let src = gray.as_raw();

    // Row pass: derivative and smoothing along x.
    let mut dx = vec![0_i32; w * h];
    let mut sx = vec![0_i32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut d = 0;
            let mut s = 0;
            for (k, (&dk, &sk)) in deriv.iter().zip(smooth).enumerate() {
                let v = i32::from(row[clamp_index(x, k, radius, w)]);
                d += dk * v;
                s += sk * v;
            }
            dx[y * w + x] = d;
            sx[y * w + x] = s;
        }
    }

    // Column pass: gx smooths the x-derivative along y, gy differentiates the x-smoothing.
    let mut gx = vec![0_i32; w * h];
    let mut gy = vec![0_i32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut ax = 0;
            let mut ay = 0;
            for (k, (&dk, &sk)) in deriv.iter().zip(smooth).enumerate() {
                let idx = clamp_index(y, k, radius, h) * w + x;
                ax += sk * dx[idx];
                ay += dk * sx[idx];
            }
            gx[y * w + x] = ax;
            gy[y * w + x] = ay;
        }
    }

    Gradients { gx, gy }
}

/// Canny edge detection.
///
/// Returns a binary map (0 or 255) of the same size as `gray`. Pixels are
/// candidates when they are a local maximum of the L1 gradient magnitude along
/// the quantized gradient direction and exceed `low`; candidates connected
/// (8-neighborhood) to a pixel above `high` become edges.
#[must_use]
pub fn canny(gray: &GrayImage, low: f32, high: f32, aperture: Aperture) -> GrayImage {
    let w = gray.width() as usize;
    let h = gray.height() as usize;
    let mut edges = GrayImage::new(gray.width(), gray.height());
    if w == 0 || h == 0 {
        return edges;
    }

    let Gradients { gx, gy } = sobel(gray, aperture);
    let magnitude: Vec<i32> = gx
        .iter()
        .zip(&gy)
        .map(|(x, y)| x.abs() + y.abs())
        .collect();
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    let mag_at = |x: isize, y: isize| -> i32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            0
        } else {
            magnitude[y as usize * w + x as usize]
        }
    };

    // 0 = suppressed, 1 = weak candidate, 2 = strong edge.
    let mut state = vec![0_u8; w * h];
    let mut stack = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let m = magnitude[idx];
            #[allow(clippy::cast_precision_loss)]
            let mf = m as f32;
            if mf <= low {
                continue;
            }

            #[allow(clippy::cast_possible_wrap)]
            let (xi, yi) = (x as isize, y as isize);
            #[allow(clippy::cast_precision_loss)]
            let (ax, ay) = (gx[idx].abs() as f32, gy[idx].abs() as f32);
            let is_max = if ay < ax * TAN_22_5 {
                m > mag_at(xi - 1, yi) && m >= mag_at(xi + 1, yi)
            } else if ay > ax * TAN_67_5 {
                m > mag_at(xi, yi - 1) && m >= mag_at(xi, yi + 1)
            } else {
                let s: isize = if (gx[idx] ^ gy[idx]) < 0 { -1 } else { 1 };
                m > mag_at(xi - s, yi - 1) && m > mag_at(xi + s, yi + 1)
            };
            if !is_max {
                continue;
            }

            if mf > high {
                state[idx] = 2;
                stack.push(idx);
            } else {
                state[idx] = 1;
            }
        }
    }

    // Hysteresis: grow strong edges through connected weak candidates.
    while let Some(idx) = stack.pop() {
        let (x, y) = (idx % w, idx / w);
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                let n = ny * w + nx;
                if state[n] == 1 {
                    state[n] = 2;
                    stack.push(n);
                }
            }
        }
    }

    for (px, &s) in edges.iter_mut().zip(&state) {
        if s == 2 {
            *px = 255;
        }
    }
    edges
}
