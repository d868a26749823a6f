//! Bounded regeneration loop for image generators.
//!
//! A generator is any fallible closure producing an image for a given attempt
//! number. The loop stops at the first image classified as border-free.

use image::RgbImage;
use tracing::{debug, info};

use crate::engine::BorderDetector;
use crate::error::Error;

/// Image chosen by [`generate_until_border_free`].
#[derive(Debug, Clone)]
pub struct Selection {
    /// The selected image.
    pub image: RgbImage,
    /// Number of generations performed, including the selected one.
    pub attempts: u32,
    /// Whether the selected image was classified as having a border.
    pub has_border: bool,
}

/// Generate images until one is border-free, up to `attempts` generations.
///
/// Returns the first border-free image, or the last generated image if every
/// attempt shows a border. Images too small to score count as border-free.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] (converted into `E`) when `attempts`
/// is zero. Generator errors and classification errors abort the loop.
pub fn generate_until_border_free<F, E>(
    detector: &BorderDetector,
    attempts: u32,
    mut generate: F,
) -> Result<Selection, E>
where
    F: FnMut(u32) -> Result<RgbImage, E>,
    E: From<Error>,
{
    if attempts == 0 {
        return Err(Error::parameter("attempts", "must be at least 1").into());
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let image = generate(attempt)?;
        let has_border = match detector.detect(&image) {
            Ok(verdict) => verdict.has_border,
            Err(e) if e.is_degenerate_shape() => false,
            Err(e) => return Err(e.into()),
        };
        debug!(attempt, has_border, "generated candidate");

        if !has_border || attempt == attempts {
            if has_border {
                info!(attempts, "every candidate had a border, keeping the last one");
            }
            return Ok(Selection {
                image,
                attempts: attempt,
                has_border,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// 800x800 image with a solid margin, a band of stripes, and side bars
    /// around a darker interior. The default detector flags it.
    fn framed() -> RgbImage {
        RgbImage::from_fn(800, 800, |x, y| {
            let d = y.min(799 - y);
            let v = if d < 60 {
                150
            } else if d < 92 {
                if (d - 60) / 8 % 2 == 0 {
                    170
                } else {
                    150
                }
            } else if !(60..740).contains(&x) {
                150
            } else {
                130
            };
            Rgb([v, v, v])
        })
    }

    fn plain() -> RgbImage {
        RgbImage::from_pixel(200, 200, Rgb([90, 140, 200]))
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let result = generate_until_border_free::<_, Error>(
            &BorderDetector::default(),
            0,
            |_| Ok(plain()),
        );
        assert!(matches!(
            result,
            Err(Error::InvalidParameter { name: "attempts", .. })
        ));
    }

    #[test]
    fn stops_at_first_clean_image() {
        let mut calls = Vec::new();
        let selection = generate_until_border_free::<_, Error>(
            &BorderDetector::default(),
            5,
            |n| {
                calls.push(n);
                Ok(plain())
            },
        )
        .unwrap();
        assert_eq!(calls, vec![1]);
        assert_eq!(selection.attempts, 1);
        assert!(!selection.has_border);
    }

    #[test]
    fn keeps_last_image_when_all_have_borders() {
        let selection = generate_until_border_free::<_, Error>(
            &BorderDetector::default(),
            2,
            |_| Ok(framed()),
        )
        .unwrap();
        assert_eq!(selection.attempts, 2);
        assert!(selection.has_border);
    }

    #[test]
    fn degenerate_images_count_as_clean() {
        let selection = generate_until_border_free::<_, Error>(
            &BorderDetector::default(),
            3,
            |_| Ok(RgbImage::new(3, 3)),
        )
        .unwrap();
        assert_eq!(selection.attempts, 1);
        assert!(!selection.has_border);
    }

    #[test]
    fn generator_errors_abort() {
        let result = generate_until_border_free(&BorderDetector::default(), 3, |n| {
            if n == 1 {
                Err(Error::Computation("generator offline".to_string()))
            } else {
                Ok(plain())
            }
        });
        assert!(matches!(result, Err(Error::Computation(_))));
    }
}
