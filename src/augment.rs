use image::DynamicImage;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::{Rng, RngCore};

use crate::normalize::BACKGROUND;

/// Rotation bound for augmented variants, in degrees either side of zero
const MAX_ROTATION_DEGREES: f32 = 45.0;

/// Produce `count` augmented variants of a normalized image.
///
/// Each variant is derived independently from the input: with probability 0.5
/// it is mirrored horizontally, then rotated about its center by an angle
/// drawn uniformly from [-45, +45] degrees, exposed corners filled white.
/// The base image itself is not included in the returned set.
pub fn generate_variants(
    img: &DynamicImage,
    count: usize,
    rng: &mut dyn RngCore,
) -> Vec<DynamicImage> {
    let mut variants = Vec::with_capacity(count);

    for _ in 0..count {
        let source = if rng.gen_bool(0.5) { img.fliph() } else { img.clone() };

        let angle: f32 = rng.gen_range(-MAX_ROTATION_DEGREES..=MAX_ROTATION_DEGREES);
        let rotated = rotate_about_center(
            &source.to_rgb8(),
            angle.to_radians(),
            Interpolation::Bilinear,
            BACKGROUND,
        );

        variants.push(DynamicImage::ImageRgb8(rotated));
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn checkerboard(size: u32) -> DynamicImage {
        let img = RgbImage::from_fn(size, size, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([200, 200, 200])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn produces_exactly_the_requested_count() {
        let img = checkerboard(64);
        let mut rng = StdRng::seed_from_u64(42);
        for count in [0, 1, 3, 7] {
            let variants = generate_variants(&img, count, &mut rng);
            assert_eq!(variants.len(), count);
        }
    }

    #[test]
    fn variants_keep_the_source_dimensions() {
        let img = checkerboard(64);
        let mut rng = StdRng::seed_from_u64(7);
        for variant in generate_variants(&img, 5, &mut rng) {
            assert_eq!(variant.width(), 64);
            assert_eq!(variant.height(), 64);
        }
    }

    #[test]
    fn variants_are_independent_of_each_other() {
        // Two runs from the same seed must agree, so no variant mutates
        // shared state consumed by the next one.
        let img = checkerboard(32);
        let first: Vec<_> = generate_variants(&img, 4, &mut StdRng::seed_from_u64(99))
            .into_iter()
            .map(|v| v.to_rgb8().into_raw())
            .collect();
        let second: Vec<_> = generate_variants(&img, 4, &mut StdRng::seed_from_u64(99))
            .into_iter()
            .map(|v| v.to_rgb8().into_raw())
            .collect();
        assert_eq!(first, second);
    }
}
