use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, GrayImage, ImageError, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;

/// Background fill used for padding and for rotation-exposed corners
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Symmetric padding needed to make a w x h image square, as (top, bottom, left, right).
/// The shorter axis receives the full difference, split with the remainder on the far side.
pub fn square_padding(width: u32, height: u32) -> (u32, u32, u32, u32) {
    let mut top = 0;
    let mut bottom = 0;
    let mut left = 0;
    let mut right = 0;

    if width < height {
        let diff = height - width;
        left = diff / 2;
        right = diff - left;
    }

    if height < width {
        let diff = width - height;
        top = diff / 2;
        bottom = diff - top;
    }

    (top, bottom, left, right)
}

/// Equalize the intensity of a color image.
///
/// The image is converted to YCbCr (BT.601 full range), the luma plane is
/// histogram-equalized, and the result is converted back to RGB. Chroma is
/// untouched, so colors keep their hue while contrast evens out across
/// heterogeneous source images.
pub fn equalize_intensity(img: &DynamicImage) -> DynamicImage {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut luma = GrayImage::new(width, height);
    let mut cb = vec![0.0f32; (width * height) as usize];
    let mut cr = vec![0.0f32; (width * height) as usize];

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let r = pixel[0] as f32;
        let g = pixel[1] as f32;
        let b = pixel[2] as f32;
        let y_val = 0.299 * r + 0.587 * g + 0.114 * b;
        let idx = (y * width + x) as usize;
        cb[idx] = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
        cr[idx] = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
        luma.put_pixel(x, y, image::Luma([y_val.round().clamp(0.0, 255.0) as u8]));
    }

    let equalized = equalize_histogram(&luma);

    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in equalized.enumerate_pixels() {
        let idx = (y * width + x) as usize;
        let y_val = pixel[0] as f32;
        let r = y_val + 1.402 * (cr[idx] - 128.0);
        let g = y_val - 0.344_136 * (cb[idx] - 128.0) - 0.714_136 * (cr[idx] - 128.0);
        let b = y_val + 1.772 * (cb[idx] - 128.0);
        out.put_pixel(
            x,
            y,
            Rgb([
                r.round().clamp(0.0, 255.0) as u8,
                g.round().clamp(0.0, 255.0) as u8,
                b.round().clamp(0.0, 255.0) as u8,
            ]),
        );
    }

    DynamicImage::ImageRgb8(out)
}

/// Pad an image to a square with `extra` additional margin pixels on every side.
/// The background fill is white.
pub fn pad_to_square(img: &DynamicImage, extra: u32) -> RgbImage {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let (mut top, mut bottom, mut left, mut right) = square_padding(width, height);

    if extra > 0 {
        top += extra;
        bottom += extra;
        left += extra;
        right += extra;
    }

    if top == 0 && bottom == 0 && left == 0 && right == 0 {
        return rgb;
    }

    let mut canvas = RgbImage::from_pixel(width + left + right, height + top + bottom, BACKGROUND);
    imageops::replace(&mut canvas, &rgb, left as i64, top as i64);
    canvas
}

/// Normalize an image for classifier input: equalize intensity, pad to a
/// white-backed square with an extra uniform margin, and resize to
/// `target_size` x `target_size` with linear interpolation.
///
/// An image that is already square at `target_size` with no requested margin
/// is returned unchanged.
pub fn normalize_image(
    img: &DynamicImage,
    target_size: u32,
    pad_pixels: u32,
) -> Result<DynamicImage, ImageError> {
    let (width, height) = img.dimensions();

    if width == target_size && height == target_size && pad_pixels == 0 {
        return Ok(img.clone());
    }

    let equalized = equalize_intensity(img);
    let padded = pad_to_square(&equalized, pad_pixels);

    let result = if padded.width() != target_size {
        imageops::resize(&padded, target_size, target_size, FilterType::Triangle)
    } else {
        padded
    };

    Ok(DynamicImage::ImageRgb8(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn square_padding_splits_width_deficit_symmetrically() {
        let (top, bottom, left, right) = square_padding(300, 400);
        assert_eq!((top, bottom), (0, 0));
        assert_eq!(left, 50);
        assert_eq!(right, 50);

        // odd difference: remainder lands on the right
        let (_, _, left, right) = square_padding(300, 401);
        assert_eq!(left, 50);
        assert_eq!(right, 51);
        assert_eq!(left + right, 101);
        assert_eq!(left, 101 / 2);
    }

    #[test]
    fn square_padding_splits_height_deficit_symmetrically() {
        let (top, bottom, left, right) = square_padding(401, 300);
        assert_eq!((left, right), (0, 0));
        assert_eq!(top, 50);
        assert_eq!(bottom, 51);
    }

    #[test]
    fn square_image_needs_no_padding() {
        assert_eq!(square_padding(128, 128), (0, 0, 0, 0));
    }

    #[test]
    fn pad_to_square_produces_expected_side_length() {
        let img = gradient_image(200, 299);
        let padded = pad_to_square(&img, 10);
        assert_eq!(padded.width(), 299 + 20);
        assert_eq!(padded.height(), 299 + 20);

        // corners come from the white background
        assert_eq!(*padded.get_pixel(0, 0), BACKGROUND);
        assert_eq!(*padded.get_pixel(318, 318), BACKGROUND);
    }

    #[test]
    fn normalize_squares_non_square_images_at_target_size() {
        for (w, h) in [(100, 200), (200, 100), (37, 299), (299, 150)] {
            let img = gradient_image(w, h);
            let out = normalize_image(&img, 299, 10).unwrap();
            assert_eq!(out.width(), 299);
            assert_eq!(out.height(), 299);
        }
    }

    #[test]
    fn normalize_is_a_no_op_for_conforming_images() {
        let img = gradient_image(299, 299);
        let out = normalize_image(&img, 299, 0).unwrap();
        assert_eq!(out.to_rgb8().as_raw(), img.to_rgb8().as_raw());
    }

    #[test]
    fn normalize_resizes_conforming_images_when_margin_requested() {
        let img = gradient_image(299, 299);
        let out = normalize_image(&img, 299, 10).unwrap();
        // padded to 319 then resized back down
        assert_eq!(out.width(), 299);
        assert_eq!(out.height(), 299);
    }

    #[test]
    fn equalize_preserves_dimensions() {
        let img = gradient_image(64, 48);
        let out = equalize_intensity(&img);
        assert_eq!(out.dimensions(), (64, 48));
    }
}
