//! Cropping of rendered expressions to their visible content.
//!
//! The background colour is taken from the top-left pixel. Every channel's
//! distance from it is pushed through an add-with-offset step so that faint
//! anti-aliasing fringes drop to zero and only solid foreground survives.

use image::{DynamicImage, GenericImageView, Pixel, Rgb, RgbImage};

/// Divisor of the doubled channel difference.
const SCALE: f32 = 2.0;
/// Offset added after scaling; results below zero are clipped away.
const OFFSET: f32 = -100.0;

/// Axis-aligned region of an image. `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Check whether the pixel at `(x, y)` lies inside the box.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.left..self.right).contains(&x) && (self.top..self.bottom).contains(&y)
    }
}

/// Amplified difference of one channel against the background, clipped to `0..=255`.
fn amplified_difference(value: u8, background: u8) -> u8 {
    let diff = value.abs_diff(background) as f32;
    ((diff + diff) / SCALE + OFFSET).clamp(0.0, 255.0) as u8
}

/// Find the smallest box enclosing every pixel that stands out from the
/// background. Returns `None` for blank images.
pub fn bounding_box<I>(image: &I) -> Option<BoundingBox>
where
    I: GenericImageView,
    I::Pixel: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let background = image.get_pixel(0, 0);
    let mut found: Option<BoundingBox> = None;

    for (x, y, pixel) in image.pixels() {
        let stands_out = pixel
            .channels()
            .iter()
            .zip(background.channels())
            .any(|(&value, &bg)| amplified_difference(value, bg) > 0);
        if !stands_out {
            continue;
        }

        found = Some(match found {
            None => BoundingBox {
                left: x,
                top: y,
                right: x + 1,
                bottom: y + 1,
            },
            Some(b) => BoundingBox {
                left: b.left.min(x),
                top: b.top.min(y),
                right: b.right.max(x + 1),
                bottom: b.bottom.max(y + 1),
            },
        });
    }

    found
}

/// Crop the image to its content. Blank images come back unchanged.
pub fn trim(image: &DynamicImage) -> DynamicImage {
    match bounding_box(image) {
        Some(b) => image.crop_imm(b.left, b.top, b.width(), b.height()),
        None => image.clone(),
    }
}

/// Composite onto opaque white and drop the alpha channel.
///
/// Some clipboard consumers ignore transparency, so images are handed over
/// as plain RGB.
pub fn flatten(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let mut pixel = Rgb([255u8, 255, 255]).to_rgba();
        pixel.blend(rgba.get_pixel(x, y));
        pixel.to_rgb()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use proptest::prelude::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn canvas(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, WHITE)
    }

    #[test]
    fn test_blank_image_is_untouched() {
        let image = DynamicImage::ImageRgba8(canvas(40, 20));
        assert_eq!(bounding_box(&image), None);
        assert_eq!(trim(&image), image);
    }

    #[test]
    fn test_single_pixel_at_centre() {
        let mut image = canvas(41, 21);
        image.put_pixel(20, 10, BLACK);

        let b = bounding_box(&image).unwrap();
        assert_eq!(
            b,
            BoundingBox {
                left: 20,
                top: 10,
                right: 21,
                bottom: 11
            }
        );

        let trimmed = trim(&DynamicImage::ImageRgba8(image));
        assert_eq!((trimmed.width(), trimmed.height()), (1, 1));
        assert_eq!(trimmed.to_rgba8().get_pixel(0, 0), &BLACK);
    }

    #[test]
    fn test_faint_pixels_are_ignored() {
        let mut image = canvas(30, 30);
        // Within 100 of the background on every channel.
        image.put_pixel(2, 2, Rgba([200, 200, 200, 255]));
        image.put_pixel(10, 12, BLACK);
        image.put_pixel(15, 20, BLACK);

        let b = bounding_box(&image).unwrap();
        assert_eq!(
            b,
            BoundingBox {
                left: 10,
                top: 12,
                right: 16,
                bottom: 21
            }
        );
    }

    #[test]
    fn test_background_comes_from_top_left() {
        let mut image = RgbaImage::from_pixel(10, 10, BLACK);
        image.put_pixel(3, 4, WHITE);
        assert_eq!(
            bounding_box(&image),
            Some(BoundingBox {
                left: 3,
                top: 4,
                right: 4,
                bottom: 5
            })
        );
    }

    #[test]
    fn test_amplified_difference_threshold() {
        assert_eq!(amplified_difference(255, 255), 0);
        assert_eq!(amplified_difference(155, 255), 0);
        assert_eq!(amplified_difference(154, 255), 1);
        assert_eq!(amplified_difference(0, 255), 155);
    }

    #[test]
    fn test_flatten_drops_transparency() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        image.put_pixel(1, 0, Rgba([10, 20, 30, 255]));

        let flat = flatten(&DynamicImage::ImageRgba8(image));
        assert_eq!(flat.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgb([10, 20, 30]));
    }

    proptest! {
        #[test]
        fn trim_never_collapses_uniform_images(
            width in 1u32..64,
            height in 1u32..64,
            r: u8, g: u8, b: u8
        ) {
            let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([r, g, b])));
            prop_assert_eq!(trim(&image), image);
        }

        #[test]
        fn bounding_box_is_exact_for_one_dark_pixel(
            width in 2u32..64,
            height in 2u32..64,
            fx in 0.0f64..1.0,
            fy in 0.0f64..1.0
        ) {
            let x = 1 + ((width - 1) as f64 * fx) as u32 % (width - 1);
            let y = 1 + ((height - 1) as f64 * fy) as u32 % (height - 1);
            let mut image = canvas(width, height);
            image.put_pixel(x, y, BLACK);

            let b = bounding_box(&image).unwrap();
            prop_assert!(b.contains(x, y));
            prop_assert_eq!((b.width(), b.height()), (1, 1));
        }
    }
}
