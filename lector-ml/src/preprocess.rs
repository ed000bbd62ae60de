use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use ndarray::Array4;

/// Per-channel normalization applied after scaling pixels to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// Where the resized content sits inside the model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub target_width: u32,
    pub target_height: u32,
    pub content_width: u32,
    pub content_height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
}

impl Letterbox {
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            target_width: width,
            target_height: height,
            content_width: width,
            content_height: height,
            offset_x: 0,
            offset_y: 0,
        }
    }

    /// Maps a point given relative to the model input back to a point
    /// relative to the original image, clamped to `[0, 1]`.
    pub fn to_page(&self, x: f32, y: f32) -> (f32, f32) {
        let x = (x * self.target_width as f32 - self.offset_x as f32)
            / self.content_width.max(1) as f32;
        let y = (y * self.target_height as f32 - self.offset_y as f32)
            / self.content_height.max(1) as f32;
        (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0))
    }
}

/// Resizes `image` to `(height, width)`.
///
/// With `preserve_aspect_ratio` the image is scaled to fit and the remainder
/// is zero padded, either evenly on both sides (`symmetric_pad`) or on the
/// bottom/right only.
pub fn resize(
    image: &DynamicImage,
    (height, width): (u32, u32),
    preserve_aspect_ratio: bool,
    symmetric_pad: bool,
) -> (RgbImage, Letterbox) {
    let (orig_w, orig_h) = image.dimensions();
    if !preserve_aspect_ratio || orig_w == 0 || orig_h == 0 {
        let resized = image
            .resize_exact(width, height, FilterType::Triangle)
            .to_rgb8();
        return (resized, Letterbox::identity(width, height));
    }

    let scale = (width as f32 / orig_w as f32).min(height as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, width);
    let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, height);
    let resized = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let (offset_x, offset_y) = if symmetric_pad {
        ((width - new_w) / 2, (height - new_h) / 2)
    } else {
        (0, 0)
    };

    let mut canvas = RgbImage::new(width, height);
    image::imageops::overlay(&mut canvas, &resized, offset_x as i64, offset_y as i64);

    let letterbox = Letterbox {
        target_width: width,
        target_height: height,
        content_width: new_w,
        content_height: new_h,
        offset_x,
        offset_y,
    };

    (canvas, letterbox)
}

/// Stacks equally sized images into a normalized NCHW tensor.
pub fn to_tensor(
    images: &[RgbImage],
    (height, width): (u32, u32),
    normalization: &Normalization,
) -> Array4<f32> {
    let mut tensor = Array4::zeros((images.len(), 3, height as usize, width as usize));
    for (n, image) in images.iter().enumerate() {
        for (x, y, pixel) in image.enumerate_pixels() {
            if x >= width || y >= height {
                continue;
            }
            for c in 0..3 {
                tensor[[n, c, y as usize, x as usize]] =
                    (pixel[c] as f32 / 255.0 - normalization.mean[c]) / normalization.std[c];
            }
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    const UNIT: Normalization = Normalization {
        mean: [0.0, 0.0, 0.0],
        std: [1.0, 1.0, 1.0],
    };

    #[test]
    fn wide_image_is_padded_vertically() {
        let image = DynamicImage::new_rgb8(200, 100);
        let (resized, letterbox) = resize(&image, (64, 64), true, true);

        assert_eq!(resized.dimensions(), (64, 64));
        assert_eq!((letterbox.content_width, letterbox.content_height), (64, 32));
        assert_eq!((letterbox.offset_x, letterbox.offset_y), (0, 16));
    }

    #[test]
    fn asymmetric_padding_keeps_content_top_left() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([255, 255, 255])));
        let (resized, letterbox) = resize(&image, (32, 128), true, false);

        assert_eq!((letterbox.offset_x, letterbox.offset_y), (0, 0));
        assert_eq!(letterbox.content_height, 32);
        assert_eq!(resized.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(resized.get_pixel(127, 31), &Rgb([0, 0, 0]));
    }

    #[test]
    fn stretch_without_aspect_ratio() {
        let image = DynamicImage::new_rgb8(10, 300);
        let (resized, letterbox) = resize(&image, (32, 128), false, true);
        assert_eq!(resized.dimensions(), (128, 32));
        assert_eq!(letterbox, Letterbox::identity(128, 32));
    }

    #[test]
    fn letterbox_maps_back_to_page() {
        let letterbox = Letterbox {
            target_width: 100,
            target_height: 100,
            content_width: 100,
            content_height: 50,
            offset_x: 0,
            offset_y: 25,
        };

        let (x, y) = letterbox.to_page(0.5, 0.5);
        assert!((x - 0.5).abs() < 1e-6);
        assert!((y - 0.5).abs() < 1e-6);

        // points inside the padding clamp to the page edge
        assert_eq!(letterbox.to_page(0.0, 0.1), (0.0, 0.0));
        assert_eq!(letterbox.to_page(1.0, 0.9), (1.0, 1.0));
    }

    #[test]
    fn tensor_is_nchw_and_normalized() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(1, 0, Rgb([255, 0, 51]));

        let tensor = to_tensor(&[image.clone(), image], (1, 2), &UNIT);

        assert_eq!(tensor.shape(), &[2, 3, 1, 2]);
        assert_eq!(tensor[[1, 0, 0, 1]], 1.0);
        assert_eq!(tensor[[1, 1, 0, 1]], 0.0);
        assert!((tensor[[0, 2, 0, 1]] - 0.2).abs() < 1e-6);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
    }
}
