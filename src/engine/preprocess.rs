//! Image decoding and tensor conversion shared by the engine models.

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageBuffer, Rgb};
use ndarray::Array4;

use super::detector::DetectedFace;
use super::EngineError;

/// Decode an image from raw bytes.
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, EngineError> {
    Ok(image::load_from_memory(data)?)
}

/// Coordinate mapping from letterboxed detector space back to the source image.
#[derive(Debug, Clone, Copy)]
pub struct LetterboxMap {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl LetterboxMap {
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Resize with preserved aspect ratio onto a square canvas, then convert to a
/// NCHW tensor normalized to roughly [-1, 1]. The padding pixel equals the
/// normalization mean so it maps to zero.
pub fn letterbox_to_tensor(image: &DynamicImage, target: u32) -> (Array4<f32>, LetterboxMap) {
    const MEAN: f32 = 127.5;
    const STD: f32 = 128.0;

    let (orig_w, orig_h) = image.dimensions();
    let scale = f32::min(target as f32 / orig_w as f32, target as f32 / orig_h as f32);
    let new_w = ((orig_w as f32 * scale) as u32).max(1);
    let new_h = ((orig_h as f32 * scale) as u32).max(1);

    let resized = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();

    let pad_x = (target - new_w) / 2;
    let pad_y = (target - new_h) / 2;

    let mut canvas = ImageBuffer::from_pixel(target, target, Rgb([128u8, 128, 128]));
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    let mut tensor = Array4::<f32>::zeros((1, 3, target as usize, target as usize));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - MEAN) / STD;
        }
    }

    let map = LetterboxMap {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
    };

    (tensor, map)
}

/// Resize to an exact square and convert to a NCHW RGB tensor with the given
/// mean/std normalization.
pub fn to_nchw(image: &DynamicImage, target: u32, mean: f32, std: f32) -> Array4<f32> {
    let rgb = image
        .resize_exact(target, target, FilterType::Triangle)
        .to_rgb8();

    let mut tensor = Array4::<f32>::zeros((1, 3, target as usize, target as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - mean) / std;
        }
    }

    tensor
}

/// Resize to an exact square and convert to a single-channel grayscale tensor.
/// Pixel values are left raw in [0, 255]; the FER+ emotion head expects them
/// unnormalized.
pub fn to_nchw_gray(image: &DynamicImage, target: u32) -> Array4<f32> {
    let gray = image
        .resize_exact(target, target, FilterType::Triangle)
        .to_luma8();

    let mut tensor = Array4::<f32>::zeros((1, 1, target as usize, target as usize));
    for (x, y, pixel) in gray.enumerate_pixels() {
        tensor[[0, 0, y as usize, x as usize]] = pixel[0] as f32;
    }

    tensor
}

/// Crop the detected face out of the source image, widened by `margin`
/// (a fraction of the box size) on every side and clamped to the frame.
pub fn crop_face(image: &DynamicImage, face: &DetectedFace, margin: f32) -> DynamicImage {
    let (img_w, img_h) = image.dimensions();

    let margin_x = face.width() * margin;
    let margin_y = face.height() * margin;

    let x1 = (face.x1 - margin_x).max(0.0) as u32;
    let y1 = (face.y1 - margin_y).max(0.0) as u32;
    let x2 = (face.x2 + margin_x).min(img_w as f32) as u32;
    let y2 = (face.y2 + margin_y).min(img_h as f32) as u32;

    image.crop_imm(x1, y1, (x2 - x1).max(1), (y2 - y1).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(w, h, Rgb([120u8, 60, 200])))
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_image(b"definitely not an image").is_err());
    }

    #[test]
    fn test_decode_roundtrip_png() {
        let mut bytes = Vec::new();
        test_image(8, 8)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (8, 8));
    }

    #[test]
    fn test_letterbox_tensor_shape() {
        let (tensor, _) = letterbox_to_tensor(&test_image(320, 240), 640);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
    }

    #[test]
    fn test_letterbox_map_roundtrip() {
        let (_, map) = letterbox_to_tensor(&test_image(320, 240), 640);

        // 320x240 scales by 2.0 into 640x480, padded vertically
        let (x, y) = map.to_original(100.0 * map.scale + map.pad_x, 50.0 * map.scale + map.pad_y);
        assert!((x - 100.0).abs() < 0.5);
        assert!((y - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_to_nchw_normalization() {
        let tensor = to_nchw(&test_image(4, 4), 4, 127.5, 128.0);
        assert_eq!(tensor.shape(), &[1, 3, 4, 4]);
        // Red channel pixel 120 -> (120 - 127.5) / 128
        let expected = (120.0 - 127.5) / 128.0;
        assert!((tensor[[0, 0, 0, 0]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_to_nchw_gray_is_raw() {
        let tensor = to_nchw_gray(&DynamicImage::ImageRgb8(ImageBuffer::from_pixel(
            4,
            4,
            Rgb([200u8, 200, 200]),
        )), 4);
        assert_eq!(tensor.shape(), &[1, 1, 4, 4]);
        // Uniform gray input stays in [0, 255], no normalization applied
        assert!(tensor[[0, 0, 0, 0]] > 150.0);
    }

    #[test]
    fn test_crop_face_clamps_to_frame() {
        let face = DetectedFace {
            x1: -10.0,
            y1: -10.0,
            x2: 1000.0,
            y2: 1000.0,
            confidence: 0.9,
        };
        let crop = crop_face(&test_image(64, 48), &face, 0.25);
        assert_eq!(crop.dimensions(), (64, 48));
    }

    #[test]
    fn test_crop_face_with_margin() {
        let face = DetectedFace {
            x1: 20.0,
            y1: 20.0,
            x2: 40.0,
            y2: 40.0,
            confidence: 0.9,
        };
        let crop = crop_face(&test_image(100, 100), &face, 0.0);
        assert_eq!(crop.dimensions(), (20, 20));

        let widened = crop_face(&test_image(100, 100), &face, 0.25);
        assert_eq!(widened.dimensions(), (30, 30));
    }
}
