//! Image preprocessing for classifier input.
//!
//! These functions decode uploaded bytes (PNG/JPEG/BMP/GIF), resize them to
//! the classifier's input dimensions, and normalize pixel values to [0, 1].

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;

use crate::error::{LensError, Result};
use crate::math::tensor::Tensor;
use crate::network::metadata::InputType;

/// An image as the user supplied it: original file name plus raw bytes.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Upload {
        Upload { file_name: file_name.into(), bytes }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Upload> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload.png")
            .to_owned();
        Ok(Upload { file_name, bytes })
    }

    pub fn decode(&self) -> Result<RgbImage> {
        decode_rgb(&self.bytes)
    }
}

/// Decodes image bytes into 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(LensError::Decode)?;
    Ok(img.to_rgb8())
}

/// Resizes `image` to the input's `width × height` and normalizes to [0, 1].
///
/// RGB inputs are flattened channels-last as R, G, B, ...; grayscale inputs
/// use the luma of each pixel.
pub fn to_input_tensor(image: &RgbImage, input: InputType) -> Result<Tensor> {
    let (width, height) = input.dimensions();
    let resized = image::imageops::resize(image, width, height, FilterType::Lanczos3);
    let data: Vec<f64> = match input {
        InputType::ImageRgb { .. } => resized
            .pixels()
            .flat_map(|p| p.0.iter().map(|&c| c as f64 / 255.0))
            .collect(),
        InputType::ImageGrayscale { .. } => image::DynamicImage::ImageRgb8(resized)
            .to_luma8()
            .pixels()
            .map(|p| p.0[0] as f64 / 255.0)
            .collect(),
    };
    Tensor::from_vec(input.shape(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tensor::Shape;
    use image::Rgb;

    #[test]
    fn test_decode_rejects_garbage() {
        let upload = Upload::new("scan.png", b"definitely not an image".to_vec());
        assert!(matches!(upload.decode(), Err(LensError::Decode(_))));
    }

    #[test]
    fn test_rgb_tensor_shape_and_range() {
        let img = RgbImage::from_fn(40, 30, |x, y| Rgb([(x * 6) as u8, (y * 8) as u8, 255]));
        let t = to_input_tensor(&img, InputType::ImageRgb { width: 16, height: 12 }).unwrap();
        assert_eq!(t.shape, Shape::new(12, 16, 3));
        assert!(t.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(t.get(5, 5, 2), 1.0);
    }

    #[test]
    fn test_grayscale_tensor_has_one_channel() {
        let img = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let t = to_input_tensor(&img, InputType::ImageGrayscale { width: 4, height: 4 }).unwrap();
        assert_eq!(t.shape, Shape::new(4, 4, 1));
        assert!(t.data.iter().all(|&v| v == 1.0));
    }
}
