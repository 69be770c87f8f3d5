use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use log::debug;

use crate::config::SaliencyConfig;
use crate::error::{LensError, Result};
use crate::math::matrix::Matrix;
use crate::math::tensor::Tensor;
use crate::network::tape::Differentiable;
use crate::saliency::colormap::colorize;
use crate::saliency::ops::{
    gaussian_blur, normalize_masked, percentile, resize_bilinear, threshold_below, CircularMask,
};

/// Result of one saliency computation. Every field has the target size.
#[derive(Debug, Clone)]
pub struct Overlay {
    /// Masked, normalized and thresholded importance, before blurring.
    /// Values are in [0, 1] when `normalized` is set. Otherwise the masked
    /// region was flat and keeps its raw, possibly out-of-range, value.
    pub gradient_map: Matrix,
    /// False-colour rendering of the blurred map.
    pub heatmap: RgbImage,
    /// Heatmap blended over the original image.
    pub image: RgbImage,
    /// `false` when the masked region was flat and normalization was
    /// skipped; colorization clamps the raw field in that case.
    pub normalized: bool,
}

/// Turns the gradient of one class score into a heatmap overlay.
///
/// `compute_overlay` is pure; persisting the result is `OverlayStore`'s job.
#[derive(Debug, Clone)]
pub struct SaliencyEngine {
    config: SaliencyConfig,
}

impl SaliencyEngine {
    pub fn new(config: SaliencyConfig) -> Result<SaliencyEngine> {
        config.validate()?;
        Ok(SaliencyEngine { config })
    }

    pub fn config(&self) -> &SaliencyConfig {
        &self.config
    }

    /// Computes the overlay for `class_index`.
    ///
    /// - `original`: original-resolution image used for blending
    /// - `input`: preprocessed tensor the model was run on
    /// - `target_size`: `(width, height)` of the overlay, normally the
    ///   original image's dimensions
    pub fn compute_overlay<M: Differentiable + ?Sized>(
        &self,
        model: &M,
        original: &RgbImage,
        input: &Tensor,
        class_index: usize,
        target_size: (u32, u32),
    ) -> Result<Overlay> {
        let (width, height) = target_size;
        if width == 0 || height == 0 {
            return Err(LensError::Shape(format!("overlay target {}x{} is empty", width, height)));
        }

        let gradient = model.input_gradient(input, class_index)?;
        let importance = gradient.channel_max_abs();
        let mut field = resize_bilinear(&importance, width, height);

        let mask = CircularMask::for_field(field.cols, field.rows, self.config.mask_margin);
        mask.apply(&mut field);

        let normalized = normalize_masked(&mut field, &mask);
        if !normalized {
            debug!("Masked gradient region is flat; skipping normalization");
        }

        let threshold = percentile(&mask.masked_values(&field), self.config.threshold_percentile);
        threshold_below(&mut field, threshold);

        let blurred = gaussian_blur(&field, self.config.blur_kernel);
        let mut heatmap = colorize(&blurred);
        if heatmap.dimensions() != target_size {
            heatmap = image::imageops::resize(&heatmap, width, height, FilterType::Triangle);
        }

        let image = self.blend(&heatmap, original);
        Ok(Overlay { gradient_map: field, heatmap, image, normalized })
    }

    /// `clip(heatmap_weight * heat + image_weight * original, 0, 255)` per
    /// channel. The original is resized to the heatmap if they differ.
    pub fn blend(&self, heatmap: &RgbImage, original: &RgbImage) -> RgbImage {
        let (width, height) = heatmap.dimensions();
        let resized;
        let original = if original.dimensions() == (width, height) {
            original
        } else {
            resized = image::imageops::resize(original, width, height, FilterType::Triangle);
            &resized
        };

        let hw = self.config.heatmap_weight;
        let iw = self.config.image_weight;
        RgbImage::from_fn(width, height, |x, y| {
            let h = heatmap.get_pixel(x, y).0;
            let o = original.get_pixel(x, y).0;
            let mix = |c: usize| (hw * h[c] as f64 + iw * o[c] as f64).clamp(0.0, 255.0) as u8;
            Rgb([mix(0), mix(1), mix(2)])
        })
    }
}
