//! Single-channel field operations used to turn raw input gradients into a
//! displayable saliency map. Fields are `Matrix` values with
//! `rows = height`, `cols = width`.

use image::imageops::FilterType;
use image::{ImageBuffer, Luma};

use crate::math::matrix::Matrix;

/// Bilinear resize of a non-negative field to `width × height`.
///
/// The image crate clamps float pixels to [0, 1], so the field is scaled by
/// its maximum before resizing and scaled back afterwards.
pub fn resize_bilinear(field: &Matrix, width: u32, height: u32) -> Matrix {
    if field.cols == width as usize && field.rows == height as usize {
        return field.clone();
    }
    let scale = field.values().fold(0.0, f64::max);
    if scale <= 0.0 || field.rows == 0 || field.cols == 0 {
        return Matrix::zeros(height as usize, width as usize);
    }

    let buf: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_fn(
        field.cols as u32,
        field.rows as u32,
        |x, y| Luma([(field.data[y as usize][x as usize] / scale) as f32]),
    );
    let resized = image::imageops::resize(&buf, width, height, FilterType::Triangle);

    let mut res = Matrix::zeros(height as usize, width as usize);
    for (x, y, p) in resized.enumerate_pixels() {
        res.data[y as usize][x as usize] = p.0[0] as f64 * scale;
    }
    res
}

/// Disc centred on the field that approximates the brain region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularMask {
    pub center_x: i64,
    pub center_y: i64,
    pub radius: i64,
}

impl CircularMask {
    /// Radius is half the smaller side minus `margin`, floored at 0 so the
    /// centre pixel always stays inside.
    pub fn for_field(width: usize, height: usize, margin: u32) -> CircularMask {
        let center_x = (width / 2) as i64;
        let center_y = (height / 2) as i64;
        let radius = (center_x.min(center_y) - margin as i64).max(0);
        CircularMask { center_x, center_y, radius }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        let dx = x as i64 - self.center_x;
        let dy = y as i64 - self.center_y;
        dx * dx + dy * dy <= self.radius * self.radius
    }

    /// Zeroes every cell outside the disc.
    pub fn apply(&self, field: &mut Matrix) {
        for (y, row) in field.data.iter_mut().enumerate() {
            for (x, v) in row.iter_mut().enumerate() {
                if !self.contains(x, y) {
                    *v = 0.0;
                }
            }
        }
    }

    /// Values of the cells inside the disc, row-major.
    pub fn masked_values(&self, field: &Matrix) -> Vec<f64> {
        let mut out = Vec::new();
        for (y, row) in field.data.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                if self.contains(x, y) {
                    out.push(v);
                }
            }
        }
        out
    }
}

/// Min-max normalizes the cells inside `mask` to [0, 1].
///
/// Returns `false` and leaves the field untouched when the masked values are
/// flat (max == min).
pub fn normalize_masked(field: &mut Matrix, mask: &CircularMask) -> bool {
    let values = mask.masked_values(field);
    let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if values.is_empty() || hi <= lo {
        return false;
    }
    let range = hi - lo;
    for (y, row) in field.data.iter_mut().enumerate() {
        for (x, v) in row.iter_mut().enumerate() {
            if mask.contains(x, y) {
                *v = (*v - lo) / range;
            }
        }
    }
    true
}

/// `p`-th percentile (0–100) with linear interpolation between the two
/// closest ranks. Returns 0 for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Zeroes every cell strictly below `threshold`.
pub fn threshold_below(field: &mut Matrix, threshold: f64) {
    for v in field.data.iter_mut().flat_map(|row| row.iter_mut()) {
        if *v < threshold {
            *v = 0.0;
        }
    }
}

/// Normalized 1D Gaussian weights for an odd `size`. Sigma follows the
/// usual derivation from the kernel size: `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: usize) -> Vec<f64> {
    let half = (size / 2) as f64;
    let sigma = 0.3 * (half - 1.0) + 0.8;
    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Reflects an out-of-range index back into `0..len` without repeating the
/// edge sample (`dcb|abcd|cba`).
fn reflect(i: i64, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as i64 - 1);
    let mut i = i.rem_euclid(period);
    if i >= len as i64 {
        i = period - i;
    }
    i as usize
}

/// Separable Gaussian blur with a `size × size` kernel.
pub fn gaussian_blur(field: &Matrix, size: usize) -> Matrix {
    if field.rows == 0 || field.cols == 0 || size <= 1 {
        return field.clone();
    }
    let kernel = gaussian_kernel(size);
    let half = (size / 2) as i64;

    let mut horizontal = Matrix::zeros(field.rows, field.cols);
    for y in 0..field.rows {
        for x in 0..field.cols {
            horizontal.data[y][x] = kernel.iter().enumerate()
                .map(|(k, w)| w * field.data[y][reflect(x as i64 + k as i64 - half, field.cols)])
                .sum();
        }
    }

    let mut res = Matrix::zeros(field.rows, field.cols);
    for y in 0..field.rows {
        for x in 0..field.cols {
            res.data[y][x] = kernel.iter().enumerate()
                .map(|(k, w)| w * horizontal.data[reflect(y as i64 + k as i64 - half, field.rows)][x])
                .sum();
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_center_for_small_fields() {
        for side in [1usize, 5, 21, 22, 23, 64] {
            let mask = CircularMask::for_field(side, side, 10);
            assert!(mask.contains(side / 2, side / 2), "side={}", side);
        }
        let mask = CircularMask::for_field(22, 40, 10);
        assert_eq!(mask.radius, 1);
        assert!(!mask.contains(0, 0));
    }

    #[test]
    fn test_mask_zeroes_corners() {
        let mut field = Matrix::from_data(vec![vec![1.0; 30]; 30]);
        let mask = CircularMask::for_field(30, 30, 10);
        mask.apply(&mut field);
        assert_eq!(field.data[0][0], 0.0);
        assert_eq!(field.data[15][15], 1.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert!((percentile(&v, 80.0) - 3.2).abs() < 1e-12);
        assert_eq!(percentile(&v, 0.0), 0.0);
        assert_eq!(percentile(&v, 100.0), 4.0);
        assert_eq!(percentile(&[], 80.0), 0.0);
    }

    #[test]
    fn test_normalize_flat_field_is_noop() {
        let mut field = Matrix::from_data(vec![vec![0.25; 24]; 24]);
        let mask = CircularMask::for_field(24, 24, 10);
        assert!(!normalize_masked(&mut field, &mask));
        assert!(field.values().all(|v| v == 0.25));
    }

    #[test]
    fn test_normalize_only_touches_masked_cells() {
        let mut field = Matrix::from_data((0..24).map(|y| vec![y as f64; 24]).collect());
        let mask = CircularMask::for_field(24, 24, 10);
        assert!(normalize_masked(&mut field, &mask));
        assert_eq!(field.data[0][0], 0.0);
        assert_eq!(field.data[23][23], 23.0);
        let inside = mask.masked_values(&field);
        assert!(inside.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(inside.contains(&0.0) && inside.contains(&1.0));
    }

    #[test]
    fn test_gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(11);
        assert_eq!(k.len(), 11);
        assert!((k.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((k[0] - k[10]).abs() < 1e-15);
        assert!(k[5] > k[4]);
    }

    #[test]
    fn test_blur_preserves_constant_field() {
        let field = Matrix::from_data(vec![vec![0.5; 7]; 5]);
        let blurred = gaussian_blur(&field, 11);
        assert!(blurred.values().all(|v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_reflect_border() {
        assert_eq!(reflect(-1, 4), 1);
        assert_eq!(reflect(-3, 4), 3);
        assert_eq!(reflect(4, 4), 2);
        assert_eq!(reflect(2, 4), 2);
    }

    #[test]
    fn test_resize_keeps_scale_above_one() {
        let field = Matrix::from_data(vec![vec![4.0; 3]; 3]);
        let big = resize_bilinear(&field, 7, 5);
        assert_eq!((big.rows, big.cols), (5, 7));
        assert!(big.values().all(|v| (v - 4.0).abs() < 1e-5));
    }
}
