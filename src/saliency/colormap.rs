use image::{Rgb, RgbImage};

use crate::math::matrix::Matrix;

/// Jet colour for an 8-bit intensity: dark blue → cyan → yellow → dark red.
pub fn jet(value: u8) -> Rgb<u8> {
    let v = value as f64 / 255.0;
    let channel = |offset: f64| -> u8 {
        let c = (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Quantizes a [0, 1] field to 8 bits (truncating, like a `u8` cast) and
/// maps it through the jet palette.
pub fn colorize(field: &Matrix) -> RgbImage {
    let palette: Vec<Rgb<u8>> = (0..=255u8).map(jet).collect();
    RgbImage::from_fn(field.cols as u32, field.rows as u32, |x, y| {
        let v = field.data[y as usize][x as usize].clamp(0.0, 1.0);
        palette[(255.0 * v) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet(0), Rgb([0, 0, 128]));
        assert_eq!(jet(255), Rgb([128, 0, 0]));
        let mid = jet(128);
        assert!(mid.0[1] == 255, "{:?}", mid);
    }

    #[test]
    fn test_colorize_clamps_out_of_range() {
        let field = Matrix::from_data(vec![vec![-0.5, 2.0]]);
        let img = colorize(&field);
        assert_eq!(*img.get_pixel(0, 0), jet(0));
        assert_eq!(*img.get_pixel(1, 0), jet(255));
    }
}
