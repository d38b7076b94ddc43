use image::RgbImage;
use serde::Serialize;
use thiserror::Error;

/// Side length of the final perceptual icon grid.
pub const ICON_DIM: usize = 11;

/// Downsample grid for the gradient hash: 9 columns give 8 horizontal
/// neighbor comparisons per row.
pub const GRADIENT_COLS: u32 = 9;
pub const GRADIENT_ROWS: u32 = 8;

#[derive(Debug, Error)]
#[error("icon side {icon_dim} does not produce a valid block grid")]
pub struct GeometryError {
    pub icon_dim: usize,
}

/// Derived dimensions for the average-hash pipeline. An image is loaded
/// as a `canvas_dim` square, averaged into `block_dim x block_dim`
/// blocks, then reduced again to the `icon_dim` icon.
#[derive(Debug, Clone, Copy)]
pub struct IconGeometry {
    pub icon_dim: usize,
    pub block_dim: usize,
    pub cell_dim: usize,
    pub canvas_dim: usize,
}

impl IconGeometry {
    pub fn new(icon_dim: usize) -> Result<Self, GeometryError> {
        let block_dim = 2 * icon_dim + 1;
        let cell_dim = icon_dim + 1;
        // The second blur pass (window 3, stride 2) must land exactly on
        // an icon_dim grid.
        if icon_dim == 0 || (block_dim - 2) % 3 != 0 {
            return Err(GeometryError { icon_dim });
        }
        Ok(Self {
            icon_dim,
            block_dim,
            cell_dim,
            canvas_dim: block_dim * cell_dim,
        })
    }

    pub fn icon_area(&self) -> usize {
        self.icon_dim * self.icon_dim
    }
}

/// A comparable signature for one file, computed at most once per session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fingerprint {
    /// Normalized block-averaged luma samples (average-hash).
    Icon(IconVector),
    /// Lowercase hex SHA-256 of the file content (exact mode).
    Digest(String),
    /// Row-gradient bits, one per horizontal neighbor pair (difference-hash).
    Gradient(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IconVector {
    pub samples: Vec<f32>,
}

impl IconVector {
    /// Sum of squared per-sample differences.
    pub fn squared_distance(&self, other: &Self) -> f64 {
        self.samples
            .iter()
            .zip(&other.samples)
            .map(|(a, b)| {
                let d = (a - b) as f64;
                d * d
            })
            .sum()
    }
}

/// Convert an RGB buffer to a luma plane, reusing `out`.
pub fn luma_plane(img: &RgbImage, out: &mut Vec<f32>) {
    out.clear();
    out.reserve(img.as_raw().len() / 3);
    for px in img.as_raw().chunks_exact(3) {
        out.push(0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32);
    }
}

/// Box-average a square `dim x dim` plane with the given window and
/// stride, producing a `(dim - window) / stride + 1` square grid.
pub fn box_blur(data: &[f32], dim: usize, window: usize, stride: usize) -> Vec<f32> {
    let dest_dim = (dim - window) / stride + 1;
    let mut out = Vec::with_capacity(dest_dim * dest_dim);
    let n = (window * window) as f32;

    let mut row0 = 0;
    while row0 + window <= dim {
        let mut col0 = 0;
        while col0 + window <= dim {
            let mut sum = 0.0f32;
            for row in 0..window {
                for col in 0..window {
                    sum += data[(row0 + row) * dim + (col0 + col)];
                }
            }
            out.push(sum / n);
            col0 += stride;
        }
        row0 += stride;
    }
    out
}

/// Min-max normalize samples into [0, 255]. A near-constant plane keeps
/// its original value everywhere instead of dividing by the ~zero range.
pub fn normalize(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in samples.iter() {
        min = min.min(v);
        max = max.max(v);
    }
    let range = max - min;
    if range < 1e-5 {
        let fill = samples[0];
        for s in samples.iter_mut() {
            *s = fill;
        }
        return;
    }
    for s in samples.iter_mut() {
        *s = (*s - min) * 255.0 / range;
    }
}

/// Pack the row-gradient bits of a 9x8 luma plane, row-major, MSB first.
/// A bit is set when a pixel is brighter than its right neighbor.
pub fn gradient_bits(luma: &[f32]) -> u64 {
    let cols = GRADIENT_COLS as usize;
    let mut bits = 0u64;
    for row in 0..GRADIENT_ROWS as usize {
        for col in 0..cols - 1 {
            let left = luma[row * cols + col];
            let right = luma[row * cols + col + 1];
            bits = (bits << 1) | u64::from(left > right);
        }
    }
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_for_default_icon_dim() {
        let geom = IconGeometry::new(ICON_DIM).unwrap();
        assert_eq!(geom.block_dim, 23);
        assert_eq!(geom.cell_dim, 12);
        assert_eq!(geom.canvas_dim, 276);
        assert_eq!(geom.icon_area(), 121);

        // First pass: (276 - 12) / 12 + 1 = 23; second: (23 - 3) / 2 + 1 = 11.
        assert_eq!((geom.canvas_dim - geom.cell_dim) / geom.cell_dim + 1, 23);
        assert_eq!((geom.block_dim - 3) / 2 + 1, ICON_DIM);
    }

    #[test]
    fn geometry_rejects_invalid_icon_dim() {
        assert!(IconGeometry::new(0).is_err());
        // icon_dim 12 -> block_dim 25, (25 - 2) % 3 != 0
        assert!(IconGeometry::new(12).is_err());
    }

    #[test]
    fn box_blur_averages_windows() {
        // 4x4 plane, window 2, stride 2 -> four quadrant means.
        let data = vec![
            1.0, 2.0, 10.0, 20.0, //
            3.0, 4.0, 30.0, 40.0, //
            5.0, 5.0, 0.0, 0.0, //
            5.0, 5.0, 0.0, 4.0,
        ];
        let out = box_blur(&data, 4, 2, 2);
        assert_eq!(out, vec![2.5, 25.0, 5.0, 1.0]);
    }

    #[test]
    fn box_blur_overlapping_windows() {
        // 3x3 plane, window 3, stride 2 -> single full-plane mean.
        let data = vec![0.0, 0.0, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(box_blur(&data, 3, 3, 2), vec![1.0]);
    }

    #[test]
    fn normalize_spans_full_range() {
        let mut samples = vec![10.0, 20.0, 30.0];
        normalize(&mut samples);
        assert_eq!(samples, vec![0.0, 127.5, 255.0]);
    }

    #[test]
    fn normalize_keeps_constant_plane() {
        let mut samples = vec![42.0; 121];
        normalize(&mut samples);
        assert!(samples.iter().all(|&s| s == 42.0));
    }

    #[test]
    fn gradient_bits_follow_row_direction() {
        let cols = GRADIENT_COLS as usize;
        let rows = GRADIENT_ROWS as usize;

        // Brightness increasing to the right: no pixel outshines its
        // right neighbor.
        let ascending: Vec<f32> = (0..rows)
            .flat_map(|_| (0..cols).map(|c| c as f32))
            .collect();
        assert_eq!(gradient_bits(&ascending), 0);

        // Decreasing: every comparison fires.
        let descending: Vec<f32> = (0..rows)
            .flat_map(|_| (0..cols).map(move |c| (cols - c) as f32))
            .collect();
        assert_eq!(gradient_bits(&descending), u64::MAX);
    }

    #[test]
    fn icon_distance_is_summed_squares() {
        let a = IconVector {
            samples: vec![0.0; 121],
        };
        let b = IconVector {
            samples: vec![2.0; 121],
        };
        assert_eq!(a.squared_distance(&b), 4.0 * 121.0);
        assert_eq!(a.squared_distance(&a), 0.0);
    }
}
