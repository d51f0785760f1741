use image::DynamicImage;
use ndarray::prelude::*;

use crate::errors::{Result, SuperpixelError};
use crate::segmentation::{Segmentation, SegmentationParams};
use crate::traits::{FeatureExtractor, Segmenter};

/// Regular-tiling oversegmentation.
///
/// Splits the image into an approximately square grid of
/// `params.num_superpixels` tiles with 4-neighbor adjacency. A stand-in for a
/// full SLIC-style segmenter behind the same [`Segmenter`] interface; the
/// compactness control is irrelevant here because tiles are already maximally
/// regular.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridSegmenter;

impl GridSegmenter {
    fn grid_shape(width: usize, height: usize, target: usize) -> (usize, usize) {
        let target = target.max(1) as f64;
        let aspect = height as f64 / width as f64;
        let rows = (target * aspect).sqrt().round().max(1.0) as usize;
        let cols = ((target / rows as f64).round().max(1.0)) as usize;
        (rows.min(height), cols.min(width))
    }
}

impl Segmenter for GridSegmenter {
    fn segment(&self, image: &DynamicImage, params: &SegmentationParams) -> Result<Segmentation> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if width == 0 || height == 0 {
            return Err(SuperpixelError::Validation {
                field: "image".to_string(),
                reason: "zero-sized image cannot be segmented".to_string(),
            });
        }

        let (rows, cols) = Self::grid_shape(width, height, params.num_superpixels);
        let map = Array2::from_shape_fn((height, width), |(y, x)| {
            let tile_row = y * rows / height;
            let tile_col = x * cols / width;
            (tile_row * cols + tile_col) as u32
        });

        let mut edges = Vec::with_capacity(2 * rows * cols);
        for tile_row in 0..rows {
            for tile_col in 0..cols {
                let id = (tile_row * cols + tile_col) as u32;
                if tile_col + 1 < cols {
                    edges.push((id, id + 1));
                }
                if tile_row + 1 < rows {
                    edges.push((id, id + cols as u32));
                }
            }
        }

        Ok(Segmentation::new(map, edges))
    }
}

/// Per-superpixel color statistics: mean and standard deviation of each RGB
/// channel, six features per row.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorStatFeatures;

impl FeatureExtractor for ColorStatFeatures {
    fn compute_features(
        &self,
        image: &DynamicImage,
        segmentation: &Segmentation,
        exclude: &[u32],
    ) -> Result<Array2<f32>> {
        let rgb = image.to_rgb8();
        let (height, width) = segmentation.shape();
        if (rgb.height() as usize, rgb.width() as usize) != (height, width) {
            return Err(SuperpixelError::Validation {
                field: "segmentation".to_string(),
                reason: format!(
                    "index map shape ({}, {}) does not match image {}x{}",
                    height,
                    width,
                    rgb.width(),
                    rgb.height()
                ),
            });
        }

        let ids = segmentation.superpixel_ids();
        let mut sums = vec![[0.0f64; 3]; ids.len()];
        let mut square_sums = vec![[0.0f64; 3]; ids.len()];
        let mut counts = vec![0usize; ids.len()];

        let map = segmentation.index_map();
        for (y, x) in ndarray::indices((height, width)) {
            let idx = ids.binary_search(&map[[y, x]]).map_err(|_| {
                SuperpixelError::DataIntegrity {
                    context: "feature index map lookup".to_string(),
                    expected: ids.len(),
                    actual: map[[y, x]] as usize,
                }
            })?;
            let pixel = rgb.get_pixel(x as u32, y as u32);
            for channel in 0..3 {
                let v = pixel[channel] as f64;
                sums[idx][channel] += v;
                square_sums[idx][channel] += v * v;
            }
            counts[idx] += 1;
        }

        let kept: Vec<usize> = (0..ids.len())
            .filter(|&i| !exclude.contains(&ids[i]))
            .collect();
        let mut features = Array2::zeros((kept.len(), 6));
        for (row, &idx) in kept.iter().enumerate() {
            let n = counts[idx] as f64;
            for channel in 0..3 {
                let mean = sums[idx][channel] / n;
                let variance = (square_sums[idx][channel] / n - mean * mean).max(0.0);
                features[[row, channel]] = mean as f32;
                features[[row, 3 + channel]] = variance.sqrt() as f32;
            }
        }
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::synthetic_image;

    #[test]
    fn grid_segments_cover_every_pixel_once() {
        let image = synthetic_image(30, 20);
        let seg = GridSegmenter
            .segment(
                &image,
                &SegmentationParams {
                    num_superpixels: 6,
                    compactness: 10.0,
                },
            )
            .unwrap();
        let total: usize = seg
            .superpixel_ids()
            .iter()
            .map(|&id| seg.pixel_count(id))
            .sum();
        assert_eq!(total, 600);
        assert!(!seg.edges().is_empty());
    }

    #[test]
    fn grid_shape_tracks_aspect_ratio() {
        let (rows, cols) = GridSegmenter::grid_shape(100, 100, 16);
        assert_eq!((rows, cols), (4, 4));
        let (rows, cols) = GridSegmenter::grid_shape(200, 50, 16);
        assert!(cols > rows);
    }

    #[test]
    fn color_features_have_one_row_per_kept_superpixel() {
        let image = synthetic_image(8, 8);
        let seg = GridSegmenter
            .segment(
                &image,
                &SegmentationParams {
                    num_superpixels: 4,
                    compactness: 10.0,
                },
            )
            .unwrap();
        let all = ColorStatFeatures
            .compute_features(&image, &seg, &[])
            .unwrap();
        assert_eq!(all.nrows(), seg.len());
        assert_eq!(all.ncols(), 6);

        let first_id = seg.superpixel_ids()[0];
        let some = ColorStatFeatures
            .compute_features(&image, &seg, &[first_id])
            .unwrap();
        assert_eq!(some.nrows(), seg.len() - 1);
    }

    #[test]
    fn uniform_region_has_zero_deviation() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            6,
            6,
            image::Rgb([10, 20, 30]),
        ));
        let seg = GridSegmenter
            .segment(
                &image,
                &SegmentationParams {
                    num_superpixels: 4,
                    compactness: 10.0,
                },
            )
            .unwrap();
        let features = ColorStatFeatures
            .compute_features(&image, &seg, &[])
            .unwrap();
        for row in features.outer_iter() {
            assert_eq!(row[0], 10.0);
            assert_eq!(row[1], 20.0);
            assert_eq!(row[2], 30.0);
            assert_eq!(row[3], 0.0);
        }
    }
}
