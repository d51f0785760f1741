use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SuperpixelError};

/// Oversegmentation controls shared by training and prediction.
///
/// The same parameter set must be used on both sides; the artifact envelope
/// stores the training-time values so prediction callers can check them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    /// Target superpixel count handed to the segmentation algorithm. The
    /// actual count may differ; the index map is the source of truth.
    pub num_superpixels: usize,
    /// Compactness/regularity control. Higher values favor square regions.
    pub compactness: f32,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            num_superpixels: 400,
            compactness: 10.0,
        }
    }
}

/// One image's oversegmentation: a per-pixel superpixel index map plus the
/// adjacency relation between spatially touching superpixels.
///
/// Superpixel identifiers are not guaranteed contiguous or ordered; the set
/// of unique values in the map defines the superpixel population. All
/// enumeration in this crate uses ascending identifier order so feature rows,
/// label rows and predictions stay positionally aligned.
#[derive(Debug, Clone)]
pub struct Segmentation {
    map: Array2<u32>,
    edges: Vec<(u32, u32)>,
    ids: Vec<u32>,
}

impl Segmentation {
    /// Wraps a superpixel index map and its adjacency edge list.
    pub fn new(map: Array2<u32>, edges: Vec<(u32, u32)>) -> Self {
        let mut ids: Vec<u32> = map.iter().copied().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { map, edges, ids }
    }

    /// Spatial shape of the source image, `(height, width)`.
    pub fn shape(&self) -> (usize, usize) {
        self.map.dim()
    }

    pub fn index_map(&self) -> ArrayView2<'_, u32> {
        self.map.view()
    }

    /// Unique superpixel identifiers in ascending order. This is the
    /// canonical enumeration order for feature rows and predicted labels.
    pub fn superpixel_ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Adjacent superpixel pairs, one entry per touching pair.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Boolean membership mask for one superpixel, true exactly where the
    /// index map equals `id`.
    pub fn membership_mask(&self, id: u32) -> Array2<bool> {
        self.map.mapv(|v| v == id)
    }

    /// Number of pixels belonging to `id`.
    pub fn pixel_count(&self, id: u32) -> usize {
        self.map.iter().filter(|&&v| v == id).count()
    }

    /// Paints one value per superpixel back into a full-resolution image.
    ///
    /// `values[i]` is assigned to every pixel of `superpixel_ids()[i]`. The
    /// value count must match the superpixel population exactly; a mismatch
    /// means the caller's per-superpixel sequence drifted out of alignment
    /// and the result would be corrupt.
    pub fn expand(&self, values: &[u32]) -> Result<Array2<u32>> {
        if values.len() != self.ids.len() {
            return Err(SuperpixelError::DataIntegrity {
                context: "superpixel value expansion".to_string(),
                expected: self.ids.len(),
                actual: values.len(),
            });
        }

        let mut out = Array2::<u32>::zeros(self.map.dim());
        for (pixel, out_pixel) in self.map.iter().zip(out.iter_mut()) {
            // ids is sorted, so the positional lookup is a binary search
            let idx = self
                .ids
                .binary_search(pixel)
                .map_err(|_| SuperpixelError::DataIntegrity {
                    context: "superpixel id lookup".to_string(),
                    expected: self.ids.len(),
                    actual: *pixel as usize,
                })?;
            *out_pixel = values[idx];
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn quad_segmentation() -> Segmentation {
        // 4x4 image, 2x2 superpixel grid with non-contiguous ids
        let map = array![
            [0, 0, 5, 5],
            [0, 0, 5, 5],
            [7, 7, 9, 9],
            [7, 7, 9, 9],
        ];
        Segmentation::new(map, vec![(0, 5), (0, 7), (5, 9), (7, 9)])
    }

    #[test]
    fn ids_are_sorted_unique() {
        let seg = quad_segmentation();
        assert_eq!(seg.superpixel_ids(), &[0, 5, 7, 9]);
        assert_eq!(seg.len(), 4);
    }

    #[test]
    fn membership_mask_selects_quadrant() {
        let seg = quad_segmentation();
        let mask = seg.membership_mask(9);
        assert_eq!(mask.iter().filter(|&&b| b).count(), 4);
        assert!(mask[[2, 2]] && mask[[3, 3]]);
        assert!(!mask[[0, 0]]);
        assert_eq!(seg.pixel_count(9), 4);
    }

    #[test]
    fn expand_paints_each_superpixel() {
        let seg = quad_segmentation();
        let img = seg.expand(&[1, 2, 3, 4]).unwrap();
        assert_eq!(img[[0, 0]], 1);
        assert_eq!(img[[0, 3]], 2);
        assert_eq!(img[[3, 0]], 3);
        assert_eq!(img[[3, 3]], 4);
    }

    #[test]
    fn expand_rejects_count_mismatch() {
        let seg = quad_segmentation();
        let err = seg.expand(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, SuperpixelError::DataIntegrity { .. }));
    }
}
