use std::collections::BTreeMap;

use ndarray::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SuperpixelError};

/// Fixed enumeration of semantic classes plus the reserved void label.
///
/// Void means "no ground truth / ignore"; it is a legal resolver output but
/// never a valid prediction target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelSpace {
    /// Total number of label values, void included. Valid labels are
    /// `0..num_labels`.
    pub num_labels: u32,
    /// The reserved void label value.
    pub void_label: u32,
}

impl LabelSpace {
    pub fn new(num_labels: u32, void_label: u32) -> Result<Self> {
        if void_label >= num_labels {
            return Err(SuperpixelError::Validation {
                field: "void_label".to_string(),
                reason: format!("{} is outside the label range 0..{}", void_label, num_labels),
            });
        }
        Ok(Self {
            num_labels,
            void_label,
        })
    }

    pub fn is_void(&self, label: u32) -> bool {
        label == self.void_label
    }
}

impl Default for LabelSpace {
    /// MSRC-style labeling: 14 classes with void at index 13.
    fn default() -> Self {
        Self {
            num_labels: 14,
            void_label: 13,
        }
    }
}

/// Outcome of resolving one superpixel's representative label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub label: u32,
    /// True when more than one label shared the maximum frequency. Callers
    /// aggregate these into a single per-image diagnostic.
    pub tie: bool,
}

/// Computes the single representative class label for one superpixel.
///
/// Takes the majority vote over the ground-truth labels inside the membership
/// mask. A unique winner is adopted even when it is void. On a tie the
/// candidates are scanned in ascending label order and the first non-void
/// candidate covering at least `coverage_threshold` of the superpixel's
/// pixels wins; if none qualifies the superpixel resolves to void, meaning
/// "ambiguous, discard from training".
///
/// The threshold guards against a technical winner that covers only a small
/// fraction of a superpixel straddling several sparsely-represented classes.
pub fn resolve_label(
    mask: ArrayView2<'_, bool>,
    ground_truth: ArrayView2<'_, u32>,
    space: &LabelSpace,
    coverage_threshold: f64,
) -> Result<Resolution> {
    if mask.dim() != ground_truth.dim() {
        return Err(SuperpixelError::Validation {
            field: "ground_truth".to_string(),
            reason: format!(
                "shape {:?} does not match mask shape {:?}",
                ground_truth.dim(),
                mask.dim()
            ),
        });
    }

    // Label frequency table in ascending label order, so tie scans are
    // reproducible across runs.
    let mut frequencies: BTreeMap<u32, usize> = BTreeMap::new();
    let mut population = 0usize;
    for (&selected, &label) in mask.iter().zip(ground_truth.iter()) {
        if selected {
            *frequencies.entry(label).or_insert(0) += 1;
            population += 1;
        }
    }

    if population == 0 {
        return Err(SuperpixelError::EmptyMask { superpixel_id: 0 });
    }

    let max_frequency = frequencies.values().copied().max().unwrap_or(0);
    let candidates: Vec<(u32, usize)> = frequencies
        .into_iter()
        .filter(|&(_, count)| count == max_frequency)
        .collect();

    if candidates.len() == 1 {
        // Unique winner, void included.
        return Ok(Resolution {
            label: candidates[0].0,
            tie: false,
        });
    }

    let required = coverage_threshold * population as f64;
    let winner = candidates
        .iter()
        .find(|&&(label, count)| !space.is_void(label) && count as f64 >= required)
        .map(|&(label, _)| label)
        .unwrap_or(space.void_label);

    Ok(Resolution {
        label: winner,
        tie: true,
    })
}

/// Variant of [`resolve_label`] that tags `EmptyMask` errors with the
/// offending superpixel id for diagnostics.
pub fn resolve_label_for(
    superpixel_id: u32,
    mask: ArrayView2<'_, bool>,
    ground_truth: ArrayView2<'_, u32>,
    space: &LabelSpace,
    coverage_threshold: f64,
) -> Result<Resolution> {
    resolve_label(mask, ground_truth, space, coverage_threshold).map_err(|err| match err {
        SuperpixelError::EmptyMask { .. } => SuperpixelError::EmptyMask { superpixel_id },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn space() -> LabelSpace {
        LabelSpace::default()
    }

    #[test]
    fn dominant_label_wins() {
        let mask = array![[true, true], [true, true]];
        let gt = array![[2, 2], [2, 5]];
        let res = resolve_label(mask.view(), gt.view(), &space(), 0.5).unwrap();
        assert_eq!(res.label, 2);
        assert!(!res.tie);
    }

    #[test]
    fn all_void_mask_resolves_to_void() {
        let mask = array![[true, true], [false, false]];
        let gt = array![[13, 13], [1, 1]];
        let res = resolve_label(mask.view(), gt.view(), &space(), 0.5).unwrap();
        assert_eq!(res.label, 13);
        assert!(!res.tie);
    }

    #[test]
    fn unique_void_majority_wins_even_over_valid_minority() {
        // 60% void, 40% class 4: void is the unique maximum, so it is
        // adopted directly without consulting the threshold.
        let mask = array![[true, true, true, true, true]];
        let gt = array![[13, 13, 13, 4, 4]];
        let res = resolve_label(mask.view(), gt.view(), &space(), 0.5).unwrap();
        assert_eq!(res.label, 13);
        assert!(!res.tie);
    }

    #[test]
    fn tie_picks_first_eligible_in_ascending_label_order() {
        // 50% class 3, 50% class 8; ascending scan order pins class 3.
        let mask = array![[true, true], [true, true]];
        let gt = array![[8, 3], [3, 8]];
        let res = resolve_label(mask.view(), gt.view(), &space(), 0.5).unwrap();
        assert_eq!(res.label, 3);
        assert!(res.tie);
    }

    #[test]
    fn tie_with_void_prefers_non_void_candidate() {
        let mask = array![[true, true], [true, true]];
        let gt = array![[13, 13], [6, 6]];
        let res = resolve_label(mask.view(), gt.view(), &space(), 0.5).unwrap();
        assert_eq!(res.label, 6);
        assert!(res.tie);
    }

    #[test]
    fn tie_below_threshold_resolves_to_void() {
        // Three-way tie at 1/3 coverage each; no candidate reaches 50%.
        let mask = array![[true, true, true]];
        let gt = array![[1, 2, 3]];
        let res = resolve_label(mask.view(), gt.view(), &space(), 0.5).unwrap();
        assert_eq!(res.label, 13);
        assert!(res.tie);
    }

    #[test]
    fn empty_mask_is_an_error() {
        let mask = array![[false, false]];
        let gt = array![[1, 2]];
        let err = resolve_label(mask.view(), gt.view(), &space(), 0.5).unwrap_err();
        assert!(matches!(err, SuperpixelError::EmptyMask { .. }));
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mask = array![[true, true]];
        let gt = array![[1], [2]];
        let err = resolve_label(mask.view(), gt.view(), &space(), 0.5).unwrap_err();
        assert!(matches!(err, SuperpixelError::Validation { .. }));
    }

    #[test]
    fn void_label_must_be_in_range() {
        assert!(LabelSpace::new(14, 14).is_err());
        assert!(LabelSpace::new(14, 13).is_ok());
    }
}
