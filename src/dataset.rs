use image::DynamicImage;
use log::{debug, warn};
use ndarray::prelude::*;
use rayon::prelude::*;

use crate::errors::{Result, SuperpixelError};
use crate::labels::{resolve_label_for, LabelSpace};
use crate::segmentation::{Segmentation, SegmentationParams};
use crate::traits::{FeatureExtractor, Segmenter};

/// One training image with its pixel-level ground-truth annotation.
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    /// Diagnostic name (typically the source filename).
    pub name: String,
    pub image: DynamicImage,
    /// Per-pixel class labels, same spatial shape as `image`.
    pub ground_truth: Array2<u32>,
}

/// One superpixel's resolved annotation within a single image.
///
/// Records are kept as a single ordered sequence (ascending superpixel id)
/// and filtered/projected from there, so the exclude list, the label vector
/// and the feature rows can never drift out of positional alignment.
#[derive(Debug, Clone, Copy)]
pub struct SuperpixelRecord {
    pub id: u32,
    pub label: u32,
    pub is_void: bool,
    pub tie: bool,
}

/// Aggregate class-adjacency statistics across the training collection.
///
/// A diagnostic side-product only; training never consumes it. `merge` is
/// associative and commutative, so per-image contributions can be reduced in
/// any order.
#[derive(Debug, Clone)]
pub struct AdjacencyStats {
    counts: Array2<u64>,
    total_checks: u64,
    void_checks: u64,
}

impl AdjacencyStats {
    pub fn new(space: &LabelSpace) -> Self {
        let n = space.num_labels as usize;
        Self {
            counts: Array2::zeros((n, n)),
            total_checks: 0,
            void_checks: 0,
        }
    }

    fn record(&mut self, space: &LabelSpace, label_a: u32, label_b: u32) {
        self.total_checks += 1;
        if space.is_void(label_a) || space.is_void(label_b) {
            self.void_checks += 1;
        } else {
            self.counts[[label_a as usize, label_b as usize]] += 1;
        }
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.counts += &other.counts;
        self.total_checks += other.total_checks;
        self.void_checks += other.void_checks;
        self
    }

    /// Count matrix indexed by `(class_a, class_b)`. The void row and column
    /// stay zero; void-touching pairs are tallied in `void_checks` instead.
    pub fn counts(&self) -> ArrayView2<'_, u64> {
        self.counts.view()
    }

    pub fn total_checks(&self) -> u64 {
        self.total_checks
    }

    pub fn void_checks(&self) -> u64 {
        self.void_checks
    }
}

/// Per-collection superpixel totals for diagnostic reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub total_superpixels: usize,
    pub void_superpixels: usize,
    pub valid_superpixels: usize,
    pub ambiguous_majorities: usize,
}

impl AssemblyReport {
    fn merge(mut self, other: Self) -> Self {
        self.total_superpixels += other.total_superpixels;
        self.void_superpixels += other.void_superpixels;
        self.valid_superpixels += other.valid_superpixels;
        self.ambiguous_majorities += other.ambiguous_majorities;
        self
    }
}

/// Flat training table: feature rows paired 1:1 in row order with labels.
#[derive(Debug, Clone)]
pub struct TrainingTable {
    pub features: Array2<f32>,
    pub labels: Vec<u32>,
}

impl TrainingTable {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Everything `assemble` produces: the training table plus diagnostics.
#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub table: TrainingTable,
    pub adjacency: AdjacencyStats,
    pub report: AssemblyReport,
}

/// Per-image intermediate, combined after the parallel map.
struct ImageBundle {
    features: Array2<f32>,
    labels: Vec<u32>,
    adjacency: AdjacencyStats,
    report: AssemblyReport,
}

/// Turns a collection of annotated images into a flat training table while
/// tracking class-adjacency statistics.
///
/// Per-image work is independent and runs on the rayon pool; results are
/// combined afterwards with an associative reduction rather than a shared
/// mutable accumulator, so the adjacency statistics are invariant to image
/// processing order.
pub struct DatasetAssembler<'a, S: Segmenter, F: FeatureExtractor> {
    segmenter: &'a S,
    extractor: &'a F,
    space: LabelSpace,
    params: SegmentationParams,
    coverage_threshold: f64,
}

impl<'a, S: Segmenter, F: FeatureExtractor> DatasetAssembler<'a, S, F> {
    pub fn new(
        segmenter: &'a S,
        extractor: &'a F,
        space: LabelSpace,
        params: SegmentationParams,
    ) -> Self {
        Self {
            segmenter,
            extractor,
            space,
            params,
            coverage_threshold: 0.5,
        }
    }

    /// Minimum fraction of a superpixel's pixels a tie candidate must cover
    /// to win; below it the superpixel is discarded as ambiguous.
    pub fn with_coverage_threshold(mut self, threshold: f64) -> Self {
        self.coverage_threshold = threshold;
        self
    }

    /// Resolves every superpixel of one segmented image into a record
    /// sequence, ascending by superpixel id.
    pub fn resolve_records(
        &self,
        segmentation: &Segmentation,
        ground_truth: &Array2<u32>,
    ) -> Result<Vec<SuperpixelRecord>> {
        segmentation
            .superpixel_ids()
            .iter()
            .map(|&id| {
                let mask = segmentation.membership_mask(id);
                let resolution = resolve_label_for(
                    id,
                    mask.view(),
                    ground_truth.view(),
                    &self.space,
                    self.coverage_threshold,
                )?;
                Ok(SuperpixelRecord {
                    id,
                    label: resolution.label,
                    is_void: self.space.is_void(resolution.label),
                    tie: resolution.tie,
                })
            })
            .collect()
    }

    fn assemble_image(&self, annotated: &AnnotatedImage) -> Result<ImageBundle> {
        let (width, height) = (annotated.image.width(), annotated.image.height());
        if annotated.ground_truth.dim() != (height as usize, width as usize) {
            return Err(SuperpixelError::Validation {
                field: "ground_truth".to_string(),
                reason: format!(
                    "shape {:?} does not match image {}x{} ({})",
                    annotated.ground_truth.dim(),
                    width,
                    height,
                    annotated.name
                ),
            });
        }

        if let Some(&bad) = annotated
            .ground_truth
            .iter()
            .find(|&&v| v >= self.space.num_labels)
        {
            return Err(SuperpixelError::Validation {
                field: "ground_truth".to_string(),
                reason: format!(
                    "label {} outside the space 0..{} ({})",
                    bad, self.space.num_labels, annotated.name
                ),
            });
        }

        let segmentation = self.segmenter.segment(&annotated.image, &self.params)?;
        let records = self.resolve_records(&segmentation, &annotated.ground_truth)?;

        let exclude: Vec<u32> = records
            .iter()
            .filter(|r| r.is_void)
            .map(|r| r.id)
            .collect();
        let labels: Vec<u32> = records
            .iter()
            .filter(|r| !r.is_void)
            .map(|r| r.label)
            .collect();

        let mut adjacency = AdjacencyStats::new(&self.space);
        let ids = segmentation.superpixel_ids();
        for &(a, b) in segmentation.edges() {
            let label_of = |id: u32| -> Result<u32> {
                ids.binary_search(&id)
                    .map(|idx| records[idx].label)
                    .map_err(|_| SuperpixelError::DataIntegrity {
                        context: format!("adjacency edge of {}", annotated.name),
                        expected: ids.len(),
                        actual: id as usize,
                    })
            };
            adjacency.record(&self.space, label_of(a)?, label_of(b)?);
        }

        let features = self
            .extractor
            .compute_features(&annotated.image, &segmentation, &exclude)?;
        // The exclude-list bookkeeping and the label accumulation must agree
        // on the set of valid superpixels; stop rather than emit a misaligned
        // table.
        if features.nrows() != labels.len() {
            return Err(SuperpixelError::DataIntegrity {
                context: format!("feature/label rows of {}", annotated.name),
                expected: labels.len(),
                actual: features.nrows(),
            });
        }

        let ties = records.iter().filter(|r| r.tie).count();
        if ties > 0 {
            warn!(
                "{}: {} superpixel(s) had ambiguous majority labels",
                annotated.name, ties
            );
        }
        debug!(
            "{}: {} superpixels, {} void, {} valid",
            annotated.name,
            records.len(),
            exclude.len(),
            labels.len()
        );

        let valid_superpixels = labels.len();
        Ok(ImageBundle {
            features,
            labels,
            adjacency,
            report: AssemblyReport {
                total_superpixels: records.len(),
                void_superpixels: exclude.len(),
                valid_superpixels,
                ambiguous_majorities: ties,
            },
        })
    }

    /// Assembles the full training table over `images`.
    pub fn assemble(&self, images: &[AnnotatedImage]) -> Result<AssemblyOutput> {
        let bundles: Vec<ImageBundle> = images
            .par_iter()
            .map(|annotated| self.assemble_image(annotated))
            .collect::<Result<_>>()?;

        let mut labels = Vec::new();
        let mut adjacency = AdjacencyStats::new(&self.space);
        let mut report = AssemblyReport::default();
        let mut feature_blocks = Vec::with_capacity(bundles.len());
        for bundle in bundles {
            labels.extend(bundle.labels);
            adjacency = adjacency.merge(bundle.adjacency);
            report = report.merge(bundle.report);
            if bundle.features.nrows() > 0 {
                feature_blocks.push(bundle.features);
            }
        }

        // Single finalize step instead of repeated concatenation.
        let features = if feature_blocks.is_empty() {
            Array2::zeros((0, 0))
        } else {
            let views: Vec<ArrayView2<'_, f32>> =
                feature_blocks.iter().map(|b| b.view()).collect();
            ndarray::concatenate(Axis(0), &views)?
        };

        if features.nrows() != labels.len() {
            return Err(SuperpixelError::DataIntegrity {
                context: "assembled training table".to_string(),
                expected: labels.len(),
                actual: features.nrows(),
            });
        }

        Ok(AssemblyOutput {
            table: TrainingTable { features, labels },
            adjacency,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{synthetic_image, MockFeatureExtractor, QuadSegmenter};

    fn quadrant_ground_truth() -> Array2<u32> {
        // 2x2 superpixel grid aligned to quadrants; bottom-right is void.
        ndarray::array![
            [1, 1, 2, 2],
            [1, 1, 2, 2],
            [3, 3, 13, 13],
            [3, 3, 13, 13],
        ]
    }

    fn annotated(name: &str, ground_truth: Array2<u32>) -> AnnotatedImage {
        AnnotatedImage {
            name: name.to_string(),
            image: synthetic_image(4, 4),
            ground_truth,
        }
    }

    fn assembler<'a>(
        segmenter: &'a QuadSegmenter,
        extractor: &'a MockFeatureExtractor,
    ) -> DatasetAssembler<'a, QuadSegmenter, MockFeatureExtractor> {
        DatasetAssembler::new(
            segmenter,
            extractor,
            LabelSpace::default(),
            SegmentationParams::default(),
        )
    }

    #[test]
    fn quadrant_scenario_resolves_expected_labels() {
        let segmenter = QuadSegmenter;
        let extractor = MockFeatureExtractor::default();
        let asm = assembler(&segmenter, &extractor);

        let out = asm
            .assemble(&[annotated("quad", quadrant_ground_truth())])
            .unwrap();
        assert_eq!(out.table.labels, vec![1, 2, 3]);
        assert_eq!(out.table.features.nrows(), 3);
        assert_eq!(out.report.total_superpixels, 4);
        assert_eq!(out.report.void_superpixels, 1);
        assert_eq!(out.report.valid_superpixels, 3);
    }

    #[test]
    fn row_counts_match_valid_superpixels_across_images() {
        let segmenter = QuadSegmenter;
        let extractor = MockFeatureExtractor::default();
        let asm = assembler(&segmenter, &extractor);

        let images = vec![
            annotated("a", quadrant_ground_truth()),
            annotated("b", Array2::from_elem((4, 4), 5)),
        ];
        let out = asm.assemble(&images).unwrap();
        assert_eq!(
            out.table.features.nrows(),
            out.report.total_superpixels - out.report.void_superpixels
        );
        assert_eq!(out.table.features.nrows(), out.table.labels.len());
        // second image contributes four class-5 superpixels
        assert_eq!(out.table.labels, vec![1, 2, 3, 5, 5, 5, 5]);
    }

    #[test]
    fn adjacency_stats_are_order_invariant() {
        let segmenter = QuadSegmenter;
        let extractor = MockFeatureExtractor::default();
        let asm = assembler(&segmenter, &extractor);

        let a = annotated("a", quadrant_ground_truth());
        let b = annotated("b", Array2::from_elem((4, 4), 5));

        let forward = asm.assemble(&[a.clone(), b.clone()]).unwrap();
        let reversed = asm.assemble(&[b, a]).unwrap();
        assert_eq!(forward.adjacency.counts(), reversed.adjacency.counts());
        assert_eq!(
            forward.adjacency.total_checks(),
            reversed.adjacency.total_checks()
        );
        assert_eq!(
            forward.adjacency.void_checks(),
            reversed.adjacency.void_checks()
        );
    }

    #[test]
    fn void_adjacency_goes_to_void_counter() {
        let segmenter = QuadSegmenter;
        let extractor = MockFeatureExtractor::default();
        let asm = assembler(&segmenter, &extractor);

        let out = asm
            .assemble(&[annotated("quad", quadrant_ground_truth())])
            .unwrap();
        // QuadSegmenter reports 4 edges; two touch the void quadrant.
        assert_eq!(out.adjacency.total_checks(), 4);
        assert_eq!(out.adjacency.void_checks(), 2);
        assert_eq!(out.adjacency.counts()[[1, 2]], 1);
        assert_eq!(out.adjacency.counts()[[1, 3]], 1);
    }

    #[test]
    fn ground_truth_shape_mismatch_fails_fast() {
        let segmenter = QuadSegmenter;
        let extractor = MockFeatureExtractor::default();
        let asm = assembler(&segmenter, &extractor);

        let bad = AnnotatedImage {
            name: "bad".to_string(),
            image: synthetic_image(4, 4),
            ground_truth: Array2::zeros((2, 2)),
        };
        assert!(matches!(
            asm.assemble(&[bad]).unwrap_err(),
            SuperpixelError::Validation { .. }
        ));
    }
}
