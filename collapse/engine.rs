//! # Collapsing Engine
//!
//! Reduces an N×M dosage matrix to an N×1 burden matrix. Four strategies exist:
//!
//! - CMC: indicator of carrying any qualifying variant.
//! - Zeggini: count of qualifying variants.
//! - Frequency-weighted: dosages weighted by `1 / sqrt(p (1 - p))` with `p` from
//!   every observed sample.
//! - Madsen-Browning: dosages weighted by `1 / sqrt(p (1 - p) N)` with `p` from
//!   controls only.
//!
//! Every function returns an owned result and reads its inputs through views.
//! A marker whose estimated frequency is `<= 0` or `>= 1` has no defined weight
//! and is skipped; this is the normal outcome for monomorphic markers, not an error.

use crate::frequency::{
    CASE_PHENOTYPE, check_marker, check_phenotype, control_frequency, is_observed,
    plain_frequency,
};
use crate::types::BurdenMatrix;
use ndarray::{Array1, ArrayView1, ArrayView2, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The collapsing rule applied to a marker set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollapseStrategy {
    /// Combined multivariate and collapsing: 1 if any marker carries a variant.
    #[default]
    Cmc,
    /// Morris-Zeggini: number of markers carrying a variant.
    Zeggini,
    /// Inverse-variance weighting with frequencies from all samples.
    FrequencyWeighted,
    /// Inverse-variance weighting with frequencies from controls and a cohort-size term.
    MadsenBrowning,
}

impl CollapseStrategy {
    pub fn requires_phenotype(self) -> bool {
        matches!(self, CollapseStrategy::MadsenBrowning)
    }

    pub fn name(self) -> &'static str {
        match self {
            CollapseStrategy::Cmc => "cmc",
            CollapseStrategy::Zeggini => "zeggini",
            CollapseStrategy::FrequencyWeighted => "frequency-weighted",
            CollapseStrategy::MadsenBrowning => "madsen-browning",
        }
    }
}

impl fmt::Display for CollapseStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Precondition violations detected before any collapsing work is done.
///
/// These indicate a caller bug. Retrying with the same input fails the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollapseError {
    #[error("Marker index {marker} is out of range for a genotype matrix with {n_markers} markers.")]
    MarkerOutOfRange { marker: usize, n_markers: usize },

    #[error("Phenotype vector has {found} values, but the genotype matrix has {expected} samples.")]
    PhenotypeLength { found: usize, expected: usize },

    #[error("Burden column {column} is out of range for a burden matrix with {n_columns} columns.")]
    ColumnOutOfRange { column: usize, n_columns: usize },

    #[error("Burden column has {found} values, but the burden matrix has {expected} samples.")]
    RowCountMismatch { found: usize, expected: usize },

    #[error("The '{0}' strategy estimates frequencies from controls and requires a phenotype vector.")]
    PhenotypeRequired(CollapseStrategy),
}

/// A dosage carries a qualifying variant when it is strictly positive.
#[inline]
fn carries_variant(dosage: f64) -> bool {
    dosage > 0.0
}

#[inline]
fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// Inverse-variance weight for a marker, or `None` when the frequency is degenerate.
#[inline]
pub(crate) fn inverse_variance_weight(frequency: f64, cohort_scale: f64) -> Option<f64> {
    if frequency <= 0.0 || frequency >= 1.0 {
        return None;
    }
    Some(1.0 / (frequency * (1.0 - frequency) * cohort_scale).sqrt())
}

/// CMC collapse over all markers: 1.0 for samples carrying at least one variant.
pub fn cmc_collapse(genotypes: ArrayView2<'_, f64>) -> BurdenMatrix {
    log::debug!(
        "CMC collapse of {} samples over {} markers",
        genotypes.nrows(),
        genotypes.ncols()
    );
    let scores: Array1<f64> = genotypes
        .rows()
        .into_iter()
        .map(|row| indicator(row.iter().any(|&dosage| carries_variant(dosage))))
        .collect();
    BurdenMatrix::from(scores)
}

/// CMC indicator restricted to the listed markers.
///
/// The result is one burden column; place it into a wider matrix with
/// [`BurdenMatrix::assign_column`] to build one column per marker group.
pub fn cmc_collapse_subset(
    genotypes: ArrayView2<'_, f64>,
    markers: &[usize],
) -> Result<Array1<f64>, CollapseError> {
    for &marker in markers {
        check_marker(genotypes, marker)?;
    }
    Ok(carrier_indicator(genotypes, markers))
}

/// Indicator over `markers`, which must already be valid column indices.
pub(crate) fn carrier_indicator(genotypes: ArrayView2<'_, f64>, markers: &[usize]) -> Array1<f64> {
    genotypes
        .rows()
        .into_iter()
        .map(|row| indicator(markers.iter().any(|&marker| carries_variant(row[marker]))))
        .collect()
}

/// Zeggini collapse: per-sample count of markers carrying a variant.
pub fn zeggini_collapse(genotypes: ArrayView2<'_, f64>) -> BurdenMatrix {
    log::debug!(
        "Zeggini collapse of {} samples over {} markers",
        genotypes.nrows(),
        genotypes.ncols()
    );
    let scores: Array1<f64> = genotypes
        .rows()
        .into_iter()
        .map(|row| row.iter().filter(|&&dosage| carries_variant(dosage)).count() as f64)
        .collect();
    BurdenMatrix::from(scores)
}

/// Adds `weight * dosage` to each sample's score, ignoring missing dosages.
pub(crate) fn add_weighted_column(
    scores: &mut Array1<f64>,
    column: ArrayView1<'_, f64>,
    weight: f64,
) {
    Zip::from(scores).and(column).for_each(|score, &dosage| {
        if is_observed(dosage) {
            *score += weight * dosage;
        }
    });
}

/// Sums `weight * dosage` over every marker that has a weight.
///
/// Missing dosages contribute nothing to the sample's score.
fn accumulate_weighted<F>(genotypes: ArrayView2<'_, f64>, weight_of: F) -> BurdenMatrix
where
    F: Fn(ArrayView1<'_, f64>) -> Option<f64>,
{
    let mut scores = Array1::<f64>::zeros(genotypes.nrows());
    let mut contributing = 0usize;
    for (marker, column) in genotypes.axis_iter(Axis(1)).enumerate() {
        let Some(weight) = weight_of(column) else {
            log::trace!("Marker {marker} has a degenerate frequency and is skipped");
            continue;
        };
        contributing += 1;
        add_weighted_column(&mut scores, column, weight);
    }
    log::debug!(
        "Weighted collapse used {contributing} of {} markers",
        genotypes.ncols()
    );
    BurdenMatrix::from(scores)
}

/// Frequency-weighted collapse using the plain frequency estimate.
///
/// Weight is `1 / sqrt(p (1 - p))`. Markers with `p <= 0` or `p >= 1` are skipped.
/// Missing dosages add nothing, unlike legacy burden tools that multiply the
/// missing sentinel into the score.
pub fn frequency_weighted_collapse(genotypes: ArrayView2<'_, f64>) -> BurdenMatrix {
    accumulate_weighted(genotypes, |column| {
        inverse_variance_weight(plain_frequency(column), 1.0)
    })
}

/// Madsen-Browning collapse with frequencies estimated from controls.
///
/// Weight is `1 / sqrt(p (1 - p) N)` where `N` is the number of samples and `p`
/// the pseudo-count control frequency. Missing dosages add nothing, unlike legacy
/// burden tools that multiply the missing sentinel into the score.
pub fn madsen_browning_collapse(
    genotypes: ArrayView2<'_, f64>,
    phenotype: ArrayView1<'_, f64>,
) -> Result<BurdenMatrix, CollapseError> {
    check_phenotype(genotypes, phenotype)?;
    let controls = phenotype
        .iter()
        .filter(|&&trait_value| trait_value != CASE_PHENOTYPE)
        .count();
    if controls == 0 && genotypes.nrows() > 0 {
        log::warn!(
            "Madsen-Browning collapse found no controls among {} samples; every marker is weighted at frequency 0.5",
            genotypes.nrows()
        );
    }
    let cohort_scale = genotypes.nrows() as f64;
    Ok(accumulate_weighted(genotypes, |column| {
        inverse_variance_weight(control_frequency(column, phenotype), cohort_scale)
    }))
}

/// Applies `strategy` to the full marker set.
///
/// `phenotype` is only consulted by [`CollapseStrategy::MadsenBrowning`], which
/// fails with [`CollapseError::PhenotypeRequired`] when it is absent.
pub fn collapse(
    strategy: CollapseStrategy,
    genotypes: ArrayView2<'_, f64>,
    phenotype: Option<ArrayView1<'_, f64>>,
) -> Result<BurdenMatrix, CollapseError> {
    match strategy {
        CollapseStrategy::Cmc => Ok(cmc_collapse(genotypes)),
        CollapseStrategy::Zeggini => Ok(zeggini_collapse(genotypes)),
        CollapseStrategy::FrequencyWeighted => Ok(frequency_weighted_collapse(genotypes)),
        CollapseStrategy::MadsenBrowning => {
            let phenotype = phenotype.ok_or(CollapseError::PhenotypeRequired(strategy))?;
            madsen_browning_collapse(genotypes, phenotype)
        }
    }
}

/// Collapses many marker sets (e.g. one per gene) of the same cohort in parallel.
///
/// Each region is a list of marker column indices. Results are returned in region
/// order and each is computed from its own column selection, so regions may overlap.
pub fn collapse_regions(
    strategy: CollapseStrategy,
    genotypes: ArrayView2<'_, f64>,
    phenotype: Option<ArrayView1<'_, f64>>,
    regions: &[Vec<usize>],
) -> Result<Vec<BurdenMatrix>, CollapseError> {
    if strategy.requires_phenotype() && phenotype.is_none() {
        return Err(CollapseError::PhenotypeRequired(strategy));
    }
    if let Some(phenotype) = phenotype {
        check_phenotype(genotypes, phenotype)?;
    }
    for region in regions {
        for &marker in region {
            check_marker(genotypes, marker)?;
        }
    }
    log::debug!(
        "Collapsing {} regions with the {strategy} strategy",
        regions.len()
    );
    regions
        .par_iter()
        .map(|region| {
            let selected = genotypes.select(Axis(1), region);
            collapse(strategy, selected.view(), phenotype)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array2, array};

    fn four_by_two() -> Array2<f64> {
        array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0], [1.0, 1.0]]
    }

    #[test]
    fn cmc_marks_any_carrier() {
        let burden = cmc_collapse(four_by_two().view());
        assert_eq!(burden.dim(), (4, 1));
        assert_eq!(burden.scores(), array![0.0, 1.0, 1.0, 1.0].view());
    }

    #[test]
    fn zeggini_counts_carried_markers() {
        let burden = zeggini_collapse(four_by_two().view());
        assert_eq!(burden.scores(), array![0.0, 1.0, 1.0, 2.0].view());
    }

    #[test]
    fn missing_dosages_never_qualify() {
        let genotypes = array![[-9.0, 0.0], [-9.0, 1.0], [f64::NAN, -1.0]];
        assert_eq!(
            cmc_collapse(genotypes.view()).scores(),
            array![0.0, 1.0, 0.0].view()
        );
        assert_eq!(
            zeggini_collapse(genotypes.view()).scores(),
            array![0.0, 1.0, 0.0].view()
        );
    }

    #[test]
    fn subset_cmc_only_reads_listed_markers() {
        let genotypes = array![[1.0, 0.0, 0.0], [0.0, 0.0, 2.0], [0.0, 1.0, 0.0]];
        let column = cmc_collapse_subset(genotypes.view(), &[1, 2]).unwrap();
        assert_eq!(column, array![0.0, 1.0, 1.0]);

        let empty = cmc_collapse_subset(genotypes.view(), &[]).unwrap();
        assert_eq!(empty, array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn subset_cmc_rejects_unknown_markers() {
        let genotypes = array![[1.0, 0.0]];
        assert_eq!(
            cmc_collapse_subset(genotypes.view(), &[0, 5]),
            Err(CollapseError::MarkerOutOfRange {
                marker: 5,
                n_markers: 2
            })
        );
    }

    #[test]
    fn frequency_weighted_skips_monomorphic_markers() {
        let polymorphic = array![[1.0], [0.0], [0.0], [0.0]];
        let with_monomorphic = array![[1.0, 0.0], [0.0, 0.0], [0.0, 0.0], [0.0, 0.0]];
        let with_fixed = array![[1.0, 2.0], [0.0, 2.0], [0.0, 2.0], [0.0, 2.0]];

        let reference = frequency_weighted_collapse(polymorphic.view());
        assert_eq!(frequency_weighted_collapse(with_monomorphic.view()), reference);
        assert_eq!(frequency_weighted_collapse(with_fixed.view()), reference);

        // p = 1/8, weight = 1 / sqrt(p (1 - p)).
        let weight = 1.0 / (0.125_f64 * 0.875).sqrt();
        assert_abs_diff_eq!(reference[[0, 0]], weight, epsilon = 1e-12);
        assert_eq!(reference[[1, 0]], 0.0);
    }

    #[test]
    fn frequency_weighted_sums_across_markers() {
        let genotypes = array![[1.0, 1.0], [0.0, 1.0], [2.0, 0.0], [-9.0, 0.0]];
        let burden = frequency_weighted_collapse(genotypes.view());
        // Marker 0: observed in 3 samples, p = 3/6. Marker 1: p = 2/8.
        let w0 = 1.0 / (0.5_f64 * 0.5).sqrt();
        let w1 = 1.0 / (0.25_f64 * 0.75).sqrt();
        assert_abs_diff_eq!(burden[[0, 0]], w0 + w1, epsilon = 1e-12);
        assert_abs_diff_eq!(burden[[1, 0]], w1, epsilon = 1e-12);
        assert_abs_diff_eq!(burden[[2, 0]], 2.0 * w0, epsilon = 1e-12);
        assert_eq!(burden[[3, 0]], 0.0);
    }

    #[test]
    fn madsen_browning_uses_control_frequencies_and_cohort_size() {
        let genotypes = array![[1.0], [1.0], [0.0], [0.0]];
        let phenotype = array![1.0, 0.0, 0.0, 0.0];
        let burden = madsen_browning_collapse(genotypes.view(), phenotype.view()).unwrap();
        // Controls carry 1 alt allele over 6 slots: p = (1 + 1) / (6 + 2).
        let p = 0.25_f64;
        let weight = 1.0 / (p * (1.0 - p) * 4.0).sqrt();
        assert_abs_diff_eq!(burden[[0, 0]], weight, epsilon = 1e-12);
        assert_abs_diff_eq!(burden[[1, 0]], weight, epsilon = 1e-12);
        assert_eq!(burden[[2, 0]], 0.0);
    }

    #[test]
    fn madsen_browning_ignores_missing_sentinels() {
        let genotypes = array![[1.0], [0.0], [-9.0], [0.0]];
        let phenotype = array![0.0, 0.0, 0.0, 1.0];
        let burden = madsen_browning_collapse(genotypes.view(), phenotype.view()).unwrap();
        // Controls 0 and 1 are observed: p = (1 + 1) / (4 + 2).
        let p = 1.0 / 3.0;
        let weight = 1.0 / (p * (1.0 - p) * 4.0_f64).sqrt();
        assert_abs_diff_eq!(burden[[0, 0]], weight, epsilon = 1e-12);
        assert_eq!(burden[[2, 0]], 0.0);
        assert_eq!(burden.scores(), array![burden[[0, 0]], 0.0, 0.0, 0.0].view());
    }

    #[test]
    fn madsen_browning_weights_monomorphic_controls() {
        // Control frequency never reaches 0, so even a variant seen only in cases counts.
        let genotypes = array![[2.0], [0.0]];
        let phenotype = array![1.0, 0.0];
        let burden = madsen_browning_collapse(genotypes.view(), phenotype.view()).unwrap();
        assert!(burden[[0, 0]] > 0.0);
        assert_eq!(burden[[1, 0]], 0.0);
    }

    #[test]
    fn madsen_browning_rejects_misaligned_phenotype() {
        let genotypes = four_by_two();
        assert_eq!(
            madsen_browning_collapse(genotypes.view(), array![0.0, 1.0].view()),
            Err(CollapseError::PhenotypeLength {
                found: 2,
                expected: 4
            })
        );
    }

    #[test]
    fn dispatch_requires_phenotype_for_madsen_browning() {
        let genotypes = four_by_two();
        assert_eq!(
            collapse(CollapseStrategy::MadsenBrowning, genotypes.view(), None),
            Err(CollapseError::PhenotypeRequired(
                CollapseStrategy::MadsenBrowning
            ))
        );
        assert_eq!(
            collapse(CollapseStrategy::Zeggini, genotypes.view(), None).unwrap(),
            zeggini_collapse(genotypes.view())
        );
    }

    #[test]
    fn regions_are_collapsed_independently_in_order() {
        let genotypes = array![[1.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 0.0, 0.0]];
        let regions = vec![vec![0], vec![1, 2], vec![0, 1, 2]];
        let burdens =
            collapse_regions(CollapseStrategy::Zeggini, genotypes.view(), None, &regions).unwrap();
        assert_eq!(burdens.len(), 3);
        assert_eq!(burdens[0].scores(), array![1.0, 0.0, 0.0].view());
        assert_eq!(burdens[1].scores(), array![1.0, 2.0, 0.0].view());
        assert_eq!(burdens[2].scores(), array![2.0, 2.0, 0.0].view());
    }

    #[test]
    fn regions_validate_before_collapsing() {
        let genotypes = array![[1.0, 0.0]];
        assert_eq!(
            collapse_regions(CollapseStrategy::Cmc, genotypes.view(), None, &[vec![0], vec![3]]),
            Err(CollapseError::MarkerOutOfRange {
                marker: 3,
                n_markers: 2
            })
        );
        assert_eq!(
            collapse_regions(
                CollapseStrategy::MadsenBrowning,
                genotypes.view(),
                None,
                &[vec![0]]
            ),
            Err(CollapseError::PhenotypeRequired(
                CollapseStrategy::MadsenBrowning
            ))
        );
    }

    #[test]
    fn strategy_names_round_trip_through_serde() {
        for strategy in [
            CollapseStrategy::Cmc,
            CollapseStrategy::Zeggini,
            CollapseStrategy::FrequencyWeighted,
            CollapseStrategy::MadsenBrowning,
        ] {
            let json = serde_json::to_string(&strategy).unwrap();
            assert_eq!(json, format!("\"{}\"", strategy.name()));
        }
    }
}
