//! Alternate-allele frequency estimation used to weight markers by rarity.
//!
//! Two estimators exist and are deliberately not unified:
//! - [`estimate_frequency`] is the plain ratio `count / total` and reports `0.0`
//!   when no sample is informative.
//! - [`estimate_frequency_from_controls`] uses controls only and adds a
//!   pseudo-count, `(count + 1) / (total + 2)`, so the result is always strictly
//!   inside `(0, 1)`.
//!
//! The weighted collapsing strategies depend on which of the two they call.

use crate::engine::CollapseError;
use ndarray::{ArrayView1, ArrayView2};

/// Phenotype value marking a case. Any other value is treated as a control.
pub const CASE_PHENOTYPE: f64 = 1.0;

/// Allele slots contributed by every usable (diploid) sample.
const ALLELES_PER_SAMPLE: f64 = 2.0;

/// A dosage is usable when it is non-negative. Negative sentinels and NaN are missing.
#[inline]
pub(crate) fn is_observed(dosage: f64) -> bool {
    dosage >= 0.0
}

/// Sums `(allele count, allele total)` over the observed dosages.
fn tally(dosages: impl Iterator<Item = f64>) -> (f64, f64) {
    dosages
        .filter(|&dosage| is_observed(dosage))
        .fold((0.0, 0.0), |(count, total), dosage| {
            (count + dosage, total + ALLELES_PER_SAMPLE)
        })
}

pub(crate) fn plain_frequency(column: ArrayView1<'_, f64>) -> f64 {
    let (count, total) = tally(column.iter().copied());
    if total == 0.0 {
        return 0.0;
    }
    count / total
}

pub(crate) fn control_frequency(column: ArrayView1<'_, f64>, phenotype: ArrayView1<'_, f64>) -> f64 {
    let controls = column
        .iter()
        .zip(phenotype.iter())
        .filter(|&(_, &trait_value)| trait_value != CASE_PHENOTYPE)
        .map(|(&dosage, _)| dosage);
    let (count, total) = tally(controls);
    (count + 1.0) / (total + 2.0)
}

pub(crate) fn check_marker(genotypes: ArrayView2<'_, f64>, marker: usize) -> Result<(), CollapseError> {
    if marker >= genotypes.ncols() {
        return Err(CollapseError::MarkerOutOfRange {
            marker,
            n_markers: genotypes.ncols(),
        });
    }
    Ok(())
}

pub(crate) fn check_phenotype(
    genotypes: ArrayView2<'_, f64>,
    phenotype: ArrayView1<'_, f64>,
) -> Result<(), CollapseError> {
    if phenotype.len() != genotypes.nrows() {
        return Err(CollapseError::PhenotypeLength {
            found: phenotype.len(),
            expected: genotypes.nrows(),
        });
    }
    Ok(())
}

/// Alternate-allele frequency of one marker over every sample with an observed dosage.
///
/// Each observed sample contributes its dosage to the allele count and two slots to
/// the allele total, whatever the dosage value. Returns `0.0` when the marker is
/// missing for every sample.
pub fn estimate_frequency(
    genotypes: ArrayView2<'_, f64>,
    marker: usize,
) -> Result<f64, CollapseError> {
    check_marker(genotypes, marker)?;
    Ok(plain_frequency(genotypes.column(marker)))
}

/// Alternate-allele frequency of one marker among controls (`phenotype != 1`),
/// with one pseudo-allele added to the count and two slots added to the total.
///
/// With no informative control the estimate is `0.5`.
pub fn estimate_frequency_from_controls(
    genotypes: ArrayView2<'_, f64>,
    phenotype: ArrayView1<'_, f64>,
    marker: usize,
) -> Result<f64, CollapseError> {
    check_marker(genotypes, marker)?;
    check_phenotype(genotypes, phenotype)?;
    Ok(control_frequency(genotypes.column(marker), phenotype))
}

/// Plain frequency estimate for every marker column, in column order.
pub fn marker_frequencies(genotypes: ArrayView2<'_, f64>) -> Vec<f64> {
    genotypes.columns().into_iter().map(plain_frequency).collect()
}
