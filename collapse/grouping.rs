//! # Frequency Grouping and Frequency-Ordered Collapsing
//!
//! Markers are grouped by exactly equal estimated frequency. Groups are ordered by
//! ascending frequency and the markers inside a group keep their original column
//! order, so tied markers are never separated or reordered among themselves.
//!
//! The progressive collapses build one burden column per group: column `k` covers
//! every marker whose frequency is at most the `k`-th group's frequency. Tied
//! markers always enter the cumulative set together, because no frequency
//! threshold can separate them.

use crate::engine::{
    CollapseError, add_weighted_column, carrier_indicator, cmc_collapse_subset,
    inverse_variance_weight,
};
use crate::frequency::marker_frequencies;
use crate::types::BurdenMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use serde::{Deserialize, Serialize};

/// Markers sharing one frequency value, in original column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGroup {
    pub frequency: f64,
    pub markers: Vec<usize>,
}

/// Frequency groups ordered by ascending frequency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyGroups {
    groups: Vec<FrequencyGroup>,
}

impl FrequencyGroups {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FrequencyGroup> {
        self.groups.iter()
    }

    pub fn as_slice(&self) -> &[FrequencyGroup] {
        &self.groups
    }

    /// Markers whose frequency is exactly `frequency`.
    pub fn get(&self, frequency: f64) -> Option<&[usize]> {
        self.groups
            .binary_search_by(|group| group.frequency.total_cmp(&group_key(frequency)))
            .ok()
            .map(|position| self.groups[position].markers.as_slice())
    }

    /// Distinct frequencies in ascending order.
    pub fn frequencies(&self) -> Vec<f64> {
        self.groups.iter().map(|group| group.frequency).collect()
    }

    /// Every marker, rarest group first, ties in original order.
    pub fn marker_order(&self) -> Vec<usize> {
        self.groups
            .iter()
            .flat_map(|group| group.markers.iter().copied())
            .collect()
    }
}

impl<'a> IntoIterator for &'a FrequencyGroups {
    type Item = &'a FrequencyGroup;
    type IntoIter = std::slice::Iter<'a, FrequencyGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

/// Folds `-0.0` onto `0.0` so both share one group key.
#[inline]
fn group_key(frequency: f64) -> f64 {
    if frequency == 0.0 { 0.0 } else { frequency }
}

/// Groups marker indices by frequency value.
///
/// `[0.1, 0.2, 0.1, 0.3]` groups as `0.1 -> [0, 2]`, `0.2 -> [1]`, `0.3 -> [3]`.
/// Values compare with [`f64::total_cmp`] after `-0.0` is folded onto `0.0`, so
/// values that compare equal always share a group.
pub fn group_by_frequency(frequencies: &[f64]) -> FrequencyGroups {
    let frequencies: Vec<f64> = frequencies.iter().copied().map(group_key).collect();
    let mut order: Vec<usize> = (0..frequencies.len()).collect();
    // Stable: equal frequencies keep ascending marker index.
    order.sort_by(|&left, &right| frequencies[left].total_cmp(&frequencies[right]));

    let groups = order
        .chunk_by(|&left, &right| frequencies[left].to_bits() == frequencies[right].to_bits())
        .map(|markers| FrequencyGroup {
            frequency: frequencies[markers[0]],
            markers: markers.to_vec(),
        })
        .collect();
    FrequencyGroups { groups }
}

/// Burden columns built over cumulative frequency thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressiveBurden {
    /// N×K burden, one column per distinct marker frequency.
    pub burden: BurdenMatrix,
    /// Upper frequency bound of each burden column, ascending.
    pub thresholds: Vec<f64>,
}

/// Copies the genotype columns into ascending-frequency order.
///
/// Returns the reordered matrix and the frequency of each of its columns.
pub fn rearrange_by_frequency(genotypes: ArrayView2<'_, f64>) -> (Array2<f64>, Vec<f64>) {
    let frequencies = marker_frequencies(genotypes);
    let order = group_by_frequency(&frequencies).marker_order();
    let sorted = order.iter().map(|&marker| frequencies[marker]).collect();
    (genotypes.select(Axis(1), &order), sorted)
}

/// CMC indicator with one column per group of the given grouping (not cumulative).
///
/// `groups` may come from another estimate of the same markers, so indices are
/// validated against `genotypes`.
pub fn grouped_cmc_collapse(
    genotypes: ArrayView2<'_, f64>,
    groups: &FrequencyGroups,
) -> Result<BurdenMatrix, CollapseError> {
    let mut burden = BurdenMatrix::zeros(genotypes.nrows(), groups.len());
    for (column, group) in groups.iter().enumerate() {
        let indicator = cmc_collapse_subset(genotypes, &group.markers)?;
        burden.assign_column(column, indicator.view())?;
    }
    Ok(burden)
}

/// Progressive CMC: column `k` is 1.0 for samples carrying any marker whose
/// frequency is at most `thresholds[k]`.
pub fn progressive_cmc_collapse(genotypes: ArrayView2<'_, f64>) -> ProgressiveBurden {
    let groups = group_by_frequency(&marker_frequencies(genotypes));
    let mut burden = BurdenMatrix::zeros(genotypes.nrows(), groups.len());
    let mut carried = Array1::<f64>::zeros(genotypes.nrows());
    for (column, group) in groups.iter().enumerate() {
        let indicator = carrier_indicator(genotypes, &group.markers);
        Zip::from(&mut carried)
            .and(&indicator)
            .for_each(|running, &flag| *running = running.max(flag));
        burden.column_mut(column).assign(&carried);
    }
    log::debug!(
        "Progressive CMC collapse built {} threshold columns from {} markers",
        groups.len(),
        genotypes.ncols()
    );
    ProgressiveBurden {
        burden,
        thresholds: groups.frequencies(),
    }
}

/// Progressive frequency-weighted collapse: column `k` is the weighted burden of
/// every marker whose frequency is at most `thresholds[k]`.
///
/// Groups at frequency 0 or 1 have no weight, so their column repeats the previous one.
pub fn progressive_frequency_weighted_collapse(genotypes: ArrayView2<'_, f64>) -> ProgressiveBurden {
    let groups = group_by_frequency(&marker_frequencies(genotypes));
    let mut burden = BurdenMatrix::zeros(genotypes.nrows(), groups.len());
    let mut running = Array1::<f64>::zeros(genotypes.nrows());
    for (column, group) in groups.iter().enumerate() {
        if let Some(weight) = inverse_variance_weight(group.frequency, 1.0) {
            for &marker in &group.markers {
                add_weighted_column(&mut running, genotypes.column(marker), weight);
            }
        } else {
            log::trace!(
                "Frequency group {} has no defined weight; {} markers skipped",
                group.frequency,
                group.markers.len()
            );
        }
        burden.column_mut(column).assign(&running);
    }
    ProgressiveBurden {
        burden,
        thresholds: groups.frequencies(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{cmc_collapse, frequency_weighted_collapse};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, s};

    #[test]
    fn tied_frequencies_share_a_group_in_marker_order() {
        let groups = group_by_frequency(&[0.1, 0.2, 0.1, 0.3]);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups.get(0.1), Some(&[0usize, 2][..]));
        assert_eq!(groups.get(0.2), Some(&[1usize][..]));
        assert_eq!(groups.get(0.3), Some(&[3usize][..]));
        assert_eq!(groups.get(0.4), None);
        assert_eq!(groups.frequencies(), vec![0.1, 0.2, 0.3]);
        assert_eq!(groups.marker_order(), vec![0, 2, 1, 3]);
    }

    #[test]
    fn signed_zeros_share_one_group() {
        let groups = group_by_frequency(&[0.0, -0.0, 0.25, 0.0]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups.get(0.0), Some(&[0usize, 1, 3][..]));
        assert_eq!(groups.get(-0.0), Some(&[0usize, 1, 3][..]));
        assert_eq!(groups.frequencies()[0].to_bits(), 0.0_f64.to_bits());
    }

    #[test]
    fn empty_frequencies_give_no_groups() {
        let groups = group_by_frequency(&[]);
        assert!(groups.is_empty());
        assert!(groups.marker_order().is_empty());
    }

    #[test]
    fn rearrangement_sorts_columns_by_frequency() {
        // Frequencies: 0.5, 0.25, 0.0, 0.25.
        let genotypes = array![[1.0, 1.0, 0.0, 0.0], [1.0, 0.0, 0.0, 1.0]];
        let (sorted, frequencies) = rearrange_by_frequency(genotypes.view());
        assert_eq!(frequencies, vec![0.0, 0.25, 0.25, 0.5]);
        assert_eq!(sorted, array![[0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]]);
    }

    #[test]
    fn grouped_cmc_writes_one_indicator_per_group() {
        let genotypes = array![[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, 0.0]];
        let groups = group_by_frequency(&[0.2, 0.1, 0.2]);
        let burden = grouped_cmc_collapse(genotypes.view(), &groups).unwrap();
        // Group 0.1 holds marker 1, group 0.2 holds markers 0 and 2.
        assert_eq!(burden.0, array![[0.0, 1.0], [0.0, 1.0], [0.0, 0.0]]);
    }

    #[test]
    fn grouped_cmc_rejects_foreign_marker_indices() {
        let genotypes = array![[1.0]];
        let groups = group_by_frequency(&[0.2, 0.1]);
        assert!(matches!(
            grouped_cmc_collapse(genotypes.view(), &groups),
            Err(CollapseError::MarkerOutOfRange { n_markers: 1, .. })
        ));
    }

    #[test]
    fn progressive_cmc_is_cumulative_and_ends_at_full_cmc() {
        // Frequencies: 1/6, 2/6, 1/6.
        let genotypes = array![[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]];
        let progressive = progressive_cmc_collapse(genotypes.view());
        assert_eq!(progressive.thresholds.len(), 2);
        assert_eq!(
            progressive.burden.0,
            array![[1.0, 1.0], [0.0, 1.0], [1.0, 1.0]]
        );
        let last = progressive.burden.slice(s![.., 1]).to_owned();
        assert_eq!(last, cmc_collapse(genotypes.view()).scores().to_owned());
    }

    #[test]
    fn progressive_weighted_repeats_columns_for_degenerate_groups() {
        // Frequencies: 0.0, 0.25, 1.0.
        let genotypes = array![[0.0, 1.0, 2.0], [0.0, 0.0, 2.0]];
        let progressive = progressive_frequency_weighted_collapse(genotypes.view());
        assert_eq!(progressive.thresholds, vec![0.0, 0.25, 1.0]);
        let weight = 1.0 / (0.25_f64 * 0.75).sqrt();
        let burden = &progressive.burden;
        assert_eq!(burden[[0, 0]], 0.0);
        assert_abs_diff_eq!(burden[[0, 1]], weight, epsilon = 1e-12);
        assert_abs_diff_eq!(burden[[0, 2]], weight, epsilon = 1e-12);
        assert_eq!(burden[[1, 2]], 0.0);

        let full = frequency_weighted_collapse(genotypes.view());
        assert_abs_diff_eq!(burden[[0, 2]], full[[0, 0]], epsilon = 1e-12);
    }
}
