#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
//! # rvburden
//!
//! Collapsing engine for rare-variant burden tests. A sample-by-marker dosage
//! matrix is reduced to a sample-by-K burden matrix that a downstream regression
//! consumes as a pseudo-genotype. The sibling `summary` subsystem produces the
//! `##` header describing the phenotypes and covariates of the analyzed cohort.
//!
//! Every operation takes read-only `ndarray` views and returns an owned result,
//! so independent calls can run concurrently without coordination.

pub mod config;
pub mod engine;
pub mod frequency;
pub mod grouping;
pub mod types;

#[path = "../summary/mod.rs"]
pub mod summary;

pub use config::{CollapseConfig, ConfigError};
pub use engine::{
    CollapseError, CollapseStrategy, cmc_collapse, cmc_collapse_subset, collapse,
    collapse_regions, frequency_weighted_collapse, madsen_browning_collapse, zeggini_collapse,
};
pub use frequency::{estimate_frequency, estimate_frequency_from_controls, marker_frequencies};
pub use grouping::{
    FrequencyGroup, FrequencyGroups, ProgressiveBurden, group_by_frequency, grouped_cmc_collapse,
    progressive_cmc_collapse, progressive_frequency_weighted_collapse, rearrange_by_frequency,
};
pub use summary::{CohortSummaryReport, Covariate, ReportError, SummaryError, SummaryStatistic};
pub use types::BurdenMatrix;
