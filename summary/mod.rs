//! # Cohort Summary
//!
//! Descriptive statistics of phenotypes and covariates, rendered as the `##`
//! header lines that precede association results.

mod format;
pub mod report;
pub mod stats;

pub use report::{CohortSummaryReport, Covariate, ReportError};
pub use stats::{SummaryError, SummaryStatistic};
