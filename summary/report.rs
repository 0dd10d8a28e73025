use super::format::format_general;
use super::stats::{SummaryError, SummaryStatistic};
use itertools::Itertools;
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use thiserror::Error;

const SUMMARY_COLUMNS: &str = "min\t25th\tmedian\t75th\tmax\tmean\tvariance";

/// Count fields of the header. All of them report the cohort size.
const COUNT_FIELDS: [&str; 6] = [
    "Samples",
    "AnalyzedSamples",
    "Families",
    "AnalyzedFamilies",
    "Founders",
    "AnalyzedFounders",
];

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Phenotype '{label}' could not be summarized: {source}")]
    Phenotype {
        label: String,
        #[source]
        source: SummaryError,
    },
    #[error("Covariate '{label}' could not be summarized: {source}")]
    Covariate {
        label: String,
        #[source]
        source: SummaryError,
    },
    #[error("Covariate matrix has {columns} columns, but {labels} labels were supplied.")]
    CovariateLabels { labels: usize, columns: usize },
    #[error("Failed to write the summary header: {0}")]
    Io(#[from] std::io::Error),
}

/// One labeled covariate column.
#[derive(Debug, Clone, PartialEq)]
pub struct Covariate {
    pub label: String,
    pub values: Array1<f64>,
}

impl Covariate {
    pub fn new(label: impl Into<String>, values: Array1<f64>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }

    /// Splits a samples × covariates matrix into labeled columns.
    pub fn from_columns<S: AsRef<str>>(
        labels: &[S],
        matrix: ArrayView2<'_, f64>,
    ) -> Result<Vec<Self>, ReportError> {
        if labels.len() != matrix.ncols() {
            return Err(ReportError::CovariateLabels {
                labels: labels.len(),
                columns: matrix.ncols(),
            });
        }
        Ok(labels
            .iter()
            .zip(matrix.columns())
            .map(|(label, column)| Self::new(label.as_ref(), column.to_owned()))
            .collect())
    }
}

/// Phenotype and covariate summaries for the `##` header of an association run.
///
/// Phenotypes accumulate in recording order. Covariates are replaced as a whole by
/// each call to [`record_covariates`](Self::record_covariates).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CohortSummaryReport {
    phenotypes: Vec<(String, SummaryStatistic)>,
    covariates: Vec<(String, SummaryStatistic)>,
    inverse_normal: bool,
}

impl CohortSummaryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a phenotype summary. Duplicate labels are kept as separate entries.
    pub fn record_phenotype<'a>(
        &mut self,
        label: impl Into<String>,
        values: impl Into<ArrayView1<'a, f64>>,
    ) -> Result<(), ReportError> {
        let label = label.into();
        match SummaryStatistic::from_values(values) {
            Ok(summary) => {
                self.phenotypes.push((label, summary));
                Ok(())
            }
            Err(source) => Err(ReportError::Phenotype { label, source }),
        }
    }

    pub fn set_inverse_normalize(&mut self, inverse_normal: bool) {
        self.inverse_normal = inverse_normal;
    }

    /// Replaces every covariate summary with one per supplied column.
    ///
    /// Previously recorded covariates are discarded first, so on error the report
    /// holds no covariates at all.
    pub fn record_covariates(&mut self, covariates: &[Covariate]) -> Result<(), ReportError> {
        self.covariates.clear();
        let mut summaries = Vec::with_capacity(covariates.len());
        for covariate in covariates {
            let summary = SummaryStatistic::from_values(&covariate.values).map_err(|source| {
                ReportError::Covariate {
                    label: covariate.label.clone(),
                    source,
                }
            })?;
            summaries.push((covariate.label.clone(), summary));
        }
        self.covariates = summaries;
        Ok(())
    }

    /// Cohort size: the value count of the first recorded phenotype, or 0.
    pub fn sample_count(&self) -> usize {
        self.phenotypes
            .first()
            .map_or(0, |(_, summary)| summary.count)
    }

    pub fn inverse_normal(&self) -> bool {
        self.inverse_normal
    }

    pub fn phenotypes(&self) -> &[(String, SummaryStatistic)] {
        &self.phenotypes
    }

    pub fn covariates(&self) -> &[(String, SummaryStatistic)] {
        &self.covariates
    }

    /// Writes the header lines to `writer`.
    pub fn render<W: Write>(&self, writer: &mut W) -> Result<(), ReportError> {
        write!(writer, "{self}")?;
        writer.flush()?;
        Ok(())
    }

    /// The rendered header as a `String`.
    pub fn to_header_string(&self) -> String {
        self.to_string()
    }
}

fn write_summary_row(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    summary: &SummaryStatistic,
) -> fmt::Result {
    writeln!(
        f,
        "##{label}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        format_general(summary.min),
        format_general(summary.q1),
        format_general(summary.median),
        format_general(summary.q3),
        format_general(summary.max),
        format_general(summary.mean),
        format_general(summary.variance()),
    )
}

impl fmt::Display for CohortSummaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let samples = self.sample_count();
        for field in COUNT_FIELDS {
            writeln!(f, "##{field}={samples}")?;
        }
        let inverse_normal = if self.inverse_normal { "ON" } else { "OFF" };
        writeln!(f, "##InverseNormal={inverse_normal}")?;

        writeln!(f, "##TraitSummary\t{SUMMARY_COLUMNS}")?;
        for (label, summary) in &self.phenotypes {
            write_summary_row(f, label, summary)?;
        }

        if self.covariates.is_empty() {
            return Ok(());
        }
        let labels = self.covariates.iter().map(|(label, _)| label).join(",");
        writeln!(f, "##Covariates={labels}")?;
        writeln!(f, "##CovariateSummary\t{SUMMARY_COLUMNS}")?;
        for (label, summary) in &self.covariates {
            write_summary_row(f, label, summary)?;
        }
        Ok(())
    }
}
