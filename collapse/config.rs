use crate::engine::{CollapseError, CollapseStrategy, collapse};
use crate::summary::CohortSummaryReport;
use crate::types::BurdenMatrix;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The collapsing policy of one analysis, stored in TOML next to its results.
///
/// ```toml
/// strategy = "madsen-browning"
/// inverse_normal = true
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollapseConfig {
    #[serde(default)]
    pub strategy: CollapseStrategy,
    /// Whether phenotypes were inverse-normal transformed upstream. Only reported
    /// in the summary header, see [`CollapseConfig::configure_report`].
    #[serde(default)]
    pub inverse_normal: bool,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse TOML collapsing configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize collapsing configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

impl CollapseConfig {
    pub fn new(strategy: CollapseStrategy) -> Self {
        Self {
            strategy,
            inverse_normal: false,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Collapses `genotypes` with the configured strategy.
    pub fn apply(
        &self,
        genotypes: ArrayView2<'_, f64>,
        phenotype: Option<ArrayView1<'_, f64>>,
    ) -> Result<BurdenMatrix, CollapseError> {
        collapse(self.strategy, genotypes, phenotype)
    }

    /// Copies the report-level settings into `report`.
    pub fn configure_report(&self, report: &mut CohortSummaryReport) {
        report.set_inverse_normalize(self.inverse_normal);
    }
}
