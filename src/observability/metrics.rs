//! Pipeline metrics recorded through the `metrics` facade.
//!
//! Nothing is exported unless a recorder is installed (see [`init`]); the
//! recording functions are no-ops otherwise.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use tracing::info;

use crate::error::{PipelineError, Result};

/// All metric names used by the pipeline, so no stage spells one by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Stage metrics
    StageRuns,
    StageDuration,
    StageRows,
    StageMissingColumns,

    // Salary metrics
    SalaryParsed,
    SalaryNullTargets,
    SalaryNegotiable,
    SalaryUnconvertible,

    // FX metrics
    FxRatesLoaded,
    FxRatesLoadError,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::StageRuns => "salary_prep_stage_runs_total",
            MetricName::StageDuration => "salary_prep_stage_duration_seconds",
            MetricName::StageRows => "salary_prep_stage_rows",
            MetricName::StageMissingColumns => "salary_prep_stage_missing_columns_total",

            MetricName::SalaryParsed => "salary_prep_salary_parsed_total",
            MetricName::SalaryNullTargets => "salary_prep_salary_null_targets_total",
            MetricName::SalaryNegotiable => "salary_prep_salary_negotiable_total",
            MetricName::SalaryUnconvertible => "salary_prep_salary_unconvertible_total",

            MetricName::FxRatesLoaded => "salary_prep_fx_rates_loaded_total",
            MetricName::FxRatesLoadError => "salary_prep_fx_rates_load_error_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            StageRuns,
            StageDuration,
            StageRows,
            StageMissingColumns,
            SalaryParsed,
            SalaryNullTargets,
            SalaryNegotiable,
            SalaryUnconvertible,
            FxRatesLoaded,
            FxRatesLoadError,
        ]
        .into_iter()
    }
}

/// Install the Prometheus recorder and return a handle for rendering
pub fn init() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| {
            PipelineError::Config(format!("Failed to install Prometheus recorder: {}", e))
        })?;
    info!("Metrics recorder installed");
    Ok(handle)
}

pub mod stage {
    use super::MetricName;

    pub fn completed(stage: &'static str, rows: usize, secs: f64) {
        ::metrics::counter!(MetricName::StageRuns.as_str(), "stage" => stage).increment(1);
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => stage).record(secs);
        ::metrics::gauge!(MetricName::StageRows.as_str(), "stage" => stage).set(rows as f64);
    }

    pub fn missing_column(stage: &'static str) {
        ::metrics::counter!(MetricName::StageMissingColumns.as_str(), "stage" => stage)
            .increment(1);
    }
}

pub mod salary {
    use super::MetricName;

    pub fn parsed(count: usize) {
        ::metrics::counter!(MetricName::SalaryParsed.as_str()).increment(count as u64);
    }

    pub fn null_targets(count: usize) {
        ::metrics::counter!(MetricName::SalaryNullTargets.as_str()).increment(count as u64);
    }

    pub fn negotiable(count: usize) {
        ::metrics::counter!(MetricName::SalaryNegotiable.as_str()).increment(count as u64);
    }

    pub fn unconvertible(currency: &str, count: usize) {
        ::metrics::counter!(
            MetricName::SalaryUnconvertible.as_str(),
            "currency" => currency.to_string()
        )
        .increment(count as u64);
    }
}

pub mod fx {
    use super::MetricName;

    pub fn loaded(source: &str) {
        ::metrics::counter!(MetricName::FxRatesLoaded.as_str(), "source" => source.to_string())
            .increment(1);
    }

    pub fn load_error(provider: &'static str) {
        ::metrics::counter!(MetricName::FxRatesLoadError.as_str(), "provider" => provider)
            .increment(1);
    }
}
