use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::constants::NULL_TARGET_SAMPLE_LIMIT;

/// Append-only record of what happened during one pipeline run.
///
/// Stages only add to it; nothing in the pipeline reads it back for control
/// flow. It is serialized next to the processed table for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    warnings: Vec<StageWarning>,
    dropped_columns: Vec<String>,
    stages: Vec<StageReport>,
    fx_rates_source: Option<String>,
    salary: Option<SalaryDiagnostics>,
}

/// A recoverable problem a stage worked around
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageWarning {
    pub stage: String,
    pub message: String,
}

/// Shape of the table after a stage finished
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub columns_out: usize,
    pub duration_ms: u128,
}

/// Salary stage bookkeeping for null targets and suspicious values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryDiagnostics {
    pub rows_with_null_target: usize,
    pub null_target_examples: Vec<NullTargetExample>,
    /// Rows whose converted amount was exactly zero before rejection
    pub target_zeros: usize,
    pub negotiable_rows: usize,
    pub unconvertible_currencies: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullTargetExample {
    pub row: usize,
    pub raw: Option<String>,
    pub currency: String,
}

impl SalaryDiagnostics {
    /// Count a null row, keeping its text while the sample has room
    pub fn record_null(&mut self, row: usize, raw: Option<&str>, currency: &str) {
        self.rows_with_null_target += 1;
        if self.null_target_examples.len() < NULL_TARGET_SAMPLE_LIMIT {
            self.null_target_examples.push(NullTargetExample {
                row,
                raw: raw.map(str::to_string),
                currency: currency.to_string(),
            });
        }
    }

    pub fn record_unconvertible(&mut self, currency: &str) {
        *self
            .unconvertible_currencies
            .entry(currency.to_string())
            .or_insert(0) += 1;
    }
}

impl Diagnostics {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            warnings: Vec::new(),
            dropped_columns: Vec::new(),
            stages: Vec::new(),
            fx_rates_source: None,
            salary: None,
        }
    }

    pub fn warn(&mut self, stage: &str, message: impl Into<String>) {
        self.warnings.push(StageWarning {
            stage: stage.to_string(),
            message: message.into(),
        });
    }

    pub fn record_dropped_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dropped_columns.extend(columns.into_iter().map(Into::into));
    }

    pub fn record_stage(&mut self, report: StageReport) {
        self.stages.push(report);
    }

    pub fn record_fx_source(&mut self, source: impl Into<String>) {
        self.fx_rates_source = Some(source.into());
    }

    pub fn record_salary(&mut self, salary: SalaryDiagnostics) {
        self.salary = Some(salary);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn warnings(&self) -> &[StageWarning] {
        &self.warnings
    }

    pub fn dropped_columns(&self) -> &[String] {
        &self.dropped_columns
    }

    pub fn stages(&self) -> &[StageReport] {
        &self.stages
    }

    pub fn fx_rates_source(&self) -> Option<&str> {
        self.fx_rates_source.as_deref()
    }

    pub fn salary(&self) -> Option<&SalaryDiagnostics> {
        self.salary.as_ref()
    }
}
