use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::observability::metrics;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::diagnostics::{Diagnostics, StageReport};
use crate::pipeline::schema::DerivedColumn;
use crate::pipeline::table::{Column, Table};

/// What a stage may see besides the table it transforms
pub struct StageScope<'a> {
    pub stage: &'static str,
    pub workspace: &'a Path,
    pub diagnostics: &'a mut Diagnostics,
}

impl StageScope<'_> {
    /// Record a recoverable problem in diagnostics and the log
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(stage = self.stage, "{}", message);
        self.diagnostics.warn(self.stage, message);
    }

    /// Warn about an absent optional source column and return the defaults
    /// for the derived columns it would have fed
    pub fn missing_source(
        &mut self,
        source: &str,
        derived: &[DerivedColumn],
        rows: usize,
    ) -> Vec<Column> {
        let names: Vec<_> = derived.iter().map(|d| d.name()).collect();
        self.warn(format!(
            "Column '{}' not found; using defaults for {}",
            source,
            names.join(", ")
        ));
        metrics::stage::missing_column(self.stage);
        derived.iter().map(|d| d.default_column(rows)).collect()
    }
}

/// Contract for one step of the preprocessing chain.
///
/// Implementors provide [`Handler::transform`]; [`Handler::handle`] wraps it
/// with the precondition checks shared by all stages.
pub trait Handler: Send + Sync {
    /// Stable stage name used in logs, metrics and diagnostics
    fn name(&self) -> &'static str;

    /// Consume the current table state and produce the next one
    fn transform(&self, table: Table, scope: &mut StageScope<'_>) -> Result<Table>;

    /// Run the stage against the context: the table must be loaded and the
    /// stage must not add or remove rows.
    #[instrument(skip_all, fields(stage = self.name()))]
    fn handle(&self, mut ctx: PipelineContext) -> Result<PipelineContext> {
        let table = ctx.take_table()?;
        let rows_in = table.row_count();
        let started = Instant::now();
        debug!("Starting stage with {} rows, {} columns", rows_in, table.column_count());

        let table = {
            let workspace = ctx.workspace().to_path_buf();
            let mut scope = StageScope {
                stage: self.name(),
                workspace: &workspace,
                diagnostics: &mut ctx.diagnostics,
            };
            self.transform(table, &mut scope)?
        };

        let rows_out = table.row_count();
        if rows_out != rows_in {
            return Err(PipelineError::RowCountChanged {
                stage: self.name().to_string(),
                before: rows_in,
                after: rows_out,
            });
        }

        let elapsed = started.elapsed();
        metrics::stage::completed(self.name(), rows_out, elapsed.as_secs_f64());
        ctx.diagnostics.record_stage(StageReport {
            stage: self.name().to_string(),
            rows_in,
            rows_out,
            columns_out: table.column_count(),
            duration_ms: elapsed.as_millis(),
        });
        info!(
            "Stage {} finished: {} rows, {} columns in {:?}",
            self.name(),
            rows_out,
            table.column_count(),
            elapsed
        );

        ctx.set_table(table);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::table::Value;

    struct DropFirstRow;

    impl Handler for DropFirstRow {
        fn name(&self) -> &'static str {
            "drop_first_row"
        }

        fn transform(&self, table: Table, _scope: &mut StageScope<'_>) -> Result<Table> {
            let mut out = Table::with_rows(table.row_count().saturating_sub(1));
            for col in table.columns() {
                out = out.with_column(Column::new(col.name.clone(), col.values[1..].to_vec()))?;
            }
            Ok(out)
        }
    }

    struct AddFlag;

    impl Handler for AddFlag {
        fn name(&self) -> &'static str {
            "add_flag"
        }

        fn transform(&self, table: Table, scope: &mut StageScope<'_>) -> Result<Table> {
            scope.warn("flag added");
            let rows = table.row_count();
            table.with_column(Column::filled("flag", Value::Bool(true), rows))
        }
    }

    fn ctx() -> PipelineContext {
        let table = Table::from_rows(
            vec!["a".to_string()],
            vec![vec![Value::text("1")], vec![Value::text("2")]],
        );
        PipelineContext::new(table, "/tmp")
    }

    #[test]
    fn test_row_count_change_is_fatal() {
        let result = DropFirstRow.handle(ctx());
        assert!(matches!(
            result,
            Err(PipelineError::RowCountChanged { before: 2, after: 1, .. })
        ));
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let result = AddFlag.handle(PipelineContext::empty("/tmp"));
        assert!(matches!(result, Err(PipelineError::TableNotLoaded)));
    }

    #[test]
    fn test_handle_records_stage_and_warning() {
        let ctx = AddFlag.handle(ctx()).unwrap();
        assert_eq!(ctx.diagnostics.stages().len(), 1);
        assert_eq!(ctx.diagnostics.stages()[0].columns_out, 2);
        assert_eq!(ctx.diagnostics.warnings()[0].stage, "add_flag");
        assert!(ctx.table().unwrap().has_column("flag"));
    }
}
