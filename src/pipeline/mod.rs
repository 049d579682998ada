// Record normalization pipeline: table model, run context, and the stage chain

pub mod context;
pub mod diagnostics;
pub mod processing;
pub mod schema;
pub mod table;
pub mod utils;

use tracing::{info, instrument};

use crate::error::Result;
use crate::fx::FxRateProvider;
use processing::{
    CleanColumnsHandler, EducationHandler, Handler, JobCategoryHandler, LocationHandler,
    SalaryHandler,
};

pub use context::PipelineContext;
pub use diagnostics::Diagnostics;
pub use table::{Column, Table, Value};

/// Ordered stage chain. Each stage consumes the previous table state.
pub struct Pipeline {
    handlers: Vec<Box<dyn Handler>>,
}

impl Pipeline {
    pub fn new(handlers: Vec<Box<dyn Handler>>) -> Self {
        Self { handlers }
    }

    /// The fixed preprocessing order: cleaning, job category, education,
    /// location, salary
    pub fn standard(fx: Box<dyn FxRateProvider>) -> Self {
        Self::new(vec![
            Box::new(CleanColumnsHandler::new()),
            Box::new(JobCategoryHandler::new()),
            Box::new(EducationHandler::new()),
            Box::new(LocationHandler::new()),
            Box::new(SalaryHandler::new(fx)),
        ])
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Thread the context through every stage; the first error aborts the run
    #[instrument(skip_all, fields(run_id = %ctx.run_id()))]
    pub fn run(&self, ctx: PipelineContext) -> Result<PipelineContext> {
        let mut ctx = self
            .handlers
            .iter()
            .try_fold(ctx, |ctx, handler| handler.handle(ctx))?;

        ctx.diagnostics.finish();
        info!(
            "Pipeline finished: {} stages, {} warnings",
            ctx.diagnostics.stages().len(),
            ctx.diagnostics.warnings().len()
        );
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::fx::StaticFxRateProvider;

    #[test]
    fn test_standard_order() {
        let pipeline = Pipeline::standard(Box::new(StaticFxRateProvider));
        assert_eq!(
            pipeline.stage_names(),
            vec!["clean_columns", "job_category", "education", "location", "salary"]
        );
    }

    #[test]
    fn test_run_without_table_fails() {
        let pipeline = Pipeline::standard(Box::new(StaticFxRateProvider));
        let result = pipeline.run(PipelineContext::empty("/tmp"));
        assert!(matches!(result, Err(PipelineError::TableNotLoaded)));
    }

    #[test]
    fn test_run_records_every_stage() {
        let table = Table::from_rows(
            vec!["ЗП".to_string()],
            vec![vec![Value::text("100 000 руб.")], vec![Value::Null]],
        );
        let ctx = Pipeline::standard(Box::new(StaticFxRateProvider))
            .run(PipelineContext::new(table, "/tmp"))
            .unwrap();

        assert_eq!(ctx.diagnostics.stages().len(), 5);
        assert!(ctx.diagnostics.finished_at.is_some());
        assert_eq!(ctx.table().unwrap().row_count(), 2);
    }
}
