use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::pipeline::diagnostics::Diagnostics;
use crate::pipeline::table::Table;

/// Per-run carrier threaded through the stage chain.
///
/// The working table is moved out for each stage and the stage's result is
/// moved back in, so there is never more than one live table state.
#[derive(Debug)]
pub struct PipelineContext {
    table: Option<Table>,
    workspace: PathBuf,
    pub diagnostics: Diagnostics,
}

impl PipelineContext {
    pub fn new(table: Table, workspace: impl Into<PathBuf>) -> Self {
        Self {
            table: Some(table),
            workspace: workspace.into(),
            diagnostics: Diagnostics::new(Uuid::new_v4()),
        }
    }

    /// A context with no table loaded yet
    pub fn empty(workspace: impl Into<PathBuf>) -> Self {
        Self {
            table: None,
            workspace: workspace.into(),
            diagnostics: Diagnostics::new(Uuid::new_v4()),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.diagnostics.run_id
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// Take ownership of the working table; fails if none is loaded
    pub fn take_table(&mut self) -> Result<Table> {
        self.table.take().ok_or(PipelineError::TableNotLoaded)
    }

    pub fn set_table(&mut self, table: Table) {
        self.table = Some(table);
    }

    /// Consume the context once the chain is done
    pub fn into_parts(self) -> (Option<Table>, Diagnostics) {
        (self.table, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_table_twice_fails() {
        let mut ctx = PipelineContext::new(Table::with_rows(3), "/tmp");
        assert_eq!(ctx.take_table().unwrap().row_count(), 3);
        assert!(matches!(ctx.take_table(), Err(PipelineError::TableNotLoaded)));
    }

    #[test]
    fn test_empty_context_has_no_table() {
        let ctx = PipelineContext::empty("/tmp");
        assert!(ctx.table().is_none());
        assert_eq!(ctx.workspace(), Path::new("/tmp"));
    }
}
