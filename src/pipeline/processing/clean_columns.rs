use tracing::info;

use super::handler::{Handler, StageScope};
use crate::constants::UNNAMED_COLUMN_PREFIX;
use crate::error::Result;
use crate::pipeline::table::Table;

/// Trims header whitespace and drops exporter-generated index columns.
/// Cell content is never inspected.
pub struct CleanColumnsHandler;

impl CleanColumnsHandler {
    pub fn new() -> Self {
        Self
    }

    fn is_placeholder(name: &str) -> bool {
        name.to_lowercase().starts_with(UNNAMED_COLUMN_PREFIX)
    }
}

impl Default for CleanColumnsHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for CleanColumnsHandler {
    fn name(&self) -> &'static str {
        "clean_columns"
    }

    fn transform(&self, table: Table, scope: &mut StageScope<'_>) -> Result<Table> {
        let table = table.rename_columns(|name| name.trim().to_string());

        let dropped: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|name| Self::is_placeholder(name))
            .map(str::to_string)
            .collect();

        if dropped.is_empty() {
            return Ok(table);
        }

        info!("Dropped columns: {:?}", dropped);
        let table = table.drop_columns(&dropped);
        scope.diagnostics.record_dropped_columns(dropped);
        Ok(table)
    }
}
