use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Table is not loaded into the pipeline context")]
    TableNotLoaded,

    #[error("Required column '{0}' not found")]
    MissingRequiredColumn(String),

    #[error("Stage '{stage}' changed the row count from {before} to {after}")]
    RowCountChanged {
        stage: String,
        before: usize,
        after: usize,
    },

    #[error("Column '{column}' has {actual} values, table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("FX rates unavailable: {0}")]
    FxUnavailable(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Precondition failures abort the run; everything content-related is
    /// handled inside the stages and never surfaces here.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::TableNotLoaded
                | PipelineError::MissingRequiredColumn(_)
                | PipelineError::RowCountChanged { .. }
                | PipelineError::ColumnLength { .. }
                | PipelineError::FxUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
