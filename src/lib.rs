pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod fx;
pub mod logging;
pub mod observability;
pub mod pipeline;

pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, PipelineContext};
