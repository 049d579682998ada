// Pipeline processing: the stage contract and the concrete stages

pub mod clean_columns;
pub mod education;
pub mod handler;
pub mod job_category;
pub mod location;
pub mod rules;
pub mod salary;

pub use clean_columns::CleanColumnsHandler;
pub use education::EducationHandler;
pub use handler::{Handler, StageScope};
pub use job_category::JobCategoryHandler;
pub use location::LocationHandler;
pub use salary::SalaryHandler;
