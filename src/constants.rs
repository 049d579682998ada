//! Source column names and header fragments expected in the raw export.
//! Fixed names are matched exactly, fragments by case-insensitive substring.

// Fixed source columns
pub const CITY_COLUMN: &str = "Город";
pub const EDUCATION_COLUMN: &str = "Образование и ВУЗ";
pub const SALARY_COLUMN: &str = "ЗП";

// Header fragments (lowercase)
pub const DESIRED_TITLE_FRAGMENT: &str = "ищет работу на должность";
pub const CURRENT_TITLE_FRAGMENT: &str = "нынешняя должност";
pub const EMPLOYER_FRAGMENT: &str = "место работы";

/// Prefix the CSV exporter uses for auto-generated index headers ("Unnamed: 0")
pub const UNNAMED_COLUMN_PREFIX: &str = "unnamed";

// Placeholder labels (consistent across the application)
pub const NOT_SPECIFIED: &str = "Not specified";
pub const OTHER: &str = "Other";

/// Currency assumed when the salary text carries no marker
pub const DEFAULT_CURRENCY: &str = "RUB";

/// Upper bound for the null-target example table kept in diagnostics
pub const NULL_TARGET_SAMPLE_LIMIT: usize = 20;

// Graduation year window accepted by the education parser
pub const MIN_EDUCATION_YEAR: i64 = 1950;
pub const MAX_EDUCATION_YEAR: i64 = 2035;
