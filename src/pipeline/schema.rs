use crate::constants::NOT_SPECIFIED;
use crate::pipeline::table::{Column, Value};

/// Value kind of a derived column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Label,
    Text,
    Year,
    Flag,
    Amount,
}

/// Every column the stages add to the table, with its documented default.
/// Stages fill missing-source defaults through this schema only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedColumn {
    JobCategory,
    CurrentJobCategory,
    EducationLevel,
    EducationYear,
    City,
    CityKey,
    RelocateReady,
    TripsReady,
    SalaryCurrency,
    TargetSalaryRub,
}

impl DerivedColumn {
    pub fn name(&self) -> &'static str {
        match self {
            DerivedColumn::JobCategory => "job_category",
            DerivedColumn::CurrentJobCategory => "current_job_category",
            DerivedColumn::EducationLevel => "education_level",
            DerivedColumn::EducationYear => "education_year",
            DerivedColumn::City => "city",
            DerivedColumn::CityKey => "city_key",
            DerivedColumn::RelocateReady => "relocate_ready",
            DerivedColumn::TripsReady => "trips_ready",
            DerivedColumn::SalaryCurrency => "salary_currency",
            DerivedColumn::TargetSalaryRub => "target_salary_rub",
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            DerivedColumn::JobCategory
            | DerivedColumn::CurrentJobCategory
            | DerivedColumn::EducationLevel => ColumnKind::Label,
            DerivedColumn::City | DerivedColumn::CityKey | DerivedColumn::SalaryCurrency => {
                ColumnKind::Text
            }
            DerivedColumn::EducationYear => ColumnKind::Year,
            DerivedColumn::RelocateReady | DerivedColumn::TripsReady => ColumnKind::Flag,
            DerivedColumn::TargetSalaryRub => ColumnKind::Amount,
        }
    }

    /// The "not specified" value for this column
    pub fn default_value(&self) -> Value {
        match self {
            DerivedColumn::JobCategory
            | DerivedColumn::CurrentJobCategory
            | DerivedColumn::EducationLevel
            | DerivedColumn::City => Value::text(NOT_SPECIFIED),
            DerivedColumn::CityKey | DerivedColumn::SalaryCurrency => Value::text(""),
            DerivedColumn::RelocateReady | DerivedColumn::TripsReady => Value::Bool(false),
            DerivedColumn::EducationYear | DerivedColumn::TargetSalaryRub => Value::Null,
        }
    }

    /// A column of `len` defaults
    pub fn default_column(&self, len: usize) -> Column {
        Column::filled(self.name(), self.default_value(), len)
    }

    /// Wrap computed values under this column's name
    pub fn column(&self, values: Vec<Value>) -> Column {
        Column::new(self.name(), values)
    }

    pub fn all() -> impl Iterator<Item = DerivedColumn> {
        use DerivedColumn::*;
        [
            JobCategory,
            CurrentJobCategory,
            EducationLevel,
            EducationYear,
            City,
            CityKey,
            RelocateReady,
            TripsReady,
            SalaryCurrency,
            TargetSalaryRub,
        ]
        .into_iter()
    }
}
