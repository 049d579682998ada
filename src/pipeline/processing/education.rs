use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::handler::{Handler, StageScope};
use super::rules::{KeywordRule, KeywordRules};
use crate::constants::{EDUCATION_COLUMN, MAX_EDUCATION_YEAR, MIN_EDUCATION_YEAR, NOT_SPECIFIED};
use crate::error::Result;
use crate::pipeline::schema::DerivedColumn;
use crate::pipeline::table::{Table, Value};
use crate::pipeline::utils::TextUtils;

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(19[0-9]{2}|20[0-9]{2})").expect("valid year regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    Doctorate,
    CandidateOfScience,
    IncompleteHigher,
    Higher,
    VocationalSecondary,
    Secondary,
    NotSpecified,
}

impl EducationLevel {
    pub fn label(&self) -> &'static str {
        match self {
            EducationLevel::Doctorate => "Doctorate",
            EducationLevel::CandidateOfScience => "Candidate of science",
            EducationLevel::IncompleteHigher => "Incomplete higher",
            EducationLevel::Higher => "Higher",
            EducationLevel::VocationalSecondary => "Vocational secondary",
            EducationLevel::Secondary => "Secondary",
            EducationLevel::NotSpecified => NOT_SPECIFIED,
        }
    }
}

// "среднее специальное" must be tested before plain "среднее"
static LEVEL_RULES: &[KeywordRule<EducationLevel>] = &[
    KeywordRule::new(EducationLevel::Doctorate, &["доктор"]),
    KeywordRule::new(EducationLevel::CandidateOfScience, &["кандидат"]),
    KeywordRule::new(EducationLevel::IncompleteHigher, &["неокончен", "incomplete higher"]),
    KeywordRule::new(
        EducationLevel::Higher,
        &["высшее", "higher education", "bachelor", "master"],
    ),
    KeywordRule::new(
        EducationLevel::VocationalSecondary,
        &["среднее специаль", "college", "vocational"],
    ),
    KeywordRule::new(EducationLevel::Secondary, &["среднее", "secondary"]),
];

pub static EDUCATION_LEVEL_RULES: KeywordRules<EducationLevel> = KeywordRules::new(LEVEL_RULES);

pub fn parse_level(value: &Value) -> EducationLevel {
    let text = TextUtils::safe_lower(value);
    if text.is_empty() {
        return EducationLevel::NotSpecified;
    }
    EDUCATION_LEVEL_RULES
        .classify(&text)
        .unwrap_or(EducationLevel::NotSpecified)
}

/// Graduation year: the first 19xx/20xx token, kept only inside the
/// accepted window. Later years in the same text are never considered.
pub fn parse_year(value: &Value) -> Option<i64> {
    let text = TextUtils::safe_lower(value);
    let year = YEAR_RE.find(&text)?.as_str().parse::<i64>().ok()?;
    (MIN_EDUCATION_YEAR..=MAX_EDUCATION_YEAR)
        .contains(&year)
        .then_some(year)
}

/// Derives `education_level` and `education_year` from the education column
pub struct EducationHandler;

impl EducationHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EducationHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for EducationHandler {
    fn name(&self) -> &'static str {
        "education"
    }

    fn transform(&self, table: Table, scope: &mut StageScope<'_>) -> Result<Table> {
        let derived = [DerivedColumn::EducationLevel, DerivedColumn::EducationYear];

        let columns = match table.column(EDUCATION_COLUMN) {
            Some(source) => vec![
                DerivedColumn::EducationLevel.column(
                    source
                        .values
                        .iter()
                        .map(|v| Value::text(parse_level(v).label()))
                        .collect(),
                ),
                DerivedColumn::EducationYear
                    .column(source.values.iter().map(|v| parse_year(v).into()).collect()),
            ],
            None => scope.missing_source(EDUCATION_COLUMN, &derived, table.row_count()),
        };

        columns.into_iter().try_fold(table, Table::with_column)
    }
}
