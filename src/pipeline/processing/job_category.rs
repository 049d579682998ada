use serde::{Deserialize, Serialize};
use std::fmt;

use super::handler::{Handler, StageScope};
use super::rules::{KeywordRule, KeywordRules};
use crate::constants::{
    CURRENT_TITLE_FRAGMENT, DESIRED_TITLE_FRAGMENT, EMPLOYER_FRAGMENT, NOT_SPECIFIED, OTHER,
};
use crate::error::Result;
use crate::pipeline::schema::DerivedColumn;
use crate::pipeline::table::{Column, Table, Value};
use crate::pipeline::utils::TextUtils;

/// Coarse occupation group derived from a free-text job title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobCategory {
    SystemAdministrator,
    DevOps,
    DatabaseAdministrator,
    DataScience,
    Analyst,
    Tester,
    Developer,
    ItSpecialist,
    ProjectManager,
    Marketing,
    Sales,
    Finance,
    Hr,
    Legal,
    Logistics,
    Design,
    Engineering,
    Administrative,
    Operator,
    Specialist,
    Other,
    NotSpecified,
}

impl JobCategory {
    pub fn label(&self) -> &'static str {
        match self {
            JobCategory::SystemAdministrator => "System administrator",
            JobCategory::DevOps => "DevOps/SRE",
            JobCategory::DatabaseAdministrator => "Database administrator",
            JobCategory::DataScience => "Data Scientist/ML",
            JobCategory::Analyst => "Analyst",
            JobCategory::Tester => "QA/Tester",
            JobCategory::Developer => "Developer",
            JobCategory::ItSpecialist => "IT specialist",
            JobCategory::ProjectManager => "Project/Product manager",
            JobCategory::Marketing => "Marketing/PR/Content",
            JobCategory::Sales => "Sales/Clients",
            JobCategory::Finance => "Finance/Accounting",
            JobCategory::Hr => "HR/Recruiting",
            JobCategory::Legal => "Legal",
            JobCategory::Logistics => "Logistics/Warehouse/Transport",
            JobCategory::Design => "Design/Creative",
            JobCategory::Engineering => "Engineering/Manufacturing/Construction",
            JobCategory::Administrative => "Administrative staff",
            JobCategory::Operator => "Operator",
            JobCategory::Specialist => "Specialist (general)",
            JobCategory::Other => OTHER,
            JobCategory::NotSpecified => NOT_SPECIFIED,
        }
    }
}

impl fmt::Display for JobCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// Order matters: the first rule with a matching keyword decides.
static JOB_RULES: &[KeywordRule<JobCategory>] = &[
    KeywordRule::new(
        JobCategory::SystemAdministrator,
        &["системный администратор", "system administrator", "sysadmin"],
    ),
    KeywordRule::new(JobCategory::DevOps, &["devops", "sre", "site reliability"]),
    KeywordRule::new(
        JobCategory::DatabaseAdministrator,
        &["dba", "администратор баз данных", "database administrator"],
    ),
    KeywordRule::new(
        JobCategory::DataScience,
        &["data scientist", "ds ", "ml engineer", "machine learning"],
    ),
    KeywordRule::new(
        JobCategory::Analyst,
        &["аналитик данных", "data analyst", "bi analyst", "business analyst"],
    ),
    KeywordRule::new(JobCategory::Tester, &["тестировщик", "qa", "quality assurance"]),
    KeywordRule::new(
        JobCategory::Developer,
        &[
            "разработчик",
            "программист",
            "developer",
            "software engineer",
            "backend",
            "frontend",
            "fullstack",
            "ios",
            "android",
            "java",
            "python",
            "c++",
            "golang",
            "php",
            "javascript",
            "node.js",
            "react",
            "vue",
            "1c",
            "1с",
            "unity",
        ],
    ),
    KeywordRule::new(JobCategory::ItSpecialist, &["it", "айти"]),
    KeywordRule::new(
        JobCategory::ProjectManager,
        &[
            "product manager",
            "product owner",
            "продакт",
            "product",
            "проектный менеджер",
            "project manager",
            "pm ",
        ],
    ),
    KeywordRule::new(
        JobCategory::Marketing,
        &[
            "маркетолог",
            "marketing",
            "smm",
            "таргет",
            "seo",
            "контент",
            "pr",
            "copywriter",
            "копирайтер",
        ],
    ),
    KeywordRule::new(
        JobCategory::Sales,
        &[
            "продаж",
            "sales",
            "account manager",
            "менеджер по работе с клиентами",
            "клиентами",
            "торговый представитель",
            "кассир",
        ],
    ),
    KeywordRule::new(
        JobCategory::Finance,
        &["бухгалтер", "accountant", "финанс", "экономист", "аудитор", "финансовый"],
    ),
    KeywordRule::new(
        JobCategory::Hr,
        &["hr", "рекрутер", "подбор персонала", "recruiter", "talent"],
    ),
    KeywordRule::new(JobCategory::Legal, &["юрист", "lawyer", "legal"]),
    KeywordRule::new(
        JobCategory::Logistics,
        &[
            "логист",
            "logistics",
            "склад",
            "warehouse",
            "курьер",
            "доставка",
            "водитель",
            "driver",
        ],
    ),
    KeywordRule::new(
        JobCategory::Design,
        &[
            "дизайнер",
            "designer",
            "ux",
            "ui",
            "graphic",
            "графический",
            "иллюстратор",
            "illustrator",
            "3d",
            "2d",
        ],
    ),
    KeywordRule::new(
        JobCategory::Engineering,
        &[
            "инженер",
            "engineer",
            "технолог",
            "электрик",
            "mechanic",
            "механик",
            "строител",
            "construction",
        ],
    ),
    KeywordRule::new(
        JobCategory::Administrative,
        &[
            "секретарь",
            "assistant",
            "ассистент",
            "офис-менеджер",
            "администратор",
            "reception",
        ],
    ),
    KeywordRule::new(JobCategory::Operator, &["оператор", "operator"]),
    KeywordRule::new(JobCategory::Specialist, &["специалист", "specialist"]),
];

pub static JOB_CATEGORY_RULES: KeywordRules<JobCategory> = KeywordRules::new(JOB_RULES);

/// Classify a job title cell into a [`JobCategory`]
pub fn categorize(value: &Value) -> JobCategory {
    let text = TextUtils::safe_lower(value);
    if text.is_empty() {
        return JobCategory::NotSpecified;
    }
    JOB_CATEGORY_RULES.classify(&text).unwrap_or(JobCategory::Other)
}

/// Derives `job_category` and `current_job_category` from the title columns,
/// then drops the titles and the employer column.
pub struct JobCategoryHandler;

impl JobCategoryHandler {
    pub fn new() -> Self {
        Self
    }

    fn categorize_column(
        table: &Table,
        source: Option<&str>,
        description: &str,
        target: DerivedColumn,
        scope: &mut StageScope<'_>,
    ) -> Column {
        match source.and_then(|name| table.column(name)) {
            Some(col) => target.column(
                col.values
                    .iter()
                    .map(|v| Value::text(categorize(v).label()))
                    .collect(),
            ),
            None => {
                let mut defaults = scope.missing_source(description, &[target], table.row_count());
                defaults.remove(0)
            }
        }
    }
}

impl Default for JobCategoryHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for JobCategoryHandler {
    fn name(&self) -> &'static str {
        "job_category"
    }

    fn transform(&self, table: Table, scope: &mut StageScope<'_>) -> Result<Table> {
        let desired = table.find_column(DESIRED_TITLE_FRAGMENT).map(str::to_string);
        let current = table.find_column(CURRENT_TITLE_FRAGMENT).map(str::to_string);

        let job = Self::categorize_column(
            &table,
            desired.as_deref(),
            "desired job title",
            DerivedColumn::JobCategory,
            scope,
        );
        let current_job = Self::categorize_column(
            &table,
            current.as_deref(),
            "current job title",
            DerivedColumn::CurrentJobCategory,
            scope,
        );

        let consumed: Vec<String> = desired.into_iter().chain(current).collect();
        let mut table = table
            .with_column(job)?
            .with_column(current_job)?
            .drop_columns(&consumed);

        // Employer name carries no modeling signal
        if let Some(employer) = table.find_column(EMPLOYER_FRAGMENT).map(str::to_string) {
            table = table.drop_columns(&[employer]);
        }

        Ok(table)
    }
}
