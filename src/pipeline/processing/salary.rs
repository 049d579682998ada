use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::handler::{Handler, StageScope};
use crate::constants::{DEFAULT_CURRENCY, SALARY_COLUMN};
use crate::error::{PipelineError, Result};
use crate::fx::{FxRateProvider, FxRates};
use crate::observability::metrics;
use crate::pipeline::diagnostics::SalaryDiagnostics;
use crate::pipeline::schema::DerivedColumn;
use crate::pipeline::table::{Table, Value};
use crate::pipeline::utils::TextUtils;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9][0-9\s\u{a0}]*").expect("valid number regex"));

// "тыс", "thousand", or a latin k right after a digit ("60k", "60 k") but not "kzt"
static THOUSAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"тыс|thousand|[0-9]\s*k\b").expect("valid thousand regex"));

const NEGOTIABLE_MARKERS: &[&str] = &["договор", "negotiable"];

/// Currency markers in detection priority order
const CURRENCY_MARKERS: &[(&str, &[&str])] = &[
    ("RUB", &["руб", "rur", "rub", "₽"]),
    ("USD", &["usd", "$"]),
    ("EUR", &["eur", "€"]),
    ("KZT", &["kzt", "тенге"]),
    ("BYN", &["byn", "бел"]),
    ("UAH", &["uah", "грн"]),
    ("UZS", &["uzs", "сум"]),
    ("GEL", &["gel", "лари"]),
    ("AMD", &["amd", "драм"]),
    ("AZN", &["azn", "манат"]),
];

/// What happened to one salary cell
#[derive(Debug, Clone, PartialEq)]
pub enum SalaryOutcome {
    Converted {
        currency: &'static str,
        amount_rub: f64,
    },
    /// Not text, or blank after normalization
    Empty,
    Negotiable,
    NoAmount {
        currency: &'static str,
    },
    /// Currency detected but missing from the rate table
    Unconvertible {
        currency: &'static str,
    },
    NonPositive {
        currency: &'static str,
        amount_rub: f64,
    },
}

impl SalaryOutcome {
    pub fn currency(&self) -> Option<&'static str> {
        match self {
            SalaryOutcome::Converted { currency, .. }
            | SalaryOutcome::NoAmount { currency }
            | SalaryOutcome::Unconvertible { currency }
            | SalaryOutcome::NonPositive { currency, .. } => Some(*currency),
            SalaryOutcome::Empty | SalaryOutcome::Negotiable => None,
        }
    }

    pub fn amount_rub(&self) -> Option<f64> {
        match self {
            SalaryOutcome::Converted { amount_rub, .. } => Some(*amount_rub),
            _ => None,
        }
    }
}

/// Currency code by first matching marker, if any
pub fn detect_currency(text: &str) -> Option<&'static str> {
    let text = text.to_lowercase();
    CURRENCY_MARKERS
        .iter()
        .find(|(_, markers)| TextUtils::contains_any(&text, markers))
        .map(|(code, _)| *code)
}

/// Digit groups with embedded spaces joined ("80 000" -> 80000), in order.
/// Groups that overflow u64 are skipped.
pub fn extract_numbers(text: &str) -> Vec<u64> {
    NUMBER_RE
        .find_iter(text)
        .filter_map(|m| {
            let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
            digits.parse::<u64>().ok()
        })
        .collect()
}

/// Convert one salary cell to RUB.
///
/// A range uses the mean of the first two numbers found anywhere in the
/// text; later numbers are ignored.
pub fn parse_salary(value: &Value, rates: &FxRates) -> SalaryOutcome {
    let Some(raw) = value.as_text() else {
        return SalaryOutcome::Empty;
    };
    let text = TextUtils::normalize_spaces(raw);
    if text.is_empty() {
        return SalaryOutcome::Empty;
    }

    let lower = text.to_lowercase();
    if TextUtils::contains_any(&lower, NEGOTIABLE_MARKERS) {
        return SalaryOutcome::Negotiable;
    }

    let currency = detect_currency(&lower).unwrap_or(DEFAULT_CURRENCY);

    let numbers = extract_numbers(&text);
    let mut amount = match numbers.as_slice() {
        [] => return SalaryOutcome::NoAmount { currency },
        [single] => *single as f64,
        [low, high, ..] => (*low as f64 + *high as f64) / 2.0,
    };

    if THOUSAND_RE.is_match(&lower) {
        amount *= 1000.0;
    }

    let Some(rate) = rates.rate(currency) else {
        return SalaryOutcome::Unconvertible { currency };
    };

    let amount_rub = amount * rate;
    if amount_rub <= 0.0 {
        return SalaryOutcome::NonPositive {
            currency,
            amount_rub,
        };
    }

    SalaryOutcome::Converted {
        currency,
        amount_rub,
    }
}

/// Derives `salary_currency` and the `target_salary_rub` target.
///
/// The salary column is required; without it the run fails.
pub struct SalaryHandler {
    fx: Box<dyn FxRateProvider>,
}

impl SalaryHandler {
    pub fn new(fx: Box<dyn FxRateProvider>) -> Self {
        Self { fx }
    }

    fn load_rates(&self, scope: &mut StageScope<'_>) -> Result<FxRates> {
        let rates = self.fx.load_rates(scope.workspace).map_err(|e| match e {
            PipelineError::FxUnavailable(_) => e,
            other => PipelineError::FxUnavailable(format!("{}: {}", self.fx.name(), other)),
        })?;
        if rates.is_empty() {
            return Err(PipelineError::FxUnavailable(format!(
                "provider {} returned no rates",
                self.fx.name()
            )));
        }

        info!("Using {} FX rates from {}", rates.len(), rates.source);
        metrics::fx::loaded(&rates.source);
        scope.diagnostics.record_fx_source(rates.source.clone());
        Ok(rates)
    }
}

impl Handler for SalaryHandler {
    fn name(&self) -> &'static str {
        "salary"
    }

    fn transform(&self, table: Table, scope: &mut StageScope<'_>) -> Result<Table> {
        let source = table
            .column(SALARY_COLUMN)
            .ok_or_else(|| PipelineError::MissingRequiredColumn(SALARY_COLUMN.to_string()))?;
        let rates = self.load_rates(scope)?;

        let rows = source.len();
        let mut currencies = Vec::with_capacity(rows);
        let mut targets = Vec::with_capacity(rows);
        let mut stats = SalaryDiagnostics::default();

        for (row, value) in source.values.iter().enumerate() {
            let outcome = parse_salary(value, &rates);
            match &outcome {
                SalaryOutcome::Converted {
                    currency,
                    amount_rub,
                } => {
                    currencies.push(Value::text(*currency));
                    targets.push(Value::Float(*amount_rub));
                    continue;
                }
                SalaryOutcome::Negotiable => stats.negotiable_rows += 1,
                SalaryOutcome::Unconvertible { currency } => stats.record_unconvertible(currency),
                SalaryOutcome::NonPositive { amount_rub, .. } if *amount_rub == 0.0 => {
                    stats.target_zeros += 1
                }
                _ => {}
            }

            debug!(row, ?outcome, "Salary left without target");
            currencies.push(DerivedColumn::SalaryCurrency.default_value());
            targets.push(DerivedColumn::TargetSalaryRub.default_value());
            stats.record_null(row, value.as_text(), outcome.currency().unwrap_or(""));
        }

        let converted = rows - stats.rows_with_null_target;
        info!(
            "Converted {} of {} salaries to RUB ({} negotiable, {} without target)",
            converted, rows, stats.negotiable_rows, stats.rows_with_null_target
        );
        metrics::salary::parsed(converted);
        metrics::salary::null_targets(stats.rows_with_null_target);
        metrics::salary::negotiable(stats.negotiable_rows);
        for (currency, count) in &stats.unconvertible_currencies {
            metrics::salary::unconvertible(currency, *count);
        }
        scope.diagnostics.record_salary(stats);

        table
            .with_column(DerivedColumn::SalaryCurrency.column(currencies))?
            .with_column(DerivedColumn::TargetSalaryRub.column(targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::context::PipelineContext;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn rates() -> FxRates {
        let mut raw = BTreeMap::new();
        raw.insert("USD".to_string(), 90.0);
        raw.insert("EUR".to_string(), 100.0);
        raw.insert("KZT".to_string(), 0.5);
        FxRates::new("test", raw).unwrap()
    }

    struct FixedRates(FxRates);

    impl FxRateProvider for FixedRates {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn load_rates(&self, _workspace: &Path) -> Result<FxRates> {
            Ok(self.0.clone())
        }
    }

    struct NoRates;

    impl FxRateProvider for NoRates {
        fn name(&self) -> &'static str {
            "none"
        }

        fn load_rates(&self, _workspace: &Path) -> Result<FxRates> {
            Err(PipelineError::Config("offline".to_string()))
        }
    }

    fn parse(text: &str) -> SalaryOutcome {
        parse_salary(&Value::text(text), &rates())
    }

    fn salary_table(cells: Vec<Value>) -> Table {
        Table::from_rows(
            vec![SALARY_COLUMN.to_string()],
            cells.into_iter().map(|c| vec![c]).collect(),
        )
    }

    #[test]
    fn test_detect_currency_priority() {
        assert_eq!(detect_currency("120 000 руб."), Some("RUB"));
        assert_eq!(detect_currency("$5000"), Some("USD"));
        assert_eq!(detect_currency("3000 EUR"), Some("EUR"));
        assert_eq!(detect_currency("300 000 тенге"), Some("KZT"));
        // RUB markers win over later ones
        assert_eq!(detect_currency("1000 usd или 90 000 руб"), Some("RUB"));
        assert_eq!(detect_currency("50000"), None);
    }

    #[test]
    fn test_extract_numbers() {
        assert_eq!(extract_numbers("от 80 000 до 100 000 руб."), vec![80000, 100000]);
        assert_eq!(extract_numbers("120\u{a0}000"), vec![120000]);
        assert!(extract_numbers("по договорённости").is_empty());
        assert!(extract_numbers("99999999999999999999999 руб").is_empty());
    }

    #[test]
    fn test_plain_rub() {
        assert_eq!(
            parse("120000 руб."),
            SalaryOutcome::Converted {
                currency: "RUB",
                amount_rub: 120000.0
            }
        );
    }

    #[test]
    fn test_range_uses_mean() {
        assert_eq!(parse("от 80 000 до 100 000 руб.").amount_rub(), Some(90000.0));
    }

    #[test]
    fn test_thousand_suffix() {
        assert_eq!(
            parse("60k USD"),
            SalaryOutcome::Converted {
                currency: "USD",
                amount_rub: 60000.0 * 90.0
            }
        );
        assert_eq!(parse("60 k usd").amount_rub(), Some(60000.0 * 90.0));
        assert_eq!(parse("150 тыс. руб.").amount_rub(), Some(150000.0));
        // "kzt" alone is not a thousand marker
        assert_eq!(parse("300000 KZT").amount_rub(), Some(150000.0));
    }

    #[test]
    fn test_default_currency_is_rub() {
        assert_eq!(
            parse("50000"),
            SalaryOutcome::Converted {
                currency: "RUB",
                amount_rub: 50000.0
            }
        );
    }

    #[test]
    fn test_negotiable_and_empty() {
        assert_eq!(parse("З/П по договорённости"), SalaryOutcome::Negotiable);
        assert_eq!(parse("Negotiable"), SalaryOutcome::Negotiable);
        assert_eq!(parse("   "), SalaryOutcome::Empty);
        assert_eq!(parse_salary(&Value::Null, &rates()), SalaryOutcome::Empty);
        assert_eq!(parse("руб."), SalaryOutcome::NoAmount { currency: "RUB" });
    }

    #[test]
    fn test_fullwidth_digits_are_read() {
        assert_eq!(
            parse("１２０ 000 руб."),
            SalaryOutcome::Converted {
                currency: "RUB",
                amount_rub: 120000.0
            }
        );
        assert_eq!(
            parse("１２００００ руб."),
            SalaryOutcome::Converted {
                currency: "RUB",
                amount_rub: 120000.0
            }
        );
        assert_eq!(
            parse("１5 000 руб."),
            SalaryOutcome::Converted {
                currency: "RUB",
                amount_rub: 15000.0
            }
        );
        // Other scripts' digits are not amounts
        assert_eq!(parse("١٢٠ руб."), SalaryOutcome::NoAmount { currency: "RUB" });
    }

    #[test]
    fn test_unconvertible_and_zero() {
        assert_eq!(parse("2000 GEL"), SalaryOutcome::Unconvertible { currency: "GEL" });
        assert_eq!(
            parse("0 руб."),
            SalaryOutcome::NonPositive {
                currency: "RUB",
                amount_rub: 0.0
            }
        );
    }

    #[test]
    fn test_handler_converts_and_records_diagnostics() {
        let table = salary_table(vec![
            Value::text("120000 руб."),
            Value::text("по договорённости"),
            Value::text("2000 GEL"),
            Value::text("0 руб."),
            Value::Null,
            Value::text("3 000 USD"),
        ]);

        let handler = SalaryHandler::new(Box::new(FixedRates(rates())));
        let ctx = handler.handle(PipelineContext::new(table, "/tmp")).unwrap();
        let table = ctx.table().unwrap();

        assert_eq!(table.row_count(), 6);
        assert_eq!(table.get(0, "target_salary_rub"), Some(&Value::Float(120000.0)));
        assert_eq!(table.get(0, "salary_currency"), Some(&Value::text("RUB")));
        assert_eq!(table.get(2, "target_salary_rub"), Some(&Value::Null));
        assert_eq!(table.get(2, "salary_currency"), Some(&Value::text("")));
        assert_eq!(table.get(5, "target_salary_rub"), Some(&Value::Float(270000.0)));

        assert_eq!(ctx.diagnostics.fx_rates_source(), Some("test"));
        let salary = ctx.diagnostics.salary().unwrap();
        assert_eq!(salary.rows_with_null_target, 4);
        assert_eq!(salary.negotiable_rows, 1);
        assert_eq!(salary.target_zeros, 1);
        assert_eq!(salary.unconvertible_currencies.get("GEL"), Some(&1));
        assert_eq!(salary.null_target_examples[1].row, 2);
        assert_eq!(salary.null_target_examples[1].currency, "GEL");
        assert_eq!(salary.null_target_examples[3].raw, None);
    }

    #[test]
    fn test_missing_salary_column_is_fatal() {
        let table = Table::from_rows(
            vec!["Город".to_string()],
            vec![vec![Value::text("Москва")]],
        );
        let handler = SalaryHandler::new(Box::new(FixedRates(rates())));

        let result = handler.handle(PipelineContext::new(table, "/tmp"));
        assert!(matches!(
            result,
            Err(PipelineError::MissingRequiredColumn(col)) if col == SALARY_COLUMN
        ));
    }

    #[test]
    fn test_provider_failure_is_fatal() {
        let table = salary_table(vec![Value::text("100 руб")]);
        let result =
            SalaryHandler::new(Box::new(NoRates)).handle(PipelineContext::new(table, "/tmp"));
        assert!(matches!(result, Err(PipelineError::FxUnavailable(_))));
    }
}
