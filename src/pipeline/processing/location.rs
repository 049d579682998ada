use super::handler::{Handler, StageScope};
use crate::constants::{CITY_COLUMN, NOT_SPECIFIED};
use crate::error::Result;
use crate::pipeline::schema::DerivedColumn;
use crate::pipeline::table::{Table, Value};
use crate::pipeline::utils::TextUtils;

const RELOCATE_NEGATIVE: &[&str] = &[
    "не готов к переезду",
    "not ready to relocate",
    "not willing to relocate",
];
const RELOCATE_POSITIVE: &[&str] = &[
    "готов к переезду",
    "ready to relocate",
    "willing to relocate",
];

const TRIPS_NEGATIVE: &[&str] = &["не готов к командировкам", "not ready for business trips"];
const TRIPS_POSITIVE: &[&str] = &[
    "готов к командировкам",
    "готов к редким командировкам",
    "ready for business trips",
    "willing to travel",
];

/// Resolve a yes/no flag: negative phrases are checked first because every
/// negative phrase also contains its positive counterpart.
fn readiness(value: &Value, negative: &[&str], positive: &[&str]) -> bool {
    let text = TextUtils::safe_lower(value);
    if text.is_empty() || TextUtils::contains_any(&text, negative) {
        return false;
    }
    TextUtils::contains_any(&text, positive)
}

/// City of residence: the part before the first comma
pub fn parse_city(value: &Value) -> String {
    let Some(raw) = value.as_text() else {
        return NOT_SPECIFIED.to_string();
    };
    let text = TextUtils::normalize_spaces(raw);
    let city = text.split(',').next().map(TextUtils::normalize_spaces).unwrap_or_default();
    if city.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        city
    }
}

pub fn parse_relocate(value: &Value) -> bool {
    readiness(value, RELOCATE_NEGATIVE, RELOCATE_POSITIVE)
}

pub fn parse_trips(value: &Value) -> bool {
    readiness(value, TRIPS_NEGATIVE, TRIPS_POSITIVE)
}

/// Derives city and mobility flags from the combined city column
pub struct LocationHandler;

impl LocationHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocationHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for LocationHandler {
    fn name(&self) -> &'static str {
        "location"
    }

    fn transform(&self, table: Table, scope: &mut StageScope<'_>) -> Result<Table> {
        let derived = [
            DerivedColumn::City,
            DerivedColumn::CityKey,
            DerivedColumn::RelocateReady,
            DerivedColumn::TripsReady,
        ];

        let columns = match table.column(CITY_COLUMN) {
            Some(source) => {
                let cities: Vec<String> = source.values.iter().map(parse_city).collect();
                let keys = cities
                    .iter()
                    .map(|city| match city.as_str() {
                        NOT_SPECIFIED => DerivedColumn::CityKey.default_value(),
                        _ => Value::text(TextUtils::normalize_city_name(&Value::text(
                            city.as_str(),
                        ))),
                    })
                    .collect();

                vec![
                    DerivedColumn::City.column(cities.into_iter().map(Value::Text).collect()),
                    DerivedColumn::CityKey.column(keys),
                    DerivedColumn::RelocateReady
                        .column(source.values.iter().map(|v| parse_relocate(v).into()).collect()),
                    DerivedColumn::TripsReady
                        .column(source.values.iter().map(|v| parse_trips(v).into()).collect()),
                ]
            }
            None => scope.missing_source(CITY_COLUMN, &derived, table.row_count()),
        };

        columns.into_iter().try_fold(table, Table::with_column)
    }
}
