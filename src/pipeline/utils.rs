use once_cell::sync::Lazy;
use regex::Regex;

use crate::pipeline::table::Value;

static SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static MULTI_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;/]").expect("valid split regex"));
static FIRST_INT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]+").expect("valid int regex"));
static CITY_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(г\.|город)\s+").expect("valid city prefix regex"));

/// Known spellings of the two largest cities, keyed by their lowercased form
const CITY_ALIASES: &[(&str, &str)] = &[
    ("msk", "москва"),
    ("moscow", "москва"),
    ("spb", "санкт-петербург"),
    ("saint petersburg", "санкт-петербург"),
    ("st petersburg", "санкт-петербург"),
    ("st. petersburg", "санкт-петербург"),
    ("petersburg", "санкт-петербург"),
    ("saint-petersburg", "санкт-петербург"),
    ("санкт петербург", "санкт-петербург"),
    ("питер", "санкт-петербург"),
];

/// Text normalization helpers used by every stage
pub struct TextUtils;

impl TextUtils {
    /// Replace NBSP, fold full-width digits to ASCII, collapse whitespace
    /// runs to one space and trim
    pub fn normalize_spaces(s: &str) -> String {
        let s: String = s
            .chars()
            .map(|c| match c {
                '\u{a0}' => ' ',
                '\u{ff10}'..='\u{ff19}' => {
                    char::from_digit(c as u32 - 0xff10, 10).unwrap_or(c)
                }
                _ => c,
            })
            .collect();
        SPACE_RE.replace_all(&s, " ").trim().to_string()
    }

    /// Lowercased, whitespace-normalized text; non-text cells become ""
    pub fn safe_lower(value: &Value) -> String {
        match value.as_text() {
            Some(s) => Self::normalize_spaces(s).to_lowercase(),
            None => String::new(),
        }
    }

    /// Split a multi-value field like "полная занятость, частичная занятость"
    /// into lowercased parts on `,`, `;` and `/`
    pub fn split_multi_categories(value: &Value) -> Vec<String> {
        let Some(text) = value.as_text() else {
            return Vec::new();
        };
        let s = Self::normalize_spaces(text);
        if s.is_empty() {
            return Vec::new();
        }

        MULTI_SPLIT_RE
            .split(&s)
            .map(|p| Self::normalize_spaces(p).to_lowercase())
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn contains_any(haystack: &str, needles: &[&str]) -> bool {
        needles.iter().any(|n| haystack.contains(n))
    }

    /// First run of digits in the text, if it fits an i64
    pub fn extract_first_int(text: &str) -> Option<i64> {
        FIRST_INT_RE
            .find(text)
            .and_then(|m| m.as_str().parse::<i64>().ok())
    }

    /// Canonical city key for grouping: lowercase, no "г."/"город" prefix,
    /// unified dashes, common aliases resolved. Empty when nothing is left.
    pub fn normalize_city_name(value: &Value) -> String {
        let s = Self::safe_lower(value);
        if s.is_empty() {
            return s;
        }

        // BOM occasionally survives CSV export
        let s = s.replace('\u{feff}', "");
        let s = CITY_PREFIX_RE.replace(&s, "").trim().to_string();
        let s = s.replace(['—', '–'], "-");

        CITY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == s)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(s)
    }
}
