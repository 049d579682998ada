//! Currency conversion rates to RUB.
//!
//! The salary stage only sees the [`FxRateProvider`] trait. The CLI wires a
//! [`FallbackFxRateProvider`] that tries the CBR daily feed (when online),
//! then the workspace cache, then the built-in reference table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::FxConfig;
use crate::constants::DEFAULT_CURRENCY;
use crate::error::{PipelineError, Result};
use crate::observability::metrics;

/// Approximate reference rates, used when nothing fresher is available
const STATIC_RATES: &[(&str, f64)] = &[
    ("USD", 90.0),
    ("EUR", 98.0),
    ("KZT", 0.19),
    ("BYN", 28.0),
    ("UAH", 2.3),
    ("UZS", 0.0072),
    ("GEL", 33.0),
    ("AMD", 0.23),
    ("AZN", 53.0),
];

/// Rates to RUB plus where they came from.
///
/// This is also the on-disk format of the workspace cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRates {
    pub source: String,
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
    pub rates: BTreeMap<String, f64>,
}

impl FxRates {
    /// Validate a raw rate table: unusable rates are dropped, RUB is pinned
    /// to 1.0, and a table with nothing left is an error.
    pub fn new(source: impl Into<String>, rates: BTreeMap<String, f64>) -> Result<Self> {
        let source = source.into();
        let mut clean: BTreeMap<String, f64> = BTreeMap::new();
        for (code, rate) in rates {
            if rate.is_finite() && rate > 0.0 {
                clean.insert(code.trim().to_uppercase(), rate);
            } else {
                warn!("Ignoring unusable rate {} for {} from {}", rate, code, source);
            }
        }

        if clean.is_empty() {
            return Err(PipelineError::FxUnavailable(format!(
                "rate table from '{}' is empty",
                source
            )));
        }

        clean.insert(DEFAULT_CURRENCY.to_string(), 1.0);
        Ok(Self {
            source,
            fetched_at: None,
            rates: clean,
        })
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(fetched_at);
        self
    }

    /// Rubles per one unit of `currency`
    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Source of currency rates for one run
pub trait FxRateProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Load rates; `workspace` is the run's output directory
    fn load_rates(&self, workspace: &Path) -> Result<FxRates>;
}

/// Built-in reference table, always available
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticFxRateProvider;

impl FxRateProvider for StaticFxRateProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    fn load_rates(&self, _workspace: &Path) -> Result<FxRates> {
        let rates = STATIC_RATES
            .iter()
            .map(|(code, rate)| (code.to_string(), *rate))
            .collect();
        FxRates::new("static", rates)
    }
}

/// JSON cache of a previous fetch stored in the workspace
#[derive(Debug, Clone)]
pub struct FileFxRateProvider {
    file_name: String,
}

impl FileFxRateProvider {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.file_name)
    }

    /// Write rates to the cache file, creating the workspace if needed
    pub fn store(&self, workspace: &Path, rates: &FxRates) -> Result<PathBuf> {
        fs::create_dir_all(workspace)?;
        let path = self.path(workspace);
        fs::write(&path, serde_json::to_string_pretty(rates)?)?;
        debug!("Stored {} FX rates in {}", rates.len(), path.display());
        Ok(path)
    }
}

impl FxRateProvider for FileFxRateProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load_rates(&self, workspace: &Path) -> Result<FxRates> {
        let path = self.path(workspace);
        if !path.exists() {
            return Err(PipelineError::FxUnavailable(format!(
                "no rate cache at {}",
                path.display()
            )));
        }

        let cached: FxRates = serde_json::from_str(&fs::read_to_string(&path)?)?;
        let fetched_at = cached.fetched_at;
        let mut rates = FxRates::new(cached.source, cached.rates)?;
        rates.fetched_at = fetched_at;
        Ok(rates)
    }
}

#[derive(Debug, Deserialize)]
struct CbrDaily {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Valute")]
    valute: BTreeMap<String, CbrValute>,
}

#[derive(Debug, Deserialize)]
struct CbrValute {
    #[serde(rename = "Nominal")]
    nominal: f64,
    #[serde(rename = "Value")]
    value: f64,
}

impl CbrDaily {
    fn into_rates(self) -> Result<FxRates> {
        let rates = self
            .valute
            .into_iter()
            .filter(|(_, v)| v.nominal > 0.0)
            .map(|(code, v)| (code, v.value / v.nominal))
            .collect();
        // "2024-05-17T11:30:00+03:00" -> "2024-05-17"
        let day = self.date.get(..10).unwrap_or(&self.date);
        Ok(FxRates::new(format!("cbr:{}", day), rates)?.with_fetched_at(Utc::now()))
    }
}

/// Central Bank of Russia daily feed; refreshes the workspace cache on success
#[derive(Debug, Clone)]
pub struct CbrFxRateProvider {
    url: String,
    timeout: Duration,
    cache: Option<FileFxRateProvider>,
}

impl CbrFxRateProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: FileFxRateProvider) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Decode a CBR daily JSON payload
    pub fn parse_payload(body: &str) -> Result<FxRates> {
        let daily: CbrDaily = serde_json::from_str(body)?;
        daily.into_rates()
    }
}

impl FxRateProvider for CbrFxRateProvider {
    fn name(&self) -> &'static str {
        "cbr"
    }

    fn load_rates(&self, workspace: &Path) -> Result<FxRates> {
        info!("Fetching FX rates from {}", self.url);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;
        let body = client.get(&self.url).send()?.error_for_status()?.text()?;
        let rates = Self::parse_payload(&body)?;

        if let Some(cache) = &self.cache {
            // Cache write failures are only logged
            if let Err(e) = cache.store(workspace, &rates) {
                warn!("Failed to write FX rate cache: {}", e);
            }
        }
        Ok(rates)
    }
}

/// Tries providers in order; the first success wins
pub struct FallbackFxRateProvider {
    providers: Vec<Box<dyn FxRateProvider>>,
}

impl FallbackFxRateProvider {
    pub fn new(providers: Vec<Box<dyn FxRateProvider>>) -> Self {
        Self { providers }
    }

    /// Online: CBR (refreshing the cache), then the cache, then the static
    /// table. Offline: the cache, then the static table.
    pub fn from_config(config: &FxConfig) -> Self {
        let cache = FileFxRateProvider::new(config.cache_file.clone());
        let mut providers: Vec<Box<dyn FxRateProvider>> = Vec::new();
        if config.online {
            let timeout = Duration::from_secs(config.timeout_seconds);
            providers.push(Box::new(
                CbrFxRateProvider::new(config.url.clone(), timeout).with_cache(cache.clone()),
            ));
        }
        providers.push(Box::new(cache));
        providers.push(Box::new(StaticFxRateProvider));
        Self::new(providers)
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

impl FxRateProvider for FallbackFxRateProvider {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn load_rates(&self, workspace: &Path) -> Result<FxRates> {
        let mut failures = Vec::new();
        for provider in &self.providers {
            match provider.load_rates(workspace) {
                Ok(rates) => {
                    debug!("FX rates from provider {}", provider.name());
                    return Ok(rates);
                }
                Err(e) => {
                    debug!("FX provider {} failed: {}", provider.name(), e);
                    metrics::fx::load_error(provider.name());
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }

        Err(PipelineError::FxUnavailable(if failures.is_empty() {
            "no providers configured".to_string()
        } else {
            failures.join("; ")
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Failing;

    struct CountingFailure(Arc<AtomicUsize>);

    impl FxRateProvider for CountingFailure {
        fn name(&self) -> &'static str {
            "cbr"
        }

        fn load_rates(&self, _workspace: &Path) -> Result<FxRates> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::FxUnavailable("feed unreachable".to_string()))
        }
    }

    impl FxRateProvider for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn load_rates(&self, _workspace: &Path) -> Result<FxRates> {
            Err(PipelineError::FxUnavailable("down".to_string()))
        }
    }

    #[test]
    fn test_static_rates_include_rub() {
        let rates = StaticFxRateProvider.load_rates(Path::new("/tmp")).unwrap();
        assert_eq!(rates.source, "static");
        assert_eq!(rates.rate("RUB"), Some(1.0));
        assert_eq!(rates.rate("USD"), Some(90.0));
        assert_eq!(rates.rate("XYZ"), None);
    }

    #[test]
    fn test_empty_table_is_fatal() {
        let result = FxRates::new("empty", BTreeMap::new());
        assert!(matches!(result, Err(PipelineError::FxUnavailable(_))));

        let mut bad = BTreeMap::new();
        bad.insert("USD".to_string(), f64::NAN);
        bad.insert("EUR".to_string(), -1.0);
        assert!(FxRates::new("bad", bad).is_err());
    }

    #[test]
    fn test_rub_is_pinned() {
        let mut raw = BTreeMap::new();
        raw.insert("rub".to_string(), 2.0);
        raw.insert("usd".to_string(), 91.5);
        let rates = FxRates::new("test", raw).unwrap();
        assert_eq!(rates.rate("RUB"), Some(1.0));
        assert_eq!(rates.rate("USD"), Some(91.5));
    }

    #[test]
    fn test_file_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let provider = FileFxRateProvider::new("fx_rates.json");
        assert!(provider.load_rates(dir.path()).is_err());

        let payload = json!({
            "source": "cbr:2024-05-17",
            "fetched_at": "2024-05-17T09:00:00Z",
            "rates": { "USD": 91.0, "KZT": 0.2 }
        });
        fs::write(dir.path().join("fx_rates.json"), payload.to_string()).unwrap();

        let rates = provider.load_rates(dir.path()).unwrap();
        assert_eq!(rates.source, "cbr:2024-05-17");
        assert!(rates.fetched_at.is_some());
        assert_eq!(rates.rate("KZT"), Some(0.2));
        assert_eq!(rates.rate("RUB"), Some(1.0));
    }

    #[test]
    fn test_cbr_payload_divides_by_nominal() {
        let body = json!({
            "Date": "2024-05-17T11:30:00+03:00",
            "Valute": {
                "USD": { "CharCode": "USD", "Nominal": 1, "Value": 90.5 },
                "KZT": { "CharCode": "KZT", "Nominal": 100, "Value": 20.0 },
                "AMD": { "CharCode": "AMD", "Nominal": 100, "Value": 23.0 }
            }
        })
        .to_string();

        let rates = CbrFxRateProvider::parse_payload(&body).unwrap();
        assert_eq!(rates.source, "cbr:2024-05-17");
        assert_eq!(rates.rate("USD"), Some(90.5));
        assert!((rates.rate("KZT").unwrap() - 0.2).abs() < 1e-9);
        assert!((rates.rate("AMD").unwrap() - 0.23).abs() < 1e-9);
    }

    #[test]
    fn test_fallback_first_success_wins() {
        let provider = FallbackFxRateProvider::new(vec![
            Box::new(Failing),
            Box::new(StaticFxRateProvider),
        ]);
        let rates = provider.load_rates(Path::new("/tmp")).unwrap();
        assert_eq!(rates.source, "static");
    }

    #[test]
    fn test_fallback_all_failing() {
        let provider = FallbackFxRateProvider::new(vec![Box::new(Failing), Box::new(Failing)]);
        match provider.load_rates(Path::new("/tmp")) {
            Err(PipelineError::FxUnavailable(msg)) => assert!(msg.contains("failing: ")),
            other => panic!("expected FxUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_from_config_order() {
        let mut config = FxConfig::default();
        let offline = FallbackFxRateProvider::from_config(&config);
        assert_eq!(offline.provider_names(), vec!["file", "static"]);

        config.online = true;
        let online = FallbackFxRateProvider::from_config(&config);
        assert_eq!(online.provider_names(), vec!["cbr", "file", "static"]);
    }

    #[test]
    fn test_online_refresh_is_tried_before_stale_cache() {
        let dir = TempDir::new().unwrap();
        let stale = json!({
            "source": "cbr:2020-01-01",
            "fetched_at": "2020-01-01T09:00:00Z",
            "rates": { "USD": 61.0 }
        });
        fs::write(dir.path().join("fx_rates.json"), stale.to_string()).unwrap();

        let attempts = Arc::new(AtomicUsize::new(0));
        let provider = FallbackFxRateProvider::new(vec![
            Box::new(CountingFailure(attempts.clone())),
            Box::new(FileFxRateProvider::new("fx_rates.json")),
            Box::new(StaticFxRateProvider),
        ]);
        let rates = provider.load_rates(dir.path()).unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(rates.source, "cbr:2020-01-01");

        // An unreachable feed falls back to the cache
        let config = FxConfig {
            online: true,
            url: "http://127.0.0.1:9/daily_json.js".to_string(),
            timeout_seconds: 1,
            ..FxConfig::default()
        };
        let rates = FallbackFxRateProvider::from_config(&config)
            .load_rates(dir.path())
            .unwrap();
        assert_eq!(rates.rate("USD"), Some(61.0));
    }
}
