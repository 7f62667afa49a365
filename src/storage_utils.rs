use crate::period::Period;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

// CONFIGURATION STRUCTS
// `storage/config.json` deserializes straight into these.

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DefaultsConfig {
    pub ticker: String,   // e.g., "AAPL"
    pub period: Period,   // e.g., "1y"
    pub show_data: bool,  // raw table under the panels
    pub show_chart: bool, // candlestick chart
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            ticker: "AAPL".to_string(),
            period: Period::OneYear,
            show_data: false,
            show_chart: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) stock-dashboard/0.1".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
}

impl AppConfig {
    /// Applies `DASHBOARD_TICKER` / `DASHBOARD_PERIOD` style overrides.
    /// `lookup` is normally `std::env::var(..).ok()`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(ticker) = lookup("DASHBOARD_TICKER").filter(|t| !t.trim().is_empty()) {
            self.defaults.ticker = ticker.trim().to_string();
        }
        if let Some(period) = lookup("DASHBOARD_PERIOD") {
            match period.parse::<Period>() {
                Ok(p) => self.defaults.period = p,
                Err(e) => warn!(error = %e, "ignoring DASHBOARD_PERIOD"),
            }
        }
    }
}

// STORAGE MANAGER

pub struct AsyncStorageManager {
    // Absolute path of the storage directory (e.g., ".../target/debug/storage")
    pub base_dir: PathBuf,
}

impl AsyncStorageManager {
    /// Creates a manager rooted next to the running executable.
    pub async fn new_relative<P: AsRef<Path>>(relative_path: P) -> anyhow::Result<Self> {
        let exe_path = std::env::current_exe()?;

        let base_dir = exe_path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not find binary directory"))?
            .join(relative_path);

        Self::new(base_dir).await
    }

    /// Creates a manager rooted at `base_dir`, creating the directory up
    /// front so later saves never have to check.
    pub async fn new(base_dir: PathBuf) -> anyhow::Result<Self> {
        if !base_dir.exists() {
            fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.base_dir.join(file_name)
    }

    /// **Generic Save Function**
    /// Serializes `data` to `<filename>.json` via a temp file and a rename,
    /// so a crash mid-write leaves the previous file intact.
    pub async fn save<T: Serialize>(&self, filename: &str, data: &T) -> anyhow::Result<()> {
        let file_name = format!("{}.json", filename);
        let final_path = self.base_dir.join(&file_name);
        let tmp_path = self.base_dir.join(format!("{}.tmp", file_name));

        let json_bytes = serde_json::to_vec_pretty(data)?;

        fs::write(&tmp_path, json_bytes).await?;
        fs::rename(tmp_path, final_path).await?;

        Ok(())
    }

    /// **Generic Load Function**
    pub async fn load<T: DeserializeOwned>(&self, filename: &str) -> anyhow::Result<T> {
        let path = self.base_dir.join(format!("{}.json", filename));

        // serde_json validates UTF-8 itself, so skip `read_to_string`.
        let content = fs::read(path).await?;

        let data = serde_json::from_slice(&content)?;
        Ok(data)
    }

    /// Loads `config.json`, falling back to (and writing out) the defaults
    /// when it is missing or unreadable.
    pub async fn load_config(&self) -> AppConfig {
        match self.load::<AppConfig>("config").await {
            Ok(config) => {
                debug!(dir = %self.base_dir.display(), "loaded config");
                config
            }
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                let config = AppConfig::default();
                if !self.path_of("config.json").exists() {
                    if let Err(e) = self.save("config", &config).await {
                        warn!(error = %e, "could not write default config");
                    }
                }
                config
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("stock-dashboard-{tag}-{}-{nanos}", std::process::id()))
    }

    #[tokio::test]
    async fn save_then_load() {
        let storage = AsyncStorageManager::new(scratch_dir("roundtrip")).await.unwrap();
        let mut config = AppConfig::default();
        config.defaults.ticker = "MSFT".to_string();
        config.defaults.period = Period::FiveYears;

        storage.save("config", &config).await.unwrap();
        assert!(!storage.path_of("config.json.tmp").exists());

        let loaded: AppConfig = storage.load("config").await.unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_dir_all(&storage.base_dir);
    }

    #[tokio::test]
    async fn missing_config_falls_back_and_is_written() {
        let storage = AsyncStorageManager::new(scratch_dir("default")).await.unwrap();
        let config = storage.load_config().await;
        assert_eq!(config, AppConfig::default());
        assert!(storage.path_of("config.json").exists());
        let _ = std::fs::remove_dir_all(&storage.base_dir);
    }

    #[tokio::test]
    async fn corrupt_config_is_not_overwritten() {
        let storage = AsyncStorageManager::new(scratch_dir("corrupt")).await.unwrap();
        std::fs::write(storage.path_of("config.json"), b"{ not json").unwrap();

        let config = storage.load_config().await;
        assert_eq!(config, AppConfig::default());
        assert_eq!(std::fs::read(storage.path_of("config.json")).unwrap(), b"{ not json");
        let _ = std::fs::remove_dir_all(&storage.base_dir);
    }

    #[test]
    fn partial_config_fills_missing_sections() {
        let config: AppConfig =
            serde_json::from_str(r#"{"defaults":{"ticker":"TSLA","period":"6mo","show_data":true,"show_chart":false}}"#)
                .unwrap();
        assert_eq!(config.defaults.ticker, "TSLA");
        assert_eq!(config.defaults.period, Period::SixMonths);
        assert_eq!(config.market_data, MarketDataConfig::default());
    }

    #[test]
    fn overrides_apply_and_bad_period_is_ignored() {
        let env: HashMap<&str, &str> =
            HashMap::from([("DASHBOARD_TICKER", " nvda "), ("DASHBOARD_PERIOD", "fortnight")]);
        let mut config = AppConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.defaults.ticker, "nvda");
        assert_eq!(config.defaults.period, Period::OneYear);

        let env: HashMap<&str, &str> = HashMap::from([("DASHBOARD_PERIOD", "max")]);
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.defaults.period, Period::Max);
        assert_eq!(config.defaults.ticker, "nvda");
    }
}
