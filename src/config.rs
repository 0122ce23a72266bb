//! Typed settings, loadable from TOML or a host preference map

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TasasError};

/// Top-level settings
///
/// Loaded from a TOML file, or assembled from the loosely-typed key/value
/// preferences a launcher host hands over. Unknown keys are ignored so a
/// newer host manifest does not break an older binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Trigger keyword the host binds the extension to
    pub keyword: String,
    /// ElToque API token (Bearer). Listing queries require it.
    pub api_key: Option<String>,
    /// Debounce interval the host applies between keystrokes, milliseconds
    pub debounce_ms: u64,
    pub cache: CacheSettings,
    pub http: HttpSettings,
    pub currencies: CurrencySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keyword: "tasas".to_string(),
            api_key: None,
            debounce_ms: 300,
            cache: CacheSettings::default(),
            http: HttpSettings::default(),
            currencies: CurrencySettings::default(),
        }
    }
}

/// Local rate cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// SQLite file path. `None` resolves under the user data directory.
    pub db_path: Option<PathBuf>,
    /// Freshness window for current-day rates, seconds
    pub ttl_secs: u64,
    /// Days of history fetched by a cache rebuild
    pub rebuild_days: u32,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            db_path: None,
            ttl_secs: 300,
            rebuild_days: 30,
        }
    }
}

/// Upstream HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout, milliseconds
    pub timeout_ms: u64,
    /// Retries after a transient network failure
    pub retries: u32,
    /// Pause before a retry, milliseconds
    pub backoff_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            retries: 1,
            backoff_ms: 250,
        }
    }
}

/// Per-currency presentation overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencySettings {
    /// Extra user-alias to API-code mappings
    pub aliases: HashMap<String, String>,
    /// Extra API-code to display-name mappings
    pub display_names: HashMap<String, String>,
    /// API-code to icon path mappings
    pub icons: HashMap<String, String>,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        info!("settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file is missing or bad
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(
                    "failed to load settings from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current settings to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("settings saved to {}", path.display());
        Ok(())
    }

    /// Assemble settings from a host preference map
    ///
    /// Values arrive as strings. Unparseable numbers fall back to the
    /// default for that field with a warning; they never abort startup.
    pub fn from_prefs(prefs: &HashMap<String, String>) -> Self {
        let mut settings = Settings::default();
        for (key, value) in prefs {
            match key.as_str() {
                "keyword" => settings.keyword = value.trim().to_string(),
                "api_key" => {
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        settings.api_key = Some(trimmed.to_string());
                    }
                }
                "db_path" => {
                    if !value.trim().is_empty() {
                        settings.cache.db_path = Some(PathBuf::from(value.trim()));
                    }
                }
                "cache_ttl_secs" => {
                    settings.cache.ttl_secs = parse_pref(key, value, settings.cache.ttl_secs)
                }
                "rebuild_days" => {
                    settings.cache.rebuild_days =
                        parse_pref(key, value, settings.cache.rebuild_days)
                }
                "debounce_ms" => {
                    settings.debounce_ms = parse_pref(key, value, settings.debounce_ms)
                }
                "http_timeout_ms" => {
                    settings.http.timeout_ms = parse_pref(key, value, settings.http.timeout_ms)
                }
                "http_retries" => {
                    settings.http.retries = parse_pref(key, value, settings.http.retries)
                }
                _ => {}
            }
        }
        settings.sanitize()
    }

    /// Replace values `validate` would reject with their defaults, one
    /// warning per field. The host preference path never aborts startup.
    fn sanitize(mut self) -> Self {
        let defaults = Settings::default();
        if self.keyword.trim().is_empty() {
            warn!("preference keyword is empty, using {:?}", defaults.keyword);
            self.keyword = defaults.keyword;
        }
        if self.cache.ttl_secs == 0 {
            warn!(
                "preference cache_ttl_secs must be positive, using {}",
                defaults.cache.ttl_secs
            );
            self.cache.ttl_secs = defaults.cache.ttl_secs;
        }
        if self.http.timeout_ms == 0 {
            warn!(
                "preference http_timeout_ms must be positive, using {}",
                defaults.http.timeout_ms
            );
            self.http.timeout_ms = defaults.http.timeout_ms;
        }
        if !(1..=365).contains(&self.cache.rebuild_days) {
            warn!(
                "preference rebuild_days must be between 1 and 365, using {}",
                defaults.cache.rebuild_days
            );
            self.cache.rebuild_days = defaults.cache.rebuild_days;
        }
        self
    }

    /// Reject settings no query cycle could run with
    pub fn validate(&self) -> Result<()> {
        if self.keyword.trim().is_empty() {
            return Err(TasasError::Config("keyword must not be empty".to_string()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(TasasError::Config(
                "cache.ttl_secs must be positive".to_string(),
            ));
        }
        if self.http.timeout_ms == 0 {
            return Err(TasasError::Config(
                "http.timeout_ms must be positive".to_string(),
            ));
        }
        if !(1..=365).contains(&self.cache.rebuild_days) {
            return Err(TasasError::Config(
                "cache.rebuild_days must be between 1 and 365".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolved cache DB path (configured, or the default user-data location)
    pub fn resolved_db_path(&self) -> PathBuf {
        match &self.cache.db_path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tasas")
                .join("rates.db"),
        }
    }
}

fn parse_pref<T: std::str::FromStr + std::fmt::Display>(key: &str, value: &str, default: T) -> T {
    match value.trim().parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!(
                "preference {} has unparseable value {:?}, using default {}",
                key, value, default
            );
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_settings(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.keyword, "tasas");
        assert!(settings.api_key.is_none());
        assert_eq!(settings.debounce_ms, 300);
        assert_eq!(settings.cache.ttl_secs, 300);
        assert_eq!(settings.cache.rebuild_days, 30);
        assert_eq!(settings.http.timeout_ms, 2000);
        assert_eq!(settings.http.retries, 1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_valid_settings() {
        let content = r#"
keyword = "cup"
api_key = "secret-token"
debounce_ms = 500

[cache]
ttl_secs = 120
rebuild_days = 14

[http]
timeout_ms = 1500
retries = 2
"#;
        let file = create_temp_settings(content);
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.keyword, "cup");
        assert_eq!(settings.api_key.as_deref(), Some("secret-token"));
        assert_eq!(settings.debounce_ms, 500);
        assert_eq!(settings.cache.ttl_secs, 120);
        assert_eq!(settings.cache.rebuild_days, 14);
        assert_eq!(settings.http.timeout_ms, 1500);
        assert_eq!(settings.http.retries, 2);
    }

    #[test]
    fn test_load_partial_settings_uses_defaults() {
        let content = r#"
[cache]
ttl_secs = 60
"#;
        let file = create_temp_settings(content);
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.cache.ttl_secs, 60);
        assert_eq!(settings.keyword, "tasas");
        assert_eq!(settings.http.timeout_ms, 2000);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let settings = Settings::load_or_default(Path::new("/nonexistent/tasas.toml"));
        assert_eq!(settings.keyword, "tasas");
    }

    #[test]
    fn test_load_rejects_zero_ttl() {
        let content = r#"
[cache]
ttl_secs = 0
"#;
        let file = create_temp_settings(content);
        assert!(Settings::load(file.path()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("tasas.toml");

        let mut settings = Settings::default();
        settings.api_key = Some("abc".to_string());
        settings.save(&path).unwrap();

        let reloaded = Settings::load(&path).unwrap();
        assert_eq!(reloaded.api_key.as_deref(), Some("abc"));
        assert_eq!(reloaded.cache.ttl_secs, settings.cache.ttl_secs);
    }

    #[test]
    fn test_from_prefs() {
        let mut prefs = HashMap::new();
        prefs.insert("keyword".to_string(), "cup".to_string());
        prefs.insert("api_key".to_string(), " token ".to_string());
        prefs.insert("cache_ttl_secs".to_string(), "600".to_string());
        prefs.insert("http_timeout_ms".to_string(), "oops".to_string());
        prefs.insert("unknown_future_pref".to_string(), "x".to_string());

        let settings = Settings::from_prefs(&prefs);
        assert_eq!(settings.keyword, "cup");
        assert_eq!(settings.api_key.as_deref(), Some("token"));
        assert_eq!(settings.cache.ttl_secs, 600);
        // Unparseable value keeps the default
        assert_eq!(settings.http.timeout_ms, 2000);
    }

    #[test]
    fn test_from_prefs_empty_api_key_is_none() {
        let mut prefs = HashMap::new();
        prefs.insert("api_key".to_string(), "   ".to_string());
        let settings = Settings::from_prefs(&prefs);
        assert!(settings.api_key.is_none());
    }

    #[test]
    fn test_from_prefs_falls_back_on_unusable_values() {
        let mut prefs = HashMap::new();
        prefs.insert("keyword".to_string(), "   ".to_string());
        prefs.insert("cache_ttl_secs".to_string(), "0".to_string());
        prefs.insert("rebuild_days".to_string(), "400".to_string());

        // Parseable but unusable values get the same default fallback as
        // unparseable ones
        let settings = Settings::from_prefs(&prefs);
        assert_eq!(settings.keyword, "tasas");
        assert_eq!(settings.cache.ttl_secs, 300);
        assert_eq!(settings.cache.rebuild_days, 30);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_rebuild_window() {
        let mut settings = Settings::default();
        settings.cache.rebuild_days = 0;
        assert!(settings.validate().is_err());
        settings.cache.rebuild_days = 366;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_resolved_db_path_prefers_configured() {
        let mut settings = Settings::default();
        settings.cache.db_path = Some(PathBuf::from("/tmp/custom.db"));
        assert_eq!(settings.resolved_db_path(), PathBuf::from("/tmp/custom.db"));
    }
}
