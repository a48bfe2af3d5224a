use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::loader::LoadOptions;

/// Catalog file used when neither the CLI nor config.toml names one.
pub const DEFAULT_CATALOG_FILE: &str = "connections.json";

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string with comments.
    /// All fields are commented out so defaults are used, but users can uncomment to override.
    pub fn generate_default_config(&self) -> String {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config)
            .unwrap_or_else(|e| panic!("Failed to serialize default config: {}", e));

        let mut comments: HashMap<String, &str> = HashMap::new();
        for (field, comment) in APP_COMMENTS {
            comments.insert(field.to_string(), *comment);
        }
        for (field, comment) in CATALOG_COMMENTS {
            comments.insert(format!("catalog.{}", field), *comment);
        }
        for (field, comment) in LOADING_COMMENTS {
            comments.insert(format!("loading.{}", field), *comment);
        }
        for (field, comment) in QUERY_COMMENTS {
            comments.insert(format!("query.{}", field), *comment);
        }

        Self::comment_all_fields(&toml_str, &comments)
    }

    fn comment_all_fields(toml: &str, comments: &HashMap<String, &str>) -> String {
        let mut result = String::new();
        result.push_str("# csvstudio configuration file\n");
        result
            .push_str("# This file uses TOML format. See https://toml.io/ for syntax reference.\n");
        result.push('\n');

        let mut current_section = String::new();
        for line in toml.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed.trim_matches(|c| c == '[' || c == ']').to_string();
                if let Some((_, header)) = SECTION_HEADERS.iter().find(|(s, _)| *s == current_section)
                {
                    result.push_str(header);
                    result.push('\n');
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
                continue;
            }

            if let Some((key, _)) = trimmed.split_once('=') {
                let key = key.trim();
                let field_path = if current_section.is_empty() {
                    key.to_string()
                } else {
                    format!("{}.{}", current_section, key)
                };
                if let Some(comment) = comments.get(&field_path) {
                    for comment_line in comment.lines() {
                        result.push_str("# ");
                        result.push_str(comment_line);
                        result.push('\n');
                    }
                }
                result.push_str("# ");
                result.push_str(line);
                result.push('\n');
            } else {
                result.push_str(line);
                result.push('\n');
            }
        }

        result
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, self.generate_default_config())?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub catalog: CatalogConfig,
    pub loading: LoadingConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadingConfig {
    /// 0 scans the whole file
    pub infer_schema_length: usize,
    pub try_parse_dates: bool,
    pub ignore_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryConfig {
    pub history_limit: usize,
    pub enable_history: bool,
    pub max_display_rows: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            catalog: CatalogConfig::default(),
            loading: LoadingConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CATALOG_FILE),
        }
    }
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            infer_schema_length: 10000,
            try_parse_dates: true,
            ignore_errors: false,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            history_limit: 1000,
            enable_history: true,
            max_display_rows: 50,
        }
    }
}

impl From<&LoadingConfig> for LoadOptions {
    fn from(config: &LoadingConfig) -> Self {
        LoadOptions {
            infer_schema_length: match config.infer_schema_length {
                0 => None,
                n => Some(n),
            },
            try_parse_dates: config.try_parse_dates,
            ignore_errors: config.ignore_errors,
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, overridden by `config.toml` in the manager's directory.
    pub fn load(manager: &ConfigManager) -> Result<Self> {
        let config_path = manager.config_path("config.toml");
        let config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            AppConfig::default()
        };

        config
            .validate()
            .map_err(|e| eyre!("Invalid configuration in {}: {}", config_path.display(), e))?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre!("Failed to read config file at {}: {}", path.display(), e))?;

        toml::from_str(&content)
            .map_err(|e| eyre!("Failed to parse config file at {}: {}", path.display(), e))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.catalog.path.as_os_str().is_empty() {
            return Err(eyre!("catalog.path must not be empty"));
        }

        if self.query.max_display_rows == 0 {
            return Err(eyre!("max_display_rows must be greater than 0"));
        }

        Ok(())
    }
}

const APP_COMMENTS: &[(&str, &str)] = &[(
    "version",
    "Configuration format version (for future compatibility)",
)];

const SECTION_HEADERS: &[(&str, &str)] = &[
    (
        "catalog",
        "# ============================================================================\n# Connection Catalog\n# ============================================================================",
    ),
    (
        "loading",
        "# ============================================================================\n# CSV Loading\n# ============================================================================",
    ),
    (
        "query",
        "# ============================================================================\n# Query System\n# ============================================================================",
    ),
];

const CATALOG_COMMENTS: &[(&str, &str)] = &[(
    "path",
    "File holding the name -> folder map of registered connections.\nRelative paths resolve against the working directory.",
)];

const LOADING_COMMENTS: &[(&str, &str)] = &[
    (
        "infer_schema_length",
        "Number of rows used to infer column types (0 scans the whole file)",
    ),
    (
        "try_parse_dates",
        "Recognise date and datetime columns while loading",
    ),
    (
        "ignore_errors",
        "Load a file even when some values fail to parse (they become null)",
    ),
];

const QUERY_COMMENTS: &[(&str, &str)] = &[
    (
        "history_limit",
        "Maximum number of queries to keep in history",
    ),
    ("enable_history", "Enable query history caching"),
    (
        "max_display_rows",
        "Maximum number of result rows printed to the terminal",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.catalog.path, PathBuf::from("connections.json"));
        assert_eq!(config.loading.infer_schema_length, 10000);
        assert!(config.loading.try_parse_dates);
    }

    #[test]
    fn test_generated_config_is_fully_commented() {
        let manager = ConfigManager::with_dir(PathBuf::from("/unused"));
        let template = manager.generate_default_config();
        assert!(template.contains("# [loading]"));
        assert!(template.contains("# Enable query history caching"));
        for line in template.lines() {
            assert!(
                line.is_empty() || line.starts_with('#'),
                "uncommented line: {}",
                line
            );
        }
    }

    #[test]
    fn test_generated_config_parses_when_uncommented() {
        let manager = ConfigManager::with_dir(PathBuf::from("/unused"));
        let uncommented: String = manager
            .generate_default_config()
            .lines()
            .filter_map(|l| l.strip_prefix("# "))
            .filter(|l| l.starts_with('[') || l.contains(" = "))
            .collect::<Vec<_>>()
            .join("\n");
        let parsed: AppConfig = toml::from_str(&uncommented).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
        std::fs::write(
            manager.config_path("config.toml"),
            "[loading]\ninfer_schema_length = 0\n",
        )
        .unwrap();

        let config = AppConfig::load(&manager).unwrap();
        assert_eq!(config.loading.infer_schema_length, 0);
        assert!(config.loading.try_parse_dates);
        assert_eq!(config.query.history_limit, 1000);

        let options = LoadOptions::from(&config.loading);
        assert_eq!(options.infer_schema_length, None);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(temp_dir.path().join("absent"));
        assert_eq!(AppConfig::load(&manager).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_invalid_version_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
        std::fs::write(manager.config_path("config.toml"), "version = \"9.0\"\n").unwrap();
        let err = AppConfig::load(&manager).unwrap_err();
        assert!(err.to_string().contains("Unsupported config version"));
    }

    #[test]
    fn test_write_default_config_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(temp_dir.path().join("cfg"));
        let path = manager.write_default_config(false).unwrap();
        assert!(path.exists());
        assert!(manager.write_default_config(false).is_err());
        assert!(manager.write_default_config(true).is_ok());
    }
}
