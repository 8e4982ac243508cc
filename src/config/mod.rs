use crate::models::{UploadItem, UserConfig};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use std::fs;

/// Prefix for environment overrides, e.g. `UPLOADLIST__UPLOAD_LIST__MIN_FILE_COUNT=2`.
pub const DEFAULT_ENV_PREFIX: &str = "UPLOADLIST";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two files in the configuration directory:
/// - User config (`UploadList Config.yaml`): list settings, overridable from the environment
/// - Upload records (`UploadList Files.yaml`): files confirmed in earlier sessions
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
    records_path: Utf8PathBuf,
    env_prefix: String,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files, created if missing
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join("UploadList Config.yaml"),
            records_path: config_dir.join("UploadList Files.yaml"),
            config_dir,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        })
    }

    /// Use a different prefix for environment overrides.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load the user configuration.
    ///
    /// Layers the YAML file (optional) under environment variables named
    /// `<PREFIX>__UPLOAD_LIST__<FIELD>`. Missing values fall back to defaults.
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
        }

        let layered = Config::builder()
            .add_source(
                File::new(self.user_config_path.as_str(), FileFormat::Yaml).required(false),
            )
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::info!(
            "Loaded user config from {} (min={}, max={}, reverse={})",
            self.user_config_path,
            config.upload_list.min_file_count,
            config.upload_list.max_file_count,
            config.upload_list.reverse_order
        );
        Ok(config)
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Load records of files uploaded in earlier sessions.
    ///
    /// # Returns
    /// The stored records, or an empty list if the file doesn't exist
    pub fn load_upload_records(&self) -> Result<Vec<UploadItem>> {
        if !self.records_path.exists() {
            return Ok(Vec::new());
        }

        let file_contents = fs::read_to_string(&self.records_path)
            .with_context(|| format!("Failed to read upload records: {}", self.records_path))?;

        let records: Vec<UploadItem> = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse upload records: {}", self.records_path))?;

        tracing::info!("Loaded {} upload records from {}", records.len(), self.records_path);
        Ok(records)
    }

    /// Save the confirmed files so the next session starts with them.
    ///
    /// Records without a file id are not written.
    pub fn save_upload_records(&self, items: &[UploadItem]) -> Result<usize> {
        let records: Vec<&UploadItem> = items.iter().filter(|item| item.is_finished()).collect();
        let yaml_string = serde_yaml_ng::to_string(&records)
            .context("Failed to serialize upload records to YAML")?;

        fs::write(&self.records_path, yaml_string)
            .with_context(|| format!("Failed to write upload records: {}", self.records_path))?;

        tracing::info!("Saved {} upload records to {}", records.len(), self.records_path);
        Ok(records.len())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn user_config_path(&self) -> &Utf8Path {
        &self.user_config_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path)
            .unwrap()
            .with_env_prefix("UPLOADLIST_UNIT_UNSET");
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();

        let loaded = manager.load_user_config().unwrap();
        assert_eq!(loaded, UserConfig::default());
    }

    #[test]
    fn test_load_save_user_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = UserConfig::default();
        config.upload_list.min_file_count = 3;
        config.upload_list.reverse_order = true;
        manager.save_user_config(&config).unwrap();

        let loaded = manager.load_user_config().unwrap();
        assert_eq!(loaded.upload_list.min_file_count, 3);
        assert!(loaded.upload_list.reverse_order);
    }

    #[test]
    fn test_upload_records_skip_unfinished() {
        let (manager, _temp_dir) = create_test_config_manager();
        let items = vec![
            UploadItem::uploaded("f-1", "a.pdf", Some("application/pdf".to_string()), 10),
            UploadItem::queued("q-2", "b.pdf", None, 10),
        ];

        assert_eq!(manager.save_upload_records(&items).unwrap(), 1);

        let records = manager.load_upload_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_deref(), Some("f-1"));
        assert_eq!(records[0].mime_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_missing_records_file() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.load_upload_records().unwrap().is_empty());
    }
}
