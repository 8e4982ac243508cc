//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Configuration loading and saving
//! - Environment overrides layered over the YAML file
//! - Upload records carried between sessions
//! - Integration with UploadListManager

use camino::Utf8PathBuf;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use uploadlist::{ConfigManager, ListError, LocalEngine, UploadItem, UploadListManager, UserConfig};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

/// Each test gets its own prefix so environment overrides never leak between tests.
fn create_manager(config_path: &Utf8PathBuf, prefix: &str) -> ConfigManager {
    ConfigManager::new(config_path)
        .unwrap()
        .with_env_prefix(prefix)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = create_manager(&config_path, "UPLOADLIST_IT_CREATE");

    assert_eq!(manager.config_dir(), &config_path);
    assert_eq!(
        manager.user_config_path().to_path_buf(),
        config_path.join("UploadList Config.yaml")
    );
}

#[test]
fn test_load_default_user_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = create_manager(&config_path, "UPLOADLIST_IT_DEFAULTS");

    let user_config = manager.load_user_config().unwrap();

    assert_eq!(user_config.upload_list.min_file_count, 0);
    assert_eq!(user_config.upload_list.max_file_count, 100);
    assert!(user_config.upload_list.allow_delete);
    assert!(!user_config.upload_list.allow_reorder);
    assert!(!user_config.upload_list.reverse_order);
}

#[test]
fn test_save_and_load_user_config() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = create_manager(&config_path, "UPLOADLIST_IT_SAVE");

    let mut user_config = UserConfig::default();
    user_config.upload_list.min_file_count = 2;
    user_config.upload_list.max_file_count = 5;
    user_config.upload_list.allow_reorder = true;
    user_config.upload_list.compact_layout = true;
    manager.save_user_config(&user_config).unwrap();

    let loaded = manager.load_user_config().unwrap();
    assert_eq!(loaded, user_config);
}

#[test]
fn test_partial_yaml_keeps_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = create_manager(&config_path, "UPLOADLIST_IT_PARTIAL");

    fs::write(
        config_path.join("UploadList Config.yaml"),
        "upload_list:\n  reverse_order: true\n",
    )
    .unwrap();

    let loaded = manager.load_user_config().unwrap();
    assert!(loaded.upload_list.reverse_order);
    assert_eq!(loaded.upload_list.max_file_count, 100);
    assert_eq!(loaded.upload_list.event_buffer, 100);
}

#[test]
fn test_environment_overrides_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = create_manager(&config_path, "UPLOADLIST_IT_ENV");

    let mut user_config = UserConfig::default();
    user_config.upload_list.min_file_count = 1;
    manager.save_user_config(&user_config).unwrap();

    // SAFETY: the variable names are unique to this test.
    unsafe {
        std::env::set_var("UPLOADLIST_IT_ENV__UPLOAD_LIST__MIN_FILE_COUNT", "4");
        std::env::set_var("UPLOADLIST_IT_ENV__UPLOAD_LIST__ALLOW_REORDER", "true");
    }

    let loaded = manager.load_user_config().unwrap();

    unsafe {
        std::env::remove_var("UPLOADLIST_IT_ENV__UPLOAD_LIST__MIN_FILE_COUNT");
        std::env::remove_var("UPLOADLIST_IT_ENV__UPLOAD_LIST__ALLOW_REORDER");
    }

    assert_eq!(loaded.upload_list.min_file_count, 4);
    assert!(loaded.upload_list.allow_reorder);
}

#[test]
fn test_debug_mode_read_from_file() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = create_manager(&config_path, "UPLOADLIST_IT_DEBUG");

    assert!(!manager.load_user_config().unwrap().upload_list.debug_mode);

    fs::write(
        config_path.join("UploadList Config.yaml"),
        "upload_list:\n  debug_mode: true\n",
    )
    .unwrap();

    let loaded = manager.load_user_config().unwrap();
    assert!(loaded.upload_list.debug_mode);
}

#[test]
fn test_invalid_yaml_handling() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = create_manager(&config_path, "UPLOADLIST_IT_INVALID");

    fs::write(
        config_path.join("UploadList Config.yaml"),
        "invalid: yaml: content: {{",
    )
    .unwrap();

    let result = manager.load_user_config();
    assert!(result.is_err(), "Should fail to parse invalid YAML");
}

#[test]
fn test_config_directory_creation() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf())
        .unwrap()
        .join("nonexistent_dir");

    assert!(!config_path.exists());

    let _manager = ConfigManager::new(&config_path).unwrap();

    assert!(config_path.exists());
}

#[test]
fn test_config_integration_with_list() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = create_manager(&config_path, "UPLOADLIST_IT_LIST");

    let mut user_config = UserConfig::default();
    user_config.upload_list.min_file_count = 1;
    manager.save_user_config(&user_config).unwrap();
    manager
        .save_upload_records(&[UploadItem::uploaded("f-1", "contract.pdf", None, 2048)])
        .unwrap();

    let settings = manager.load_user_config().unwrap().upload_list;
    let records = manager.load_upload_records().unwrap();
    let list = UploadListManager::with_existing(settings, Arc::new(LocalEngine::new()), records);

    let totals = list.refresh_aggregates();
    assert_eq!(totals.confirmed_count, 1);
    assert_eq!(totals.total_size, 2048);

    let only = list.views()[0].key;
    assert_eq!(
        list.remove(only),
        Err(ListError::BelowMinimum { min_required: 1 })
    );
}

#[test]
fn test_concurrent_config_access() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = Arc::new(create_manager(&config_path, "UPLOADLIST_IT_CONCURRENT"));
    manager.save_user_config(&UserConfig::default()).unwrap();

    let mut handles = vec![];
    for _ in 0..10 {
        let manager_clone = manager.clone();
        handles.push(std::thread::spawn(move || {
            manager_clone.load_user_config().unwrap()
        }));
    }

    for handle in handles {
        assert_eq!(handle.join().unwrap(), UserConfig::default());
    }
}
