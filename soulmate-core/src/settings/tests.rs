use crate::ai::mock::MockBehavior;
use crate::settings::manager::SettingsManager;
use crate::settings::{ProviderConfig, Settings};
use tempfile::TempDir;

#[test]
fn test_missing_file_is_created_with_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("nested").join("settings.toml");

    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    assert!(settings_path.exists());
    assert_eq!(manager.settings(), Settings::default());
    assert_eq!(manager.settings().memory.interval, 20);
    assert_eq!(manager.settings().scene.fallback_name, "客厅");
}

#[test]
fn test_corrupted_file_is_backed_up() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    std::fs::write(&settings_path, "this is = = not toml").unwrap();

    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    let backup = temp_dir.path().join("settings.toml.backup");
    assert!(backup.exists());
    assert_eq!(
        std::fs::read_to_string(backup).unwrap(),
        "this is = = not toml"
    );
    assert_eq!(manager.settings(), Settings::default());
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &settings_path,
        "active_provider = \"gemini\"\n\n[pacing]\nmin_reply_delay_ms = 10\n\n[providers.gemini]\ntype = \"gemini\"\n",
    )
    .unwrap();

    let settings = SettingsManager::from_path(settings_path).unwrap().settings();

    assert_eq!(settings.pacing.min_reply_delay_ms, 10);
    assert_eq!(settings.pacing.max_reply_delay_ms, 2000);
    assert_eq!(settings.chat_temperature, 0.7);
    assert_eq!(
        settings.active_provider(),
        Some(&ProviderConfig::Gemini {
            api_key: None,
            base_url: None
        })
    );
}

#[test]
fn test_save_round_trips_through_disk() {
    let temp_dir = TempDir::new().unwrap();
    let settings_path = temp_dir.path().join("settings.toml");
    let manager = SettingsManager::from_path(settings_path.clone()).unwrap();

    manager.update_setting(|s| {
        s.add_provider(
            "mock".to_string(),
            ProviderConfig::Mock {
                behavior: MockBehavior::reply("在"),
            },
        );
        s.set_active_provider("mock").unwrap();
        s.memory.enabled = false;
    });
    manager.save().unwrap();

    let reloaded = SettingsManager::from_path(settings_path).unwrap().settings();
    assert_eq!(reloaded.active_provider.as_deref(), Some("mock"));
    assert!(!reloaded.memory.enabled);
    assert_eq!(reloaded.list_providers(), vec!["mock".to_string()]);
}

#[test]
fn test_in_memory_manager_has_no_path() {
    let manager = SettingsManager::in_memory(Settings::default());
    manager.update_setting(|s| s.chat_temperature = 1.0);
    manager.save().unwrap();

    assert!(manager.path().is_none());
    assert_eq!(manager.settings().chat_temperature, 1.0);
    assert!(manager.settings().set_active_provider("missing").is_err());
}
