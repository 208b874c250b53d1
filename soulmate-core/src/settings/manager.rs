use crate::settings::config::Settings;
use anyhow::{Context, Result};
use std::fs;
use std::ops::DerefMut;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to the session settings. Every clone sees the same
/// instance; changes stay in memory until `save` is called.
#[derive(Clone)]
pub struct SettingsManager {
    settings_path: Option<PathBuf>,
    inner: Arc<Mutex<Settings>>,
}

impl SettingsManager {
    /// Create a new settings manager with default settings location
    pub fn new() -> Result<Self> {
        Self::from_path(Self::default_settings_path()?)
    }

    /// Create a settings manager from a specific path
    pub fn from_path(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            write_settings(&path, &Settings::default())?;
        }

        let loaded = Self::load_from_file_with_backup(&path)?;

        Ok(Self {
            settings_path: Some(path),
            inner: Arc::new(Mutex::new(loaded)),
        })
    }

    /// Settings that are never written to disk. `save` is a no-op.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings_path: None,
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    /// Get the default settings path (~/.soulmate/settings.toml)
    pub fn default_settings_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".soulmate").join("settings.toml"))
    }

    /// Load settings from a TOML file with backup on parse failure
    fn load_from_file_with_backup(path: &Path) -> Result<Settings> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {path:?}"))?;

        match toml::from_str(&contents) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                let backup_path = path.with_extension("toml.backup");
                tracing::warn!(?path, ?backup_path, error = %e, "Settings unparsable, backing up");
                fs::rename(path, &backup_path).with_context(|| {
                    format!("Failed to backup corrupted settings to {backup_path:?}")
                })?;

                let default_settings = Settings::default();
                write_settings(path, &default_settings)?;
                Ok(default_settings)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the in-memory settings
    pub fn settings(&self) -> Settings {
        self.lock().clone()
    }

    /// Update in-memory settings with a closure. Note: settings are not saved to disk
    pub fn update_setting<F>(&self, updater: F)
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.lock();
        updater(guard.deref_mut());
    }

    /// Save provided settings
    pub fn save_settings(&self, settings: Settings) -> Result<()> {
        if let Some(path) = &self.settings_path {
            write_settings(path, &settings)?;
        }
        *self.lock() = settings;
        Ok(())
    }

    /// Explicitly persist in-memory settings to disk
    pub fn save(&self) -> Result<()> {
        self.save_settings(self.settings())
    }

    /// Get the settings file path, if backed by one
    pub fn path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }
}

fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {parent:?}"))?;
    }
    let contents = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
    fs::write(path, contents).with_context(|| format!("Failed to write settings to {path:?}"))
}
