//! Persisted user settings.
//!
//! A flat string-to-string dictionary stored as one JSON object. Writes are
//! debounced: mutations set a dirty flag and the store flushes at most once
//! per interval from the pump, plus once unconditionally at shutdown.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Key for the target used to synthesize compile contexts for files the
/// project index does not cover.
pub const DEFAULT_BUILD_TARGET: &str = "build.default_target";

const SAVE_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum SettingsError {
    IoError(String),
    SerializeError(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "IO error: {msg}"),
            SettingsError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Settings store with dirty tracking and debounced saving.
#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    values: BTreeMap<String, String>,
    dirty: bool,
    last_save: Instant,
    save_interval: Duration,
}

impl Settings {
    /// Load from `path`, starting empty when the file is missing or does
    /// not parse. `now` seeds the save debounce clock.
    pub fn load(path: PathBuf, now: Instant) -> Self {
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse settings at {}: {}, starting empty",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };

        Self {
            path,
            values,
            dirty: false,
            last_save: now,
            save_interval: SAVE_INTERVAL,
        }
    }

    #[cfg(test)]
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set a key, marking the store dirty only when the value changed.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if self.values.get(&key) == Some(&value) {
            return;
        }
        self.values.insert(key, value);
        self.dirty = true;
    }

    pub fn remove(&mut self, key: &str) {
        if self.values.remove(key).is_some() {
            self.dirty = true;
        }
    }

    pub fn default_build_target(&self) -> Option<&str> {
        self.get(DEFAULT_BUILD_TARGET)
    }

    pub fn set_default_build_target(&mut self, name: impl Into<String>) {
        self.set(DEFAULT_BUILD_TARGET, name);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn should_save(&self, now: Instant) -> bool {
        self.dirty && now.saturating_duration_since(self.last_save) >= self.save_interval
    }

    /// Write out now regardless of the debounce interval.
    pub fn flush(&mut self, now: Instant) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::IoError(e.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(&self.values)
            .map_err(|e| SettingsError::SerializeError(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| SettingsError::IoError(e.to_string()))?;

        self.dirty = false;
        self.last_save = now;
        Ok(())
    }

    /// Flush when dirty and the interval has passed. Failures are logged,
    /// never surfaced; the dirty flag stays set so the next pump retries.
    pub fn maybe_flush(&mut self, now: Instant) {
        if !self.should_save(now) {
            return;
        }
        if let Err(e) = self.flush(now) {
            tracing::warn!("Failed to save settings to {}: {}", self.path.display(), e);
            // still dirty; push last_save forward so a broken disk is
            // retried once per interval, not once per pump
            self.last_save = now;
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
