/*
 * This file is part of Legionfan.
 *
 * Copyright (C) 2025 Legionfan contributors
 *
 * Legionfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Legionfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Legionfan. If not, see <https://www.gnu.org/licenses/>.
 */

use std::collections::HashMap;
use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value};

use crate::curves::{NORMAL_MAX_RPM, UNLOCKED_MAX_RPM};
use crate::editor::EditLimits;
use crate::error::{FanError, Result};
use crate::logger;

pub const KEY_SHOW_GPU_TEMP: &str = "show_gpu_temp";
pub const KEY_START_MINIMIZED: &str = "start_minimized";
pub const KEY_UNLOCK_MAX_RPM: &str = "unlock_max_rpm";
pub const KEY_LOCK_POINTS: &str = "lock_points";
pub const KEY_FIRST_RUN_ACK: &str = "first_run_acknowledged";
pub const KEY_FAN_CONTROL_DIR: &str = "fan_control_dir";

/// Flat key/value preference storage.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
}

pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("legionfan");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home).join(".config").join("legionfan");
    }
    PathBuf::from("/etc/legionfan")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Where the helper and its curve files live unless overridden.
pub fn default_fan_control_dir() -> PathBuf {
    config_dir().join("fancontrol")
}

/// JSON object on disk, rewritten on every `set`.
pub struct JsonSettingsStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonSettingsStore {
    /// A missing or unreadable file starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Map<String, Value>>(&data) {
                Ok(map) => map,
                Err(e) => {
                    logger::log_event(
                        "settings_parse_error",
                        json!({ "path": path.display().to_string(), "error": e.to_string() }),
                    );
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };
        Self { path, values }
    }

    pub fn open_default() -> Self {
        Self::open(settings_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| FanError::file_write(parent, e))?;
        }
        let data = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, data).map_err(|e| FanError::file_write(&self.path, e))?;
        // Best-effort set permissions to 0644
        let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o644));
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }
}

/// In-process store for tests and one-shot CLI runs.
#[derive(Default, Debug, Clone)]
pub struct MemorySettingsStore {
    values: HashMap<String, Value>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub show_gpu_temp: bool,
    pub start_minimized: bool,
    pub unlock_max_rpm: bool,
    pub lock_points: bool,
    pub first_run_acknowledged: bool,
    pub fan_control_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_gpu_temp: true,
            start_minimized: true,
            unlock_max_rpm: false,
            lock_points: false,
            first_run_acknowledged: false,
            fan_control_dir: None,
        }
    }
}

fn read_bool(store: &dyn SettingsStore, key: &str, default: bool) -> bool {
    store.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

impl Settings {
    pub fn load(store: &dyn SettingsStore) -> Self {
        let d = Settings::default();
        Self {
            show_gpu_temp: read_bool(store, KEY_SHOW_GPU_TEMP, d.show_gpu_temp),
            start_minimized: read_bool(store, KEY_START_MINIMIZED, d.start_minimized),
            unlock_max_rpm: read_bool(store, KEY_UNLOCK_MAX_RPM, d.unlock_max_rpm),
            lock_points: read_bool(store, KEY_LOCK_POINTS, d.lock_points),
            first_run_acknowledged: read_bool(store, KEY_FIRST_RUN_ACK, d.first_run_acknowledged),
            fan_control_dir: store
                .get(KEY_FAN_CONTROL_DIR)
                .and_then(|v| v.as_str().map(PathBuf::from))
                .filter(|p| !p.as_os_str().is_empty()),
        }
    }

    pub fn save(&self, store: &mut dyn SettingsStore) -> Result<()> {
        store.set(KEY_SHOW_GPU_TEMP, Value::Bool(self.show_gpu_temp))?;
        store.set(KEY_START_MINIMIZED, Value::Bool(self.start_minimized))?;
        store.set(KEY_UNLOCK_MAX_RPM, Value::Bool(self.unlock_max_rpm))?;
        store.set(KEY_LOCK_POINTS, Value::Bool(self.lock_points))?;
        store.set(KEY_FIRST_RUN_ACK, Value::Bool(self.first_run_acknowledged))?;
        if let Some(dir) = &self.fan_control_dir {
            let dir = dir.to_str().ok_or_else(|| {
                FanError::settings(format!("fan control directory {} is not valid UTF-8", dir.display()))
            })?;
            store.set(KEY_FAN_CONTROL_DIR, Value::String(dir.to_string()))?;
        }
        Ok(())
    }

    pub fn max_rpm(&self) -> i32 {
        if self.unlock_max_rpm {
            UNLOCKED_MAX_RPM
        } else {
            NORMAL_MAX_RPM
        }
    }

    pub fn edit_limits(&self) -> EditLimits {
        EditLimits {
            max_rpm: self.max_rpm(),
            points_locked: self.lock_points,
        }
    }

    pub fn fan_control_dir(&self) -> PathBuf {
        self.fan_control_dir
            .clone()
            .unwrap_or_else(default_fan_control_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let s = Settings::load(&MemorySettingsStore::new());
        assert_eq!(s, Settings::default());
        assert!(s.show_gpu_temp);
        assert!(s.start_minimized);
        assert_eq!(s.max_rpm(), 4400);
    }

    #[test]
    fn test_load_from_mock_store() {
        let mut store = MockSettingsStore::new();
        store
            .expect_get()
            .with(eq(KEY_UNLOCK_MAX_RPM))
            .returning(|_| Some(Value::Bool(true)));
        store
            .expect_get()
            .with(eq(KEY_LOCK_POINTS))
            .returning(|_| Some(Value::String("yes".into())));
        store.expect_get().returning(|_| None);

        let s = Settings::load(&store);
        assert!(s.unlock_max_rpm);
        // wrong type falls back to the default
        assert!(!s.lock_points);
        assert_eq!(s.edit_limits().max_rpm, 5000);
    }

    #[test]
    fn test_save_writes_every_flag() {
        let mut store = MockSettingsStore::new();
        store.expect_set().times(5).returning(|_, _| Ok(()));
        Settings::default().save(&mut store).unwrap();
    }

    #[test]
    fn test_json_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut store = JsonSettingsStore::open(&path);
        let mut s = Settings::default();
        s.lock_points = true;
        s.fan_control_dir = Some(PathBuf::from("/opt/fancontrol"));
        s.save(&mut store).unwrap();

        let reopened = JsonSettingsStore::open(&path);
        let loaded = Settings::load(&reopened);
        assert!(loaded.lock_points);
        assert_eq!(loaded.fan_control_dir(), PathBuf::from("/opt/fancontrol"));
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn test_json_store_ignores_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonSettingsStore::open(&path);
        assert!(store.get(KEY_LOCK_POINTS).is_none());
    }

    #[test]
    #[serial]
    fn test_config_dir_with_xdg() {
        env::set_var("XDG_CONFIG_HOME", "/custom/config");
        assert_eq!(config_dir(), PathBuf::from("/custom/config/legionfan"));
        assert_eq!(
            default_fan_control_dir(),
            PathBuf::from("/custom/config/legionfan/fancontrol")
        );
        env::remove_var("XDG_CONFIG_HOME");
    }

    #[test]
    #[serial]
    fn test_config_dir_with_home() {
        let saved = env::var("XDG_CONFIG_HOME").ok();
        let saved_home = env::var_os("HOME");
        env::remove_var("XDG_CONFIG_HOME");
        env::set_var("HOME", "/home/testuser");
        let path = settings_path();
        match saved_home {
            Some(home) => env::set_var("HOME", home),
            None => env::remove_var("HOME"),
        }
        if let Some(v) = saved {
            env::set_var("XDG_CONFIG_HOME", v);
        }
        assert_eq!(path, PathBuf::from("/home/testuser/.config/legionfan/settings.json"));
    }

    #[test]
    fn test_non_utf8_dir_is_settings_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let s = Settings {
            fan_control_dir: Some(PathBuf::from(OsStr::from_bytes(b"/opt/fan\xffcontrol"))),
            ..Settings::default()
        };
        let err = s.save(&mut MemorySettingsStore::new()).unwrap_err();
        assert!(matches!(err, FanError::Settings(_)));
    }
}
