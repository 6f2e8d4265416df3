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

//! JSON-lines event log. Nothing is written until `init_logging` runs.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use lazy_static::lazy_static;
use serde_json::{json, Value};

const FALLBACK_LOG_PATH: &str = "/tmp/legionfan_logs.json";

lazy_static! {
    static ref LOG_FILE: Mutex<Option<File>> = Mutex::new(None);
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

pub fn log_path() -> PathBuf {
    if let Ok(state) = env::var("XDG_STATE_HOME") {
        return Path::new(&state).join("legionfan").join("logs.json");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".local")
            .join("state")
            .join("legionfan")
            .join("logs.json");
    }
    PathBuf::from(FALLBACK_LOG_PATH)
}

fn open_append(path: &Path) -> Option<File> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

pub fn init_logging() {
    let file = open_append(&log_path()).or_else(|| open_append(Path::new(FALLBACK_LOG_PATH)));
    if let (Some(f), Ok(mut guard)) = (file, LOG_FILE.lock()) {
        *guard = Some(f);
    }
}

pub fn is_enabled() -> bool {
    LOG_FILE.lock().map(|g| g.is_some()).unwrap_or(false)
}

/// Appends one event line. A no-op while logging is disabled.
pub fn log_event(event: &str, data: Value) {
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(f) = guard.as_mut() {
            let line = json!({
                "ts_ms": now_millis(),
                "event": event,
                "data": data,
            });
            let _ = writeln!(f, "{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_log_path_prefers_xdg_state() {
        env::set_var("XDG_STATE_HOME", "/var/tmp/state");
        assert_eq!(log_path(), PathBuf::from("/var/tmp/state/legionfan/logs.json"));
        env::remove_var("XDG_STATE_HOME");
    }

    #[test]
    #[serial]
    fn test_events_are_json_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        env::set_var("XDG_STATE_HOME", dir.path());
        init_logging();
        assert!(is_enabled());
        log_event("profile_saved", json!({ "profile": "quiet" }));
        env::remove_var("XDG_STATE_HOME");

        let data = fs::read_to_string(dir.path().join("legionfan").join("logs.json")).unwrap();
        let last = data.lines().last().unwrap();
        let v: Value = serde_json::from_str(last).unwrap();
        assert_eq!(v["event"], "profile_saved");
        assert_eq!(v["data"]["profile"], "quiet");
    }
}
