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

//! Login startup through an XDG autostart entry.

use std::env;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::error::{FanError, Result};
use crate::logger;

const ENTRY_NAME: &str = "legionfan.desktop";

pub fn autostart_dir() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("autostart");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home).join(".config").join("autostart");
    }
    PathBuf::from("/etc/xdg/autostart")
}

pub struct Autostart {
    entry: PathBuf,
}

impl Default for Autostart {
    fn default() -> Self {
        Self::new(autostart_dir())
    }
}

impl Autostart {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            entry: dir.as_ref().join(ENTRY_NAME),
        }
    }

    pub fn entry_path(&self) -> &Path {
        &self.entry
    }

    pub fn is_enabled(&self) -> bool {
        self.entry.is_file()
    }

    /// Registers `executable --minimized` to run at login.
    pub fn enable(&self, executable: &Path) -> Result<()> {
        if let Some(parent) = self.entry.parent() {
            fs::create_dir_all(parent).map_err(|e| FanError::file_write(parent, e))?;
        }
        let content = format!(
            "[Desktop Entry]\n\
             Type=Application\n\
             Name=Legion Fan Control\n\
             Comment=Apply Legion fan curves for the current power mode\n\
             Exec=\"{}\" --minimized\n\
             Terminal=false\n\
             X-GNOME-Autostart-enabled=true\n",
            executable.display()
        );
        fs::write(&self.entry, content).map_err(|e| FanError::file_write(&self.entry, e))?;
        // Best-effort set permissions to 0644
        let _ = fs::set_permissions(&self.entry, fs::Permissions::from_mode(0o644));
        logger::log_event("autostart_enabled", json!({ "entry": self.entry.display().to_string() }));
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        match fs::remove_file(&self.entry) {
            Ok(()) => {
                logger::log_event("autostart_disabled", json!({}));
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FanError::file_write(&self.entry, e)),
        }
    }

    /// Flips the registration and returns the new state.
    pub fn toggle(&self, executable: &Path) -> Result<bool> {
        if self.is_enabled() {
            self.disable()?;
            Ok(false)
        } else {
            self.enable(executable)?;
            Ok(true)
        }
    }
}
