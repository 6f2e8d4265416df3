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

use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::codec;
use crate::curves::FanProfile;
use crate::error::{FanError, Result};
use crate::logger;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Balanced,
    Performance,
    Quiet,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Balanced, Profile::Performance, Profile::Quiet];

    pub fn file_name(self) -> &'static str {
        match self {
            Profile::Balanced => "fan_config_balanced.txt",
            Profile::Performance => "fan_config_perfcust.txt",
            Profile::Quiet => "fan_config_quiet.txt",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Profile::Balanced => "balanced",
            Profile::Performance => "performance",
            Profile::Quiet => "quiet",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(Profile::Balanced),
            "performance" | "perf" | "perfcust" => Ok(Profile::Performance),
            "quiet" => Ok(Profile::Quiet),
            other => Err(format!("unknown profile '{}'", other)),
        }
    }
}

/// The three curve files in the helper's directory.
#[derive(Clone, Debug)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, profile: Profile) -> PathBuf {
        self.dir.join(profile.file_name())
    }

    /// Writes default content for every profile whose file is missing or empty.
    pub fn ensure_defaults(&self) -> Result<()> {
        for profile in Profile::ALL {
            let path = self.path(profile);
            let blank = match fs::read(&path) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).trim().is_empty(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => true,
                Err(e) => return Err(FanError::file_read(path, e)),
            };
            if blank {
                self.save(profile, &FanProfile::default())?;
            }
        }
        Ok(())
    }

    /// Missing or empty files are replaced by the defaults, which are also
    /// written back. Bytes that are not UTF-8 go through the decoder like any
    /// other garbage. Any other read failure is an error.
    pub fn load(&self, profile: Profile) -> Result<FanProfile> {
        let path = self.path(profile);
        match fs::read(&path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                if text.trim().is_empty() {
                    self.write_default(profile)
                } else {
                    Ok(codec::decode(&text))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => self.write_default(profile),
            Err(e) => Err(FanError::file_read(path, e)),
        }
    }

    fn write_default(&self, profile: Profile) -> Result<FanProfile> {
        let fresh = FanProfile::default();
        self.save(profile, &fresh)?;
        logger::log_event("profile_defaults_written", json!({ "profile": profile.name() }));
        Ok(fresh)
    }

    pub fn save(&self, profile: Profile, data: &FanProfile) -> Result<()> {
        let path = self.path(profile);
        fs::create_dir_all(&self.dir).map_err(|e| FanError::file_write(&self.dir, e))?;
        fs::write(&path, codec::encode(data)).map_err(|e| FanError::file_write(&path, e))?;
        // Best-effort set permissions to 0644
        let _ = fs::set_permissions(&path, fs::Permissions::from_mode(0o644));
        logger::log_event(
            "profile_saved",
            json!({ "profile": profile.name(), "points": data.point_count() }),
        );
        Ok(())
    }
}
