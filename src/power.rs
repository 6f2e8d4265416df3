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

//! Vendor power mode. On Linux the firmware exposes it through the ACPI
//! `platform_profile` attribute.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{FanError, Result};
use crate::logger;
use crate::profiles::Profile;

const PLATFORM_PROFILE_DIR: &str = "/sys/firmware/acpi";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PowerMode {
    Quiet = 1,
    Balanced = 2,
    Performance = 3,
    Custom = 255,
}

impl PowerMode {
    /// Custom mode runs on the performance curve file.
    pub fn profile(self) -> Profile {
        match self {
            PowerMode::Quiet => Profile::Quiet,
            PowerMode::Balanced => Profile::Balanced,
            PowerMode::Performance | PowerMode::Custom => Profile::Performance,
        }
    }

    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Quiet => PowerMode::Quiet,
            Profile::Balanced => PowerMode::Balanced,
            Profile::Performance => PowerMode::Performance,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PowerMode::Quiet => "Quiet",
            PowerMode::Balanced => "Balanced",
            PowerMode::Performance => "Performance",
            PowerMode::Custom => "Custom",
        }
    }

    fn from_platform_name(name: &str) -> Option<Self> {
        match name {
            "quiet" | "low-power" | "cool" => Some(PowerMode::Quiet),
            "balanced" => Some(PowerMode::Balanced),
            "performance" => Some(PowerMode::Performance),
            "balanced-performance" | "custom" => Some(PowerMode::Custom),
            _ => None,
        }
    }

    fn platform_names(self) -> &'static [&'static str] {
        match self {
            PowerMode::Quiet => &["quiet", "low-power", "cool"],
            PowerMode::Balanced => &["balanced"],
            PowerMode::Performance => &["performance"],
            PowerMode::Custom => &["balanced-performance", "custom"],
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait PowerModeControl {
    fn power_mode(&self) -> Result<PowerMode>;
    fn set_power_mode(&self, mode: PowerMode) -> Result<()>;
}

/// Reads the power mode, falling back to Balanced when it cannot be read.
pub fn current_power_mode(control: &dyn PowerModeControl) -> PowerMode {
    match control.power_mode() {
        Ok(mode) => mode,
        Err(e) => {
            logger::log_event("power_mode_read_error", json!({ "error": e.to_string() }));
            PowerMode::Balanced
        }
    }
}

/// `platform_profile` / `platform_profile_choices` pair.
#[derive(Clone, Debug)]
pub struct PlatformProfile {
    dir: PathBuf,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        Self::new(PLATFORM_PROFILE_DIR)
    }
}

impl PlatformProfile {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn profile_path(&self) -> PathBuf {
        self.dir.join("platform_profile")
    }

    fn choices(&self) -> Option<Vec<String>> {
        let data = fs::read_to_string(self.dir.join("platform_profile_choices")).ok()?;
        Some(data.split_whitespace().map(str::to_string).collect())
    }

    pub fn is_available(&self) -> bool {
        self.profile_path().exists()
    }
}

impl PowerModeControl for PlatformProfile {
    fn power_mode(&self) -> Result<PowerMode> {
        let path = self.profile_path();
        let raw = fs::read_to_string(&path).map_err(|e| FanError::file_read(&path, e))?;
        let name = raw.trim();
        PowerMode::from_platform_name(name)
            .ok_or_else(|| FanError::power_mode(format!("unknown platform profile '{}'", name)))
    }

    fn set_power_mode(&self, mode: PowerMode) -> Result<()> {
        let candidates = mode.platform_names();
        let name = match self.choices() {
            Some(choices) => candidates
                .iter()
                .find(|c| choices.iter().any(|choice| choice.as_str() == **c))
                .copied()
                .ok_or_else(|| {
                    FanError::power_mode(format!("{} mode is not supported here", mode.label()))
                })?,
            None => candidates[0],
        };
        let path = self.profile_path();
        fs::write(&path, name).map_err(|e| FanError::file_write(&path, e))?;
        logger::log_event("power_mode_set", json!({ "mode": mode.label(), "platform": name }));
        Ok(())
    }
}
