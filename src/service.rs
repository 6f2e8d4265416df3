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

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::json;

use crate::fancontrol::{FanControlProcess, HelperProcess};
use crate::logger;
use crate::power::{current_power_mode, PlatformProfile, PowerMode, PowerModeControl};
use crate::profiles::{Profile, ProfileStore};
use crate::settings::{JsonSettingsStore, Settings};

/// Makes sure the curve file for `profile` respects the RPM ceiling, then
/// restarts the helper so it picks the file up.
pub fn activate_profile(
    store: &ProfileStore,
    helper: &mut dyn HelperProcess,
    profile: Profile,
    max_rpm: i32,
) -> Result<()> {
    let mut data = store
        .load(profile)
        .with_context(|| format!("loading {} profile", profile))?;
    let before = data.clone();
    data.limit_rpm(max_rpm);
    if data != before {
        store.save(profile, &data)?;
    }
    helper.restart().context("restarting fan control helper")?;
    logger::log_event("profile_activated", json!({ "profile": profile.name() }));
    Ok(())
}

/// Tracks the power mode and re-activates the matching profile whenever it
/// changes.
#[derive(Debug, Default)]
pub struct ModeFollower {
    last_mode: Option<PowerMode>,
}

impl ModeFollower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_mode(&self) -> Option<PowerMode> {
        self.last_mode
    }

    /// Returns the profile that was activated, if the mode changed.
    pub fn tick(
        &mut self,
        power: &dyn PowerModeControl,
        store: &ProfileStore,
        helper: &mut dyn HelperProcess,
        max_rpm: i32,
    ) -> Result<Option<Profile>> {
        let mode = current_power_mode(power);
        if self.last_mode == Some(mode) {
            return Ok(None);
        }
        logger::log_event(
            "power_mode_changed",
            json!({ "from": self.last_mode.map(|m| m.label()), "to": mode.label() }),
        );
        self.last_mode = Some(mode);
        activate_profile(store, helper, mode.profile(), max_rpm)?;
        Ok(Some(mode.profile()))
    }
}

pub fn run_service() -> Result<()> {
    eprintln!("legionfan: starting service mode");

    let settings = Settings::load(&JsonSettingsStore::open_default());
    let dir = settings.fan_control_dir();
    let store = ProfileStore::new(&dir);
    store
        .ensure_defaults()
        .with_context(|| format!("preparing curve files in {}", dir.display()))?;
    let power = PlatformProfile::default();
    let mut helper = FanControlProcess::new(&dir);
    let mut follower = ModeFollower::new();

    let interval = Duration::from_millis(1000);
    let mut last = Instant::now() - interval;

    loop {
        let now = Instant::now();
        if now.duration_since(last) < interval {
            thread::sleep(Duration::from_millis(50));
            continue;
        }
        last = now;

        match follower.tick(&power, &store, &mut helper, settings.max_rpm()) {
            Ok(Some(profile)) => eprintln!("legionfan: switched to {} profile", profile),
            Ok(None) => {}
            Err(e) => {
                eprintln!("legionfan: {:#}", e);
                logger::log_event("service_error", json!({ "error": format!("{:#}", e) }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::{FanProfile, NORMAL_MAX_RPM};
    use crate::error::FanError;
    use crate::fancontrol::MockHelperProcess;
    use crate::power::MockPowerModeControl;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_follower_activates_on_change_only() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());

        let mut power = MockPowerModeControl::new();
        let mut seq = mockall::Sequence::new();
        power
            .expect_power_mode()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Ok(PowerMode::Quiet));
        power
            .expect_power_mode()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(PowerMode::Custom));

        let mut helper = MockHelperProcess::new();
        helper.expect_restart().times(2).returning(|| Ok(()));

        let mut follower = ModeFollower::new();
        let first = follower.tick(&power, &store, &mut helper, NORMAL_MAX_RPM).unwrap();
        assert_eq!(first, Some(Profile::Quiet));
        let second = follower.tick(&power, &store, &mut helper, NORMAL_MAX_RPM).unwrap();
        assert_eq!(second, None);
        let third = follower.tick(&power, &store, &mut helper, NORMAL_MAX_RPM).unwrap();
        assert_eq!(third, Some(Profile::Performance));
        assert!(store.path(Profile::Quiet).exists());
        assert!(store.path(Profile::Performance).exists());
    }

    #[test]
    fn test_unreadable_mode_means_balanced() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());
        let mut power = MockPowerModeControl::new();
        power
            .expect_power_mode()
            .returning(|| Err(FanError::power_mode("no firmware interface")));
        let mut helper = MockHelperProcess::new();
        helper.expect_restart().times(1).returning(|| Ok(()));

        let mut follower = ModeFollower::new();
        let got = follower.tick(&power, &store, &mut helper, NORMAL_MAX_RPM).unwrap();
        assert_eq!(got, Some(Profile::Balanced));
        assert_eq!(follower.last_mode(), Some(PowerMode::Balanced));
    }

    #[test]
    fn test_activate_clamps_unlocked_levels() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());
        fs::write(
            store.path(Profile::Balanced),
            "fan_rpm_points : 1000 2000 5000\ncpu_temps_ramp_up : 40 50 60\ngpu_temps_ramp_up : 40 50 60\n",
        )
        .unwrap();
        let mut helper = MockHelperProcess::new();
        helper.expect_restart().times(1).returning(|| Ok(()));

        activate_profile(&store, &mut helper, Profile::Balanced, NORMAL_MAX_RPM).unwrap();
        let saved: FanProfile = store.load(Profile::Balanced).unwrap();
        assert_eq!(saved.rpm_levels(), vec![1000, 2000, 4400]);
    }

    #[test]
    fn test_activate_reports_helper_failure() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::new(dir.path());
        let mut helper = MockHelperProcess::new();
        helper
            .expect_restart()
            .returning(|| Err(FanError::helper("FanControl not found")));
        let err = activate_profile(&store, &mut helper, Profile::Quiet, NORMAL_MAX_RPM).unwrap_err();
        assert!(format!("{:#}", err).contains("FanControl not found"));
    }
}
