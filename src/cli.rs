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

//! Command line interface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::autostart::Autostart;
use crate::codec;
use crate::curves::CurveKind;
use crate::ec::{EcReader, SensorReadings};
use crate::fancontrol::FanControlProcess;
use crate::power::{current_power_mode, PlatformProfile, PowerMode, PowerModeControl};
use crate::profiles::{Profile, ProfileStore};
use crate::service;
use crate::settings::{JsonSettingsStore, Settings};

#[derive(Parser, Debug)]
#[command(name = "legionfan")]
#[command(version)]
#[command(about = "Legionfan - fan curve editor for Legion laptops")]
#[command(long_about = "Legionfan - fan curve editor for Legion laptops

Edits the three per-power-mode fan curves used by the FanControl helper and
restarts the helper whenever a curve or the power mode changes.

EXAMPLES:
    legionfan                      Launch the curve editor (default)
    legionfan service              Follow the power mode headless
    legionfan apply quiet          Switch to Quiet and restart the helper
    legionfan show balanced        Print the balanced curve file
    legionfan sensors              Read temperatures and fan speeds once

FILES:
    ~/.config/legionfan/settings.json           Application settings
    ~/.config/legionfan/fancontrol/             Curve files and helper
    ~/.local/state/legionfan/logs.json          Event log (--logging)")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Write JSON event log
    #[arg(long, global = true)]
    pub logging: bool,

    /// Autostart launch: run headless when start_minimized is set
    #[arg(long)]
    pub minimized: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Launch the interactive curve editor (default)
    Tui,

    /// Apply the curve for the current power mode and follow mode changes
    Service,

    /// Set the power mode for a profile and restart the helper
    Apply {
        /// quiet, balanced or performance (default: current power mode)
        profile: Option<Profile>,
    },

    /// Print the curve file of a profile
    Show {
        /// quiet, balanced or performance
        profile: Profile,
    },

    /// Read EC temperatures and fan speeds once (needs root)
    Sensors {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start at login
    #[command(subcommand)]
    Autostart(AutostartCommands),
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutostartCommands {
    Enable,
    Disable,
    Status,
}

/// What the binary should do after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    Tui,
    Service,
    Command(Commands),
}

impl Cli {
    pub fn launch(&self, settings: &Settings) -> Launch {
        match &self.command {
            None if self.minimized && settings.start_minimized => Launch::Service,
            None | Some(Commands::Tui) => Launch::Tui,
            Some(Commands::Service) => Launch::Service,
            Some(cmd) => Launch::Command(cmd.clone()),
        }
    }
}

pub fn load_settings() -> Settings {
    Settings::load(&JsonSettingsStore::open_default())
}

pub fn run_command(cmd: &Commands, settings: &Settings) -> Result<()> {
    match cmd {
        Commands::Tui => Ok(()),
        Commands::Service => service::run_service(),
        Commands::Apply { profile } => cmd_apply(*profile, settings),
        Commands::Show { profile } => cmd_show(*profile, settings),
        Commands::Sensors { json } => cmd_sensors(*json),
        Commands::Autostart(sub) => cmd_autostart(*sub, &Autostart::default()),
    }
}

/// Asks the firmware for the mode matching `profile`. Returns a warning when
/// the mode could not be changed.
fn request_power_mode(power: &PlatformProfile, profile: Profile) -> Option<String> {
    if !power.is_available() {
        return Some("power mode not changed: ACPI platform_profile is not available".to_string());
    }
    match power.set_power_mode(PowerMode::for_profile(profile)) {
        Ok(()) => None,
        Err(e) => Some(format!("power mode not changed: {}", e)),
    }
}

fn cmd_apply(profile: Option<Profile>, settings: &Settings) -> Result<()> {
    let power = PlatformProfile::default();
    let profile = match profile {
        Some(p) => {
            if let Some(warning) = request_power_mode(&power, p) {
                eprintln!("Warning: {}", warning);
            }
            p
        }
        None => current_power_mode(&power).profile(),
    };
    let dir = settings.fan_control_dir();
    let store = ProfileStore::new(&dir);
    let mut helper = FanControlProcess::new(&dir);
    service::activate_profile(&store, &mut helper, profile, settings.max_rpm())?;
    println!("Applied {} profile from {}", profile, store.path(profile).display());
    Ok(())
}

fn cmd_show(profile: Profile, settings: &Settings) -> Result<()> {
    let store = ProfileStore::new(settings.fan_control_dir());
    let data = store.load(profile)?;
    println!("# {}", store.path(profile).display());
    print!("{}", codec::encode(&data));
    println!();
    for kind in [CurveKind::Cpu, CurveKind::Gpu] {
        let steps: Vec<String> = data
            .points(kind)
            .iter()
            .map(|p| format!("{}°C→{}", p.temp, p.rpm))
            .collect();
        println!("{}: {}", kind.label(), steps.join("  "));
    }
    Ok(())
}

fn cmd_sensors(json: bool) -> Result<()> {
    let mut ec = EcReader::open().context("EC access needs root")?;
    let r = SensorReadings::read(&mut ec)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&r)?);
    } else {
        println!("CPU temp: {} °C", r.cpu_temp);
        println!("GPU temp: {} °C", r.gpu_temp);
        println!("VRM temp: {} °C", r.vrm_temp);
        println!("Fan 1:    {} RPM", r.fan1_rpm);
        println!("Fan 2:    {} RPM", r.fan2_rpm);
    }
    Ok(())
}

fn cmd_autostart(cmd: AutostartCommands, autostart: &Autostart) -> Result<()> {
    match cmd {
        AutostartCommands::Enable => {
            let exe = std::env::current_exe().context("locating own executable")?;
            autostart.enable(&exe)?;
            println!("Enabled: {}", autostart.entry_path().display());
        }
        AutostartCommands::Disable => {
            autostart.disable()?;
            println!("Disabled");
        }
        AutostartCommands::Status => {
            let state = if autostart.is_enabled() { "enabled" } else { "disabled" };
            println!("{} ({})", state, autostart.entry_path().display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("legionfan").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_is_tui() {
        assert_eq!(parse(&[]).launch(&Settings::default()), Launch::Tui);
        assert_eq!(parse(&["tui"]).launch(&Settings::default()), Launch::Tui);
    }

    #[test]
    fn test_minimized_follows_setting() {
        let cli = parse(&["--minimized"]);
        assert_eq!(cli.launch(&Settings::default()), Launch::Service);
        let settings = Settings {
            start_minimized: false,
            ..Settings::default()
        };
        assert_eq!(cli.launch(&settings), Launch::Tui);
    }

    #[test]
    fn test_profile_arguments() {
        let cli = parse(&["apply", "perf", "--logging"]);
        assert!(cli.logging);
        assert_eq!(
            cli.command,
            Some(Commands::Apply {
                profile: Some(Profile::Performance)
            })
        );
        assert_eq!(parse(&["apply"]).command, Some(Commands::Apply { profile: None }));
        assert!(Cli::try_parse_from(["legionfan", "show", "turbo"]).is_err());
    }

    #[test]
    fn test_request_power_mode() {
        let missing = PlatformProfile::new("/nonexistent/legionfan");
        let warning = request_power_mode(&missing, Profile::Quiet).unwrap();
        assert!(warning.contains("not available"));

        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("platform_profile"), "balanced\n").unwrap();
        std::fs::write(dir.path().join("platform_profile_choices"), "quiet balanced performance\n").unwrap();
        let power = PlatformProfile::new(dir.path());
        assert_eq!(request_power_mode(&power, Profile::Quiet), None);
        assert_eq!(power.power_mode().unwrap(), PowerMode::Quiet);
    }

    #[test]
    fn test_autostart_commands() {
        let dir = TempDir::new().unwrap();
        let auto = Autostart::new(dir.path());
        assert_eq!(
            parse(&["autostart", "status"]).command,
            Some(Commands::Autostart(AutostartCommands::Status))
        );
        cmd_autostart(AutostartCommands::Enable, &auto).unwrap();
        assert!(auto.is_enabled());
        cmd_autostart(AutostartCommands::Disable, &auto).unwrap();
        assert!(!auto.is_enabled());
    }
}
