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

//! Text format read by the fan control helper: one `key : values` line per
//! parameter. Decoding never fails; every key falls back to its own default.

use crate::curves::{
    CurveKind, CurvePoint, FanProfile, DEFAULT_ACCELERATION, DEFAULT_CPU_TEMPS,
    DEFAULT_DECELERATION, DEFAULT_GPU_TEMPS, DEFAULT_HYSTERESIS, DEFAULT_LEGION_GEN,
    DEFAULT_RPM_POINTS, MAX_POINTS, MIN_POINTS, UNLOCKED_MAX_RPM,
};

pub const KEY_LEGION_GEN: &str = "legion_gen";
pub const KEY_CURVE_POINTS: &str = "fan_curve_points";
pub const KEY_ACCELERATION: &str = "fan_accl_value";
pub const KEY_DECELERATION: &str = "fan_deccl_value";
pub const KEY_HYSTERESIS: &str = "hysteresis";
pub const KEY_RPM_POINTS: &str = "fan_rpm_points";
pub const KEY_CPU_UP: &str = "cpu_temps_ramp_up";
pub const KEY_CPU_DOWN: &str = "cpu_temps_ramp_down";
pub const KEY_GPU_UP: &str = "gpu_temps_ramp_up";
pub const KEY_GPU_DOWN: &str = "gpu_temps_ramp_down";
pub const KEY_HST_UP: &str = "hst_temps_ramp_up";
pub const KEY_HST_DOWN: &str = "hst_temps_ramp_down";

/// Every key in the order it is written.
pub const KEYS: [&str; 12] = [
    KEY_LEGION_GEN,
    KEY_CURVE_POINTS,
    KEY_ACCELERATION,
    KEY_DECELERATION,
    KEY_HYSTERESIS,
    KEY_RPM_POINTS,
    KEY_CPU_UP,
    KEY_CPU_DOWN,
    KEY_GPU_UP,
    KEY_GPU_DOWN,
    KEY_HST_UP,
    KEY_HST_DOWN,
];

/// All twelve values as read from a file, defaults already substituted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawConfig {
    pub legion_gen: i32,
    pub curve_points: i32,
    pub acceleration: i32,
    pub deceleration: i32,
    pub hysteresis: i32,
    pub rpm_points: Vec<i32>,
    pub cpu_up: Vec<i32>,
    pub cpu_down: Vec<i32>,
    pub gpu_up: Vec<i32>,
    pub gpu_down: Vec<i32>,
    pub hst_up: Vec<i32>,
    pub hst_down: Vec<i32>,
}

fn trailing(temps: &[i32]) -> Vec<i32> {
    temps.iter().map(|t| (t - DEFAULT_HYSTERESIS).max(0)).collect()
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            legion_gen: DEFAULT_LEGION_GEN,
            curve_points: DEFAULT_RPM_POINTS.len() as i32,
            acceleration: DEFAULT_ACCELERATION,
            deceleration: DEFAULT_DECELERATION,
            hysteresis: DEFAULT_HYSTERESIS,
            rpm_points: DEFAULT_RPM_POINTS.to_vec(),
            cpu_up: DEFAULT_CPU_TEMPS.to_vec(),
            cpu_down: trailing(&DEFAULT_CPU_TEMPS),
            gpu_up: DEFAULT_GPU_TEMPS.to_vec(),
            gpu_down: trailing(&DEFAULT_GPU_TEMPS),
            hst_up: DEFAULT_GPU_TEMPS.to_vec(),
            hst_down: trailing(&DEFAULT_GPU_TEMPS),
        }
    }
}

/// Value part of the first line carrying `key`, i.e. the text between the
/// first and second `:`.
fn find_value<'a>(lines: &[&'a str], key: &str) -> Option<&'a str> {
    lines.iter().find_map(|line| {
        let rest = line.strip_prefix(key)?;
        if !rest.trim_start().starts_with(':') {
            return None;
        }
        line.split(':').nth(1).map(str::trim)
    })
}

fn parse_int(lines: &[&str], key: &str, default: i32) -> i32 {
    find_value(lines, key)
        .and_then(|v| v.parse::<i32>().ok())
        .unwrap_or(default)
}

fn parse_list(lines: &[&str], key: &str, default: &[i32]) -> Vec<i32> {
    let parsed = find_value(lines, key).and_then(|v| {
        v.split_whitespace()
            .map(|tok| tok.parse::<i32>().ok())
            .collect::<Option<Vec<i32>>>()
    });
    match parsed {
        Some(values) if !values.is_empty() => values,
        _ => default.to_vec(),
    }
}

pub fn parse(text: &str) -> RawConfig {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let d = RawConfig::default();
    RawConfig {
        legion_gen: parse_int(&lines, KEY_LEGION_GEN, d.legion_gen),
        curve_points: parse_int(&lines, KEY_CURVE_POINTS, d.curve_points),
        acceleration: parse_int(&lines, KEY_ACCELERATION, d.acceleration),
        deceleration: parse_int(&lines, KEY_DECELERATION, d.deceleration),
        hysteresis: parse_int(&lines, KEY_HYSTERESIS, d.hysteresis),
        rpm_points: parse_list(&lines, KEY_RPM_POINTS, &d.rpm_points),
        cpu_up: parse_list(&lines, KEY_CPU_UP, &d.cpu_up),
        cpu_down: parse_list(&lines, KEY_CPU_DOWN, &d.cpu_down),
        gpu_up: parse_list(&lines, KEY_GPU_UP, &d.gpu_up),
        gpu_down: parse_list(&lines, KEY_GPU_DOWN, &d.gpu_down),
        hst_up: parse_list(&lines, KEY_HST_UP, &d.hst_up),
        hst_down: parse_list(&lines, KEY_HST_DOWN, &d.hst_down),
    }
}

impl RawConfig {
    /// Zips the ramp-up arrays with the RPM levels. Ramp-down, `hst_*` and
    /// the declared point count are dropped; encode regenerates them.
    pub fn into_profile(self) -> FanProfile {
        let n = self
            .rpm_points
            .len()
            .min(self.cpu_up.len())
            .min(self.gpu_up.len())
            .min(MAX_POINTS);
        let (rpm, cpu, gpu) = if n < MIN_POINTS {
            (
                DEFAULT_RPM_POINTS.to_vec(),
                DEFAULT_CPU_TEMPS.to_vec(),
                DEFAULT_GPU_TEMPS.to_vec(),
            )
        } else {
            (
                self.rpm_points[..n].to_vec(),
                self.cpu_up[..n].to_vec(),
                self.gpu_up[..n].to_vec(),
            )
        };

        let mut profile = FanProfile::default();
        profile.legion_gen = self.legion_gen;
        profile.acceleration = self.acceleration;
        profile.deceleration = self.deceleration;
        profile.cpu = cpu
            .into_iter()
            .zip(rpm)
            .map(|(t, r)| CurvePoint::new(t, r))
            .collect();
        profile.gpu_temps = gpu;
        profile.set_hysteresis(if self.hysteresis == 0 {
            DEFAULT_HYSTERESIS
        } else {
            self.hysteresis
        });
        profile.repair(UNLOCKED_MAX_RPM);
        profile
    }
}

pub fn decode(text: &str) -> FanProfile {
    parse(text).into_profile()
}

fn join(values: &[i32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn encode(profile: &FanProfile) -> String {
    let gpu_up = profile.ramp_up(CurveKind::Gpu);
    let gpu_down = profile.ramp_down(CurveKind::Gpu);
    let lines: [(&str, String); 12] = [
        (KEY_LEGION_GEN, profile.legion_gen.to_string()),
        (KEY_CURVE_POINTS, profile.point_count().to_string()),
        (KEY_ACCELERATION, profile.acceleration.to_string()),
        (KEY_DECELERATION, profile.deceleration.to_string()),
        (KEY_HYSTERESIS, profile.hysteresis().to_string()),
        (KEY_RPM_POINTS, join(&profile.rpm_levels())),
        (KEY_CPU_UP, join(&profile.ramp_up(CurveKind::Cpu))),
        (KEY_CPU_DOWN, join(&profile.ramp_down(CurveKind::Cpu))),
        (KEY_GPU_UP, join(&gpu_up)),
        (KEY_GPU_DOWN, join(&gpu_down)),
        (KEY_HST_UP, join(&gpu_up)),
        (KEY_HST_DOWN, join(&gpu_down)),
    ];
    let mut out = String::new();
    for (key, value) in lines {
        out.push_str(key);
        out.push_str(" : ");
        out.push_str(&value);
        out.push('\n');
    }
    out
}
