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

//! In-memory fan profile: a CPU curve, a GPU curve and the scalar
//! parameters the EC fan engine reads.
//!
//! The GPU curve has its own temperatures but no RPM storage of its own:
//! GPU level `i` always runs at CPU level `i`'s RPM.

use serde::{Deserialize, Serialize};

use crate::error::{FanError, Result};

pub const MIN_TEMP: i32 = 20;
pub const MAX_TEMP: i32 = 100;
pub const MIN_RPM: i32 = 1000;
pub const RPM_STEP: i32 = 50;
pub const NORMAL_MAX_RPM: i32 = 4400;
pub const UNLOCKED_MAX_RPM: i32 = 5000;
pub const MIN_POINTS: usize = 2;
pub const MAX_POINTS: usize = 8;
pub const MIN_HYSTERESIS: i32 = 1;
pub const MAX_HYSTERESIS: i32 = 8;
pub const DEFAULT_HYSTERESIS: i32 = 3;

pub const DEFAULT_LEGION_GEN: i32 = 5;
pub const DEFAULT_ACCELERATION: i32 = 2;
pub const DEFAULT_DECELERATION: i32 = 2;
pub const DEFAULT_RPM_POINTS: [i32; 5] = [1000, 1500, 2200, 3600, 3900];
pub const DEFAULT_CPU_TEMPS: [i32; 5] = [30, 45, 55, 60, 65];
pub const DEFAULT_GPU_TEMPS: [i32; 5] = [30, 50, 55, 60, 63];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    Cpu,
    Gpu,
}

impl CurveKind {
    pub fn label(self) -> &'static str {
        match self {
            CurveKind::Cpu => "CPU",
            CurveKind::Gpu => "GPU",
        }
    }

    pub fn other(self) -> Self {
        match self {
            CurveKind::Cpu => CurveKind::Gpu,
            CurveKind::Gpu => CurveKind::Cpu,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub temp: i32,
    pub rpm: i32,
}

impl CurvePoint {
    pub fn new(temp: i32, rpm: i32) -> Self {
        Self { temp, rpm }
    }
}

/// One of the three per-power-mode profiles.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FanProfile {
    pub legion_gen: i32,
    pub acceleration: i32,
    pub deceleration: i32,
    hysteresis: i32,
    pub(crate) cpu: Vec<CurvePoint>,
    pub(crate) gpu_temps: Vec<i32>,
}

impl Default for FanProfile {
    fn default() -> Self {
        Self {
            legion_gen: DEFAULT_LEGION_GEN,
            acceleration: DEFAULT_ACCELERATION,
            deceleration: DEFAULT_DECELERATION,
            hysteresis: DEFAULT_HYSTERESIS,
            cpu: DEFAULT_CPU_TEMPS
                .iter()
                .zip(DEFAULT_RPM_POINTS.iter())
                .map(|(&t, &r)| CurvePoint::new(t, r))
                .collect(),
            gpu_temps: DEFAULT_GPU_TEMPS.to_vec(),
        }
    }
}

impl FanProfile {
    /// Builds a profile from raw curves. Only the point counts are checked;
    /// ordering is left to `repair` or to the editor.
    pub fn from_points(cpu: Vec<CurvePoint>, gpu_temps: Vec<i32>) -> Result<Self> {
        if cpu.len() != gpu_temps.len() {
            return Err(FanError::InvalidCurve(format!(
                "CPU curve has {} points but GPU curve has {}",
                cpu.len(),
                gpu_temps.len()
            )));
        }
        if cpu.len() < MIN_POINTS {
            return Err(FanError::MinimumRequired { min: MIN_POINTS });
        }
        if cpu.len() > MAX_POINTS {
            return Err(FanError::LimitExceeded { max: MAX_POINTS });
        }
        Ok(Self {
            cpu,
            gpu_temps,
            ..Self::default()
        })
    }

    /// Evenly spaced curve with `count` points across the usable range.
    pub fn evenly_spaced(count: usize, max_rpm: i32) -> Self {
        let count = count.clamp(MIN_POINTS, MAX_POINTS);
        let span = (count - 1) as i32;
        let low_t = MIN_TEMP + 10;
        let high_t = MAX_TEMP - 10;
        let cpu: Vec<CurvePoint> = (0..count as i32)
            .map(|i| {
                let temp = low_t + i * (high_t - low_t) / span;
                let rpm = snap_rpm(MIN_RPM + i * (max_rpm - MIN_RPM) / span).clamp(MIN_RPM, max_rpm);
                CurvePoint::new(temp, rpm)
            })
            .collect();
        let gpu_temps = cpu.iter().map(|p| p.temp).collect();
        Self {
            cpu,
            gpu_temps,
            ..Self::default()
        }
    }

    pub fn point_count(&self) -> usize {
        self.cpu.len()
    }

    pub fn point(&self, kind: CurveKind, index: usize) -> Result<CurvePoint> {
        let len = self.point_count();
        let cpu = self
            .cpu
            .get(index)
            .ok_or(FanError::IndexOutOfRange { index, len })?;
        Ok(match kind {
            CurveKind::Cpu => *cpu,
            CurveKind::Gpu => CurvePoint::new(self.gpu_temps[index], cpu.rpm),
        })
    }

    pub fn points(&self, kind: CurveKind) -> Vec<CurvePoint> {
        match kind {
            CurveKind::Cpu => self.cpu.clone(),
            CurveKind::Gpu => self
                .gpu_temps
                .iter()
                .zip(self.cpu.iter())
                .map(|(&t, p)| CurvePoint::new(t, p.rpm))
                .collect(),
        }
    }

    pub fn cpu_points(&self) -> &[CurvePoint] {
        &self.cpu
    }

    pub fn gpu_temps(&self) -> &[i32] {
        &self.gpu_temps
    }

    pub fn rpm_levels(&self) -> Vec<i32> {
        self.cpu.iter().map(|p| p.rpm).collect()
    }

    pub fn hysteresis(&self) -> i32 {
        self.hysteresis
    }

    pub fn set_hysteresis(&mut self, value: i32) {
        self.hysteresis = value.clamp(MIN_HYSTERESIS, MAX_HYSTERESIS);
    }

    pub fn ramp_up(&self, kind: CurveKind) -> Vec<i32> {
        match kind {
            CurveKind::Cpu => self.cpu.iter().map(|p| p.temp).collect(),
            CurveKind::Gpu => self.gpu_temps.clone(),
        }
    }

    /// Ramp-down thresholds are never stored; they trail ramp-up by the hysteresis.
    pub fn ramp_down(&self, kind: CurveKind) -> Vec<i32> {
        self.ramp_up(kind)
            .into_iter()
            .map(|t| (t - self.hysteresis).max(0))
            .collect()
    }

    /// Clamps every level into `[MIN_RPM, max_rpm]` and keeps them non-decreasing.
    pub fn limit_rpm(&mut self, max_rpm: i32) {
        let mut floor = MIN_RPM;
        for p in &mut self.cpu {
            p.rpm = p.rpm.clamp(MIN_RPM, max_rpm).max(floor);
            floor = p.rpm;
        }
    }

    /// Brings a freshly decoded profile back inside every invariant.
    pub fn repair(&mut self, max_rpm: i32) {
        self.settle_temps();
        self.limit_rpm(max_rpm);
        self.set_hysteresis(self.hysteresis);
    }

    pub(crate) fn settle_temps(&mut self) {
        let mut cpu_temps: Vec<i32> = self.cpu.iter().map(|p| p.temp).collect();
        settle_temps(&mut cpu_temps);
        for (p, t) in self.cpu.iter_mut().zip(cpu_temps) {
            p.temp = t;
        }
        settle_temps(&mut self.gpu_temps);
    }

    pub fn is_valid(&self, max_rpm: i32) -> bool {
        let n = self.point_count();
        if !(MIN_POINTS..=MAX_POINTS).contains(&n) || self.gpu_temps.len() != n {
            return false;
        }
        let temps_ok = |temps: &[i32]| {
            temps.iter().all(|t| (MIN_TEMP..=MAX_TEMP).contains(t))
                && temps.windows(2).all(|w| w[0] < w[1])
        };
        temps_ok(&self.ramp_up(CurveKind::Cpu))
            && temps_ok(&self.gpu_temps)
            && self.cpu.iter().all(|p| (MIN_RPM..=max_rpm).contains(&p.rpm))
            && self.cpu.windows(2).all(|w| w[0].rpm <= w[1].rpm)
            && (MIN_HYSTERESIS..=MAX_HYSTERESIS).contains(&self.hysteresis)
    }

    /// Level the fan engine settles on when heating up to `temp`.
    pub fn level_at(&self, kind: CurveKind, temp: i32) -> usize {
        let temps = self.ramp_up(kind);
        temps.iter().rposition(|&t| t <= temp).unwrap_or(0)
    }

    pub fn target_rpm(&self, kind: CurveKind, temp: i32) -> i32 {
        let level = self.level_at(kind, temp);
        self.cpu.get(level).map(|p| p.rpm).unwrap_or(MIN_RPM)
    }
}

/// Rounds to the nearest `RPM_STEP`.
pub fn snap_rpm(rpm: i32) -> i32 {
    ((rpm + RPM_STEP / 2).div_euclid(RPM_STEP)) * RPM_STEP
}

/// Forces a temperature sequence into `[MIN_TEMP, MAX_TEMP]`, strictly increasing.
pub(crate) fn settle_temps(temps: &mut [i32]) {
    if temps.is_empty() {
        return;
    }
    for t in temps.iter_mut() {
        *t = (*t).clamp(MIN_TEMP, MAX_TEMP);
    }
    for j in 1..temps.len() {
        if temps[j] <= temps[j - 1] {
            temps[j] = temps[j - 1] + 1;
        }
    }
    let last = temps.len() - 1;
    if temps[last] > MAX_TEMP {
        temps[last] = MAX_TEMP;
        for j in (0..last).rev() {
            if temps[j] >= temps[j + 1] {
                temps[j] = temps[j + 1] - 1;
            }
        }
    }
}
