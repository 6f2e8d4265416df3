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

//! Curve editing with constraint propagation.
//!
//! CPU points are elastic: a drag is clamped between its neighbours and
//! moves the whole RPM plateau the point sits on, in the direction of the
//! drag only. GPU points are rigid: a drag shoves the neighbours out of
//! the way. Every operation either applies fully or returns an error with
//! the profile untouched.

use crate::curves::{
    snap_rpm, CurveKind, CurvePoint, FanProfile, MAX_POINTS, MAX_TEMP, MIN_POINTS, MIN_RPM,
    MIN_TEMP, NORMAL_MAX_RPM,
};
use crate::error::{FanError, Result};

pub const HIT_RADIUS: f64 = 15.0;
pub const DRAG_THRESHOLD: f64 = 5.0;

/// User settings the editor has to respect.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EditLimits {
    pub max_rpm: i32,
    pub points_locked: bool,
}

impl Default for EditLimits {
    fn default() -> Self {
        Self {
            max_rpm: NORMAL_MAX_RPM,
            points_locked: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PointRef {
    pub kind: CurveKind,
    pub index: usize,
}

impl PointRef {
    pub fn new(kind: CurveKind, index: usize) -> Self {
        Self { kind, index }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CurveEditor {
    limits: EditLimits,
}

fn check_index(profile: &FanProfile, index: usize) -> Result<()> {
    let len = profile.point_count();
    if index >= len {
        return Err(FanError::IndexOutOfRange { index, len });
    }
    Ok(())
}

/// Clamp to the valid range and strictly between the neighbours.
fn clamp_between(temps: &[i32], index: usize, temp: i32) -> i32 {
    let mut t = temp.clamp(MIN_TEMP, MAX_TEMP);
    if index > 0 {
        t = t.max(temps[index - 1] + 1);
    }
    if index + 1 < temps.len() {
        t = t.min(temps[index + 1] - 1);
    }
    t
}

fn push_forward(temps: &mut [i32], from: usize) {
    for j in from + 1..temps.len() {
        if temps[j] > temps[j - 1] {
            break;
        }
        temps[j] = temps[j - 1] + 1;
    }
    let last = temps.len() - 1;
    if temps[last] > MAX_TEMP {
        temps[last] = MAX_TEMP;
        for j in (0..last).rev() {
            if temps[j] < temps[j + 1] {
                break;
            }
            temps[j] = temps[j + 1] - 1;
        }
    }
}

fn push_backward(temps: &mut [i32], from: usize) {
    for j in (0..from).rev() {
        if temps[j] < temps[j + 1] {
            break;
        }
        temps[j] = temps[j + 1] - 1;
    }
    if temps[0] < MIN_TEMP {
        temps[0] = MIN_TEMP;
        for j in 1..temps.len() {
            if temps[j] > temps[j - 1] {
                break;
            }
            temps[j] = temps[j - 1] + 1;
        }
    }
}

impl CurveEditor {
    pub fn new(limits: EditLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> EditLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: EditLimits) {
        self.limits = limits;
    }

    pub fn drag(&self, profile: &mut FanProfile, point: PointRef, temp: i32, rpm: i32) -> Result<()> {
        match point.kind {
            CurveKind::Cpu => self.drag_cpu(profile, point.index, temp, rpm),
            CurveKind::Gpu => self.drag_gpu(profile, point.index, temp),
        }
    }

    pub fn drag_cpu(&self, profile: &mut FanProfile, index: usize, temp: i32, rpm: i32) -> Result<()> {
        check_index(profile, index)?;
        if self.limits.points_locked {
            return Err(FanError::PointsLocked);
        }
        let max_rpm = self.limits.max_rpm;
        let temps = profile.ramp_up(CurveKind::Cpu);
        let new_temp = clamp_between(&temps, index, temp);
        let old_rpm = profile.cpu[index].rpm;
        // an unchanged level is not re-snapped
        let mut new_rpm = if rpm == old_rpm {
            old_rpm
        } else {
            snap_rpm(rpm.clamp(MIN_RPM, max_rpm)).clamp(MIN_RPM, max_rpm)
        };

        let points = &mut profile.cpu;
        let len = points.len();
        if new_rpm > old_rpm {
            let mut end = index;
            while end + 1 < len && points[end + 1].rpm == old_rpm {
                end += 1;
            }
            if end + 1 < len {
                new_rpm = new_rpm.min(points[end + 1].rpm);
            }
            for p in &mut points[index..=end] {
                p.rpm = new_rpm;
            }
        } else if new_rpm < old_rpm {
            let mut start = index;
            while start > 0 && points[start - 1].rpm == old_rpm {
                start -= 1;
            }
            if start > 0 {
                new_rpm = new_rpm.max(points[start - 1].rpm);
            }
            for p in &mut points[start..=index] {
                p.rpm = new_rpm;
            }
        }
        points[index].temp = new_temp;
        Ok(())
    }

    pub fn drag_gpu(&self, profile: &mut FanProfile, index: usize, temp: i32) -> Result<()> {
        check_index(profile, index)?;
        if self.limits.points_locked {
            return Err(FanError::PointsLocked);
        }
        let new_temp = temp.clamp(MIN_TEMP, MAX_TEMP);
        let temps = &mut profile.gpu_temps;
        let old_temp = temps[index];
        temps[index] = new_temp;
        if new_temp > old_temp {
            push_forward(temps, index);
        } else if new_temp < old_temp {
            push_backward(temps, index);
        }
        Ok(())
    }

    /// Splits the widest CPU gap. Returns the index of the new point.
    pub fn insert_point(&self, profile: &mut FanProfile) -> Result<usize> {
        if self.limits.points_locked {
            return Err(FanError::PointsLocked);
        }
        let n = profile.point_count();
        if n >= MAX_POINTS {
            return Err(FanError::LimitExceeded { max: MAX_POINTS });
        }
        let cpu = &profile.cpu;
        let mut k = 0;
        for i in 1..n - 1 {
            if cpu[i + 1].temp - cpu[i].temp > cpu[k + 1].temp - cpu[k].temp {
                k = i;
            }
        }
        let (a, b) = (cpu[k], cpu[k + 1]);
        let point = CurvePoint::new((a.temp + b.temp) / 2, (a.rpm + b.rpm) / 2);
        let gpu_temp = (profile.gpu_temps[k] + profile.gpu_temps[k + 1]) / 2;

        profile.cpu.insert(k + 1, point);
        profile.gpu_temps.insert(k + 1, gpu_temp);
        profile.settle_temps();
        Ok(k + 1)
    }

    /// Drops the middle point so both end anchors stay. Returns its index.
    pub fn remove_point(&self, profile: &mut FanProfile) -> Result<usize> {
        if self.limits.points_locked {
            return Err(FanError::PointsLocked);
        }
        let n = profile.point_count();
        if n <= MIN_POINTS {
            return Err(FanError::MinimumRequired { min: MIN_POINTS });
        }
        let index = n / 2;
        profile.cpu.remove(index);
        profile.gpu_temps.remove(index);
        Ok(index)
    }

    /// Direct numeric edit of one point. Unlike a drag nothing else moves,
    /// so the RPM is held between the neighbours instead of chaining.
    pub fn set_point(
        &self,
        profile: &mut FanProfile,
        point: PointRef,
        temp: i32,
        rpm: i32,
    ) -> Result<CurvePoint> {
        let index = point.index;
        check_index(profile, index)?;
        match point.kind {
            CurveKind::Cpu => {
                let temps = profile.ramp_up(CurveKind::Cpu);
                let new_temp = clamp_between(&temps, index, temp);
                let points = &mut profile.cpu;
                let mut new_rpm = rpm.clamp(MIN_RPM, self.limits.max_rpm);
                if index > 0 {
                    new_rpm = new_rpm.max(points[index - 1].rpm);
                }
                if index + 1 < points.len() {
                    new_rpm = new_rpm.min(points[index + 1].rpm);
                }
                points[index] = CurvePoint::new(new_temp, new_rpm);
            }
            CurveKind::Gpu => {
                let new_temp = clamp_between(&profile.gpu_temps, index, temp);
                profile.gpu_temps[index] = new_temp;
            }
        }
        profile.point(point.kind, index)
    }

    /// Replaces the curves with an evenly spaced set of the same size.
    pub fn even_out(&self, profile: &mut FanProfile) -> Result<()> {
        if self.limits.points_locked {
            return Err(FanError::PointsLocked);
        }
        let fresh = FanProfile::evenly_spaced(profile.point_count(), self.limits.max_rpm);
        profile.cpu = fresh.cpu;
        profile.gpu_temps = fresh.gpu_temps;
        Ok(())
    }
}

/// Maps between screen coordinates and curve values. The y axis grows downward.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub max_rpm: i32,
    pub hit_radius: f64,
    pub drag_threshold: f64,
}

impl Viewport {
    pub fn new(left: f64, top: f64, width: f64, height: f64, max_rpm: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            max_rpm,
            hit_radius: HIT_RADIUS,
            drag_threshold: DRAG_THRESHOLD,
        }
    }

    fn rpm_span(&self) -> f64 {
        (self.max_rpm - MIN_RPM).max(1) as f64
    }

    pub fn to_screen(&self, point: CurvePoint) -> (f64, f64) {
        let x = self.left + (point.temp - MIN_TEMP) as f64 / (MAX_TEMP - MIN_TEMP) as f64 * self.width;
        let y = self.top + self.height - (point.rpm - MIN_RPM) as f64 / self.rpm_span() * self.height;
        (x, y)
    }

    /// Screen position to `(temp, rpm)`, truncated and not yet clamped.
    pub fn to_value(&self, x: f64, y: f64) -> (i32, i32) {
        let temp = MIN_TEMP + ((x - self.left) / self.width * (MAX_TEMP - MIN_TEMP) as f64) as i32;
        let rpm = MIN_RPM + ((self.top + self.height - y) / self.height * self.rpm_span()) as i32;
        (temp, rpm)
    }

    /// Nearest point of `kind` within the hit radius.
    pub fn hit_test(&self, profile: &FanProfile, kind: CurveKind, x: f64, y: f64) -> Option<usize> {
        profile
            .points(kind)
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                let (px, py) = self.to_screen(p);
                (i, ((px - x).powi(2) + (py - y).powi(2)).sqrt())
            })
            .filter(|(_, d)| *d <= self.hit_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SessionState {
    Idle,
    Dragging {
        point: PointRef,
        origin: (f64, f64),
        moved: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    None,
    Pressed(PointRef),
    Dragged(PointRef),
    DragFinished(PointRef),
    /// Released without moving: open the direct editor for this point.
    Click(PointRef),
}

/// Pointer state machine on top of the editor.
#[derive(Clone, Debug)]
pub struct EditSession {
    state: SessionState,
}

impl Default for EditSession {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, SessionState::Dragging { .. })
    }

    pub fn press(
        &mut self,
        profile: &FanProfile,
        kind: CurveKind,
        viewport: &Viewport,
        x: f64,
        y: f64,
    ) -> SessionEvent {
        match viewport.hit_test(profile, kind, x, y) {
            Some(index) => {
                let point = PointRef::new(kind, index);
                self.state = SessionState::Dragging {
                    point,
                    origin: (x, y),
                    moved: false,
                };
                SessionEvent::Pressed(point)
            }
            None => {
                self.state = SessionState::Idle;
                SessionEvent::None
            }
        }
    }

    /// Applies the pointer position once it has left the movement threshold.
    /// Locked points never start moving, so their release becomes a click.
    pub fn drag_to(
        &mut self,
        editor: &CurveEditor,
        profile: &mut FanProfile,
        viewport: &Viewport,
        x: f64,
        y: f64,
    ) -> Result<SessionEvent> {
        let SessionState::Dragging { point, origin, moved } = self.state else {
            return Ok(SessionEvent::None);
        };
        if !moved {
            let travelled = ((x - origin.0).powi(2) + (y - origin.1).powi(2)).sqrt();
            if travelled < viewport.drag_threshold || editor.limits().points_locked {
                return Ok(SessionEvent::None);
            }
            self.state = SessionState::Dragging {
                point,
                origin,
                moved: true,
            };
        }
        let (temp, rpm) = viewport.to_value(x, y);
        editor.drag(profile, point, temp, rpm)?;
        Ok(SessionEvent::Dragged(point))
    }

    pub fn release(&mut self) -> SessionEvent {
        let event = match self.state {
            SessionState::Dragging { point, moved: true, .. } => SessionEvent::DragFinished(point),
            SessionState::Dragging { point, moved: false, .. } => SessionEvent::Click(point),
            SessionState::Idle => SessionEvent::None,
        };
        self.state = SessionState::Idle;
        event
    }

    pub fn cancel(&mut self) {
        self.state = SessionState::Idle;
    }
}
