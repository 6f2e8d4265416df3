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

use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::layout::Rect;
use serde_json::json;

use crate::autostart::Autostart;
use crate::curves::{CurveKind, CurvePoint, FanProfile, MAX_HYSTERESIS, MIN_HYSTERESIS, RPM_STEP};
use crate::ec::{EcReader, SensorReadings, SensorSource};
use crate::editor::{CurveEditor, EditSession, PointRef, SessionEvent, Viewport};
use crate::error::FanError;
use crate::fancontrol::{FanControlProcess, HelperProcess};
use crate::logger;
use crate::power::{current_power_mode, PlatformProfile, PowerMode, PowerModeControl};
use crate::profiles::{Profile, ProfileStore};
use crate::settings::{JsonSettingsStore, Settings, SettingsStore};
use crate::ui;

pub const SETTING_ITEMS: [&str; 5] = [
    "Show GPU temperature",
    "Start minimized (service mode at login)",
    "Unlock max RPM (5000)",
    "Lock curve points",
    "Start at login",
];

pub const PARAM_ITEMS: [&str; 4] = ["Hysteresis", "Acceleration", "Deceleration", "Legion generation"];

const FIRST_RUN_WARNING: &str = "Custom fan curves can let the machine run hotter than the \
vendor defaults. Keep an eye on temperatures after every change.\n\nEnter: I understand";

pub struct App {
    pub last_refresh: Instant,
    pub refresh_interval: Duration,
    pub status: String,
    // collaborators
    pub settings: Settings,
    settings_store: Box<dyn SettingsStore>,
    power: Box<dyn PowerModeControl>,
    sensors: Option<Box<dyn SensorSource>>,
    helper: Box<dyn HelperProcess>,
    pub store: ProfileStore,
    pub autostart: Autostart,
    pub executable: PathBuf,
    // curve being edited
    pub editor: CurveEditor,
    pub session: EditSession,
    pub active: Profile,
    pub profile: FanProfile,
    pub mode: PowerMode,
    pub curve: CurveKind,
    pub selected: usize,
    pub dirty: bool,
    pub readings: Option<SensorReadings>,
    // last drawn terminal area, for mouse hit-testing
    pub screen: Rect,
    // direct point edit popup
    pub show_point_popup: bool,
    pub point_target: Option<PointRef>,
    pub point_temp_input: String,
    pub point_rpm_input: String,
    pub point_field: usize,
    // settings popup
    pub show_settings_popup: bool,
    pub settings_idx: usize,
    // profile parameter popup
    pub show_params_popup: bool,
    pub params_idx: usize,
    // generic warning popup
    pub show_warning_popup: bool,
    pub warning_message: String,
    pub show_first_run_popup: bool,
    pub show_quit_confirm: bool,
}

impl App {
    pub fn new(
        settings_store: Box<dyn SettingsStore>,
        power: Box<dyn PowerModeControl>,
        sensors: Option<Box<dyn SensorSource>>,
        helper: Box<dyn HelperProcess>,
        store: ProfileStore,
        autostart: Autostart,
    ) -> Self {
        let settings = Settings::load(&*settings_store);
        let mode = current_power_mode(&*power);
        let mut app = Self {
            last_refresh: Instant::now() - Duration::from_secs(10),
            refresh_interval: Duration::from_millis(1000),
            status: String::from(
                "←/→: point | ↑/↓: rpm | ,/.: temp | Enter: edit | a/x: add/remove | Tab: CPU/GPU | 1-3: profile | s: save | o: options | q: quit",
            ),
            editor: CurveEditor::new(settings.edit_limits()),
            show_first_run_popup: !settings.first_run_acknowledged,
            settings,
            settings_store,
            power,
            sensors,
            helper,
            store,
            autostart,
            executable: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("legionfan")),
            session: EditSession::new(),
            active: mode.profile(),
            profile: FanProfile::default(),
            mode,
            curve: CurveKind::Cpu,
            selected: 0,
            dirty: false,
            readings: None,
            screen: Rect::default(),
            show_point_popup: false,
            point_target: None,
            point_temp_input: String::new(),
            point_rpm_input: String::new(),
            point_field: 0,
            show_settings_popup: false,
            settings_idx: 0,
            show_params_popup: false,
            params_idx: 0,
            show_warning_popup: false,
            warning_message: String::new(),
            show_quit_confirm: false,
        };
        app.reload();
        app
    }

    /// Real collaborators: settings file, ACPI platform profile, EC ports.
    pub fn from_system() -> Self {
        let settings_store = JsonSettingsStore::open_default();
        let dir = Settings::load(&settings_store).fan_control_dir();
        let sensors: Option<Box<dyn SensorSource>> = match EcReader::open() {
            Ok(ec) => Some(Box::new(ec)),
            Err(e) => {
                logger::log_event("ec_unavailable", json!({ "error": e.to_string() }));
                None
            }
        };
        App::new(
            Box::new(settings_store),
            Box::new(PlatformProfile::default()),
            sensors,
            Box::new(FanControlProcess::new(&dir)),
            ProfileStore::new(dir),
            Autostart::default(),
        )
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warning_message = message.into();
        self.show_warning_popup = true;
    }

    fn report(&mut self, err: FanError) {
        logger::log_event("edit_error", json!({ "error": err.to_string() }));
        if err.is_edit_refusal() {
            self.warn(err.to_string());
        } else {
            self.status = format!("Error: {}", err);
        }
    }

    pub fn max_rpm(&self) -> i32 {
        self.settings.max_rpm()
    }

    pub fn selected_ref(&self) -> PointRef {
        PointRef::new(self.curve, self.selected)
    }

    pub fn selected_point(&self) -> Option<CurvePoint> {
        self.profile.point(self.curve, self.selected).ok()
    }

    pub fn viewport(&self) -> Viewport {
        ui::chart_viewport(self.screen, self.max_rpm())
    }

    // ------------------------------------------------------------------
    // profile lifecycle
    // ------------------------------------------------------------------

    fn load_limited(&self, profile: Profile) -> crate::error::Result<FanProfile> {
        let mut p = self.store.load(profile)?;
        p.limit_rpm(self.max_rpm());
        Ok(p)
    }

    fn commit(&mut self, profile: Profile, data: FanProfile) {
        self.active = profile;
        self.profile = data;
        self.dirty = false;
        self.selected = self.selected.min(self.profile.point_count() - 1);
        self.session.cancel();
    }

    /// Discards edits and reads the active profile from disk.
    pub fn reload(&mut self) {
        match self.load_limited(self.active) {
            Ok(p) => {
                self.commit(self.active, p);
                self.status = format!("Loaded {} profile", self.active);
            }
            Err(e) => self.status = format!("Error: {}", e),
        }
    }

    pub fn save(&mut self) {
        if let Err(e) = self.store.save(self.active, &self.profile) {
            self.status = format!("Error: {}", e);
            return;
        }
        self.dirty = false;
        match self.helper.restart() {
            Ok(()) => self.status = format!("Saved {} profile, fan control restarted", self.active),
            Err(e) => self.status = format!("Saved {} profile, but {}", self.active, e),
        }
    }

    pub fn restart_helper(&mut self) {
        self.status = match self.helper.restart() {
            Ok(()) => "Fan control restarted".to_string(),
            Err(e) => format!("Error: {}", e),
        };
    }

    pub fn stop_helper(&mut self) {
        if let Err(e) = self.helper.stop() {
            logger::log_event("helper_stop_error", json!({ "error": e.to_string() }));
        }
    }

    /// Loads `profile` and makes it the edited one. On failure the previous
    /// profile and its edits stay in place and the error is left in the
    /// status line.
    fn switch_to(&mut self, profile: Profile) -> bool {
        match self.load_limited(profile) {
            Ok(p) => {
                self.selected = 0;
                self.commit(profile, p);
                true
            }
            Err(e) => {
                logger::log_event("profile_switch_error", json!({ "profile": profile.name(), "error": e.to_string() }));
                self.status = format!("Error: cannot open {} profile: {}", profile, e);
                false
            }
        }
    }

    /// Requests the power mode for `profile`. The view follows even when the
    /// firmware refuses, so each file stays editable.
    pub fn select_profile(&mut self, profile: Profile) {
        let mode = PowerMode::for_profile(profile);
        let result = self.power.set_power_mode(mode);
        if result.is_ok() {
            self.mode = mode;
        }
        if !self.switch_to(profile) {
            return;
        }
        match result {
            Ok(()) => self.status = format!("Power mode set to {}", mode.label()),
            Err(e) => self.status = format!("Editing {} profile (power mode unchanged: {})", profile, e),
        }
    }

    /// Periodic poll: sensors and external power mode changes.
    pub fn refresh(&mut self) {
        self.last_refresh = Instant::now();
        if let Some(src) = self.sensors.as_mut() {
            match SensorReadings::read(&mut **src) {
                Ok(r) => self.readings = Some(r),
                Err(e) => {
                    self.readings = None;
                    self.status = format!("Sensor error: {}", e);
                }
            }
        }
        if let Ok(mode) = self.power.power_mode() {
            if mode != self.mode {
                self.mode = mode;
                if mode.profile() != self.active {
                    let discarded = self.dirty;
                    if self.switch_to(mode.profile()) {
                        self.status = if discarded {
                            format!("Power mode changed to {}, unsaved edits discarded", mode.label())
                        } else {
                            format!("Power mode changed to {}", mode.label())
                        };
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // curve editing
    // ------------------------------------------------------------------

    pub fn toggle_curve(&mut self) {
        self.curve = self.curve.other();
        self.session.cancel();
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.profile.point_count() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Keyboard drag of the selected point.
    pub fn nudge(&mut self, dtemp: i32, drpm: i32) {
        let Some(p) = self.selected_point() else { return };
        let rpm = if drpm == 0 { p.rpm } else { p.rpm + drpm.signum() * RPM_STEP };
        let point = self.selected_ref();
        match self.editor.drag(&mut self.profile, point, p.temp + dtemp, rpm) {
            Ok(()) => self.dirty = true,
            Err(e) => self.report(e),
        }
    }

    pub fn insert_point(&mut self) {
        match self.editor.insert_point(&mut self.profile) {
            Ok(idx) => {
                self.selected = idx;
                self.dirty = true;
            }
            Err(e) => self.report(e),
        }
    }

    pub fn remove_point(&mut self) {
        match self.editor.remove_point(&mut self.profile) {
            Ok(_) => {
                self.selected = self.selected.min(self.profile.point_count() - 1);
                self.dirty = true;
            }
            Err(e) => self.report(e),
        }
    }

    pub fn even_out(&mut self) {
        match self.editor.even_out(&mut self.profile) {
            Ok(()) => self.dirty = true,
            Err(e) => self.report(e),
        }
    }

    pub fn open_point_popup(&mut self, point: PointRef) {
        let Ok(p) = self.profile.point(point.kind, point.index) else { return };
        self.curve = point.kind;
        self.selected = point.index;
        self.point_target = Some(point);
        self.point_temp_input = p.temp.to_string();
        self.point_rpm_input = p.rpm.to_string();
        self.point_field = 0;
        self.show_point_popup = true;
    }

    pub fn close_point_popup(&mut self) {
        self.show_point_popup = false;
        self.point_target = None;
    }

    pub fn apply_point_popup(&mut self) {
        let Some(target) = self.point_target else {
            self.close_point_popup();
            return;
        };
        let (temp, rpm) = match (
            self.point_temp_input.trim().parse::<i32>(),
            self.point_rpm_input.trim().parse::<i32>(),
        ) {
            (Ok(t), Ok(r)) => (t, r),
            _ => {
                self.status = "Enter whole numbers for temperature and RPM".to_string();
                return;
            }
        };
        match self.editor.set_point(&mut self.profile, target, temp, rpm) {
            Ok(p) => {
                self.dirty = true;
                self.status = format!("{} point {} set to {}°C / {} RPM", target.kind.label(), target.index + 1, p.temp, p.rpm);
            }
            Err(e) => self.report(e),
        }
        self.close_point_popup();
    }

    // ------------------------------------------------------------------
    // mouse
    // ------------------------------------------------------------------

    pub fn mouse_down(&mut self, col: u16, row: u16) {
        let vp = self.viewport();
        if let SessionEvent::Pressed(point) =
            self.session.press(&self.profile, self.curve, &vp, col as f64, row as f64)
        {
            self.selected = point.index;
        }
    }

    pub fn mouse_drag(&mut self, col: u16, row: u16) {
        let vp = self.viewport();
        match self
            .session
            .drag_to(&self.editor, &mut self.profile, &vp, col as f64, row as f64)
        {
            Ok(SessionEvent::Dragged(_)) => self.dirty = true,
            Ok(_) => {}
            Err(e) => {
                self.session.cancel();
                self.report(e);
            }
        }
    }

    pub fn mouse_up(&mut self) {
        if let SessionEvent::Click(point) = self.session.release() {
            self.open_point_popup(point);
        }
    }

    // ------------------------------------------------------------------
    // settings and parameters
    // ------------------------------------------------------------------

    pub fn setting_value(&self, idx: usize) -> bool {
        match idx {
            0 => self.settings.show_gpu_temp,
            1 => self.settings.start_minimized,
            2 => self.settings.unlock_max_rpm,
            3 => self.settings.lock_points,
            _ => self.autostart.is_enabled(),
        }
    }

    pub fn toggle_setting(&mut self, idx: usize) {
        match idx {
            0 => self.settings.show_gpu_temp = !self.settings.show_gpu_temp,
            1 => self.settings.start_minimized = !self.settings.start_minimized,
            2 => self.settings.unlock_max_rpm = !self.settings.unlock_max_rpm,
            3 => self.settings.lock_points = !self.settings.lock_points,
            _ => {
                match self.autostart.toggle(&self.executable) {
                    Ok(true) => self.status = "Start at login enabled".to_string(),
                    Ok(false) => self.status = "Start at login disabled".to_string(),
                    Err(e) => self.status = format!("Error: {}", e),
                }
                return;
            }
        }
        self.editor.set_limits(self.settings.edit_limits());
        if idx == 2 {
            let before = self.profile.clone();
            self.profile.limit_rpm(self.max_rpm());
            if self.profile != before {
                self.dirty = true;
            }
        }
        self.persist_settings();
    }

    fn persist_settings(&mut self) {
        if let Err(e) = self.settings.save(&mut *self.settings_store) {
            self.status = format!("Error: {}", e);
        }
    }

    pub fn acknowledge_first_run(&mut self) {
        self.show_first_run_popup = false;
        self.settings.first_run_acknowledged = true;
        self.persist_settings();
    }

    pub fn first_run_text(&self) -> &'static str {
        FIRST_RUN_WARNING
    }

    pub fn param_value(&self, idx: usize) -> i32 {
        match idx {
            0 => self.profile.hysteresis(),
            1 => self.profile.acceleration,
            2 => self.profile.deceleration,
            _ => self.profile.legion_gen,
        }
    }

    pub fn adjust_param(&mut self, idx: usize, delta: i32) {
        let before = self.param_value(idx);
        match idx {
            0 => self.profile.set_hysteresis((before + delta).clamp(MIN_HYSTERESIS, MAX_HYSTERESIS)),
            1 => self.profile.acceleration = (before + delta).clamp(1, 10),
            2 => self.profile.deceleration = (before + delta).clamp(1, 10),
            _ => self.profile.legion_gen = (before + delta).clamp(1, 9),
        }
        if self.param_value(idx) != before {
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curves::NORMAL_MAX_RPM;
    use crate::ec::MockSensorSource;
    use crate::fancontrol::MockHelperProcess;
    use crate::power::MockPowerModeControl;
    use crate::settings::MemorySettingsStore;
    use std::fs;
    use tempfile::TempDir;

    fn app_with(power: MockPowerModeControl, helper: MockHelperProcess, dir: &TempDir) -> App {
        App::new(
            Box::new(MemorySettingsStore::new()),
            Box::new(power),
            None,
            Box::new(helper),
            ProfileStore::new(dir.path().join("fc")),
            Autostart::new(dir.path().join("autostart")),
        )
    }

    fn steady_power(mode: PowerMode) -> MockPowerModeControl {
        let mut power = MockPowerModeControl::new();
        power.expect_power_mode().returning(move || Ok(mode));
        power
    }

    #[test]
    fn test_starts_on_profile_for_power_mode() {
        let dir = TempDir::new().unwrap();
        let app = app_with(steady_power(PowerMode::Custom), MockHelperProcess::new(), &dir);
        assert_eq!(app.active, Profile::Performance);
        assert!(app.show_first_run_popup);
        assert!(!app.dirty);
        assert!(dir.path().join("fc").join("fan_config_perfcust.txt").exists());
    }

    #[test]
    fn test_save_restarts_helper() {
        let dir = TempDir::new().unwrap();
        let mut helper = MockHelperProcess::new();
        helper.expect_restart().times(1).returning(|| Ok(()));
        let mut app = app_with(steady_power(PowerMode::Quiet), helper, &dir);
        app.nudge(0, 1);
        assert!(app.dirty);
        app.save();
        assert!(!app.dirty);
        let text = fs::read_to_string(app.store.path(Profile::Quiet)).unwrap();
        assert!(text.contains("fan_rpm_points : 1050 1500 2200 3600 3900"));
    }

    #[test]
    fn test_insert_refusal_shows_warning() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(steady_power(PowerMode::Balanced), MockHelperProcess::new(), &dir);
        for _ in 0..3 {
            app.insert_point();
        }
        assert_eq!(app.profile.point_count(), 8);
        assert!(!app.show_warning_popup);
        app.insert_point();
        assert!(app.show_warning_popup);
        assert!(app.warning_message.contains("at most 8"));
    }

    #[test]
    fn test_external_mode_change_switches_profile() {
        let dir = TempDir::new().unwrap();
        let mut power = MockPowerModeControl::new();
        let mut seq = mockall::Sequence::new();
        power
            .expect_power_mode()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(PowerMode::Balanced));
        power
            .expect_power_mode()
            .returning(|| Ok(PowerMode::Quiet));
        let mut app = app_with(power, MockHelperProcess::new(), &dir);
        app.nudge(0, 1);
        assert!(app.dirty);
        app.refresh();
        assert_eq!(app.active, Profile::Quiet);
        assert!(!app.dirty);
        assert!(app.status.contains("discarded"));
    }

    #[test]
    fn test_select_profile_keeps_view_when_firmware_refuses() {
        let dir = TempDir::new().unwrap();
        let mut power = MockPowerModeControl::new();
        power.expect_power_mode().returning(|| Err(FanError::power_mode("absent")));
        power
            .expect_set_power_mode()
            .returning(|_| Err(FanError::power_mode("absent")));
        let mut app = app_with(power, MockHelperProcess::new(), &dir);
        assert_eq!(app.active, Profile::Balanced);
        app.select_profile(Profile::Quiet);
        assert_eq!(app.active, Profile::Quiet);
        assert!(app.status.contains("power mode unchanged"));
        app.refresh();
        assert_eq!(app.active, Profile::Quiet);
    }

    #[test]
    fn test_failed_switch_keeps_previous_profile() {
        let dir = TempDir::new().unwrap();
        let mut power = steady_power(PowerMode::Balanced);
        power.expect_set_power_mode().returning(|_| Ok(()));
        let mut helper = MockHelperProcess::new();
        helper.expect_restart().returning(|| Ok(()));
        let mut app = app_with(power, helper, &dir);
        app.nudge(0, 1);
        let edited = app.profile.clone();

        // a directory where the quiet file should be cannot be read
        fs::create_dir_all(app.store.path(Profile::Quiet)).unwrap();
        app.select_profile(Profile::Quiet);
        assert_eq!(app.active, Profile::Balanced);
        assert_eq!(app.profile, edited);
        assert!(app.dirty);
        assert!(app.status.starts_with("Error"));

        app.save();
        assert!(app.store.path(Profile::Quiet).is_dir());
        let text = fs::read_to_string(app.store.path(Profile::Balanced)).unwrap();
        assert!(text.contains("fan_rpm_points : 1050 1500 2200 3600 3900"));
    }

    #[test]
    fn test_point_popup_applies_direct_edit() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(steady_power(PowerMode::Balanced), MockHelperProcess::new(), &dir);
        app.open_point_popup(PointRef::new(CurveKind::Cpu, 1));
        app.point_temp_input = "50".to_string();
        app.point_rpm_input = "9999".to_string();
        app.apply_point_popup();
        assert!(!app.show_point_popup);
        // held below the next point's temperature and level
        assert_eq!(app.profile.point(CurveKind::Cpu, 1).unwrap(), CurvePoint::new(50, 2200));
    }

    #[test]
    fn test_lock_points_setting_blocks_nudges() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(steady_power(PowerMode::Balanced), MockHelperProcess::new(), &dir);
        app.toggle_setting(3);
        assert!(app.settings.lock_points);
        let before = app.profile.clone();
        app.nudge(1, 0);
        assert_eq!(app.profile, before);
        assert!(app.show_warning_popup);
    }

    #[test]
    fn test_locking_max_rpm_clamps_profile() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(steady_power(PowerMode::Balanced), MockHelperProcess::new(), &dir);
        app.toggle_setting(2);
        assert_eq!(app.max_rpm(), 5000);
        app.selected = 4;
        for _ in 0..30 {
            app.nudge(0, 1);
        }
        assert_eq!(app.selected_point().unwrap().rpm, 5000);
        app.toggle_setting(2);
        assert_eq!(app.selected_point().unwrap().rpm, NORMAL_MAX_RPM);
    }

    #[test]
    fn test_refresh_reads_sensors() {
        let dir = TempDir::new().unwrap();
        let mut src = MockSensorSource::new();
        src.expect_read_cpu_temp().returning(|| Ok(66));
        src.expect_read_gpu_temp().returning(|| Ok(51));
        src.expect_read_vrm_temp().returning(|| Ok(58));
        src.expect_read_fan1_rpm().returning(|| Ok(2800));
        src.expect_read_fan2_rpm().returning(|| Ok(0));
        let mut app = App::new(
            Box::new(MemorySettingsStore::new()),
            Box::new(steady_power(PowerMode::Balanced)),
            Some(Box::new(src)),
            Box::new(MockHelperProcess::new()),
            ProfileStore::new(dir.path()),
            Autostart::new(dir.path()),
        );
        app.refresh();
        assert_eq!(app.readings.unwrap().cpu_temp, 66);
        assert_eq!(app.readings.unwrap().vrm_temp, 58);
    }

    #[test]
    fn test_adjust_params() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with(steady_power(PowerMode::Balanced), MockHelperProcess::new(), &dir);
        app.adjust_param(0, 10);
        assert_eq!(app.profile.hysteresis(), 8);
        app.adjust_param(1, -5);
        assert_eq!(app.profile.acceleration, 1);
        assert!(app.dirty);
    }
}
