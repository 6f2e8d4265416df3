/*
 * Integration tests for Legionfan
 *
 * These tests drive the public API the way the editor and the service do:
 * decode a curve file, edit it, write it back.
 */

use legionfan::codec::{decode, encode};
use legionfan::curves::{
    CurveKind, CurvePoint, FanProfile, DEFAULT_RPM_POINTS, MAX_POINTS, MAX_TEMP, MIN_POINTS, MIN_RPM, MIN_TEMP,
    NORMAL_MAX_RPM,
};
use legionfan::editor::{CurveEditor, EditLimits, EditSession, PointRef, SessionEvent, Viewport};
use legionfan::error::FanError;
use legionfan::profiles::{Profile, ProfileStore};
use legionfan::settings::{JsonSettingsStore, Settings, SettingsStore};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

// Test utilities
fn chain_profile() -> FanProfile {
    FanProfile::from_points(
        vec![
            CurvePoint::new(30, 1000),
            CurvePoint::new(45, 1500),
            CurvePoint::new(45, 1500),
            CurvePoint::new(60, 3000),
            CurvePoint::new(65, 3900),
        ],
        vec![30, 50, 55, 60, 63],
    )
    .unwrap()
}

fn rpm_levels(profile: &FanProfile) -> Vec<i32> {
    profile.cpu_points().iter().map(|p| p.rpm).collect()
}

fn assert_invariants(profile: &FanProfile, max_rpm: i32) {
    for kind in [CurveKind::Cpu, CurveKind::Gpu] {
        let temps = profile.ramp_up(kind);
        assert!(temps.windows(2).all(|w| w[0] < w[1]), "{:?} temps {:?}", kind, temps);
        assert!(temps.iter().all(|t| (MIN_TEMP..=MAX_TEMP).contains(t)));
    }
    let rpm = rpm_levels(profile);
    assert!(rpm.windows(2).all(|w| w[0] <= w[1]), "rpm {:?}", rpm);
    assert!(rpm.iter().all(|r| (MIN_RPM..=max_rpm).contains(r)));
    assert!((MIN_POINTS..=MAX_POINTS).contains(&profile.point_count()));
}

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: i32) -> i32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) % bound as u64) as i32
    }
}

#[test]
fn test_drag_moves_equal_level_run() {
    let editor = CurveEditor::default();
    let mut profile = chain_profile();
    editor.drag(&mut profile, PointRef::new(CurveKind::Cpu, 1), 45, 2000).unwrap();
    assert_eq!(rpm_levels(&profile), vec![1000, 2000, 2000, 3000, 3900]);

    editor.drag(&mut profile, PointRef::new(CurveKind::Cpu, 1), 45, 3500).unwrap();
    assert_eq!(rpm_levels(&profile), vec![1000, 3000, 3000, 3000, 3900]);
}

#[test]
fn test_decode_encode_is_idempotent() {
    let text = "legion_gen : 6\n\
                fan_curve_points : 4\n\
                fan_accl_value : 3\n\
                fan_deccl_value : 1\n\
                hysteresis : 4\n\
                fan_rpm_points : 1000 1800 2600 4000\n\
                cpu_temps_ramp_up : 40 52 64 78\n\
                cpu_temps_ramp_down : 1 1 1 1\n\
                gpu_temps_ramp_up : 38 50 61 72\n\
                gpu_temps_ramp_down : 1 1 1 1\n";
    let first = decode(text);
    let encoded = encode(&first);
    let second = decode(&encoded);
    assert_eq!(first, second);
    assert_eq!(encode(&second), encoded);
    assert!(encoded.contains("cpu_temps_ramp_down : 36 48 60 74\n"));
    assert!(encoded.contains("hst_temps_ramp_up : 38 50 61 72\n"));
}

#[test]
fn test_missing_hysteresis_defaults() {
    let profile = decode(
        "legion_gen : 5\nfan_rpm_points : 1000 2000 3000\ncpu_temps_ramp_up : 40 55 70\ngpu_temps_ramp_up : 40 55 70\n",
    );
    assert_eq!(profile.hysteresis(), 3);
    assert_eq!(profile.legion_gen, 5);
    assert_eq!(rpm_levels(&profile), vec![1000, 2000, 3000]);
    assert_eq!(profile.ramp_down(CurveKind::Cpu), vec![37, 52, 67]);
}

#[test]
fn test_bad_rpm_token_uses_whole_default() {
    let profile = decode("fan_rpm_points : abc 100 200\ncpu_temps_ramp_up : 30 45 55 60 65\ngpu_temps_ramp_up : 30 50 55 60 63\n");
    assert_eq!(rpm_levels(&profile), DEFAULT_RPM_POINTS.to_vec());
}

#[test]
fn test_refused_edits_leave_profile_unchanged() {
    let editor = CurveEditor::default();

    let mut full = FanProfile::evenly_spaced(MAX_POINTS, NORMAL_MAX_RPM);
    let before = full.clone();
    assert!(matches!(editor.insert_point(&mut full), Err(FanError::LimitExceeded { max: 8 })));
    assert_eq!(full, before);

    let mut minimal = FanProfile::evenly_spaced(MIN_POINTS, NORMAL_MAX_RPM);
    let before = minimal.clone();
    assert!(matches!(editor.remove_point(&mut minimal), Err(FanError::MinimumRequired { min: 2 })));
    assert_eq!(minimal, before);
}

#[test]
fn test_random_edits_keep_invariants() {
    let mut rng = Lcg(0x5eed);
    for max_rpm in [NORMAL_MAX_RPM, 5000] {
        let editor = CurveEditor::new(EditLimits {
            max_rpm,
            points_locked: false,
        });
        let mut profile = FanProfile::default();
        for _ in 0..2000 {
            let n = profile.point_count() as i32;
            let index = rng.next(n) as usize;
            let kind = if rng.next(2) == 0 { CurveKind::Cpu } else { CurveKind::Gpu };
            let cpu_before = profile.cpu_points().to_vec();
            match rng.next(10) {
                0 => {
                    let _ = editor.insert_point(&mut profile);
                }
                1 => {
                    let _ = editor.remove_point(&mut profile);
                }
                2 => {
                    editor
                        .set_point(&mut profile, PointRef::new(kind, index), rng.next(120), rng.next(6000))
                        .unwrap();
                }
                _ => {
                    let temp = rng.next(120) - 10;
                    let rpm = rng.next(6000);
                    editor.drag(&mut profile, PointRef::new(kind, index), temp, rpm).unwrap();
                    if kind == CurveKind::Gpu {
                        assert_eq!(profile.cpu_points(), cpu_before.as_slice());
                    }
                }
            }
            assert_invariants(&profile, max_rpm);
        }
    }
}

#[test]
fn test_session_drag_then_save() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(dir.path());
    let mut profile = store.load(Profile::Performance).unwrap();
    let editor = CurveEditor::default();
    let vp = Viewport::new(0.0, 0.0, 800.0, 340.0, NORMAL_MAX_RPM);
    let mut session = EditSession::new();

    let target = profile.point(CurveKind::Cpu, 3).unwrap();
    let (x, y) = vp.to_screen(target);
    assert_eq!(
        session.press(&profile, CurveKind::Cpu, &vp, x + 2.0, y),
        SessionEvent::Pressed(PointRef::new(CurveKind::Cpu, 3))
    );
    session.drag_to(&editor, &mut profile, &vp, x, y + 40.0).unwrap();
    assert!(matches!(session.release(), SessionEvent::DragFinished(_)));

    let moved = profile.point(CurveKind::Cpu, 3).unwrap();
    assert!(moved.rpm < target.rpm);
    store.save(Profile::Performance, &profile).unwrap();
    assert_eq!(store.load(Profile::Performance).unwrap(), profile);
    assert!(dir.path().join("fan_config_perfcust.txt").exists());
}

#[test]
fn test_unreadable_profile_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = ProfileStore::new(dir.path());
    fs::create_dir_all(store.path(Profile::Quiet)).unwrap();
    assert!(matches!(store.load(Profile::Quiet), Err(FanError::FileRead { .. })));
}

#[test]
#[serial]
fn test_settings_round_trip_through_xdg_config() {
    let dir = TempDir::new().unwrap();
    std::env::set_var("XDG_CONFIG_HOME", dir.path());

    let mut store = JsonSettingsStore::open_default();
    let mut settings = Settings::load(&store);
    assert!(settings.show_gpu_temp);
    settings.unlock_max_rpm = true;
    settings.fan_control_dir = Some(dir.path().join("helper"));
    settings.save(&mut store).unwrap();

    let reopened = JsonSettingsStore::open_default();
    assert_eq!(reopened.path(), dir.path().join("legionfan").join("settings.json"));
    assert_eq!(reopened.get("unlock_max_rpm"), Some(serde_json::Value::Bool(true)));
    let loaded = Settings::load(&reopened);
    assert_eq!(loaded.max_rpm(), 5000);
    assert_eq!(loaded.fan_control_dir(), dir.path().join("helper"));

    std::env::remove_var("XDG_CONFIG_HOME");
}
