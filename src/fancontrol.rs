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

//! Lifecycle of the external fan control helper. The helper re-reads its
//! curve files only on start, so every save is followed by a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use serde_json::json;

use crate::error::{FanError, Result};
use crate::logger;

pub const HELPER_NAME: &str = "FanControl";

/// Kernel `comm` names are cut to 15 bytes.
const COMM_LEN: usize = 15;

#[cfg_attr(test, mockall::automock)]
pub trait HelperProcess {
    fn restart(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    fn is_running(&mut self) -> bool;
}

pub struct FanControlProcess {
    executable: PathBuf,
    proc_root: PathBuf,
    child: Option<Child>,
}

/// Pids under `proc_root` whose `comm` equals `name`, excluding ourselves.
pub fn find_pids_by_name(proc_root: &Path, name: &str) -> Vec<i32> {
    let own = std::process::id() as i32;
    let wanted: String = name.chars().take(COMM_LEN).collect();
    let Ok(entries) = fs::read_dir(proc_root) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|ent| {
            let pid: i32 = ent.file_name().to_str()?.parse().ok()?;
            let comm = fs::read_to_string(ent.path().join("comm")).ok()?;
            (pid != own && comm.trim_end() == wanted).then_some(pid)
        })
        .collect()
}

impl FanControlProcess {
    pub fn new(dir: &Path) -> Self {
        Self::with_executable(dir.join(HELPER_NAME))
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            proc_root: PathBuf::from("/proc"),
            child: None,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn process_name(&self) -> String {
        self.executable
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| HELPER_NAME.to_string())
    }

    /// Instances not started by us, e.g. left over from an earlier session.
    fn kill_strays(&self) -> usize {
        let pids = find_pids_by_name(&self.proc_root, &self.process_name());
        for pid in &pids {
            unsafe {
                libc::kill(*pid, libc::SIGTERM);
            }
        }
        pids.len()
    }
}

impl HelperProcess for FanControlProcess {
    fn restart(&mut self) -> Result<()> {
        self.stop()?;
        if !self.executable.is_file() {
            return Err(FanError::helper(format!(
                "{} not found",
                self.executable.display()
            )));
        }
        let dir = self.executable.parent().unwrap_or_else(|| Path::new("."));
        let child = Command::new(&self.executable)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                FanError::helper(format!("failed to start {}: {}", self.executable.display(), e))
            })?;
        logger::log_event(
            "helper_started",
            json!({ "path": self.executable.display().to_string(), "pid": child.id() }),
        );
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            // Already exited is fine
            let _ = child.kill();
            child.wait()?;
        }
        let killed = self.kill_strays();
        if killed > 0 {
            logger::log_event("helper_strays_killed", json!({ "count": killed }));
        }
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fake_proc(entries: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (pid, comm) in entries {
            let p = dir.path().join(pid);
            fs::create_dir_all(&p).unwrap();
            fs::write(p.join("comm"), format!("{}\n", comm)).unwrap();
        }
        fs::create_dir_all(dir.path().join("sys")).unwrap();
        dir
    }

    #[test]
    fn test_find_pids_by_name() {
        let proc_dir = fake_proc(&[("101", "FanControl"), ("102", "bash"), ("103", "FanControl")]);
        let mut pids = find_pids_by_name(proc_dir.path(), "FanControl");
        pids.sort();
        assert_eq!(pids, vec![101, 103]);
    }

    #[test]
    fn test_find_pids_truncates_long_names() {
        let proc_dir = fake_proc(&[("200", "LegionFanContro")]);
        assert_eq!(find_pids_by_name(proc_dir.path(), "LegionFanControlHelper"), vec![200]);
    }

    #[test]
    fn test_restart_missing_executable() {
        let dir = TempDir::new().unwrap();
        let mut helper = FanControlProcess::new(dir.path());
        helper.proc_root = dir.path().to_path_buf();
        assert!(matches!(helper.restart(), Err(FanError::Helper(_))));
        assert!(!helper.is_running());
    }

    #[test]
    #[serial]
    fn test_restart_and_stop() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("legionfan-test-helper");
        fs::write(&exe, "#!/bin/sh\nexec sleep 30\n").unwrap();
        fs::set_permissions(&exe, fs::Permissions::from_mode(0o755)).unwrap();

        let mut helper = FanControlProcess::with_executable(&exe);
        let empty_proc = fake_proc(&[]);
        helper.proc_root = empty_proc.path().to_path_buf();
        helper.restart().unwrap();
        assert!(helper.is_running());
        helper.restart().unwrap();
        assert!(helper.is_running());
        helper.stop().unwrap();
        assert!(!helper.is_running());
    }
}
