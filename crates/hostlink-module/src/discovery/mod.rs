//! Service discovery: is the service process alive?
//!
//! The service writes its pid to a well-known file. The probe reads it
//! and asks the OS whether that process exists.

use hostlink_core::env::{env_get_opt, keys};
use hostlink_core::ktrace;
use std::path::{Path, PathBuf};

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use unix::pid_alive;
    } else {
        mod other;
        use other::pid_alive;
    }
}

/// Liveness probe backed by a pid file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessProbe {
    pid_file: PathBuf,
}

impl ProcessProbe {
    pub fn new(pid_file: impl Into<PathBuf>) -> Self {
        Self {
            pid_file: pid_file.into(),
        }
    }

    /// Probe configured by `HLK_SERVICE_PID_FILE`, if set.
    pub fn from_env() -> Option<Self> {
        env_get_opt::<PathBuf>(keys::SERVICE_PID_FILE).map(Self::new)
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// The pid recorded in the file. `None` if missing or malformed.
    pub fn read_pid(&self) -> Option<i32> {
        let text = std::fs::read_to_string(&self.pid_file).ok()?;
        text.trim().parse::<i32>().ok().filter(|pid| *pid > 0)
    }

    pub fn is_alive(&self) -> bool {
        let Some(pid) = self.read_pid() else {
            ktrace!("discovery: no pid in {}", self.pid_file.display());
            return false;
        };
        let alive = pid_alive(pid);
        ktrace!("discovery: pid {} alive={}", pid, alive);
        alive
    }
}
