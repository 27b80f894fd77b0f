//! Unix liveness check via `kill(pid, 0)`.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// ESRCH means gone; EPERM means it exists but belongs to someone else.
pub(super) fn pid_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
