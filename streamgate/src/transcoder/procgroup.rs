//! Process-group control for spawned subprocesses.
//!
//! Both the transcoder and the local probe backend shell out to an external
//! executable that may itself spawn descendants (ffmpeg's filters, ffprobe
//! helpers). A single-process `kill()` leaves those descendants orphaned;
//! placing the child in its own process group and signalling the group
//! reaps the whole tree (§4.3, §4.8, §9 "Subprocess lifecycle with
//! signals").

use tokio::process::Command;

/// Put the spawned child in a new process group headed by itself
/// (`setpgid(0, 0)`), so a later group-signal doesn't also hit this process.
#[cfg(unix)]
pub fn set_new_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(|| {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub fn set_new_group(_command: &mut Command) {}

/// Send SIGKILL to every process in the group headed by `pgid`.
///
/// `pgid` equals the child's own pid, since [`set_new_group`] makes it its
/// own group leader; `killpg` addresses the whole group via a negative pid.
#[cfg(unix)]
pub fn kill_group(pgid: i32) {
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
pub fn kill_group(_pgid: i32) {}

/// Send SIGTERM (graceful) to every process in the group headed by `pgid`.
#[cfg(unix)]
pub fn terminate_group(pgid: i32) {
    unsafe {
        libc::killpg(pgid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
pub fn terminate_group(_pgid: i32) {}
