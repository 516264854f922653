//! Resource limiting for the child interpreter.
//!
//! The memory cap is an `RLIMIT_AS` ceiling installed in the child between
//! `fork` and `exec`. It is best effort: when the platform cannot apply it the
//! child runs without a ceiling and the caller logs a warning. That relaxed
//! guarantee is a known risk of running on such a platform.

use tokio::process::Command;

use crate::error::{Result, SandboxError};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Virtual memory ceiling applied to a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCap {
    bytes: u64,
}

impl MemoryCap {
    /// Create a cap from a megabyte count.
    pub fn from_megabytes(megabytes: u64) -> Result<Self> {
        megabytes
            .checked_mul(BYTES_PER_MB)
            .map(|bytes| Self { bytes })
            .ok_or_else(|| {
                SandboxError::ResourceLimitUnavailable(format!(
                    "{megabytes} MB does not fit in a byte count"
                ))
            })
    }

    /// The ceiling in bytes.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Check that the cap can be applied, clamping it to an inherited hard limit.
    ///
    /// An unprivileged process cannot raise its hard limit, so a lower inherited
    /// hard limit becomes the effective cap.
    #[cfg(unix)]
    pub fn fit_to_platform(self) -> Result<Self> {
        let bytes = libc::rlim_t::try_from(self.bytes).map_err(|_| {
            SandboxError::ResourceLimitUnavailable(format!(
                "{} bytes exceeds the platform rlimit range",
                self.bytes
            ))
        })?;

        let mut current = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: `current` is a valid, writable rlimit.
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_AS, &mut current) };
        if rc != 0 {
            return Err(SandboxError::ResourceLimitUnavailable(format!(
                "getrlimit(RLIMIT_AS) failed: {}",
                std::io::Error::last_os_error()
            )));
        }

        if current.rlim_max != libc::RLIM_INFINITY && current.rlim_max < bytes {
            tracing::debug!(
                requested = self.bytes,
                inherited = current.rlim_max as u64,
                "memory cap clamped to inherited hard limit"
            );
            return Ok(Self {
                bytes: current.rlim_max as u64,
            });
        }
        Ok(self)
    }

    #[cfg(not(unix))]
    pub fn fit_to_platform(self) -> Result<Self> {
        Err(SandboxError::ResourceLimitUnavailable(
            "address-space limits are not supported on this platform".to_string(),
        ))
    }
}

/// Child-side setup run between `fork` and `exec`.
///
/// Puts the child in its own process group so a timeout can kill everything it
/// started, and installs the memory cap when one is given. Only
/// async-signal-safe calls happen in the closure. The child inherits the
/// parent's limits, so a cap returned by [`MemoryCap::fit_to_platform`] only
/// lowers them and `setrlimit` cannot fail for lack of privilege. Any other
/// failure leaves the child uncapped instead of aborting the launch.
#[cfg(unix)]
pub fn configure_child(command: &mut Command, cap: Option<MemoryCap>) {
    let cap = cap.map(|c| c.bytes as libc::rlim_t);
    // SAFETY: the closure only calls setpgid and setrlimit, both async-signal-safe.
    unsafe {
        command.pre_exec(move || {
            libc::setpgid(0, 0);
            if let Some(bytes) = cap {
                let limit = libc::rlimit {
                    rlim_cur: bytes,
                    rlim_max: bytes,
                };
                libc::setrlimit(libc::RLIMIT_AS, &limit);
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub fn configure_child(_command: &mut Command, _cap: Option<MemoryCap>) {}

/// Kill the whole process group led by `pid`.
#[cfg(unix)]
pub fn kill_process_group(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: plain signal delivery; a stale group only yields ESRCH.
    let rc = unsafe { libc::kill(-pid, libc::SIGKILL) };
    if rc != 0 {
        tracing::debug!(
            pid,
            error = %std::io::Error::last_os_error(),
            "process group already gone"
        );
    }
}

#[cfg(not(unix))]
pub fn kill_process_group(_pid: u32) {}

/// Kills the process group of a spawned child when dropped.
///
/// `kill_on_drop` only reaches the group leader; this also takes down whatever
/// the child started, including when the execution future is cancelled.
#[derive(Debug)]
pub struct ProcessGroupGuard {
    pid: Option<u32>,
}

impl ProcessGroupGuard {
    /// Guard the group led by `pid`.
    pub fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_process_group(pid);
        }
    }
}
