//! Process liveness checks.
//!
//! Owns the only FFI calls in the crate.

#![allow(unsafe_code)]

#[cfg(not(any(unix, windows)))]
use tracing::warn;

/// PID of the calling process.
pub fn current_pid() -> u32 {
    std::process::id()
}

/// Check if a process with the given PID is alive.
///
/// # Platform Behavior
/// - **Linux/macOS**: Uses `kill(pid, 0)` signal check
/// - **Windows**: Uses `OpenProcess` with `PROCESS_QUERY_LIMITED_INFORMATION`
pub fn is_process_alive(pid: u32) -> bool {
    // 0 addresses the caller's process group on Unix and the idle process on
    // Windows; neither names a publisher.
    if pid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        let Ok(raw) = libc::pid_t::try_from(pid) else {
            return false;
        };
        // SAFETY: signal 0 performs only the existence and permission check;
        // no signal is delivered and no memory is touched.
        let rc = unsafe { libc::kill(raw, 0) };
        if rc == 0 {
            return true;
        }
        // EPERM means the process exists but belongs to another user.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(windows)]
    {
        use windows_sys::Win32::Foundation::CloseHandle;
        use windows_sys::Win32::System::Threading::{
            OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
        };

        // SAFETY: OpenProcess has no pointer arguments; a non-null handle is
        // owned here and closed exactly once.
        unsafe {
            let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
            if handle.is_null() {
                false
            } else {
                CloseHandle(handle);
                true
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        warn!("Process alive check not implemented for this platform");
        true
    }
}
