//! Resident memory measurement for progress reports.
//!
//! One `getrusage(RUSAGE_SELF)` call per progress tick (~200ns), far from any
//! hot path. The value is the process peak RSS, a high-water mark: it only
//! ever stays flat or grows.
//!
//! | Platform | `ru_maxrss` units | Supported |
//! |----------|-------------------|-----------|
//! | Linux / Android / BSDs | KiB | yes |
//! | macOS | bytes | yes |
//! | other | unknown | returns 0 |

/// Peak resident set size of this process in bytes, best effort.
///
/// Returns 0 when the measurement is unavailable so callers can skip the
/// field rather than print a value with unknown units.
#[cfg(unix)]
pub fn resident_memory_bytes() -> u64 {
    // SAFETY: a zeroed rusage is a valid out-parameter; the error return is
    // checked before any field is read.
    let ru = unsafe {
        let mut ru: libc::rusage = std::mem::zeroed();
        if libc::getrusage(libc::RUSAGE_SELF, &mut ru) != 0 {
            return 0;
        }
        ru
    };
    maxrss_to_bytes(ru.ru_maxrss)
}

#[cfg(not(unix))]
pub fn resident_memory_bytes() -> u64 {
    0
}

/// Convert `ru_maxrss` to bytes based on platform units.
#[cfg(unix)]
fn maxrss_to_bytes(ru_maxrss: libc::c_long) -> u64 {
    let raw = if ru_maxrss <= 0 { 0 } else { ru_maxrss as u64 };

    #[cfg(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    {
        raw.saturating_mul(1024)
    }

    #[cfg(target_os = "macos")]
    {
        raw
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "android",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly",
        target_os = "macos"
    )))]
    {
        let _ = raw;
        0
    }
}

/// Human-readable byte count for reports. Allocates; display only.
pub fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    if bytes >= GIB {
        format!("{:.2}GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2}MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2}KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{}B", bytes)
    }
}
