//! Login shell detection.

use std::env;
use std::path::Path;

/// Lowercased basename of the user's login shell, e.g. `zsh`.
///
/// Prefers the passwd entry over `$SHELL`, which may be stale inside
/// nested sessions. Returns an empty string when neither is available.
pub fn login_shell_name() -> String {
    let shell = passwd_shell()
        .or_else(|| env::var("SHELL").ok())
        .unwrap_or_default();
    shell_basename(&shell)
}

pub fn shell_basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

#[cfg(unix)]
fn passwd_shell() -> Option<String> {
    use std::ffi::CStr;

    let mut buffer = vec![0 as libc::c_char; 4096];
    // SAFETY: passwd is plain old data, so an all-zero value is valid.
    let mut entry: libc::passwd = unsafe { std::mem::zeroed() };
    let mut result: *mut libc::passwd = std::ptr::null_mut();

    // SAFETY: every pointer refers to a live local; getpwuid_r writes at most
    // `buffer.len()` bytes into `buffer` and points entry's strings into it.
    let status = unsafe {
        libc::getpwuid_r(
            libc::getuid(),
            &mut entry,
            buffer.as_mut_ptr(),
            buffer.len(),
            &mut result,
        )
    };
    if status != 0 || result.is_null() || entry.pw_shell.is_null() {
        return None;
    }

    // SAFETY: pw_shell is non-null and NUL-terminated inside `buffer`, which
    // is still alive here.
    let shell = unsafe { CStr::from_ptr(entry.pw_shell) }
        .to_string_lossy()
        .into_owned();
    (!shell.is_empty()).then_some(shell)
}

#[cfg(not(unix))]
fn passwd_shell() -> Option<String> {
    None
}
