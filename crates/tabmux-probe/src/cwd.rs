//! Working-directory probe for shell processes.

use std::path::PathBuf;

/// Current working directory of process `pid`, or `None` if it cannot be
/// determined (process gone, permission denied, no probe available).
#[cfg(target_os = "linux")]
pub fn probe_cwd(pid: u32) -> Option<PathBuf> {
    match std::fs::read_link(format!("/proc/{pid}/cwd")) {
        Ok(dir) => Some(dir),
        Err(e) => {
            log::debug!("cwd probe for pid {pid} failed: {e}");
            None
        }
    }
}

/// Current working directory of process `pid`, or `None` if it cannot be
/// determined (process gone, permission denied, `lsof` missing).
#[cfg(not(target_os = "linux"))]
pub fn probe_cwd(pid: u32) -> Option<PathBuf> {
    use std::process::Command;

    let output = Command::new("lsof")
        .args(["-a", "-p", &pid.to_string(), "-d", "cwd", "-Fn"])
        .output()
        .map_err(|e| log::warn!("failed to run lsof: {e}"))
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_lsof_cwd(&String::from_utf8_lossy(&output.stdout))
}

/// Extract the name field from `lsof -Fn` output.
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn parse_lsof_cwd(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix('n'))
        .filter(|name| !name.is_empty())
        .map(PathBuf::from)
}
