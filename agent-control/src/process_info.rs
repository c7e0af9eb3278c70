//! Shared process inspection (`spec.md` §1, §4.4: "a small process-info
//! reader used by both the Supervisor for self-observation and the
//! Privileged Helper's `read-process-info` operation"). Reads directly
//! from `/proc`, the same way an on-host supervisor inspects its child
//! without shelling out to `ps`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// `cmdline` is truncated to this many bytes (`spec.md` §4.4).
const CMDLINE_MAX_BYTES: usize = 4096;

#[derive(Debug, Error)]
pub enum ProcessInfoError {
    #[error("no such process: {0}")]
    NoSuchProcess(u32),
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: std::io::Error },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub state: String,
    pub cmdline: String,
    pub rss_kb: u64,
    pub vsize_kb: u64,
    pub uid: u32,
    pub gid: u32,
    pub threads: u32,
}

/// Reads `/proc/<pid>/{status,cmdline}` and assembles a [`ProcessInfo`].
/// Returns [`ProcessInfoError::NoSuchProcess`] if the directory has
/// disappeared (the process exited between validation and read).
pub fn read(pid: u32) -> Result<ProcessInfo, ProcessInfoError> {
    let proc_dir = format!("/proc/{pid}");
    if !Path::new(&proc_dir).is_dir() {
        return Err(ProcessInfoError::NoSuchProcess(pid));
    }

    let status = read_to_string(&format!("{proc_dir}/status"))?;
    let cmdline = read_cmdline(&format!("{proc_dir}/cmdline"))?;

    let mut state = String::new();
    let mut rss_kb = 0u64;
    let mut vsize_kb = 0u64;
    let mut uid = 0u32;
    let mut gid = 0u32;
    let mut threads = 0u32;

    for line in status.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key {
            "State" => state = value.split_whitespace().next().unwrap_or("").to_string(),
            "VmRSS" => rss_kb = parse_kb_field(value),
            "VmSize" => vsize_kb = parse_kb_field(value),
            "Uid" => uid = value.split_whitespace().next().and_then(|s| s.parse().ok()).unwrap_or(0),
            "Gid" => gid = value.split_whitespace().next().and_then(|s| s.parse().ok()).unwrap_or(0),
            "Threads" => threads = value.parse().unwrap_or(0),
            _ => {}
        }
    }

    Ok(ProcessInfo {
        pid,
        state,
        cmdline,
        rss_kb,
        vsize_kb,
        uid,
        gid,
        threads,
    })
}

fn parse_kb_field(value: &str) -> u64 {
    value
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

fn read_to_string(path: &str) -> Result<String, ProcessInfoError> {
    fs::read_to_string(path).map_err(|source| ProcessInfoError::Io {
        path: path.to_string(),
        source,
    })
}

fn read_cmdline(path: &str) -> Result<String, ProcessInfoError> {
    let bytes = fs::read(path).map_err(|source| ProcessInfoError::Io {
        path: path.to_string(),
        source,
    })?;
    let mut truncated = bytes;
    truncated.truncate(CMDLINE_MAX_BYTES);
    // cmdline is NUL-separated argv; render it the way a shell would echo it.
    Ok(String::from_utf8_lossy(&truncated).replace('\0', " ").trim().to_string())
}
