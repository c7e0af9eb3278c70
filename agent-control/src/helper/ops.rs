//! Operation implementations (`spec.md` §4.4 table). Each function takes
//! already-decoded parameters and returns the JSON payload for a
//! successful response; allow-list and parameter validation both happen
//! in [`super::server`] before any of these run, per the documented
//! request validation order.

use std::fs;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use serde_json::{json, Value};

use super::error::HelperError;
use crate::process_info;

pub fn read_file(path: &Path) -> Result<Value, HelperError> {
    let bytes = fs::read(path)?;
    let size = bytes.len();
    let content = String::from_utf8_lossy(&bytes).into_owned();
    Ok(json!({
        "path": path.display().to_string(),
        "content": content,
        "size": size,
    }))
}

pub fn list_dir(path: &Path) -> Result<Value, HelperError> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        entries.push(json!({
            "name": entry.file_name().to_string_lossy().into_owned(),
            "size": metadata.len(),
            "mode": metadata.mode(),
            "is_dir": metadata.is_dir(),
        }));
    }
    Ok(json!({ "entries": entries }))
}

pub fn read_proc_net(path: &Path) -> Result<Value, HelperError> {
    let content = fs::read_to_string(path)?;
    Ok(json!({ "content": content }))
}

pub fn check_port(port: u16) -> Result<Value, HelperError> {
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    let in_use = TcpListener::bind(addr).is_err();
    Ok(json!({ "in_use": in_use }))
}

pub fn read_process_info(pid: u32) -> Result<Value, HelperError> {
    let info = process_info::read(pid).map_err(|_| HelperError::NoSuchProcess)?;
    serde_json::to_value(info).map_err(|err| HelperError::InvalidParams(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_port_reports_a_free_port() {
        // Bind to port 0 first to find a genuinely free one, then release it.
        let probe = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let result = check_port(port).unwrap();
        assert_eq!(result["in_use"], false);
    }

    #[test]
    fn check_port_reports_a_bound_port_as_in_use() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = check_port(port).unwrap();
        assert_eq!(result["in_use"], true);
        drop(listener);
    }

    #[test]
    fn read_process_info_reports_the_current_process() {
        let pid = std::process::id();
        let result = read_process_info(pid).unwrap();
        assert_eq!(result["pid"], pid);
    }
}
