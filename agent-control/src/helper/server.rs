//! The Helper's accept loop (`spec.md` §4.4): one unix-domain socket, one
//! thread per accepted connection, line-delimited JSON request/response.
//! Follows the conventional one-thread-per-unit-of-work shape
//! (`utils::threads::spawn_named_thread`), generalized here to an accept
//! loop instead of a single fixed worker.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::allowlist::{Allowlist, MAX_PID};
use super::error::HelperError;
use super::ops;
use super::protocol::{HelperRequest, HelperResponse, Operation};
use crate::utils::threads::spawn_named_thread;

/// Brings the helper's listening socket up, drops root privileges down to
/// the invoking user (`SUDO_UID`/`SUDO_GID`), and serves connections until
/// the process exits. Never returns on success.
pub fn run(socket_path: impl AsRef<Path>) -> std::io::Result<()> {
    let socket_path = socket_path.as_ref();
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)?;
    info!(path = %socket_path.display(), "helper listening");

    drop_privileges();

    let allowlist = Arc::new(Allowlist::default());
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let allowlist = allowlist.clone();
                spawn_named_thread("helper-connection", move || handle_connection(stream, &allowlist));
            }
            Err(err) => warn!(error = %err, "failed to accept helper connection"),
        }
    }
    Ok(())
}

/// `spec.md` §4.4: "after opening the listening socket ... calls setgid
/// then setuid to the invoking user", read from `SUDO_UID`/`SUDO_GID`. A
/// no-op (with a warning) when the process was not invoked via `sudo` —
/// local development and test runs are not expected to run as root.
#[cfg(target_family = "unix")]
fn drop_privileges() {
    use nix::unistd::{setgid, setuid, Gid, Uid};

    let (Ok(uid), Ok(gid)) = (std::env::var("SUDO_UID"), std::env::var("SUDO_GID")) else {
        warn!("SUDO_UID/SUDO_GID not set; continuing with current privileges");
        return;
    };

    let (Ok(uid), Ok(gid)) = (uid.parse::<u32>(), gid.parse::<u32>()) else {
        warn!("SUDO_UID/SUDO_GID are not valid integers; continuing with current privileges");
        return;
    };

    if let Err(err) = setgid(Gid::from_raw(gid)) {
        error!(error = %err, "failed to drop group privileges");
        return;
    }
    if let Err(err) = setuid(Uid::from_raw(uid)) {
        error!(error = %err, "failed to drop user privileges");
        return;
    }
    info!(uid, gid, "dropped privileges to invoking user");
}

#[cfg(not(target_family = "unix"))]
fn drop_privileges() {}

pub(crate) fn handle_connection(stream: UnixStream, allowlist: &Allowlist) {
    let peer_stream = match stream.try_clone() {
        Ok(clone) => clone,
        Err(err) => {
            warn!(error = %err, "failed to clone helper connection");
            return;
        }
    };
    let mut writer = peer_stream;
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let Ok(line) = line else {
            debug!("helper connection closed (read error)");
            return;
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: HelperRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                // Malformed JSON closes the connection (spec.md §4.4).
                debug!(error = %err, "malformed helper request, closing connection");
                return;
            }
        };

        let response = dispatch(&request, allowlist);
        let Ok(payload) = serde_json::to_string(&response) else {
            error!("failed to serialize helper response");
            return;
        };
        if writer.write_all(payload.as_bytes()).is_err() || writer.write_all(b"\n").is_err() {
            debug!("helper connection closed (write error)");
            return;
        }
    }
}

fn dispatch(request: &HelperRequest, allowlist: &Allowlist) -> HelperResponse {
    match run_operation(request, allowlist) {
        Ok(data) => HelperResponse::ok(request.request_id.clone(), data),
        Err(err) => HelperResponse::err(request.request_id.clone(), err.to_string()),
    }
}

fn run_operation(request: &HelperRequest, allowlist: &Allowlist) -> Result<Value, HelperError> {
    let operation = Operation::from_tag(&request.operation).ok_or(HelperError::UnknownOperation)?;

    match operation {
        Operation::ReadFile => {
            let path = path_param(&request.params, "path")?;
            if !allowlist.permits(&path) {
                return Err(HelperError::NotAllowed);
            }
            ops::read_file(&path)
        }
        Operation::ListDir => {
            let path = path_param(&request.params, "path")?;
            if !allowlist.permits(&path) {
                return Err(HelperError::NotAllowed);
            }
            ops::list_dir(&path)
        }
        Operation::ReadProcNet => {
            let path = path_param(&request.params, "path")?;
            if !allowlist.permits_proc_net(&path) {
                return Err(HelperError::NotAllowed);
            }
            ops::read_proc_net(&path)
        }
        Operation::CheckPort => {
            let port = u16_param(&request.params, "port")?;
            ops::check_port(port)
        }
        Operation::ReadProcessInfo => {
            let pid = pid_param(&request.params)?;
            ops::read_process_info(pid)
        }
    }
}

fn path_param(params: &Value, name: &str) -> Result<PathBuf, HelperError> {
    let raw = params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| HelperError::InvalidParams(format!("missing string field `{name}`")))?;
    let path = PathBuf::from(raw);
    if !path.is_absolute() {
        return Err(HelperError::InvalidParams(format!("`{name}` must be an absolute path")));
    }
    // Lexical check only — `spec.md` §4.4 requires rejection "without
    // touching the filesystem", so this cannot be a `canonicalize()` call.
    // A `..`/`.` component would otherwise let `starts_with` on the
    // allow-list pass for a path that resolves outside it.
    use std::path::Component;
    if path.components().any(|c| matches!(c, Component::ParentDir | Component::CurDir)) {
        return Err(HelperError::NotAllowed);
    }
    Ok(path)
}

fn u16_param(params: &Value, name: &str) -> Result<u16, HelperError> {
    let value = params
        .get(name)
        .and_then(Value::as_u64)
        .ok_or_else(|| HelperError::InvalidParams(format!("missing integer field `{name}`")))?;
    u16::try_from(value).map_err(|_| HelperError::InvalidParams(format!("`{name}` out of range 1-65535")))
}

fn pid_param(params: &Value) -> Result<u32, HelperError> {
    let pid = params
        .get("pid")
        .and_then(Value::as_u64)
        .ok_or_else(|| HelperError::InvalidParams("missing integer field `pid`".to_string()))?;
    let pid = u32::try_from(pid).map_err(|_| HelperError::InvalidParams("`pid` out of range".to_string()))?;
    if pid == 0 || pid > MAX_PID {
        return Err(HelperError::InvalidParams(format!("`pid` must be in 1..={MAX_PID}")));
    }
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;
    use std::thread;

    fn roundtrip(request: &HelperRequest) -> HelperResponse {
        let allowlist = Allowlist::default();
        dispatch(request, &allowlist)
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let request = HelperRequest {
            request_id: "r1".to_string(),
            operation: "delete-file".to_string(),
            params: json!({}),
        };
        let response = roundtrip(&request);
        assert!(!response.success);
        assert_eq!(response.request_id, "r1");
        assert_eq!(response.error.as_deref(), Some("unknown operation tag"));
    }

    #[test]
    fn path_traversal_is_rejected_without_touching_the_filesystem() {
        let request = HelperRequest {
            request_id: "r2".to_string(),
            operation: "read-file".to_string(),
            params: json!({"path": "/etc/shadow"}),
        };
        let response = roundtrip(&request);
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("path not allowed"));
    }

    #[test]
    fn dotdot_traversal_out_of_an_allowed_directory_is_rejected() {
        let request = HelperRequest {
            request_id: "r2b".to_string(),
            operation: "read-file".to_string(),
            params: json!({"path": "/etc/nginx/../shadow"}),
        };
        let response = roundtrip(&request);
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("path not allowed"));
    }

    #[test]
    fn check_port_out_of_range_is_rejected_before_binding() {
        let request = HelperRequest {
            request_id: "r3".to_string(),
            operation: "check-port".to_string(),
            params: json!({"port": 70000}),
        };
        let response = roundtrip(&request);
        assert!(!response.success);
    }

    #[test]
    fn connection_over_unix_socket_echoes_request_id() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("helper.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let allowlist = Allowlist::default();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            handle_connection(stream, &allowlist);
        });

        let mut client = UnixStream::connect(&socket_path).unwrap();
        let request = json!({"request_id": "abc", "operation": "check-port", "params": {"port": 70000}});
        writeln!(client, "{}", request).unwrap();

        let mut reader = BufReader::new(client);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        let response: HelperResponse = serde_json::from_str(&line).unwrap();
        assert_eq!(response.request_id, "abc");
        assert!(!response.success);

        server.join().unwrap();
    }
}
