//! A synchronous client for the Helper's unix-socket protocol, used by the
//! Supervisor and API layer when they need a privileged read (`spec.md`
//! §4.4: "a small `HelperClient` ... for the Supervisor's/API's own use").

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};
use uuid::Uuid;

use super::error::HelperError;
use super::protocol::HelperResponse;

#[derive(Debug, Clone)]
pub struct HelperClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl HelperClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(5),
        }
    }

    fn call(&self, operation: &str, params: Value) -> Result<Value, HelperError> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|err| HelperError::Unreachable(err.to_string()))?;
        stream.set_read_timeout(Some(self.timeout)).ok();
        stream.set_write_timeout(Some(self.timeout)).ok();

        let request = json!({
            "request_id": Uuid::new_v4().to_string(),
            "operation": operation,
            "params": params,
        });
        let line = serde_json::to_string(&request).map_err(|err| HelperError::InvalidParams(err.to_string()))?;
        stream
            .write_all(line.as_bytes())
            .and_then(|_| stream.write_all(b"\n"))
            .map_err(|err| HelperError::Unreachable(err.to_string()))?;

        let mut reader = BufReader::new(stream);
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .map_err(|err| HelperError::Unreachable(err.to_string()))?;

        let response: HelperResponse = serde_json::from_str(&response_line)
            .map_err(|err| HelperError::Unreachable(format!("malformed helper response: {err}")))?;

        if response.success {
            Ok(response.data.unwrap_or(Value::Null))
        } else {
            Err(HelperError::InvalidParams(response.error.unwrap_or_default()))
        }
    }

    pub fn read_file(&self, path: &Path) -> Result<Value, HelperError> {
        self.call("read-file", json!({ "path": path.display().to_string() }))
    }

    pub fn list_dir(&self, path: &Path) -> Result<Value, HelperError> {
        self.call("list-dir", json!({ "path": path.display().to_string() }))
    }

    pub fn read_proc_net(&self, path: &Path) -> Result<Value, HelperError> {
        self.call("read-proc-net", json!({ "path": path.display().to_string() }))
    }

    pub fn check_port(&self, port: u16) -> Result<bool, HelperError> {
        let data = self.call("check-port", json!({ "port": port }))?;
        data.get("in_use")
            .and_then(Value::as_bool)
            .ok_or_else(|| HelperError::InvalidParams("response missing `in_use`".to_string()))
    }

    pub fn read_process_info(&self, pid: u32) -> Result<Value, HelperError> {
        self.call("read-process-info", json!({ "pid": pid }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::allowlist::Allowlist;
    use super::super::server::handle_connection;
    use super::*;
    use std::os::unix::net::UnixListener;
    use std::thread;

    #[test]
    fn client_round_trips_with_the_server() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("helper.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            handle_connection(stream, &Allowlist::default());
        });

        let client = HelperClient::new(&socket_path);
        let in_use = client.check_port(70000);
        // port 70000 is out of range, so the server reports a validation error
        assert!(in_use.is_err());

        server.join().unwrap();
    }

    #[test]
    fn unreachable_socket_reports_an_error() {
        let client = HelperClient::new("/tmp/this-socket-does-not-exist.sock");
        assert!(client.check_port(80).is_err());
    }
}
