//! The helper's closed allow-list (`spec.md` §4.4): "initialized before
//! the accept loop and thereafter immutable". Covers the canonical
//! configuration directories/files of well-known database servers, web
//! servers, and message brokers, plus the fixed `/proc/net` set.

use std::path::{Path, PathBuf};

/// Directories and exact files a `read-file`/`list-dir` request may touch.
/// Canonical locations for the service families this agent is expected to
/// observe; deliberately small and explicit rather than derived from any
/// runtime signal, so it cannot be widened by a compromised request.
const ALLOWED_PATHS: &[&str] = &[
    "/etc/mysql",
    "/etc/postgresql",
    "/etc/nginx",
    "/etc/httpd",
    "/etc/apache2",
    "/etc/redis",
    "/etc/redis.conf",
    "/etc/rabbitmq",
    "/etc/kafka",
    "/etc/mongod.conf",
    "/etc/haproxy",
    "/etc/memcached.conf",
];

/// `spec.md` §4.4: `read-proc-net` is restricted to exactly these paths.
const ALLOWED_PROC_NET_PATHS: &[&str] = &[
    "/proc/net/tcp",
    "/proc/net/tcp6",
    "/proc/net/udp",
    "/proc/net/udp6",
];

/// The largest PID `read-process-info` will accept, matching the Linux
/// kernel's default `pid_max` ceiling.
pub const MAX_PID: u32 = 4_194_304;

#[derive(Debug, Clone)]
pub struct Allowlist {
    paths: Vec<PathBuf>,
    proc_net_paths: Vec<PathBuf>,
}

impl Default for Allowlist {
    fn default() -> Self {
        Self {
            paths: ALLOWED_PATHS.iter().map(PathBuf::from).collect(),
            proc_net_paths: ALLOWED_PROC_NET_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl Allowlist {
    /// Whether `path` is an allow-listed exact file, or lies under an
    /// allow-listed directory. Never touches the filesystem.
    pub fn permits(&self, path: &Path) -> bool {
        self.paths.iter().any(|allowed| path == allowed || path.starts_with(allowed))
    }

    pub fn permits_proc_net(&self, path: &Path) -> bool {
        self.proc_net_paths.iter().any(|allowed| path == allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permits_files_under_an_allowed_directory() {
        let list = Allowlist::default();
        assert!(list.permits(Path::new("/etc/nginx/nginx.conf")));
        assert!(list.permits(Path::new("/etc/nginx/conf.d/default.conf")));
    }

    #[test]
    fn permits_an_exact_allowed_file() {
        let list = Allowlist::default();
        assert!(list.permits(Path::new("/etc/redis.conf")));
    }

    #[test]
    fn rejects_paths_outside_the_allow_list() {
        let list = Allowlist::default();
        assert!(!list.permits(Path::new("/etc/shadow")));
        assert!(!list.permits(Path::new("/etc/nginxsomethingelse")));
        assert!(!list.permits(Path::new("/root/.ssh/id_rsa")));
    }

    #[test]
    fn proc_net_allows_only_the_fixed_set() {
        let list = Allowlist::default();
        assert!(list.permits_proc_net(Path::new("/proc/net/tcp")));
        assert!(!list.permits_proc_net(Path::new("/proc/net/arp")));
        assert!(!list.permits_proc_net(Path::new("/proc/net/tcp/extra")));
    }
}
