use std::thread::{self, JoinHandle};

/// Spawns a named OS thread, the way every long-running loop in this agent
/// (supervisor writer, helper connection handlers, API server thread) is
/// spawned, so a `ps`/panic backtrace on the host identifies which
/// subsystem it belongs to.
pub fn spawn_named_thread<F, T>(name: impl Into<String>, f: F) -> JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name.into())
        .spawn(f)
        .expect("failed to spawn OS thread")
}
