//! The Privileged Helper (`spec.md` §4.4): an out-of-process, root-capable
//! binary serving a fixed, validated set of read operations over a
//! unix-domain socket, dropping to the invoking user's privileges once its
//! listening socket is open.

pub mod allowlist;
pub mod client;
pub mod error;
pub mod ops;
pub mod protocol;
pub mod server;

pub use allowlist::Allowlist;
pub use client::HelperClient;
pub use error::HelperError;
pub use protocol::{HelperRequest, HelperResponse, Operation};
