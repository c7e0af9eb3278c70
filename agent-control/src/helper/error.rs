//! The Helper's error taxonomy. Every variant is reported inside the
//! response envelope (`spec.md` §4.4: "every error is reported ...; the
//! helper never exits on a single bad request"); only malformed JSON
//! closes the connection, which `server.rs` handles before any
//! `HelperError` is constructed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelperError {
    #[error("unknown operation tag")]
    UnknownOperation,

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("path not allowed")]
    NotAllowed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no such process")]
    NoSuchProcess,

    #[error("the helper is unreachable: {0}")]
    Unreachable(String),
}
