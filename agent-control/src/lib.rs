//! NRDOT-HOST agent control plane.
//!
//! This crate owns the four concerns described in the design: the
//! [`config`] engine that turns a user-authored document into a collector
//! configuration, the [`supervisor`] that owns the collector child process
//! lifecycle, the loopback-only [`api`] server, and the out-of-process
//! [`helper`] that performs a closed set of privileged read operations.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod event;
pub mod helper;
pub mod logging;
pub mod process_info;
pub mod runtime;
pub mod supervisor;
pub mod utils;
