//! Command handlers behind the `cnab` binary.
//!
//! Each handler takes its inputs explicitly (loader, layout selection, file
//! store, paths) and returns what the binary should print, so the commands
//! can be exercised without spawning a process.

pub mod commands;

pub use commands::{CliError, Layout, decode_file, encode_file, loader_for, show_tables};
