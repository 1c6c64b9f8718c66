//! Process execution capability.
//!
//! Everything in this crate that touches another program goes through the
//! `ProcessExecutor` trait: run synchronously and capture stdout, or spawn
//! detached and forget. Spawn failures never surface as errors here - the
//! synchronous form yields an empty string and the detached form simply
//! does not run. Surfacing is a view-layer concern.

use std::process::{Command, Stdio};
use tracing::{debug, warn};

pub trait ProcessExecutor: Send + Sync {
    /// Run `program` with `args`, blocking, and return captured stdout.
    /// Any failure (missing binary, spawn error, non-UTF8 output) yields "".
    fn run_sync(&self, program: &str, args: &[&str]) -> String;

    /// Spawn `program` with `args` detached, stdout/stderr discarded.
    /// The caller does not await completion; failures are logged only.
    fn spawn_detached(&self, program: &str, args: &[&str]);
}

/// The real executor backed by `std::process::Command`.
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    fn run_sync(&self, program: &str, args: &[&str]) -> String {
        debug!(program = program, ?args, "run_sync");
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => String::from_utf8_lossy(&output.stdout).into_owned(),
            Err(e) => {
                warn!(program = program, error = %e, "run_sync spawn failed");
                String::new()
            }
        }
    }

    fn spawn_detached(&self, program: &str, args: &[&str]) {
        debug!(program = program, ?args, "spawn_detached");
        match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(_child) => {}
            Err(e) => {
                warn!(program = program, error = %e, "spawn_detached failed");
            }
        }
    }
}
