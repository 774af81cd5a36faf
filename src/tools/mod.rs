//! Subprocess execution for external collaborator tools.
//!
//! Every external tool the pipeline can shell out to — the legacy
//! decompiler/assembler pair and the external aligner — goes through one
//! [`run_tool`] wrapper, so every call site gets the same three-way failure
//! distinction (spawn failure, timeout, nonzero exit) instead of ad-hoc
//! handling. All invocations are blocking with an explicit deadline; a tool
//! that overruns it is killed and reported as a failed step, not a crash.

pub mod legacy;

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::debug;

use crate::error::ToolError;

/// Captured output of a successful tool run.
#[derive(Debug)]
pub struct ToolOutput {
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
}

/// Run `program` with `args`, waiting at most `timeout`.
///
/// # Errors
/// - [`ToolError::Spawn`] when the process cannot be started,
/// - [`ToolError::Timeout`] when the deadline passes (the process is killed),
/// - [`ToolError::Failed`] on a nonzero exit status, with captured stderr.
pub fn run_tool(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<ToolOutput, ToolError> {
    debug!("running: {program} {}", args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::Timeout {
                        program: program.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(source) => {
                let _ = child.kill();
                return Err(ToolError::Spawn {
                    program: program.to_string(),
                    source,
                });
            }
        }
    };

    let output = child
        .wait_with_output()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if !status.success() {
        return Err(ToolError::Failed {
            program: program.to_string(),
            status: status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr)
                .chars()
                .take(400)
                .collect(),
        });
    }

    Ok(ToolOutput {
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Locate `name` on `PATH`.
///
/// Only used to probe for optional external collaborators; their absence is
/// reported, never fatal.
#[must_use]
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failure() {
        let err = run_tool(
            "definitely-not-a-real-binary-name",
            &[],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[test]
    fn test_successful_run() {
        let output = run_tool("true", &[], Duration::from_secs(5)).unwrap();
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn test_nonzero_exit() {
        let err = run_tool("false", &[], Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ToolError::Failed { status: 1, .. }));
    }
}
