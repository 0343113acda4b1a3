//! Subprocess helpers shared by the sensor and load-generator adapters.

use std::process::{Command, Output, Stdio};

/// Check if a command exists by running `which`.
pub fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Execute a command and return its `Output` if it succeeds.
fn run_command_output(program: &str, args: &[&str]) -> Option<Output> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        log::debug!("`{program}` exited with {}", output.status);
        return None;
    }

    Some(output)
}

/// Run a subprocess and return its stdout as a `String`.
///
/// Returns `None` if the command fails to execute or exits with a non-zero
/// status.
pub fn run_command(program: &str, args: &[&str]) -> Option<String> {
    let output = run_command_output(program, args)?;
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists_rejects_nonsense() {
        assert!(!command_exists("energycycle-definitely-not-a-command"));
    }

    #[test]
    fn test_run_command_missing_program() {
        assert!(run_command("energycycle-definitely-not-a-command", &[]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_captures_stdout() {
        let out = run_command("echo", &["VDD_CORE_V"]).unwrap();
        assert_eq!(out.trim(), "VDD_CORE_V");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_nonzero_exit() {
        assert!(run_command("false", &[]).is_none());
    }
}
