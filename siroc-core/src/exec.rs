//! Shell command helpers.

use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use tracing::{error, info};

use crate::error::{Error, Result};

/// Trimmed result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Runs `command` through the shell in `cwd`, capturing its output.
///
/// Never fails: a command that cannot be spawned or exits non-zero yields
/// `success == false`. Unless `silent`, the outcome is logged.
pub fn exec(cwd: &Path, command: &str, silent: bool) -> ExecOutput {
    let output = shell(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();
    settle(cwd, command, output, silent)
}

/// Async variant of [`exec`] for use inside the build pipeline.
pub async fn exec_async(cwd: &Path, command: &str, silent: bool) -> ExecOutput {
    let mut cmd = tokio::process::Command::from(shell(command));
    let output = cmd
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;
    settle(cwd, command, output, silent)
}

fn settle(
    cwd: &Path,
    command: &str,
    output: std::io::Result<std::process::Output>,
    silent: bool,
) -> ExecOutput {
    let result = match output {
        Ok(output) => ExecOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        },
        Err(e) => ExecOutput {
            success: false,
            stdout: String::new(),
            stderr: e.to_string(),
        },
    };

    if !silent {
        if result.success {
            info!(cwd = %cwd.display(), "{} {}", command, result.stdout);
        } else {
            error!(cwd = %cwd.display(), "{} {}", command, result.stderr);
        }
    }

    result
}

/// Runs `command` with inherited stdio and waits for it.
pub async fn exec_interactive(cwd: &Path, command: &str) -> Result<ExitStatus> {
    let mut cmd = tokio::process::Command::from(shell(command));
    cmd.current_dir(cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    cmd.status().await.map_err(|e| Error::Command {
        command: command.to_string(),
        message: format!("Failed to spawn: {}", e),
    })
}
