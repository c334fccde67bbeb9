//! The external viewer process.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::process::Stdio;

use tempfile::NamedTempFile;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{GtkwaveError, Result};

/// Captured output of a finished viewer process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` when killed by a signal.
    pub exit_code: Option<i32>,
}

/// Snapshot of a viewer process, used to describe it in errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessState {
    pub command: String,
    pub pid: Option<u32>,
    pub return_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<process cmd={:?} pid={:?} return_code={:?} stdout={:?} stderr={:?}>",
            self.command, self.pid, self.return_code, self.stdout, self.stderr
        )
    }
}

/// A running process whose output goes to temp files.
///
/// The child is killed when the handle is dropped, so every exit path tears
/// it down.
pub struct ViewerProcess {
    command: Vec<String>,
    child: Child,
    pid: Option<u32>,
    stdout: NamedTempFile,
    stderr: NamedTempFile,
    exit_code: Option<i32>,
    exited: bool,
}

impl ViewerProcess {
    /// Spawn `command`, pointing it at X display `display` if given.
    pub fn spawn(command: &[String], display: Option<&str>) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(GtkwaveError::SpawnFailed("empty command line".to_string()));
        };

        // Child gets its own handles; reads here must not move its offset.
        let stdout = NamedTempFile::new()?;
        let stderr = NamedTempFile::new()?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout.reopen()?))
            .stderr(Stdio::from(stderr.reopen()?))
            .kill_on_drop(true);
        if let Some(display) = display {
            cmd.env("DISPLAY", display);
        }

        let child = cmd
            .spawn()
            .map_err(|e| GtkwaveError::SpawnFailed(format!("{program}: {e}")))?;
        let pid = child.id();
        debug!(?pid, program = %program, "spawned process");

        Ok(Self {
            command: command.to_vec(),
            child,
            pid,
            stdout,
            stderr,
            exit_code: None,
            exited: false,
        })
    }

    /// Process id, if the process was started.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Check whether the process is still running.
    pub fn is_alive(&mut self) -> Result<bool> {
        if self.exited {
            return Ok(false);
        }
        match self.child.try_wait()? {
            Some(status) => {
                self.exited = true;
                self.exit_code = status.code();
                Ok(false)
            }
            None => Ok(true),
        }
    }

    /// Stdout written so far.
    pub fn stdout(&mut self) -> Result<String> {
        read_all(self.stdout.as_file_mut())
    }

    /// Stderr written so far.
    pub fn stderr(&mut self) -> Result<String> {
        read_all(self.stderr.as_file_mut())
    }

    /// Kill the process if it is still running, reap it and collect its output.
    pub async fn stop(mut self) -> Result<ProcessOutput> {
        if self.is_alive()? {
            self.child.kill().await?;
            self.exit_code = None;
            self.exited = true;
        }
        Ok(ProcessOutput {
            stdout: self.stdout()?,
            stderr: self.stderr()?,
            exit_code: self.exit_code,
        })
    }

    /// Describe the process for diagnostics.
    pub fn state(&mut self) -> Result<ProcessState> {
        self.is_alive()?;
        Ok(ProcessState {
            command: self.command.join(" "),
            pid: self.pid,
            return_code: self.exit_code,
            stdout: self.stdout()?,
            stderr: self.stderr()?,
        })
    }
}

fn read_all(file: &mut std::fs::File) -> Result<String> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn test_collects_output_after_exit() {
        let mut proc = ViewerProcess::spawn(&sh("echo out; echo err >&2; exit 3"), None).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        assert!(!proc.is_alive().unwrap());

        let output = proc.stop().await.unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_stop_kills_running_process() {
        let mut proc = ViewerProcess::spawn(&sh("echo started; sleep 30"), None).unwrap();
        assert!(proc.is_alive().unwrap());
        assert!(proc.pid().is_some());

        let output = proc.stop().await.unwrap();
        assert_eq!(output.exit_code, None);
    }

    #[tokio::test]
    async fn test_display_is_exported() {
        let proc = ViewerProcess::spawn(&sh("printf %s \"$DISPLAY\""), Some(":42")).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let output = proc.stop().await.unwrap();
        assert_eq!(output.stdout, ":42");
    }

    #[test]
    fn test_empty_command() {
        let err = ViewerProcess::spawn(&[], None).err().unwrap();
        assert!(matches!(err, GtkwaveError::SpawnFailed(_)));
    }

    #[test]
    fn test_state_display() {
        let state = ProcessState {
            command: "gtkwave a.vcd".to_string(),
            pid: Some(7),
            return_code: None,
            stdout: String::new(),
            stderr: "boom".to_string(),
        };
        let text = state.to_string();
        assert!(text.contains("gtkwave a.vcd"));
        assert!(text.contains("boom"));
    }
}
