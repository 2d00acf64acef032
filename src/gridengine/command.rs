// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Grid Engine CLI integration: the only place that spawns processes.
//!
//! Exactly two read-only inspection commands exist and their argument lists
//! are compile-time constants. No runtime input ever reaches a command line
//! and no shell is involved.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{GridError, Result};

/// The inspection commands gridstat knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridCommand {
    /// `qstat -xml -j *`: every job with its full detail
    JobListing,
    /// `qhost -xml -j -F h_vmem`: every host, its jobs and its h_vmem capacity
    HostListing,
}

impl GridCommand {
    pub fn name(self) -> &'static str {
        match self {
            GridCommand::JobListing => "qstat",
            GridCommand::HostListing => "qhost",
        }
    }

    pub fn args(self) -> &'static [&'static str] {
        match self {
            GridCommand::JobListing => &["-xml", "-j", "*"],
            GridCommand::HostListing => &["-xml", "-j", "-F", "h_vmem"],
        }
    }
}

/// Runs a [`GridCommand`] and returns its raw stdout
pub trait CommandRunner {
    fn run(&self, command: GridCommand) -> impl Future<Output = Result<Vec<u8>>>;
}

/// Runs the real scheduler binaries with a per-invocation timeout
#[derive(Debug, Clone)]
pub struct SystemRunner {
    bin_dir: PathBuf,
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            bin_dir: config.bin_dir.clone(),
            timeout: config.timeout,
        }
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, command: GridCommand) -> Result<Vec<u8>> {
        let program = self.bin_dir.join(command.name());
        let started = Instant::now();

        let pending = Command::new(&program)
            .args(command.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match timeout(self.timeout, pending).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(GridError::command(
                    command.name(),
                    format!("failed to execute {}: {}", program.display(), e),
                ))
            }
            Err(_) => {
                return Err(GridError::command(
                    command.name(),
                    format!("timed out after {:.1}s", self.timeout.as_secs_f64()),
                ))
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            return Err(GridError::command(
                command.name(),
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }
        if !stderr.trim().is_empty() {
            tracing::warn!(command = command.name(), stderr = %stderr.trim(), "command reported warnings");
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(GridError::command(command.name(), "empty output"));
        }

        tracing::debug!(
            command = command.name(),
            bytes = output.stdout.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );
        Ok(output.stdout)
    }
}

/// Raw output of one job listing and one host listing
#[derive(Debug, Clone)]
pub struct RawListings {
    pub jobs: Vec<u8>,
    pub hosts: Vec<u8>,
}

/// Run both listings concurrently; returns once both have finished
pub async fn run_both<R: CommandRunner>(runner: &R) -> Result<RawListings> {
    let (jobs, hosts) = tokio::join!(
        runner.run(GridCommand::JobListing),
        runner.run(GridCommand::HostListing)
    );
    Ok(RawListings {
        jobs: jobs?,
        hosts: hosts?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines_are_fixed() {
        assert_eq!(GridCommand::JobListing.name(), "qstat");
        assert_eq!(GridCommand::JobListing.args(), &["-xml", "-j", "*"]);
        assert_eq!(GridCommand::HostListing.name(), "qhost");
        assert_eq!(GridCommand::HostListing.args(), &["-xml", "-j", "-F", "h_vmem"]);
    }

    fn runner(bin_dir: PathBuf, timeout: Duration) -> SystemRunner {
        SystemRunner { bin_dir, timeout }
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_failure() {
        let r = runner(PathBuf::from("/nonexistent/gridstat-bin"), Duration::from_secs(1));
        let err = r.run(GridCommand::HostListing).await.unwrap_err();
        assert!(matches!(err, GridError::Command { ref command, .. } if command == "qhost"));
    }

    /// All scripted scenarios share one test so no script is written while
    /// another test is spawning processes.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_scripted_commands() {
        use std::os::unix::fs::PermissionsExt;

        fn write_script(dir: &std::path::Path, name: &str, body: &str) {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let base = std::env::temp_dir().join(format!("gridstat-test-{}", uuid::Uuid::new_v4()));
        let ok_dir = base.join("ok");
        let fail_dir = base.join("fail");
        let slow_dir = base.join("slow");
        let empty_dir = base.join("empty");
        for dir in [&ok_dir, &fail_dir, &slow_dir, &empty_dir] {
            std::fs::create_dir_all(dir).unwrap();
        }
        write_script(&ok_dir, "qstat", "echo '<detailed_job_info/>'; echo 'warning: slow master' >&2");
        write_script(&ok_dir, "qhost", "echo \"<qhost args='$*'/>\"");
        write_script(&fail_dir, "qhost", "echo 'error: commlib error' >&2; exit 1");
        write_script(&slow_dir, "qhost", "sleep 5; echo '<qhost/>'");
        write_script(&empty_dir, "qhost", "echo");

        let ok = runner(ok_dir, Duration::from_secs(5));
        let listings = run_both(&ok).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&listings.jobs).trim(), "<detailed_job_info/>");
        assert_eq!(
            String::from_utf8_lossy(&listings.hosts).trim(),
            "<qhost args='-xml -j -F h_vmem'/>"
        );

        let err = runner(fail_dir, Duration::from_secs(5))
            .run(GridCommand::HostListing)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("commlib error"));

        let started = Instant::now();
        let err = runner(slow_dir, Duration::from_millis(200))
            .run(GridCommand::HostListing)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));

        let err = runner(empty_dir, Duration::from_secs(5))
            .run(GridCommand::HostListing)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty output"));

        std::fs::remove_dir_all(&base).ok();
    }
}
