// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};

pub const DEFAULT_BIN_DIR: &str = "/usr/bin";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How the views are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Interactive status table
    Terminal,
    /// Print one JSON snapshot to stdout and exit
    Json,
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `qstat` and `qhost`
    pub bin_dir: PathBuf,
    /// Upper bound for a single command invocation
    pub timeout: Duration,
    pub mode: Mode,
    /// Log destination for the terminal view
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn new(
        bin_dir: PathBuf,
        timeout_secs: u64,
        json: bool,
        log_file: Option<PathBuf>,
    ) -> Result<Self> {
        if timeout_secs == 0 {
            bail!("timeout must be at least one second");
        }
        if bin_dir.as_os_str().is_empty() {
            bail!("bin dir must not be empty");
        }

        Ok(Self {
            bin_dir,
            timeout: Duration::from_secs(timeout_secs),
            mode: if json { Mode::Json } else { Mode::Terminal },
            log_file,
        })
    }
}
