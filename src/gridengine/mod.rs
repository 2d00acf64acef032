// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Grid Engine integration: query qstat/qhost and reconcile jobs with hosts.
//!
//! Pipeline for one request:
//! - run both inspection commands concurrently ([`command`])
//! - repair and parse the XML ([`xml`])
//! - extract job and host records ([`jobs`], [`hosts`])
//! - join them and compute per-host metrics ([`reconcile`])

pub mod command;
pub mod hosts;
pub mod jobs;
pub mod reconcile;
pub mod types;
pub mod xml;

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::Result;
use crate::units::NaturalKey;
use command::{run_both, CommandRunner, GridCommand};
use reconcile::PresentationHost;

/// One reconciled view of the cluster
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Unix seconds when the listings were taken
    pub generated_at: u64,
    pub hosts: BTreeMap<NaturalKey, PresentationHost>,
}

impl StatusSnapshot {
    pub fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn job_count(&self) -> usize {
        self.hosts.values().map(|h| h.jobs.len()).sum()
    }
}

/// Query the scheduler through `runner` and build a fresh snapshot
pub async fn collect_status<R: CommandRunner>(runner: &R) -> Result<StatusSnapshot> {
    let generated_at = StatusSnapshot::now();
    let raw = run_both(runner).await?;

    let job_text = xml::prepare(GridCommand::JobListing, &raw.jobs);
    let host_text = xml::prepare(GridCommand::HostListing, &raw.hosts);
    let job_doc = xml::parse(GridCommand::JobListing, &job_text)?;
    let host_doc = xml::parse(GridCommand::HostListing, &host_text)?;

    let jobs = jobs::extract_jobs(&job_doc);
    let hosts = hosts::extract_hosts(&host_doc);
    tracing::debug!(jobs = jobs.len(), hosts = hosts.len(), "extracted listings");

    Ok(StatusSnapshot {
        generated_at,
        hosts: reconcile::reconcile(&jobs, &hosts),
    })
}

/// Canned listings for tests that need a whole snapshot
#[cfg(test)]
pub(crate) mod testing {
    use super::command::{CommandRunner, GridCommand};
    use crate::error::{GridError, Result};

    pub const QSTAT_XML: &[u8] = include_bytes!("testdata/qstat.xml");
    pub const QHOST_XML: &[u8] = include_bytes!("testdata/qhost.xml");

    /// Serves canned listings instead of running qstat/qhost
    pub struct FixtureRunner {
        pub jobs: std::result::Result<&'static [u8], &'static str>,
        pub hosts: std::result::Result<&'static [u8], &'static str>,
    }

    impl FixtureRunner {
        pub fn fixtures() -> Self {
            Self {
                jobs: Ok(QSTAT_XML),
                hosts: Ok(QHOST_XML),
            }
        }
    }

    impl CommandRunner for FixtureRunner {
        async fn run(&self, command: GridCommand) -> Result<Vec<u8>> {
            let canned = match command {
                GridCommand::JobListing => self.jobs,
                GridCommand::HostListing => self.hosts,
            };
            canned
                .map(<[u8]>::to_vec)
                .map_err(|reason| GridError::command(command.name(), reason))
        }
    }
}
