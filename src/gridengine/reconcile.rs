// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Join the job listing onto the host listing and compute per-host metrics.
//!
//! The host listing decides which jobs run where; the job listing only adds
//! metadata. A job the host listing reports but the job listing does not know
//! (it finished between the two queries) is left out rather than shown half
//! empty.

use std::collections::BTreeMap;

use serde::Serialize;

use super::types::{AttrValue, HostJob, HostRecord, JobId, JobRecord, JobState};
use crate::units::{parse_memory, NaturalKey};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Field names of [`PresentationJob`]; dynamic attributes never shadow them
const FIXED_JOB_FIELDS: [&str; 10] = [
    "num", "name", "submit", "owner", "tool", "queue", "h_vmem", "host", "state", "priority",
];

/// A running job with host-side and job-side data merged
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationJob {
    pub num: JobId,
    pub name: String,
    pub submit: i64,
    pub owner: String,
    pub tool: String,
    pub queue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h_vmem: Option<u64>,
    pub host: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    /// Host-side job values extended by the job's usage accounting
    #[serde(flatten)]
    pub extra: BTreeMap<String, AttrValue>,
}

/// Per-host view consumed by the renderers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationHost {
    /// Load average as a percentage of the host's processors
    pub load: i64,
    /// Used memory as a percentage of total memory
    pub mem: i64,
    /// Virtual memory not reserved by running jobs, in megabytes
    pub vmem: u64,
    pub jobs: BTreeMap<JobId, PresentationJob>,
}

/// Join both listings. Pure and deterministic.
pub fn reconcile(
    jobs: &BTreeMap<JobId, JobRecord>,
    hosts: &BTreeMap<String, HostRecord>,
) -> BTreeMap<NaturalKey, PresentationHost> {
    hosts
        .values()
        .map(|host| (NaturalKey::new(host.name.clone()), present_host(host, jobs)))
        .collect()
}

fn present_host(host: &HostRecord, jobs: &BTreeMap<JobId, JobRecord>) -> PresentationHost {
    let mut merged = BTreeMap::new();
    let mut reserved: u64 = 0;

    for (id, host_job) in &host.jobs {
        let Some(job) = jobs.get(id) else {
            tracing::debug!(host = %host.name, job = id, "job missing from job listing");
            continue;
        };
        reserved = reserved.saturating_add(job.h_vmem.unwrap_or(0));
        merged.insert(*id, merge_job(host_job, job));
    }

    let free = host.h_vmem.unwrap_or(0).saturating_sub(reserved);

    PresentationHost {
        load: load_percent(&host.attributes),
        mem: mem_percent(&host.attributes),
        vmem: free / BYTES_PER_MB,
        jobs: merged,
    }
}

/// `load_avg * 100 / num_proc`, truncated. A missing or zero processor count counts as 1.
pub fn load_percent(attributes: &BTreeMap<String, AttrValue>) -> i64 {
    let load_avg = attributes
        .get("load_avg")
        .and_then(AttrValue::as_f64)
        .unwrap_or(0.0);
    let procs = attributes
        .get("num_proc")
        .and_then(AttrValue::as_f64)
        .filter(|p| *p > 0.0)
        .unwrap_or(1.0);
    (load_avg * 100.0 / procs) as i64
}

/// `mem_used / mem_total * 100`, truncated. Unparseable values give 0.
pub fn mem_percent(attributes: &BTreeMap<String, AttrValue>) -> i64 {
    let memory = |key: &str, default: &str| {
        attributes
            .get(key)
            .map(|v| parse_memory(&v.to_string()))
            .unwrap_or_else(|| parse_memory(default))
    };
    let used = memory("mem_used", "0M");
    let total = memory("mem_total", "1M");
    if used < 0 || total <= 0 {
        return 0;
    }
    (used as f64 / total as f64 * 100.0) as i64
}

/// Host-side view as the base, job listing fields on top
fn merge_job(host_job: &HostJob, job: &JobRecord) -> PresentationJob {
    let mut extra = host_job.attributes.clone();
    for (name, value) in &job.usage {
        extra.insert(name.clone(), AttrValue::Int(*value));
    }
    extra.retain(|key, _| !FIXED_JOB_FIELDS.contains(&key.as_str()));

    PresentationJob {
        num: job.num,
        name: job.name.clone(),
        submit: job.submit,
        owner: job.owner.clone(),
        tool: job.tool.clone(),
        queue: job.queue.clone(),
        h_vmem: job.h_vmem,
        host: host_job.host.clone(),
        state: host_job.state.clone(),
        priority: host_job.priority,
        extra,
    }
}
