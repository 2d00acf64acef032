// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Extract [`JobRecord`]s from `qstat -xml -j *` output.

use std::collections::BTreeMap;

use roxmltree::{Document, Node};

use super::types::{JobId, JobRecord, MANUAL_QUEUE};
use super::xml::{child, child_text, children, path, TASK_PLACEHOLDER};
use crate::error::{GridError, Result};

/// Resource request that carries the job's virtual memory limit
const VMEM_REQUEST: &str = "h_vmem";

/// Walk every `djob_info/element` into a map keyed by job number.
///
/// Elements that cannot be turned into a record are logged and skipped.
/// A job number seen twice keeps the later element.
pub fn extract_jobs(doc: &Document) -> BTreeMap<JobId, JobRecord> {
    let mut jobs = BTreeMap::new();
    let Some(info) = child(doc.root_element(), "djob_info") else {
        return jobs;
    };

    for element in children(info, "element") {
        match parse_job(element) {
            Ok(job) => {
                jobs.insert(job.num, job);
            }
            Err(e) => tracing::warn!(error = %e, "ignoring job entry"),
        }
    }
    jobs
}

fn parse_job(element: Node) -> Result<JobRecord> {
    let raw_num = child_text(element, "JB_job_number").unwrap_or("");
    let num: JobId = raw_num
        .trim()
        .parse()
        .map_err(|_| GridError::schema("job", format!("bad JB_job_number {:?}", raw_num)))?;

    let owner = child_text(element, "JB_owner").unwrap_or("").to_string();
    let queue = path(element, &["JB_hard_queue_list", "destin_ident_list", "QR_name"])
        .and_then(|n| n.text())
        .map(str::to_string)
        .unwrap_or_else(|| MANUAL_QUEUE.to_string());

    Ok(JobRecord {
        num,
        name: child_text(element, "JB_job_name").unwrap_or("").to_string(),
        submit: child_text(element, "JB_submission_time")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0),
        tool: JobRecord::tool_from_owner(&owner),
        owner,
        queue,
        h_vmem: requested_vmem(element),
        usage: scaled_usage(element),
    })
}

/// The `h_vmem` hard resource request in bytes, if the job made one
fn requested_vmem(element: Node) -> Option<u64> {
    let list = child(element, "JB_hard_resource_list")?;
    let mut vmem = None;
    for request in children(list, "qstat_l_requests") {
        if child_text(request, "CE_name").map(str::trim) == Some(VMEM_REQUEST) {
            vmem = child_text(request, "CE_doubleval")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v as u64);
        }
    }
    vmem
}

/// Flatten scaled usage from the array-task and the plain-job locations
fn scaled_usage(element: Node) -> BTreeMap<String, i64> {
    let mut usage = BTreeMap::new();
    let Some(tasks) = child(element, "JB_ja_tasks") else {
        return usage;
    };

    for location in [TASK_PLACEHOLDER, "ulong_sublist"] {
        let Some(list) = path(tasks, &[location, "JAT_scaled_usage_list"]) else {
            continue;
        };
        for scaled in children(list, "scaled") {
            let Some(name) = child_text(scaled, "UA_name").map(str::trim).filter(|n| !n.is_empty()) else {
                continue;
            };
            let value = child_text(scaled, "UA_value")
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .map(|v| v as i64)
                .unwrap_or(0);
            usage.insert(name.to_string(), value);
        }
    }
    usage
}
