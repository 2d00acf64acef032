// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Extract [`HostRecord`]s from `qhost -xml -j -F h_vmem` output.

use std::collections::BTreeMap;

use roxmltree::{Document, Node};

use super::types::{AttrValue, HostJob, HostRecord, JobId, JobState};
use super::xml::children;
use crate::error::{GridError, Result};
use crate::units::parse_memory;

/// Pseudo-host qhost uses for cluster-wide values
pub const GLOBAL_HOST: &str = "global";

/// Resource requested from qhost with `-F`
const VMEM_RESOURCE: &str = "h_vmem";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Walk every `host` element into a map keyed by short host name.
pub fn extract_hosts(doc: &Document) -> BTreeMap<String, HostRecord> {
    let mut hosts = BTreeMap::new();

    for element in children(doc.root_element(), "host") {
        match parse_host(element) {
            Ok(Some(host)) => {
                hosts.insert(host.name.clone(), host);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "ignoring host entry"),
        }
    }
    hosts
}

/// Short name of a fully qualified host name
pub fn short_name(fqdn: &str) -> &str {
    fqdn.split_once('.').map_or(fqdn, |(short, _)| short)
}

/// Parse one host; `Ok(None)` for the `global` pseudo-host
fn parse_host(element: Node) -> Result<Option<HostRecord>> {
    let fqdn = element
        .attribute("name")
        .ok_or_else(|| GridError::schema("host", "missing name attribute"))?;
    let name = short_name(fqdn);
    if name == GLOBAL_HOST {
        return Ok(None);
    }
    if name.is_empty() {
        return Err(GridError::schema("host", format!("empty name in {:?}", fqdn)));
    }

    let attributes = children(element, "hostvalue")
        .filter_map(|hv| {
            let key = hv.attribute("name")?;
            Some((key.to_string(), AttrValue::coerce(hv.text().unwrap_or(""))))
        })
        .collect();

    let mut jobs = BTreeMap::new();
    for job in children(element, "job") {
        match parse_host_job(job, name) {
            Ok((id, host_job)) => {
                jobs.insert(id, host_job);
            }
            Err(e) => tracing::warn!(host = name, error = %e, "ignoring host job entry"),
        }
    }

    Ok(Some(HostRecord {
        name: name.to_string(),
        h_vmem: vmem_capacity(element),
        attributes,
        jobs,
    }))
}

/// The host's h_vmem capacity in bytes, `None` when absent or unparseable
fn vmem_capacity(element: Node) -> Option<u64> {
    let resource = children(element, "resourcevalue")
        .find(|rv| rv.attribute("name") == Some(VMEM_RESOURCE))
        .or_else(|| children(element, "resourcevalue").next())?;

    let megs = parse_memory(resource.text().unwrap_or(""));
    let bytes = u64::try_from(megs)
        .ok()
        .and_then(|megs| megs.checked_mul(BYTES_PER_MB));
    if bytes.is_none() {
        tracing::debug!(value = ?resource.text(), "unparseable h_vmem capacity");
    }
    bytes
}

fn parse_host_job(element: Node, host: &str) -> Result<(JobId, HostJob)> {
    let raw_id = element.attribute("name").unwrap_or("");
    let id: JobId = raw_id
        .trim()
        .parse()
        .map_err(|_| GridError::schema("host job", format!("bad job id {:?}", raw_id)))?;

    let mut attributes = BTreeMap::new();
    let mut priority = None;
    for jv in children(element, "jobvalue") {
        let Some(key) = jv.attribute("name") else {
            continue;
        };
        let raw = jv.text().unwrap_or("");
        if key == "priority" {
            priority = raw.trim().trim_matches('\'').parse::<f64>().ok();
        } else {
            attributes.insert(key.to_string(), AttrValue::coerce(raw));
        }
    }

    let state = match attributes.get("job_state") {
        Some(code) => JobState::from_code(&code.to_string()),
        None => JobState::Other(String::new()),
    };

    Ok((
        id,
        HostJob {
            state,
            host: host.to_string(),
            priority,
            attributes,
        },
    ))
}
