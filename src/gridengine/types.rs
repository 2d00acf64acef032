// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Normalized job and host records extracted from qstat/qhost XML.
//!
//! Scheduler-reported fields vary with the cluster configuration, so only the
//! fields the reconciler needs are typed. Everything else is kept in
//! string-keyed [`AttrValue`] maps.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

/// Grid Engine job number
pub type JobId = u32;

/// Account prefix used by tool (service) users
pub const TOOL_PREFIX: &str = "tools.";

/// Queue name reported for jobs submitted without a hard queue request
pub const MANUAL_QUEUE: &str = "(manual)";

/// A scheduler-reported value, numeric when the raw text is a number
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    /// Coerce raw text: integers first, then finite floats, else text
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return AttrValue::Int(i);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && !trimmed.is_empty() => AttrValue::Float(f),
            _ => AttrValue::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            AttrValue::Text(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(x) => write!(f, "{}", x),
            AttrValue::Text(s) => f.write_str(s),
        }
    }
}

/// Job state normalized from the raw qhost `job_state` code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Suspended,
    Deleting,
    Other(String),
}

impl JobState {
    /// Derive the state from a raw code such as `r`, `S`, `dr` or `t`.
    ///
    /// Markers are checked case-insensitively in the order R, s, d and each
    /// match overrides the previous one, so `Deleting` beats `Suspended`
    /// beats `Running`.
    pub fn from_code(code: &str) -> Self {
        let lower = code.to_ascii_lowercase();
        let mut state = JobState::Other(code.to_string());
        if lower.contains('r') {
            state = JobState::Running;
        }
        if lower.contains('s') {
            state = JobState::Suspended;
        }
        if lower.contains('d') {
            state = JobState::Deleting;
        }
        state
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::Running => "Running",
            JobState::Suspended => "Suspended",
            JobState::Deleting => "Deleting",
            JobState::Other(raw) => raw,
        }
    }
}

impl Serialize for JobState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A job from the qstat job listing
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub num: JobId,
    pub name: String,
    /// Submission time, seconds since the epoch
    pub submit: i64,
    pub owner: String,
    /// Owner without the `tools.` prefix
    pub tool: String,
    pub queue: String,
    /// Requested virtual memory in bytes, only if an `h_vmem` request exists
    pub h_vmem: Option<u64>,
    /// Scaled usage accounting (cpu, mem, io, vmem, maxvmem, wallclock, ...)
    pub usage: BTreeMap<String, i64>,
}

impl JobRecord {
    /// Split the tool name off a `tools.<name>` owner; other owners are kept as is
    pub fn tool_from_owner(owner: &str) -> String {
        owner.strip_prefix(TOOL_PREFIX).unwrap_or(owner).to_string()
    }
}

/// A job as seen from the host listing, before it is joined with its [`JobRecord`]
#[derive(Debug, Clone, PartialEq)]
pub struct HostJob {
    pub state: JobState,
    pub host: String,
    pub priority: Option<f64>,
    /// Remaining `jobvalue` entries, including the raw `job_state`
    pub attributes: BTreeMap<String, AttrValue>,
}

/// A host from the qhost listing
#[derive(Debug, Clone, PartialEq)]
pub struct HostRecord {
    /// Short host name (domain stripped)
    pub name: String,
    /// Total addressable virtual memory in bytes
    pub h_vmem: Option<u64>,
    /// `hostvalue` entries: load_avg, num_proc, mem_used, mem_total, ...
    pub attributes: BTreeMap<String, AttrValue>,
    pub jobs: BTreeMap<JobId, HostJob>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_value_coerce() {
        assert_eq!(AttrValue::coerce("4"), AttrValue::Int(4));
        assert_eq!(AttrValue::coerce(" 12 "), AttrValue::Int(12));
        assert_eq!(AttrValue::coerce("1.25"), AttrValue::Float(1.25));
        assert_eq!(AttrValue::coerce("7.8G"), AttrValue::Text("7.8G".to_string()));
        assert_eq!(AttrValue::coerce("-"), AttrValue::Text("-".to_string()));
        assert_eq!(AttrValue::coerce(""), AttrValue::Text(String::new()));
        assert_eq!(AttrValue::coerce("NaN"), AttrValue::Text("NaN".to_string()));
    }

    #[test]
    fn test_attr_value_serialization() {
        let json = serde_json::to_string(&vec![
            AttrValue::Int(3),
            AttrValue::Float(0.5),
            AttrValue::Text("lx-amd64".to_string()),
        ])
        .unwrap();
        assert_eq!(json, "[3,0.5,\"lx-amd64\"]");
    }

    #[test]
    fn test_job_state_single_codes() {
        assert_eq!(JobState::from_code("r"), JobState::Running);
        assert_eq!(JobState::from_code("R"), JobState::Running);
        assert_eq!(JobState::from_code("S"), JobState::Suspended);
        assert_eq!(JobState::from_code("s"), JobState::Suspended);
        assert_eq!(JobState::from_code("d"), JobState::Deleting);
        assert_eq!(JobState::from_code("t"), JobState::Other("t".to_string()));
        assert_eq!(JobState::from_code(""), JobState::Other(String::new()));
    }

    #[test]
    fn test_job_state_precedence() {
        assert_eq!(JobState::from_code("sd"), JobState::Deleting);
        assert_eq!(JobState::from_code("dr"), JobState::Deleting);
        assert_eq!(JobState::from_code("Rs"), JobState::Suspended);
        assert_eq!(JobState::from_code("rSd"), JobState::Deleting);
    }

    #[test]
    fn test_job_state_serializes_label() {
        assert_eq!(serde_json::to_string(&JobState::Running).unwrap(), "\"Running\"");
        assert_eq!(serde_json::to_string(&JobState::Other("t".into())).unwrap(), "\"t\"");
    }

    #[test]
    fn test_tool_from_owner() {
        assert_eq!(JobRecord::tool_from_owner("tools.stashbot"), "stashbot");
        assert_eq!(JobRecord::tool_from_owner("alice"), "alice");
        assert_eq!(JobRecord::tool_from_owner("tools"), "tools");
        assert_eq!(JobRecord::tool_from_owner("mytools.x"), "mytools.x");
    }
}
