// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    /// The inspection command could not run, timed out, failed or printed nothing
    #[error("{command} failed: {reason}")]
    Command { command: String, reason: String },

    /// The command output was not XML, even after repair
    #[error("unparseable XML from {command}: {source}")]
    Parse {
        command: String,
        #[source]
        source: roxmltree::Error,
    },

    /// A single job or host element lacks something required to build it
    #[error("skipping {record}: {reason}")]
    Schema { record: String, reason: String },
}

impl GridError {
    pub fn command(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn schema(record: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            record: record.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GridError>;

/// Short correlation id tying a user-facing error to its log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorId(String);

impl ErrorId {
    pub fn new() -> Self {
        let hex = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}-{}", &hex[..8], &hex[hex.len() - 8..]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ErrorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Log a request-aborting error and return the id to show the user
pub fn report(err: &GridError) -> ErrorId {
    let id = ErrorId::new();
    tracing::error!(error_id = %id, error = %err, "grid status request failed");
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_id_format() {
        let id = ErrorId::new();
        let (head, tail) = id.as_str().split_once('-').unwrap();
        assert_eq!(head.len(), 8);
        assert_eq!(tail.len(), 8);
        assert!(id.as_str().chars().all(|c| c == '-' || c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_error_ids_differ() {
        assert_ne!(ErrorId::new(), ErrorId::new());
    }

    #[test]
    fn test_command_error_message() {
        let err = GridError::command("qhost", "timed out after 30s");
        assert_eq!(err.to_string(), "qhost failed: timed out after 30s");
    }
}
