//! State-id codec.
//!
//! A managed resource is addressed by several natural-key fields (project,
//! entry, cluster, job). They are packed into one opaque string so the
//! caller can persist a single handle: fields are sorted by name, each is
//! rendered `name:base64(value)`, and the pairs are joined with `-`. The
//! standard base64 alphabet never produces `-` or `:`, so decoding is a
//! plain split.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

const PROJECT_ID: &str = "project_id";
const ENTRY: &str = "entry";
const CLUSTER_NAME: &str = "cluster_name";
const RESTORE_JOB_ID: &str = "snapshot_restore_job_id";

pub fn encode_state_id(fields: &BTreeMap<&str, &str>) -> String {
    fields
        .iter()
        .map(|(name, value)| format!("{name}:{}", STANDARD.encode(value)))
        .collect::<Vec<_>>()
        .join("-")
}

pub fn decode_state_id(id: &str) -> Result<BTreeMap<String, String>, CoreError> {
    if id.is_empty() {
        return Err(CoreError::invalid_id(id, "empty id"));
    }

    let mut fields = BTreeMap::new();
    for segment in id.split('-') {
        let (name, encoded) = segment
            .split_once(':')
            .ok_or_else(|| CoreError::invalid_id(id, format!("segment {segment:?} has no name")))?;
        let raw = STANDARD
            .decode(encoded)
            .map_err(|e| CoreError::invalid_id(id, format!("field {name}: {e}")))?;
        let value = String::from_utf8(raw)
            .map_err(|_| CoreError::invalid_id(id, format!("field {name} is not UTF-8")))?;
        if fields.insert(name.to_string(), value).is_some() {
            return Err(CoreError::invalid_id(id, format!("duplicate field {name}")));
        }
    }
    Ok(fields)
}

fn take(fields: &mut BTreeMap<String, String>, id: &str, name: &str) -> Result<String, CoreError> {
    fields
        .remove(name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::invalid_id(id, format!("missing {name}")))
}

/// Persisted handle for a project access list entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeId(String);

impl CompositeId {
    pub fn encode(project_id: &str, entry: &str) -> Self {
        Self(encode_state_id(&BTreeMap::from([
            (PROJECT_ID, project_id),
            (ENTRY, entry),
        ])))
    }

    /// Wrap a handle loaded from persisted state. Not validated until decoded.
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Split the handle back into `(project_id, entry)`.
    pub fn decode(&self) -> Result<(String, String), CoreError> {
        let mut fields = decode_state_id(&self.0)?;
        let project_id = take(&mut fields, &self.0, PROJECT_ID)?;
        let entry = take(&mut fields, &self.0, ENTRY)?;
        Ok((project_id, entry))
    }

    /// Parse the user-facing import form `{project_id}-{entry}`.
    ///
    /// Splits on the first `-` only; project ids never contain one, while
    /// security group ids (`sg-…`) do.
    pub fn parse_import(raw: &str) -> Result<(String, String), CoreError> {
        match raw.split_once('-') {
            Some((project_id, entry)) if !project_id.is_empty() && !entry.is_empty() => {
                Ok((project_id.to_string(), entry.to_string()))
            }
            _ => Err(CoreError::ImportFormat(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded address of a restore job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreJobAddr {
    pub project_id: String,
    pub cluster_name: String,
    pub job_id: String,
}

/// Persisted handle for a cloud backup restore job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestoreJobId(String);

impl RestoreJobId {
    pub fn encode(project_id: &str, cluster_name: &str, job_id: &str) -> Self {
        Self(encode_state_id(&BTreeMap::from([
            (PROJECT_ID, project_id),
            (CLUSTER_NAME, cluster_name),
            (RESTORE_JOB_ID, job_id),
        ])))
    }

    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn decode(&self) -> Result<RestoreJobAddr, CoreError> {
        let mut fields = decode_state_id(&self.0)?;
        Ok(RestoreJobAddr {
            project_id: take(&mut fields, &self.0, PROJECT_ID)?,
            cluster_name: take(&mut fields, &self.0, CLUSTER_NAME)?,
            job_id: take(&mut fields, &self.0, RESTORE_JOB_ID)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RestoreJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
