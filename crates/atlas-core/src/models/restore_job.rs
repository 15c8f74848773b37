use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryType {
    /// Restore into a target cluster from a snapshot.
    Automated,
    /// Produce a downloadable archive of the snapshot.
    Download,
    /// Restore a target cluster to a moment in time.
    PointInTime,
}

impl DeliveryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automated => "automated",
            Self::Download => "download",
            Self::PointInTime => "pointInTime",
        }
    }

    fn needs_target(self) -> bool {
        !matches!(self, Self::Download)
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body for starting a cloud backup restore job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreJobRequest {
    pub snapshot_id: String,
    pub delivery_type: DeliveryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cluster_name: Option<String>,
    #[serde(
        rename = "targetGroupId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_project_id: Option<String>,
    #[serde(
        rename = "pointInTimeUTCSeconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub point_in_time_utc_seconds: Option<i64>,
}

impl RestoreJobRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.snapshot_id.is_empty() {
            return Err(ValidationError::MissingField("snapshot_id"));
        }

        if self.delivery_type.needs_target() {
            let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
            if !has(&self.target_cluster_name) || !has(&self.target_project_id) {
                return Err(ValidationError::TargetRequired(self.delivery_type.as_str()));
            }
        }

        if self.delivery_type == DeliveryType::PointInTime
            && self.point_in_time_utc_seconds.is_none()
        {
            return Err(ValidationError::PointInTimeRequired);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

/// A restore job as the API reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreJob {
    pub id: String,
    #[serde(default)]
    pub snapshot_id: String,
    pub delivery_type: DeliveryType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_cluster_name: Option<String>,
    #[serde(rename = "targetGroupId", default, skip_serializing_if = "Option::is_none")]
    pub target_project_id: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub expired: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<jiff::Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<jiff::Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<jiff::Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<jiff::Timestamp>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl RestoreJob {
    /// A job that can no longer be cancelled: it was cancelled already,
    /// it expired, or it ran to completion.
    pub fn is_terminal(&self) -> bool {
        self.cancelled || self.expired || self.finished_at.is_some()
    }
}
