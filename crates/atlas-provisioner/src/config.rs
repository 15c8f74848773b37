use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::convergence::WaitPolicy;
use crate::error::ProvisionerError;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

const MINUTE: Duration = Duration::from_secs(60);

/// Timeouts and backoff for every convergence loop.
///
/// Defaults track the propagation latency observed on the Atlas control
/// plane: access list changes can take tens of minutes to show up in
/// listings on busy projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    pub create: WaitPolicy,
    pub delete: WaitPolicy,
    pub read: WaitPolicy,
    /// Bounds one existence scan (the whole multi-page traversal).
    pub scan: WaitPolicy,
    /// Pause between consecutive page fetches inside a scan.
    #[serde(rename = "page_delay_ms", with = "millis")]
    pub page_delay: Duration,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        let short = WaitPolicy {
            timeout: 2 * MINUTE,
            delay: Duration::ZERO,
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
        };
        Self {
            config_version: CURRENT_VERSION,
            create: WaitPolicy {
                timeout: 45 * MINUTE,
                delay: Duration::from_secs(4),
                min_interval: Duration::from_secs(2),
                max_interval: Duration::from_secs(10),
            },
            delete: WaitPolicy {
                timeout: 45 * MINUTE,
                ..short
            },
            read: short,
            scan: short,
            page_delay: Duration::from_millis(500),
        }
    }
}

pub fn load_config(path: &Path) -> Result<ConvergenceConfig, ProvisionerError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ProvisionerError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: ConvergenceConfig = serde_json::from_value(migrated)?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(
    mut json: serde_json::Value,
    from_version: u32,
) -> Result<serde_json::Value, ProvisionerError> {
    if from_version > CURRENT_VERSION {
        return Err(ProvisionerError::Config(format!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION})"
        )));
    }

    // v0 → v1: add page_delay_ms (v0 fetched pages back to back)
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ProvisionerError::Config("config is not a JSON object".into()))?;
        obj.entry("page_delay_ms")
            .or_insert(serde_json::Value::Number(0.into()));
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (added page_delay_ms)");
    }

    Ok(json)
}

pub fn save_config(path: &Path, config: &ConvergenceConfig) -> Result<(), ProvisionerError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;

    let json = serde_json::to_string_pretty(&stamped)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;
    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

/// Serde adapter storing a `Duration` as whole milliseconds.
pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
