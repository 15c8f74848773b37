use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The caller's intent for one project access list entry.
///
/// Exactly one of `cidr_block`, `ip_address` or `aws_security_group` must be
/// populated. An empty string counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesiredEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_security_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl DesiredEntry {
    pub fn cidr(cidr_block: impl Into<String>) -> Self {
        Self {
            cidr_block: Some(cidr_block.into()),
            ..Self::default()
        }
    }

    pub fn ip(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: Some(ip_address.into()),
            ..Self::default()
        }
    }

    pub fn security_group(group_id: impl Into<String>) -> Self {
        Self {
            aws_security_group: Some(group_id.into()),
            ..Self::default()
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Check the exactly-one-identifier invariant and the format of whichever
    /// identifier is set, returning the key the entry is addressed by.
    pub fn validate(&self) -> Result<EntryKey, ValidationError> {
        let set: Vec<(&'static str, &str)> = [
            ("cidr_block", &self.cidr_block),
            ("ip_address", &self.ip_address),
            ("aws_security_group", &self.aws_security_group),
        ]
        .into_iter()
        .filter_map(|(name, value)| populated(value).map(|v| (name, v)))
        .collect();

        let (field, value) = match set.as_slice() {
            [] => return Err(ValidationError::NoIdentifier),
            [single] => *single,
            many => {
                return Err(ValidationError::ConflictingIdentifiers(
                    many.iter().map(|(name, _)| *name).collect(),
                ));
            }
        };

        match field {
            "cidr_block" => validate_cidr(value)?,
            "ip_address" => {
                value
                    .parse::<IpAddr>()
                    .map_err(|_| ValidationError::InvalidIpAddress(value.to_string()))?;
            }
            _ => {}
        }

        if matches!(self.comment.as_deref(), Some("")) {
            return Err(ValidationError::EmptyComment);
        }

        Ok(EntryKey(value.to_string()))
    }
}

fn populated(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn host_prefix(ip: IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn validate_cidr(value: &str) -> Result<(), ValidationError> {
    let net: IpNet = value.parse().map_err(|e: ipnet::AddrParseError| {
        ValidationError::InvalidCidr {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;

    let expected = net.trunc().to_string();
    if expected != value {
        return Err(ValidationError::NonCanonicalCidr {
            value: value.to_string(),
            expected,
        });
    }
    Ok(())
}

/// The string an entry is addressed by remotely: its CIDR block, IP address
/// or security group id, whichever the caller set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryKey(String);

impl EntryKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a listed entry is the one this key addresses. Listings echo
    /// plain IPs in `ipAddress` and networks in `cidrBlock`, so both are
    /// compared, plus the security group for group-based entries.
    pub fn matches(&self, entry: &AccessListEntry) -> bool {
        [&entry.cidr_block, &entry.ip_address, &entry.aws_security_group]
            .into_iter()
            .any(|field| field.as_deref() == Some(self.0.as_str()))
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntryKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An access list entry as the API reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListEntry {
    #[serde(default)]
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_security_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl AccessListEntry {
    /// The record the API would echo back for a freshly created entry.
    /// A plain IP is listed as a host network (`/32` or `/128`).
    pub fn from_desired(project_id: &str, desired: &DesiredEntry) -> Self {
        let ip_address = populated(&desired.ip_address).map(String::from);
        let cidr_block = populated(&desired.cidr_block).map(String::from).or_else(|| {
            ip_address
                .as_deref()
                .and_then(|ip| ip.parse::<IpAddr>().ok())
                .and_then(|ip| IpNet::new(ip, host_prefix(ip)).ok())
                .map(|net| net.to_string())
        });
        Self {
            group_id: project_id.to_string(),
            cidr_block,
            ip_address,
            aws_security_group: populated(&desired.aws_security_group).map(String::from),
            comment: desired.comment.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(set: bool, value: &str) -> Option<String> {
        set.then(|| value.to_string())
    }

    #[test]
    fn validation_fails_iff_identifier_count_is_not_one() {
        for mask in 0u8..8 {
            let entry = DesiredEntry {
                cidr_block: opt(mask & 1 != 0, "10.0.0.0/16"),
                ip_address: opt(mask & 2 != 0, "192.0.2.5"),
                aws_security_group: opt(mask & 4 != 0, "sg-0123456789"),
                comment: None,
            };
            let count = mask.count_ones();
            assert_eq!(entry.validate().is_ok(), count == 1, "mask {mask:03b}");
        }
    }

    #[test]
    fn empty_string_counts_as_unset() {
        let entry = DesiredEntry {
            cidr_block: Some(String::new()),
            ip_address: Some("192.0.2.5".into()),
            ..DesiredEntry::default()
        };
        assert_eq!(entry.validate().unwrap().as_str(), "192.0.2.5");
    }

    #[test]
    fn no_identifier() {
        assert_eq!(
            DesiredEntry::default().validate(),
            Err(ValidationError::NoIdentifier)
        );
    }

    #[test]
    fn conflicting_identifiers_are_named() {
        let entry = DesiredEntry {
            cidr_block: Some("10.0.0.0/16".into()),
            aws_security_group: Some("sg-1".into()),
            ..DesiredEntry::default()
        };
        assert_eq!(
            entry.validate(),
            Err(ValidationError::ConflictingIdentifiers(vec![
                "cidr_block",
                "aws_security_group"
            ]))
        );
    }

    #[test]
    fn cidr_must_be_its_own_network() {
        let err = DesiredEntry::cidr("10.0.0.1/16").validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::NonCanonicalCidr {
                value: "10.0.0.1/16".into(),
                expected: "10.0.0.0/16".into(),
            }
        );
        assert!(DesiredEntry::cidr("10.0.0.0/16").validate().is_ok());
        assert!(DesiredEntry::cidr("2001:db8::/32").validate().is_ok());
    }

    #[test]
    fn garbage_cidr_is_rejected() {
        assert!(matches!(
            DesiredEntry::cidr("10.0.0.0").validate(),
            Err(ValidationError::InvalidCidr { .. })
        ));
    }

    #[test]
    fn ip_address_must_parse() {
        assert!(DesiredEntry::ip("192.0.2.5").validate().is_ok());
        assert!(DesiredEntry::ip("2001:db8::1").validate().is_ok());
        assert_eq!(
            DesiredEntry::ip("192.0.2.256").validate(),
            Err(ValidationError::InvalidIpAddress("192.0.2.256".into()))
        );
    }

    #[test]
    fn security_group_is_opaque() {
        let key = DesiredEntry::security_group("sg-0a1b2c").validate().unwrap();
        assert_eq!(key.as_str(), "sg-0a1b2c");
    }

    #[test]
    fn empty_comment_is_rejected() {
        assert_eq!(
            DesiredEntry::ip("192.0.2.5").with_comment("").validate(),
            Err(ValidationError::EmptyComment)
        );
    }

    #[test]
    fn key_matches_cidr_or_ip_field() {
        let listed = AccessListEntry {
            group_id: "proj1".into(),
            cidr_block: Some("192.0.2.5/32".into()),
            ip_address: Some("192.0.2.5".into()),
            ..AccessListEntry::default()
        };
        assert!(EntryKey::new("192.0.2.5").matches(&listed));
        assert!(EntryKey::new("192.0.2.5/32").matches(&listed));
        assert!(!EntryKey::new("192.0.2.6").matches(&listed));
    }

    #[test]
    fn deserializes_api_shape() {
        let entry: AccessListEntry = serde_json::from_str(
            r#"{"groupId":"proj1","cidrBlock":"10.0.0.0/16","comment":"office"}"#,
        )
        .unwrap();
        assert_eq!(entry.cidr_block.as_deref(), Some("10.0.0.0/16"));
        assert_eq!(entry.ip_address, None);
        assert_eq!(entry.comment.as_deref(), Some("office"));
    }

    #[test]
    fn from_desired_lists_plain_ip_as_host_network() {
        let record = AccessListEntry::from_desired("proj1", &DesiredEntry::ip("192.0.2.5"));
        assert_eq!(record.cidr_block.as_deref(), Some("192.0.2.5/32"));
        assert_eq!(record.ip_address.as_deref(), Some("192.0.2.5"));
    }
}
