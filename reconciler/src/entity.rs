// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types describing the remote inventory: workloads and labels
//!
//! These are the values the remote client hands us and the values we hand
//! back to it.  The reconciler never mutates a fetched [`Workload`]; it
//! clones one and builds the proposed value from the clone.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use strum::EnumIter;

/// A workload as known to the remote inventory service
///
/// String attributes use the empty string for "unset"; the service treats a
/// missing attribute and an empty one identically.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Workload {
    /// Remote identity.  `None` only for workloads that have not been
    /// created yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(default, deserialize_with = "nullable_string")]
    pub hostname: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub distinguished_name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub service_principal_name: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub external_data_set: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub external_data_reference: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub os_id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub os_detail: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub data_center: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub public_ip: String,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement_mode: Option<EnforcementMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility_level: Option<VisibilityLevel>,
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    /// Present when an agent manages this workload.  Never sent back.
    #[serde(default, skip_serializing)]
    pub agent: Option<AgentRef>,
}

/// The PCE sends `null` for unset string attributes
fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Workload {
    pub fn is_managed(&self) -> bool {
        self.agent.is_some()
    }

    /// Returns the href of the label this workload carries for dimension
    /// `key`, if any
    pub fn label_href(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.key.eq_ignore_ascii_case(key))
            .map(|l| l.href.as_str())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AgentRef {
    pub href: String,
}

/// A label attached to a workload
///
/// The PCE may send only the href.  An empty `key` is filled in from the
/// label list during planning, and only the href is ever sent back.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct LabelRef {
    #[serde(default, skip_serializing)]
    pub key: String,
    pub href: String,
}

/// A label as it exists in the remote inventory
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Label {
    pub href: String,
    pub key: String,
    pub value: String,
}

/// Per-item outcome of a bulk call
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BulkResult {
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl BulkResult {
    /// An item succeeded only if it reports no errors and the status of a
    /// completed update or create
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
            && matches!(self.status.as_str(), "updated" | "created")
    }
}

/// One network interface on an unmanaged workload
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interface {
    pub name: String,
    pub address: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<u8>,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.address)?;
        if let Some(prefix) = self.cidr_block {
            write!(f, "/{prefix}")?;
        }
        Ok(())
    }
}

impl FromStr for Interface {
    type Err = String;

    /// Parses `name:address[/prefix]`
    ///
    /// The address may itself contain colons (IPv6), so we split on the
    /// first one only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, rest) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected \"name:address\", got {s:?}"))?;
        if name.is_empty() {
            return Err(format!("missing interface name in {s:?}"));
        }
        let (addr, prefix) = match rest.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (rest, None),
        };
        let address: IpAddr = addr
            .parse()
            .map_err(|_| format!("invalid IP address {addr:?}"))?;
        let cidr_block = prefix
            .map(|p| {
                let max = if address.is_ipv4() { 32 } else { 128 };
                match p.parse::<u8>() {
                    Ok(n) if n <= max => Ok(n),
                    _ => Err(format!("invalid prefix length {p:?}")),
                }
            })
            .transpose()?;
        Ok(Interface { name: name.to_string(), address, cidr_block })
    }
}

/// Parses a cell holding zero or more `;`-separated interfaces
pub fn parse_interfaces(cell: &str) -> Result<Vec<Interface>, String> {
    let mut interfaces = cell
        .split(';')
        .filter(|s| !s.trim().is_empty())
        .map(Interface::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    interfaces.sort();
    Ok(interfaces)
}

pub fn display_interfaces(interfaces: &[Interface]) -> String {
    interfaces.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(";")
}

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum EnforcementMode {
    Idle,
    VisibilityOnly,
    Selective,
    Full,
}

#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityLevel {
    FlowSummary,
    FlowDrop,
    FlowOff,
    EnhancedDataCollection,
}

macro_rules! impl_wire_name {
    ($ty:ty { $($variant:ident => $name:literal),* $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($name) {
                        return Ok(Self::$variant);
                    }
                )*
                let valid: &[&str] = &[$($name),*];
                Err(format!("{s:?} is not one of {}", valid.join(", ")))
            }
        }
    };
}

impl_wire_name!(EnforcementMode {
    Idle => "idle",
    VisibilityOnly => "visibility_only",
    Selective => "selective",
    Full => "full",
});

impl_wire_name!(VisibilityLevel {
    FlowSummary => "flow_summary",
    FlowDrop => "flow_drop",
    FlowOff => "flow_off",
    EnhancedDataCollection => "enhanced_data_collection",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_parsing() {
        let ifaces =
            parse_interfaces("eth1:10.0.0.5/24; eth0:fd00::1").unwrap();
        assert_eq!(
            ifaces,
            vec![
                Interface {
                    name: "eth0".to_string(),
                    address: "fd00::1".parse().unwrap(),
                    cidr_block: None,
                },
                Interface {
                    name: "eth1".to_string(),
                    address: "10.0.0.5".parse().unwrap(),
                    cidr_block: Some(24),
                },
            ]
        );
        assert_eq!(
            display_interfaces(&ifaces),
            "eth0:fd00::1;eth1:10.0.0.5/24"
        );

        assert!(parse_interfaces("").unwrap().is_empty());
        assert!(parse_interfaces("eth0").is_err());
        assert!(parse_interfaces(":10.0.0.1").is_err());
        assert!(parse_interfaces("eth0:10.0.0.1/33").is_err());
        assert!(parse_interfaces("eth0:not-an-ip").is_err());
    }

    #[test]
    fn test_enum_wire_names() {
        use strum::IntoEnumIterator as _;
        for mode in EnforcementMode::iter() {
            assert_eq!(mode.as_str().parse::<EnforcementMode>(), Ok(mode));
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.as_str()));
        }
        for level in VisibilityLevel::iter() {
            assert_eq!(level.as_str().parse::<VisibilityLevel>(), Ok(level));
        }
        assert_eq!(
            "FULL".parse::<EnforcementMode>(),
            Ok(EnforcementMode::Full)
        );
        assert!("enforced".parse::<EnforcementMode>().is_err());
    }

    #[test]
    fn test_agent_not_serialized() {
        let w = Workload {
            href: Some("/orgs/1/workloads/1".to_string()),
            agent: Some(AgentRef { href: "/orgs/1/agents/1".to_string() }),
            ..Default::default()
        };
        let json = serde_json::to_value(&w).unwrap();
        assert!(json.get("agent").is_none());
        assert!(w.is_managed());
    }

    #[test]
    fn test_href_only_label_refs() {
        let json = r#"[{
            "href": "/orgs/1/workloads/1",
            "hostname": "web1",
            "labels": [{ "href": "/orgs/1/labels/3" }]
        }]"#;
        let workloads: Vec<Workload> = serde_json::from_str(json).unwrap();
        let labels = &workloads[0].labels;
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].key, "");
        assert_eq!(labels[0].href, "/orgs/1/labels/3");

        // Only the href goes back to the PCE.
        let labelled = LabelRef {
            key: "role".to_string(),
            href: "/orgs/1/labels/3".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&labelled).unwrap(),
            serde_json::json!({ "href": "/orgs/1/labels/3" })
        );
    }

    #[test]
    fn test_bulk_result_success() {
        let result = |status: &str, errors: &[&str]| BulkResult {
            href: Some("/orgs/1/workloads/1".to_string()),
            status: status.to_string(),
            errors: errors.iter().map(|e| e.to_string()).collect(),
        };
        assert!(result("updated", &[]).is_success());
        assert!(result("created", &[]).is_success());
        assert!(!result("updated", &["bad hostname"]).is_success());
        // A failure status without an error list is still a failure.
        assert!(!result("validation_failure", &[]).is_success());
        assert!(!result("", &[]).is_success());
    }
}
