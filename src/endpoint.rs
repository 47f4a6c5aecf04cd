use std::{
    collections::{HashMap, HashSet},
    fmt,
    net::IpAddr,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Record types and label keys
// ─────────────────────────────────────────────────────────────────────────────

pub const RECORD_TYPE_A: &str = "A";
pub const RECORD_TYPE_AAAA: &str = "AAAA";
pub const RECORD_TYPE_CNAME: &str = "CNAME";
pub const RECORD_TYPE_TXT: &str = "TXT";
pub const RECORD_TYPE_SRV: &str = "SRV";
pub const RECORD_TYPE_NS: &str = "NS";
pub const RECORD_TYPE_PTR: &str = "PTR";
pub const RECORD_TYPE_MX: &str = "MX";
pub const RECORD_TYPE_NAPTR: &str = "NAPTR";

/// Label holding the id of the controller instance that owns a record.
pub const OWNER_LABEL_KEY: &str = "owner";
/// Label holding the Kubernetes resource a record was generated from.
pub const RESOURCE_LABEL_KEY: &str = "resource";

const MAX_LABEL_LENGTH: usize = 63;

// ─────────────────────────────────────────────────────────────────────────────
// external-dns webhook contract types
// ─────────────────────────────────────────────────────────────────────────────

/// A provider-specific property attached to an endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecificProperty {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl ProviderSpecificProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

pub type ProviderSpecific = Vec<ProviderSpecificProperty>;

/// Ownership and heritage bookkeeping. Never sent to a DNS backend.
pub type Labels = HashMap<String, String>;

/// Identity of a record: two endpoints with the same key describe the same
/// record, whatever their targets, TTL or labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub dns_name: String,
    pub record_type: String,
    pub set_identifier: String,
}

/// One DNS endpoint as external-dns understands it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    #[serde(default)]
    pub dns_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(default)]
    pub record_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub set_identifier: String,
    /// `None` is "unset"; `Some(0)` is an explicit zero TTL.
    #[serde(rename = "recordTTL", default, skip_serializing_if = "Option::is_none")]
    pub record_ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_specific: ProviderSpecific,
}

/// The payload sent by external-dns to POST /records.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Changes {
    #[serde(default)]
    pub create: Vec<Endpoint>,
    #[serde(default)]
    pub update_old: Vec<Endpoint>,
    #[serde(default)]
    pub update_new: Vec<Endpoint>,
    #[serde(default)]
    pub delete: Vec<Endpoint>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Endpoint
// ─────────────────────────────────────────────────────────────────────────────

impl Endpoint {
    /// Build an endpoint with an unset TTL. One trailing dot is stripped from
    /// the name and from every target.
    pub fn new<I, S>(dns_name: &str, record_type: &str, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            dns_name: strip_trailing_dot(dns_name).to_string(),
            targets: targets
                .into_iter()
                .map(|t| strip_trailing_dot(t.as_ref()).to_string())
                .collect(),
            record_type: record_type.to_string(),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.record_ttl = Some(ttl);
        self
    }

    pub fn with_set_identifier(mut self, set_identifier: impl Into<String>) -> Self {
        self.set_identifier = set_identifier.into();
        self
    }

    /// Attach a provider-specific property, replacing any existing value.
    /// Properties live for one synchronization only; unlike labels they are
    /// never persisted by a registry.
    pub fn with_provider_specific(mut self, name: &str, value: &str) -> Self {
        self.set_provider_specific_property(name, value);
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn ttl_is_configured(&self) -> bool {
        self.record_ttl.is_some()
    }

    pub fn provider_specific_property(&self, name: &str) -> Option<&str> {
        self.provider_specific
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    pub fn set_provider_specific_property(&mut self, name: &str, value: &str) {
        match self.provider_specific.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => self
                .provider_specific
                .push(ProviderSpecificProperty::new(name, value)),
        }
    }

    /// Remove the first property called `name`, if any.
    pub fn delete_provider_specific_property(&mut self, name: &str) {
        if let Some(idx) = self.provider_specific.iter().position(|p| p.name == name) {
            self.provider_specific.remove(idx);
        }
    }

    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            dns_name: self.dns_name.clone(),
            record_type: self.record_type.clone(),
            set_identifier: self.set_identifier.clone(),
        }
    }

    /// True when both endpoints describe the same record. Targets, TTL and
    /// labels may still differ, which makes the pair an update.
    pub fn same_record(&self, other: &Endpoint) -> bool {
        self.dns_name == other.dns_name
            && self.record_type == other.record_type
            && self.set_identifier == other.set_identifier
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.labels
            .get(OWNER_LABEL_KEY)
            .is_some_and(|owner| owner == owner_id)
    }

    /// Check that the endpoint is well formed: DNS labels fit in 63 octets,
    /// and MX / SRV targets carry their numeric fields.
    pub fn check_endpoint(&self) -> bool {
        if let Some(label) = self
            .dns_name
            .split('.')
            .find(|l| l.len() > MAX_LABEL_LENGTH)
        {
            debug!(dns_name = %self.dns_name, label, "label longer than 63 characters");
            return false;
        }
        match self.record_type.as_str() {
            RECORD_TYPE_MX => self.targets.iter().all(|t| valid_mx_target(t)),
            RECORD_TYPE_SRV => self.targets.iter().all(|t| valid_srv_target(t)),
            _ => true,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let props: Vec<String> = self
            .provider_specific
            .iter()
            .map(|p| format!("{}={}", p.name, p.value))
            .collect();
        write!(
            f,
            "{} {} IN {} {} {} [{}]",
            self.dns_name,
            self.record_ttl.unwrap_or(0),
            self.record_type,
            self.set_identifier,
            self.targets.join(";"),
            props.join(" ")
        )
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

pub(crate) fn strip_trailing_dot(s: &str) -> &str {
    s.strip_suffix('.').unwrap_or(s)
}

/// "10 mail.example.com"
fn valid_mx_target(target: &str) -> bool {
    let parts: Vec<&str> = target.split_whitespace().collect();
    let ok = parts.len() == 2 && parts[0].parse::<u16>().is_ok();
    if !ok {
        debug!(target, "invalid MX record target");
    }
    ok
}

/// "10 5 5060 sip.example.com" (priority, weight, port, host) per RFC 2782.
fn valid_srv_target(target: &str) -> bool {
    let parts: Vec<&str> = target.split_whitespace().collect();
    let ok = parts.len() == 4 && parts[..3].iter().all(|p| p.parse::<u16>().is_ok());
    if !ok {
        debug!(target, "invalid SRV record target");
    }
    ok
}

fn canonical_target(target: &str) -> String {
    match target.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(_) => target.to_ascii_lowercase(),
    }
}

/// Order-insensitive target comparison. Hostnames compare case-insensitively,
/// IP literals by value so "2001:db8::1" equals "2001:0db8:0:0:0:0:0:1".
pub fn same_targets(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut left: Vec<String> = a.iter().map(|t| canonical_target(t)).collect();
    let mut right: Vec<String> = b.iter().map(|t| canonical_target(t)).collect();
    left.sort();
    right.sort();
    left == right
}

/// Keep only the endpoints owned by `owner_id`.
pub fn filter_endpoints_by_owner_id(owner_id: &str, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    endpoints
        .into_iter()
        .filter(|ep| {
            let owned = ep.is_owned_by(owner_id);
            if !owned {
                debug!(
                    endpoint = %ep,
                    found = ep.labels.get(OWNER_LABEL_KEY).map(String::as_str).unwrap_or(""),
                    required = owner_id,
                    "skipping endpoint because owner id does not match"
                );
            }
            owned
        })
        .collect()
}

/// Drop endpoints whose key was already seen; the first occurrence wins.
pub fn remove_duplicates(endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
    let mut seen = HashSet::new();
    endpoints
        .into_iter()
        .filter(|ep| {
            let fresh = seen.insert(ep.key());
            if !fresh {
                debug!(endpoint = %ep, "skipping duplicated endpoint");
            }
            fresh
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_strips_single_trailing_dot() {
        let ep = Endpoint::new("example.org.", RECORD_TYPE_CNAME, ["lb.example.com.", "other."]);
        assert_eq!(ep.dns_name, "example.org");
        assert_eq!(ep.targets, vec!["lb.example.com", "other"]);
        assert_eq!(ep.record_ttl, None);
    }

    #[test]
    fn explicit_zero_ttl_differs_from_unset() {
        let unset = Endpoint::new("a.example.org", RECORD_TYPE_A, ["1.2.3.4"]);
        let zero = unset.clone().with_ttl(0);
        assert!(!unset.ttl_is_configured());
        assert!(zero.ttl_is_configured());

        let json = serde_json::to_value(&zero).unwrap();
        assert_eq!(json["recordTTL"], 0);
        let json = serde_json::to_value(&unset).unwrap();
        assert!(json.get("recordTTL").is_none());
    }

    #[test]
    fn deserializes_webhook_payload() {
        let ep: Endpoint = serde_json::from_str(
            r#"{
                "dnsName": "www.example.org",
                "targets": ["1.2.3.4"],
                "recordType": "A",
                "setIdentifier": "blue",
                "recordTTL": 60,
                "labels": {"owner": "default"},
                "providerSpecific": [{"name": "aws/weight", "value": "10"}]
            }"#,
        )
        .unwrap();
        assert_eq!(ep.record_ttl, Some(60));
        assert_eq!(ep.set_identifier, "blue");
        assert!(ep.is_owned_by("default"));
        assert_eq!(ep.provider_specific_property("aws/weight"), Some("10"));
    }

    #[test]
    fn provider_specific_set_replaces_in_place() {
        let mut ep = Endpoint::new("a.example.org", RECORD_TYPE_A, ["1.2.3.4"])
            .with_provider_specific("first", "1")
            .with_provider_specific("second", "2");
        ep.set_provider_specific_property("first", "one");
        assert_eq!(
            ep.provider_specific,
            vec![
                ProviderSpecificProperty::new("first", "one"),
                ProviderSpecificProperty::new("second", "2"),
            ]
        );

        ep.delete_provider_specific_property("first");
        ep.delete_provider_specific_property("missing");
        assert_eq!(ep.provider_specific, vec![ProviderSpecificProperty::new("second", "2")]);
    }

    #[test]
    fn key_ignores_targets_ttl_and_labels() {
        let a = Endpoint::new("a.example.org", RECORD_TYPE_A, ["1.2.3.4"]).with_ttl(60);
        let b = Endpoint::new("a.example.org", RECORD_TYPE_A, ["5.6.7.8"]).with_label("owner", "x");
        assert!(a.same_record(&b));
        assert_eq!(a.key(), b.key());

        let c = b.clone().with_set_identifier("blue");
        assert!(!a.same_record(&c));
    }

    #[test]
    fn same_targets_ignores_order_case_and_ipv6_form() {
        let a = vec!["2001:db8::1".to_string(), "LB.example.com".to_string()];
        let b = vec!["lb.example.com".to_string(), "2001:0db8:0:0:0:0:0:1".to_string()];
        assert!(same_targets(&a, &b));
        assert!(!same_targets(&a, &b[..1]));
        assert!(!same_targets(&["1.2.3.4".to_string()], &["1.2.3.5".to_string()]));
    }

    #[test]
    fn check_endpoint_validates_mx_and_srv() {
        assert!(Endpoint::new("example.org", RECORD_TYPE_MX, ["10 mail.example.org"]).check_endpoint());
        assert!(!Endpoint::new("example.org", RECORD_TYPE_MX, ["mail.example.org"]).check_endpoint());
        assert!(!Endpoint::new("example.org", RECORD_TYPE_MX, ["70000 mail.example.org"]).check_endpoint());
        assert!(Endpoint::new("_sip._tcp.example.org", RECORD_TYPE_SRV, ["10 5 5060 sip.example.org"])
            .check_endpoint());
        assert!(!Endpoint::new("_sip._tcp.example.org", RECORD_TYPE_SRV, ["10 5060 sip.example.org"])
            .check_endpoint());
        assert!(Endpoint::new("example.org", RECORD_TYPE_A, ["anything"]).check_endpoint());

        let long = format!("{}.example.org", "a".repeat(64));
        assert!(!Endpoint::new(&long, RECORD_TYPE_A, ["1.2.3.4"]).check_endpoint());
    }

    #[test]
    fn owner_filter_and_dedup() {
        let eps = vec![
            Endpoint::new("a.example.org", RECORD_TYPE_A, ["1.1.1.1"]).with_label(OWNER_LABEL_KEY, "me"),
            Endpoint::new("b.example.org", RECORD_TYPE_A, ["2.2.2.2"]).with_label(OWNER_LABEL_KEY, "you"),
            Endpoint::new("c.example.org", RECORD_TYPE_A, ["3.3.3.3"]),
        ];
        let mine = filter_endpoints_by_owner_id("me", eps);
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].dns_name, "a.example.org");

        let deduped = remove_duplicates(vec![
            Endpoint::new("a.example.org", RECORD_TYPE_A, ["1.1.1.1"]),
            Endpoint::new("a.example.org", RECORD_TYPE_A, ["9.9.9.9"]),
            Endpoint::new("a.example.org", RECORD_TYPE_AAAA, ["::1"]),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].targets, vec!["1.1.1.1"]);
    }

    #[test]
    fn display_is_zone_file_like() {
        let ep = Endpoint::new("a.example.org", RECORD_TYPE_A, ["1.1.1.1", "2.2.2.2"])
            .with_ttl(300)
            .with_set_identifier("blue")
            .with_provider_specific("aws/weight", "10");
        assert_eq!(ep.to_string(), "a.example.org 300 IN A blue 1.1.1.1;2.2.2.2 [aws/weight=10]");
    }
}
