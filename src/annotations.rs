//! Annotation keys derived once from a configurable prefix.
//!
//! Built at startup and handed to whatever needs it; there is no global
//! prefix to rewrite, so differently-prefixed key sets can coexist.

use std::collections::BTreeMap;

use tracing::warn;

use crate::{
    endpoint::{ProviderSpecific, ProviderSpecificProperty},
    error::PolicyError,
    policy::AwsRoute53Policy,
};

pub const DEFAULT_ANNOTATION_PREFIX: &str = "external-dns.alpha.kubernetes.io/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationKeys {
    prefix: String,
    hostname: String,
    ttl: String,
    set_identifier: String,
    aws_weight: String,
    aws_prefix: String,
    webhook_prefix: String,
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self::new(DEFAULT_ANNOTATION_PREFIX)
    }
}

impl AnnotationKeys {
    /// A missing trailing "/" is added.
    pub fn new(prefix: &str) -> Self {
        let prefix = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };
        Self {
            hostname: format!("{prefix}hostname"),
            ttl: format!("{prefix}ttl"),
            set_identifier: format!("{prefix}set-identifier"),
            aws_weight: format!("{prefix}aws-weight"),
            aws_prefix: format!("{prefix}aws-"),
            webhook_prefix: format!("{prefix}webhook-"),
            prefix,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn hostname_key(&self) -> &str {
        &self.hostname
    }

    pub fn ttl_key(&self) -> &str {
        &self.ttl
    }

    pub fn set_identifier_key(&self) -> &str {
        &self.set_identifier
    }

    pub fn aws_weight_key(&self) -> &str {
        &self.aws_weight
    }

    /// Comma-separated hostnames, trimmed, empties dropped.
    pub fn hostnames(&self, annotations: &BTreeMap<String, String>) -> Vec<String> {
        annotations
            .get(&self.hostname)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// TTL in whole seconds. A value that does not parse is ignored with a
    /// warning.
    pub fn ttl(&self, annotations: &BTreeMap<String, String>) -> Option<i64> {
        let raw = annotations.get(&self.ttl)?;
        match raw.trim().parse::<i64>() {
            Ok(ttl) if ttl >= 0 => Some(ttl),
            _ => {
                warn!(annotation = %self.ttl, value = %raw, "invalid TTL annotation, ignoring");
                None
            }
        }
    }

    pub fn set_identifier<'a>(&self, annotations: &'a BTreeMap<String, String>) -> Option<&'a str> {
        annotations.get(&self.set_identifier).map(String::as_str)
    }

    /// `<prefix>aws-<x>` becomes `aws/<x>` and `<prefix>webhook-<x>` becomes
    /// `webhook/<x>`. Output is sorted by annotation key.
    pub fn provider_specific(&self, annotations: &BTreeMap<String, String>) -> ProviderSpecific {
        annotations
            .iter()
            .filter_map(|(key, value)| {
                if let Some(attr) = key.strip_prefix(&self.aws_prefix) {
                    Some(ProviderSpecificProperty::new(format!("aws/{attr}"), value.clone()))
                } else {
                    key.strip_prefix(&self.webhook_prefix).map(|attr| {
                        ProviderSpecificProperty::new(format!("webhook/{attr}"), value.clone())
                    })
                }
            })
            .collect()
    }

    /// Weighted routing policy from the `aws-weight` and `set-identifier`
    /// annotations. `Ok(None)` when no weight is annotated.
    pub fn route53_policy(
        &self,
        annotations: &BTreeMap<String, String>,
    ) -> Result<Option<AwsRoute53Policy>, PolicyError> {
        let Some(raw) = annotations.get(&self.aws_weight) else {
            return Ok(None);
        };
        let weight = raw
            .trim()
            .parse::<i64>()
            .map_err(|_| PolicyError::UnparsableWeight(raw.clone()))?;
        let set_identifier = self.set_identifier(annotations).unwrap_or_default();
        AwsRoute53Policy::new(weight, set_identifier).map(Some)
    }
}
