use anyhow::Context;
use serde::Deserialize;
use tracing::warn;

use crate::{
    annotations::{AnnotationKeys, DEFAULT_ANNOTATION_PREFIX},
    domain_filter::DomainFilter,
    provider_specific::ProviderSpecificPropertyFilter,
    target_filter::TargetNetFilter,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Comma-separated domains to manage; empty = manage all
    #[serde(default)]
    pub domain_filter: String,

    /// Comma-separated domains to leave alone
    #[serde(default)]
    pub exclude_domains: String,

    /// Regex of domains to manage; takes precedence over the literal lists
    #[serde(default)]
    pub regex_domain_filter: String,

    /// Regex of domains to leave alone
    #[serde(default)]
    pub regex_domain_exclusion: String,

    /// Comma-separated CIDRs a target must fall into
    #[serde(default)]
    pub target_net_filter: String,

    /// Comma-separated CIDRs whose targets are dropped
    #[serde(default)]
    pub exclude_target_nets: String,

    /// Provider-specific property names the backend supports
    #[serde(default)]
    pub provider_specific_names: String,

    /// Provider-specific property name prefixes the backend supports
    #[serde(default)]
    pub provider_specific_prefixes: String,

    /// Zones created in the in-memory store at startup
    #[serde(default)]
    pub zones: String,

    /// Prefix for [`AnnotationKeys`]. The webhook routes receive endpoints,
    /// never annotations, so only library callers turning annotations into
    /// endpoints read it.
    #[serde(default = "default_annotation_prefix")]
    pub annotation_prefix: String,

    /// Default TTL when the endpoint doesn't specify one
    #[serde(default = "default_ttl")]
    pub default_ttl: i64,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain_filter: String::new(),
            exclude_domains: String::new(),
            regex_domain_filter: String::new(),
            regex_domain_exclusion: String::new(),
            target_net_filter: String::new(),
            exclude_target_nets: String::new(),
            provider_specific_names: String::new(),
            provider_specific_prefixes: String::new(),
            zones: String::new(),
            annotation_prefix: default_annotation_prefix(),
            default_ttl: default_ttl(),
            port: default_port(),
        }
    }
}

impl Config {
    /// Parse from environment variables (DOMAIN_FILTER, ZONES, PORT, …)
    pub fn from_env() -> anyhow::Result<Self> {
        envy::from_env::<Config>().context("reading configuration from environment")
    }

    /// Regex mode when either pattern is set, literal mode otherwise.
    pub fn domain_filter(&self) -> anyhow::Result<DomainFilter> {
        let regex_set =
            !self.regex_domain_filter.is_empty() || !self.regex_domain_exclusion.is_empty();
        if !regex_set {
            return Ok(DomainFilter::with_exclusions(
                split_list(&self.domain_filter),
                split_list(&self.exclude_domains),
            ));
        }

        if !self.domain_filter.trim().is_empty() || !self.exclude_domains.trim().is_empty() {
            warn!("both literal and regex domain filters configured; using the regex filter");
        }
        DomainFilter::from_regex_patterns(&self.regex_domain_filter, &self.regex_domain_exclusion)
            .context("compiling regex domain filter")
    }

    pub fn target_net_filter(&self) -> TargetNetFilter {
        TargetNetFilter::with_exclusions(
            split_list(&self.target_net_filter),
            split_list(&self.exclude_target_nets),
        )
    }

    pub fn provider_specific_filter(&self) -> ProviderSpecificPropertyFilter {
        ProviderSpecificPropertyFilter::new(
            split_list(&self.provider_specific_names),
            split_list(&self.provider_specific_prefixes),
        )
    }

    /// The managed zones as a literal filter, so a record outside every zone
    /// is out of scope even with no domain filter configured.
    pub fn zone_filter(&self) -> DomainFilter {
        DomainFilter::new(self.zone_list())
    }

    pub fn zone_list(&self) -> Vec<String> {
        split_list(&self.zones)
    }

    pub fn annotation_keys(&self) -> AnnotationKeys {
        AnnotationKeys::new(&self.annotation_prefix)
    }
}

/// Split a comma-separated setting, empty entries dropped.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn default_annotation_prefix() -> String { DEFAULT_ANNOTATION_PREFIX.into() }
fn default_ttl()               -> i64    { 300 }
fn default_port()              -> u16    { 8888 }
