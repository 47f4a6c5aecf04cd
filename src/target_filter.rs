use std::{fmt, net::IpAddr};

use ipnet::IpNet;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;

/// Anything that can decide whether a record target is in scope.
pub trait TargetMatcher: fmt::Debug + Send + Sync {
    fn matches(&self, target: &str) -> bool;
    fn is_configured(&self) -> bool;
}

// ─────────────────────────────────────────────────────────────────────────────
// TargetNetFilter
// ─────────────────────────────────────────────────────────────────────────────

/// CIDR inclusion / exclusion over IP-literal targets. Same include-then-
/// exclude semantics as the literal domain filter, on parsed networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetNetFilter {
    include: Vec<IpNet>,
    exclude: Vec<IpNet>,
}

impl TargetNetFilter {
    pub fn new<I, S>(include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_exclusions(include, std::iter::empty::<&str>())
    }

    /// Malformed CIDR strings are dropped with a warning; the filter carries
    /// on with whatever parsed.
    pub fn with_exclusions<I, S, E, T>(include: I, exclude: E) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        E: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self {
            include: prepare_target_filters(include),
            exclude: prepare_target_filters(exclude),
        }
    }

    pub fn include_nets(&self) -> &[IpNet] {
        &self.include
    }

    pub fn exclude_nets(&self) -> &[IpNet] {
        &self.exclude
    }

    /// A target that is not an IP literal matches no network: it is rejected
    /// when inclusion networks exist and kept when only exclusions do.
    pub fn matches(&self, target: &str) -> bool {
        match_target_net_filter(&self.include, target, true)
            && !match_target_net_filter(&self.exclude, target, false)
    }

    pub fn is_configured(&self) -> bool {
        !self.include.is_empty() || !self.exclude.is_empty()
    }
}

impl TargetMatcher for TargetNetFilter {
    fn matches(&self, target: &str) -> bool {
        TargetNetFilter::matches(self, target)
    }

    fn is_configured(&self) -> bool {
        TargetNetFilter::is_configured(self)
    }
}

impl fmt::Display for TargetNetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_configured() {
            return f.write_str("(all targets)");
        }
        let join = |nets: &[IpNet]| {
            nets.iter().map(IpNet::to_string).collect::<Vec<_>>().join(",")
        };
        write!(f, "include=[{}] exclude=[{}]", join(&self.include), join(&self.exclude))
    }
}

fn prepare_target_filters<I, S>(filters: I) -> Vec<IpNet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    filters
        .into_iter()
        .filter_map(|raw| {
            let cidr = raw.as_ref().trim();
            if cidr.is_empty() {
                return None;
            }
            match cidr.parse::<IpNet>() {
                Ok(net) => Some(net.trunc()),
                Err(e) => {
                    warn!(filter = cidr, error = %e, "invalid target net filter, ignoring");
                    None
                }
            }
        })
        .collect()
}

fn match_target_net_filter(nets: &[IpNet], target: &str, empty_val: bool) -> bool {
    if nets.is_empty() {
        return empty_val;
    }
    match target.trim().parse::<IpAddr>() {
        Ok(ip) => nets.iter().any(|net| net.contains(&ip)),
        Err(_) => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Target pruning
// ─────────────────────────────────────────────────────────────────────────────

/// Keep only the targets `filter` matches; endpoints left without targets
/// are dropped. An unconfigured filter passes everything through untouched.
pub fn filter_targets(endpoints: Vec<Endpoint>, filter: &dyn TargetMatcher) -> Vec<Endpoint> {
    if !filter.is_configured() {
        return endpoints;
    }

    endpoints
        .into_iter()
        .filter_map(|mut ep| {
            ep.targets.retain(|t| filter.matches(t));
            if ep.targets.is_empty() {
                debug!(dns_name = %ep.dns_name, "all targets filtered out, dropping endpoint");
                return None;
            }
            Some(ep)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::endpoint::{RECORD_TYPE_A, RECORD_TYPE_AAAA};

    #[test]
    fn cidr_containment() {
        let filter = TargetNetFilter::new(["10.0.0.0/8"]);
        assert!(filter.is_configured());
        assert!(filter.matches("10.1.2.3"));
        assert!(!filter.matches("1.1.1.1"));
    }

    #[test]
    fn invalid_cidrs_are_dropped() {
        let filter = TargetNetFilter::new(["0"]);
        assert!(!filter.is_configured());
        assert!(filter.matches("1.1.1.1"));

        let filter = TargetNetFilter::with_exclusions(["8.8.8.8", "10.0.0.0/8", " "], ["nope/99"]);
        assert_eq!(filter.include_nets().len(), 1);
        assert!(filter.exclude_nets().is_empty());
    }

    #[test]
    fn host_bits_are_masked() {
        let filter = TargetNetFilter::new(["10.1.2.3/8"]);
        assert_eq!(filter.include_nets()[0].to_string(), "10.0.0.0/8");
        assert!(filter.matches("10.200.0.1"));
    }

    #[test]
    fn exclusion_only() {
        let filter = TargetNetFilter::with_exclusions(Vec::<&str>::new(), ["10.0.0.0/8"]);
        assert!(!filter.matches("10.0.178.43"));
        assert!(filter.matches("49.13.41.161"));
        // unparsable targets are never excluded
        assert!(filter.matches("lb.example.com"));
    }

    #[test]
    fn unparsable_target_never_included() {
        let filter = TargetNetFilter::new(["10.0.0.0/8"]);
        assert!(!filter.matches("lb.example.com"));
        assert!(!filter.matches("2a01:asdf:asdf:asdf::1"));
    }

    #[test]
    fn families_do_not_mix() {
        let filter = TargetNetFilter::with_exclusions(Vec::<&str>::new(), ["10.0.0.0/8"]);
        assert!(filter.matches("2001:db8::1"));

        let filter = TargetNetFilter::new(["2001:db8::/32"]);
        assert!(filter.matches("2001:db8:1::1"));
        assert!(!filter.matches("10.0.0.1"));
    }

    #[test]
    fn include_and_exclude() {
        let filter = TargetNetFilter::with_exclusions(["10.0.0.0/8"], ["10.1.0.0/16"]);
        assert!(filter.matches("10.2.0.1"));
        assert!(!filter.matches("10.1.0.1"));
        assert!(!filter.matches("192.168.0.1"));
    }

    #[test]
    fn filter_targets_prunes_targets_and_empty_endpoints() {
        let filter = TargetNetFilter::new(["10.0.0.0/8"]);
        let endpoints = vec![
            Endpoint::new("a.example.org", RECORD_TYPE_A, ["10.0.0.1", "49.13.41.161"]),
            Endpoint::new("b.example.org", RECORD_TYPE_A, ["49.13.41.161"]),
            Endpoint::new("c.example.org", RECORD_TYPE_AAAA, ["2001:db8::1"]),
        ];
        let kept = filter_targets(endpoints, &filter);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].dns_name, "a.example.org");
        assert_eq!(kept[0].targets, vec!["10.0.0.1"]);
    }

    #[test]
    fn filter_targets_passes_through_when_unconfigured() {
        let filter = TargetNetFilter::new(["8.8.8.8"]);
        let endpoints = vec![
            Endpoint::new("foo", RECORD_TYPE_A, ["10.0.0.1"]),
            Endpoint::new("foo", RECORD_TYPE_A, ["8.8.8.8"]),
        ];
        assert_eq!(filter_targets(endpoints.clone(), &filter), endpoints);
    }

    #[derive(Debug)]
    struct Exact(HashSet<&'static str>);

    impl TargetMatcher for Exact {
        fn matches(&self, target: &str) -> bool {
            self.0.contains(target)
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    #[test]
    fn filter_targets_works_with_any_matcher() {
        let endpoints = vec![
            Endpoint::new("foo", RECORD_TYPE_A, ["10.0.0.1"]),
            Endpoint::new("foo", RECORD_TYPE_A, ["8.8.8.8"]),
        ];
        let kept = filter_targets(endpoints.clone(), &Exact(HashSet::from(["8.8.8.8"])));
        assert_eq!(kept, vec![endpoints[1].clone()]);

        assert!(filter_targets(endpoints, &Exact(HashSet::new())).is_empty());
    }
}
