use tracing::debug;

use crate::endpoint::Endpoint;

/// Allow-list of provider-specific property names a backend understands.
///
/// An empty filter allows nothing: a backend that declares no supported
/// properties gets every property stripped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSpecificPropertyFilter {
    /// Exact property names
    pub names: Vec<String>,
    /// Property name prefixes, e.g. "aws/"
    pub prefixes: Vec<String>,
}

impl ProviderSpecificPropertyFilter {
    pub fn new<N, P, S, T>(names: N, prefixes: P) -> Self
    where
        N: IntoIterator<Item = S>,
        S: Into<String>,
        P: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
            || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Remove every property the filter does not allow, in place.
    pub fn filter(&self, endpoints: &mut [Endpoint]) {
        for ep in endpoints.iter_mut() {
            ep.provider_specific.retain(|prop| {
                let keep = self.matches(&prop.name);
                if !keep {
                    debug!(
                        dns_name = %ep.dns_name,
                        property = %prop.name,
                        "dropping unsupported provider-specific property"
                    );
                }
                keep
            });
        }
    }
}
