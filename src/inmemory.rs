use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    domain::normalize_domain,
    domain_filter::DomainFilter,
    endpoint::{Changes, Endpoint, EndpointKey},
    error::ProviderError,
};

type Zone = BTreeMap<EndpointKey, Endpoint>;

// ─────────────────────────────────────────────────────────────────────────────
// Provider
// ─────────────────────────────────────────────────────────────────────────────

/// Zone store kept in memory, standing in for a real DNS backend.
///
/// Cheap to clone; clones share the same zones.
#[derive(Debug, Clone)]
pub struct InMemoryProvider {
    domain_filter: DomainFilter,
    default_ttl: i64,
    zones: Arc<RwLock<BTreeMap<String, Zone>>>,
}

impl InMemoryProvider {
    pub fn new(domain_filter: DomainFilter, default_ttl: i64) -> Self {
        Self {
            domain_filter,
            default_ttl,
            zones: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn domain_filter(&self) -> &DomainFilter {
        &self.domain_filter
    }

    pub async fn create_zone(&self, zone: &str) -> Result<(), ProviderError> {
        let name = normalize_domain(zone.trim());
        let mut zones = self.zones.write().await;
        if zones.contains_key(&name) {
            return Err(ProviderError::ZoneAlreadyExists);
        }
        info!(zone = %name, "created zone");
        zones.insert(name, Zone::new());
        Ok(())
    }

    /// A zone is in scope when the filter matches it, or when it is the
    /// parent of a configured domain (zone `example.org` for filter
    /// `api.example.org`).
    fn zone_in_scope(&self, zone: &str) -> bool {
        self.domain_filter.matches(zone) || self.domain_filter.match_parent(zone)
    }

    /// Names of the zones in scope, sorted.
    pub async fn zones(&self) -> Vec<String> {
        self.zones
            .read()
            .await
            .keys()
            .filter(|z| self.zone_in_scope(z))
            .cloned()
            .collect()
    }

    /// Copies of every record in every zone in scope.
    pub async fn records(&self) -> Vec<Endpoint> {
        let zones = self.zones.read().await;
        zones
            .iter()
            .filter(|(name, _)| self.zone_in_scope(name))
            .flat_map(|(_, records)| records.values().cloned())
            .collect()
    }

    /// Route every change to its zone, validate all zones, then apply.
    /// Nothing is written if any zone's batch is invalid.
    pub async fn apply_changes(&self, changes: Changes) -> Result<(), ProviderError> {
        let mut zones = self.zones.write().await;

        let in_scope: Vec<String> = zones
            .keys()
            .filter(|z| self.zone_in_scope(z))
            .cloned()
            .collect();
        let per_zone = split_by_zone(&in_scope, changes);

        for (zone_name, batch) in &per_zone {
            let zone = zones.get(zone_name).ok_or(ProviderError::ZoneNotFound)?;
            validate_batch(zone, batch)?;
        }

        for (zone_name, batch) in per_zone {
            let zone = zones.get_mut(&zone_name).ok_or(ProviderError::ZoneNotFound)?;
            for ep in batch.delete {
                info!("DELETE {} {} from {zone_name}", ep.record_type, ep.dns_name);
                zone.remove(&ep.key());
            }
            for ep in batch.update_new {
                info!("UPDATE {} {} in {zone_name}", ep.record_type, ep.dns_name);
                zone.insert(ep.key(), self.with_default_ttl(ep));
            }
            for ep in batch.create {
                info!("CREATE {} {} in {zone_name}", ep.record_type, ep.dns_name);
                zone.insert(ep.key(), self.with_default_ttl(ep));
            }
        }
        Ok(())
    }

    fn with_default_ttl(&self, mut ep: Endpoint) -> Endpoint {
        if ep.record_ttl.is_none() {
            ep.record_ttl = Some(self.default_ttl);
        }
        ep
    }
}

// ── helpers ───────────────────────────────────────────────────────────────────

/// The longest zone that is `dns_name` itself or one of its parents.
fn endpoint_zone<'a>(dns_name: &str, zones: &'a [String]) -> Option<&'a str> {
    let name = normalize_domain(dns_name);
    zones
        .iter()
        .filter(|zone| {
            name == **zone
                || name
                    .strip_suffix(zone.as_str())
                    .is_some_and(|head| head.ends_with('.'))
        })
        .max_by_key(|zone| zone.len())
        .map(String::as_str)
}

fn split_by_zone(zones: &[String], changes: Changes) -> BTreeMap<String, Changes> {
    let mut per_zone: BTreeMap<String, Changes> = BTreeMap::new();
    let mut route = |endpoints: Vec<Endpoint>, pick: fn(&mut Changes) -> &mut Vec<Endpoint>| {
        for ep in endpoints {
            match endpoint_zone(&ep.dns_name, zones) {
                Some(zone) => pick(per_zone.entry(zone.to_string()).or_default()).push(ep),
                None => debug!(dns_name = %ep.dns_name, "no zone in scope for endpoint, skipping"),
            }
        }
    };

    route(changes.create, |c| &mut c.create);
    route(changes.update_old, |c| &mut c.update_old);
    route(changes.update_new, |c| &mut c.update_new);
    route(changes.delete, |c| &mut c.delete);
    per_zone
}

fn validate_batch(zone: &Zone, batch: &Changes) -> Result<(), ProviderError> {
    let mut mesh: HashSet<EndpointKey> = HashSet::new();
    let mut claim = |ep: &Endpoint| {
        if mesh.insert(ep.key()) {
            Ok(())
        } else {
            Err(ProviderError::DuplicateRecord)
        }
    };
    let same_first_target = |ep: &Endpoint| {
        zone.get(&ep.key())
            .is_some_and(|current| current.targets.first() == ep.targets.first())
    };

    for ep in &batch.create {
        if zone.contains_key(&ep.key()) {
            return Err(ProviderError::RecordAlreadyExists);
        }
        claim(ep)?;
    }
    for ep in &batch.update_new {
        if !zone.contains_key(&ep.key()) {
            return Err(ProviderError::RecordNotFound);
        }
        claim(ep)?;
    }
    for ep in &batch.update_old {
        if !same_first_target(ep) {
            return Err(ProviderError::RecordNotFound);
        }
    }
    for ep in &batch.delete {
        if !same_first_target(ep) {
            return Err(ProviderError::RecordNotFound);
        }
        claim(ep)?;
    }
    Ok(())
}
