//! Domain and target filtering for an external-dns webhook provider.
//!
//! The filter modules are usable on their own; [`router`] wires them into the
//! webhook HTTP surface backed by an [`inmemory::InMemoryProvider`].

pub mod annotations;
pub mod config;
pub mod domain;
pub mod domain_filter;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod inmemory;
pub mod policy;
pub mod provider_specific;
pub mod target_filter;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use http_body_util::BodyExt;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::{
    config::Config,
    domain_filter::{DomainFilter, DomainMatcher, MatchAllDomainFilters},
    inmemory::InMemoryProvider,
    provider_specific::ProviderSpecificPropertyFilter,
    target_filter::TargetNetFilter,
};

// ─────────────────────────────────────────────────────────────────────────────
// Shared application state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    /// Advertised to external-dns on negotiation
    pub domain_filter: DomainFilter,
    /// Configured filter AND the managed zones
    pub scope: MatchAllDomainFilters,
    pub target_filter: TargetNetFilter,
    pub property_filter: ProviderSpecificPropertyFilter,
    pub provider: InMemoryProvider,
}

impl AppState {
    /// Build every filter from the config and create the configured zones.
    pub async fn from_config(cfg: Config) -> anyhow::Result<Self> {
        let domain_filter = cfg.domain_filter()?;
        let zone_filter = cfg.zone_filter();

        let scope: MatchAllDomainFilters = [
            Arc::new(domain_filter.clone()) as Arc<dyn DomainMatcher>,
            Arc::new(zone_filter) as Arc<dyn DomainMatcher>,
        ]
        .into_iter()
        .map(Some)
        .collect();

        let provider = InMemoryProvider::new(domain_filter.clone(), cfg.default_ttl);
        for zone in cfg.zone_list() {
            provider.create_zone(&zone).await?;
        }

        Ok(Self {
            target_filter: cfg.target_net_filter(),
            property_filter: cfg.provider_specific_filter(),
            domain_filter,
            scope,
            provider,
            cfg,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    info!("Scope        : {} filter(s) combined", state.scope.len());

    Router::new()
        .route("/",                get(handlers::negotiate))
        .route("/healthz",         get(handlers::healthz))
        .route("/records",         get(handlers::get_records).post(handlers::apply_changes))
        .route("/adjustendpoints", post(handlers::adjust_endpoints))
        .layer(middleware::from_fn(log_request_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Request body logging middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Logs webhook payloads at DEBUG. The body is buffered either way, so the
/// handler sees the same bytes.
async fn log_request_body(req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            tracing::error!(path = %parts.uri.path(), "unreadable request body: {e}");
            return next.run(Request::from_parts(parts, Body::empty())).await;
        }
    };

    if !bytes.is_empty() && tracing::enabled!(tracing::Level::DEBUG) {
        debug!(
            method = %parts.method,
            path = %parts.uri.path(),
            len = bytes.len(),
            body = %describe_body(&bytes),
            "webhook payload"
        );
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Compact JSON when the body parses, the raw text otherwise.
fn describe_body(bytes: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(value) => value.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_body_compacts_json() {
        assert_eq!(
            describe_body(b"{ \"create\": [ ] }"),
            r#"{"create":[]}"#
        );
        assert_eq!(describe_body(b"not json"), "not json");
    }
}
