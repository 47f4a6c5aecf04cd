use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    Json as BodyJson,
};
use tracing::{debug, error, info, warn};

use crate::{
    domain_filter::DomainMatcher,
    endpoint::{Changes, Endpoint},
    policy::{Policy, AWS_WEIGHT_PROPERTY},
    target_filter::filter_targets,
    AppState,
};

// Content-Type required by the external-dns webhook protocol
pub const WEBHOOK_CT: &str = "application/external.dns.webhook+json;version=1";

fn webhook_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert("Content-Type", HeaderValue::from_static(WEBHOOK_CT));
    h
}

// ── GET /healthz ──────────────────────────────────────────────────────────────

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

// ── GET / ─────────────────────────────────────────────────────────────────────
// Domain-filter negotiation.

pub async fn negotiate(State(state): State<AppState>) -> impl IntoResponse {
    (webhook_headers(), Json(state.domain_filter.clone()))
}

// ── GET /records ──────────────────────────────────────────────────────────────

pub async fn get_records(State(state): State<AppState>) -> Response {
    let eps: Vec<Endpoint> = state
        .provider
        .records()
        .await
        .into_iter()
        .filter(|ep| state.scope.matches(&ep.dns_name))
        .collect();
    info!("GET /records → {} endpoint(s)", eps.len());
    (webhook_headers(), Json(eps)).into_response()
}

// ── POST /records ─────────────────────────────────────────────────────────────

pub async fn apply_changes(
    State(state): State<AppState>,
    BodyJson(changes): BodyJson<Changes>,
) -> Response {
    let in_scope = |eps: Vec<Endpoint>, kind: &str| -> Vec<Endpoint> {
        eps.into_iter()
            .filter(|ep| {
                let keep = state.scope.matches(&ep.dns_name);
                if !keep {
                    warn!("{kind} {} {} is outside the domain filter; skipping", ep.record_type, ep.dns_name);
                }
                keep
            })
            .collect()
    };

    let changes = Changes {
        create:     in_scope(changes.create, "CREATE"),
        update_old: in_scope(changes.update_old, "UPDATE-OLD"),
        update_new: in_scope(changes.update_new, "UPDATE-NEW"),
        delete:     in_scope(changes.delete, "DELETE"),
    };

    if changes.is_empty() {
        debug!("POST /records → nothing to apply");
        return StatusCode::NO_CONTENT.into_response();
    }

    match state.provider.apply_changes(changes).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("POST /records error: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ── POST /adjustendpoints ─────────────────────────────────────────────────────
//
// Called by external-dns before planning changes. Each endpoint goes through:
//
//  1. the composite domain filter; out-of-scope endpoints are dropped
//  2. the target network filter; an endpoint left with no targets is dropped
//  3. the provider-specific property allow-list
//  4. routing policy validation; an invalid weight loses its property

pub async fn adjust_endpoints(
    State(state): State<AppState>,
    BodyJson(endpoints): BodyJson<Vec<Endpoint>>,
) -> impl IntoResponse {
    let received = endpoints.len();

    // ── 1. Domain scope ───────────────────────────────────────────────────
    let endpoints: Vec<Endpoint> = endpoints
        .into_iter()
        .filter(|ep| {
            let keep = state.scope.matches(&ep.dns_name);
            if !keep {
                debug!("{} is outside the domain filter; dropping", ep.dns_name);
            }
            keep
        })
        .collect();

    // ── 2. Target networks ────────────────────────────────────────────────
    let mut endpoints = filter_targets(endpoints, &state.target_filter);

    // ── 3. Provider-specific properties ───────────────────────────────────
    state.property_filter.filter(&mut endpoints);

    // ── 4. Routing policy ─────────────────────────────────────────────────
    for ep in &mut endpoints {
        if let Err(e) = Policy::from_endpoint(ep) {
            warn!("{} has an invalid routing policy ({e}); removing '{}'", ep.dns_name, AWS_WEIGHT_PROPERTY);
            ep.delete_provider_specific_property(AWS_WEIGHT_PROPERTY);
        }
    }

    info!("POST /adjustendpoints → {} of {} endpoint(s) kept", endpoints.len(), received);
    (webhook_headers(), Json(endpoints))
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn error_response(code: StatusCode, msg: String) -> Response {
    (code, Json(serde_json::json!({"error": msg}))).into_response()
}
