use crate::distance::edit_distance;
use crate::domain::canonical_domain;
use crate::fingerprint::{Fingerprint, Label};
use crate::request::HttpRequest;
use ahash::AHashMap;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Recorded once per cluster when a request carries no user-agent header.
pub const MISSING_USER_AGENT: &str = "None";

/// An ordered cluster of requests attributed to one application, together
/// with the shared method and label. Requests must be in chronological
/// order: the outgoing-info score diffs each request against the previous
/// one, so reordering changes the score.
#[derive(Debug, Clone)]
pub struct RequestCluster {
    pub label: Label,
    pub method: String,
    pub requests: Vec<HttpRequest>,
}

/// Reduce an ordered request cluster into one fingerprint.
///
/// Returns `None` for an empty cluster: no requests means no fingerprint,
/// not an error. All state lives in this call; nothing survives between
/// invocations.
pub fn generate_fingerprint(
    cluster: &[HttpRequest],
    method: &str,
    label: Label,
) -> Option<Fingerprint> {
    if cluster.is_empty() {
        return None;
    }

    let mut hosts: BTreeMap<String, u64> = BTreeMap::new();
    let mut ip_dsts: Vec<String> = Vec::new();
    let mut user_agents: Vec<String> = Vec::new();
    let mut languages: Vec<String> = Vec::new();
    let mut header_counts: AHashMap<String, usize> = AHashMap::new();
    let mut total_size: u64 = 0;
    let mut outgoing_info: u64 = 0;
    let mut malicious = false;
    // Single-slot holder for the previously processed request.
    let mut previous: Option<&HttpRequest> = None;

    for request in cluster {
        malicious |= request.malicious;

        // Requests without a host header are skipped for the host map only.
        if let Some(hostname) = request.headers.get("host") {
            *hosts.entry(canonical_domain(hostname)).or_insert(0) += 1;
        }

        if let Some(ip) = &request.dest_ip {
            if !ip_dsts.iter().any(|seen| seen == ip) {
                ip_dsts.push(ip.clone());
            }
        }

        match request.headers.get("user-agent") {
            Some(ua) => {
                if !user_agents.contains(ua) {
                    user_agents.push(ua.clone());
                }
            }
            None => {
                if !user_agents.iter().any(|ua| ua == MISSING_USER_AGENT) {
                    user_agents.push(MISSING_USER_AGENT.to_string());
                }
            }
        }

        if let Some(lang) = request.headers.get("accept-language") {
            if !languages.contains(lang) {
                languages.push(lang.clone());
            }
        }

        for name in request.headers.keys() {
            *header_counts.entry(name.clone()).or_insert(0) += 1;
        }
        total_size += request.encoded_size() as u64;

        // The first request contributes its own encoded size; every later
        // one contributes its delta against the held previous request.
        outgoing_info += match previous {
            None => request.encoded_size() as u64,
            Some(prev) => marginal_cost(request, prev),
        };
        previous = Some(request);
    }

    let total_requests = cluster.len();
    // Presence invariance: a header counts as constant when every request
    // carries it, whatever its values were.
    let mut constant_headers: Vec<String> = header_counts
        .into_iter()
        .filter(|(_, count)| *count == total_requests)
        .map(|(name, _)| name)
        .collect();
    constant_headers.sort_unstable();
    let avg_size = total_size as f64 / total_requests as f64;

    Some(match label {
        Label::Background => Fingerprint::Background {
            method: method.to_string(),
            user_agents,
            hosts,
            ip_dsts,
            constant_headers,
            avg_size,
            outgoing_info,
            malicious,
        },
        Label::Browser => Fingerprint::Browser {
            method: method.to_string(),
            user_agents,
            hosts,
            ip_dsts,
            languages,
            outgoing_info,
            malicious,
        },
    })
}

/// Aggregate independent clusters in parallel. Clusters share no mutable
/// state, so each worker runs its own pass.
pub fn generate_fingerprints(clusters: &[RequestCluster]) -> Vec<Option<Fingerprint>> {
    clusters
        .par_iter()
        .map(|cluster| generate_fingerprint(&cluster.requests, &cluster.method, cluster.label))
        .collect()
}

fn marginal_cost(current: &HttpRequest, previous: &HttpRequest) -> u64 {
    // POST payload size dominates; per-field diffing is skipped for it.
    if current.method == "POST" {
        return current.body_len as u64;
    }

    let mut cost = edit_distance(&current.uri, &previous.uri) as u64 + current.body_len as u64;
    for (name, value) in &current.headers {
        cost += match previous.headers.get(name) {
            Some(prev_value) => edit_distance(value, prev_value) as u64,
            None => value.len() as u64,
        };
    }
    cost
}
