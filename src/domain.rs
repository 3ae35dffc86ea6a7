use std::net::IpAddr;

/// Approximate registrable domain for a Host header value.
///
/// IP literals come back unchanged. Anything else is split on `.` and the
/// last two labels are kept, e.g. `www.example.com` -> `example.com`.
/// For multi-label public suffixes this yields the suffix itself
/// (`a.b.example.co.uk` -> `co.uk`); kept as-is, no suffix-list lookup.
pub fn canonical_domain(hostname: &str) -> String {
    if hostname.parse::<IpAddr>().is_ok() {
        return hostname.to_string();
    }
    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.len() <= 2 {
        hostname.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}
