use httprint::aggregate::{
    generate_fingerprint, generate_fingerprints, RequestCluster, MISSING_USER_AGENT,
};
use httprint::fingerprint::Label;
use httprint::request::HttpRequest;

fn get(uri: &str) -> HttpRequest {
    HttpRequest::new("GET", uri)
}

#[test]
fn empty_cluster_yields_no_fingerprint() {
    assert!(generate_fingerprint(&[], "GET", Label::Browser).is_none());
    assert!(generate_fingerprint(&[], "POST", Label::Background).is_none());
}

#[test]
fn single_request_outgoing_info_is_its_encoded_size() {
    let req = get("/index.html")
        .with_header("host", "www.example.com")
        .with_header("user-agent", "curl/8.0")
        .with_body_len(10);
    let expected = req.encoded_size() as u64;
    let fp = generate_fingerprint(&[req], "GET", Label::Background).unwrap();
    assert_eq!(fp.outgoing_info(), expected);
}

#[test]
fn outgoing_info_depends_on_cluster_order() {
    let r1 = get("/a");
    let r2 = get("/ab");

    let forward = generate_fingerprint(&[r1.clone(), r2.clone()], "GET", Label::Browser).unwrap();
    let reverse = generate_fingerprint(&[r2, r1], "GET", Label::Browser).unwrap();

    // Baseline is the first request's own size (2 vs 3 bytes of uri), the
    // marginal edit distance is 1 either way.
    assert_eq!(forward.outgoing_info(), 3);
    assert_eq!(reverse.outgoing_info(), 4);
    assert_ne!(forward.outgoing_info(), reverse.outgoing_info());
}

fn varied_cluster() -> Vec<HttpRequest> {
    vec![
        get("/a")
            .with_header("host", "www.example.com")
            .with_header("user-agent", "agent-one")
            .with_header("accept-language", "en-US")
            .with_header("x-request-id", "111")
            .with_dest_ip("10.0.0.1"),
        get("/b")
            .with_header("host", "api.example.com")
            .with_header("user-agent", "agent-two")
            .with_header("accept-language", "nl-NL")
            .with_header("x-request-id", "222")
            .with_dest_ip("10.0.0.2"),
        get("/c")
            .with_header("host", "cdn.other.net")
            .with_header("user-agent", "agent-one")
            .with_header("x-request-id", "333")
            .with_body_len(4)
            .with_dest_ip("10.0.0.1"),
    ]
}

#[test]
fn set_and_average_features_ignore_cluster_order() {
    let cluster = varied_cluster();
    let mut shuffled = cluster.clone();
    shuffled.rotate_left(1);
    shuffled.swap(0, 1);

    let a = generate_fingerprint(&cluster, "GET", Label::Browser).unwrap();
    let b = generate_fingerprint(&shuffled, "GET", Label::Browser).unwrap();

    assert_eq!(a.hosts(), b.hosts());

    let sorted = |xs: &[String]| {
        let mut xs = xs.to_vec();
        xs.sort();
        xs
    };
    assert_eq!(sorted(a.ip_dsts()), sorted(b.ip_dsts()));
    assert_eq!(sorted(a.user_agents()), sorted(b.user_agents()));
    assert_eq!(
        sorted(a.languages().unwrap()),
        sorted(b.languages().unwrap())
    );

    let bg_a = generate_fingerprint(&cluster, "GET", Label::Background).unwrap();
    let bg_b = generate_fingerprint(&shuffled, "GET", Label::Background).unwrap();
    assert_eq!(bg_a.constant_headers(), bg_b.constant_headers());
    assert_eq!(bg_a.avg_size(), bg_b.avg_size());
}

#[test]
fn constant_headers_require_presence_in_every_request() {
    // x-request-id appears in all three requests (with different values),
    // accept-language only in two.
    let fp = generate_fingerprint(&varied_cluster(), "GET", Label::Background).unwrap();
    let constant = fp.constant_headers().unwrap();
    assert!(constant.contains(&"x-request-id".to_string()));
    assert!(constant.contains(&"host".to_string()));
    assert!(constant.contains(&"user-agent".to_string()));
    assert!(!constant.contains(&"accept-language".to_string()));
}

#[test]
fn host_counts_use_canonical_domains() {
    let fp = generate_fingerprint(&varied_cluster(), "GET", Label::Browser).unwrap();
    assert_eq!(fp.hosts().get("example.com"), Some(&2));
    assert_eq!(fp.hosts().get("other.net"), Some(&1));
}

#[test]
fn one_malicious_request_marks_the_whole_fingerprint() {
    let cluster = vec![get("/a"), get("/b").flagged_malicious(), get("/c")];
    let fp = generate_fingerprint(&cluster, "GET", Label::Browser).unwrap();
    assert!(fp.is_malicious());

    let benign = vec![get("/a"), get("/b")];
    let fp = generate_fingerprint(&benign, "GET", Label::Browser).unwrap();
    assert!(!fp.is_malicious());
}

#[test]
fn post_marginal_cost_is_body_length_only() {
    let first = HttpRequest::new("POST", "/upload")
        .with_header("host", "upload.example.com")
        .with_body_len(100);
    let second = HttpRequest::new("POST", "/upload/part2")
        .with_header("host", "upload.example.com")
        .with_header("x-chunk", "2")
        .with_body_len(40);

    let baseline = first.encoded_size() as u64;
    let fp = generate_fingerprint(&[first, second], "POST", Label::Background).unwrap();
    // No uri or header diffing for POST, just the second body.
    assert_eq!(fp.outgoing_info(), baseline + 40);
}

#[test]
fn missing_user_agent_adds_placeholder_once() {
    let cluster = vec![get("/a"), get("/b"), get("/c")];
    let fp = generate_fingerprint(&cluster, "GET", Label::Browser).unwrap();
    assert_eq!(fp.user_agents(), [MISSING_USER_AGENT.to_string()]);

    let mixed = vec![
        get("/a"),
        get("/b").with_header("user-agent", "agent-one"),
        get("/c"),
    ];
    let fp = generate_fingerprint(&mixed, "GET", Label::Browser).unwrap();
    assert_eq!(
        fp.user_agents(),
        [MISSING_USER_AGENT.to_string(), "agent-one".to_string()]
    );
}

#[test]
fn requests_without_host_or_ip_are_skipped_for_those_features() {
    let cluster = vec![
        get("/a").with_header("host", "www.example.com").with_dest_ip("10.0.0.1"),
        get("/b"),
    ];
    let fp = generate_fingerprint(&cluster, "GET", Label::Browser).unwrap();
    assert_eq!(fp.hosts().len(), 1);
    assert_eq!(fp.hosts().get("example.com"), Some(&1));
    assert_eq!(fp.ip_dsts(), ["10.0.0.1".to_string()]);
}

#[test]
fn marginal_header_cost_uses_length_for_new_names_and_distance_for_shared() {
    let first = get("/a").with_header("accept", "text/html");
    let second = get("/a")
        .with_header("accept", "text/xml")
        .with_header("range", "bytes=0-99");

    let baseline = first.encoded_size() as u64;
    let fp = generate_fingerprint(&[first, second], "GET", Label::Browser).unwrap();
    // uri unchanged (0) + accept diff ("html" -> "xml" = 2) + full value
    // length of the new range header (10).
    assert_eq!(fp.outgoing_info(), baseline + 2 + 10);
}

#[test]
fn parallel_batch_matches_sequential_aggregation() {
    let clusters: Vec<RequestCluster> = (0..8)
        .map(|i| RequestCluster {
            label: if i % 2 == 0 { Label::Browser } else { Label::Background },
            method: "GET".to_string(),
            requests: if i == 3 { Vec::new() } else { varied_cluster() },
        })
        .collect();

    let parallel = generate_fingerprints(&clusters);
    for (cluster, result) in clusters.iter().zip(&parallel) {
        let sequential = generate_fingerprint(&cluster.requests, &cluster.method, cluster.label);
        assert_eq!(result, &sequential);
    }
    assert!(parallel[3].is_none());
}
