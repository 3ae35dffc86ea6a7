use std::collections::BTreeMap;

/// One observed HTTP request, as delivered by the upstream traffic parser.
///
/// Header keys are already lower-cased by the parser; this crate does not
/// re-normalize them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    pub body_len: usize,
    pub dest_ip: Option<String>,
    pub malicious: bool,
}

impl HttpRequest {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            method: method.to_string(),
            uri: uri.to_string(),
            headers: BTreeMap::new(),
            body_len: 0,
            dest_ip: None,
            malicious: false,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body_len(mut self, body_len: usize) -> Self {
        self.body_len = body_len;
        self
    }

    pub fn with_dest_ip(mut self, ip: &str) -> Self {
        self.dest_ip = Some(ip.to_string());
        self
    }

    pub fn flagged_malicious(mut self) -> Self {
        self.malicious = true;
        self
    }

    /// Bytes this request puts on the wire, approximated as uri + body +
    /// every header name and value.
    pub fn encoded_size(&self) -> usize {
        let header_bytes: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len())
            .sum();
        self.uri.len() + self.body_len + header_bytes
    }
}
