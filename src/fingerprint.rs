use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RowError {
    #[error("label {0:?} is not \"Browser\" or \"Background\"")]
    InvalidLabel(String),
    #[error("{label} row has {got} fields, expected {want}")]
    WrongLength {
        label: Label,
        want: usize,
        got: usize,
    },
    #[error("field {index} ({name}): expected {expected}")]
    FieldType {
        index: usize,
        name: &'static str,
        expected: &'static str,
    },
}

/// Application class a cluster was attributed to. Closed set: anything
/// else fails at the textual boundary and never reaches the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Background,
    Browser,
}

impl FromStr for Label {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, RowError> {
        match s {
            "Background" => Ok(Label::Background),
            "Browser" => Ok(Label::Browser),
            other => Err(RowError::InvalidLabel(other.to_string())),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Background => write!(f, "Background"),
            Label::Browser => write!(f, "Browser"),
        }
    }
}

/// Behavioral signature of one request cluster. The label selects the
/// variant, and only that variant's extra fields exist: constant header
/// names and average request size for background applications, observed
/// accept-language values for browsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "label")]
pub enum Fingerprint {
    Background {
        method: String,
        user_agents: Vec<String>,
        hosts: BTreeMap<String, u64>,
        ip_dsts: Vec<String>,
        constant_headers: Vec<String>,
        avg_size: f64,
        outgoing_info: u64,
        malicious: bool,
    },
    Browser {
        method: String,
        user_agents: Vec<String>,
        hosts: BTreeMap<String, u64>,
        ip_dsts: Vec<String>,
        languages: Vec<String>,
        outgoing_info: u64,
        malicious: bool,
    },
}

const BACKGROUND_ROW_LEN: usize = 9;
const BROWSER_ROW_LEN: usize = 8;

impl Fingerprint {
    pub fn label(&self) -> Label {
        match self {
            Fingerprint::Background { .. } => Label::Background,
            Fingerprint::Browser { .. } => Label::Browser,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            Fingerprint::Background { method, .. } | Fingerprint::Browser { method, .. } => method,
        }
    }

    pub fn user_agents(&self) -> &[String] {
        match self {
            Fingerprint::Background { user_agents, .. }
            | Fingerprint::Browser { user_agents, .. } => user_agents,
        }
    }

    pub fn hosts(&self) -> &BTreeMap<String, u64> {
        match self {
            Fingerprint::Background { hosts, .. } | Fingerprint::Browser { hosts, .. } => hosts,
        }
    }

    pub fn ip_dsts(&self) -> &[String] {
        match self {
            Fingerprint::Background { ip_dsts, .. } | Fingerprint::Browser { ip_dsts, .. } => {
                ip_dsts
            }
        }
    }

    pub fn outgoing_info(&self) -> u64 {
        match self {
            Fingerprint::Background { outgoing_info, .. }
            | Fingerprint::Browser { outgoing_info, .. } => *outgoing_info,
        }
    }

    pub fn is_malicious(&self) -> bool {
        match self {
            Fingerprint::Background { malicious, .. } | Fingerprint::Browser { malicious, .. } => {
                *malicious
            }
        }
    }

    /// Background-only; `None` for browser fingerprints.
    pub fn constant_headers(&self) -> Option<&[String]> {
        match self {
            Fingerprint::Background {
                constant_headers, ..
            } => Some(constant_headers),
            Fingerprint::Browser { .. } => None,
        }
    }

    /// Background-only; `None` for browser fingerprints.
    pub fn avg_size(&self) -> Option<f64> {
        match self {
            Fingerprint::Background { avg_size, .. } => Some(*avg_size),
            Fingerprint::Browser { .. } => None,
        }
    }

    /// Browser-only; `None` for background fingerprints.
    pub fn languages(&self) -> Option<&[String]> {
        match self {
            Fingerprint::Background { .. } => None,
            Fingerprint::Browser { languages, .. } => Some(languages),
        }
    }

    /// Flat ordered field list handed to the persistence layer. List and
    /// map fields are native JSON values, so they round-trip without any
    /// ad hoc quoting. The store appends the host key as a trailing field.
    pub fn to_row(&self) -> Vec<Value> {
        match self {
            Fingerprint::Background {
                method,
                user_agents,
                hosts,
                ip_dsts,
                constant_headers,
                avg_size,
                outgoing_info,
                malicious,
            } => vec![
                json!("Background"),
                json!(method),
                json!(user_agents),
                json!(hosts),
                json!(ip_dsts),
                json!(constant_headers),
                json!(avg_size),
                json!(outgoing_info),
                json!(malicious),
            ],
            Fingerprint::Browser {
                method,
                user_agents,
                hosts,
                ip_dsts,
                languages,
                outgoing_info,
                malicious,
            } => vec![
                json!("Browser"),
                json!(method),
                json!(user_agents),
                json!(hosts),
                json!(ip_dsts),
                json!(languages),
                json!(outgoing_info),
                json!(malicious),
            ],
        }
    }

    /// Rebuild a fingerprint from a persisted row (without the trailing
    /// host key). The label field decides which layout is expected.
    pub fn from_row(row: &[Value]) -> Result<Fingerprint, RowError> {
        let label = take_str(row, 0, "label")?.parse::<Label>()?;
        let want = match label {
            Label::Background => BACKGROUND_ROW_LEN,
            Label::Browser => BROWSER_ROW_LEN,
        };
        if row.len() != want {
            return Err(RowError::WrongLength {
                label,
                want,
                got: row.len(),
            });
        }
        match label {
            Label::Background => Ok(Fingerprint::Background {
                method: take_str(row, 1, "method")?,
                user_agents: take_string_list(row, 2, "user_agents")?,
                hosts: take_host_counts(row, 3, "hosts")?,
                ip_dsts: take_string_list(row, 4, "ip_dsts")?,
                constant_headers: take_string_list(row, 5, "constant_headers")?,
                avg_size: take_f64(row, 6, "avg_size")?,
                outgoing_info: take_u64(row, 7, "outgoing_info")?,
                malicious: take_bool(row, 8, "malicious")?,
            }),
            Label::Browser => Ok(Fingerprint::Browser {
                method: take_str(row, 1, "method")?,
                user_agents: take_string_list(row, 2, "user_agents")?,
                hosts: take_host_counts(row, 3, "hosts")?,
                ip_dsts: take_string_list(row, 4, "ip_dsts")?,
                languages: take_string_list(row, 5, "languages")?,
                outgoing_info: take_u64(row, 6, "outgoing_info")?,
                malicious: take_bool(row, 7, "malicious")?,
            }),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Background {
                method,
                user_agents,
                hosts,
                ip_dsts,
                constant_headers,
                avg_size,
                outgoing_info,
                malicious,
            } => {
                writeln!(f, "Background Application:")?;
                writeln!(f, "    Method: {method}")?;
                writeln!(f, "    User-Agent: {}", user_agents.iter().join(", "))?;
                writeln!(
                    f,
                    "    Hosts: {}",
                    hosts
                        .iter()
                        .map(|(host, count)| format!("{host} ({count})"))
                        .join(", ")
                )?;
                writeln!(f, "    Destination IPs: {}", ip_dsts.iter().join(", "))?;
                writeln!(
                    f,
                    "    Constant Headers: {}",
                    constant_headers.iter().join(", ")
                )?;
                writeln!(f, "    Average Req Size: {avg_size}")?;
                writeln!(f, "    Outgoing Info: {outgoing_info}")?;
                write!(f, "    Is malicious: {malicious}")
            }
            // Full host/IP collections grow too large to print for browsers;
            // show unique counts instead.
            Fingerprint::Browser {
                method,
                user_agents,
                hosts,
                ip_dsts,
                languages,
                outgoing_info,
                malicious,
            } => {
                writeln!(f, "Browser Application:")?;
                writeln!(f, "    Method: {method}")?;
                writeln!(f, "    User-Agent: {}", user_agents.iter().join(", "))?;
                writeln!(f, "    Unique Hosts: {}", hosts.len())?;
                writeln!(f, "    Unique destination IPs: {}", ip_dsts.len())?;
                writeln!(f, "    Language: {}", languages.iter().join(", "))?;
                writeln!(f, "    Outgoing Info: {outgoing_info}")?;
                write!(f, "    Is malicious: {malicious}")
            }
        }
    }
}

fn field<'a>(row: &'a [Value], index: usize, name: &'static str) -> Result<&'a Value, RowError> {
    row.get(index).ok_or(RowError::FieldType {
        index,
        name,
        expected: "present",
    })
}

fn take_str(row: &[Value], index: usize, name: &'static str) -> Result<String, RowError> {
    field(row, index, name)?
        .as_str()
        .map(str::to_string)
        .ok_or(RowError::FieldType {
            index,
            name,
            expected: "string",
        })
}

fn take_string_list(row: &[Value], index: usize, name: &'static str) -> Result<Vec<String>, RowError> {
    let items = field(row, index, name)?
        .as_array()
        .ok_or(RowError::FieldType {
            index,
            name,
            expected: "array of strings",
        })?;
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()
        .ok_or(RowError::FieldType {
            index,
            name,
            expected: "array of strings",
        })
}

fn take_host_counts(
    row: &[Value],
    index: usize,
    name: &'static str,
) -> Result<BTreeMap<String, u64>, RowError> {
    let map = field(row, index, name)?
        .as_object()
        .ok_or(RowError::FieldType {
            index,
            name,
            expected: "object of counts",
        })?;
    map.iter()
        .map(|(host, count)| count.as_u64().map(|c| (host.clone(), c)))
        .collect::<Option<BTreeMap<String, u64>>>()
        .ok_or(RowError::FieldType {
            index,
            name,
            expected: "object of counts",
        })
}

fn take_f64(row: &[Value], index: usize, name: &'static str) -> Result<f64, RowError> {
    field(row, index, name)?.as_f64().ok_or(RowError::FieldType {
        index,
        name,
        expected: "number",
    })
}

fn take_u64(row: &[Value], index: usize, name: &'static str) -> Result<u64, RowError> {
    field(row, index, name)?.as_u64().ok_or(RowError::FieldType {
        index,
        name,
        expected: "unsigned integer",
    })
}

fn take_bool(row: &[Value], index: usize, name: &'static str) -> Result<bool, RowError> {
    field(row, index, name)?
        .as_bool()
        .ok_or(RowError::FieldType {
            index,
            name,
            expected: "bool",
        })
}
