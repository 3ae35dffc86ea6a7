use crate::fingerprint::{Fingerprint, RowError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: not a JSON array row")]
    NotARow { line: usize },
    #[error("line {line}: row is missing the trailing host field")]
    MissingHost { line: usize },
    #[error("line {line}: {source}")]
    BadRow { line: usize, source: RowError },
}

/// Keeps fingerprints grouped by the host they were observed against and
/// persists them as one JSON array row per line, the fingerprint's flat
/// field list with the host key appended.
///
/// Concurrent writers to the same file must be serialized by the caller.
#[derive(Debug, Default)]
pub struct FingerprintStore {
    by_host: BTreeMap<String, Vec<Fingerprint>>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fingerprint for a host. An absent fingerprint (empty
    /// cluster) is dropped silently.
    pub fn store(&mut self, host: &str, fingerprint: Option<Fingerprint>) {
        if let Some(fingerprint) = fingerprint {
            self.by_host
                .entry(host.to_string())
                .or_default()
                .push(fingerprint);
        }
    }

    pub fn host_fingerprints(&self, host: &str) -> Option<&[Fingerprint]> {
        self.by_host.get(host).map(Vec::as_slice)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.by_host.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_host.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }

    /// Dump every stored fingerprint, replacing the file's contents.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let mut file = File::create(path)?;
        for (host, fingerprints) in &self.by_host {
            for fingerprint in fingerprints {
                writeln!(file, "{}", encode_row(fingerprint, host)?)?;
            }
        }
        Ok(())
    }

    /// Load previously written fingerprints, merging into the store.
    /// Returns how many rows were loaded. A malformed row aborts the load
    /// with the failing line number.
    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize, StoreError> {
        let file = File::open(path)?;
        let mut loaded = 0;
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let (fingerprint, host) = decode_row(&line, idx + 1)?;
            self.by_host.entry(host).or_default().push(fingerprint);
            loaded += 1;
        }
        Ok(loaded)
    }
}

/// Append one fingerprint as soon as it is produced. Used when clusters
/// are aggregated periodically rather than in a single batch; an absent
/// fingerprint appends nothing.
pub fn append_to_file(
    path: impl AsRef<Path>,
    fingerprint: Option<&Fingerprint>,
    host: &str,
) -> Result<(), StoreError> {
    let Some(fingerprint) = fingerprint else {
        return Ok(());
    };
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", encode_row(fingerprint, host)?)?;
    Ok(())
}

fn encode_row(fingerprint: &Fingerprint, host: &str) -> Result<String, StoreError> {
    let mut row = fingerprint.to_row();
    row.push(Value::from(host));
    Ok(serde_json::to_string(&row)?)
}

fn decode_row(line: &str, lineno: usize) -> Result<(Fingerprint, String), StoreError> {
    let parsed: Value = serde_json::from_str(line)?;
    let Value::Array(mut row) = parsed else {
        return Err(StoreError::NotARow { line: lineno });
    };
    let host = match row.pop() {
        Some(Value::String(host)) => host,
        _ => return Err(StoreError::MissingHost { line: lineno }),
    };
    let fingerprint = Fingerprint::from_row(&row).map_err(|source| StoreError::BadRow {
        line: lineno,
        source,
    })?;
    Ok((fingerprint, host))
}
