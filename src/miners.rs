//! # Miner Aggregation Module
//!
//! Merges the per-node miner sighting lists into one record per miner. A miner
//! may be reported by zero, one, or many nodes with differing timestamps; the
//! merge keeps the freshest attestation (`latest_of`) and the union of
//! observing nodes, while descriptive fields follow first-wins (`first_of`).
//! The two merge policies are separate named operations so each is visible
//! and testable on its own.
//!
//! Also hosts the operator expectation list: loading expected miner ids from a
//! newline-delimited file and computing the set of expected-but-unobserved
//! miners.
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// One row of a node's `/api/miners` response. Everything except the miner id
/// is optional; rows with a blank id are discarded during aggregation.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct MinerSighting {
    #[serde(default)]
    pub miner: String,
    #[serde(default)]
    pub last_attest: Option<i64>,
    #[serde(default)]
    pub first_attest: Option<i64>,
    #[serde(default)]
    pub device_family: Option<String>,
    #[serde(default)]
    pub device_arch: Option<String>,
    #[serde(default)]
    pub hardware_type: Option<String>,
    #[serde(default)]
    pub entropy_score: Option<f64>,
    #[serde(default)]
    pub antiquity_multiplier: Option<f64>,
}

/// Extracts sightings from a `/api/miners` payload. The payload must be a
/// list; entries that are not objects of the expected shape are dropped.
pub fn sightings_from_payload(payload: &serde_json::Value) -> Vec<MinerSighting> {
    match payload {
        serde_json::Value::Array(rows) => rows
            .iter()
            .filter(|row| row.is_object())
            .filter_map(|row| serde_json::from_value(row.clone()).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Aggregated view of one miner across every node that reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct MinerRecord {
    pub miner: String,
    pub last_attest: Option<i64>,
    pub first_attest: Option<i64>,
    pub device_family: Option<String>,
    pub device_arch: Option<String>,
    pub hardware_type: Option<String>,
    pub entropy_score: Option<f64>,
    pub antiquity_multiplier: Option<f64>,
    /// Node URLs that reported this miner, in encounter order, deduplicated.
    pub nodes_seen: Vec<String>,
}

/// Freshest-wins merge for attestation timestamps. Non-positive candidates do
/// not contribute, and the result never decreases as sightings fold in,
/// regardless of input order.
pub fn latest_of(current: Option<i64>, candidate: Option<i64>) -> Option<i64> {
    let candidate = candidate.filter(|ts| *ts > 0);
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// First-wins merge for descriptive fields: once a value is set, later
/// sightings never overwrite it.
pub fn first_of<T>(current: Option<T>, candidate: Option<T>) -> Option<T> {
    current.or(candidate)
}

/// Folds per-node sighting lists into one record per miner, keyed by miner id.
///
/// The input is the scan-ordered sequence of `(node_url, sightings)` pairs so
/// first-wins fields resolve deterministically; `last_attest` and the
/// `nodes_seen` membership are order-independent by construction. Sightings
/// with a blank miner id are skipped.
pub fn aggregate(node_sightings: &[(String, Vec<MinerSighting>)]) -> BTreeMap<String, MinerRecord> {
    let mut records: BTreeMap<String, MinerRecord> = BTreeMap::new();
    for (node_url, sightings) in node_sightings {
        for sighting in sightings {
            let miner_id = sighting.miner.trim();
            if miner_id.is_empty() {
                continue;
            }
            match records.entry(miner_id.to_string()) {
                Entry::Vacant(slot) => {
                    slot.insert(MinerRecord {
                        miner: miner_id.to_string(),
                        last_attest: latest_of(None, sighting.last_attest),
                        first_attest: sighting.first_attest,
                        device_family: sighting.device_family.clone(),
                        device_arch: sighting.device_arch.clone(),
                        hardware_type: sighting.hardware_type.clone(),
                        entropy_score: sighting.entropy_score,
                        antiquity_multiplier: sighting.antiquity_multiplier,
                        nodes_seen: vec![node_url.clone()],
                    });
                }
                Entry::Occupied(slot) => {
                    let existing = slot.into_mut();
                    existing.last_attest = latest_of(existing.last_attest, sighting.last_attest);
                    existing.first_attest =
                        first_of(existing.first_attest, sighting.first_attest);
                    existing.device_family =
                        first_of(existing.device_family.take(), sighting.device_family.clone());
                    existing.device_arch =
                        first_of(existing.device_arch.take(), sighting.device_arch.clone());
                    existing.hardware_type =
                        first_of(existing.hardware_type.take(), sighting.hardware_type.clone());
                    existing.entropy_score =
                        first_of(existing.entropy_score, sighting.entropy_score);
                    existing.antiquity_multiplier = first_of(
                        existing.antiquity_multiplier,
                        sighting.antiquity_multiplier,
                    );
                    if !existing.nodes_seen.iter().any(|seen| seen == node_url) {
                        existing.nodes_seen.push(node_url.clone());
                    }
                }
            }
        }
    }
    records
}

/// Loads expected miner ids from a newline-delimited file. Supports full-line
/// and trailing `#` comments plus comma or whitespace separated ids. An empty
/// path yields an empty set; a path that does not exist is a configuration
/// error.
pub fn load_expected_miners(path: &str) -> Result<HashSet<String>, String> {
    let mut expected = HashSet::new();
    if path.is_empty() {
        return Ok(expected);
    }
    if !Path::new(path).exists() {
        return Err(format!("expected miners file not found: {}", path));
    }
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read expected miners file {}: {}", path, err))?;

    for line in contents.lines() {
        let mut text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        if let Some(pos) = text.find('#') {
            text = text[..pos].trim();
        }
        for token in text.replace(',', " ").split_whitespace() {
            expected.insert(token.to_string());
        }
    }
    Ok(expected)
}

/// Expected miner ids absent from every record this run, sorted ascending for
/// deterministic report output.
pub fn missing_expected(
    expected: &HashSet<String>,
    observed: &HashSet<String>,
) -> Vec<String> {
    let mut missing: Vec<String> = expected.difference(observed).cloned().collect();
    missing.sort();
    missing
}
