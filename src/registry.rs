//! # Node Registry Module
//!
//! This module provides functionality for discovering and deduplicating the set
//! of nodes to scan. It merges the seed node, the registry advertised by the
//! seed's `/api/nodes` endpoint, and any operator supplied extra URLs into one
//! order-stable candidate list, and re-attaches registry metadata to scan
//! results by node identity.
//!
//! Node identity is `(host, port)`; two URL strings that differ only in scheme
//! case, trailing slash, or an explicitly spelled-out default port resolve to
//! the same node.
use std::collections::{HashMap, HashSet};
use std::fmt;
use url::Url;

/// Canonicalizes a user or registry supplied address into a comparable base
/// URL of the form `scheme://host[:port]`.
///
/// Blank or unparseable input degrades to the empty string so callers can
/// filter it out; this function never fails. A missing scheme is assumed to be
/// `https`. Any path, query, or trailing slash is stripped, and a port that
/// matches the scheme default collapses to the omitted form.
pub fn normalize_base_url(raw: &str) -> String {
    let text = raw.trim();
    if text.is_empty() {
        return String::new();
    }
    let with_scheme = if text.contains("://") {
        text.to_string()
    } else {
        format!("https://{}", text)
    };
    let parsed = match Url::parse(&with_scheme) {
        Ok(url) => url,
        Err(_) => return String::new(),
    };
    let host = match parsed.host_str() {
        Some(host) => host,
        None => return String::new(),
    };
    match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    }
}

/// Comparable node identity. Port defaults by scheme when the URL omits it:
/// 443 for https, 80 otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    pub host: String,
    pub port: u16,
}

impl NodeIdentity {
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_string();
        let port = parsed
            .port_or_known_default()
            .unwrap_or(if parsed.scheme() == "https" { 443 } else { 80 });
        Some(NodeIdentity { host, port })
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Where a candidate URL came from. Reconciliation order is seed first, then
/// registry rows in registry order, then operator extras in the given order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOrigin {
    Seed,
    Registry,
    Operator,
}

#[derive(Debug, Clone)]
pub struct NodeCandidate {
    pub url: String,
    pub origin: CandidateOrigin,
}

/// One row of the node registry as advertised by the seed. Every field is
/// tolerant of absence; rows that fail deserialization entirely are skipped at
/// the payload boundary rather than aborting the scan.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct RegistryRow {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub wallet: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Extracts registry rows from the `/api/nodes` payload. Accepts both the
/// wrapped `{"nodes": [...]}` shape and a bare list; rows that are not objects
/// of the expected shape are dropped.
pub fn registry_rows_from_payload(payload: &serde_json::Value) -> Vec<RegistryRow> {
    let rows: &[serde_json::Value] = match payload {
        serde_json::Value::Object(map) => match map.get("nodes") {
            Some(serde_json::Value::Array(rows)) => rows.as_slice(),
            _ => &[],
        },
        serde_json::Value::Array(rows) => rows.as_slice(),
        _ => &[],
    };
    rows.iter()
        .filter(|row| row.is_object())
        .filter_map(|row| serde_json::from_value(row.clone()).ok())
        .collect()
}

/// Indexes registry rows by node identity. Rows without a resolvable URL do
/// not appear in the map; they are surfaced later via
/// [`missing_registry_rows`].
pub fn registry_map(rows: &[RegistryRow]) -> HashMap<NodeIdentity, RegistryRow> {
    let mut mapped = HashMap::new();
    for row in rows {
        let normalized = normalize_base_url(&row.url);
        if normalized.is_empty() {
            continue;
        }
        if let Some(identity) = NodeIdentity::from_url(&normalized) {
            mapped.entry(identity).or_insert_with(|| row.clone());
        }
    }
    mapped
}

/// Merges the seed, registry URLs, and operator extras into one deduplicated
/// candidate list. Each URL is normalized, empties are dropped, and the first
/// occurrence of an identity wins both its position and its normalized form.
/// The output order depends only on the input order.
pub fn reconcile(
    seed_url: &str,
    registry_rows: &[RegistryRow],
    operator_urls: &[String],
) -> Vec<NodeCandidate> {
    let mut sourced: Vec<(String, CandidateOrigin)> =
        vec![(seed_url.to_string(), CandidateOrigin::Seed)];
    for row in registry_rows {
        if !row.url.trim().is_empty() {
            sourced.push((row.url.clone(), CandidateOrigin::Registry));
        }
    }
    for url in operator_urls {
        sourced.push((url.clone(), CandidateOrigin::Operator));
    }

    let mut seen: HashSet<NodeIdentity> = HashSet::new();
    let mut candidates = Vec::new();
    for (raw, origin) in sourced {
        let normalized = normalize_base_url(&raw);
        if normalized.is_empty() {
            continue;
        }
        let identity = match NodeIdentity::from_url(&normalized) {
            Some(identity) => identity,
            None => continue,
        };
        if seen.insert(identity) {
            candidates.push(NodeCandidate {
                url: normalized,
                origin,
            });
        }
    }
    candidates
}

/// Registry rows that must be surfaced as synthetic report rows: either the
/// row carries no resolvable URL (redacted) or its identity was never queried
/// this pass. Guarantees every registry row appears exactly once in the final
/// output.
pub fn missing_registry_rows<'a>(
    registry_rows: &'a [RegistryRow],
    queried: &HashSet<NodeIdentity>,
) -> Vec<&'a RegistryRow> {
    registry_rows
        .iter()
        .filter(|row| {
            let normalized = normalize_base_url(&row.url);
            if normalized.is_empty() {
                return true;
            }
            match NodeIdentity::from_url(&normalized) {
                Some(identity) => !queried.contains(&identity),
                None => true,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_https_and_strips_path() {
        assert_eq!(
            normalize_base_url("50.28.86.131"),
            "https://50.28.86.131".to_string()
        );
        assert_eq!(
            normalize_base_url("http://example.com/api/nodes?x=1"),
            "http://example.com".to_string()
        );
        assert_eq!(
            normalize_base_url("  https://example.com/  "),
            "https://example.com".to_string()
        );
    }

    #[test]
    fn normalize_degrades_to_empty() {
        assert_eq!(normalize_base_url(""), "");
        assert_eq!(normalize_base_url("   "), "");
        assert_eq!(normalize_base_url("https://"), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_base_url("HTTPS://Example.com:8443/path/");
        let twice = normalize_base_url(&once);
        assert_eq!(once, "https://example.com:8443");
        assert_eq!(once, twice);
    }

    #[test]
    fn identity_matches_across_url_spellings() {
        let spellings = [
            "https://example.com",
            "HTTPS://example.com/",
            "https://example.com:443",
            "example.com",
        ];
        let identities: Vec<NodeIdentity> = spellings
            .iter()
            .map(|raw| NodeIdentity::from_url(&normalize_base_url(raw)).unwrap())
            .collect();
        for identity in &identities {
            assert_eq!(identity, &identities[0]);
        }
        assert_eq!(identities[0].to_string(), "example.com:443");
    }

    #[test]
    fn identity_port_defaults_by_scheme() {
        let https = NodeIdentity::from_url(&normalize_base_url("https://a.example")).unwrap();
        let http = NodeIdentity::from_url(&normalize_base_url("http://a.example")).unwrap();
        assert_eq!(https.port, 443);
        assert_eq!(http.port, 80);
    }

    fn row(url: &str) -> RegistryRow {
        RegistryRow {
            url: url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn reconcile_dedupes_by_identity_keeping_first_seen_order() {
        let registry = vec![
            row("https://node-b.example"),
            row("https://seed.example:443/"),
            row("http://node-c.example"),
        ];
        let operator = vec![
            "node-b.example".to_string(),
            "https://node-d.example".to_string(),
            "".to_string(),
        ];
        let candidates = reconcile("https://seed.example", &registry, &operator);

        let urls: Vec<&str> = candidates.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://seed.example",
                "https://node-b.example",
                "http://node-c.example",
                "https://node-d.example",
            ]
        );
        assert_eq!(candidates[0].origin, CandidateOrigin::Seed);
        assert_eq!(candidates[1].origin, CandidateOrigin::Registry);
        assert_eq!(candidates[3].origin, CandidateOrigin::Operator);
    }

    #[test]
    fn registry_rows_accepts_wrapped_and_bare_payloads() {
        let wrapped = serde_json::json!({
            "nodes": [
                {"url": "https://a.example", "node_id": "a"},
                "junk",
                {"url": 42},
                {"url": "https://b.example", "is_active": true},
            ]
        });
        let rows = registry_rows_from_payload(&wrapped);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].node_id.as_deref(), Some("a"));
        assert_eq!(rows[1].is_active, Some(true));

        let bare = serde_json::json!([{"url": "https://c.example"}]);
        assert_eq!(registry_rows_from_payload(&bare).len(), 1);

        assert!(registry_rows_from_payload(&serde_json::json!("nope")).is_empty());
    }

    #[test]
    fn registry_map_keys_by_identity() {
        let rows = vec![row("https://a.example:443/x"), row(""), row("not a url //")];
        let map = registry_map(&rows);
        assert_eq!(map.len(), 1);
        let identity = NodeIdentity::from_url("https://a.example").unwrap();
        assert!(map.contains_key(&identity));
    }

    #[test]
    fn missing_rows_cover_blank_urls_and_unqueried_identities() {
        let rows = vec![row(""), row("https://a.example"), row("https://b.example")];
        let mut queried = HashSet::new();
        queried.insert(NodeIdentity::from_url("https://a.example").unwrap());

        let missing = missing_registry_rows(&rows, &queried);
        assert_eq!(missing.len(), 2);
        assert_eq!(missing[0].url, "");
        assert_eq!(missing[1].url, "https://b.example");
    }
}
