//! # Scan Orchestration Module
//!
//! Drives one reconciliation pass: query the seed for network identity and the
//! node registry, reconcile the candidate list, probe every candidate
//! concurrently, then fold the raw observations through the pure classifiers
//! into the final [`Report`].
//!
//! Probes run on a bounded worker pool. Each spawned probe writes exactly one
//! indexed result slot and the slots are merged after every probe completes,
//! so the report's row order follows the first-seen candidate order no matter
//! how the network fan-out interleaves. A node that times out or errors
//! degrades to offline in its own row; it never aborts the rest of the pass.
use crate::classify::{classify_miner_age, classify_node_host, MinerAction, MinerState, NodeAction};
use crate::config::Config;
use crate::fetch::{FetchError, Fetcher};
use crate::miners::{self, MinerSighting};
use crate::registry::{self, NodeIdentity, RegistryRow};
use crate::report::{
    now_utc_iso, now_utc_ts, ts_to_utc, MinerRow, MissingMinerRow, NetworkInfo, NodeRow,
    QueryErrors, Report, Summary, VersionMismatchRow,
};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Raw result of probing one candidate node: the health and miner-list
/// fetches, either of which may have failed independently.
struct NodeProbe {
    url: String,
    health: Result<serde_json::Value, FetchError>,
    miners: Result<serde_json::Value, FetchError>,
}

pub struct Scanner {
    fetcher: Arc<dyn Fetcher>,
    config: Arc<Config>,
}

impl Scanner {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: Arc<Config>) -> Self {
        Scanner { fetcher, config }
    }

    /// Runs one full pass and compiles the report. Infallible by design: all
    /// network failures degrade into per-row error fields, and an unreachable
    /// seed yields an all-offline report flagged in the summary.
    pub async fn build_report(&self, expected_miners: &HashSet<String>) -> Report {
        let now_ts = now_utc_ts();
        let generated_at = now_utc_iso();
        let seed = registry::normalize_base_url(&self.config.seed_node);

        let (seed_health, epoch_payload, nodes_payload) = tokio::join!(
            self.fetcher.fetch_json(&seed, "/health"),
            self.fetcher.fetch_json(&seed, "/epoch"),
            self.fetcher.fetch_json(&seed, "/api/nodes"),
        );

        let query_errors = QueryErrors {
            seed_health: seed_health.as_ref().err().map(|e| e.to_string()),
            seed_epoch: epoch_payload.as_ref().err().map(|e| e.to_string()),
            seed_nodes: nodes_payload.as_ref().err().map(|e| e.to_string()),
        };
        if let Some(code) = &query_errors.seed_nodes {
            eprintln!("registry fetch from seed {} failed: {}", seed, code);
        }

        let network_version = seed_health
            .as_ref()
            .ok()
            .and_then(|payload| payload.get("version"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let registry_rows = nodes_payload
            .as_ref()
            .map(registry::registry_rows_from_payload)
            .unwrap_or_default();
        let registry_map = registry::registry_map(&registry_rows);

        let candidates =
            registry::reconcile(&seed, &registry_rows, &self.config.extra_node_urls);
        println!("Scanning {} candidate node(s)", candidates.len());

        let probes = self.probe_candidates(&candidates).await;

        let mut node_rows: Vec<NodeRow> = Vec::new();
        let mut node_miners: Vec<(String, Vec<MinerSighting>)> = Vec::new();
        let mut version_mismatch: Vec<VersionMismatchRow> = Vec::new();
        let mut queried: HashSet<NodeIdentity> = HashSet::new();

        for probe in &probes {
            let identity = match NodeIdentity::from_url(&probe.url) {
                Some(identity) => identity,
                None => continue,
            };
            queried.insert(identity.clone());
            let row = registry_map.get(&identity);

            node_rows.push(build_node_row(
                probe,
                &identity,
                row,
                &seed,
                &network_version,
                &mut version_mismatch,
            ));

            let sightings = probe
                .miners
                .as_ref()
                .map(miners::sightings_from_payload)
                .unwrap_or_default();
            node_miners.push((probe.url.clone(), sightings));
        }

        // Registry entries with no public URL (redacted/missing) stay visible
        // in payout review output instead of silently disappearing.
        for row in registry::missing_registry_rows(&registry_rows, &queried) {
            node_rows.push(missing_url_row(row));
        }

        let records = miners::aggregate(&node_miners);
        let mut miner_rows: Vec<MinerRow> = records
            .values()
            .map(|record| {
                let verdict = classify_miner_age(
                    record.last_attest,
                    now_ts,
                    self.config.active_window_hours,
                    self.config.weekly_window_hours,
                );
                let mut nodes_seen = record.nodes_seen.clone();
                nodes_seen.sort();
                MinerRow {
                    miner: record.miner.clone(),
                    last_attest: record.last_attest,
                    last_attest_utc: ts_to_utc(record.last_attest),
                    first_attest: record.first_attest,
                    age_h: verdict.age_h,
                    state: verdict.state,
                    weekly_eligible: verdict.weekly_eligible,
                    suggested_action: verdict.suggested_action,
                    device_family: record.device_family.clone(),
                    device_arch: record.device_arch.clone(),
                    hardware_type: record.hardware_type.clone(),
                    entropy_score: record.entropy_score,
                    antiquity_multiplier: record.antiquity_multiplier,
                    node_count: nodes_seen.len(),
                    nodes_seen,
                }
            })
            .collect();
        miner_rows.sort_by(compare_miner_rows);

        let observed: HashSet<String> = miner_rows.iter().map(|m| m.miner.clone()).collect();
        let expected_miners_missing_rows: Vec<MissingMinerRow> =
            miners::missing_expected(expected_miners, &observed)
                .into_iter()
                .map(|miner| MissingMinerRow {
                    miner,
                    state: MinerState::NotVisibleInPublicApi,
                    weekly_eligible: false,
                    suggested_action: MinerAction::CheckNodeUrlThenUpgradeMiner,
                })
                .collect();

        let summary = Summary {
            nodes_scanned: node_rows.len(),
            active_nodes_online: node_rows
                .iter()
                .filter(|n| n.is_active && n.online)
                .count(),
            active_nodes_offline: node_rows
                .iter()
                .filter(|n| n.is_active && !n.online)
                .count(),
            node_hosts_weekly_payout_eligible: node_rows
                .iter()
                .filter(|n| n.payout_eligible)
                .count(),
            miners_observed: miner_rows.len(),
            miners_weekly_payout_eligible: miner_rows
                .iter()
                .filter(|m| m.weekly_eligible)
                .count(),
            expected_miners_missing: expected_miners_missing_rows.len(),
            version_mismatch_nodes: version_mismatch.len(),
            seed_reachable: query_errors.seed_health.is_none(),
        };

        Report {
            generated_at,
            seed_node: seed,
            query_errors,
            network: NetworkInfo {
                version: network_version,
                epoch: epoch_payload.ok().filter(|v| v.is_object()),
                health: seed_health.ok().filter(|v| v.is_object()),
            },
            summary,
            nodes: node_rows,
            miners: miner_rows,
            expected_miners_missing_rows,
            version_mismatch_nodes: version_mismatch,
        }
    }

    /// Probes every candidate on a bounded pool. Health and miner-list
    /// fetches for one node run concurrently; results land in per-candidate
    /// slots so output order never depends on completion order.
    async fn probe_candidates(&self, candidates: &[registry::NodeCandidate]) -> Vec<NodeProbe> {
        let semaphore = Arc::new(Semaphore::new(self.config.scan_concurrency.max(1)));
        let mut handles = Vec::with_capacity(candidates.len());

        for (index, candidate) in candidates.iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            let url = candidate.url.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let (health, miners) = tokio::join!(
                    fetcher.fetch_json(&url, "/health"),
                    fetcher.fetch_json(&url, "/api/miners"),
                );
                (index, NodeProbe { url, health, miners })
            }));
        }

        let mut slots: Vec<Option<NodeProbe>> =
            (0..candidates.len()).map(|_| None).collect();
        for joined in futures::future::join_all(handles).await {
            if let Ok((index, probe)) = joined {
                slots[index] = Some(probe);
            }
        }
        slots.into_iter().flatten().collect()
    }
}

fn build_node_row(
    probe: &NodeProbe,
    identity: &NodeIdentity,
    registry_row: Option<&RegistryRow>,
    seed: &str,
    network_version: &str,
    version_mismatch: &mut Vec<VersionMismatchRow>,
) -> NodeRow {
    let health_obj = probe.health.as_ref().ok().and_then(|v| v.as_object());
    let online = health_obj.is_some();
    let node_version = health_obj
        .and_then(|h| h.get("version"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let uptime_s = health_obj.and_then(|h| h.get("uptime_s")).and_then(|v| v.as_f64());
    let health_ok = health_obj
        .and_then(|h| h.get("ok"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let is_active = registry_row
        .and_then(|row| row.is_active)
        .unwrap_or(probe.url == seed);

    let (payout_eligible, action) =
        classify_node_host(is_active, online, &node_version, network_version);

    if action == NodeAction::PayWeeklyAndUpgradeNode {
        version_mismatch.push(VersionMismatchRow {
            node_url: probe.url.clone(),
            node_id: registry_row.and_then(|row| row.node_id.clone()),
            node_version: node_version.clone(),
            network_version: network_version.to_string(),
        });
    }

    NodeRow {
        node_id: registry_row
            .and_then(|row| row.node_id.clone())
            .unwrap_or_else(|| identity.to_string()),
        name: registry_row
            .and_then(|row| row.name.clone())
            .unwrap_or_else(|| identity.to_string()),
        wallet: registry_row.and_then(|row| row.wallet.clone()),
        url: probe.url.clone(),
        is_active,
        online,
        health_ok,
        version: node_version,
        uptime_s,
        payout_eligible,
        suggested_action: action,
        health_error: probe.health.as_ref().err().map(|e| e.to_string()),
        miners_error: probe.miners.as_ref().err().map(|e| e.to_string()),
    }
}

fn missing_url_row(row: &RegistryRow) -> NodeRow {
    let normalized = registry::normalize_base_url(&row.url);
    NodeRow {
        node_id: row
            .node_id
            .clone()
            .unwrap_or_else(|| "unknown_node".to_string()),
        name: row
            .name
            .clone()
            .unwrap_or_else(|| "unknown_node".to_string()),
        wallet: row.wallet.clone(),
        url: if normalized.is_empty() {
            "-".to_string()
        } else {
            normalized
        },
        is_active: row.is_active.unwrap_or(false),
        online: false,
        health_ok: false,
        version: "-".to_string(),
        uptime_s: None,
        payout_eligible: false,
        suggested_action: NodeAction::MissingUrlOrRedacted,
        health_error: Some("missing_url".to_string()),
        miners_error: Some("missing_url".to_string()),
    }
}

/// Unknown-age miners sort last; otherwise ascending age with the miner id as
/// a stable tie-break.
fn compare_miner_rows(a: &MinerRow, b: &MinerRow) -> Ordering {
    match (a.age_h, b.age_h) {
        (None, None) => a.miner.cmp(&b.miner),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x
            .partial_cmp(&y)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.miner.cmp(&b.miner)),
    }
}
