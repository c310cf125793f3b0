//! # Report Module
//!
//! The immutable output value of one scan pass, plus the markdown rendering
//! used for operator review. Every counter in the summary is derived from the
//! row lists and recomputed each run; the report carries no memory of prior
//! invocations. The whole structure serializes to JSON for machine consumers.
use crate::classify::{MinerAction, MinerState, NodeAction};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub fn now_utc_ts() -> i64 {
    Utc::now().timestamp()
}

pub fn now_utc_iso() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Formats an epoch-seconds timestamp for display; `-` when absent or
/// non-positive.
pub fn ts_to_utc(ts: Option<i64>) -> String {
    match ts.filter(|t| *t > 0) {
        Some(t) => match DateTime::<Utc>::from_timestamp(t, 0) {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            None => "-".to_string(),
        },
        None => "-".to_string(),
    }
}

/// One scanned or registry-known node host with its payout verdict.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRow {
    pub node_id: String,
    pub name: String,
    pub wallet: Option<String>,
    pub url: String,
    pub is_active: bool,
    pub online: bool,
    pub health_ok: bool,
    pub version: String,
    pub uptime_s: Option<f64>,
    pub payout_eligible: bool,
    pub suggested_action: NodeAction,
    pub health_error: Option<String>,
    pub miners_error: Option<String>,
}

/// One observed miner with its age classification.
#[derive(Debug, Clone, Serialize)]
pub struct MinerRow {
    pub miner: String,
    pub last_attest: Option<i64>,
    pub last_attest_utc: String,
    pub first_attest: Option<i64>,
    pub age_h: Option<f64>,
    pub state: MinerState,
    pub weekly_eligible: bool,
    pub suggested_action: MinerAction,
    pub device_family: Option<String>,
    pub device_arch: Option<String>,
    pub hardware_type: Option<String>,
    pub entropy_score: Option<f64>,
    pub antiquity_multiplier: Option<f64>,
    pub nodes_seen: Vec<String>,
    pub node_count: usize,
}

/// An expected miner that no node reported this run.
#[derive(Debug, Clone, Serialize)]
pub struct MissingMinerRow {
    pub miner: String,
    pub state: MinerState,
    pub weekly_eligible: bool,
    pub suggested_action: MinerAction,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionMismatchRow {
    pub node_url: String,
    pub node_id: Option<String>,
    pub node_version: String,
    pub network_version: String,
}

/// Fetch error codes from the three seed queries, kept verbatim.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryErrors {
    pub seed_health: Option<String>,
    pub seed_epoch: Option<String>,
    pub seed_nodes: Option<String>,
}

/// Network-wide identity as reported by the seed. The epoch and health
/// payloads pass through unmodified.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkInfo {
    pub version: String,
    pub epoch: Option<serde_json::Value>,
    pub health: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub nodes_scanned: usize,
    pub active_nodes_online: usize,
    pub active_nodes_offline: usize,
    pub node_hosts_weekly_payout_eligible: usize,
    pub miners_observed: usize,
    pub miners_weekly_payout_eligible: usize,
    pub expected_miners_missing: usize,
    pub version_mismatch_nodes: usize,
    /// False when the seed health query failed; the rest of the report then
    /// degrades to an all-offline view instead of aborting.
    pub seed_reachable: bool,
}

/// The complete result of one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub generated_at: String,
    pub seed_node: String,
    pub query_errors: QueryErrors,
    pub network: NetworkInfo,
    pub summary: Summary,
    pub nodes: Vec<NodeRow>,
    pub miners: Vec<MinerRow>,
    pub expected_miners_missing_rows: Vec<MissingMinerRow>,
    pub version_mismatch_nodes: Vec<VersionMismatchRow>,
}

fn fmt_age(age_h: Option<f64>) -> String {
    match age_h {
        Some(age) => format!("{:.2}", age),
        None => "-".to_string(),
    }
}

fn fmt_bool(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn fmt_opt(value: &Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

fn dash_if_empty(text: &str) -> &str {
    if text.is_empty() {
        "-"
    } else {
        text
    }
}

/// Renders the operator-facing markdown summary of a report.
pub fn render_markdown(report: &Report) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("# RustChain Weekly Node + Miner Scan".to_string());
    lines.push(String::new());
    lines.push(format!("- Generated: {}", report.generated_at));
    lines.push(format!("- Seed node: {}", report.seed_node));
    lines.push(format!(
        "- Network version: {}",
        dash_if_empty(&report.network.version)
    ));
    if !report.summary.seed_reachable {
        lines.push("- **Seed node unreachable; results degraded**".to_string());
    }
    lines.push(String::new());

    let summary = &report.summary;
    lines.push("## Summary".to_string());
    lines.push(String::new());
    lines.push(format!("- Nodes scanned: {}", summary.nodes_scanned));
    lines.push(format!(
        "- Node hosts weekly payout eligible: {}",
        summary.node_hosts_weekly_payout_eligible
    ));
    lines.push(format!(
        "- Active nodes offline: {}",
        summary.active_nodes_offline
    ));
    lines.push(format!("- Miners observed: {}", summary.miners_observed));
    lines.push(format!(
        "- Miners weekly payout eligible: {}",
        summary.miners_weekly_payout_eligible
    ));
    lines.push(format!(
        "- Expected miners missing: {}",
        summary.expected_miners_missing
    ));
    lines.push(format!(
        "- Version mismatch nodes: {}",
        summary.version_mismatch_nodes
    ));
    lines.push(String::new());

    lines.push("## Node Hosts".to_string());
    lines.push(String::new());
    lines.push("| Node | Active | Online | Version | Payout | Action |".to_string());
    lines.push("|---|---|---|---|---|---|".to_string());
    for node in &report.nodes {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            node.name,
            fmt_bool(node.is_active),
            fmt_bool(node.online),
            dash_if_empty(&node.version),
            fmt_bool(node.payout_eligible),
            node.suggested_action,
        ));
    }
    lines.push(String::new());

    lines.push("## Miners (Observed)".to_string());
    lines.push(String::new());
    lines.push(
        "| Miner | Last Attest (UTC) | Age(h) | Mult | Weekly Eligible | Action |".to_string(),
    );
    lines.push("|---|---|---|---|---|---|".to_string());
    for miner in &report.miners {
        lines.push(format!(
            "| {} | {} | {} | {} | {} | {} |",
            miner.miner,
            miner.last_attest_utc,
            fmt_age(miner.age_h),
            fmt_opt(&miner.antiquity_multiplier),
            fmt_bool(miner.weekly_eligible),
            miner.suggested_action,
        ));
    }
    lines.push(String::new());

    if !report.expected_miners_missing_rows.is_empty() {
        lines.push("## Expected Miners Missing".to_string());
        lines.push(String::new());
        lines.push("| Miner | State | Action |".to_string());
        lines.push("|---|---|---|".to_string());
        for row in &report.expected_miners_missing_rows {
            lines.push(format!(
                "| {} | {} | {} |",
                row.miner, row.state, row.suggested_action
            ));
        }
        lines.push(String::new());
    }

    if !report.version_mismatch_nodes.is_empty() {
        lines.push("## Version Mismatch Nodes".to_string());
        lines.push(String::new());
        lines.push("| Node | Node Version | Network Version |".to_string());
        lines.push("|---|---|---|".to_string());
        for row in &report.version_mismatch_nodes {
            lines.push(format!(
                "| {} | {} | {} |",
                row.node_id.as_deref().unwrap_or(&row.node_url),
                dash_if_empty(&row.node_version),
                dash_if_empty(&row.network_version),
            ));
        }
        lines.push(String::new());
    }

    lines.push("## Recommended Next Steps".to_string());
    lines.push(String::new());
    lines.push(
        "1. Queue weekly payouts for all rows marked `pay_weekly` or `pay_weekly_and_upgrade_node`."
            .to_string(),
    );
    lines.push("2. DM missing miners with a restart + latest miner update check.".to_string());
    lines.push(
        "3. Ask version-mismatch node hosts to upgrade, then re-run this scan.".to_string(),
    );
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_to_utc_formats_and_dashes() {
        assert_eq!(ts_to_utc(None), "-");
        assert_eq!(ts_to_utc(Some(0)), "-");
        assert_eq!(ts_to_utc(Some(-1)), "-");
        assert_eq!(ts_to_utc(Some(1_700_000_000)), "2023-11-14 22:13:20 UTC");
    }

    fn sample_report() -> Report {
        Report {
            generated_at: "2026-01-01 00:00:00 UTC".into(),
            seed_node: "https://seed.example".into(),
            query_errors: QueryErrors::default(),
            network: NetworkInfo {
                version: "2.2.1".into(),
                epoch: None,
                health: None,
            },
            summary: Summary {
                nodes_scanned: 1,
                active_nodes_online: 1,
                node_hosts_weekly_payout_eligible: 1,
                miners_observed: 1,
                miners_weekly_payout_eligible: 1,
                expected_miners_missing: 1,
                seed_reachable: true,
                ..Default::default()
            },
            nodes: vec![NodeRow {
                node_id: "seed".into(),
                name: "seed.example:443".into(),
                wallet: None,
                url: "https://seed.example".into(),
                is_active: true,
                online: true,
                health_ok: true,
                version: "2.2.1".into(),
                uptime_s: Some(12.0),
                payout_eligible: true,
                suggested_action: NodeAction::PayWeekly,
                health_error: None,
                miners_error: None,
            }],
            miners: vec![MinerRow {
                miner: "alpha".into(),
                last_attest: Some(1_700_000_000),
                last_attest_utc: ts_to_utc(Some(1_700_000_000)),
                first_attest: None,
                age_h: Some(0.25),
                state: MinerState::Active,
                weekly_eligible: true,
                suggested_action: MinerAction::PayWeekly,
                device_family: None,
                device_arch: None,
                hardware_type: None,
                entropy_score: None,
                antiquity_multiplier: Some(1.2),
                nodes_seen: vec!["https://seed.example".into()],
                node_count: 1,
            }],
            expected_miners_missing_rows: vec![MissingMinerRow {
                miner: "ghost".into(),
                state: MinerState::NotVisibleInPublicApi,
                weekly_eligible: false,
                suggested_action: MinerAction::CheckNodeUrlThenUpgradeMiner,
            }],
            version_mismatch_nodes: Vec::new(),
        }
    }

    #[test]
    fn markdown_carries_rows_and_actions() {
        let markdown = render_markdown(&sample_report());
        assert!(markdown.contains("# RustChain Weekly Node + Miner Scan"));
        assert!(markdown.contains("| seed.example:443 | yes | yes | 2.2.1 | yes | pay_weekly |"));
        assert!(markdown.contains("| alpha | 2023-11-14 22:13:20 UTC | 0.25 | 1.2 | yes | pay_weekly |"));
        assert!(markdown.contains("## Expected Miners Missing"));
        assert!(markdown
            .contains("| ghost | not_visible_in_public_api | check_node_url_then_upgrade_miner |"));
        // No mismatch section when the list is empty.
        assert!(!markdown.contains("## Version Mismatch Nodes"));
    }

    #[test]
    fn markdown_flags_unreachable_seed() {
        let mut report = sample_report();
        report.summary.seed_reachable = false;
        let markdown = render_markdown(&report);
        assert!(markdown.contains("Seed node unreachable"));
    }

    #[test]
    fn report_serializes_snake_case_verdicts() {
        let report = sample_report();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["nodes"][0]["suggested_action"], "pay_weekly");
        assert_eq!(value["miners"][0]["state"], "active");
        assert_eq!(
            value["expected_miners_missing_rows"][0]["state"],
            "not_visible_in_public_api"
        );
        assert_eq!(value["summary"]["nodes_scanned"], 1);
    }
}
