//! Payout eligibility policy for node hosts and miners.
//!
//! Both classifiers are pure total functions over already-fetched data: they
//! perform no I/O and every input combination maps to exactly one verdict.
//! Check order is the precedence. For node hosts, inactivity dominates being
//! offline, which dominates a version mismatch.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operator follow-up action for a node host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeAction {
    InactiveNoPayout,
    InvestigateOffline,
    PayWeeklyAndUpgradeNode,
    PayWeekly,
    MissingUrlOrRedacted,
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NodeAction::InactiveNoPayout => "inactive_no_payout",
            NodeAction::InvestigateOffline => "investigate_offline",
            NodeAction::PayWeeklyAndUpgradeNode => "pay_weekly_and_upgrade_node",
            NodeAction::PayWeekly => "pay_weekly",
            NodeAction::MissingUrlOrRedacted => "missing_url_or_redacted",
        };
        write!(f, "{}", text)
    }
}

/// Lifecycle state of a miner derived from its last attestation age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinerState {
    Active,
    StaleButWeeklyEligible,
    Inactive,
    Unknown,
    NotVisibleInPublicApi,
}

impl fmt::Display for MinerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MinerState::Active => "active",
            MinerState::StaleButWeeklyEligible => "stale_but_weekly_eligible",
            MinerState::Inactive => "inactive",
            MinerState::Unknown => "unknown",
            MinerState::NotVisibleInPublicApi => "not_visible_in_public_api",
        };
        write!(f, "{}", text)
    }
}

/// Operator follow-up action for a miner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinerAction {
    PayWeekly,
    PayWeeklyAndPingHealthCheck,
    RestartOrUpgradeMiner,
    RequestStatusOrUpgrade,
    CheckNodeUrlThenUpgradeMiner,
}

impl fmt::Display for MinerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MinerAction::PayWeekly => "pay_weekly",
            MinerAction::PayWeeklyAndPingHealthCheck => "pay_weekly_and_ping_health_check",
            MinerAction::RestartOrUpgradeMiner => "restart_or_upgrade_miner",
            MinerAction::RequestStatusOrUpgrade => "request_status_or_upgrade",
            MinerAction::CheckNodeUrlThenUpgradeMiner => "check_node_url_then_upgrade_miner",
        };
        write!(f, "{}", text)
    }
}

/// Classifies a node host's weekly payout eligibility and follow-up action.
///
/// Active + online hosts are paid. A version mismatch still pays but carries
/// an upgrade action.
pub fn classify_node_host(
    is_active: bool,
    online: bool,
    node_version: &str,
    network_version: &str,
) -> (bool, NodeAction) {
    if !is_active {
        return (false, NodeAction::InactiveNoPayout);
    }
    if !online {
        return (false, NodeAction::InvestigateOffline);
    }
    if !network_version.is_empty() && !node_version.is_empty() && node_version != network_version {
        return (true, NodeAction::PayWeeklyAndUpgradeNode);
    }
    (true, NodeAction::PayWeekly)
}

/// Verdict of [`classify_miner_age`].
#[derive(Debug, Clone, PartialEq)]
pub struct MinerAgeClass {
    pub age_h: Option<f64>,
    pub state: MinerState,
    pub weekly_eligible: bool,
    pub suggested_action: MinerAction,
}

/// Classifies a miner by the age of its last attestation.
///
/// Window comparisons are inclusive at both edges: an age exactly equal to a
/// window bound counts as within it. A miner with no usable timestamp (absent
/// or non-positive) is `unknown` and not weekly eligible. The caller is
/// responsible for `active_window_h <= weekly_window_h`; the bands are
/// meaningless otherwise.
pub fn classify_miner_age(
    last_attest_ts: Option<i64>,
    now_ts: i64,
    active_window_h: f64,
    weekly_window_h: f64,
) -> MinerAgeClass {
    let last_attest = match last_attest_ts.filter(|ts| *ts > 0) {
        Some(ts) => ts,
        None => {
            return MinerAgeClass {
                age_h: None,
                state: MinerState::Unknown,
                weekly_eligible: false,
                suggested_action: MinerAction::RequestStatusOrUpgrade,
            }
        }
    };

    let age_h = ((now_ts - last_attest) as f64 / 3600.0).max(0.0);
    if age_h <= active_window_h {
        MinerAgeClass {
            age_h: Some(age_h),
            state: MinerState::Active,
            weekly_eligible: true,
            suggested_action: MinerAction::PayWeekly,
        }
    } else if age_h <= weekly_window_h {
        MinerAgeClass {
            age_h: Some(age_h),
            state: MinerState::StaleButWeeklyEligible,
            weekly_eligible: true,
            suggested_action: MinerAction::PayWeeklyAndPingHealthCheck,
        }
    } else {
        MinerAgeClass {
            age_h: Some(age_h),
            state: MinerState::Inactive,
            weekly_eligible: false,
            suggested_action: MinerAction::RestartOrUpgradeMiner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_host_payout_online() {
        let (eligible, action) =
            classify_node_host(true, true, "2.2.1-rip200", "2.2.1-rip200");
        assert!(eligible);
        assert_eq!(action, NodeAction::PayWeekly);
    }

    #[test]
    fn node_host_mismatch_still_pays() {
        let (eligible, action) =
            classify_node_host(true, true, "2.1.0-rip200", "2.2.1-rip200");
        assert!(eligible);
        assert_eq!(action, NodeAction::PayWeeklyAndUpgradeNode);
    }

    #[test]
    fn node_host_offline() {
        let (eligible, action) =
            classify_node_host(true, false, "2.2.1-rip200", "2.2.1-rip200");
        assert!(!eligible);
        assert_eq!(action, NodeAction::InvestigateOffline);
    }

    #[test]
    fn node_host_inactive_dominates_everything() {
        for online in [false, true] {
            for versions in [("", ""), ("2.1.0", "2.2.1"), ("2.2.1", "2.2.1")] {
                let (eligible, action) =
                    classify_node_host(false, online, versions.0, versions.1);
                assert!(!eligible);
                assert_eq!(action, NodeAction::InactiveNoPayout);
            }
        }
    }

    #[test]
    fn node_host_blank_version_is_not_a_mismatch() {
        let (eligible, action) = classify_node_host(true, true, "", "2.2.1");
        assert!(eligible);
        assert_eq!(action, NodeAction::PayWeekly);

        let (eligible, action) = classify_node_host(true, true, "2.2.1", "");
        assert!(eligible);
        assert_eq!(action, NodeAction::PayWeekly);
    }

    #[test]
    fn miner_age_active() {
        let now = 1_700_000_000;
        let verdict = classify_miner_age(Some(now - 900), now, 2.0, 168.0);
        assert_eq!(verdict.state, MinerState::Active);
        assert!(verdict.weekly_eligible);
        assert_eq!(verdict.suggested_action, MinerAction::PayWeekly);
    }

    #[test]
    fn miner_age_stale_but_weekly() {
        let now = 1_700_000_000;
        let verdict = classify_miner_age(Some(now - 72 * 3600), now, 2.0, 168.0);
        assert_eq!(verdict.state, MinerState::StaleButWeeklyEligible);
        assert!(verdict.weekly_eligible);
        assert_eq!(
            verdict.suggested_action,
            MinerAction::PayWeeklyAndPingHealthCheck
        );
    }

    #[test]
    fn miner_age_inactive() {
        let now = 1_700_000_000;
        let verdict = classify_miner_age(Some(now - 200 * 3600), now, 2.0, 168.0);
        assert_eq!(verdict.state, MinerState::Inactive);
        assert!(!verdict.weekly_eligible);
        assert_eq!(verdict.suggested_action, MinerAction::RestartOrUpgradeMiner);
    }

    #[test]
    fn miner_age_unknown_without_timestamp() {
        let now = 1_700_000_000;
        for ts in [None, Some(0), Some(-5)] {
            let verdict = classify_miner_age(ts, now, 2.0, 168.0);
            assert_eq!(verdict.state, MinerState::Unknown);
            assert!(!verdict.weekly_eligible);
            assert_eq!(verdict.age_h, None);
            assert_eq!(
                verdict.suggested_action,
                MinerAction::RequestStatusOrUpgrade
            );
        }
    }

    #[test]
    fn miner_age_window_edges_are_inclusive() {
        let now = 1_700_000_000;
        let at_active_edge = classify_miner_age(Some(now - 2 * 3600), now, 2.0, 168.0);
        assert_eq!(at_active_edge.state, MinerState::Active);

        let at_weekly_edge = classify_miner_age(Some(now - 168 * 3600), now, 2.0, 168.0);
        assert_eq!(at_weekly_edge.state, MinerState::StaleButWeeklyEligible);
    }

    #[test]
    fn miner_age_clamps_future_timestamps_to_zero() {
        let now = 1_700_000_000;
        let verdict = classify_miner_age(Some(now + 600), now, 2.0, 168.0);
        assert_eq!(verdict.age_h, Some(0.0));
        assert_eq!(verdict.state, MinerState::Active);
    }
}
