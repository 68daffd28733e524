//! Built-in governance configuration.
//!
//! This is the single source of every default constant. Tests and the binary
//! read values from here instead of repeating literals.

use super::{
    CeremonySpec, GateMode, GovernanceConfig, PeerRequirement, PointPenalty, PromotionThreshold,
    ProtectionRules, StabilityRules, StageRules, ViolationPolicy,
};
use crate::types::{PointBalances, PointTrack, Tier, TierPair, ViolationKind};

/// Version tag of the built-in tables.
pub const BUILTIN_VERSION: &str = "builtin-1";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn ceremony(name: &str, symbol: &str, contracts: &[&str]) -> CeremonySpec {
    CeremonySpec {
        name: name.to_string(),
        symbol: symbol.to_string(),
        contracts: strings(contracts),
    }
}

impl GovernanceConfig {
    /// The built-in configuration.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            version: BUILTIN_VERSION.to_string(),
            stage_rules: StageRules {
                min_weekly_feedback: 3,
                min_interruption_points: 1,
                min_trial_attempts: 5,
                regression_adherence_floor_percent: 40,
                advance_adherence_percent: 80,
                min_pathway_days: 28,
                stability: StabilityRules {
                    min_retention_percent: 80,
                    max_gap_days: 3,
                    required_days: 90,
                },
            },
            protection: ProtectionRules {
                protection_days: 90,
                observation_days: 180,
                recovery_months: 12,
            },
            thresholds: builtin_thresholds(),
            policies: builtin_policies(),
        }
    }
}

fn builtin_thresholds() -> Vec<PromotionThreshold> {
    vec![
        PromotionThreshold {
            pair: TierPair::L0L1,
            min_points: PointBalances::new(100, 0, 0),
            gate: GateMode::Mandatory,
            peers: PeerRequirement {
                total: 4,
                min_progressed: 2,
                min_advanced: 1,
            },
            min_period_days: 90,
            exams: Vec::new(),
            ethics: Vec::new(),
            capabilities: Vec::new(),
            ceremony: ceremony(
                "Seedling Oath",
                "seedling",
                &["Learner Commitment", "Confidentiality Pledge"],
            ),
        },
        PromotionThreshold {
            pair: TierPair::L1L2,
            min_points: PointBalances::new(300, 50, 0),
            gate: GateMode::Advisory,
            peers: PeerRequirement {
                total: 5,
                min_progressed: 3,
                min_advanced: 1,
            },
            min_period_days: 120,
            exams: strings(&["peer_support_basics"]),
            ethics: strings(&["boundaries_quiz"]),
            capabilities: Vec::new(),
            ceremony: ceremony(
                "Lantern Rite",
                "lantern",
                &["Peer Guidance Agreement", "Boundary Charter"],
            ),
        },
        PromotionThreshold {
            pair: TierPair::L2L3,
            min_points: PointBalances::new(800, 150, 0),
            gate: GateMode::Mandatory,
            peers: PeerRequirement {
                total: 6,
                min_progressed: 3,
                min_advanced: 2,
            },
            min_period_days: 180,
            exams: strings(&["mentor_certification"]),
            ethics: strings(&["ethics_review"]),
            capabilities: Vec::new(),
            ceremony: ceremony(
                "Compass Vow",
                "compass",
                &[
                    "Mentor Code of Conduct",
                    "Duty of Care Agreement",
                    "Escalation Protocol",
                ],
            ),
        },
        PromotionThreshold {
            pair: TierPair::L3L4,
            min_points: PointBalances::new(2000, 500, 100),
            gate: GateMode::Mandatory,
            peers: PeerRequirement {
                total: 10,
                min_progressed: 5,
                min_advanced: 3,
            },
            min_period_days: 270,
            exams: strings(&["advanced_coaching"]),
            ethics: strings(&["ethics_review"]),
            capabilities: strings(&["group_facilitation"]),
            ceremony: ceremony(
                "Beacon Investiture",
                "beacon",
                &[
                    "Senior Mentor Charter",
                    "Supervision Responsibility Agreement",
                    "Data Stewardship Pledge",
                ],
            ),
        },
        PromotionThreshold {
            pair: TierPair::L4L5,
            min_points: PointBalances::new(5000, 1500, 500),
            gate: GateMode::Mandatory,
            peers: PeerRequirement {
                total: 20,
                min_progressed: 10,
                min_advanced: 5,
            },
            min_period_days: 365,
            exams: strings(&["master_assessment"]),
            ethics: strings(&["ethics_board_review"]),
            capabilities: strings(&["curriculum_design", "mentor_training"]),
            ceremony: ceremony(
                "Summit Covenant",
                "summit",
                &[
                    "Master Mentor Covenant",
                    "Program Governance Charter",
                    "Succession Commitment",
                ],
            ),
        },
    ]
}

fn builtin_policies() -> Vec<ViolationPolicy> {
    vec![
        ViolationPolicy {
            kind: ViolationKind::MinorComplaint,
            penalty: PointPenalty::Deduct {
                track: PointTrack::Contribution,
                amount: 10,
            },
            action: "written warning".to_string(),
            min_tier: Tier::L0,
            max_tier: Tier::L5,
            recovery_path: "submit a reflection report to the assigned mentor".to_string(),
            appeal_window_days: 7,
            reviewer: "mentor".to_string(),
            protection_exempt: true,
        },
        ViolationPolicy {
            kind: ViolationKind::FirstOverreach,
            penalty: PointPenalty::Deduct {
                track: PointTrack::Growth,
                amount: 50,
            },
            action: "formal warning and boundary training".to_string(),
            min_tier: Tier::L0,
            max_tier: Tier::L5,
            recovery_path: "complete the boundary training module".to_string(),
            appeal_window_days: 14,
            reviewer: "senior_mentor".to_string(),
            protection_exempt: true,
        },
        ViolationPolicy {
            kind: ViolationKind::SecondOverreach,
            penalty: PointPenalty::Deduct {
                track: PointTrack::Growth,
                amount: 100,
            },
            action: "demotion by one tier with observation period".to_string(),
            min_tier: Tier::L1,
            max_tier: Tier::L5,
            recovery_path: "pass a capability re-evaluation during the observation period"
                .to_string(),
            appeal_window_days: 14,
            reviewer: "review_committee".to_string(),
            protection_exempt: false,
        },
        ViolationPolicy {
            kind: ViolationKind::EthicsRedline,
            penalty: PointPenalty::ClearAll,
            action: "permanent removal from the program".to_string(),
            min_tier: Tier::L0,
            max_tier: Tier::L5,
            recovery_path: "none".to_string(),
            appeal_window_days: 30,
            reviewer: "ethics_committee".to_string(),
            protection_exempt: false,
        },
        ViolationPolicy {
            kind: ViolationKind::KpiUnderperformance,
            penalty: PointPenalty::None,
            action: "supervision plan assigned".to_string(),
            min_tier: Tier::L1,
            max_tier: Tier::L5,
            recovery_path: "meet KPI targets for one review cycle under supervision".to_string(),
            appeal_window_days: 7,
            reviewer: "mentor".to_string(),
            protection_exempt: false,
        },
    ]
}
