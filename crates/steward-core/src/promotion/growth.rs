//! # Growth Track
//!
//! Composite check; ALL sub-conditions must pass:
//! - peer/companion validation (total, progressed, advanced when required)
//! - the stage engine's 90-day stability verdict
//! - minimum dwell period in the current tier
//! - every listed exam
//! - every listed ethics requirement (unconditional veto, no averaging)
//! - every listed capability requirement

use crate::config::PromotionThreshold;
use crate::providers::PromotionFacts;
use serde::{Deserialize, Serialize};

/// Peer/companion validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCheck {
    pub total: u32,
    pub required_total: u32,
    pub progressed: u32,
    pub required_progressed: u32,
    pub advanced: u32,
    /// Zero when the tier pair does not require advanced companions.
    pub required_advanced: u32,
}

impl PeerCheck {
    #[must_use]
    pub fn total_met(&self) -> bool {
        self.total >= self.required_total
    }

    #[must_use]
    pub fn progressed_met(&self) -> bool {
        self.progressed >= self.required_progressed
    }

    #[must_use]
    pub fn advanced_met(&self) -> bool {
        self.required_advanced == 0 || self.advanced >= self.required_advanced
    }

    #[must_use]
    pub fn met(&self) -> bool {
        self.total_met() && self.progressed_met() && self.advanced_met()
    }
}

/// Stability verdict as seen by the growth track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityCheck {
    pub counter_days: u32,
    pub required_days: u32,
    pub met: bool,
}

/// Dwell period in the current tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCheck {
    pub days_in_tier: u32,
    pub required_days: u32,
    pub met: bool,
}

/// A named pass/fail requirement (exam, ethics, capability).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCheck {
    pub name: String,
    pub passed: bool,
}

/// Result of the growth track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthResult {
    pub passed: bool,
    pub peers: PeerCheck,
    pub stability: StabilityCheck,
    pub period: PeriodCheck,
    pub exams: Vec<RequirementCheck>,
    pub ethics: Vec<RequirementCheck>,
    pub capabilities: Vec<RequirementCheck>,
    /// At least one ethics requirement failed.
    pub ethics_veto: bool,
}

/// Inputs the growth track reads from the participant state.
#[derive(Debug, Clone, Copy)]
pub struct GrowthInputs {
    pub stability_counter_days: u32,
    pub stability_required_days: u32,
    pub days_in_tier: u32,
}

/// Evaluate the growth track.
#[must_use]
pub fn evaluate_growth(
    threshold: &PromotionThreshold,
    facts: &PromotionFacts,
    inputs: GrowthInputs,
) -> GrowthResult {
    let peers = PeerCheck {
        total: facts.companions.total,
        required_total: threshold.peers.total,
        progressed: facts.companions.progressed,
        required_progressed: threshold.peers.min_progressed,
        advanced: facts.companions.advanced,
        required_advanced: threshold.peers.min_advanced,
    };

    let stability = StabilityCheck {
        counter_days: inputs.stability_counter_days,
        required_days: inputs.stability_required_days,
        met: inputs.stability_counter_days >= inputs.stability_required_days,
    };

    let period = PeriodCheck {
        days_in_tier: inputs.days_in_tier,
        required_days: threshold.min_period_days,
        met: inputs.days_in_tier >= threshold.min_period_days,
    };

    let check = |names: &[String], passed: &dyn Fn(&str) -> bool| -> Vec<RequirementCheck> {
        names
            .iter()
            .map(|name| RequirementCheck {
                name: name.clone(),
                passed: passed(name),
            })
            .collect()
    };
    let exams = check(&threshold.exams, &|n| facts.exam_passed(n));
    let ethics = check(&threshold.ethics, &|n| facts.ethics_passed(n));
    let capabilities = check(&threshold.capabilities, &|n| facts.capability_met(n));

    let ethics_veto = ethics.iter().any(|e| !e.passed);
    let passed = !ethics_veto
        && peers.met()
        && stability.met
        && period.met
        && exams.iter().all(|e| e.passed)
        && capabilities.iter().all(|c| c.passed);

    GrowthResult {
        passed,
        peers,
        stability,
        period,
        exams,
        ethics,
        capabilities,
        ethics_veto,
    }
}
