//! # Gap Analysis
//!
//! Turns a [`DualTrackResult`] into an itemized list of what is missing, one
//! entry per unmet sub-condition of a failing track. A participant that is
//! ready to promote has an empty report.

use super::engine::{DualTrackResult, ProgressionState};
use super::growth::RequirementCheck;
use crate::types::TierPair;
use serde::{Deserialize, Serialize};

/// What kind of requirement a gap belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapCategory {
    Points,
    Stability,
    Peers,
    /// Exams and ethics requirements.
    Exam,
    Period,
    Capability,
}

/// One unmet sub-condition with its literal values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub category: GapCategory,
    pub current: u64,
    pub required: u64,
    pub description: String,
}

/// Itemized report for one tier pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapReport {
    pub pair: TierPair,
    pub state: ProgressionState,
    pub guidance: String,
    pub gaps: Vec<Gap>,
}

impl GapReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty()
    }

    /// Gaps of one category.
    pub fn in_category(&self, category: GapCategory) -> impl Iterator<Item = &Gap> {
        self.gaps.iter().filter(move |g| g.category == category)
    }
}

/// Builds gap reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct GapAnalyzer;

impl GapAnalyzer {
    #[must_use]
    pub fn analyze(result: &DualTrackResult) -> GapReport {
        let mut gaps = Vec::new();

        if !result.points.passed {
            for check in result.points.shortfalls() {
                gaps.push(Gap {
                    category: GapCategory::Points,
                    current: check.current,
                    required: check.required,
                    description: format!(
                        "{} points {} of {}",
                        check.track.as_str(),
                        check.current,
                        check.required
                    ),
                });
            }
        }

        if !result.growth.passed {
            let growth = &result.growth;
            let peers = growth.peers;
            if !peers.total_met() {
                gaps.push(Gap {
                    category: GapCategory::Peers,
                    current: u64::from(peers.total),
                    required: u64::from(peers.required_total),
                    description: format!(
                        "validated companions {} of {}",
                        peers.total, peers.required_total
                    ),
                });
            }
            if !peers.progressed_met() {
                gaps.push(Gap {
                    category: GapCategory::Peers,
                    current: u64::from(peers.progressed),
                    required: u64::from(peers.required_progressed),
                    description: format!(
                        "progressed companions {} of {}",
                        peers.progressed, peers.required_progressed
                    ),
                });
            }
            if !peers.advanced_met() {
                gaps.push(Gap {
                    category: GapCategory::Peers,
                    current: u64::from(peers.advanced),
                    required: u64::from(peers.required_advanced),
                    description: format!(
                        "advanced companions {} of {}",
                        peers.advanced, peers.required_advanced
                    ),
                });
            }
            if !growth.stability.met {
                gaps.push(Gap {
                    category: GapCategory::Stability,
                    current: u64::from(growth.stability.counter_days),
                    required: u64::from(growth.stability.required_days),
                    description: format!(
                        "stable days {} of {}",
                        growth.stability.counter_days, growth.stability.required_days
                    ),
                });
            }
            if !growth.period.met {
                gaps.push(Gap {
                    category: GapCategory::Period,
                    current: u64::from(growth.period.days_in_tier),
                    required: u64::from(growth.period.required_days),
                    description: format!(
                        "days in tier {} of {}",
                        growth.period.days_in_tier, growth.period.required_days
                    ),
                });
            }
            push_requirements(&mut gaps, GapCategory::Exam, "exam", &growth.exams);
            push_requirements(&mut gaps, GapCategory::Exam, "ethics", &growth.ethics);
            push_requirements(
                &mut gaps,
                GapCategory::Capability,
                "capability",
                &growth.capabilities,
            );
        }

        GapReport {
            pair: result.pair,
            state: result.state,
            guidance: result.state.guidance().to_string(),
            gaps,
        }
    }
}

fn push_requirements(
    gaps: &mut Vec<Gap>,
    category: GapCategory,
    label: &str,
    checks: &[RequirementCheck],
) {
    for check in checks.iter().filter(|c| !c.passed) {
        gaps.push(Gap {
            category,
            current: 0,
            required: 1,
            description: format!("{} '{}' not passed", label, check.name),
        });
    }
}
