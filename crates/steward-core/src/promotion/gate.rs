//! # Points Track
//!
//! Two strategies compare balances against a threshold's minimums:
//! - [`MandatoryGate`]: every minimum must be met
//! - [`AdvisoryGate`]: minimums are measured and reported, the track always passes
//!
//! The strategy is selected per tier pair by the threshold's [`GateMode`].

use crate::config::GateMode;
use crate::types::{PointBalances, PointTrack};
use serde::{Deserialize, Serialize};

/// One measured counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointCheck {
    pub track: PointTrack,
    pub current: u64,
    pub required: u64,
    pub met: bool,
}

/// Result of the points track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsResult {
    pub passed: bool,
    pub gate: GateMode,
    pub checks: Vec<PointCheck>,
}

impl PointsResult {
    /// Counters below their minimum (reported even under an advisory gate).
    pub fn shortfalls(&self) -> impl Iterator<Item = &PointCheck> {
        self.checks.iter().filter(|c| !c.met)
    }
}

/// A points-track strategy.
pub trait PointsGate: Send + Sync {
    fn mode(&self) -> GateMode;

    fn evaluate(&self, balances: &PointBalances, minimums: &PointBalances) -> PointsResult;
}

/// Minimums are a qualification requirement.
#[derive(Debug, Clone, Copy, Default)]
pub struct MandatoryGate;

/// Minimums are telemetry only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvisoryGate;

fn measure(balances: &PointBalances, minimums: &PointBalances) -> Vec<PointCheck> {
    PointTrack::ALL
        .into_iter()
        .map(|track| {
            let current = balances.get(track);
            let required = minimums.get(track);
            PointCheck {
                track,
                current,
                required,
                met: current >= required,
            }
        })
        .collect()
}

impl PointsGate for MandatoryGate {
    fn mode(&self) -> GateMode {
        GateMode::Mandatory
    }

    fn evaluate(&self, balances: &PointBalances, minimums: &PointBalances) -> PointsResult {
        let checks = measure(balances, minimums);
        PointsResult {
            passed: checks.iter().all(|c| c.met),
            gate: self.mode(),
            checks,
        }
    }
}

impl PointsGate for AdvisoryGate {
    fn mode(&self) -> GateMode {
        GateMode::Advisory
    }

    fn evaluate(&self, balances: &PointBalances, minimums: &PointBalances) -> PointsResult {
        PointsResult {
            passed: true,
            gate: self.mode(),
            checks: measure(balances, minimums),
        }
    }
}

/// Strategy for a gate mode.
#[must_use]
pub fn gate_for(mode: GateMode) -> &'static dyn PointsGate {
    match mode {
        GateMode::Mandatory => &MandatoryGate,
        GateMode::Advisory => &AdvisoryGate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mandatory_requires_every_minimum() {
        let minimums = PointBalances::new(300, 50, 0);
        let result = MandatoryGate.evaluate(&PointBalances::new(300, 49, 0), &minimums);
        assert!(!result.passed);
        assert_eq!(result.shortfalls().count(), 1);

        let result = MandatoryGate.evaluate(&PointBalances::new(300, 50, 0), &minimums);
        assert!(result.passed);
    }

    #[test]
    fn advisory_always_passes_but_reports() {
        let minimums = PointBalances::new(300, 50, 0);
        let result = AdvisoryGate.evaluate(&PointBalances::new(10, 0, 0), &minimums);
        assert!(result.passed);
        assert_eq!(result.shortfalls().count(), 2);
    }

    #[test]
    fn gate_for_selects_strategy() {
        assert_eq!(gate_for(GateMode::Advisory).mode(), GateMode::Advisory);
        assert_eq!(gate_for(GateMode::Mandatory).mode(), GateMode::Mandatory);
    }
}
