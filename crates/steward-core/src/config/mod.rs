//! # Governance Configuration
//!
//! Static input to every evaluation: per-stage transition rules, protection
//! windows, the `PromotionThreshold` table keyed by tier pair and the
//! `ViolationPolicy` table keyed by violation kind.
//!
//! Configuration is loaded once (or hot-reloaded by the host) and never
//! mutated by the engine.
//!
//! ## File Format
//!
//! ```toml
//! version = "2024.1"
//!
//! [stage_rules]
//! min_weekly_feedback = 3
//! # ...
//!
//! [[promotion]]
//! pair = "L0_L1"
//! is_hard_gate = true
//! # ...
//!
//! [[violation]]
//! kind = "minor_complaint"
//! # ...
//! ```
//!
//! Unknown `pair` or `kind` values are configuration errors. Tables missing
//! from a file are reported when an operation looks them up.

mod builtin;

use crate::primitives::{MAX_RECOVERY_MONTHS, MAX_WINDOW_DAYS};
use crate::types::{PointBalances, PointTrack, StewardError, Tier, TierPair, ViolationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Maximum accepted configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// STAGE RULES
// =============================================================================

/// Conditions for the 90-day stability streak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StabilityRules {
    /// Minimum retention rate over the window, in percent.
    pub min_retention_percent: u8,
    /// Largest tolerated gap between active days.
    pub max_gap_days: u32,
    /// Unbroken streak length required for "verified stable".
    pub required_days: u32,
}

/// Per-stage transition rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRules {
    /// S1 → S2: weekly feedback events required.
    pub min_weekly_feedback: u32,
    /// S1 → S2: behavioral interruption points that must be identified.
    pub min_interruption_points: u32,
    /// S2 → S3: completed trial attempts required.
    pub min_trial_attempts: u32,
    /// S3 → S2: adherence below this floor (with the severe flag) regresses.
    pub regression_adherence_floor_percent: u8,
    /// S3 → S4: adherence needed to advance.
    pub advance_adherence_percent: u8,
    /// S3 → S4: minimum days spent in S3.
    pub min_pathway_days: u32,
    pub stability: StabilityRules,
}

// =============================================================================
// PROTECTION / WINDOW RULES
// =============================================================================

/// Time windows applied by the promotion and constraint engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRules {
    /// Grace window after a promotion.
    pub protection_days: u32,
    /// Observation window after a second-overreach demotion.
    pub observation_days: u32,
    /// Recovery window after a voluntary exit.
    pub recovery_months: u32,
}

// =============================================================================
// PROMOTION THRESHOLDS
// =============================================================================

/// Whether the points track is a qualification requirement or telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Points minimums must be met.
    Mandatory,
    /// Points are reported but never block.
    Advisory,
}

/// Serde adapter: the file format carries the gate as `is_hard_gate = bool`.
mod hard_gate_flag {
    use super::GateMode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(mode: &GateMode, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(matches!(mode, GateMode::Mandatory))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GateMode, D::Error> {
        let hard = bool::deserialize(deserializer)?;
        Ok(if hard {
            GateMode::Mandatory
        } else {
            GateMode::Advisory
        })
    }
}

/// Peer/companion requirement. A zero minimum means "not required".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeerRequirement {
    pub total: u32,
    pub min_progressed: u32,
    #[serde(default)]
    pub min_advanced: u32,
}

/// Ceremony metadata for one tier transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonySpec {
    pub name: String,
    pub symbol: String,
    /// Contracts the participant signs for this specific transition.
    pub contracts: Vec<String>,
}

/// Qualification requirements for one tier pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionThreshold {
    pub pair: TierPair,
    pub min_points: PointBalances,
    #[serde(rename = "is_hard_gate", with = "hard_gate_flag")]
    pub gate: GateMode,
    pub peers: PeerRequirement,
    pub min_period_days: u32,
    #[serde(default)]
    pub exams: Vec<String>,
    #[serde(default)]
    pub ethics: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    pub ceremony: CeremonySpec,
}

impl PromotionThreshold {
    /// Check if the points track is a hard requirement.
    #[must_use]
    pub fn is_hard_gate(&self) -> bool {
        matches!(self.gate, GateMode::Mandatory)
    }
}

// =============================================================================
// VIOLATION POLICIES
// =============================================================================

/// Point consequence of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointPenalty {
    /// No points deducted.
    None,
    /// Deduct a fixed amount from one counter.
    Deduct { track: PointTrack, amount: u64 },
    /// Clear every balance.
    ClearAll,
}

/// Fixed policy for one violation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationPolicy {
    pub kind: ViolationKind,
    pub penalty: PointPenalty,
    /// Action taken in addition to the point penalty.
    pub action: String,
    /// Lowest tier the tier-changing action applies to.
    pub min_tier: Tier,
    /// Highest tier the tier-changing action applies to.
    pub max_tier: Tier,
    pub recovery_path: String,
    pub appeal_window_days: u32,
    pub reviewer: String,
    /// Eligible for the protection-period waiver.
    pub protection_exempt: bool,
}

impl ViolationPolicy {
    /// Check if the policy's tier range covers `tier`.
    #[must_use]
    pub fn applies_to(&self, tier: Tier) -> bool {
        tier >= self.min_tier && tier <= self.max_tier
    }
}

// =============================================================================
// GOVERNANCE CONFIG
// =============================================================================

/// The complete, versioned governance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    pub version: String,
    pub stage_rules: StageRules,
    pub protection: ProtectionRules,
    #[serde(default, rename = "promotion")]
    pub thresholds: Vec<PromotionThreshold>,
    #[serde(default, rename = "violation")]
    pub policies: Vec<ViolationPolicy>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl GovernanceConfig {
    /// Look up the threshold for a tier pair.
    pub fn threshold(&self, pair: TierPair) -> Result<&PromotionThreshold, StewardError> {
        self.thresholds
            .iter()
            .find(|t| t.pair == pair)
            .ok_or(StewardError::MissingThreshold(pair))
    }

    /// Look up the threshold for a string key ("L0_L1").
    pub fn threshold_by_key(&self, key: &str) -> Result<&PromotionThreshold, StewardError> {
        self.threshold(TierPair::from_key(key)?)
    }

    /// Look up the policy for a violation kind.
    pub fn policy(&self, kind: ViolationKind) -> Result<&ViolationPolicy, StewardError> {
        self.policies
            .iter()
            .find(|p| p.kind == kind)
            .ok_or(StewardError::MissingPolicy(kind))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, StewardError> {
        // Surface unknown keys as their precise configuration errors before
        // the typed parse turns them into a generic message.
        let table: toml::Table = content
            .parse()
            .map_err(|e| StewardError::InvalidConfig(format!("TOML syntax: {}", e)))?;
        check_keys(&table, "promotion", "pair", |k| TierPair::from_key(k).map(|_| ()))?;
        check_keys(&table, "violation", "kind", |k| {
            ViolationKind::from_key(k).map(|_| ())
        })?;

        let config: GovernanceConfig = toml::from_str(content)
            .map_err(|e| StewardError::InvalidConfig(format!("parse governance TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StewardError> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|e| {
            StewardError::IoError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(StewardError::InvalidConfig(format!(
                "Config size {} bytes exceeds maximum {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            StewardError::IoError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), StewardError> {
        let rules = &self.stage_rules;
        if rules.stability.required_days == 0 {
            return Err(StewardError::InvalidConfig(
                "stability.required_days must be positive".to_string(),
            ));
        }
        for percent in [
            rules.regression_adherence_floor_percent,
            rules.advance_adherence_percent,
            rules.stability.min_retention_percent,
        ] {
            if percent > 100 {
                return Err(StewardError::InvalidConfig(format!(
                    "percentage {} is above 100",
                    percent
                )));
            }
        }
        if rules.regression_adherence_floor_percent > rules.advance_adherence_percent {
            return Err(StewardError::InvalidConfig(
                "regression adherence floor is above the advance level".to_string(),
            ));
        }

        check_window("protection.protection_days", self.protection.protection_days)?;
        check_window("protection.observation_days", self.protection.observation_days)?;
        if self.protection.recovery_months > MAX_RECOVERY_MONTHS {
            return Err(StewardError::InvalidConfig(format!(
                "protection.recovery_months {} exceeds {}",
                self.protection.recovery_months, MAX_RECOVERY_MONTHS
            )));
        }

        let mut seen_pairs = BTreeSet::new();
        for threshold in &self.thresholds {
            if !seen_pairs.insert(threshold.pair) {
                return Err(StewardError::InvalidConfig(format!(
                    "duplicate threshold for {}",
                    threshold.pair.key()
                )));
            }
            let peers = threshold.peers;
            if peers.min_progressed > peers.total || peers.min_advanced > peers.total {
                return Err(StewardError::InvalidConfig(format!(
                    "{}: peer minimums exceed the total requirement",
                    threshold.pair.key()
                )));
            }
            if threshold.ceremony.contracts.is_empty() {
                return Err(StewardError::InvalidConfig(format!(
                    "{}: ceremony lists no contracts",
                    threshold.pair.key()
                )));
            }
        }

        let mut seen_kinds = BTreeSet::new();
        for policy in &self.policies {
            if !seen_kinds.insert(policy.kind) {
                return Err(StewardError::InvalidConfig(format!(
                    "duplicate policy for {}",
                    policy.kind
                )));
            }
            if policy.min_tier > policy.max_tier {
                return Err(StewardError::InvalidConfig(format!(
                    "{}: min_tier is above max_tier",
                    policy.kind
                )));
            }
            check_window(
                &format!("{}.appeal_window_days", policy.kind),
                policy.appeal_window_days,
            )?;
            // An ethics redline always ends in a forced exit.
            if policy.kind == ViolationKind::EthicsRedline && policy.protection_exempt {
                return Err(StewardError::InvalidConfig(format!(
                    "{}: protection_exempt must be false",
                    policy.kind
                )));
            }
        }
        Ok(())
    }
}

fn check_window(field: &str, days: u32) -> Result<(), StewardError> {
    if days > MAX_WINDOW_DAYS {
        return Err(StewardError::InvalidConfig(format!(
            "{} {} exceeds {} days",
            field, days, MAX_WINDOW_DAYS
        )));
    }
    Ok(())
}

/// Resolve every `field` value inside the array-of-tables `array`.
fn check_keys(
    table: &toml::Table,
    array: &str,
    field: &str,
    resolve: impl Fn(&str) -> Result<(), StewardError>,
) -> Result<(), StewardError> {
    let Some(entries) = table.get(array).and_then(|v| v.as_array()) else {
        return Ok(());
    };
    for entry in entries {
        match entry.get(field).and_then(|v| v.as_str()) {
            Some(key) => resolve(key)?,
            None => {
                return Err(StewardError::InvalidConfig(format!(
                    "[[{}]] entry is missing `{}`",
                    array, field
                )));
            }
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version = "test-1"

[stage_rules]
min_weekly_feedback = 2
min_interruption_points = 1
min_trial_attempts = 4
regression_adherence_floor_percent = 30
advance_adherence_percent = 70
min_pathway_days = 14

[stage_rules.stability]
min_retention_percent = 75
max_gap_days = 4
required_days = 90

[protection]
protection_days = 90
observation_days = 180
recovery_months = 12

[[promotion]]
pair = "L1_L2"
is_hard_gate = false
min_period_days = 120
exams = ["mentor_basics"]

[promotion.min_points]
growth = 300
contribution = 50
influence = 0

[promotion.peers]
total = 5
min_progressed = 3

[promotion.ceremony]
name = "Lantern Rite"
symbol = "lantern"
contracts = ["Peer Guidance Agreement"]

[[violation]]
kind = "minor_complaint"
penalty = { deduct = { track = "contribution", amount = 10 } }
action = "written warning"
min_tier = "L0"
max_tier = "L5"
recovery_path = "reflection report"
appeal_window_days = 7
reviewer = "mentor"
protection_exempt = true
"#;

    #[test]
    fn builtin_is_valid_and_complete() {
        let config = GovernanceConfig::builtin();
        assert!(config.validate().is_ok());
        for pair in TierPair::ALL {
            assert!(config.threshold(pair).is_ok());
        }
        for kind in ViolationKind::ALL {
            assert!(config.policy(kind).is_ok());
        }
    }

    #[test]
    fn parses_minimal_document() {
        let config = GovernanceConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.version, "test-1");
        let threshold = config.threshold(TierPair::L1L2).unwrap();
        assert_eq!(threshold.gate, GateMode::Advisory);
        assert_eq!(threshold.peers.min_advanced, 0);
        assert_eq!(
            config.policy(ViolationKind::MinorComplaint).unwrap().penalty,
            PointPenalty::Deduct {
                track: PointTrack::Contribution,
                amount: 10
            }
        );
    }

    #[test]
    fn missing_entries_fail_at_lookup() {
        let config = GovernanceConfig::from_toml_str(MINIMAL).unwrap();
        assert!(matches!(
            config.threshold(TierPair::L0L1),
            Err(StewardError::MissingThreshold(TierPair::L0L1))
        ));
        assert!(matches!(
            config.policy(ViolationKind::EthicsRedline),
            Err(StewardError::MissingPolicy(ViolationKind::EthicsRedline))
        ));
    }

    #[test]
    fn unknown_pair_is_configuration_error() {
        let doc = MINIMAL.replace("pair = \"L1_L2\"", "pair = \"L1_L9\"");
        match GovernanceConfig::from_toml_str(&doc) {
            Err(StewardError::UnknownTierPair(key)) => assert_eq!(key, "L1_L9"),
            other => panic!("expected UnknownTierPair, got {:?}", other),
        }
    }

    #[test]
    fn unknown_violation_kind_is_configuration_error() {
        let doc = MINIMAL.replace("kind = \"minor_complaint\"", "kind = \"littering\"");
        assert!(matches!(
            GovernanceConfig::from_toml_str(&doc),
            Err(StewardError::UnknownViolationKind(_))
        ));
    }

    #[test]
    fn inconsistent_peer_minimums_rejected() {
        let doc = MINIMAL.replace("min_progressed = 3", "min_progressed = 9");
        assert!(matches!(
            GovernanceConfig::from_toml_str(&doc),
            Err(StewardError::InvalidConfig(_))
        ));
    }

    #[test]
    fn oversized_windows_rejected() {
        let doc = MINIMAL.replace("appeal_window_days = 7", "appeal_window_days = 200000000");
        assert!(matches!(
            GovernanceConfig::from_toml_str(&doc),
            Err(StewardError::InvalidConfig(_))
        ));

        let mut config = GovernanceConfig::builtin();
        config.protection.observation_days = MAX_WINDOW_DAYS + 1;
        assert!(config.validate().is_err());

        let mut config = GovernanceConfig::builtin();
        config.protection.protection_days = MAX_WINDOW_DAYS;
        config.protection.recovery_months = MAX_RECOVERY_MONTHS + 1;
        assert!(config.validate().is_err());
        config.protection.recovery_months = MAX_RECOVERY_MONTHS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ethics_redline_cannot_be_waived() {
        let mut config = GovernanceConfig::builtin();
        for policy in &mut config.policies {
            if policy.kind == ViolationKind::EthicsRedline {
                policy.protection_exempt = true;
            }
        }
        match config.validate() {
            Err(StewardError::InvalidConfig(message)) => {
                assert!(message.contains("protection_exempt"));
            }
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn threshold_by_key_rejects_unknown() {
        let config = GovernanceConfig::builtin();
        assert!(config.threshold_by_key("L0_L1").is_ok());
        assert!(matches!(
            config.threshold_by_key("L5_L6"),
            Err(StewardError::UnknownTierPair(_))
        ));
    }
}
