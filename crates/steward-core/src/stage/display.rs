//! # Display Permissions
//!
//! Which categories of information may be surfaced to a participant at each
//! stage. Pure lookup, consumed by the UI layer.
//!
//! | Stage | Newly allowed |
//! |-------|---------------|
//! | S0 | progress summary |
//! | S1 | behavioral trend |
//! | S2 | raw scores |
//! | S3 | pathway recommendations, risk level |
//! | S4 | peer comparison, predictive conclusions |
//! | S5 | group ranking |

use crate::types::Stage;
use serde::{Deserialize, Serialize};

/// Categories of participant-facing information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoCategory {
    ProgressSummary,
    BehavioralTrend,
    RawScores,
    PathwayRecommendations,
    RiskLevel,
    PeerComparison,
    PredictiveConclusions,
    GroupRanking,
}

impl InfoCategory {
    pub const ALL: [InfoCategory; 8] = [
        InfoCategory::ProgressSummary,
        InfoCategory::BehavioralTrend,
        InfoCategory::RawScores,
        InfoCategory::PathwayRecommendations,
        InfoCategory::RiskLevel,
        InfoCategory::PeerComparison,
        InfoCategory::PredictiveConclusions,
        InfoCategory::GroupRanking,
    ];

    /// The earliest stage at which this category may be shown.
    #[must_use]
    pub fn unlocked_at(&self) -> Stage {
        match self {
            InfoCategory::ProgressSummary => Stage::S0,
            InfoCategory::BehavioralTrend => Stage::S1,
            InfoCategory::RawScores => Stage::S2,
            InfoCategory::PathwayRecommendations | InfoCategory::RiskLevel => Stage::S3,
            InfoCategory::PeerComparison | InfoCategory::PredictiveConclusions => Stage::S4,
            InfoCategory::GroupRanking => Stage::S5,
        }
    }
}

/// Allowed and forbidden categories for one stage. Together they cover
/// every category exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPermissions {
    pub stage: Stage,
    pub allowed: Vec<InfoCategory>,
    pub forbidden: Vec<InfoCategory>,
}

impl DisplayPermissions {
    /// Check whether a category may be shown.
    #[must_use]
    pub fn allows(&self, category: InfoCategory) -> bool {
        self.allowed.contains(&category)
    }
}

/// Look up the display permissions for a stage.
#[must_use]
pub fn get_display_permissions(stage: Stage) -> DisplayPermissions {
    let (allowed, forbidden): (Vec<_>, Vec<_>) = InfoCategory::ALL
        .into_iter()
        .partition(|category| category.unlocked_at() <= stage);
    DisplayPermissions {
        stage,
        allowed,
        forbidden,
    }
}
