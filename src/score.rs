//! Codebase health score.
//!
//! Every finding adds points by severity; the total is capped at 100 and
//! mapped to a letter grade. Lower is healthier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detect::Findings;
use crate::rules::Severity;

/// Point weights per finding severity.
pub mod points {
    pub const HIGH: u32 = 10;
    pub const MEDIUM: u32 = 5;
    pub const LOW: u32 = 2;
}

/// Grade thresholds (inclusive upper bounds).
pub mod grades {
    pub const A_MAX: u32 = 10;
    pub const B_MAX: u32 = 25;
    pub const C_MAX: u32 = 50;
    pub const D_MAX: u32 = 75;
}

/// Points for a single finding.
pub fn points_for(severity: Severity) -> u32 {
    match severity {
        Severity::High => points::HIGH,
        Severity::Medium => points::MEDIUM,
        Severity::Low => points::LOW,
    }
}

/// Letter grade for a capped score.
pub fn grade_for(score: u32) -> &'static str {
    match score {
        s if s <= grades::A_MAX => "A",
        s if s <= grades::B_MAX => "B",
        s if s <= grades::C_MAX => "C",
        s if s <= grades::D_MAX => "D",
        _ => "F",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthScore {
    /// 0-100, higher means more issues
    pub score: u32,
    pub grade: String,
    /// Uncapped points by category
    pub breakdown: BTreeMap<String, u32>,
}

impl HealthScore {
    /// Points before capping.
    pub fn total_points(&self) -> u32 {
        self.breakdown.values().sum()
    }
}

/// Score a set of finding groups, e.g. one per file.
pub fn calculate<'a, I>(findings: I) -> HealthScore
where
    I: IntoIterator<Item = &'a Findings>,
{
    let mut breakdown: BTreeMap<String, u32> = BTreeMap::new();
    for group in findings {
        for finding in group.iter() {
            *breakdown
                .entry(finding.category.as_str().to_string())
                .or_insert(0) += points_for(finding.severity);
        }
    }

    let score = breakdown.values().sum::<u32>().min(100);
    HealthScore {
        score,
        grade: grade_for(score).to_string(),
        breakdown,
    }
}
