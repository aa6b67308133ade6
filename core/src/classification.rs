use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final verdict tier for one zone at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Safe,
    Suspicious,
    ConfirmedTampering,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Safe => "SAFE",
            Classification::Suspicious => "SUSPICIOUS",
            Classification::ConfirmedTampering => "CONFIRMED_TAMPERING",
        }
    }

    pub fn is_safe(self) -> bool {
        self == Classification::Safe
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorCategory {
    Vision,
    Sensor,
    Temporal,
}

/// One explainable contributor to a risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor_id: String,
    pub category: FactorCategory,
    pub name: String,
    pub description: String,
    pub weight: f64,
    /// 0-1
    pub raw_score: f64,
    /// Points added to the total, never negative
    pub weighted_contribution: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub confidence: f64,
}

/// Time-of-day context used to scale the base risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalContext {
    pub timestamp: DateTime<Utc>,
    pub hour_of_day: u32,
    pub is_night_hours: bool,
    pub is_early_morning: bool,
    pub is_peak_hours: bool,
    pub is_maintenance_window: bool,
    /// Always within [0.5, 2.0]
    pub time_risk_modifier: f64,
    #[serde(default)]
    pub temporal_notes: Vec<String>,
}

/// Vision, sensor and temporal inputs as they entered the fusion step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub vision_risk_score: f64,
    pub sensor_risk_score: f64,
    pub temporal_modifier: f64,
}

/// Per-cycle verdict. Immutable once built; the only input to alert creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classification_id: String,
    pub zone_id: String,
    pub timestamp: DateTime<Utc>,
    pub classification: Classification,
    /// 0-100, two decimals
    pub risk_score: f64,
    /// 0-1, two decimals
    pub confidence: f64,
    pub risk_factors: Vec<RiskFactor>,
    pub primary_reasons: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub component_scores: ComponentScores,
    pub temporal_context: TemporalContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_analysis_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_analysis_id: Option<String>,
    /// Set when an override rule decided the tier instead of the thresholds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_rule: Option<String>,
    pub processing_time_ms: f64,
    pub is_simulated: bool,
    pub model_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_serializes_in_screaming_case() {
        let json = serde_json::to_string(&Classification::ConfirmedTampering).unwrap();
        assert_eq!(json, "\"CONFIRMED_TAMPERING\"");
        assert_eq!(Classification::Suspicious.to_string(), "SUSPICIOUS");
    }

    #[test]
    fn tiers_order_by_severity() {
        assert!(Classification::Safe < Classification::Suspicious);
        assert!(Classification::Suspicious < Classification::ConfirmedTampering);
        assert!(Classification::Safe.is_safe());
    }
}
