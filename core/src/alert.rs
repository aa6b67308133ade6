use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classification::Classification;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Urgency rank, 0 = most urgent.
    pub fn urgency_rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Escalated,
    FalsePositive,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Escalated => "escalated",
            AlertStatus::FalsePositive => "false_positive",
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            "escalated" => Ok(AlertStatus::Escalated),
            "false_positive" => Ok(AlertStatus::FalsePositive),
            other => Err(format!("unknown alert status '{other}'")),
        }
    }
}

/// Who gets paged for an unacknowledged alert. Serialized as 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum EscalationLevel {
    Initial = 1,
    Supervisor = 2,
    Manager = 3,
    Emergency = 4,
}

impl EscalationLevel {
    /// The next level up, or `None` at `Emergency`.
    pub fn next(self) -> Option<EscalationLevel> {
        match self {
            EscalationLevel::Initial => Some(EscalationLevel::Supervisor),
            EscalationLevel::Supervisor => Some(EscalationLevel::Manager),
            EscalationLevel::Manager => Some(EscalationLevel::Emergency),
            EscalationLevel::Emergency => None,
        }
    }
}

impl From<EscalationLevel> for u8 {
    fn from(level: EscalationLevel) -> Self {
        level as u8
    }
}

impl TryFrom<u8> for EscalationLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(EscalationLevel::Initial),
            2 => Ok(EscalationLevel::Supervisor),
            3 => Ok(EscalationLevel::Manager),
            4 => Ok(EscalationLevel::Emergency),
            other => Err(format!("escalation level {other} out of range 1..=4")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub by: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub by: String,
    pub at: DateTime<Utc>,
    pub notes: String,
    pub was_actual_tampering: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub zone_id: String,
    pub classification_id: String,
    pub classification: Classification,
    pub severity: Severity,
    pub status: AlertStatus,
    pub risk_score: f64,
    pub title: String,
    pub description: String,
    pub reasons: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledgement: Option<Acknowledgement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    pub escalation_level: EscalationLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalated_at: Option<DateTime<Utc>>,
    pub is_simulated: bool,
}

impl Alert {
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledgement.is_some()
    }
}

/// Dashboard overview of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertStatusSummary {
    pub total_active: usize,
    /// ACTIVE alerts per severity, every severity present
    pub by_severity: std::collections::BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_urgent: Option<Alert>,
    pub recent_alerts: Vec<Alert>,
    pub alerts_last_hour: usize,
    pub alerts_last_24h: usize,
    pub last_updated: DateTime<Utc>,
}

pub const DEFAULT_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertHistoryQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<AlertStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for AlertHistoryQuery {
    fn default() -> Self {
        Self {
            zone_id: None,
            severity: None,
            status: None,
            start_time: None,
            end_time: None,
            limit: DEFAULT_HISTORY_LIMIT,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertHistoryPage {
    pub alerts: Vec<Alert>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalation_steps_one_level_and_stops_at_emergency() {
        assert_eq!(
            EscalationLevel::Initial.next(),
            Some(EscalationLevel::Supervisor)
        );
        assert_eq!(
            EscalationLevel::Manager.next(),
            Some(EscalationLevel::Emergency)
        );
        assert_eq!(EscalationLevel::Emergency.next(), None);
    }

    #[test]
    fn escalation_level_serializes_as_integer() {
        assert_eq!(
            serde_json::to_value(EscalationLevel::Manager).unwrap(),
            serde_json::json!(3)
        );
        let level: EscalationLevel = serde_json::from_value(serde_json::json!(2)).unwrap();
        assert_eq!(level, EscalationLevel::Supervisor);
        assert!(serde_json::from_value::<EscalationLevel>(serde_json::json!(9)).is_err());
    }

    #[test]
    fn urgency_rank_puts_critical_first() {
        let mut severities = Severity::ALL.to_vec();
        severities.sort_by_key(|s| s.urgency_rank());
        assert_eq!(severities.first(), Some(&Severity::Critical));
        assert_eq!(severities.last(), Some(&Severity::Low));
    }

    #[test]
    fn history_query_defaults_to_fifty() {
        let query: AlertHistoryQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(query.limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(query.offset, 0);
        assert_eq!(query, AlertHistoryQuery::default());
    }

    #[test]
    fn status_and_severity_parse_from_strings() {
        assert_eq!("critical".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!(
            "false_positive".parse::<AlertStatus>(),
            Ok(AlertStatus::FalsePositive)
        );
        assert!("pending".parse::<AlertStatus>().is_err());
    }
}
