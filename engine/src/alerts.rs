//! Alert registry: rate-limited creation plus acknowledge, resolve and
//! escalate transitions.
//!
//! Every mutation of an alert or of a zone's gate counters happens under the
//! single registry write lock, so concurrent cycles for the same zone cannot
//! both pass the cooldown check.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rakshak_core::alert::MAX_HISTORY_LIMIT;
use rakshak_core::config::{AlertConfig, SeverityRanges};
use rakshak_core::{
    Acknowledgement, Alert, AlertError, AlertHistoryPage, AlertHistoryQuery, AlertStatus,
    AlertStatusSummary, Classification, ClassificationResult, EscalationLevel, Resolution,
    RiskConfig, Severity,
};
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::sinks::{AuditEvent, AuditEventType, AuditSink};

const RECENT_ALERTS: usize = 10;

#[derive(Debug, Default)]
struct ZoneGate {
    last_alert_at: Option<DateTime<Utc>>,
    /// Creation times inside the trailing hour, oldest first.
    hourly: VecDeque<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GateDecision {
    Allow,
    Cooldown { remaining_secs: i64 },
    FloodLimited { alerts_last_hour: usize },
}

impl ZoneGate {
    fn check(&mut self, config: &AlertConfig, now: DateTime<Utc>) -> GateDecision {
        if let Some(last) = self.last_alert_at {
            let elapsed = (now - last).num_seconds();
            let cooldown = config.cooldown_seconds as i64;
            if elapsed < cooldown {
                return GateDecision::Cooldown {
                    remaining_secs: cooldown - elapsed,
                };
            }
        }

        let hour_ago = now - ChronoDuration::hours(1);
        while self.hourly.front().is_some_and(|t| *t <= hour_ago) {
            self.hourly.pop_front();
        }
        if self.hourly.len() >= config.max_alerts_per_hour {
            return GateDecision::FloodLimited {
                alerts_last_hour: self.hourly.len(),
            };
        }

        GateDecision::Allow
    }

    fn record(&mut self, now: DateTime<Utc>) {
        self.last_alert_at = Some(now);
        self.hourly.push_back(now);
    }
}

#[derive(Debug, Default)]
struct Registry {
    alerts: HashMap<String, Alert>,
    gates: HashMap<String, ZoneGate>,
}

pub struct AlertManager {
    config: AlertConfig,
    severity: SeverityRanges,
    registry: RwLock<Registry>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl AlertManager {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            config: config.alerts.clone(),
            severity: config.severity.clone(),
            registry: RwLock::new(Registry::default()),
            audit: None,
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub async fn create_from_classification(
        &self,
        result: &ClassificationResult,
    ) -> Option<Alert> {
        self.create_from_classification_at(result, Utc::now()).await
    }

    /// `None` for SAFE verdicts and for verdicts held back by the zone's
    /// cooldown or hourly cap.
    pub async fn create_from_classification_at(
        &self,
        result: &ClassificationResult,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        if result.classification.is_safe() {
            return None;
        }

        let alert = {
            let mut registry = self.registry.write().await;
            let gate = registry.gates.entry(result.zone_id.clone()).or_default();
            match gate.check(&self.config, now) {
                GateDecision::Allow => {}
                GateDecision::Cooldown { remaining_secs } => {
                    tracing::info!(
                        zone_id = %result.zone_id,
                        classification_id = %result.classification_id,
                        remaining_secs,
                        "alert suppressed by zone cooldown"
                    );
                    return None;
                }
                GateDecision::FloodLimited { alerts_last_hour } => {
                    tracing::warn!(
                        zone_id = %result.zone_id,
                        classification_id = %result.classification_id,
                        alerts_last_hour,
                        max_alerts_per_hour = self.config.max_alerts_per_hour,
                        "alert suppressed by hourly flood limit"
                    );
                    return None;
                }
            }
            gate.record(now);

            let alert = self.build_alert(result, now);
            registry.alerts.insert(alert.alert_id.clone(), alert.clone());
            alert
        };

        tracing::info!(
            alert_id = %alert.alert_id,
            zone_id = %alert.zone_id,
            severity = %alert.severity,
            risk_score = alert.risk_score,
            "alert created"
        );
        self.audit(
            AuditEvent::new(AuditEventType::AlertCreated, alert.title.clone())
                .zone(alert.zone_id.clone())
                .inputs(json!({ "classification_id": result.classification_id }))
                .outputs(serde_json::to_value(&alert).unwrap_or_default())
                .decision_factors(alert.reasons.clone()),
        )
        .await;

        Some(alert)
    }

    fn build_alert(&self, result: &ClassificationResult, now: DateTime<Utc>) -> Alert {
        let (title, description) = match result.classification {
            Classification::ConfirmedTampering => (
                format!("TAMPERING DETECTED: {}", result.zone_id),
                format!(
                    "High confidence ({:.1}%) evidence of intentional track tampering. Immediate investigation required.",
                    result.risk_score
                ),
            ),
            _ => (
                format!("Suspicious Activity: {}", result.zone_id),
                format!(
                    "Suspicious anomalies detected (risk score: {:.1}%). Human investigation recommended.",
                    result.risk_score
                ),
            ),
        };

        Alert {
            alert_id: format!("alert_{}", Uuid::now_v7().simple()),
            zone_id: result.zone_id.clone(),
            classification_id: result.classification_id.clone(),
            classification: result.classification,
            severity: self.severity.severity_for(result.risk_score),
            status: AlertStatus::Active,
            risk_score: result.risk_score,
            title,
            description,
            reasons: result
                .primary_reasons
                .iter()
                .take(self.config.max_reasons)
                .cloned()
                .collect(),
            created_at: now,
            updated_at: now,
            acknowledgement: None,
            resolution: None,
            escalation_level: EscalationLevel::Initial,
            escalated_at: None,
            is_simulated: result.is_simulated,
        }
    }

    pub async fn acknowledge(
        &self,
        alert_id: &str,
        by: &str,
        notes: Option<String>,
        mark_false_positive: bool,
    ) -> Result<Alert, AlertError> {
        self.acknowledge_at(alert_id, by, notes, mark_false_positive, Utc::now())
            .await
    }

    pub async fn acknowledge_at(
        &self,
        alert_id: &str,
        by: &str,
        notes: Option<String>,
        mark_false_positive: bool,
        now: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let by = require_actor(by, "acknowledged_by")?;

        let alert = {
            let mut registry = self.registry.write().await;
            let alert = registry
                .alerts
                .get_mut(alert_id)
                .ok_or_else(|| AlertError::NotFound(alert_id.to_string()))?;
            alert.acknowledgement = Some(Acknowledgement {
                by: by.clone(),
                at: now,
                notes,
            });
            alert.status = if mark_false_positive {
                AlertStatus::FalsePositive
            } else {
                AlertStatus::Acknowledged
            };
            alert.updated_at = now;
            alert.clone()
        };

        tracing::info!(
            alert_id,
            acknowledged_by = %by,
            status = alert.status.as_str(),
            "alert acknowledged"
        );
        self.audit(
            AuditEvent::new(
                AuditEventType::AlertAcknowledged,
                format!("Alert {alert_id} acknowledged"),
            )
            .zone(alert.zone_id.clone())
            .actor(by)
            .details(json!({
                "status": alert.status,
                "false_positive": mark_false_positive,
            })),
        )
        .await;

        Ok(alert)
    }

    pub async fn resolve(
        &self,
        alert_id: &str,
        by: &str,
        notes: &str,
        was_actual_tampering: bool,
    ) -> Result<Alert, AlertError> {
        self.resolve_at(alert_id, by, notes, was_actual_tampering, Utc::now())
            .await
    }

    pub async fn resolve_at(
        &self,
        alert_id: &str,
        by: &str,
        notes: &str,
        was_actual_tampering: bool,
        now: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let by = require_actor(by, "resolved_by")?;
        let notes = notes.trim();
        if notes.chars().count() < self.config.min_resolution_notes_chars {
            return Err(AlertError::Validation {
                field: "resolution_notes",
                message: format!(
                    "must be at least {} characters",
                    self.config.min_resolution_notes_chars
                ),
            });
        }

        let alert = {
            let mut registry = self.registry.write().await;
            let alert = registry
                .alerts
                .get_mut(alert_id)
                .ok_or_else(|| AlertError::NotFound(alert_id.to_string()))?;
            alert.status = AlertStatus::Resolved;
            alert.resolution = Some(Resolution {
                by: by.clone(),
                at: now,
                notes: notes.to_string(),
                was_actual_tampering,
            });
            alert.updated_at = now;
            alert.clone()
        };

        tracing::info!(
            alert_id,
            resolved_by = %by,
            was_actual_tampering,
            "alert resolved"
        );
        self.audit(
            AuditEvent::new(
                AuditEventType::AlertResolved,
                format!("Alert {alert_id} resolved"),
            )
            .zone(alert.zone_id.clone())
            .actor(by)
            .details(json!({ "was_actual_tampering": was_actual_tampering })),
        )
        .await;

        Ok(alert)
    }

    pub async fn check_escalations(&self) -> Vec<Alert> {
        self.check_escalations_at(Utc::now()).await
    }

    /// Raises every overdue ACTIVE, unacknowledged alert by exactly one level.
    /// Returns the alerts escalated in this pass.
    pub async fn check_escalations_at(&self, now: DateTime<Utc>) -> Vec<Alert> {
        let escalated: Vec<Alert> = {
            let mut registry = self.registry.write().await;
            registry
                .alerts
                .values_mut()
                .filter(|a| a.status == AlertStatus::Active && !a.is_acknowledged())
                .filter_map(|alert| {
                    let timeout = self.config.escalation_timeouts.for_severity(alert.severity);
                    let timeout = i64::try_from(timeout)
                        .ok()
                        .and_then(ChronoDuration::try_seconds)
                        .unwrap_or(ChronoDuration::MAX);
                    if now - alert.created_at <= timeout {
                        return None;
                    }
                    let next = alert.escalation_level.next()?;
                    alert.escalation_level = next;
                    alert.status = AlertStatus::Escalated;
                    alert.escalated_at = Some(now);
                    alert.updated_at = now;
                    Some(alert.clone())
                })
                .collect()
        };

        for alert in &escalated {
            tracing::warn!(
                alert_id = %alert.alert_id,
                zone_id = %alert.zone_id,
                severity = %alert.severity,
                escalation_level = u8::from(alert.escalation_level),
                "alert escalated"
            );
            self.audit(
                AuditEvent::new(
                    AuditEventType::AlertEscalated,
                    format!("Alert {} escalated", alert.alert_id),
                )
                .zone(alert.zone_id.clone())
                .details(json!({ "escalation_level": alert.escalation_level })),
            )
            .await;
        }

        escalated
    }

    pub async fn get(&self, alert_id: &str) -> Result<Alert, AlertError> {
        let registry = self.registry.read().await;
        registry
            .alerts
            .get(alert_id)
            .cloned()
            .ok_or_else(|| AlertError::NotFound(alert_id.to_string()))
    }

    pub async fn status_summary(&self) -> AlertStatusSummary {
        self.status_summary_at(Utc::now()).await
    }

    pub async fn status_summary_at(&self, now: DateTime<Utc>) -> AlertStatusSummary {
        let registry = self.registry.read().await;

        let active: Vec<&Alert> = registry
            .alerts
            .values()
            .filter(|a| a.status == AlertStatus::Active)
            .collect();

        let mut by_severity: BTreeMap<String, usize> = Severity::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for alert in &active {
            *by_severity
                .entry(alert.severity.as_str().to_string())
                .or_insert(0) += 1;
        }

        let most_urgent = active
            .iter()
            .min_by_key(|a| (a.severity.urgency_rank(), a.created_at))
            .map(|a| (*a).clone());

        let mut recent: Vec<&Alert> = registry.alerts.values().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let recent_alerts = recent.into_iter().take(RECENT_ALERTS).cloned().collect();

        let hour_ago = now - ChronoDuration::hours(1);
        let day_ago = now - ChronoDuration::hours(24);
        let alerts_last_hour = registry
            .alerts
            .values()
            .filter(|a| a.created_at > hour_ago)
            .count();
        let alerts_last_24h = registry
            .alerts
            .values()
            .filter(|a| a.created_at > day_ago)
            .count();

        AlertStatusSummary {
            total_active: active.len(),
            by_severity,
            most_urgent,
            recent_alerts,
            alerts_last_hour,
            alerts_last_24h,
            last_updated: now,
        }
    }

    pub async fn history(&self, query: &AlertHistoryQuery) -> Result<AlertHistoryPage, AlertError> {
        if query.limit == 0 || query.limit > MAX_HISTORY_LIMIT {
            return Err(AlertError::Validation {
                field: "limit",
                message: format!("must be between 1 and {MAX_HISTORY_LIMIT}"),
            });
        }

        let registry = self.registry.read().await;
        let mut matching: Vec<&Alert> = registry
            .alerts
            .values()
            .filter(|a| query.zone_id.as_ref().is_none_or(|z| &a.zone_id == z))
            .filter(|a| query.severity.is_none_or(|s| a.severity == s))
            .filter(|a| query.status.is_none_or(|s| a.status == s))
            .filter(|a| query.start_time.is_none_or(|t| a.created_at >= t))
            .filter(|a| query.end_time.is_none_or(|t| a.created_at <= t))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len();
        let alerts: Vec<Alert> = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect();
        let has_more = query.offset + alerts.len() < total;

        Ok(AlertHistoryPage {
            alerts,
            total,
            limit: query.limit,
            offset: query.offset,
            has_more,
        })
    }

    async fn audit(&self, event: AuditEvent) {
        if let Some(sink) = &self.audit {
            sink.record(event).await;
        }
    }
}

fn require_actor(by: &str, field: &'static str) -> Result<String, AlertError> {
    let by = by.trim();
    if by.is_empty() {
        return Err(AlertError::Validation {
            field,
            message: "must not be empty".to_string(),
        });
    }
    Ok(by.to_string())
}
