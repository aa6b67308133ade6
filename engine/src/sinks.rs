//! Outbound sinks: best-effort push fan-out and the hash-chained audit log.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use rakshak_core::ClassificationResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::providers::BoxFuture;

const GENESIS_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ── Push ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PushKind {
    AlertNew,
    AnalysisUpdate,
}

/// What observers receive for every classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub kind: PushKind,
    pub payload: ClassificationResult,
    pub timestamp: DateTime<Utc>,
}

impl PushEnvelope {
    pub fn for_result(result: &ClassificationResult, now: DateTime<Utc>) -> Self {
        let kind = if result.classification.is_safe() {
            PushKind::AnalysisUpdate
        } else {
            PushKind::AlertNew
        };
        Self {
            kind,
            payload: result.clone(),
            timestamp: now,
        }
    }
}

/// Fire-and-forget observer channel. Implementations must not block.
pub trait PushSink: Send + Sync {
    fn publish(&self, envelope: PushEnvelope);
}

pub struct BroadcastPushSink {
    sender: broadcast::Sender<PushEnvelope>,
}

impl BroadcastPushSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushEnvelope> {
        self.sender.subscribe()
    }
}

impl PushSink for BroadcastPushSink {
    fn publish(&self, envelope: PushEnvelope) {
        let zone_id = envelope.payload.zone_id.clone();
        match self.sender.send(envelope) {
            Ok(receivers) => tracing::debug!(zone_id, receivers, "push envelope sent"),
            Err(_) => tracing::debug!(zone_id, "push envelope dropped, no subscribers"),
        }
    }
}

// ── Audit ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    VisionAnalysis,
    SensorAnalysis,
    IntentClassification,
    AlertCreated,
    AlertAcknowledged,
    AlertResolved,
    AlertEscalated,
    SystemEvent,
    Error,
}

impl AuditEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditEventType::VisionAnalysis => "vision_analysis",
            AuditEventType::SensorAnalysis => "sensor_analysis",
            AuditEventType::IntentClassification => "intent_classification",
            AuditEventType::AlertCreated => "alert_created",
            AuditEventType::AlertAcknowledged => "alert_acknowledged",
            AuditEventType::AlertResolved => "alert_resolved",
            AuditEventType::AlertEscalated => "alert_escalated",
            AuditEventType::SystemEvent => "system_event",
            AuditEventType::Error => "error",
        }
    }
}

/// An audit record before it is sealed into the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub zone_id: Option<String>,
    pub summary: String,
    pub details: Value,
    pub inputs: Value,
    pub outputs: Value,
    pub decision_factors: Vec<String>,
    pub actor: Option<String>,
    pub processing_time_ms: Option<f64>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, summary: impl Into<String>) -> Self {
        Self {
            event_type,
            zone_id: None,
            summary: summary.into(),
            details: Value::Null,
            inputs: Value::Null,
            outputs: Value::Null,
            decision_factors: Vec::new(),
            actor: None,
            processing_time_ms: None,
        }
    }

    pub fn zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn inputs(mut self, inputs: Value) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn outputs(mut self, outputs: Value) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn decision_factors(mut self, factors: Vec<String>) -> Self {
        self.decision_factors = factors;
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn processing_time_ms(mut self, ms: f64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    pub summary: String,
    pub details: Value,
    pub inputs: Value,
    pub outputs: Value,
    pub decision_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
    pub prev_digest: String,
    pub digest: String,
}

/// Everything in an entry except its own digest, in a fixed field order.
#[derive(Serialize)]
struct DigestInput<'a> {
    entry_id: &'a str,
    timestamp: &'a DateTime<Utc>,
    event_type: AuditEventType,
    zone_id: &'a Option<String>,
    summary: &'a str,
    details: &'a Value,
    inputs: &'a Value,
    outputs: &'a Value,
    decision_factors: &'a [String],
    actor: &'a Option<String>,
    session_id: &'a str,
    processing_time_ms: &'a Option<f64>,
    prev_digest: &'a str,
}

impl AuditEntry {
    fn compute_digest(&self) -> String {
        let input = DigestInput {
            entry_id: &self.entry_id,
            timestamp: &self.timestamp,
            event_type: self.event_type,
            zone_id: &self.zone_id,
            summary: &self.summary,
            details: &self.details,
            inputs: &self.inputs,
            outputs: &self.outputs,
            decision_factors: &self.decision_factors,
            actor: &self.actor,
            session_id: &self.session_id,
            processing_time_ms: &self.processing_time_ms,
            prev_digest: &self.prev_digest,
        };
        let bytes = serde_json::to_vec(&input).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    pub retained_entries: usize,
    pub total_recorded: u64,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_entry: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_entry: Option<DateTime<Utc>>,
    pub by_event_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainVerification {
    pub valid: bool,
    pub checked: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_broken_entry: Option<String>,
}

/// Append-only audit trail. Recording never fails the caller.
pub trait AuditSink: Send + Sync {
    fn record<'a>(&'a self, event: AuditEvent) -> BoxFuture<'a, ()>;
}

struct AuditState {
    entries: VecDeque<AuditEntry>,
    total_recorded: u64,
    last_digest: String,
}

/// Bounded in-memory audit log; the oldest entry is evicted once full.
pub struct AuditLog {
    state: RwLock<AuditState>,
    session_id: String,
    max_entries: usize,
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(AuditState {
                entries: VecDeque::new(),
                total_recorded: 0,
                last_digest: GENESIS_DIGEST.to_string(),
            }),
            session_id: format!("session_{}", Uuid::now_v7().simple()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn append(&self, event: AuditEvent) -> AuditEntry {
        self.append_at(event, Utc::now()).await
    }

    pub async fn append_at(&self, event: AuditEvent, now: DateTime<Utc>) -> AuditEntry {
        let mut state = self.state.write().await;
        let mut entry = AuditEntry {
            entry_id: format!("audit_{}", Uuid::now_v7().simple()),
            timestamp: now,
            event_type: event.event_type,
            zone_id: event.zone_id,
            summary: event.summary,
            details: event.details,
            inputs: event.inputs,
            outputs: event.outputs,
            decision_factors: event.decision_factors,
            actor: event.actor,
            session_id: self.session_id.clone(),
            processing_time_ms: event.processing_time_ms,
            prev_digest: state.last_digest.clone(),
            digest: String::new(),
        };
        entry.digest = entry.compute_digest();

        state.last_digest = entry.digest.clone();
        state.total_recorded += 1;
        state.entries.push_back(entry.clone());
        while state.entries.len() > self.max_entries {
            state.entries.pop_front();
        }

        tracing::debug!(
            entry_id = %entry.entry_id,
            event_type = entry.event_type.as_str(),
            zone_id = entry.zone_id.as_deref(),
            "audit entry recorded"
        );
        entry
    }

    /// Newest first, optionally filtered.
    pub async fn recent(
        &self,
        limit: usize,
        event_type: Option<AuditEventType>,
        zone_id: Option<&str>,
    ) -> Vec<AuditEntry> {
        let state = self.state.read().await;
        state
            .entries
            .iter()
            .rev()
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .filter(|e| zone_id.is_none_or(|z| e.zone_id.as_deref() == Some(z)))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn get(&self, entry_id: &str) -> Option<AuditEntry> {
        let state = self.state.read().await;
        state.entries.iter().find(|e| e.entry_id == entry_id).cloned()
    }

    pub async fn stats(&self) -> AuditStats {
        let state = self.state.read().await;
        let mut by_event_type = BTreeMap::new();
        for entry in &state.entries {
            *by_event_type
                .entry(entry.event_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        AuditStats {
            retained_entries: state.entries.len(),
            total_recorded: state.total_recorded,
            session_id: self.session_id.clone(),
            oldest_entry: state.entries.front().map(|e| e.timestamp),
            newest_entry: state.entries.back().map(|e| e.timestamp),
            by_event_type,
        }
    }

    /// The newest `limit` entries, oldest first, as pretty JSON.
    pub async fn export_json(&self, limit: usize) -> Result<String, serde_json::Error> {
        let state = self.state.read().await;
        let skip = state.entries.len().saturating_sub(limit);
        let entries: Vec<&AuditEntry> = state.entries.iter().skip(skip).collect();
        serde_json::to_string_pretty(&entries)
    }

    /// Recomputes every retained digest and checks each link to its predecessor.
    /// The first retained entry may point at an evicted one.
    pub async fn verify_chain(&self) -> ChainVerification {
        let state = self.state.read().await;
        let mut previous: Option<&AuditEntry> = None;
        for entry in &state.entries {
            let linked = previous.is_none_or(|p| p.digest == entry.prev_digest);
            if !linked || entry.compute_digest() != entry.digest {
                tracing::warn!(entry_id = %entry.entry_id, "audit chain broken");
                return ChainVerification {
                    valid: false,
                    checked: state.entries.len(),
                    first_broken_entry: Some(entry.entry_id.clone()),
                };
            }
            previous = Some(entry);
        }
        ChainVerification {
            valid: true,
            checked: state.entries.len(),
            first_broken_entry: None,
        }
    }
}

impl AuditSink for AuditLog {
    fn record<'a>(&'a self, event: AuditEvent) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.append(event).await;
        })
    }
}
