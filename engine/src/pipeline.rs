//! One classification cycle: fetch evidence, analyze, classify, alert.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rakshak_core::error::codes;
use rakshak_core::safe_math::round_to;
use rakshak_core::{
    Alert, ClassificationResult, ErrorReport, RiskConfig, SensorAnalysis, VisionAnalysis,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::alerts::AlertManager;
use crate::classifier::RiskClassifier;
use crate::providers::{
    AnomalyDetector, DetectionProvider, EvidenceRequest, ProviderError, ReadingProvider,
};
use crate::sensor::{SensorAnalyzer, ThresholdAnomalyDetector};
use crate::simulation::Scenario;
use crate::sinks::{AuditEvent, AuditEventType, AuditSink, PushSink};
use crate::temporal::TemporalCalculator;
use crate::vision::VisionAnalyzer;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CycleError {
    #[error("{provider} did not answer within {timeout_ms} ms")]
    EvidenceTimeout {
        provider: &'static str,
        timeout_ms: u64,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl CycleError {
    pub fn code(&self) -> &'static str {
        match self {
            CycleError::EvidenceTimeout { .. } => codes::EVIDENCE_TIMEOUT,
            CycleError::Provider(_) => codes::PROVIDER_FAILED,
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        let report = ErrorReport::new(self.code(), self.to_string());
        match self {
            CycleError::EvidenceTimeout { provider, .. } => report
                .with_field(*provider)
                .with_docs_hint("Raise pipeline.evidence_timeout_ms or check the provider."),
            CycleError::Provider(
                ProviderError::Unavailable { provider, .. }
                | ProviderError::Malformed { provider, .. },
            ) => report.with_field(*provider),
        }
    }
}

/// Everything one cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutcome {
    pub vision: VisionAnalysis,
    pub sensor: SensorAnalysis,
    pub classification: ClassificationResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
}

pub struct Pipeline {
    detections: Arc<dyn DetectionProvider>,
    readings: Arc<dyn ReadingProvider>,
    detector: Arc<dyn AnomalyDetector>,
    vision: VisionAnalyzer,
    sensor: SensorAnalyzer,
    temporal: TemporalCalculator,
    classifier: RiskClassifier,
    alerts: Arc<AlertManager>,
    audit: Option<Arc<dyn AuditSink>>,
    evidence_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        config: &RiskConfig,
        detections: Arc<dyn DetectionProvider>,
        readings: Arc<dyn ReadingProvider>,
        alerts: Arc<AlertManager>,
    ) -> Self {
        Self {
            detections,
            readings,
            detector: Arc::new(ThresholdAnomalyDetector::new(config.sensor.clone())),
            vision: VisionAnalyzer::new(config.vision.clone()),
            sensor: SensorAnalyzer::new(config.sensor.clone()),
            temporal: TemporalCalculator::new(config.temporal.clone()),
            classifier: RiskClassifier::new(config),
            alerts,
            audit: None,
            evidence_timeout: Duration::from_millis(config.pipeline.evidence_timeout_ms),
        }
    }

    pub fn with_anomaly_detector(mut self, detector: Arc<dyn AnomalyDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_push_sink(mut self, sink: Arc<dyn PushSink>) -> Self {
        self.classifier = self.classifier.with_push_sink(sink);
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn with_evidence_timeout(mut self, timeout: Duration) -> Self {
        self.evidence_timeout = timeout;
        self
    }

    pub fn alerts(&self) -> &Arc<AlertManager> {
        &self.alerts
    }

    pub async fn run_cycle(
        &self,
        zone_id: &str,
        scenario: Option<Scenario>,
    ) -> Result<CycleOutcome, CycleError> {
        self.run_cycle_at(zone_id, scenario, Utc::now(), None).await
    }

    /// Failures are audited before they are returned. `evidence_timeout`
    /// bounds each provider fetch for this call only; `None` uses the
    /// configured `pipeline.evidence_timeout_ms`.
    pub async fn run_cycle_at(
        &self,
        zone_id: &str,
        scenario: Option<Scenario>,
        now: DateTime<Utc>,
        evidence_timeout: Option<Duration>,
    ) -> Result<CycleOutcome, CycleError> {
        let started = Instant::now();
        let timeout = evidence_timeout.unwrap_or(self.evidence_timeout);
        match self.execute(zone_id, scenario, now, timeout).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::warn!(zone_id, error = %err, "classification cycle failed");
                self.audit(
                    AuditEvent::new(AuditEventType::Error, format!("Cycle failed: {err}"))
                        .zone(zone_id)
                        .details(json!({ "code": err.code(), "scenario": scenario }))
                        .processing_time_ms(elapsed_ms(started)),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        zone_id: &str,
        scenario: Option<Scenario>,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<CycleOutcome, CycleError> {
        let started = Instant::now();
        let request = EvidenceRequest::new(zone_id, now).with_scenario(scenario);

        let (detections, readings) = tokio::join!(
            bounded(timeout, self.detections.name(), self.detections.detections(&request)),
            bounded(timeout, self.readings.name(), self.readings.readings(&request)),
        );
        let (detections, readings) = (detections?, readings?);

        let vision = self.vision.analyze(
            zone_id,
            request.source,
            now,
            detections.detections,
            detections.conditions,
            detections.is_simulated,
        );
        self.audit(
            AuditEvent::new(
                AuditEventType::VisionAnalysis,
                format!("Vision score {:.2}", vision.vision_risk_score),
            )
            .zone(zone_id)
            .inputs(json!({ "image_source": vision.image_source, "conditions": vision.image_conditions }))
            .outputs(json!({
                "analysis_id": vision.analysis_id,
                "vision_risk_score": vision.vision_risk_score,
                "total_detections": vision.total_detections,
            }))
            .decision_factors(vision.risk_reasons.clone())
            .processing_time_ms(vision.processing_time_ms),
        )
        .await;

        let anomalies = self.detector.detect(&readings.readings);
        let sensor = self.sensor.analyze(
            zone_id,
            now,
            &readings.readings,
            anomalies,
            readings.is_simulated,
        );
        self.audit(
            AuditEvent::new(
                AuditEventType::SensorAnalysis,
                format!("Sensor score {:.2}", sensor.sensor_risk_score),
            )
            .zone(zone_id)
            .inputs(json!({ "readings": sensor.readings_analyzed }))
            .outputs(json!({
                "analysis_id": sensor.analysis_id,
                "sensor_risk_score": sensor.sensor_risk_score,
                "total_anomalies": sensor.total_anomalies,
                "is_coordinated": sensor.is_coordinated,
                "sabotage_likelihood": sensor.sabotage_likelihood,
            }))
            .decision_factors(sensor.risk_reasons.clone())
            .processing_time_ms(sensor.processing_time_ms),
        )
        .await;

        let temporal = self.temporal.compute(now);
        let classification =
            self.classifier
                .classify(zone_id, now, Some(&vision), Some(&sensor), temporal);
        self.audit(
            AuditEvent::new(
                AuditEventType::IntentClassification,
                format!(
                    "{} ({:.2})",
                    classification.classification, classification.risk_score
                ),
            )
            .zone(zone_id)
            .inputs(json!({
                "vision_analysis_id": vision.analysis_id,
                "sensor_analysis_id": sensor.analysis_id,
                "component_scores": classification.component_scores,
            }))
            .outputs(json!({
                "classification_id": classification.classification_id,
                "classification": classification.classification,
                "risk_score": classification.risk_score,
                "confidence": classification.confidence,
                "override_rule": classification.override_rule,
            }))
            .decision_factors(classification.primary_reasons.clone())
            .processing_time_ms(elapsed_ms(started)),
        )
        .await;

        let alert = self
            .alerts
            .create_from_classification_at(&classification, now)
            .await;

        Ok(CycleOutcome {
            vision,
            sensor,
            classification,
            alert,
        })
    }

    async fn audit(&self, event: AuditEvent) {
        if let Some(sink) = &self.audit {
            sink.record(event).await;
        }
    }
}

async fn bounded<T>(
    timeout: Duration,
    provider: &'static str,
    fetch: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, CycleError> {
    match tokio::time::timeout(timeout, fetch).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CycleError::EvidenceTimeout {
            provider,
            timeout_ms: whole_millis(timeout),
        }),
    }
}

/// Saturates instead of truncating for durations past `u64::MAX` ms.
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn elapsed_ms(started: Instant) -> f64 {
    round_to(started.elapsed().as_secs_f64() * 1000.0, 2)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::providers::{BoxFuture, DetectionBatch, ReadingBatch};
    use crate::simulation::{SimulatedImageProvider, SimulatedSensorProvider};
    use crate::sinks::AuditLog;
    use rakshak_core::Classification;

    /// Never answers.
    pub(crate) struct StalledProvider;

    impl DetectionProvider for StalledProvider {
        fn name(&self) -> &'static str {
            "stalled_camera"
        }

        fn detections<'a>(
            &'a self,
            _request: &'a EvidenceRequest,
        ) -> BoxFuture<'a, Result<DetectionBatch, ProviderError>> {
            Box::pin(std::future::pending())
        }
    }

    pub(crate) struct OfflineSensors;

    impl ReadingProvider for OfflineSensors {
        fn name(&self) -> &'static str {
            "offline_sensors"
        }

        fn readings<'a>(
            &'a self,
            _request: &'a EvidenceRequest,
        ) -> BoxFuture<'a, Result<ReadingBatch, ProviderError>> {
            Box::pin(async {
                Err(ProviderError::Unavailable {
                    provider: "offline_sensors",
                    message: "gateway unreachable".to_string(),
                })
            })
        }
    }

    pub(crate) fn simulated_pipeline(config: &RiskConfig, seed: u64) -> Pipeline {
        Pipeline::new(
            config,
            Arc::new(SimulatedImageProvider::new(config.vision.clone(), Some(seed))),
            Arc::new(SimulatedSensorProvider::new(Some(seed))),
            Arc::new(AlertManager::new(config)),
        )
    }

    #[tokio::test]
    async fn normal_cycle_is_safe_and_fully_audited() {
        let config = RiskConfig::default();
        let audit = Arc::new(AuditLog::new(100));
        let pipeline = simulated_pipeline(&config, 42).with_audit_sink(audit.clone());

        let outcome = pipeline
            .run_cycle("ZONE-001", Some(Scenario::Normal))
            .await
            .unwrap();

        assert_eq!(outcome.vision.total_detections, 0);
        assert_eq!(outcome.sensor.total_sensors, 7);
        assert_eq!(
            outcome.classification.vision_analysis_id.as_deref(),
            Some(outcome.vision.analysis_id.as_str())
        );
        if outcome.classification.classification == Classification::Safe {
            assert!(outcome.alert.is_none());
        }

        let stats = audit.stats().await;
        assert_eq!(stats.by_event_type.get("vision_analysis"), Some(&1));
        assert_eq!(stats.by_event_type.get("sensor_analysis"), Some(&1));
        assert_eq!(stats.by_event_type.get("intent_classification"), Some(&1));
    }

    #[tokio::test]
    async fn stalled_provider_times_out_and_is_audited() {
        let config = RiskConfig::default();
        let audit = Arc::new(AuditLog::new(100));
        let pipeline = Pipeline::new(
            &config,
            Arc::new(StalledProvider),
            Arc::new(SimulatedSensorProvider::new(Some(1))),
            Arc::new(AlertManager::new(&config)),
        )
        .with_audit_sink(audit.clone())
        .with_evidence_timeout(Duration::from_millis(20));

        let err = pipeline.run_cycle("ZONE-002", None).await.unwrap_err();
        assert_eq!(
            err,
            CycleError::EvidenceTimeout {
                provider: "stalled_camera",
                timeout_ms: 20,
            }
        );
        let report = err.to_report();
        assert_eq!(report.error, codes::EVIDENCE_TIMEOUT);
        assert_eq!(report.field.as_deref(), Some("stalled_camera"));

        let errors = audit.recent(10, Some(AuditEventType::Error), None).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].zone_id.as_deref(), Some("ZONE-002"));
    }

    #[tokio::test]
    async fn per_call_timeout_overrides_configured_bound() {
        let config = RiskConfig::default();
        let pipeline = Pipeline::new(
            &config,
            Arc::new(StalledProvider),
            Arc::new(SimulatedSensorProvider::new(Some(3))),
            Arc::new(AlertManager::new(&config)),
        );

        let err = pipeline
            .run_cycle_at("ZONE-005", None, Utc::now(), Some(Duration::from_millis(15)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CycleError::EvidenceTimeout {
                provider: "stalled_camera",
                timeout_ms: 15,
            }
        );
    }

    #[test]
    fn oversized_timeouts_saturate_when_reported() {
        assert_eq!(whole_millis(Duration::from_millis(250)), 250);
        assert_eq!(whole_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn provider_failure_surfaces_as_cycle_error() {
        let config = RiskConfig::default();
        let pipeline = Pipeline::new(
            &config,
            Arc::new(SimulatedImageProvider::new(config.vision.clone(), Some(1))),
            Arc::new(OfflineSensors),
            Arc::new(AlertManager::new(&config)),
        );

        let err = pipeline.run_cycle("ZONE-003", None).await.unwrap_err();
        assert!(matches!(err, CycleError::Provider(_)));
        assert_eq!(err.to_report().error, codes::PROVIDER_FAILED);
    }
}
