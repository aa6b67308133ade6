//! Fuses vision, sensor and temporal evidence into one explainable verdict.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rakshak_core::config::{SensorConfig, ThresholdConfig, VisionConfig};
use rakshak_core::safe_math::{round_to, safe_clamp, safe_divide, safe_risk_score};
use rakshak_core::{
    Classification, ClassificationResult, ComponentScores, FactorCategory, RiskConfig, RiskFactor,
    SensorAnalysis, TemporalContext, VisionAnalysis,
};
use uuid::Uuid;

use crate::sinks::{PushEnvelope, PushSink};

pub const MODEL_VERSION: &str = "1.0.0";

const VISION_SHARE: f64 = 0.45;
const SENSOR_SHARE: f64 = 0.45;
const TEMPORAL_FACTOR_WEIGHT: f64 = 10.0;
const TEMPORAL_FACTOR_CONFIDENCE: f64 = 0.9;
const DEFAULT_ISOLATION_SCORE: f64 = 0.5;
const TOP_FACTOR_REASONS: usize = 3;
const REASONS_PER_SOURCE: usize = 2;
const MAX_PRIMARY_REASONS: usize = 5;

pub const OVERRIDE_STRUCTURAL: &str = "structural_detection";
pub const OVERRIDE_COORDINATED_SABOTAGE: &str = "coordinated_sabotage";

const SAFE_REASONS: [&str; 2] = [
    "No significant anomalies detected",
    "All sensor readings within normal parameters",
];
const SAFE_ACTIONS: [&str; 2] = ["Continue normal monitoring", "No immediate action required"];
const SUSPICIOUS_ACTIONS: [&str; 4] = [
    "Dispatch patrol to verify zone condition",
    "Review CCTV footage for the past hour",
    "Cross-check with adjacent zone sensors",
    "Re-analyze in 5 minutes",
];
const CONFIRMED_ACTIONS: [&str; 2] = [
    "IMMEDIATE: Alert zone supervisor",
    "IMMEDIATE: Notify train control to halt approach",
];
const STOP_TRAINS_ACTION: &str = "CRITICAL: Stop all trains in zone immediately";
const EMERGENCY_ACTIONS: [&str; 2] = [
    "Dispatch emergency response team",
    "Activate backup communication channels",
];
const CAUTION_ACTIONS: [&str; 2] = [
    "Reduce train speed in zone to 20km/h",
    "Dispatch maintenance crew for inspection",
];

/// How the tier was decided.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Verdict {
    classification: Classification,
    confidence: f64,
    override_rule: Option<&'static str>,
}

pub struct RiskClassifier {
    vision: VisionConfig,
    sensor: SensorConfig,
    thresholds: ThresholdConfig,
    push: Option<Arc<dyn PushSink>>,
}

impl RiskClassifier {
    pub fn new(config: &RiskConfig) -> Self {
        Self {
            vision: config.vision.clone(),
            sensor: config.sensor.clone(),
            thresholds: config.thresholds.clone(),
            push: None,
        }
    }

    /// Every verdict is also published here, best effort.
    pub fn with_push_sink(mut self, sink: Arc<dyn PushSink>) -> Self {
        self.push = Some(sink);
        self
    }

    /// Missing evidence counts as a zero score with no factors.
    pub fn classify(
        &self,
        zone_id: &str,
        timestamp: DateTime<Utc>,
        vision: Option<&VisionAnalysis>,
        sensor: Option<&SensorAnalysis>,
        temporal: TemporalContext,
    ) -> ClassificationResult {
        let started = Instant::now();

        let vision_score = safe_clamp(vision.map_or(0.0, |v| v.vision_risk_score), 0.0, 100.0);
        let sensor_score = safe_clamp(sensor.map_or(0.0, |s| s.sensor_risk_score), 0.0, 100.0);
        let multiplier = temporal.time_risk_modifier.max(0.0);

        let base = vision_score * VISION_SHARE + sensor_score * SENSOR_SHARE;
        let (final_score, clamp_reason) =
            safe_risk_score(base * multiplier, 0.0, 100.0, "final_risk_score");
        if let Some(reason) = clamp_reason {
            tracing::info!(
                zone_id,
                base,
                multiplier,
                reason = reason.as_str(),
                "final risk score clamped"
            );
        }

        let factors = self.risk_factors(vision, sensor, &temporal);
        let verdict = self
            .check_overrides(vision, sensor)
            .unwrap_or_else(|| self.threshold_verdict(final_score));

        let primary_reasons = primary_reasons(verdict.classification, &factors, vision, sensor);
        let recommended_actions = self.recommended_actions(verdict.classification, final_score);

        let result = ClassificationResult {
            classification_id: format!("cls_{}", Uuid::now_v7().simple()),
            zone_id: zone_id.to_string(),
            timestamp,
            classification: verdict.classification,
            risk_score: round_to(final_score, 2),
            confidence: round_to(safe_clamp(verdict.confidence, 0.0, 1.0), 2),
            risk_factors: factors,
            primary_reasons,
            recommended_actions,
            component_scores: ComponentScores {
                vision_risk_score: vision_score,
                sensor_risk_score: sensor_score,
                temporal_modifier: temporal.time_risk_modifier,
            },
            temporal_context: temporal,
            vision_analysis_id: vision.map(|v| v.analysis_id.clone()),
            sensor_analysis_id: sensor.map(|s| s.analysis_id.clone()),
            override_rule: verdict.override_rule.map(str::to_string),
            processing_time_ms: round_to(started.elapsed().as_secs_f64() * 1000.0, 2),
            is_simulated: vision.is_some_and(|v| v.is_simulated)
                || sensor.is_some_and(|s| s.is_simulated),
            model_version: MODEL_VERSION.to_string(),
        };

        tracing::info!(
            zone_id,
            classification = %result.classification,
            risk_score = result.risk_score,
            confidence = result.confidence,
            override_rule = result.override_rule.as_deref(),
            "zone classified"
        );

        if let Some(push) = &self.push {
            push.publish(PushEnvelope::for_result(&result, Utc::now()));
        }

        result
    }

    fn risk_factors(
        &self,
        vision: Option<&VisionAnalysis>,
        sensor: Option<&SensorAnalysis>,
        temporal: &TemporalContext,
    ) -> Vec<RiskFactor> {
        let mut factors = Vec::new();

        if let Some(vision) = vision {
            for detection in &vision.detections {
                let weight = self.vision.weight_for(detection.class_label);
                let confidence = safe_clamp(detection.confidence, 0.0, 1.0);
                factors.push(RiskFactor {
                    factor_id: format!("v_{}", detection.detection_id),
                    category: FactorCategory::Vision,
                    name: detection.class_label.display_name(),
                    description: format!("Visual detection of {}", detection.class_label),
                    weight,
                    raw_score: confidence,
                    weighted_contribution: round_to(weight * confidence, 2),
                    evidence: vec![
                        format!("Detected with {:.1}% confidence", confidence * 100.0),
                        format!(
                            "Bounding box area: {:.1}% of image",
                            detection.bounding_box.area() * 100.0
                        ),
                    ],
                    confidence,
                });
            }
        }

        if let Some(sensor) = sensor {
            for anomaly in &sensor.anomalies {
                let weight = self.sensor.weight_for(anomaly.anomaly_type);
                let isolation = safe_clamp(
                    anomaly.isolation_score.unwrap_or(DEFAULT_ISOLATION_SCORE),
                    0.0,
                    1.0,
                );
                factors.push(RiskFactor {
                    factor_id: format!("s_{}", anomaly.anomaly_id),
                    category: FactorCategory::Sensor,
                    name: format!(
                        "{} {}",
                        anomaly.sensor_type.display_name(),
                        anomaly.anomaly_type.label()
                    ),
                    description: format!("Sensor anomaly from {}", anomaly.sensor_id),
                    weight,
                    raw_score: isolation,
                    weighted_contribution: round_to(weight * anomaly.severity.multiplier(), 2),
                    evidence: vec![
                        format!(
                            "Observed: {:.2}, Expected: {:.2}",
                            anomaly.value_observed, anomaly.value_expected
                        ),
                        format!("Deviation: {:.1}%", anomaly.deviation_percent),
                        format!("Severity: {}", anomaly.severity.as_str()),
                    ],
                    confidence: isolation,
                });
            }

            if sensor.is_coordinated {
                let confidence = safe_clamp(
                    sensor
                        .coordination_confidence
                        .unwrap_or(self.sensor.default_coordination_confidence),
                    0.0,
                    1.0,
                );
                factors.push(RiskFactor {
                    factor_id: "s_coordination".to_string(),
                    category: FactorCategory::Sensor,
                    name: "Sensor Coordination".to_string(),
                    description: "Multiple sensors showing coordinated anomalies".to_string(),
                    weight: self.sensor.coordination_weight,
                    raw_score: confidence,
                    weighted_contribution: round_to(
                        self.sensor.coordination_weight * confidence,
                        2,
                    ),
                    evidence: vec![
                        format!("Coordination confidence: {:.1}%", confidence * 100.0),
                        "Multiple sensor types affected simultaneously".to_string(),
                    ],
                    confidence,
                });
            }
        }

        // Risk-reducing windows lower the score but are not surfaced as factors.
        if temporal.time_risk_modifier > 1.0 {
            let raw = temporal.time_risk_modifier - 1.0;
            factors.push(RiskFactor {
                factor_id: "t_temporal".to_string(),
                category: FactorCategory::Temporal,
                name: "Time of Day Risk".to_string(),
                description: "Temporal risk modifier based on time".to_string(),
                weight: TEMPORAL_FACTOR_WEIGHT,
                raw_score: round_to(raw, 2),
                weighted_contribution: round_to(TEMPORAL_FACTOR_WEIGHT * raw, 2),
                evidence: temporal.temporal_notes.clone(),
                confidence: TEMPORAL_FACTOR_CONFIDENCE,
            });
        }

        factors
    }

    fn check_overrides(
        &self,
        vision: Option<&VisionAnalysis>,
        sensor: Option<&SensorAnalysis>,
    ) -> Option<Verdict> {
        let structural = vision.and_then(|v| {
            v.detections.iter().find(|d| {
                d.class_label.is_structural()
                    && d.confidence >= self.thresholds.structural_override_confidence
            })
        });
        if let Some(detection) = structural {
            tracing::info!(
                detection_id = %detection.detection_id,
                class = detection.class_label.as_str(),
                confidence = detection.confidence,
                "structural override fired"
            );
            return Some(Verdict {
                classification: Classification::ConfirmedTampering,
                confidence: detection.confidence,
                override_rule: Some(OVERRIDE_STRUCTURAL),
            });
        }

        if let Some(sensor) = sensor
            && sensor.is_coordinated
            && sensor.sabotage_likelihood >= self.thresholds.sabotage_override_likelihood
        {
            tracing::info!(
                sensor_analysis_id = %sensor.analysis_id,
                sabotage_likelihood = sensor.sabotage_likelihood,
                "coordinated sabotage override fired"
            );
            return Some(Verdict {
                classification: Classification::ConfirmedTampering,
                confidence: sensor.sabotage_likelihood,
                override_rule: Some(OVERRIDE_COORDINATED_SABOTAGE),
            });
        }

        None
    }

    fn threshold_verdict(&self, score: f64) -> Verdict {
        let (t_safe, t_susp) = self.thresholds.effective();

        let (classification, confidence) = if score < t_safe {
            let (ratio, _) = safe_divide(score, t_safe, 0.0, "safe_confidence");
            (Classification::Safe, (1.0 - ratio).max(0.0))
        } else if score < t_susp {
            let (ratio, _) = safe_divide(score - t_safe, t_susp - t_safe, 0.0, "suspicious_confidence");
            (Classification::Suspicious, 0.5 + ratio * 0.3)
        } else {
            let (ratio, _) = safe_divide(score - t_susp, 100.0 - t_susp, 1.0, "confirmed_confidence");
            (Classification::ConfirmedTampering, (0.7 + ratio * 0.3).min(1.0))
        };

        Verdict {
            classification,
            confidence,
            override_rule: None,
        }
    }

    fn recommended_actions(&self, classification: Classification, score: f64) -> Vec<String> {
        let actions: Vec<&str> = match classification {
            Classification::Safe => SAFE_ACTIONS.to_vec(),
            Classification::Suspicious => SUSPICIOUS_ACTIONS.to_vec(),
            Classification::ConfirmedTampering => {
                if score >= self.thresholds.critical_action_score {
                    std::iter::once(STOP_TRAINS_ACTION)
                        .chain(CONFIRMED_ACTIONS)
                        .chain(EMERGENCY_ACTIONS)
                        .collect()
                } else {
                    CONFIRMED_ACTIONS.into_iter().chain(CAUTION_ACTIONS).collect()
                }
            }
        };
        actions.into_iter().map(str::to_string).collect()
    }
}

fn primary_reasons(
    classification: Classification,
    factors: &[RiskFactor],
    vision: Option<&VisionAnalysis>,
    sensor: Option<&SensorAnalysis>,
) -> Vec<String> {
    if classification.is_safe() {
        return SAFE_REASONS.iter().map(|r| r.to_string()).collect();
    }

    let mut ranked: Vec<&RiskFactor> = factors
        .iter()
        .filter(|f| f.weighted_contribution > 0.0)
        .collect();
    // Stable: equal contributions keep insertion order.
    ranked.sort_by(|a, b| b.weighted_contribution.total_cmp(&a.weighted_contribution));

    let mut reasons: Vec<String> = ranked
        .into_iter()
        .take(TOP_FACTOR_REASONS)
        .map(|f| format!("{}: contributed {:.1} risk points", f.name, f.weighted_contribution))
        .collect();

    let upstream = [
        vision.map(|v| v.risk_reasons.as_slice()).unwrap_or_default(),
        sensor.map(|s| s.risk_reasons.as_slice()).unwrap_or_default(),
    ];
    for source in upstream {
        let mut taken = 0;
        for reason in source {
            if taken == REASONS_PER_SOURCE {
                break;
            }
            if !reasons.contains(reason) {
                reasons.push(reason.clone());
                taken += 1;
            }
        }
    }

    reasons.truncate(MAX_PRIMARY_REASONS);
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::{BroadcastPushSink, PushKind};
    use crate::temporal::TemporalCalculator;
    use chrono::TimeZone;
    use rakshak_core::config::TemporalConfig;
    use rakshak_core::{
        AnomalySeverity, AnomalyType, BoundingBox, Detection, DetectionClass, ImageSource,
        SensorAnomaly, SensorType,
    };

    fn classifier() -> RiskClassifier {
        RiskClassifier::new(&RiskConfig::default())
    }

    fn temporal_at(hour: u32) -> TemporalContext {
        TemporalCalculator::new(TemporalConfig::default())
            .compute(Utc.with_ymd_and_hms(2026, 3, 10, hour, 15, 0).unwrap())
    }

    fn neutral() -> TemporalContext {
        temporal_at(12)
    }

    fn with_modifier(modifier: f64) -> TemporalContext {
        let mut ctx = neutral();
        ctx.time_risk_modifier = modifier;
        ctx
    }

    fn vision(score: f64, detections: Vec<Detection>) -> VisionAnalysis {
        VisionAnalysis {
            analysis_id: "vis_test".to_string(),
            zone_id: "Z1".to_string(),
            timestamp: Utc::now(),
            image_source: ImageSource::Cctv,
            image_conditions: Vec::new(),
            total_detections: detections.len(),
            detections,
            vision_risk_score: score,
            risk_reasons: vec![
                "Unauthorized person detected (80% confidence) - human presence in restricted track zone".to_string(),
                "Tools detected near track (70% confidence) - equipment that could be used for tampering".to_string(),
                "Third vision reason".to_string(),
            ],
            processing_time_ms: 1.0,
            is_simulated: true,
        }
    }

    fn sensor(score: f64) -> SensorAnalysis {
        SensorAnalysis {
            analysis_id: "sens_test".to_string(),
            zone_id: "Z1".to_string(),
            timestamp: Utc::now(),
            total_sensors: 7,
            operational_sensors: 7,
            readings_analyzed: 7,
            anomalies: Vec::new(),
            total_anomalies: 0,
            is_coordinated: false,
            coordination_confidence: None,
            sensor_risk_score: score,
            risk_reasons: vec!["Sensor reason".to_string()],
            environmental_likelihood: 0.0,
            mechanical_likelihood: 0.0,
            sabotage_likelihood: 0.0,
            processing_time_ms: 1.0,
            is_simulated: true,
        }
    }

    fn detection(class: DetectionClass, confidence: f64) -> Detection {
        Detection {
            detection_id: format!("det_{}", class.as_str()),
            class_label: class,
            confidence,
            bounding_box: BoundingBox {
                x_min: 0.2,
                y_min: 0.5,
                x_max: 0.3,
                y_max: 0.6,
            },
            raw_confidence: confidence,
            condition_penalty_applied: false,
        }
    }

    fn anomaly(sensor_type: SensorType, severity: AnomalySeverity) -> SensorAnomaly {
        SensorAnomaly {
            anomaly_id: format!("anom_{}", sensor_type.as_str()),
            sensor_id: format!("Z1_{}_00", sensor_type.id_code()),
            sensor_type,
            anomaly_type: AnomalyType::SuddenChange,
            severity,
            value_observed: 92.4,
            value_expected: 25.0,
            deviation_percent: 269.6,
            z_score: Some(10.0),
            isolation_score: Some(1.0),
        }
    }

    #[test]
    fn night_fusion_of_strong_evidence_is_confirmed() {
        let ctx = temporal_at(23);
        assert_eq!(ctx.time_risk_modifier, 1.3);

        let result = classifier().classify(
            "Z1",
            Utc::now(),
            Some(&vision(80.0, Vec::new())),
            Some(&sensor(70.0)),
            ctx,
        );

        assert_eq!(result.risk_score, 87.75);
        assert_eq!(result.classification, Classification::ConfirmedTampering);
        assert_eq!(result.confidence, 0.91);
        assert_eq!(result.override_rule, None);
        assert_eq!(result.recommended_actions[0], STOP_TRAINS_ACTION);
        assert_eq!(result.recommended_actions.len(), 5);
        assert_eq!(result.vision_analysis_id.as_deref(), Some("vis_test"));

        let temporal = result
            .risk_factors
            .iter()
            .find(|f| f.factor_id == "t_temporal")
            .unwrap();
        assert_eq!(temporal.weighted_contribution, 3.0);
        assert_eq!(temporal.evidence, vec![crate::temporal::NIGHT_NOTE.to_string()]);
    }

    #[tokio::test]
    async fn confirmed_verdict_raises_a_single_critical_alert() {
        let config = RiskConfig::default();
        let alerts = crate::alerts::AlertManager::new(&config);
        let classify = || {
            RiskClassifier::new(&config).classify(
                "Z1",
                Utc::now(),
                Some(&vision(80.0, Vec::new())),
                Some(&sensor(70.0)),
                temporal_at(23),
            )
        };

        let alert = alerts
            .create_from_classification(&classify())
            .await
            .unwrap();
        assert_eq!(alert.severity, rakshak_core::Severity::Critical);
        assert_eq!(alert.risk_score, 87.75);

        // Same zone inside the cooldown window.
        assert!(alerts.create_from_classification(&classify()).await.is_none());
        let summary = alerts.status_summary().await;
        assert_eq!(summary.total_active, 1);
        assert_eq!(summary.by_severity["CRITICAL"], 1);
    }

    #[test]
    fn scores_stay_bounded_for_wild_inputs() {
        for (v, s, m) in [
            (-50.0, -10.0, 1.0),
            (500.0, 900.0, 2.0),
            (f64::NAN, 40.0, 1.3),
            (100.0, 100.0, -3.0),
        ] {
            let result = classifier().classify(
                "Z1",
                Utc::now(),
                Some(&vision(v, Vec::new())),
                Some(&sensor(s)),
                with_modifier(m),
            );
            assert!((0.0..=100.0).contains(&result.risk_score), "{v} {s} {m}");
            assert!((0.0..=1.0).contains(&result.confidence), "{v} {s} {m}");
        }
    }

    #[test]
    fn classification_never_drops_as_score_rises() {
        let mut previous = Classification::Safe;
        for step in 0..=100 {
            let score = step as f64;
            let result = classifier().classify(
                "Z1",
                Utc::now(),
                Some(&vision(score, Vec::new())),
                Some(&sensor(score)),
                neutral(),
            );
            assert!(result.classification >= previous, "dropped at {score}");
            previous = result.classification;
        }
        assert_eq!(previous, Classification::ConfirmedTampering);
    }

    #[test]
    fn structural_detection_overrides_zero_scores() {
        let result = classifier().classify(
            "Z1",
            Utc::now(),
            Some(&vision(
                0.0,
                vec![detection(DetectionClass::MissingFishPlate, 0.9)],
            )),
            Some(&sensor(0.0)),
            neutral(),
        );
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.classification, Classification::ConfirmedTampering);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.override_rule.as_deref(), Some(OVERRIDE_STRUCTURAL));
    }

    #[test]
    fn structural_override_wins_over_sabotage_override() {
        let mut coordinated = sensor(10.0);
        coordinated.is_coordinated = true;
        coordinated.sabotage_likelihood = 0.75;

        let result = classifier().classify(
            "Z1",
            Utc::now(),
            Some(&vision(
                10.0,
                vec![detection(DetectionClass::TrackDisplacement, 0.88)],
            )),
            Some(&coordinated),
            neutral(),
        );
        assert_eq!(result.override_rule.as_deref(), Some(OVERRIDE_STRUCTURAL));
        assert_eq!(result.confidence, 0.88);

        let sabotage_only = classifier().classify(
            "Z1",
            Utc::now(),
            None,
            Some(&coordinated),
            neutral(),
        );
        assert_eq!(
            sabotage_only.override_rule.as_deref(),
            Some(OVERRIDE_COORDINATED_SABOTAGE)
        );
        assert_eq!(sabotage_only.confidence, 0.75);
    }

    #[test]
    fn weak_structural_or_uncoordinated_sabotage_do_not_override() {
        let mut uncoordinated = sensor(0.0);
        uncoordinated.sabotage_likelihood = 0.95;

        let result = classifier().classify(
            "Z1",
            Utc::now(),
            Some(&vision(
                0.0,
                vec![detection(DetectionClass::MissingFishPlate, 0.84)],
            )),
            Some(&uncoordinated),
            neutral(),
        );
        assert_eq!(result.classification, Classification::Safe);
        assert_eq!(result.override_rule, None);
        assert_eq!(result.primary_reasons, SAFE_REASONS.map(str::to_string).to_vec());
        assert_eq!(result.recommended_actions, SAFE_ACTIONS.map(str::to_string).to_vec());
    }

    #[test]
    fn missing_evidence_scores_zero_and_is_safe() {
        let result = classifier().classify("Z1", Utc::now(), None, None, neutral());
        assert_eq!(result.classification, Classification::Safe);
        assert_eq!(result.confidence, 1.0);
        assert!(result.risk_factors.is_empty());
        assert!(!result.is_simulated);
    }

    #[test]
    fn risk_reducing_window_lowers_score_without_a_factor() {
        let result = classifier().classify(
            "Z1",
            Utc::now(),
            Some(&vision(60.0, Vec::new())),
            Some(&sensor(60.0)),
            temporal_at(8),
        );
        assert_eq!(result.component_scores.temporal_modifier, 0.9);
        assert_eq!(result.risk_score, 48.6);
        assert!(
            result
                .risk_factors
                .iter()
                .all(|f| f.category != FactorCategory::Temporal)
        );
    }

    #[test]
    fn suspicious_reasons_rank_factors_then_add_upstream_reasons() {
        let mut coordinated = sensor(40.0);
        coordinated.anomalies = vec![
            anomaly(SensorType::Vibration, AnomalySeverity::Severe),
            anomaly(SensorType::Tilt, AnomalySeverity::Minor),
        ];
        coordinated.is_coordinated = true;
        coordinated.coordination_confidence = Some(0.8);

        let result = classifier().classify(
            "Z1",
            Utc::now(),
            Some(&vision(
                40.0,
                vec![detection(DetectionClass::HumanPresence, 0.8)],
            )),
            Some(&coordinated),
            neutral(),
        );

        assert_eq!(result.classification, Classification::Suspicious);
        assert_eq!(result.confidence, 0.59);
        assert_eq!(result.recommended_actions.len(), 4);
        assert_eq!(
            result.primary_reasons,
            vec![
                "Vibration sudden change: contributed 52.5 risk points".to_string(),
                "Sensor Coordination: contributed 32.0 risk points".to_string(),
                "Tilt sudden change: contributed 17.5 risk points".to_string(),
                "Unauthorized person detected (80% confidence) - human presence in restricted track zone".to_string(),
                "Tools detected near track (70% confidence) - equipment that could be used for tampering".to_string(),
            ]
        );

        let human = &result.risk_factors[0];
        assert_eq!(human.factor_id, "v_det_human_presence");
        assert_eq!(human.weighted_contribution, 16.0);
        assert_eq!(human.evidence[0], "Detected with 80.0% confidence");
    }

    #[test]
    fn confirmed_below_critical_score_slows_trains() {
        let result = classifier().classify(
            "Z1",
            Utc::now(),
            Some(&vision(70.0, Vec::new())),
            Some(&sensor(70.0)),
            neutral(),
        );
        assert_eq!(result.risk_score, 63.0);
        assert_eq!(result.classification, Classification::ConfirmedTampering);
        assert_eq!(
            result.recommended_actions,
            CONFIRMED_ACTIONS
                .into_iter()
                .chain(CAUTION_ACTIONS)
                .map(str::to_string)
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn every_verdict_is_pushed() {
        let sink = Arc::new(BroadcastPushSink::new(4));
        let mut rx = sink.subscribe();
        let classifier = classifier().with_push_sink(sink.clone());

        classifier.classify("Z1", Utc::now(), None, None, neutral());
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.kind, PushKind::AnalysisUpdate);
        assert_eq!(envelope.payload.zone_id, "Z1");
    }
}
