use std::collections::BTreeSet;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rakshak_core::config::SensorConfig;
use rakshak_core::safe_math::{round_to, safe_clamp, safe_divide};
use rakshak_core::{
    AnomalySeverity, AnomalyType, CauseLikelihoods, SensorAnalysis, SensorAnomaly, SensorReading,
    SensorType,
};
use uuid::Uuid;

use crate::providers::AnomalyDetector;

pub const ALL_NORMAL_REASON: &str = "All sensor readings within normal parameters";
pub const COORDINATION_REASON: &str =
    "Multiple sensors showing coordinated anomalies - indicates potential simultaneous tampering";

const COORDINATION_SCORE_FACTOR: f64 = 1.5;
const SABOTAGE_SCORE_FACTOR: f64 = 1.2;
const ENVIRONMENTAL_SCORE_FACTOR: f64 = 0.7;

/// Flags readings outside the configured normal band for their sensor type.
#[derive(Debug, Clone)]
pub struct ThresholdAnomalyDetector {
    config: SensorConfig,
}

impl ThresholdAnomalyDetector {
    pub fn new(config: SensorConfig) -> Self {
        Self { config }
    }
}

impl AnomalyDetector for ThresholdAnomalyDetector {
    fn detect(&self, readings: &[SensorReading]) -> Vec<SensorAnomaly> {
        readings
            .iter()
            .filter_map(|reading| {
                let range = self.config.range_for(reading.sensor_type)?;
                // Tilt bands measure lean in either direction.
                let value = match reading.sensor_type {
                    SensorType::Tilt => reading.value.abs(),
                    _ => reading.value,
                };
                if range.normal.contains(value) {
                    return None;
                }

                let (anomaly_type, severity) = if range.critical.contains(value) {
                    (AnomalyType::SuddenChange, AnomalySeverity::Severe)
                } else if range.warning.contains(value) {
                    (AnomalyType::MechanicalWear, AnomalySeverity::Moderate)
                } else {
                    (AnomalyType::EnvironmentalNoise, AnomalySeverity::Minor)
                };

                let expected = range.normal.midpoint();
                let context = format!("sensor_deviation_{}", reading.sensor_id);
                let (ratio, _) = safe_divide(
                    (value - expected).abs(),
                    expected.abs().max(0.01),
                    0.0,
                    &context,
                );
                let deviation_pct = ratio * 100.0;

                Some(SensorAnomaly {
                    anomaly_id: format!("anom_{}", Uuid::now_v7().simple()),
                    sensor_id: reading.sensor_id.clone(),
                    sensor_type: reading.sensor_type,
                    anomaly_type,
                    severity,
                    value_observed: value,
                    value_expected: expected,
                    deviation_percent: round_to(deviation_pct, 2),
                    z_score: Some(safe_clamp(deviation_pct / 25.0, 0.0, 10.0)),
                    isolation_score: Some(safe_clamp(deviation_pct / 100.0, 0.0, 1.0)),
                })
            })
            .collect()
    }
}

/// Scores a zone's sensor anomalies and separates likely causes.
#[derive(Debug, Clone)]
pub struct SensorAnalyzer {
    config: SensorConfig,
}

impl SensorAnalyzer {
    pub fn new(config: SensorConfig) -> Self {
        Self { config }
    }

    pub fn analyze(
        &self,
        zone_id: &str,
        timestamp: DateTime<Utc>,
        readings: &[SensorReading],
        anomalies: Vec<SensorAnomaly>,
        is_simulated: bool,
    ) -> SensorAnalysis {
        let started = Instant::now();
        let (is_coordinated, coordination_confidence) = check_coordination(&anomalies);
        let likelihoods = cause_likelihoods(&anomalies);
        let (score, reasons) = self.score(&anomalies, is_coordinated, &likelihoods);

        tracing::debug!(
            zone_id,
            readings = readings.len(),
            anomalies = anomalies.len(),
            is_coordinated,
            sensor_risk_score = score,
            "sensor analysis complete"
        );

        SensorAnalysis {
            analysis_id: format!("sens_{}", Uuid::now_v7().simple()),
            zone_id: zone_id.to_string(),
            timestamp,
            total_sensors: readings.len(),
            operational_sensors: readings.iter().filter(|r| r.is_operational).count(),
            readings_analyzed: readings.len(),
            total_anomalies: anomalies.len(),
            anomalies,
            is_coordinated,
            coordination_confidence,
            sensor_risk_score: score,
            risk_reasons: reasons,
            environmental_likelihood: likelihoods.environmental,
            mechanical_likelihood: likelihoods.mechanical,
            sabotage_likelihood: likelihoods.sabotage,
            processing_time_ms: round_to(started.elapsed().as_secs_f64() * 1000.0, 2),
            is_simulated,
        }
    }

    fn score(
        &self,
        anomalies: &[SensorAnomaly],
        is_coordinated: bool,
        likelihoods: &CauseLikelihoods,
    ) -> (f64, Vec<String>) {
        if anomalies.is_empty() {
            return (0.0, vec![ALL_NORMAL_REASON.to_string()]);
        }

        let mut total = 0.0;
        let mut reasons = Vec::with_capacity(anomalies.len() + 2);
        for anomaly in anomalies {
            total += self.config.weight_for(anomaly.anomaly_type) * anomaly.severity.multiplier();
            reasons.push(anomaly_reason(anomaly));
        }

        if is_coordinated {
            total *= COORDINATION_SCORE_FACTOR;
            reasons.push(COORDINATION_REASON.to_string());
        }

        if likelihoods.sabotage > 0.5 {
            total *= SABOTAGE_SCORE_FACTOR;
            reasons.push(format!(
                "Sabotage likelihood: {}%",
                (likelihoods.sabotage * 100.0) as u32
            ));
        } else if likelihoods.environmental > 0.5 {
            total *= ENVIRONMENTAL_SCORE_FACTOR;
            reasons.push(format!(
                "Likely environmental cause: {}%",
                (likelihoods.environmental * 100.0) as u32
            ));
        }

        (safe_clamp(round_to(total, 2), 0.0, 100.0), reasons)
    }
}

/// Anomalies spanning two or more sensor types count as coordinated.
pub fn check_coordination(anomalies: &[SensorAnomaly]) -> (bool, Option<f64>) {
    if anomalies.len() < 2 {
        return (false, None);
    }
    let sensor_types: BTreeSet<_> = anomalies.iter().map(|a| a.sensor_type).collect();
    if sensor_types.len() < 2 {
        return (false, None);
    }

    let mut confidence = 0.5 + sensor_types.len() as f64 * 0.15;
    let severe = anomalies
        .iter()
        .filter(|a| a.severity == AnomalySeverity::Severe)
        .count();
    if severe >= 2 {
        confidence += 0.2;
    }
    (true, Some(confidence.min(1.0)))
}

pub fn cause_likelihoods(anomalies: &[SensorAnomaly]) -> CauseLikelihoods {
    if anomalies.is_empty() {
        return CauseLikelihoods::default();
    }

    let has = |kind: AnomalyType| anomalies.iter().any(|a| a.anomaly_type == kind);
    let severity_sum: u32 = anomalies.iter().map(|a| a.severity.points()).sum();

    let environmental = if has(AnomalyType::EnvironmentalNoise) { 0.6 } else { 0.0 };
    let mechanical = if has(AnomalyType::MechanicalWear) { 0.6 } else { 0.0 };
    let mut sabotage = 0.0;
    if has(AnomalyType::SuddenChange) {
        sabotage += 0.5;
    }
    if has(AnomalyType::CoordinatedAnomaly) {
        sabotage += 0.7;
    }
    if severity_sum > 4 {
        sabotage *= 1.3;
    }
    if anomalies.len() > 3 {
        sabotage *= 1.2;
    }

    let total = environmental + mechanical + sabotage + 0.01;
    let normalize = |score: f64| {
        let (ratio, _) = safe_divide(score, total, 0.0, "cause_likelihood");
        round_to(ratio, 3).min(1.0)
    };
    CauseLikelihoods {
        environmental: normalize(environmental),
        mechanical: normalize(mechanical),
        sabotage: normalize(sabotage),
    }
}

fn anomaly_reason(anomaly: &SensorAnomaly) -> String {
    let sensor = anomaly.sensor_type.display_name();
    let severity = anomaly.severity.display_name();
    match anomaly.anomaly_type {
        AnomalyType::EnvironmentalNoise => {
            format!("{sensor}: Environmental disturbance detected ({severity})")
        }
        AnomalyType::MechanicalWear => {
            format!("{sensor}: Mechanical wear pattern detected ({severity})")
        }
        AnomalyType::SuddenChange => format!(
            "{sensor}: Sudden change detected ({severity}) - Deviation: {:.1}%",
            anomaly.deviation_percent
        ),
        AnomalyType::CoordinatedAnomaly => format!(
            "{sensor}: Coordinated anomaly ({severity}) - Multiple sensors affected simultaneously"
        ),
        AnomalyType::SensorFailure => format!("{sensor}: Sensor malfunction detected"),
        AnomalyType::Normal => format!("{sensor}: Anomaly detected ({severity})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(sensor_type: SensorType, value: f64) -> SensorReading {
        SensorReading {
            sensor_id: format!("ZONE-001_{}_00", sensor_type.id_code()),
            sensor_type,
            zone_id: "ZONE-001".to_string(),
            value,
            unit: "unit".to_string(),
            timestamp: Utc::now(),
            is_operational: true,
            battery_level: Some(90.0),
        }
    }

    fn anomaly(
        sensor_type: SensorType,
        anomaly_type: AnomalyType,
        severity: AnomalySeverity,
    ) -> SensorAnomaly {
        SensorAnomaly {
            anomaly_id: "anom_test".to_string(),
            sensor_id: format!("ZONE-001_{}_00", sensor_type.id_code()),
            sensor_type,
            anomaly_type,
            severity,
            value_observed: 0.0,
            value_expected: 0.0,
            deviation_percent: 120.0,
            z_score: None,
            isolation_score: None,
        }
    }

    #[test]
    fn detector_grades_readings_by_band() {
        let detector = ThresholdAnomalyDetector::new(SensorConfig::default());
        let anomalies = detector.detect(&[
            reading(SensorType::Vibration, 20.0),
            reading(SensorType::Vibration, 65.0),
            reading(SensorType::Vibration, 90.0),
            reading(SensorType::Vibration, 140.0),
        ]);
        assert_eq!(anomalies.len(), 3);
        assert_eq!(anomalies[0].anomaly_type, AnomalyType::MechanicalWear);
        assert_eq!(anomalies[0].severity, AnomalySeverity::Moderate);
        assert_eq!(anomalies[1].anomaly_type, AnomalyType::SuddenChange);
        assert_eq!(anomalies[1].severity, AnomalySeverity::Severe);
        assert_eq!(anomalies[2].anomaly_type, AnomalyType::EnvironmentalNoise);
        assert_eq!(anomalies[2].severity, AnomalySeverity::Minor);
    }

    #[test]
    fn detector_reports_deviation_from_normal_midpoint() {
        let detector = ThresholdAnomalyDetector::new(SensorConfig::default());
        let anomalies = detector.detect(&[reading(SensorType::Pressure, 0.5)]);
        assert_eq!(anomalies.len(), 1);
        let a = &anomalies[0];
        assert_eq!(a.value_expected, 1.0);
        assert_eq!(a.deviation_percent, 50.0);
        assert_eq!(a.z_score, Some(2.0));
        assert_eq!(a.isolation_score, Some(0.5));
    }

    #[test]
    fn tilt_is_graded_by_magnitude() {
        let detector = ThresholdAnomalyDetector::new(SensorConfig::default());
        assert!(detector.detect(&[reading(SensorType::Tilt, -0.4)]).is_empty());
        let anomalies = detector.detect(&[reading(SensorType::Tilt, -6.0)]);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].severity, AnomalySeverity::Severe);
    }

    #[test]
    fn detector_skips_sensor_types_without_ranges() {
        let mut config = SensorConfig::default();
        config.ranges.remove("tilt");
        let detector = ThresholdAnomalyDetector::new(config);
        assert!(detector.detect(&[reading(SensorType::Tilt, 12.0)]).is_empty());
    }

    #[test]
    fn coordination_requires_two_sensor_types() {
        let same_type = vec![
            anomaly(SensorType::Tilt, AnomalyType::SuddenChange, AnomalySeverity::Severe),
            anomaly(SensorType::Tilt, AnomalyType::SuddenChange, AnomalySeverity::Severe),
        ];
        assert_eq!(check_coordination(&same_type), (false, None));

        let mixed = vec![
            anomaly(SensorType::Tilt, AnomalyType::SuddenChange, AnomalySeverity::Severe),
            anomaly(SensorType::Pressure, AnomalyType::SuddenChange, AnomalySeverity::Severe),
        ];
        let (coordinated, confidence) = check_coordination(&mixed);
        assert!(coordinated);
        assert!((confidence.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn likelihoods_favor_sabotage_for_severe_sudden_changes() {
        let anomalies = vec![
            anomaly(SensorType::Tilt, AnomalyType::SuddenChange, AnomalySeverity::Severe),
            anomaly(SensorType::Pressure, AnomalyType::SuddenChange, AnomalySeverity::Severe),
        ];
        let likelihoods = cause_likelihoods(&anomalies);
        assert_eq!(likelihoods.environmental, 0.0);
        assert!(likelihoods.sabotage > 0.9);
        assert!(likelihoods.sabotage <= 1.0);
        assert_eq!(cause_likelihoods(&[]), CauseLikelihoods::default());
    }

    #[test]
    fn environmental_noise_discounts_score() {
        let analyzer = SensorAnalyzer::new(SensorConfig::default());
        let anomalies = vec![anomaly(
            SensorType::Vibration,
            AnomalyType::EnvironmentalNoise,
            AnomalySeverity::Minor,
        )];
        let analysis = analyzer.analyze("ZONE-001", Utc::now(), &[], anomalies, true);
        assert_eq!(analysis.sensor_risk_score, 3.5);
        assert!(
            analysis
                .risk_reasons
                .iter()
                .any(|r| r.starts_with("Likely environmental cause"))
        );
    }

    #[test]
    fn coordinated_sabotage_is_boosted_and_capped() {
        let analyzer = SensorAnalyzer::new(SensorConfig::default());
        let anomalies = vec![
            anomaly(SensorType::Tilt, AnomalyType::SuddenChange, AnomalySeverity::Severe),
            anomaly(SensorType::Pressure, AnomalyType::SuddenChange, AnomalySeverity::Severe),
        ];
        let analysis = analyzer.analyze("ZONE-001", Utc::now(), &[], anomalies, true);
        // 2 x 35 x 1.5 = 105 -> x1.5 coordination -> x1.2 sabotage -> capped
        assert_eq!(analysis.sensor_risk_score, 100.0);
        assert!(analysis.is_coordinated);
        assert!(analysis.risk_reasons.contains(&COORDINATION_REASON.to_string()));
        assert!(analysis.analysis_id.starts_with("sens_"));
    }

    #[test]
    fn no_anomalies_reports_all_normal() {
        let analyzer = SensorAnalyzer::new(SensorConfig::default());
        let readings = vec![reading(SensorType::Vibration, 12.0)];
        let analysis = analyzer.analyze("ZONE-001", Utc::now(), &readings, Vec::new(), false);
        assert_eq!(analysis.sensor_risk_score, 0.0);
        assert_eq!(analysis.risk_reasons, vec![ALL_NORMAL_REASON.to_string()]);
        assert_eq!(analysis.operational_sensors, 1);
        assert_eq!(analysis.sabotage_likelihood, 0.0);
    }
}
