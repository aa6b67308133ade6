use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Vibration,
    Tilt,
    Pressure,
}

impl SensorType {
    pub const ALL: [SensorType; 3] = [SensorType::Vibration, SensorType::Tilt, SensorType::Pressure];

    pub fn as_str(self) -> &'static str {
        match self {
            SensorType::Vibration => "vibration",
            SensorType::Tilt => "tilt",
            SensorType::Pressure => "pressure",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SensorType::Vibration => "Vibration",
            SensorType::Tilt => "Tilt",
            SensorType::Pressure => "Pressure",
        }
    }

    /// Short code used in sensor ids (`ZONE-001_VIB_00`).
    pub fn id_code(self) -> &'static str {
        match self {
            SensorType::Vibration => "VIB",
            SensorType::Tilt => "TILT",
            SensorType::Pressure => "PRES",
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a sensor anomaly most likely represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    EnvironmentalNoise,
    MechanicalWear,
    SuddenChange,
    CoordinatedAnomaly,
    SensorFailure,
    Normal,
}

impl AnomalyType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalyType::EnvironmentalNoise => "environmental_noise",
            AnomalyType::MechanicalWear => "mechanical_wear",
            AnomalyType::SuddenChange => "sudden_change",
            AnomalyType::CoordinatedAnomaly => "coordinated_anomaly",
            AnomalyType::SensorFailure => "sensor_failure",
            AnomalyType::Normal => "normal",
        }
    }

    /// "sudden_change" -> "sudden change"
    pub fn label(self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    None,
    Minor,
    Moderate,
    Severe,
}

impl AnomalySeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AnomalySeverity::None => "none",
            AnomalySeverity::Minor => "minor",
            AnomalySeverity::Moderate => "moderate",
            AnomalySeverity::Severe => "severe",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AnomalySeverity::None => "None",
            AnomalySeverity::Minor => "Minor",
            AnomalySeverity::Moderate => "Moderate",
            AnomalySeverity::Severe => "Severe",
        }
    }

    /// Scales an anomaly's configured weight into its risk contribution.
    pub fn multiplier(self) -> f64 {
        match self {
            AnomalySeverity::Minor => 0.5,
            AnomalySeverity::Moderate => 1.0,
            AnomalySeverity::Severe => 1.5,
            AnomalySeverity::None => 1.0,
        }
    }

    /// Points used when summing severity across a batch of anomalies.
    pub fn points(self) -> u32 {
        match self {
            AnomalySeverity::None => 0,
            AnomalySeverity::Minor => 1,
            AnomalySeverity::Moderate => 2,
            AnomalySeverity::Severe => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub zone_id: String,
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_operational")]
    pub is_operational: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
}

fn default_operational() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAnomaly {
    pub anomaly_id: String,
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub anomaly_type: AnomalyType,
    pub severity: AnomalySeverity,
    pub value_observed: f64,
    pub value_expected: f64,
    pub deviation_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    /// 0 = normal, 1 = isolated outlier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isolation_score: Option<f64>,
}

/// Relative likelihood of each root cause behind a batch of anomalies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CauseLikelihoods {
    pub environmental: f64,
    pub mechanical: f64,
    pub sabotage: f64,
}

/// Output of the sensor evidence analyzer for one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorAnalysis {
    pub analysis_id: String,
    pub zone_id: String,
    pub timestamp: DateTime<Utc>,
    pub total_sensors: usize,
    pub operational_sensors: usize,
    pub readings_analyzed: usize,
    pub anomalies: Vec<SensorAnomaly>,
    pub total_anomalies: usize,
    pub is_coordinated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordination_confidence: Option<f64>,
    pub sensor_risk_score: f64,
    pub risk_reasons: Vec<String>,
    pub environmental_likelihood: f64,
    pub mechanical_likelihood: f64,
    pub sabotage_likelihood: f64,
    pub processing_time_ms: f64,
    pub is_simulated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_multipliers_match_contribution_table() {
        assert_eq!(AnomalySeverity::Minor.multiplier(), 0.5);
        assert_eq!(AnomalySeverity::Moderate.multiplier(), 1.0);
        assert_eq!(AnomalySeverity::Severe.multiplier(), 1.5);
        assert_eq!(AnomalySeverity::Severe.points(), 3);
    }

    #[test]
    fn reading_defaults_to_operational_when_flag_missing() {
        let reading: SensorReading = serde_json::from_value(serde_json::json!({
            "sensor_id": "ZONE-001_VIB_00",
            "sensor_type": "vibration",
            "zone_id": "ZONE-001",
            "value": 14.2,
            "unit": "mm/s",
            "timestamp": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(reading.is_operational);
        assert!(reading.battery_level.is_none());
    }

    #[test]
    fn anomaly_labels_are_human_readable() {
        assert_eq!(AnomalyType::SuddenChange.label(), "sudden change");
        assert_eq!(SensorType::Pressure.id_code(), "PRES");
    }
}
