//! Risk engine configuration.
//!
//! One [`RiskConfig`] is built at start-up from defaults, an optional TOML
//! file and `RAKSHAK_*` environment overrides, validated once and then shared
//! read-only by every component.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alert::Severity;
use crate::sensor::{AnomalyType, SensorType};
use crate::vision::{DetectionClass, ImageCondition};

/// Weight used for detection classes and anomaly types missing from a table.
pub const DEFAULT_FACTOR_WEIGHT: f64 = 10.0;

pub const MIN_TEMPORAL_MULTIPLIER: f64 = 0.5;
pub const MAX_TEMPORAL_MULTIPLIER: f64 = 2.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value '{value}' for environment variable {var}")]
    Env { var: &'static str, value: String },
    #[error("invalid {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("zone '{0}' not found")]
pub struct ZoneNotFound(pub String);

/// Closed numeric interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueBand {
    pub min: f64,
    pub max: f64,
}

impl ValueBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }
}

/// Half-open hour window `[start, end)`; wraps past midnight when `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start <= self.end {
            self.start <= hour && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Detection class -> weight. Missing classes weigh [`DEFAULT_FACTOR_WEIGHT`].
    pub weights: BTreeMap<String, f64>,
    /// Detections below this confidence are ignored.
    pub confidence_threshold: f64,
    /// Image condition -> confidence multiplier.
    pub condition_penalties: BTreeMap<String, f64>,
    /// Score multiplier when any visibility-reducing condition is present.
    pub poor_visibility_factor: f64,
}

impl VisionConfig {
    pub fn weight_for(&self, class: DetectionClass) -> f64 {
        self.weights
            .get(class.as_str())
            .copied()
            .unwrap_or(DEFAULT_FACTOR_WEIGHT)
    }

    pub fn penalty_for(&self, condition: ImageCondition) -> Option<f64> {
        self.condition_penalties.get(condition.as_str()).copied()
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        let weights = [
            (DetectionClass::MissingFishPlate, 35.0),
            (DetectionClass::ForeignObject, 25.0),
            (DetectionClass::TrackDisplacement, 40.0),
            (DetectionClass::HumanPresence, 20.0),
            (DetectionClass::ToolDetection, 30.0),
            (DetectionClass::VehicleNearTrack, 15.0),
        ]
        .into_iter()
        .map(|(class, weight)| (class.as_str().to_string(), weight))
        .collect();
        let condition_penalties = [
            (ImageCondition::LowLight, 0.7),
            (ImageCondition::Blur, 0.6),
            (ImageCondition::Fog, 0.7),
            (ImageCondition::PartialOcclusion, 0.8),
        ]
        .into_iter()
        .map(|(condition, penalty)| (condition.as_str().to_string(), penalty))
        .collect();
        Self {
            weights,
            confidence_threshold: 0.6,
            condition_penalties,
            poor_visibility_factor: 0.85,
        }
    }
}

/// Statistical bands for one sensor type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorRange {
    pub normal: ValueBand,
    pub warning: ValueBand,
    pub critical: ValueBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Anomaly type -> weight. Missing types weigh [`DEFAULT_FACTOR_WEIGHT`].
    pub weights: BTreeMap<String, f64>,
    /// Sensor type -> statistical bands. Types without bands are not checked.
    pub ranges: BTreeMap<String, SensorRange>,
    /// Weight of the synthetic coordination factor.
    pub coordination_weight: f64,
    /// Coordination confidence assumed when the analyzer reports none.
    pub default_coordination_confidence: f64,
}

impl SensorConfig {
    pub fn weight_for(&self, anomaly: AnomalyType) -> f64 {
        self.weights
            .get(anomaly.as_str())
            .copied()
            .unwrap_or(DEFAULT_FACTOR_WEIGHT)
    }

    pub fn range_for(&self, sensor: SensorType) -> Option<&SensorRange> {
        self.ranges.get(sensor.as_str())
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        let weights = [
            (AnomalyType::SuddenChange, 35.0),
            (AnomalyType::CoordinatedAnomaly, 40.0),
        ]
        .into_iter()
        .map(|(anomaly, weight)| (anomaly.as_str().to_string(), weight))
        .collect();
        let ranges = [
            (
                SensorType::Vibration,
                SensorRange {
                    normal: ValueBand::new(0.0, 50.0),
                    warning: ValueBand::new(50.0, 80.0),
                    critical: ValueBand::new(80.0, 100.0),
                },
            ),
            (
                SensorType::Tilt,
                SensorRange {
                    normal: ValueBand::new(0.0, 2.0),
                    warning: ValueBand::new(2.0, 5.0),
                    critical: ValueBand::new(5.0, 15.0),
                },
            ),
            (
                SensorType::Pressure,
                SensorRange {
                    normal: ValueBand::new(0.9, 1.1),
                    warning: ValueBand::new(0.7, 0.9),
                    critical: ValueBand::new(0.0, 0.7),
                },
            ),
        ]
        .into_iter()
        .map(|(sensor, range)| (sensor.as_str().to_string(), range))
        .collect();
        Self {
            weights,
            ranges,
            coordination_weight: 40.0,
            default_coordination_confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    pub night_hours: f64,
    pub early_morning: f64,
    pub peak_hours: f64,
    pub maintenance_window: f64,
    pub night: HourWindow,
    pub early_morning_window: HourWindow,
    pub peak_windows: Vec<HourWindow>,
    /// Scheduled maintenance; none by default.
    pub maintenance_windows: Vec<HourWindow>,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            night_hours: 1.3,
            early_morning: 1.2,
            peak_hours: 0.9,
            maintenance_window: 0.5,
            night: HourWindow::new(22, 5),
            early_morning_window: HourWindow::new(5, 7),
            peak_windows: vec![HourWindow::new(7, 10), HourWindow::new(17, 20)],
            maintenance_windows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Scores below this are SAFE.
    pub safe: f64,
    /// Scores at or above this are CONFIRMED_TAMPERING.
    pub suspicious: f64,
    /// Structural detections at or above this confidence force CONFIRMED_TAMPERING.
    pub structural_override_confidence: f64,
    /// Coordinated sensor evidence at or above this sabotage likelihood forces CONFIRMED_TAMPERING.
    pub sabotage_override_likelihood: f64,
    /// Scores at or above this get the stop-all-trains action set.
    pub critical_action_score: f64,
}

impl ThresholdConfig {
    /// Thresholds floored so neither tier collapses to an empty range.
    pub fn effective(&self) -> (f64, f64) {
        let safe = if self.safe.is_nan() { 0.01 } else { self.safe.max(0.01) };
        let suspicious = if self.suspicious.is_nan() {
            safe + 0.01
        } else {
            self.suspicious.max(safe + 0.01)
        };
        (safe, suspicious)
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            safe: 25.0,
            suspicious: 60.0,
            structural_override_confidence: 0.85,
            sabotage_override_likelihood: 0.7,
            critical_action_score: 85.0,
        }
    }
}

/// Score range per alert severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityRanges {
    pub low: ValueBand,
    pub medium: ValueBand,
    pub high: ValueBand,
    pub critical: ValueBand,
}

impl SeverityRanges {
    pub fn ordered(&self) -> [(Severity, ValueBand); 4] {
        [
            (Severity::Low, self.low),
            (Severity::Medium, self.medium),
            (Severity::High, self.high),
            (Severity::Critical, self.critical),
        ]
    }

    /// Severity for a risk score.
    ///
    /// The first range containing the score wins. A score in a gap between
    /// ranges takes the tier just below it; below every range is LOW and
    /// above every range is CRITICAL.
    pub fn severity_for(&self, score: f64) -> Severity {
        let ordered = self.ordered();
        if let Some((severity, _)) = ordered.iter().find(|(_, band)| band.contains(score)) {
            return *severity;
        }
        ordered
            .iter()
            .rev()
            .find(|(_, band)| score > band.max)
            .map(|(severity, _)| *severity)
            .unwrap_or(Severity::Low)
    }
}

impl Default for SeverityRanges {
    fn default() -> Self {
        Self {
            low: ValueBand::new(25.0, 49.0),
            medium: ValueBand::new(50.0, 69.0),
            high: ValueBand::new(70.0, 84.0),
            critical: ValueBand::new(85.0, 100.0),
        }
    }
}

/// Seconds an unacknowledged alert may sit before escalating, per severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationTimeouts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl EscalationTimeouts {
    pub fn for_severity(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Low => self.low,
            Severity::Medium => self.medium,
            Severity::High => self.high,
            Severity::Critical => self.critical,
        }
    }
}

impl Default for EscalationTimeouts {
    fn default() -> Self {
        Self {
            low: 1800,
            medium: 900,
            high: 300,
            critical: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub cooldown_seconds: u64,
    pub max_alerts_per_hour: usize,
    pub escalation_timeouts: EscalationTimeouts,
    pub min_resolution_notes_chars: usize,
    /// Reasons copied from the classification onto the alert.
    pub max_reasons: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 300,
            max_alerts_per_hour: 10,
            escalation_timeouts: EscalationTimeouts::default(),
            min_resolution_notes_chars: 10,
            max_reasons: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { max_entries: 10_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on each evidence fetch.
    pub evidence_timeout_ms: u64,
    /// Capacity of the push broadcast channel.
    pub push_channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            evidence_timeout_ms: 5_000,
            push_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackZone {
    pub id: String,
    pub name: String,
    pub km_start: f64,
    pub km_end: f64,
}

impl TrackZone {
    fn new(id: &str, name: &str, km_start: f64, km_end: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            km_start,
            km_end,
        }
    }
}

fn default_zones() -> Vec<TrackZone> {
    vec![
        TrackZone::new("ZONE-001", "Mumbai Central - Dadar", 0.0, 10.0),
        TrackZone::new("ZONE-002", "Dadar - Kurla", 10.0, 18.0),
        TrackZone::new("ZONE-003", "Kurla - Thane", 18.0, 35.0),
        TrackZone::new("ZONE-004", "Thane - Kalyan", 35.0, 54.0),
        TrackZone::new("ZONE-005", "Kalyan Junction", 54.0, 56.0),
    ]
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub vision: VisionConfig,
    pub sensor: SensorConfig,
    pub temporal: TemporalConfig,
    pub thresholds: ThresholdConfig,
    pub severity: SeverityRanges,
    pub alerts: AlertConfig,
    pub audit: AuditConfig,
    pub pipeline: PipelineConfig,
    pub zones: Vec<TrackZone>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            vision: VisionConfig::default(),
            sensor: SensorConfig::default(),
            temporal: TemporalConfig::default(),
            thresholds: ThresholdConfig::default(),
            severity: SeverityRanges::default(),
            alerts: AlertConfig::default(),
            audit: AuditConfig::default(),
            pipeline: PipelineConfig::default(),
            zones: default_zones(),
        }
    }
}

impl RiskConfig {
    /// Defaults, then the optional TOML file, then `RAKSHAK_*` env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let parsed = Self::from_toml_str(&raw)?;
                tracing::info!(path = %path.display(), "loaded risk config file");
                parsed
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without validating; missing sections keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from any key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override(&lookup, "RAKSHAK_SAFE_THRESHOLD")? {
            self.thresholds.safe = v;
        }
        if let Some(v) = parse_override(&lookup, "RAKSHAK_SUSPICIOUS_THRESHOLD")? {
            self.thresholds.suspicious = v;
        }
        if let Some(v) = parse_override(&lookup, "RAKSHAK_VISION_CONFIDENCE_THRESHOLD")? {
            self.vision.confidence_threshold = v;
        }
        if let Some(v) = parse_override(&lookup, "RAKSHAK_ALERT_COOLDOWN_SECONDS")? {
            self.alerts.cooldown_seconds = v;
        }
        if let Some(v) = parse_override(&lookup, "RAKSHAK_MAX_ALERTS_PER_HOUR")? {
            self.alerts.max_alerts_per_hour = v;
        }
        if let Some(v) = parse_override(&lookup, "RAKSHAK_AUDIT_MAX_ENTRIES")? {
            self.audit.max_entries = v;
        }
        if let Some(v) = parse_override(&lookup, "RAKSHAK_EVIDENCE_TIMEOUT_MS")? {
            self.pipeline.evidence_timeout_ms = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if !(t.safe > 0.0 && t.safe < t.suspicious && t.suspicious < 100.0) {
            return Err(ConfigError::invalid(
                "thresholds",
                format!(
                    "expected 0 < safe < suspicious < 100, got safe={} suspicious={}",
                    t.safe, t.suspicious
                ),
            ));
        }
        for (field, value) in [
            ("thresholds.structural_override_confidence", t.structural_override_confidence),
            ("thresholds.sabotage_override_likelihood", t.sabotage_override_likelihood),
            ("vision.confidence_threshold", self.vision.confidence_threshold),
            ("vision.poor_visibility_factor", self.vision.poor_visibility_factor),
            (
                "sensor.default_coordination_confidence",
                self.sensor.default_coordination_confidence,
            ),
        ] {
            check_unit_interval(field, value)?;
        }
        for (condition, penalty) in &self.vision.condition_penalties {
            check_unit_interval(&format!("vision.condition_penalties.{condition}"), *penalty)?;
        }
        for (class, weight) in &self.vision.weights {
            check_non_negative(&format!("vision.weights.{class}"), *weight)?;
        }
        for (anomaly, weight) in &self.sensor.weights {
            check_non_negative(&format!("sensor.weights.{anomaly}"), *weight)?;
        }
        check_non_negative("sensor.coordination_weight", self.sensor.coordination_weight)?;

        let temporal = &self.temporal;
        for (field, value) in [
            ("temporal.night_hours", temporal.night_hours),
            ("temporal.early_morning", temporal.early_morning),
            ("temporal.peak_hours", temporal.peak_hours),
            ("temporal.maintenance_window", temporal.maintenance_window),
        ] {
            if !(MIN_TEMPORAL_MULTIPLIER..=MAX_TEMPORAL_MULTIPLIER).contains(&value) {
                return Err(ConfigError::invalid(
                    field,
                    format!(
                        "multiplier {value} outside [{MIN_TEMPORAL_MULTIPLIER}, {MAX_TEMPORAL_MULTIPLIER}]"
                    ),
                ));
            }
        }
        let windows = std::iter::once(("temporal.night", &temporal.night))
            .chain(std::iter::once((
                "temporal.early_morning_window",
                &temporal.early_morning_window,
            )))
            .chain(temporal.peak_windows.iter().map(|w| ("temporal.peak_windows", w)))
            .chain(
                temporal
                    .maintenance_windows
                    .iter()
                    .map(|w| ("temporal.maintenance_windows", w)),
            );
        for (field, window) in windows {
            if window.start > 23 || window.end > 24 {
                return Err(ConfigError::invalid(
                    field,
                    format!("hour window {}..{} outside 0..24", window.start, window.end),
                ));
            }
        }

        self.validate_severity_ranges()?;

        if self.alerts.max_alerts_per_hour == 0 {
            return Err(ConfigError::invalid(
                "alerts.max_alerts_per_hour",
                "must allow at least one alert per hour",
            ));
        }
        if self.audit.max_entries == 0 {
            return Err(ConfigError::invalid("audit.max_entries", "must be positive"));
        }
        if self.pipeline.evidence_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "pipeline.evidence_timeout_ms",
                "must be positive",
            ));
        }
        if self.pipeline.push_channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline.push_channel_capacity",
                "must be positive",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for zone in &self.zones {
            if zone.id.trim().is_empty() {
                return Err(ConfigError::invalid("zones.id", "zone id must not be empty"));
            }
            if !seen.insert(zone.id.as_str()) {
                return Err(ConfigError::invalid(
                    "zones.id",
                    format!("duplicate zone id '{}'", zone.id),
                ));
            }
            if zone.km_end < zone.km_start {
                return Err(ConfigError::invalid(
                    format!("zones.{}", zone.id),
                    "km_end must not precede km_start",
                ));
            }
        }
        Ok(())
    }

    fn validate_severity_ranges(&self) -> Result<(), ConfigError> {
        let ordered = self.severity.ordered();
        for (severity, band) in &ordered {
            if band.min.is_nan() || band.max.is_nan() || band.min > band.max {
                return Err(ConfigError::invalid(
                    format!("severity.{}", severity.as_str().to_lowercase()),
                    format!("min {} must not exceed max {}", band.min, band.max),
                ));
            }
        }
        for pair in ordered.windows(2) {
            let (lower, lower_band) = pair[0];
            let (upper, upper_band) = pair[1];
            if upper_band.min <= lower_band.max {
                return Err(ConfigError::invalid(
                    "severity",
                    format!(
                        "{lower} range ends at {} but {upper} range starts at {}; ranges must ascend without overlap",
                        lower_band.max, upper_band.min
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn zone(&self, zone_id: &str) -> Result<&TrackZone, ZoneNotFound> {
        self.zones
            .iter()
            .find(|zone| zone.id == zone_id)
            .ok_or_else(|| ZoneNotFound(zone_id.to_string()))
    }
}

fn parse_override<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value: raw }),
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("{value} outside [0, 1]"),
        ))
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("weight {value} must be a finite non-negative number"),
        ))
    }
}
