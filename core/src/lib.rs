//! Shared types for the track-tampering risk engine: configuration, the
//! numeric guard layer, evidence and verdict records, and error reports.

pub mod alert;
pub mod classification;
pub mod config;
pub mod error;
pub mod safe_math;
pub mod sensor;
pub mod vision;

pub use alert::{
    Acknowledgement, Alert, AlertHistoryPage, AlertHistoryQuery, AlertStatus, AlertStatusSummary,
    EscalationLevel, Resolution, Severity,
};
pub use classification::{
    Classification, ClassificationResult, ComponentScores, FactorCategory, RiskFactor,
    TemporalContext,
};
pub use config::{ConfigError, RiskConfig, TrackZone, ZoneNotFound};
pub use error::{AlertError, ErrorReport, codes};
pub use safe_math::FallbackReason;
pub use sensor::{
    AnomalySeverity, AnomalyType, CauseLikelihoods, SensorAnalysis, SensorAnomaly, SensorReading,
    SensorType,
};
pub use vision::{
    BoundingBox, Detection, DetectionClass, ImageCondition, ImageSource, VisionAnalysis,
};
