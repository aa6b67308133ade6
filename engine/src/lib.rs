//! Track-tampering risk engine: evidence analysis, verdict fusion, alert
//! lifecycle and the single-flight run controller.

pub mod alerts;
pub mod classifier;
pub mod controller;
pub mod pipeline;
pub mod providers;
pub mod sensor;
pub mod simulation;
pub mod sinks;
pub mod temporal;
pub mod vision;

pub use alerts::AlertManager;
pub use classifier::RiskClassifier;
pub use controller::{RunController, RunOutcome, RunState, RunStatus};
pub use pipeline::{CycleError, CycleOutcome, Pipeline};
pub use providers::{
    AnomalyDetector, DetectionBatch, DetectionProvider, EvidenceRequest, ProviderError,
    ReadingBatch, ReadingProvider,
};
pub use sensor::{SensorAnalyzer, ThresholdAnomalyDetector};
pub use simulation::{Scenario, ScenarioInfo, SimulatedImageProvider, SimulatedSensorProvider};
pub use sinks::{
    AuditEntry, AuditEvent, AuditEventType, AuditLog, AuditSink, AuditStats, BroadcastPushSink,
    ChainVerification, PushEnvelope, PushKind, PushSink,
};
pub use temporal::TemporalCalculator;
pub use vision::VisionAnalyzer;
