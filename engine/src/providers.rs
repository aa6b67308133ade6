//! Evidence provider contracts.
//!
//! Producers of detections and readings live outside the engine; anything
//! that implements these traits can feed a classification cycle.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use rakshak_core::{Detection, ImageCondition, ImageSource, SensorAnomaly, SensorReading};

use crate::simulation::Scenario;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a cycle asks its providers for.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceRequest {
    pub zone_id: String,
    pub source: ImageSource,
    pub timestamp: DateTime<Utc>,
    /// Hint for synthetic providers; real providers ignore it.
    pub scenario: Option<Scenario>,
}

impl EvidenceRequest {
    pub fn new(zone_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            zone_id: zone_id.into(),
            source: ImageSource::Cctv,
            timestamp,
            scenario: None,
        }
    }

    pub fn with_scenario(mut self, scenario: Option<Scenario>) -> Self {
        self.scenario = scenario;
        self
    }

    pub fn with_source(mut self, source: ImageSource) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
    pub conditions: Vec<ImageCondition>,
    pub is_simulated: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadingBatch {
    pub readings: Vec<SensorReading>,
    pub is_simulated: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} unavailable: {message}")]
    Unavailable {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} returned malformed evidence: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

/// Supplies vision detections for one zone and image source.
pub trait DetectionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn detections<'a>(
        &'a self,
        request: &'a EvidenceRequest,
    ) -> BoxFuture<'a, Result<DetectionBatch, ProviderError>>;
}

/// Supplies the latest sensor readings for one zone.
pub trait ReadingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn readings<'a>(
        &'a self,
        request: &'a EvidenceRequest,
    ) -> BoxFuture<'a, Result<ReadingBatch, ProviderError>>;
}

/// Turns a batch of readings into anomalies.
pub trait AnomalyDetector: Send + Sync {
    fn detect(&self, readings: &[SensorReading]) -> Vec<SensorAnomaly>;
}
