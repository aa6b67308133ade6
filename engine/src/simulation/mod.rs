//! Seedable synthetic evidence providers for demos and tests.

mod image;
mod sensor;

pub use image::SimulatedImageProvider;
pub use sensor::SimulatedSensorProvider;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Named evidence profile a synthetic provider can reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Normal,
    Suspicious,
    Tampering,
    Environmental,
    LowVisibility,
    Mechanical,
    Sabotage,
    SensorFailure,
}

impl Scenario {
    pub const ALL: [Scenario; 8] = [
        Scenario::Normal,
        Scenario::Suspicious,
        Scenario::Tampering,
        Scenario::Environmental,
        Scenario::LowVisibility,
        Scenario::Mechanical,
        Scenario::Sabotage,
        Scenario::SensorFailure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Suspicious => "suspicious",
            Scenario::Tampering => "tampering",
            Scenario::Environmental => "environmental",
            Scenario::LowVisibility => "low_visibility",
            Scenario::Mechanical => "mechanical",
            Scenario::Sabotage => "sabotage",
            Scenario::SensorFailure => "sensor_failure",
        }
    }

    pub fn info(self) -> ScenarioInfo {
        let (name, description, expected) = match self {
            Scenario::Normal => (
                "Normal Operations",
                "Normal track conditions, no anomalies detected",
                "SAFE",
            ),
            Scenario::Suspicious => (
                "Suspicious Activity",
                "Person and unidentified object near the track that warrant investigation",
                "SUSPICIOUS",
            ),
            Scenario::Tampering => (
                "Confirmed Tampering",
                "Strong visual evidence of intentional track tampering",
                "CONFIRMED_TAMPERING",
            ),
            Scenario::Environmental => (
                "Environmental Event",
                "Weather or wildlife causing minor anomalies",
                "SAFE or SUSPICIOUS",
            ),
            Scenario::LowVisibility => (
                "Low Visibility",
                "Fog or blur degrading detection confidence",
                "SAFE",
            ),
            Scenario::Mechanical => (
                "Mechanical Wear",
                "Vibration and tilt drift consistent with component wear",
                "SAFE or SUSPICIOUS",
            ),
            Scenario::Sabotage => (
                "Sensor Sabotage",
                "Sudden simultaneous deviations across sensor types",
                "SUSPICIOUS or CONFIRMED_TAMPERING",
            ),
            Scenario::SensorFailure => (
                "Sensor Failure",
                "Vibration sensors reporting zero or dropping offline",
                "SAFE or SUSPICIOUS",
            ),
        };
        ScenarioInfo {
            id: self,
            name,
            description,
            expected_classification: expected,
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.as_str() == normalized)
            .ok_or_else(|| {
                let known: Vec<&str> = Scenario::ALL.iter().map(|s| s.as_str()).collect();
                format!(
                    "unknown scenario '{value}' (expected one of: {})",
                    known.join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioInfo {
    pub id: Scenario,
    pub name: &'static str,
    pub description: &'static str,
    pub expected_classification: &'static str,
}

pub fn scenarios() -> Vec<ScenarioInfo> {
    Scenario::ALL.into_iter().map(Scenario::info).collect()
}

pub(crate) fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Box-Muller normal sample.
pub(crate) fn sample_normal(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + z * std_dev
}

/// Pick from `(item, weight)` pairs whose weights sum to 1.
pub(crate) fn weighted_pick<T: Copy>(rng: &mut StdRng, table: &[(T, f64)]) -> Option<T> {
    let roll: f64 = rng.gen_range(0.0..1.0);
    let mut cumulative = 0.0;
    for (item, weight) in table {
        cumulative += weight;
        if roll < cumulative {
            return Some(*item);
        }
    }
    table.last().map(|(item, _)| *item)
}
