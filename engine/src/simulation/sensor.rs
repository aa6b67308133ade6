use rakshak_core::safe_math::round_to;
use rakshak_core::{SensorReading, SensorType};
use rand::Rng;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

use super::{Scenario, rng_from_seed, sample_normal};
use crate::providers::{
    BoxFuture, EvidenceRequest, ProviderError, ReadingBatch, ReadingProvider,
};

const PATTERN_APPLY_PROBABILITY: f64 = 0.7;
const FAILED_SENSOR_ONLINE_PROBABILITY: f64 = 0.7;

/// Sensors per type installed in every zone.
const ZONE_LAYOUT: [(SensorType, usize); 3] = [
    (SensorType::Vibration, 3),
    (SensorType::Tilt, 2),
    (SensorType::Pressure, 2),
];

struct Baseline {
    mean: f64,
    std_dev: f64,
    unit: &'static str,
}

fn baseline(sensor: SensorType) -> Baseline {
    match sensor {
        SensorType::Vibration => Baseline {
            mean: 15.0,
            std_dev: 5.0,
            unit: "mm/s",
        },
        SensorType::Tilt => Baseline {
            mean: 0.0,
            std_dev: 0.3,
            unit: "degrees",
        },
        SensorType::Pressure => Baseline {
            mean: 1.0,
            std_dev: 0.05,
            unit: "ratio",
        },
    }
}

#[derive(Clone, Copy)]
enum Deviation {
    /// Shift by this many standard deviations, drawn from the range.
    Sigma(f64, f64),
    Zero,
}

struct Pattern {
    sensors: &'static [SensorType],
    deviation: Deviation,
}

struct SensorProfile {
    anomaly_probability: f64,
    patterns: &'static [Pattern],
}

const NORMAL: SensorProfile = SensorProfile {
    anomaly_probability: 0.0,
    patterns: &[],
};

const ENVIRONMENTAL: SensorProfile = SensorProfile {
    anomaly_probability: 0.3,
    patterns: &[Pattern {
        sensors: &[SensorType::Vibration],
        deviation: Deviation::Sigma(1.5, 2.5),
    }],
};

const MECHANICAL: SensorProfile = SensorProfile {
    anomaly_probability: 0.5,
    patterns: &[Pattern {
        sensors: &[SensorType::Vibration, SensorType::Tilt],
        deviation: Deviation::Sigma(2.0, 3.5),
    }],
};

const SABOTAGE: SensorProfile = SensorProfile {
    anomaly_probability: 0.9,
    patterns: &[
        Pattern {
            sensors: &[SensorType::Vibration, SensorType::Tilt, SensorType::Pressure],
            deviation: Deviation::Sigma(4.0, 8.0),
        },
        Pattern {
            sensors: &[SensorType::Tilt, SensorType::Pressure],
            deviation: Deviation::Sigma(5.0, 10.0),
        },
    ],
};

const SENSOR_FAILURE: SensorProfile = SensorProfile {
    anomaly_probability: 0.8,
    patterns: &[Pattern {
        sensors: &[SensorType::Vibration],
        deviation: Deviation::Zero,
    }],
};

/// Cumulative thresholds for the random draw when no sensor scenario was requested.
const RANDOM_MIX: [(Scenario, f64); 4] = [
    (Scenario::Normal, 0.65),
    (Scenario::Environmental, 0.80),
    (Scenario::Mechanical, 0.90),
    (Scenario::Sabotage, 0.97),
];

fn profile_for(scenario: Scenario) -> Option<&'static SensorProfile> {
    match scenario {
        Scenario::Normal => Some(&NORMAL),
        Scenario::Environmental => Some(&ENVIRONMENTAL),
        Scenario::Mechanical => Some(&MECHANICAL),
        Scenario::Sabotage => Some(&SABOTAGE),
        Scenario::SensorFailure => Some(&SENSOR_FAILURE),
        Scenario::Suspicious | Scenario::Tampering | Scenario::LowVisibility => None,
    }
}

fn random_scenario(rng: &mut StdRng) -> Scenario {
    let roll: f64 = rng.gen_range(0.0..1.0);
    RANDOM_MIX
        .iter()
        .find(|(_, threshold)| roll < *threshold)
        .map(|(scenario, _)| *scenario)
        .unwrap_or(Scenario::SensorFailure)
}

/// Synthetic vibration, tilt and pressure telemetry for a zone.
pub struct SimulatedSensorProvider {
    rng: Mutex<StdRng>,
}

impl SimulatedSensorProvider {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: Mutex::new(rng_from_seed(seed)),
        }
    }

    fn generate(&self, rng: &mut StdRng, request: &EvidenceRequest) -> ReadingBatch {
        let selected = match request.scenario.filter(|s| profile_for(*s).is_some()) {
            Some(scenario) => scenario,
            None => random_scenario(rng),
        };
        let profile = profile_for(selected).unwrap_or(&NORMAL);

        let mut readings = Vec::new();
        for (sensor_type, count) in ZONE_LAYOUT {
            for index in 0..count {
                readings.push(self.reading(rng, request, profile, sensor_type, index));
            }
        }

        tracing::debug!(
            zone_id = %request.zone_id,
            scenario = %selected,
            readings = readings.len(),
            "generated synthetic sensor readings"
        );

        ReadingBatch {
            readings,
            is_simulated: true,
        }
    }

    fn reading(
        &self,
        rng: &mut StdRng,
        request: &EvidenceRequest,
        profile: &SensorProfile,
        sensor_type: SensorType,
        index: usize,
    ) -> SensorReading {
        let base = baseline(sensor_type);

        let mut deviation = None;
        if rng.gen_bool(profile.anomaly_probability) {
            for pattern in profile.patterns {
                if pattern.sensors.contains(&sensor_type)
                    && rng.gen_bool(PATTERN_APPLY_PROBABILITY)
                {
                    deviation = Some(pattern.deviation);
                    break;
                }
            }
        }

        let value = match deviation {
            Some(Deviation::Sigma(low, high)) => {
                let direction = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                base.mean + direction * base.std_dev * rng.gen_range(low..=high)
            }
            Some(Deviation::Zero) => 0.0,
            None => sample_normal(rng, base.mean, base.std_dev),
        };
        let value = if sensor_type == SensorType::Vibration {
            value.max(0.0)
        } else {
            value
        };

        let is_operational = match deviation {
            Some(Deviation::Zero) => rng.gen_bool(FAILED_SENSOR_ONLINE_PROBABILITY),
            _ => true,
        };
        let battery_level = if is_operational {
            rng.gen_range(50.0..=100.0)
        } else {
            rng.gen_range(5.0..=30.0)
        };

        SensorReading {
            sensor_id: format!("{}_{}_{index:02}", request.zone_id, sensor_type.id_code()),
            sensor_type,
            zone_id: request.zone_id.clone(),
            value: round_to(value, 3),
            unit: base.unit.to_string(),
            timestamp: request.timestamp,
            is_operational,
            battery_level: Some(round_to(battery_level, 1)),
        }
    }
}

impl ReadingProvider for SimulatedSensorProvider {
    fn name(&self) -> &'static str {
        "simulated_sensor"
    }

    fn readings<'a>(
        &'a self,
        request: &'a EvidenceRequest,
    ) -> BoxFuture<'a, Result<ReadingBatch, ProviderError>> {
        Box::pin(async move {
            let mut rng = self.rng.lock().await;
            Ok(self.generate(&mut rng, request))
        })
    }
}
