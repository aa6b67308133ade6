use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Objects and anomalies a detector can report for a track image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionClass {
    MissingFishPlate,
    ForeignObject,
    TrackDisplacement,
    HumanPresence,
    ToolDetection,
    VehicleNearTrack,
    Normal,
}

impl DetectionClass {
    pub const ALL: [DetectionClass; 7] = [
        DetectionClass::MissingFishPlate,
        DetectionClass::ForeignObject,
        DetectionClass::TrackDisplacement,
        DetectionClass::HumanPresence,
        DetectionClass::ToolDetection,
        DetectionClass::VehicleNearTrack,
        DetectionClass::Normal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetectionClass::MissingFishPlate => "missing_fish_plate",
            DetectionClass::ForeignObject => "foreign_object",
            DetectionClass::TrackDisplacement => "track_displacement",
            DetectionClass::HumanPresence => "human_presence",
            DetectionClass::ToolDetection => "tool_detection",
            DetectionClass::VehicleNearTrack => "vehicle_near_track",
            DetectionClass::Normal => "normal",
        }
    }

    /// "missing_fish_plate" -> "Missing Fish Plate"
    pub fn display_name(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Structural classes that can force a tampering verdict on their own.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            DetectionClass::MissingFishPlate | DetectionClass::TrackDisplacement
        )
    }
}

impl std::fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Cctv,
    Drone,
    Mobile,
}

impl ImageSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSource::Cctv => "cctv",
            ImageSource::Drone => "drone",
            ImageSource::Mobile => "mobile",
        }
    }
}

impl std::str::FromStr for ImageSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cctv" => Ok(ImageSource::Cctv),
            "drone" => Ok(ImageSource::Drone),
            "mobile" => Ok(ImageSource::Mobile),
            other => Err(format!(
                "unknown image source '{other}' (expected cctv, drone or mobile)"
            )),
        }
    }
}

/// Capture conditions that can degrade detection confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageCondition {
    Normal,
    LowLight,
    Blur,
    PartialOcclusion,
    Rain,
    Fog,
}

impl ImageCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageCondition::Normal => "normal",
            ImageCondition::LowLight => "low_light",
            ImageCondition::Blur => "blur",
            ImageCondition::PartialOcclusion => "partial_occlusion",
            ImageCondition::Rain => "rain",
            ImageCondition::Fog => "fog",
        }
    }

    pub fn reduces_visibility(self) -> bool {
        matches!(
            self,
            ImageCondition::LowLight
                | ImageCondition::Fog
                | ImageCondition::Blur
                | ImageCondition::PartialOcclusion
        )
    }
}

/// Normalized (0-1) image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Fraction of the image covered by the box.
    pub fn area(&self) -> f64 {
        ((self.x_max - self.x_min) * (self.y_max - self.y_min)).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub detection_id: String,
    pub class_label: DetectionClass,
    /// Confidence after condition penalties
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    /// Confidence reported before condition penalties
    pub raw_confidence: f64,
    #[serde(default)]
    pub condition_penalty_applied: bool,
}

/// Output of the vision evidence analyzer for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionAnalysis {
    pub analysis_id: String,
    pub zone_id: String,
    pub timestamp: DateTime<Utc>,
    pub image_source: ImageSource,
    pub image_conditions: Vec<ImageCondition>,
    pub detections: Vec<Detection>,
    pub total_detections: usize,
    pub vision_risk_score: f64,
    pub risk_reasons: Vec<String>,
    pub processing_time_ms: f64,
    pub is_simulated: bool,
}
