use std::time::Instant;

use chrono::{DateTime, Utc};
use rakshak_core::config::VisionConfig;
use rakshak_core::safe_math::{round_to, safe_clamp};
use rakshak_core::{Detection, DetectionClass, ImageCondition, ImageSource, VisionAnalysis};
use uuid::Uuid;

pub const NO_ANOMALIES_REASON: &str = "No anomalies detected in image";
pub const POOR_VISIBILITY_REASON: &str = "Image quality reduced detection confidence";

/// Turns raw detections for one image into a bounded vision risk score.
#[derive(Debug, Clone)]
pub struct VisionAnalyzer {
    config: VisionConfig,
}

impl VisionAnalyzer {
    pub fn new(config: VisionConfig) -> Self {
        Self { config }
    }

    pub fn analyze(
        &self,
        zone_id: &str,
        source: ImageSource,
        timestamp: DateTime<Utc>,
        detections: Vec<Detection>,
        conditions: Vec<ImageCondition>,
        is_simulated: bool,
    ) -> VisionAnalysis {
        let started = Instant::now();
        let received = detections.len();

        let kept: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.confidence >= self.config.confidence_threshold)
            .collect();
        let (score, reasons) = self.score(&kept, &conditions);

        tracing::debug!(
            zone_id,
            received,
            kept = kept.len(),
            vision_risk_score = score,
            "vision analysis complete"
        );

        VisionAnalysis {
            analysis_id: format!("vis_{}", Uuid::now_v7().simple()),
            zone_id: zone_id.to_string(),
            timestamp,
            image_source: source,
            image_conditions: conditions,
            total_detections: kept.len(),
            detections: kept,
            vision_risk_score: score,
            risk_reasons: reasons,
            processing_time_ms: round_to(started.elapsed().as_secs_f64() * 1000.0, 2),
            is_simulated,
        }
    }

    fn score(&self, detections: &[Detection], conditions: &[ImageCondition]) -> (f64, Vec<String>) {
        if detections.is_empty() {
            return (0.0, vec![NO_ANOMALIES_REASON.to_string()]);
        }

        let mut total = 0.0;
        let mut reasons = Vec::with_capacity(detections.len() + 1);
        for detection in detections {
            let confidence = safe_clamp(detection.confidence, 0.0, 1.0);
            total += self.config.weight_for(detection.class_label) * confidence;
            reasons.push(detection_reason(detection.class_label, confidence));
        }

        if conditions.iter().any(|c| c.reduces_visibility()) {
            total *= self.config.poor_visibility_factor;
            reasons.push(POOR_VISIBILITY_REASON.to_string());
        }

        (round_to(safe_clamp(total, 0.0, 100.0), 2), reasons)
    }
}

fn detection_reason(class: DetectionClass, confidence: f64) -> String {
    let pct = (confidence * 100.0) as u32;
    match class {
        DetectionClass::MissingFishPlate => format!(
            "Missing fish plate detected ({pct}% confidence) - critical structural component that joins rail sections"
        ),
        DetectionClass::ForeignObject => format!(
            "Foreign object on track ({pct}% confidence) - could be debris or deliberate obstruction"
        ),
        DetectionClass::TrackDisplacement => format!(
            "Track displacement detected ({pct}% confidence) - rail appears misaligned from normal position"
        ),
        DetectionClass::HumanPresence => format!(
            "Unauthorized person detected ({pct}% confidence) - human presence in restricted track zone"
        ),
        DetectionClass::ToolDetection => format!(
            "Tools detected near track ({pct}% confidence) - equipment that could be used for tampering"
        ),
        DetectionClass::VehicleNearTrack => format!(
            "Vehicle near track ({pct}% confidence) - unauthorized vehicle access to track area"
        ),
        DetectionClass::Normal => "Normal track conditions observed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rakshak_core::BoundingBox;

    fn detection(class: DetectionClass, confidence: f64) -> Detection {
        Detection {
            detection_id: format!("det_{}", class.as_str()),
            class_label: class,
            confidence,
            bounding_box: BoundingBox {
                x_min: 0.1,
                y_min: 0.1,
                x_max: 0.3,
                y_max: 0.4,
            },
            raw_confidence: confidence,
            condition_penalty_applied: false,
        }
    }

    fn analyzer() -> VisionAnalyzer {
        VisionAnalyzer::new(VisionConfig::default())
    }

    #[test]
    fn empty_detections_score_zero_with_reason() {
        let analysis = analyzer().analyze(
            "ZONE-001",
            ImageSource::Cctv,
            Utc::now(),
            Vec::new(),
            vec![ImageCondition::Normal],
            true,
        );
        assert_eq!(analysis.vision_risk_score, 0.0);
        assert_eq!(analysis.risk_reasons, vec![NO_ANOMALIES_REASON.to_string()]);
        assert!(analysis.analysis_id.starts_with("vis_"));
    }

    #[test]
    fn low_confidence_detections_are_dropped() {
        let analysis = analyzer().analyze(
            "ZONE-001",
            ImageSource::Drone,
            Utc::now(),
            vec![
                detection(DetectionClass::ForeignObject, 0.55),
                detection(DetectionClass::HumanPresence, 0.8),
            ],
            Vec::new(),
            true,
        );
        assert_eq!(analysis.total_detections, 1);
        assert_eq!(analysis.detections[0].class_label, DetectionClass::HumanPresence);
        assert_eq!(analysis.vision_risk_score, 16.0);
        assert!(analysis.risk_reasons[0].contains("80% confidence"));
    }

    #[test]
    fn poor_visibility_discounts_score() {
        let clear = analyzer().analyze(
            "ZONE-002",
            ImageSource::Cctv,
            Utc::now(),
            vec![detection(DetectionClass::ToolDetection, 1.0)],
            vec![ImageCondition::Rain],
            true,
        );
        let foggy = analyzer().analyze(
            "ZONE-002",
            ImageSource::Cctv,
            Utc::now(),
            vec![detection(DetectionClass::ToolDetection, 1.0)],
            vec![ImageCondition::Fog],
            true,
        );
        assert_eq!(clear.vision_risk_score, 30.0);
        assert_eq!(foggy.vision_risk_score, 25.5);
        assert_eq!(
            foggy.risk_reasons.last().map(String::as_str),
            Some(POOR_VISIBILITY_REASON)
        );
    }

    #[test]
    fn score_is_capped_at_one_hundred() {
        let detections = vec![
            detection(DetectionClass::TrackDisplacement, 0.95),
            detection(DetectionClass::MissingFishPlate, 0.95),
            detection(DetectionClass::ToolDetection, 0.9),
            detection(DetectionClass::HumanPresence, 0.9),
        ];
        let analysis = analyzer().analyze(
            "ZONE-003",
            ImageSource::Cctv,
            Utc::now(),
            detections,
            Vec::new(),
            true,
        );
        assert_eq!(analysis.vision_risk_score, 100.0);
    }
}
