//! Bounded arithmetic used by every scoring step.
//!
//! Each guarded operation returns `(value, Option<FallbackReason>)`. A `Some`
//! reason means the operation hit a degenerate input and the documented
//! fallback was used instead; it is never an error.

use serde::{Deserialize, Serialize};

/// Why a guarded operation fell back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    DenominatorZero,
    EmptyArray,
    AllWeightsZero,
    NoValidValues,
    NegativeValue,
    OverflowProtection,
    NormalizationFallback,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::DenominatorZero => "DENOMINATOR_ZERO",
            FallbackReason::EmptyArray => "EMPTY_ARRAY",
            FallbackReason::AllWeightsZero => "ALL_WEIGHTS_ZERO",
            FallbackReason::NoValidValues => "NO_VALID_VALUES",
            FallbackReason::NegativeValue => "NEGATIVE_VALUE",
            FallbackReason::OverflowProtection => "OVERFLOW_PROTECTION",
            FallbackReason::NormalizationFallback => "NORMALIZATION_FALLBACK",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Guarded = (f64, Option<FallbackReason>);

/// Division with a zero (and non-finite result) guard.
pub fn safe_divide(numerator: f64, denominator: f64, default: f64, context: &str) -> Guarded {
    if denominator == 0.0 || denominator.is_nan() {
        tracing::warn!(
            numerator,
            denominator,
            fallback = default,
            context = context_or_unspecified(context),
            "division by zero avoided"
        );
        return (default, Some(FallbackReason::DenominatorZero));
    }

    let result = numerator / denominator;
    if !result.is_finite() {
        tracing::warn!(
            numerator,
            denominator,
            fallback = default,
            context = context_or_unspecified(context),
            "non-finite quotient replaced by fallback"
        );
        return (default, Some(FallbackReason::OverflowProtection));
    }
    (result, None)
}

pub fn safe_average(values: &[f64], default: f64, context: &str) -> Guarded {
    if values.is_empty() {
        tracing::warn!(
            fallback = default,
            context = context_or_unspecified(context),
            "empty array in average calculation"
        );
        return (default, Some(FallbackReason::EmptyArray));
    }
    let sum: f64 = values.iter().sum();
    safe_divide(sum, values.len() as f64, default, context)
}

pub fn safe_weighted_average(
    values: &[f64],
    weights: &[f64],
    default: f64,
    context: &str,
) -> Guarded {
    if values.is_empty() || weights.is_empty() {
        tracing::warn!(
            fallback = default,
            context = context_or_unspecified(context),
            "empty arrays in weighted average"
        );
        return (default, Some(FallbackReason::EmptyArray));
    }
    if values.len() != weights.len() {
        tracing::error!(
            values = values.len(),
            weights = weights.len(),
            context = context_or_unspecified(context),
            "mismatched array lengths in weighted average"
        );
        return (default, Some(FallbackReason::NoValidValues));
    }

    let total_weight: f64 = weights.iter().sum();
    if total_weight == 0.0 {
        tracing::warn!(
            fallback = default,
            context = context_or_unspecified(context),
            "all weights are zero"
        );
        return (default, Some(FallbackReason::AllWeightsZero));
    }

    let weighted_sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    safe_divide(weighted_sum, total_weight, default, context)
}

/// Min-max normalization into `[0, 1]`.
pub fn safe_normalize(value: f64, min: f64, max: f64, default: f64, context: &str) -> Guarded {
    let range = max - min;
    if range == 0.0 {
        tracing::warn!(
            min,
            max,
            fallback = default,
            context = context_or_unspecified(context),
            "zero range in normalization"
        );
        return (default, Some(FallbackReason::NormalizationFallback));
    }
    let (normalized, reason) = safe_divide(value - min, range, default, context);
    (safe_clamp(normalized, 0.0, 1.0), reason)
}

/// `part / whole * 100`.
pub fn safe_percentage(part: f64, whole: f64, default: f64, context: &str) -> Guarded {
    match safe_divide(part, whole, default, context) {
        (_, Some(reason)) => (default, Some(reason)),
        (ratio, None) => (ratio * 100.0, None),
    }
}

/// Clamp into `[min, max]`. NaN collapses to `min`.
pub fn safe_clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        return min;
    }
    value.max(min).min(max)
}

/// Clamp a risk score into `[min, max]`, reporting which bound triggered.
pub fn safe_risk_score(raw: f64, min: f64, max: f64, context: &str) -> Guarded {
    if raw.is_nan() || raw < min {
        tracing::warn!(
            raw,
            clamped = min,
            context = context_or_unspecified(context),
            "risk score below minimum"
        );
        return (min, Some(FallbackReason::NegativeValue));
    }
    if raw > max {
        tracing::warn!(
            raw,
            clamped = max,
            context = context_or_unspecified(context),
            "risk score above maximum"
        );
        return (max, Some(FallbackReason::OverflowProtection));
    }
    (raw, None)
}

/// Confidence from how many components contributed and their total weight.
pub fn calculate_confidence(scores: &[f64], weights: &[f64], context: &str) -> Guarded {
    if scores.is_empty() {
        tracing::warn!(
            context = context_or_unspecified(context),
            "no component scores for confidence"
        );
        return (0.5, Some(FallbackReason::EmptyArray));
    }

    let base = (scores.len() as f64 / 3.0).min(1.0);
    let total_weight: f64 = weights.iter().sum();
    let (weight_factor, _) = safe_divide(total_weight, 100.0, 0.5, context);
    let confidence = (base + weight_factor.min(1.0)) / 2.0;
    (safe_clamp(confidence, 0.0, 1.0), None)
}

/// Round half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn context_or_unspecified(context: &str) -> &str {
    if context.is_empty() { "unspecified" } else { context }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divide_by_zero_returns_default_with_reason() {
        assert_eq!(
            safe_divide(5.0, 0.0, -1.0, "test"),
            (-1.0, Some(FallbackReason::DenominatorZero))
        );
    }

    #[test]
    fn divide_succeeds_without_reason() {
        assert_eq!(safe_divide(9.0, 3.0, 0.0, ""), (3.0, None));
    }

    #[test]
    fn clamp_bounds_values() {
        assert_eq!(safe_clamp(150.0, 0.0, 100.0), 100.0);
        assert_eq!(safe_clamp(-3.0, 0.0, 100.0), 0.0);
        assert_eq!(safe_clamp(f64::NAN, 0.0, 100.0), 0.0);
        assert_eq!(safe_clamp(42.0, 0.0, 100.0), 42.0);
    }

    #[test]
    fn average_of_empty_slice_falls_back() {
        assert_eq!(
            safe_average(&[], 7.0, "empty"),
            (7.0, Some(FallbackReason::EmptyArray))
        );
        assert_eq!(safe_average(&[2.0, 4.0], 0.0, ""), (3.0, None));
    }

    #[test]
    fn weighted_average_guards_degenerate_weights() {
        assert_eq!(
            safe_weighted_average(&[1.0, 2.0], &[0.0, 0.0], 0.0, ""),
            (0.0, Some(FallbackReason::AllWeightsZero))
        );
        assert_eq!(
            safe_weighted_average(&[1.0, 2.0], &[1.0], 0.0, ""),
            (0.0, Some(FallbackReason::NoValidValues))
        );
        assert_eq!(
            safe_weighted_average(&[10.0, 20.0], &[1.0, 3.0], 0.0, ""),
            (17.5, None)
        );
    }

    #[test]
    fn normalize_clamps_and_guards_zero_range() {
        assert_eq!(
            safe_normalize(5.0, 3.0, 3.0, 0.25, ""),
            (0.25, Some(FallbackReason::NormalizationFallback))
        );
        assert_eq!(safe_normalize(150.0, 0.0, 100.0, 0.0, ""), (1.0, None));
        assert_eq!(safe_normalize(25.0, 0.0, 100.0, 0.0, ""), (0.25, None));
    }

    #[test]
    fn percentage_uses_default_on_zero_whole() {
        assert_eq!(
            safe_percentage(1.0, 0.0, 12.0, ""),
            (12.0, Some(FallbackReason::DenominatorZero))
        );
        assert_eq!(safe_percentage(1.0, 4.0, 0.0, ""), (25.0, None));
    }

    #[test]
    fn risk_score_reports_bound_hit() {
        assert_eq!(
            safe_risk_score(-4.0, 0.0, 100.0, ""),
            (0.0, Some(FallbackReason::NegativeValue))
        );
        assert_eq!(
            safe_risk_score(140.0, 0.0, 100.0, ""),
            (100.0, Some(FallbackReason::OverflowProtection))
        );
        assert_eq!(safe_risk_score(55.5, 0.0, 100.0, ""), (55.5, None));
    }

    #[test]
    fn confidence_rewards_more_components() {
        let (one, _) = calculate_confidence(&[1.0], &[10.0], "");
        let (three, _) = calculate_confidence(&[1.0, 1.0, 1.0], &[40.0, 40.0, 40.0], "");
        assert!(three > one);
        assert!(three <= 1.0);
        assert_eq!(
            calculate_confidence(&[], &[], ""),
            (0.5, Some(FallbackReason::EmptyArray))
        );
    }

    #[test]
    fn reason_codes_serialize_in_screaming_case() {
        let json = serde_json::to_string(&FallbackReason::AllWeightsZero).unwrap();
        assert_eq!(json, "\"ALL_WEIGHTS_ZERO\"");
        assert_eq!(FallbackReason::DenominatorZero.to_string(), "DENOMINATOR_ZERO");
    }

    #[test]
    fn rounding_is_two_decimal_stable() {
        assert_eq!(round_to(87.749_999, 2), 87.75);
        assert_eq!(round_to(0.904_5, 2), 0.9);
    }
}
