use chrono::{DateTime, Timelike, Utc};
use rakshak_core::TemporalContext;
use rakshak_core::config::{MAX_TEMPORAL_MULTIPLIER, MIN_TEMPORAL_MULTIPLIER, TemporalConfig};
use rakshak_core::safe_math::safe_clamp;

pub const NIGHT_NOTE: &str = "Night hours - elevated tampering risk period";
pub const EARLY_MORNING_NOTE: &str = "Early morning - reduced visibility period";
pub const PEAK_NOTE: &str = "Peak hours - increased monitoring";
pub const MAINTENANCE_NOTE: &str = "Scheduled maintenance window - crews expected on track";

/// Maps a timestamp to a time-of-day risk multiplier.
#[derive(Debug, Clone)]
pub struct TemporalCalculator {
    config: TemporalConfig,
}

impl TemporalCalculator {
    pub fn new(config: TemporalConfig) -> Self {
        Self { config }
    }

    /// Bands are checked night, early morning, peak, maintenance; the first
    /// match sets the multiplier and nothing is combined. Hours are UTC.
    pub fn compute(&self, timestamp: DateTime<Utc>) -> TemporalContext {
        let hour = timestamp.hour();
        let cfg = &self.config;

        let is_night = cfg.night.contains(hour);
        let is_early_morning = cfg.early_morning_window.contains(hour);
        let is_peak = cfg.peak_windows.iter().any(|w| w.contains(hour));
        let is_maintenance = cfg.maintenance_windows.iter().any(|w| w.contains(hour));

        let modifier = if is_night {
            cfg.night_hours
        } else if is_early_morning {
            cfg.early_morning
        } else if is_peak {
            cfg.peak_hours
        } else if is_maintenance {
            cfg.maintenance_window
        } else {
            1.0
        };

        let mut notes = Vec::new();
        if is_night {
            notes.push(NIGHT_NOTE.to_string());
        }
        if is_early_morning {
            notes.push(EARLY_MORNING_NOTE.to_string());
        }
        if is_peak {
            notes.push(PEAK_NOTE.to_string());
        }
        if is_maintenance {
            notes.push(MAINTENANCE_NOTE.to_string());
        }

        TemporalContext {
            timestamp,
            hour_of_day: hour,
            is_night_hours: is_night,
            is_early_morning,
            is_peak_hours: is_peak,
            is_maintenance_window: is_maintenance,
            time_risk_modifier: safe_clamp(
                modifier,
                MIN_TEMPORAL_MULTIPLIER,
                MAX_TEMPORAL_MULTIPLIER,
            ),
            temporal_notes: notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rakshak_core::config::HourWindow;

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, 30, 0).unwrap()
    }

    fn calculator() -> TemporalCalculator {
        TemporalCalculator::new(TemporalConfig::default())
    }

    #[test]
    fn night_hours_raise_multiplier() {
        for hour in [22, 23, 0, 3, 4] {
            let ctx = calculator().compute(at_hour(hour));
            assert!(ctx.is_night_hours, "hour {hour}");
            assert_eq!(ctx.time_risk_modifier, 1.3);
            assert_eq!(ctx.temporal_notes, vec![NIGHT_NOTE.to_string()]);
        }
    }

    #[test]
    fn early_morning_band_is_five_to_seven() {
        let ctx = calculator().compute(at_hour(5));
        assert!(ctx.is_early_morning);
        assert!(!ctx.is_night_hours);
        assert_eq!(ctx.time_risk_modifier, 1.2);

        let ctx = calculator().compute(at_hour(7));
        assert!(!ctx.is_early_morning);
        assert!(ctx.is_peak_hours);
    }

    #[test]
    fn peak_hours_lower_multiplier_and_end_exclusive() {
        for hour in [7, 9, 17, 19] {
            let ctx = calculator().compute(at_hour(hour));
            assert!(ctx.is_peak_hours, "hour {hour}");
            assert_eq!(ctx.time_risk_modifier, 0.9);
        }
        for hour in [10, 20] {
            let ctx = calculator().compute(at_hour(hour));
            assert!(!ctx.is_peak_hours, "hour {hour}");
            assert_eq!(ctx.time_risk_modifier, 1.0);
            assert!(ctx.temporal_notes.is_empty());
        }
    }

    #[test]
    fn night_overrides_overlapping_peak_band() {
        let config = TemporalConfig {
            peak_windows: vec![HourWindow::new(21, 24)],
            ..TemporalConfig::default()
        };
        let ctx = TemporalCalculator::new(config).compute(at_hour(23));
        assert!(ctx.is_night_hours);
        assert!(ctx.is_peak_hours);
        assert_eq!(ctx.time_risk_modifier, 1.3);
        assert_eq!(
            ctx.temporal_notes,
            vec![NIGHT_NOTE.to_string(), PEAK_NOTE.to_string()]
        );
    }

    #[test]
    fn maintenance_applies_only_when_no_other_band_matches() {
        let config = TemporalConfig {
            maintenance_windows: vec![HourWindow::new(12, 15), HourWindow::new(8, 9)],
            ..TemporalConfig::default()
        };
        let calc = TemporalCalculator::new(config);

        let midday = calc.compute(at_hour(13));
        assert!(midday.is_maintenance_window);
        assert_eq!(midday.time_risk_modifier, 0.5);

        let morning_peak = calc.compute(at_hour(8));
        assert!(morning_peak.is_maintenance_window);
        assert_eq!(morning_peak.time_risk_modifier, 0.9);
    }
}
