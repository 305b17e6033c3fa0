use crate::models::{round2, GrowthDiagnosticResult};
use crate::targets::GrowthTargetTable;

pub fn age_weeks(age_days: u8) -> u32 {
    u32::from(age_days) / 7
}

/// Compares the flock's growth over its chick weight with the target for
/// its age. A zero baseline or an uncalibrated week yields 0 for the
/// affected figures instead of a division by zero.
pub fn diagnose(
    mean: f64,
    baseline_weight: f64,
    age_days: u8,
    targets: &GrowthTargetTable,
) -> GrowthDiagnosticResult {
    let target_ratio = targets.target_for(age_weeks(age_days));

    let growth_ratio = if baseline_weight > 0.0 {
        round2(mean / baseline_weight)
    } else {
        0.0
    };

    let deviation_pct = if target_ratio > 0.0 {
        round2((growth_ratio - target_ratio) / target_ratio * 100.0)
    } else {
        0.0
    };

    GrowthDiagnosticResult {
        growth_ratio,
        target_ratio,
        deviation_pct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_baseline_means_no_ratio() {
        let table = GrowthTargetTable::standard();
        for mean in [0.0, 40.93, 2950.0] {
            let result = diagnose(mean, 0.0, 21, &table);
            assert_eq!(result.growth_ratio, 0.0);
            assert_eq!(result.target_ratio, 23.0);
            assert_eq!(result.deviation_pct, -100.0);
        }
    }

    #[test]
    fn ages_outside_calibration_have_no_deviation() {
        let table = GrowthTargetTable::standard();
        for age in [0, 3, 6, 56, 60] {
            let age = age as u8;
            let result = diagnose(400.0, 40.0, age, &table);
            assert_eq!(result.target_ratio, 0.0);
            assert_eq!(result.deviation_pct, 0.0);
            assert_eq!(result.growth_ratio, 10.0);
        }
    }

    #[test]
    fn week_is_floored_day_count() {
        assert_eq!(age_weeks(6), 0);
        assert_eq!(age_weeks(7), 1);
        assert_eq!(age_weeks(13), 1);
        assert_eq!(age_weeks(14), 2);
        assert_eq!(age_weeks(55), 7);
    }

    #[test]
    fn deviation_uses_rounded_ratio() {
        let table = GrowthTargetTable::standard();
        let result = diagnose(40.93, 38.0, 10, &table);
        assert_eq!(result.growth_ratio, 1.08);
        assert_eq!(result.target_ratio, 5.0);
        assert!((result.deviation_pct - -78.4).abs() < 1e-9);
    }

    #[test]
    fn on_target_flock_has_zero_deviation() {
        let table = GrowthTargetTable::standard();
        let result = diagnose(2905.0, 35.0, 49, &table);
        assert_eq!(result.growth_ratio, 83.0);
        assert_eq!(result.deviation_pct, 0.0);
    }
}
