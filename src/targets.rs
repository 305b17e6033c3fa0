/// Expected growth multiplier over chick weight, by age in weeks.
#[derive(Debug, Clone)]
pub struct GrowthTargetTable {
    ratios: Vec<(u32, f64)>,
}

const CALIBRATION: [(u32, f64); 7] = [
    (1, 5.0),
    (2, 12.0),
    (3, 23.0),
    (4, 37.0),
    (5, 52.0),
    (6, 68.0),
    (7, 83.0),
];

impl GrowthTargetTable {
    pub fn standard() -> Self {
        Self {
            ratios: CALIBRATION.to_vec(),
        }
    }

    /// Returns 0 for weeks outside the calibrated range.
    pub fn target_for(&self, age_weeks: u32) -> f64 {
        self.ratios
            .iter()
            .find(|(week, _)| *week == age_weeks)
            .map(|(_, ratio)| *ratio)
            .unwrap_or(0.0)
    }
}
