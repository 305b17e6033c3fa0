use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::batch::MeasurementBatch;
use crate::models::{AggregateStats, CollectionMode, GrowthDiagnosticResult};

/// Column order of a submitted row.
pub const ROW_HEADER: [&str; 11] = [
    "date",
    "farm",
    "house",
    "age_days",
    "baseline_weight",
    "mean_weight",
    "cv",
    "growth_ratio",
    "deviation_pct",
    "valid_count",
    "raw_samples",
];

/// The finalized result of one measurement session, exactly as it is sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub date: NaiveDate,
    pub farm: String,
    pub house: String,
    pub age_days: u8,
    pub mode: CollectionMode,
    pub baseline_weight: f64,
    pub stats: AggregateStats,
    pub diagnosis: GrowthDiagnosticResult,
    pub raw_samples: Vec<u32>,
}

impl SubmissionRecord {
    pub fn assemble(
        batch: &MeasurementBatch,
        baseline_weight: f64,
        stats: &AggregateStats,
        diagnosis: &GrowthDiagnosticResult,
    ) -> Self {
        let header = batch.header();
        Self {
            date: header.date,
            farm: header.farm.clone(),
            house: header.house.clone(),
            age_days: header.age_days,
            mode: batch.mode(),
            baseline_weight,
            stats: *stats,
            diagnosis: *diagnosis,
            raw_samples: batch.raw_values().collect(),
        }
    }

    pub fn raw_samples_joined(&self) -> String {
        self.raw_samples
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.date.to_string(),
            self.farm.clone(),
            self.house.clone(),
            self.age_days.to_string(),
            self.baseline_weight.to_string(),
            self.stats.mean.to_string(),
            self.stats.cv.to_string(),
            self.diagnosis.growth_ratio.to_string(),
            self.diagnosis.deviation_pct.to_string(),
            self.stats.valid_count.to_string(),
            self.raw_samples_joined(),
        ]
    }
}
