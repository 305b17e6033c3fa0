use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::{GrowthError, Result};
use crate::models::{CollectionMode, MeasurementSample, Sector, Sex};

pub const MAX_AGE_DAYS: u8 = 55;

/// Parses one entered weight. Blank input counts as "not weighed" (0).
pub fn parse_weight(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<u32>()
        .map_err(|_| GrowthError::InvalidSampleValue {
            value: raw.to_string(),
        })
}

pub fn validate_age(age_days: i64) -> Result<u8> {
    u8::try_from(age_days)
        .ok()
        .filter(|age| *age <= MAX_AGE_DAYS)
        .ok_or(GrowthError::InvalidAge(age_days))
}

/// Identity of one measurement event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchHeader {
    pub date: NaiveDate,
    pub farm: String,
    pub house: String,
    pub age_days: u8,
}

impl BatchHeader {
    pub fn new(date: NaiveDate, farm: &str, house: &str, age_days: i64) -> Result<Self> {
        Ok(Self {
            date,
            farm: farm.to_string(),
            house: house.to_string(),
            age_days: validate_age(age_days)?,
        })
    }
}

/// A complete, validated set of samples. There is no way to change the
/// samples once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementBatch {
    header: BatchHeader,
    mode: CollectionMode,
    samples: Vec<MeasurementSample>,
}

impl MeasurementBatch {
    pub fn header(&self) -> &BatchHeader {
        &self.header
    }

    pub fn mode(&self) -> CollectionMode {
        self.mode
    }

    pub fn samples(&self) -> &[MeasurementSample] {
        &self.samples
    }

    /// Builds a batch from weights listed in form entry order.
    pub fn from_values<S: AsRef<str>>(
        header: BatchHeader,
        mode: CollectionMode,
        values: &[S],
    ) -> Result<Self> {
        let slots = mode.slots();
        if values.len() != slots.len() {
            return Err(GrowthError::shape(
                mode,
                format!("expected {} samples, got {}", slots.len(), values.len()),
            ));
        }

        let mut builder = BatchBuilder::new(header, mode);
        for ((sector, sex, index), raw) in slots.into_iter().zip(values) {
            builder.insert(sector, sex, index, raw.as_ref())?;
        }
        builder.build()
    }

    pub fn raw_values(&self) -> impl Iterator<Item = u32> + '_ {
        self.samples.iter().map(|sample| sample.value)
    }
}

/// Collects entries slot by slot before the batch is frozen.
#[derive(Debug, Clone)]
pub struct BatchBuilder {
    header: BatchHeader,
    mode: CollectionMode,
    entries: BTreeMap<(Sector, Sex, u8), u32>,
}

impl BatchBuilder {
    pub fn new(header: BatchHeader, mode: CollectionMode) -> Self {
        Self {
            header,
            mode,
            entries: BTreeMap::new(),
        }
    }

    /// Records or replaces the weight at a slot.
    pub fn set(&mut self, sector: Sector, sex: Sex, index: u8, raw: &str) -> Result<&mut Self> {
        self.check_slot(sex, index)?;
        let value = parse_weight(raw)?;
        self.entries.insert((sector, sex, index), value);
        Ok(self)
    }

    /// Records the weight at a slot that must still be empty.
    pub fn insert(&mut self, sector: Sector, sex: Sex, index: u8, raw: &str) -> Result<&mut Self> {
        self.check_slot(sex, index)?;
        if self.entries.contains_key(&(sector, sex, index)) {
            return Err(GrowthError::shape(
                self.mode,
                format!("{sector:?}/{sex:?}/{index} entered more than once"),
            ));
        }
        self.set(sector, sex, index, raw)
    }

    fn check_slot(&self, sex: Sex, index: u8) -> Result<()> {
        if !self.mode.accepts(sex) {
            return Err(GrowthError::shape(
                self.mode,
                format!("{sex:?} samples are not collected in this mode"),
            ));
        }
        if !(1..=CollectionMode::BIRDS_PER_GROUP).contains(&index) {
            return Err(GrowthError::shape(
                self.mode,
                format!(
                    "bird index {index} outside 1..={}",
                    CollectionMode::BIRDS_PER_GROUP
                ),
            ));
        }
        Ok(())
    }

    pub fn build(self) -> Result<MeasurementBatch> {
        let slots = self.mode.slots();
        let missing: Vec<String> = slots
            .iter()
            .filter(|slot| !self.entries.contains_key(*slot))
            .map(|(sector, sex, index)| format!("{sector:?}/{sex:?}/{index}"))
            .collect();
        if !missing.is_empty() {
            return Err(GrowthError::shape(
                self.mode,
                format!(
                    "expected {} samples, got {} (missing {})",
                    slots.len(),
                    self.entries.len(),
                    missing.join(", ")
                ),
            ));
        }

        let samples: Vec<MeasurementSample> = slots
            .into_iter()
            .map(|slot @ (sector, sex, _)| MeasurementSample {
                value: self.entries[&slot],
                sector,
                sex,
            })
            .collect();

        debug!(
            farm = %self.header.farm,
            house = %self.header.house,
            mode = %self.mode,
            measured = samples.iter().filter(|s| s.is_measured()).count(),
            "batch built"
        );

        Ok(MeasurementBatch {
            header: self.header,
            mode: self.mode,
            samples,
        })
    }
}

/// One line of a samples CSV: `sector,sex,index,weight`.
#[derive(Debug, Deserialize)]
struct SampleRow {
    sector: Sector,
    sex: Sex,
    index: u8,
    weight: String,
}

pub fn read_samples_csv<R: std::io::Read>(
    reader: R,
    header: BatchHeader,
    mode: CollectionMode,
) -> anyhow::Result<MeasurementBatch> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut builder = BatchBuilder::new(header, mode);

    for result in reader.deserialize::<SampleRow>() {
        let row = result?;
        builder.insert(row.sector, row.sex, row.index, &row.weight)?;
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> BatchHeader {
        BatchHeader::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            "安達",
            "3",
            10,
        )
        .unwrap()
    }

    #[test]
    fn weights_must_be_whole_non_negative_grams() {
        assert_eq!(parse_weight("42").unwrap(), 42);
        assert_eq!(parse_weight(" 0 ").unwrap(), 0);
        assert_eq!(parse_weight("").unwrap(), 0);
        for bad in ["-3", "41.5", "abc", "1e3"] {
            assert!(matches!(
                parse_weight(bad),
                Err(GrowthError::InvalidSampleValue { .. })
            ));
        }
    }

    #[test]
    fn age_is_bounded() {
        assert_eq!(validate_age(0).unwrap(), 0);
        assert_eq!(validate_age(55).unwrap(), 55);
        assert!(matches!(validate_age(56), Err(GrowthError::InvalidAge(56))));
        assert!(matches!(validate_age(-1), Err(GrowthError::InvalidAge(-1))));
    }

    #[test]
    fn positional_values_fill_slots_in_order() {
        let values: Vec<String> = (1..=15).map(|v| v.to_string()).collect();
        let batch = MeasurementBatch::from_values(header(), CollectionMode::Unsexed15, &values)
            .unwrap();

        assert_eq!(batch.samples().len(), 15);
        assert_eq!(batch.samples()[0].sector, Sector::Front);
        assert_eq!(batch.samples()[5].sector, Sector::Middle);
        assert_eq!(batch.samples()[14].sector, Sector::Rear);
        assert_eq!(batch.raw_values().collect::<Vec<_>>(), (1..=15).collect::<Vec<_>>());
    }

    #[test]
    fn wrong_count_is_a_shape_mismatch() {
        let short = vec!["40"; 14];
        assert!(matches!(
            MeasurementBatch::from_values(header(), CollectionMode::Unsexed15, &short),
            Err(GrowthError::BatchShapeMismatch { .. })
        ));

        let over = vec!["40"; 16];
        assert!(matches!(
            MeasurementBatch::from_values(header(), CollectionMode::Unsexed15, &over),
            Err(GrowthError::BatchShapeMismatch { .. })
        ));

        let fifteen = vec!["40"; 15];
        assert!(matches!(
            MeasurementBatch::from_values(header(), CollectionMode::Sexed30, &fifteen),
            Err(GrowthError::BatchShapeMismatch { .. })
        ));
    }

    #[test]
    fn builder_rejects_wrong_sex_and_index() {
        let mut builder = BatchBuilder::new(header(), CollectionMode::Unsexed15);
        assert!(builder.set(Sector::Front, Sex::Male, 1, "40").is_err());
        assert!(builder.set(Sector::Front, Sex::Unsexed, 0, "40").is_err());
        assert!(builder.set(Sector::Front, Sex::Unsexed, 6, "40").is_err());

        let mut builder = BatchBuilder::new(header(), CollectionMode::Sexed30);
        assert!(builder.set(Sector::Rear, Sex::Unsexed, 1, "40").is_err());
    }

    #[test]
    fn builder_reports_missing_slots() {
        let mut builder = BatchBuilder::new(header(), CollectionMode::Unsexed15);
        builder.set(Sector::Front, Sex::Unsexed, 1, "40").unwrap();
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn later_entry_replaces_earlier_one() {
        let mut builder = BatchBuilder::new(header(), CollectionMode::Unsexed15);
        for (sector, sex, index) in CollectionMode::Unsexed15.slots() {
            builder.set(sector, sex, index, "40").unwrap();
        }
        builder.set(Sector::Rear, Sex::Unsexed, 5, "44").unwrap();
        let batch = builder.build().unwrap();
        assert_eq!(batch.samples()[14].value, 44);
        assert_eq!(batch.samples().len(), 15);
    }

    #[test]
    fn insert_refuses_a_filled_slot() {
        let mut builder = BatchBuilder::new(header(), CollectionMode::Unsexed15);
        builder.insert(Sector::Front, Sex::Unsexed, 1, "40").unwrap();
        assert!(matches!(
            builder.insert(Sector::Front, Sex::Unsexed, 1, "41"),
            Err(GrowthError::BatchShapeMismatch { .. })
        ));
    }

    #[test]
    fn csv_with_a_repeated_slot_is_rejected() {
        let mut csv_text = String::from("sector,sex,index,weight\n");
        for sector in ["front", "middle", "rear"] {
            for index in 1..=5 {
                csv_text.push_str(&format!("{sector},unsexed,{index},40\n"));
            }
        }
        csv_text.push_str("front,unsexed,1,999\n");

        let err = read_samples_csv(csv_text.as_bytes(), header(), CollectionMode::Unsexed15)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GrowthError>(),
            Some(GrowthError::BatchShapeMismatch { .. })
        ));
    }

    #[test]
    fn zero_samples_are_kept() {
        let mut values = vec!["40"; 15];
        values[3] = "0";
        let batch = MeasurementBatch::from_values(header(), CollectionMode::Unsexed15, &values)
            .unwrap();
        assert_eq!(batch.samples()[3].value, 0);
        assert!(!batch.samples()[3].is_measured());
    }

    #[test]
    fn csv_rows_map_to_slots_regardless_of_line_order() {
        let mut csv_text = String::from("sector,sex,index,weight\n");
        for sector in ["rear", "middle", "front"] {
            for index in (1..=5).rev() {
                csv_text.push_str(&format!("{sector},male,{index},1{index}0\n"));
                csv_text.push_str(&format!("{sector},female,{index},2{index}0\n"));
            }
        }

        let batch =
            read_samples_csv(csv_text.as_bytes(), header(), CollectionMode::Sexed30).unwrap();
        let values: Vec<u32> = batch.raw_values().collect();
        assert_eq!(&values[..4], &[110, 210, 120, 220]);
        assert_eq!(batch.samples()[0].sex, Sex::Male);
        assert_eq!(batch.samples()[0].sector, Sector::Front);
    }

    #[test]
    fn csv_with_fractional_weight_is_rejected() {
        let csv_text = "sector,sex,index,weight\nfront,unsexed,1,40.5\n";
        let err = read_samples_csv(csv_text.as_bytes(), header(), CollectionMode::Unsexed15)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GrowthError>(),
            Some(GrowthError::InvalidSampleValue { .. })
        ));
    }
}
