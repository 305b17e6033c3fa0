use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Front,
    Middle,
    Rear,
}

impl Sector {
    pub const ALL: [Sector; 3] = [Sector::Front, Sector::Middle, Sector::Rear];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Unsexed,
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionMode {
    /// 15 birds, 5 per sector, no sex distinction
    Unsexed15,
    /// 30 birds, 5 male and 5 female per sector
    Sexed30,
}

impl CollectionMode {
    pub const BIRDS_PER_GROUP: u8 = 5;

    pub fn sample_count(self) -> usize {
        match self {
            CollectionMode::Unsexed15 => 15,
            CollectionMode::Sexed30 => 30,
        }
    }

    /// Mode the field crew uses by default: unsexed for the first week.
    pub fn default_for_age(age_days: u8) -> Self {
        if age_days <= 7 {
            CollectionMode::Unsexed15
        } else {
            CollectionMode::Sexed30
        }
    }

    pub fn accepts(self, sex: Sex) -> bool {
        match self {
            CollectionMode::Unsexed15 => sex == Sex::Unsexed,
            CollectionMode::Sexed30 => matches!(sex, Sex::Male | Sex::Female),
        }
    }

    /// Slots in form entry order.
    pub fn slots(self) -> Vec<(Sector, Sex, u8)> {
        let mut slots = Vec::with_capacity(self.sample_count());
        for sector in Sector::ALL {
            for index in 1..=Self::BIRDS_PER_GROUP {
                match self {
                    CollectionMode::Unsexed15 => slots.push((sector, Sex::Unsexed, index)),
                    CollectionMode::Sexed30 => {
                        slots.push((sector, Sex::Male, index));
                        slots.push((sector, Sex::Female, index));
                    }
                }
            }
        }
        slots
    }
}

impl fmt::Display for CollectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionMode::Unsexed15 => f.write_str("unsexed15"),
            CollectionMode::Sexed30 => f.write_str("sexed30"),
        }
    }
}

impl FromStr for CollectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsexed15" | "15" => Ok(CollectionMode::Unsexed15),
            "sexed30" | "30" => Ok(CollectionMode::Sexed30),
            other => Err(format!("unknown collection mode {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSample {
    /// Grams; 0 means the bird was not weighed
    pub value: u32,
    pub sector: Sector,
    pub sex: Sex,
}

impl MeasurementSample {
    pub fn is_measured(&self) -> bool {
        self.value > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub valid_count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub cv: f64,
}

impl AggregateStats {
    pub const EMPTY: AggregateStats = AggregateStats {
        valid_count: 0,
        mean: 0.0,
        std_dev: 0.0,
        cv: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthDiagnosticResult {
    pub growth_ratio: f64,
    pub target_ratio: f64,
    pub deviation_pct: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
