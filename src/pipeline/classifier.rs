// SYNOID FitCheck Classifier
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use crate::pipeline::thresholds::{find_band, ClassificationBand, Exercise, FitnessLevel, Gender};

/// Grade a raw analyzer measurement against the norm tables.
///
/// Never fails: an unrecognized gender or an uncovered age yields
/// [`FitnessLevel::NotApplicable`].
pub fn classify(exercise: Exercise, measurement: f64, age: u32, gender: &str) -> FitnessLevel {
    let Some(gender) = Gender::from_str(gender) else {
        return FitnessLevel::NotApplicable;
    };
    match find_band(exercise, gender, age) {
        Some(band) => grade(band, measurement),
        None => FitnessLevel::NotApplicable,
    }
}

/// First tier (highest first) whose threshold the measurement meets.
pub fn grade(band: &ClassificationBand, measurement: f64) -> FitnessLevel {
    band.tiers
        .iter()
        .find(|t| measurement >= t.threshold)
        .map(|t| t.level)
        .unwrap_or(band.floor)
}
