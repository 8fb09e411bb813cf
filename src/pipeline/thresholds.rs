// SYNOID FitCheck Threshold Tables
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Static norm tables for every supported exercise. Each band covers one
// gender and one age range, and lists its tiers from the highest
// requirement down. Adding an exercise is a data change here, not a new
// decision tree.

use serde::Serialize;
use std::fmt;

/// Exercises the intake pipeline knows how to analyze and grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Exercise {
    #[serde(rename = "pushup")]
    PushUp,
    #[serde(rename = "situp")]
    SitUp,
    #[serde(rename = "vertical_jump")]
    VerticalJump,
    #[serde(rename = "sit_and_reach")]
    SitAndReach,
}

/// What an analyzer measures for a given exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    RepetitionCount,
    DistanceCm,
}

impl Exercise {
    pub const ALL: [Exercise; 4] = [
        Exercise::PushUp,
        Exercise::SitUp,
        Exercise::VerticalJump,
        Exercise::SitAndReach,
    ];

    /// Parse a declared exercise type (case-insensitive, common spellings).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pushup" | "push-up" | "push_up" | "pushups" | "push-ups" => Some(Self::PushUp),
            "situp" | "sit-up" | "sit_up" | "situps" | "sit-ups" => Some(Self::SitUp),
            "vertical_jump" | "vertical-jump" | "verticaljump" | "jump" => {
                Some(Self::VerticalJump)
            }
            "sit_and_reach" | "sit-and-reach" | "sitandreach" | "reach" => {
                Some(Self::SitAndReach)
            }
            _ => None,
        }
    }

    /// Canonical key used in URLs, env var names and JSON.
    pub fn key(&self) -> &'static str {
        match self {
            Self::PushUp => "pushup",
            Self::SitUp => "situp",
            Self::VerticalJump => "vertical_jump",
            Self::SitAndReach => "sit_and_reach",
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::PushUp | Self::SitUp => Capability::RepetitionCount,
            Self::VerticalJump | Self::SitAndReach => Capability::DistanceCm,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self.capability() {
            Capability::RepetitionCount => "reps",
            Capability::DistanceCm => "cm",
        }
    }

    /// Query key the result view reads the measurement from.
    pub fn result_param(&self) -> &'static str {
        match self {
            Self::PushUp | Self::SitUp => "reps",
            Self::VerticalJump => "height",
            Self::SitAndReach => "reach",
        }
    }

    /// Display form of a raw measurement: whole reps, centimetres to 0.1.
    pub fn format_measurement(&self, value: f64) -> String {
        match self.capability() {
            Capability::RepetitionCount => format!("{:.0}", value),
            Capability::DistanceCm => {
                let rounded = (value * 10.0).round() / 10.0;
                if rounded.fract() == 0.0 {
                    format!("{:.0}", rounded)
                } else {
                    format!("{:.1}", rounded)
                }
            }
        }
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Case-insensitive; anything other than male/female is unrecognized.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" => Some(Self::Male),
            "female" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Qualitative fitness levels, declared from the lowest tier up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FitnessLevel {
    #[serde(rename = "Poor")]
    Poor,
    #[serde(rename = "Below Average")]
    BelowAverage,
    #[serde(rename = "Average")]
    Average,
    #[serde(rename = "Above Average")]
    AboveAverage,
    #[serde(rename = "Excellent")]
    Excellent,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl FitnessLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Poor => "Poor",
            Self::BelowAverage => "Below Average",
            Self::Average => "Average",
            Self::AboveAverage => "Above Average",
            Self::Excellent => "Excellent",
            Self::NotApplicable => "N/A",
        }
    }

    /// Position in the total order of graded levels. `None` for N/A.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Self::Poor => Some(0),
            Self::BelowAverage => Some(1),
            Self::Average => Some(2),
            Self::AboveAverage => Some(3),
            Self::Excellent => Some(4),
            Self::NotApplicable => None,
        }
    }
}

impl fmt::Display for FitnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive age range; `max: None` is open-ended upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: u32,
    pub max: Option<u32>,
}

impl AgeRange {
    pub fn contains(&self, age: u32) -> bool {
        age >= self.min && self.max.map_or(true, |max| age <= max)
    }

    pub fn overlaps(&self, other: &AgeRange) -> bool {
        let self_max = self.max.unwrap_or(u32::MAX);
        let other_max = other.max.unwrap_or(u32::MAX);
        self.min <= other_max && other.min <= self_max
    }
}

/// A measurement meeting or exceeding `threshold` earns `level`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub threshold: f64,
    pub level: FitnessLevel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationBand {
    pub exercise: Exercise,
    pub gender: Gender,
    pub ages: AgeRange,
    /// Descending by threshold.
    pub tiers: &'static [Tier],
    /// Label when no tier is met.
    pub floor: FitnessLevel,
}

const fn tier(threshold: f64, level: FitnessLevel) -> Tier {
    Tier { threshold, level }
}

const fn band(
    exercise: Exercise,
    gender: Gender,
    min: u32,
    max: Option<u32>,
    tiers: &'static [Tier],
    floor: FitnessLevel,
) -> ClassificationBand {
    ClassificationBand {
        exercise,
        gender,
        ages: AgeRange { min, max },
        tiers,
        floor,
    }
}

use Exercise::*;
use FitnessLevel::*;
use Gender::*;

// Push-ups: Excellent / Average over a Below Average floor.
const PUSHUP_M_14_17: &[Tier] = &[tier(35.0, Excellent), tier(18.0, Average)];
const PUSHUP_M_18_19: &[Tier] = &[tier(39.0, Excellent), tier(22.0, Average)];
const PUSHUP_M_20: &[Tier] = &[tier(30.0, Excellent), tier(17.0, Average)];
const PUSHUP_F_14_17: &[Tier] = &[tier(28.0, Excellent), tier(12.0, Average)];
const PUSHUP_F_18_19: &[Tier] = &[tier(33.0, Excellent), tier(15.0, Average)];
const PUSHUP_F_20: &[Tier] = &[tier(24.0, Excellent), tier(12.0, Average)];

// Sit-ups: President's Council norms, no band past 39.
const SITUP_M_16_19: &[Tier] = &[
    tier(45.0, Excellent),
    tier(36.0, AboveAverage),
    tier(29.0, Average),
];
const SITUP_M_20_29: &[Tier] = &[
    tier(49.0, Excellent),
    tier(40.0, AboveAverage),
    tier(34.0, Average),
];
const SITUP_M_30_39: &[Tier] = &[
    tier(41.0, Excellent),
    tier(33.0, AboveAverage),
    tier(27.0, Average),
];
const SITUP_F_16_19: &[Tier] = &[
    tier(42.0, Excellent),
    tier(32.0, AboveAverage),
    tier(25.0, Average),
];
const SITUP_F_20_29: &[Tier] = &[
    tier(44.0, Excellent),
    tier(36.0, AboveAverage),
    tier(28.0, Average),
];
const SITUP_F_30_39: &[Tier] = &[
    tier(38.0, Excellent),
    tier(30.0, AboveAverage),
    tier(24.0, Average),
];

// Vertical jump (cm): four tiers over an explicit Poor floor.
const JUMP_M_16_19: &[Tier] = &[
    tier(65.0, Excellent),
    tier(50.0, AboveAverage),
    tier(40.0, Average),
    tier(30.0, BelowAverage),
];
const JUMP_M_20: &[Tier] = &[
    tier(70.0, Excellent),
    tier(56.0, AboveAverage),
    tier(41.0, Average),
    tier(31.0, BelowAverage),
];
const JUMP_F_16_19: &[Tier] = &[
    tier(58.0, Excellent),
    tier(47.0, AboveAverage),
    tier(36.0, Average),
    tier(26.0, BelowAverage),
];
const JUMP_F_20: &[Tier] = &[
    tier(60.0, Excellent),
    tier(46.0, AboveAverage),
    tier(31.0, Average),
    tier(21.0, BelowAverage),
];

// Sit-and-reach (cm): younger-adult norms only.
const REACH_M_16_19: &[Tier] = &[
    tier(25.0, Excellent),
    tier(20.0, AboveAverage),
    tier(15.0, Average),
];
const REACH_M_20_30: &[Tier] = &[
    tier(20.0, Excellent),
    tier(15.0, AboveAverage),
    tier(10.0, Average),
];
const REACH_F_16_19: &[Tier] = &[
    tier(30.0, Excellent),
    tier(25.0, AboveAverage),
    tier(20.0, Average),
];
const REACH_F_20_30: &[Tier] = &[
    tier(25.0, Excellent),
    tier(20.0, AboveAverage),
    tier(15.0, Average),
];

pub static BANDS: &[ClassificationBand] = &[
    band(PushUp, Male, 14, Some(17), PUSHUP_M_14_17, BelowAverage),
    band(PushUp, Male, 18, Some(19), PUSHUP_M_18_19, BelowAverage),
    band(PushUp, Male, 20, None, PUSHUP_M_20, BelowAverage),
    band(PushUp, Female, 14, Some(17), PUSHUP_F_14_17, BelowAverage),
    band(PushUp, Female, 18, Some(19), PUSHUP_F_18_19, BelowAverage),
    band(PushUp, Female, 20, None, PUSHUP_F_20, BelowAverage),
    band(SitUp, Male, 16, Some(19), SITUP_M_16_19, BelowAverage),
    band(SitUp, Male, 20, Some(29), SITUP_M_20_29, BelowAverage),
    band(SitUp, Male, 30, Some(39), SITUP_M_30_39, BelowAverage),
    band(SitUp, Female, 16, Some(19), SITUP_F_16_19, BelowAverage),
    band(SitUp, Female, 20, Some(29), SITUP_F_20_29, BelowAverage),
    band(SitUp, Female, 30, Some(39), SITUP_F_30_39, BelowAverage),
    band(VerticalJump, Male, 16, Some(19), JUMP_M_16_19, Poor),
    band(VerticalJump, Male, 20, None, JUMP_M_20, Poor),
    band(VerticalJump, Female, 16, Some(19), JUMP_F_16_19, Poor),
    band(VerticalJump, Female, 20, None, JUMP_F_20, Poor),
    band(SitAndReach, Male, 16, Some(19), REACH_M_16_19, BelowAverage),
    band(SitAndReach, Male, 20, Some(30), REACH_M_20_30, BelowAverage),
    band(SitAndReach, Female, 16, Some(19), REACH_F_16_19, BelowAverage),
    band(SitAndReach, Female, 20, Some(30), REACH_F_20_30, BelowAverage),
];

/// All bands defined for one exercise, in table order.
pub fn bands_for(exercise: Exercise) -> impl Iterator<Item = &'static ClassificationBand> {
    BANDS.iter().filter(move |b| b.exercise == exercise)
}

/// The band covering (exercise, gender, age), or `None` if uncovered.
pub fn find_band(
    exercise: Exercise,
    gender: Gender,
    age: u32,
) -> Option<&'static ClassificationBand> {
    bands_for(exercise).find(|b| b.gender == gender && b.ages.contains(age))
}
