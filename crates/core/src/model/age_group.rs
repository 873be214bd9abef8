use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::DifficultyConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AgeGroupError {
    #[error("unknown age group: {0:?} (expected 3-5, 6-8 or 9-12)")]
    Unknown(String),
}

/// Age band a learner practices in.
///
/// Persisted and exported by its id (`"3-5"`, `"6-8"`, `"9-12"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "3-5")]
    Preschool,
    #[serde(rename = "6-8")]
    ElementaryLow,
    #[serde(rename = "9-12")]
    ElementaryHigh,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 3] = [
        AgeGroup::Preschool,
        AgeGroup::ElementaryLow,
        AgeGroup::ElementaryHigh,
    ];

    /// Stable id used in storage keys and export documents.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            AgeGroup::Preschool => "3-5",
            AgeGroup::ElementaryLow => "6-8",
            AgeGroup::ElementaryHigh => "9-12",
        }
    }

    /// Number of questions in a regular practice session for this band.
    #[must_use]
    pub fn default_session_length(self) -> u32 {
        match self {
            AgeGroup::Preschool => 10,
            AgeGroup::ElementaryLow => 15,
            AgeGroup::ElementaryHigh => 20,
        }
    }

    #[must_use]
    pub fn difficulty_config(self) -> &'static DifficultyConfig {
        DifficultyConfig::for_age_group(self)
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AgeGroup {
    type Err = AgeGroupError;

    /// Accepts the storage id or a kebab-case band name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "3-5" | "preschool" => Ok(AgeGroup::Preschool),
            "6-8" | "elementary-low" => Ok(AgeGroup::ElementaryLow),
            "9-12" | "elementary-high" => Ok(AgeGroup::ElementaryHigh),
            _ => Err(AgeGroupError::Unknown(s.to_owned())),
        }
    }
}
