//! Supported model profiles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named bundle of detector + recognizer weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelProfile {
    /// ResNet-50 recognizer, 10 GFLOP detector (default)
    #[default]
    #[serde(rename = "buffalo_l")]
    BuffaloL,
    /// MobileFaceNet recognizer, 500 MFLOP detector
    #[serde(rename = "buffalo_sc")]
    BuffaloSc,
    /// ResNet-100 recognizer trained on Glint360K
    #[serde(rename = "antelopev2")]
    AntelopeV2,
}

impl ModelProfile {
    pub const ALL: [ModelProfile; 3] = [
        ModelProfile::BuffaloL,
        ModelProfile::BuffaloSc,
        ModelProfile::AntelopeV2,
    ];

    /// Identifier used on the command line, in config files and in reports
    pub fn name(&self) -> &'static str {
        match self {
            ModelProfile::BuffaloL => "buffalo_l",
            ModelProfile::BuffaloSc => "buffalo_sc",
            ModelProfile::AntelopeV2 => "antelopev2",
        }
    }

    /// Get a human-readable description of the profile
    pub fn description(&self) -> &'static str {
        match self {
            ModelProfile::BuffaloL => "Accurate general-purpose profile (SCRFD-10G + ResNet-50)",
            ModelProfile::BuffaloSc => "Lightweight profile (SCRFD-500M + MobileFaceNet)",
            ModelProfile::AntelopeV2 => "High-accuracy profile (SCRFD-10G + ResNet-100)",
        }
    }
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelProfile::ALL
            .into_iter()
            .find(|profile| profile.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let supported: Vec<_> = ModelProfile::ALL.iter().map(|p| p.name()).collect();
                format!("unknown model '{}' (supported: {})", s, supported.join(", "))
            })
    }
}
