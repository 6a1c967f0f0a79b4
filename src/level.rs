//! The three-step scale shared by sensitivity levels and trust scores.
//!
//! Declaration order is the total order `Low < Moderate < High`, and the
//! ordinal codes `0, 1, 2` match the codes the trust model was trained on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Level {
    Low,
    Moderate,
    High,
}

/// Sensitivity of a value or a whole request
pub type SensitivityLevel = Level;

/// Requester trust predicted from email, domain and purpose
pub type TrustScore = Level;

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Moderate, Level::High];

    /// Canonical spelling; `Medium` is never emitted
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Low => "Low",
            Level::Moderate => "Moderate",
            Level::High => "High",
        }
    }

    pub fn ordinal(&self) -> u8 {
        match self {
            Level::Low => 0,
            Level::Moderate => 1,
            Level::High => 2,
        }
    }

    pub fn from_ordinal(code: u8) -> Option<Level> {
        match code {
            0 => Some(Level::Low),
            1 => Some(Level::Moderate),
            2 => Some(Level::High),
            _ => None,
        }
    }

    /// Overall level of a set: High if any High, else Moderate if any
    /// Moderate, else Low. The empty set is Low.
    pub fn aggregate<I>(levels: I) -> Level
    where
        I: IntoIterator<Item = Level>,
    {
        levels.into_iter().max().unwrap_or(Level::Low)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Level::Low),
            "moderate" | "medium" => Ok(Level::Moderate),
            "high" => Ok(Level::High),
            other => Err(PipelineError::Configuration(format!(
                "unrecognised level '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_order() {
        assert!(Level::Low < Level::Moderate);
        assert!(Level::Moderate < Level::High);
        assert_eq!(Level::Low.max(Level::High), Level::High);
    }

    #[test]
    fn test_medium_is_moderate() {
        assert_eq!("Medium".parse::<Level>().unwrap(), Level::Moderate);
        assert_eq!(" moderate ".parse::<Level>().unwrap(), Level::Moderate);
        assert_eq!(Level::Moderate.to_string(), "Moderate");
        assert!("Severe".parse::<Level>().is_err());
    }

    #[test]
    fn test_aggregate() {
        use Level::*;
        assert_eq!(Level::aggregate([Low, Moderate, Low]), Moderate);
        assert_eq!(Level::aggregate([Low, Low]), Low);
        assert_eq!(Level::aggregate([Low, High, Moderate]), High);
        assert_eq!(Level::aggregate(Vec::new()), Low);
    }

    #[test]
    fn test_ordinals_round_trip_through_codes() {
        for level in Level::ALL {
            assert_eq!(Level::from_ordinal(level.ordinal()), Some(level));
        }
        assert_eq!(Level::from_ordinal(3), None);
    }

    #[test]
    fn test_serde_accepts_synonym() {
        let level: Level = serde_json::from_str("\"Medium\"").unwrap();
        assert_eq!(level, Level::Moderate);
        assert_eq!(serde_json::to_string(&Level::High).unwrap(), "\"High\"");
    }
}
