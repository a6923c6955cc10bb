use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse language-skill tier that parameterizes generated reply complexity.
///
/// Chosen once per session before voice input is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProficiencyLevel {
    A1,
    A2,
    B1,
}

impl ProficiencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::B1 => "B1",
        }
    }
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProficiencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(Self::A1),
            "A2" => Ok(Self::A2),
            "B1" => Ok(Self::B1),
            other => Err(format!("unknown proficiency level: {other}")),
        }
    }
}
