use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a publication table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BreakdownKind {
    Headline,
    AgeGender,
    RegistrationGeography,
    ResidenceGeography,
}

impl BreakdownKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakdownKind::Headline => "headline",
            BreakdownKind::AgeGender => "age_gen",
            BreakdownKind::RegistrationGeography => "reg_geog",
            BreakdownKind::ResidenceGeography => "res_geog",
        }
    }
}

impl fmt::Display for BreakdownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
