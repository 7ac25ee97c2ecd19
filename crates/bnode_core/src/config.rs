//! Matching configuration.

use crate::error::{AlignError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum hop depth explored before an exact structural match is downgraded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Radius {
    Hops(u32),
    #[default]
    Unbounded,
}

impl Radius {
    pub fn hops(n: u32) -> Result<Self> {
        if n == 0 {
            return Err(AlignError::InvalidRadius);
        }
        Ok(Radius::Hops(n))
    }

    /// Whether a traversal that has reached `depth` hops has exhausted the radius.
    pub fn is_reached(self, depth: u32) -> bool {
        match self {
            Radius::Hops(r) => depth >= r,
            Radius::Unbounded => false,
        }
    }

    /// Recursion bound for the neighbour comparator.
    pub fn depth_limit(self) -> Option<usize> {
        match self {
            Radius::Hops(r) => Some(r as usize),
            Radius::Unbounded => None,
        }
    }
}

impl fmt::Display for Radius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Radius::Hops(r) => write!(f, "{r}"),
            Radius::Unbounded => f.write_str("inf"),
        }
    }
}

impl FromStr for Radius {
    type Err = AlignError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "inf" | "unbounded" | "∞" => Ok(Radius::Unbounded),
            other => {
                let hops = other
                    .parse::<u32>()
                    .map_err(|_| AlignError::RadiusSyntax(other.to_string()))?;
                Radius::hops(hops)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(default)]
    pub radius: Radius,
}

impl MatchConfig {
    pub fn with_radius(radius: Radius) -> Self {
        Self { radius }
    }

    /// Validate before starting a run.
    pub fn validate(&self) -> Result<()> {
        if self.radius == Radius::Hops(0) {
            return Err(AlignError::InvalidRadius);
        }
        Ok(())
    }
}
