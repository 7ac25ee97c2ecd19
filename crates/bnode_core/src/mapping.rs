use crate::error::{AlignError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Confidence class of a matched pair.
///
/// Ordered by confidence: `ExactComponent > Exact > Best(r) > Nearest`, with
/// `Best` ordered by the number of verified hops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// The whole blank component was co-traversed and verified.
    ExactComponent,
    /// No divergence up to the radius, but the component was not closed.
    Exact,
    /// Diverged after `r` verified hops.
    Best(u32),
    /// Residual pairing by signature dissimilarity.
    Nearest,
}

impl Tier {
    fn rank(self) -> (u8, u32) {
        match self {
            Tier::Nearest => (0, 0),
            Tier::Best(r) => (1, r),
            Tier::Exact => (2, 0),
            Tier::ExactComponent => (3, 0),
        }
    }
}

impl Ord for Tier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for Tier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::ExactComponent => f.write_str("exact-component"),
            Tier::Exact => f.write_str("exact"),
            Tier::Best(r) => write!(f, "best-{r}"),
            Tier::Nearest => f.write_str("nearest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub target: String,
    pub tier: Tier,
}

/// Partial injective correspondence from blank IRIs of graph A to blank IRIs of graph B.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    forward: BTreeMap<String, Assignment>,
    backward: HashMap<String, String>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `a -> b`. Either side already being mapped is an internal fault.
    pub fn insert(&mut self, a: &str, b: &str, tier: Tier) -> Result<()> {
        if self.forward.contains_key(a) || self.backward.contains_key(b) {
            return Err(AlignError::NotInjective {
                a: a.to_string(),
                b: b.to_string(),
            });
        }
        self.backward.insert(b.to_string(), a.to_string());
        self.forward.insert(
            a.to_string(),
            Assignment {
                target: b.to_string(),
                tier,
            },
        );
        Ok(())
    }

    pub fn get(&self, a: &str) -> Option<&str> {
        self.forward.get(a).map(|asg| asg.target.as_str())
    }

    /// The A-side IRI mapped onto `b`, if any.
    pub fn source_of(&self, b: &str) -> Option<&str> {
        self.backward.get(b).map(String::as_str)
    }

    pub fn tier(&self, a: &str) -> Option<Tier> {
        self.forward.get(a).map(|asg| asg.tier)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Pairs ordered by A-side IRI.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, Tier)> {
        self.forward
            .iter()
            .map(|(a, asg)| (a.as_str(), asg.target.as_str(), asg.tier))
    }

    /// The same correspondence read from B to A, tiers preserved.
    pub fn inverse(&self) -> Mapping {
        let mut inverse = Mapping::new();
        for (a, asg) in &self.forward {
            inverse.backward.insert(a.clone(), asg.target.clone());
            inverse.forward.insert(
                asg.target.clone(),
                Assignment {
                    target: a.clone(),
                    tier: asg.tier,
                },
            );
        }
        inverse
    }

    /// Number of pairs per tier, highest confidence first.
    pub fn tier_counts(&self) -> BTreeMap<std::cmp::Reverse<Tier>, usize> {
        let mut counts = BTreeMap::new();
        for asg in self.forward.values() {
            *counts.entry(std::cmp::Reverse(asg.tier)).or_insert(0) += 1;
        }
        counts
    }
}

/// Result of one matching run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchReport {
    pub mapping: Mapping,
    /// A-side blank nodes left without a partner because B ran out.
    pub unmatched_a: Vec<String>,
    /// B-side blank nodes no A node was mapped to.
    pub unmatched_b: Vec<String>,
}

impl MatchReport {
    /// True when every A-side blank node received a partner.
    pub fn is_complete(&self) -> bool {
        self.unmatched_a.is_empty()
    }
}
