use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::types::ProblemRecord;

/// First difficulty that counts as Hard
pub const HARD_BAR: u32 = 1501;
/// First difficulty excluded from both reported tiers
pub const NON_BAR: u32 = 2701;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Easy,
    Hard,
}

impl Tier {
    /// Bucket a difficulty rating; ratings at or above `NON_BAR` are not reported
    pub fn for_difficulty(difficulty: u32) -> Option<Tier> {
        match difficulty {
            d if d < HARD_BAR => Some(Tier::Easy),
            d if d < NON_BAR => Some(Tier::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Easy => write!(f, "Easy"),
            Tier::Hard => write!(f, "Hard"),
        }
    }
}

/// Running count of distinct solved problems.
///
/// Only the first solved record of a problem is counted, together with the
/// difficulty it carried. Records must be fed in arrival order.
#[derive(Debug, Clone, Default)]
pub struct SolveTally {
    counted: HashSet<String>,
    tiers: BTreeMap<Tier, usize>,
    unranked: usize,
}

impl SolveTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record in. Returns true if it added a newly solved problem.
    pub fn record(&mut self, record: &ProblemRecord) -> bool {
        if !record.is_solved() || self.counted.contains(&record.src_uid) {
            return false;
        }
        self.counted.insert(record.src_uid.clone());

        match Tier::for_difficulty(record.difficulty) {
            Some(tier) => *self.tiers.entry(tier).or_default() += 1,
            None => self.unranked += 1,
        }
        true
    }

    /// Reduce a stream of records into this tally and hand it back
    pub fn reduce<'a, I>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = &'a ProblemRecord>,
    {
        for record in records {
            self.record(record);
        }
        self
    }

    pub fn count(&self, tier: Tier) -> usize {
        self.tiers.get(&tier).copied().unwrap_or(0)
    }

    /// Distinct solved problems, including those above the reported tiers
    pub fn solved(&self) -> usize {
        self.counted.len()
    }

    pub fn unranked(&self) -> usize {
        self.unranked
    }

    pub fn is_counted(&self, src_uid: &str) -> bool {
        self.counted.contains(src_uid)
    }
}

impl fmt::Display for SolveTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Easy: {} Hard: {}",
            self.count(Tier::Easy),
            self.count(Tier::Hard)
        )
    }
}
