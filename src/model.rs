use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One sampled assignment of conformers to every free residue position.
///
/// Equality and ordering compare the `(state, energy, count)` tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Microstate {
    state: Vec<usize>,

    energy: f64,

    count: u64,
}

impl Microstate {
    pub fn new(state: Vec<usize>, energy: f64, count: u64) -> Self {
        Self {
            state,
            energy,
            count,
        }
    }

    /// Conformer index occupying each free residue position.
    pub fn state(&self) -> &[usize] {
        &self.state
    }

    pub fn energy(&self) -> f64 {
        self.energy
    }

    /// Number of times this microstate was observed.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn contains(&self, conformer: usize) -> bool {
        self.state.contains(&conformer)
    }
}

impl PartialOrd for Microstate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.state.cmp(&other.state) {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
        match self.energy.partial_cmp(&other.energy)? {
            Ordering::Equal => {}
            ord => return Some(ord),
        }
        Some(self.count.cmp(&other.count))
    }
}

/// Total number of observations in a collection of microstates.
pub fn total_count<'a, I>(microstates: I) -> u64
where
    I: IntoIterator<Item = &'a Microstate>,
{
    microstates.into_iter().map(Microstate::count).sum()
}
