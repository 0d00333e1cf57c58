use crate::error::{Error, Result};
use crate::model::Microstate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Microstate attribute used as a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SortKey {
    Energy,
    Count,
}

impl SortKey {
    const TABLE: [(SortKey, &'static str, fn(&Microstate) -> f64); 2] = [
        (SortKey::Energy, "energy", Microstate::energy),
        (SortKey::Count, "count", count_value),
    ];

    fn entry(self) -> (&'static str, fn(&Microstate) -> f64) {
        let (_, name, accessor) = Self::TABLE[self as usize];
        (name, accessor)
    }

    pub fn name(self) -> &'static str {
        self.entry().0
    }

    /// Value of this attribute for a microstate.
    pub fn value(self, ms: &Microstate) -> f64 {
        (self.entry().1)(ms)
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase();
        Self::TABLE
            .iter()
            .find(|(_, name, _)| *name == s)
            .map(|&(key, _, _)| key)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "sort key must be 'energy' or 'count', but is '{s}'"
                ))
            })
    }
}

impl TryFrom<String> for SortKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.name().to_string()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn count_value(ms: &Microstate) -> f64 {
    ms.count() as f64
}

/// Sort microstates by `key`.
///
/// The sort is stable in both directions: microstates with equal keys keep
/// their input order.
pub fn sort_microstates<'a, I>(microstates: I, key: SortKey, reverse: bool) -> Vec<&'a Microstate>
where
    I: IntoIterator<Item = &'a Microstate>,
{
    let mut sorted: Vec<_> = microstates.into_iter().collect();
    if reverse {
        sorted.sort_by(|a, b| key.value(b).total_cmp(&key.value(a)));
    } else {
        sorted.sort_by(|a, b| key.value(a).total_cmp(&key.value(b)));
    }
    sorted
}

/// Lowest, count-weighted average and highest energy of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyStat {
    pub min: f64,
    pub average: f64,
    pub max: f64,
}

/// Running energy extrema and count-weighted mean.
pub struct EnergyAccumulator {
    weight_sum: u64,
    mean: f64,
    min: f64,
    max: f64,
}

impl EnergyAccumulator {
    pub fn new() -> Self {
        Self {
            weight_sum: 0,
            mean: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, ms: &Microstate) {
        self.weight_sum += ms.count();

        let diff = ms.energy() - self.mean;
        self.mean += diff * ms.count() as f64 / self.weight_sum as f64;

        self.min = self.min.min(ms.energy());
        self.max = self.max.max(ms.energy());
    }

    pub fn weight_sum(&self) -> u64 {
        self.weight_sum
    }

    pub fn report(&self) -> Option<EnergyStat> {
        if self.weight_sum == 0 {
            return None;
        }
        Some(EnergyStat {
            min: self.min,
            average: self.mean,
            max: self.max,
        })
    }
}

impl Default for EnergyAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Energy statistics of a non-empty collection of microstates.
pub fn energy_stat<'a, I>(microstates: I) -> Result<EnergyStat>
where
    I: IntoIterator<Item = &'a Microstate>,
{
    let mut acc = EnergyAccumulator::new();
    for ms in microstates {
        acc.add(ms);
    }
    acc.report().ok_or(Error::EmptyInput)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection() -> Vec<Microstate> {
        vec![
            Microstate::new(vec![3, 5], -2.0, 1),
            Microstate::new(vec![4, 5], -5.0, 3),
            Microstate::new(vec![3, 6], -2.0, 4),
            Microstate::new(vec![4, 6], 1.0, 3),
        ]
    }

    #[test]
    fn parses_sort_keys() {
        assert_eq!("Energy".parse::<SortKey>().unwrap(), SortKey::Energy);
        assert_eq!(" count ".parse::<SortKey>().unwrap(), SortKey::Count);
        assert!(matches!(
            "stateid".parse::<SortKey>(),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(SortKey::Count.to_string(), "count");
    }

    #[test]
    fn sort_is_stable_both_ways() {
        let microstates = collection();

        let sorted = sort_microstates(&microstates, SortKey::Energy, false);
        let energies: Vec<_> = sorted.iter().map(|ms| ms.energy()).collect();
        assert_eq!(energies, vec![-5.0, -2.0, -2.0, 1.0]);
        assert_eq!(sorted[1].state(), &[3, 5]);
        assert_eq!(sorted[2].state(), &[3, 6]);

        let sorted = sort_microstates(&microstates, SortKey::Count, true);
        let counts: Vec<_> = sorted.iter().map(|ms| ms.count()).collect();
        assert_eq!(counts, vec![4, 3, 3, 1]);
        assert_eq!(sorted[1].state(), &[4, 5]);
        assert_eq!(sorted[2].state(), &[4, 6]);
    }

    #[test]
    fn weighted_energy_stat() {
        let stat = energy_stat(&collection()).unwrap();
        assert_eq!(stat.min, -5.0);
        assert_eq!(stat.max, 1.0);
        let expected = (-2.0 - 15.0 - 8.0 + 3.0) / 11.0;
        assert!((stat.average - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_energy_stat() {
        assert!(matches!(energy_stat(&Vec::new()), Err(Error::EmptyInput)));
    }
}
