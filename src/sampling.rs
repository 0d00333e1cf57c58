//! Count-weighted sub-sampling of a microstate store.

use crate::error::{Error, Result};
use crate::model::Microstate;
use crate::stats::{SortKey, sort_microstates};
use crate::store::MicrostateStore;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Sampling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SampleKind {
    /// Evenly spaced positions along the cumulative count of the sorted microstates.
    Deterministic,
    /// Uniform random draws, reproducible for a given seed.
    Random,
}

impl SampleKind {
    pub fn name(self) -> &'static str {
        match self {
            SampleKind::Deterministic => "deterministic",
            SampleKind::Random => "random",
        }
    }
}

impl FromStr for SampleKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "deterministic" => Ok(SampleKind::Deterministic),
            "random" => Ok(SampleKind::Random),
            other => Err(Error::InvalidArgument(format!(
                "sample kind must be 'deterministic' or 'random', but is '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for SampleKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<SampleKind> for String {
    fn from(kind: SampleKind) -> Self {
        kind.name().to_string()
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleParams {
    pub size: usize,
    pub kind: SampleKind,
    /// Sort key, only used by deterministic sampling.
    pub sort_by: SortKey,
    /// Sort direction, only used by deterministic sampling.
    #[serde(default)]
    pub reverse: bool,
    /// Seed for random sampling; drawn from the thread RNG when absent.
    pub seed: Option<u64>,
}

/// A selected microstate and its index in the sequence it was selected from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample<'a> {
    pub rank: usize,
    pub microstate: &'a Microstate,
}

/// Select up to `params.size` microstates, weighting each by its count.
///
/// Deterministic sampling sorts the store and picks evenly spaced positions
/// along the cumulative count. Random sampling draws integers in
/// `[0, unique_count]` and resolves them against the cumulative count in
/// store order. Both may select the same microstate several times.
/// Positions at or past the total count select nothing, so fewer than
/// `params.size` samples come back when the request outgrows the store.
pub fn sample<'a>(store: &'a MicrostateStore, params: &SampleParams) -> Result<Vec<Sample<'a>>> {
    if store.is_empty() {
        log::warn!("microstate store is empty, nothing to sample");
        return Ok(Vec::new());
    }
    if params.size == 0 {
        return Ok(Vec::new());
    }

    let (sequence, positions) = match params.kind {
        SampleKind::Deterministic => {
            let sequence = sort_microstates(store.microstates(), params.sort_by, params.reverse);
            let positions = stratified_positions(store.total_count()?, params.size);
            (sequence, positions)
        }
        SampleKind::Random => {
            let sequence: Vec<_> = store.microstates().iter().collect();
            let positions = random_positions(store.unique_count()?, params.size, params.seed)?;
            (sequence, positions)
        }
    };

    let cumulative = cumulative_counts(&sequence);
    let samples = positions
        .into_iter()
        .filter_map(|pos| {
            let rank = select(&cumulative, pos)?;
            Some(Sample {
                rank,
                microstate: sequence[rank],
            })
        })
        .collect();
    Ok(samples)
}

/// Positions `size + k (total - 2 size) / size` for `k` in `0..size`.
fn stratified_positions(total_count: u64, size: usize) -> Vec<f64> {
    let total = total_count as f64;
    let size_f = size as f64;
    let step = (total - 2.0 * size_f) / size_f;
    (0..size).map(|k| size_f + k as f64 * step).collect()
}

fn random_positions(unique_count: usize, size: usize, seed: Option<u64>) -> Result<Vec<f64>> {
    let mut rng = match seed {
        Some(seed) => ChaCha12Rng::seed_from_u64(seed),
        None => ChaCha12Rng::from_rng(&mut rand::rng()),
    };
    let dist = Uniform::new_inclusive(0, unique_count as u64)
        .map_err(|err| Error::InvalidArgument(format!("invalid draw range: {err}")))?;
    Ok((0..size).map(|_| dist.sample(&mut rng) as f64).collect())
}

fn cumulative_counts(sequence: &[&Microstate]) -> Vec<u64> {
    sequence
        .iter()
        .scan(0, |sum, ms| {
            *sum += ms.count();
            Some(*sum)
        })
        .collect()
}

/// Index of the first cumulative count strictly greater than `pos`.
///
/// Negative positions resolve to the first microstate, positions at or past
/// the total count to none.
fn select(cumulative: &[u64], pos: f64) -> Option<usize> {
    let idx = cumulative.partition_point(|&c| c as f64 <= pos);
    (idx < cumulative.len()).then_some(idx)
}
