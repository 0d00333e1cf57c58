//! Partitions of microstate collections.

use crate::conformer::ConformerRegistry;
use crate::error::Result;
use crate::model::Microstate;
use std::collections::HashSet;

/// Split microstates into energy bands whose lower boundaries are `boundaries`.
///
/// Band `i` holds energies in `[b_i, b_{i+1})` of the sorted boundaries, the
/// last band being open-ended. Microstates below the lowest boundary are dropped.
pub fn by_energy<'a, I>(microstates: I, boundaries: &[f64]) -> Vec<Vec<&'a Microstate>>
where
    I: IntoIterator<Item = &'a Microstate>,
{
    let mut ticks = boundaries.to_vec();
    ticks.sort_by(f64::total_cmp);

    let mut bands = vec![Vec::new(); ticks.len()];
    for ms in microstates {
        let n_below = ticks.partition_point(|&tick| tick <= ms.energy());
        if n_below > 0 {
            bands[n_below - 1].push(ms);
        }
    }
    bands
}

/// `n` equal-width lower band boundaries covering `[min, max]`, starting at `min`.
pub fn energy_ticks(min: f64, max: f64, n: usize) -> Vec<f64> {
    let step = (max - min) / n as f64;
    (0..n).map(|i| min + step * i as f64).collect()
}

/// Split microstates into those containing any of `conformers` and the rest.
pub fn by_conformer_membership<'a, I>(
    microstates: I,
    conformers: &[usize],
) -> (Vec<&'a Microstate>, Vec<&'a Microstate>)
where
    I: IntoIterator<Item = &'a Microstate>,
{
    let conformers: HashSet<_> = conformers.iter().copied().collect();
    microstates
        .into_iter()
        .partition(|ms| ms.state().iter().any(|conf| conformers.contains(conf)))
}

/// Split microstates by conformer id fragments.
///
/// A microstate is selected when every fragment is a substring of the id of
/// at least one of its conformers.
pub fn by_conformer_id_substring<'a, I, S>(
    microstates: I,
    fragments: &[S],
    registry: &ConformerRegistry,
) -> Result<(Vec<&'a Microstate>, Vec<&'a Microstate>)>
where
    I: IntoIterator<Item = &'a Microstate>,
    S: AsRef<str>,
{
    registry.ensure_loaded()?;

    let mut selected = Vec::new();
    let mut rest = Vec::new();
    for ms in microstates {
        let ids = ms
            .state()
            .iter()
            .map(|&conf| registry.get(conf).map(|c| c.id.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let matched = fragments
            .iter()
            .all(|fragment| ids.iter().any(|id| id.contains(fragment.as_ref())));
        if matched {
            selected.push(ms);
        } else {
            rest.push(ms);
        }
    }
    Ok((selected, rest))
}
