//! Differences between two groups of microstates.

use crate::error::Result;
use crate::model::Microstate;
use crate::occupancy::occupancy;
use std::collections::BTreeMap;

/// Distance reported for distributions that cannot be compared or do not overlap.
pub const D_MAX: f64 = 10000.0;

/// Occupancy change of each conformer from `group1` to `group2`.
///
/// Conformers absent from one group count as zero occupancy there.
pub fn occupancy_delta<'a, I, J>(group1: I, group2: J) -> Result<BTreeMap<usize, f64>>
where
    I: IntoIterator<Item = &'a Microstate>,
    J: IntoIterator<Item = &'a Microstate>,
{
    let occ1 = occupancy(group1)?;
    let occ2 = occupancy(group2)?;

    let mut delta: BTreeMap<_, _> = occ2.into_iter().collect();
    for (conf, p1) in occ1 {
        *delta.entry(conf).or_insert(0.0) -= p1;
    }
    Ok(delta)
}

/// Bhattacharyya distance between two non-negative weight vectors.
///
/// Both vectors are normalized first. Vectors of different length, without
/// weight, or with vanishing overlap give [`D_MAX`].
pub fn bhattacharyya_distance(p: &[f64], q: &[f64]) -> f64 {
    if p.len() != q.len() {
        return D_MAX;
    }
    let p_sum: f64 = p.iter().sum();
    let q_sum: f64 = q.iter().sum();
    if p_sum <= 0.0 || q_sum <= 0.0 {
        return D_MAX;
    }

    let bc: f64 = p
        .iter()
        .zip(q)
        .map(|(pi, qi)| ((pi / p_sum) * (qi / q_sum)).sqrt())
        .sum();
    if bc <= (-D_MAX).exp() {
        D_MAX
    } else {
        -bc.ln()
    }
}

/// Bhattacharyya distance between the conformer occupancies of each free
/// residue position in two groups.
pub fn residue_distance<'a, I, J>(
    group1: I,
    group2: J,
    positions: &[Vec<usize>],
) -> Result<Vec<f64>>
where
    I: IntoIterator<Item = &'a Microstate>,
    J: IntoIterator<Item = &'a Microstate>,
{
    let occ1 = occupancy(group1)?;
    let occ2 = occupancy(group2)?;
    let restrict = |occ: &BTreeMap<usize, f64>, group: &[usize]| -> Vec<f64> {
        group
            .iter()
            .map(|conf| occ.get(conf).copied().unwrap_or(0.0))
            .collect()
    };

    Ok(positions
        .iter()
        .map(|group| bhattacharyya_distance(&restrict(&occ1, group), &restrict(&occ2, group)))
        .collect())
}
