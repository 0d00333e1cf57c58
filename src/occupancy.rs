//! Conformer occupancies, residue charges and Boltzmann weights.

use crate::conformer::ConformerRegistry;
use crate::error::{Error, Result};
use crate::model::{Microstate, total_count};
use crate::store::MicrostateStore;
use std::collections::{BTreeMap, HashMap};

/// Conversion factor from kcal/mol to kT at room temperature.
pub const KCAL_TO_KT: f64 = 1.688;
/// Free energy in kcal/mol of one pH unit at room temperature.
pub const PH_TO_KCAL: f64 = 1.364;

/// Count-weighted fraction of observations in which each conformer appears.
///
/// Every microstate contributes once per position, so fractions of all
/// conformers sum to the number of positions, not to 1.
pub fn occupancy<'a, I>(microstates: I) -> Result<BTreeMap<usize, f64>>
where
    I: IntoIterator<Item = &'a Microstate>,
{
    let mut counts: BTreeMap<usize, u64> = BTreeMap::new();
    let mut n_obs = 0;
    for ms in microstates {
        n_obs += ms.count();
        for &conf in ms.state() {
            *counts.entry(conf).or_default() += ms.count();
        }
    }
    if n_obs == 0 {
        return Err(Error::EmptyInput);
    }

    Ok(counts
        .into_iter()
        .map(|(conf, count)| (conf, count as f64 / n_obs as f64))
        .collect())
}

/// Count-weighted average charge of each free residue position.
pub fn residue_charge<'a, I>(
    microstates: I,
    positions: &[Vec<usize>],
    registry: &ConformerRegistry,
) -> Result<Vec<f64>>
where
    I: IntoIterator<Item = &'a Microstate>,
{
    registry.ensure_loaded()?;

    let mut conf_to_pos = HashMap::new();
    for (i_pos, group) in positions.iter().enumerate() {
        for &conf in group {
            if let Some(other) = conf_to_pos.insert(conf, i_pos) {
                return Err(Error::Consistency(format!(
                    "conformer {conf} belongs to positions {other} and {i_pos}"
                )));
            }
        }
    }

    let mut charge_sums = vec![0.0; positions.len()];
    let mut n_obs = 0;
    for ms in microstates {
        n_obs += ms.count();
        for &conf in ms.state() {
            let i_pos = conf_to_pos.get(&conf).ok_or_else(|| {
                Error::Consistency(format!("conformer {conf} is not in any free position"))
            })?;
            charge_sums[*i_pos] += registry.charge(conf)? * ms.count() as f64;
        }
    }
    if n_obs == 0 {
        return Err(Error::EmptyInput);
    }

    Ok(charge_sums
        .into_iter()
        .map(|sum| sum / n_obs as f64)
        .collect())
}

/// Net charge of the free conformers of a microstate.
pub fn microstate_charge(ms: &Microstate, registry: &ConformerRegistry) -> Result<f64> {
    ms.state().iter().map(|&conf| registry.charge(conf)).sum()
}

/// Count-weighted average microstate charge of a collection.
pub fn average_charge<'a, I>(microstates: I, registry: &ConformerRegistry) -> Result<f64>
where
    I: IntoIterator<Item = &'a Microstate> + Clone,
{
    let n_obs = total_count(microstates.clone());
    if n_obs == 0 {
        return Err(Error::EmptyInput);
    }
    let mut charge_sum = 0.0;
    for ms in microstates {
        charge_sum += microstate_charge(ms, registry)? * ms.count() as f64;
    }
    Ok(charge_sum / n_obs as f64)
}

/// Constant background charge of the fixed conformers.
pub fn fixed_charge(store: &MicrostateStore, registry: &ConformerRegistry) -> Result<f64> {
    registry.ensure_loaded()?;
    store
        .fixed_conformers()
        .iter()
        .map(|&conf| registry.charge(conf))
        .sum()
}

/// Boltzmann probabilities of `energies` at inverse thermal energy `beta`.
///
/// Energies are shifted by their minimum before exponentiation.
pub fn boltzmann_occupancy(energies: &[f64], beta: f64) -> Result<Vec<f64>> {
    if energies.is_empty() {
        return Err(Error::EmptyInput);
    }
    let min = energies.iter().copied().fold(f64::INFINITY, f64::min);

    let weights: Vec<_> = energies.iter().map(|e| (-beta * (e - min)).exp()).collect();
    let sum: f64 = weights.iter().sum();
    Ok(weights.into_iter().map(|w| w / sum).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::tests::{collection, registry};

    #[test]
    fn occupancy_per_conformer() {
        let occ = occupancy(&collection()).unwrap();
        // Counts: [3 5] x2, [4 5] x1, [3 6] x3, [4 6] x4.
        assert_eq!(occ.keys().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
        assert!((occ[&3] - 0.5).abs() < 1e-12);
        assert!((occ[&4] - 0.5).abs() < 1e-12);
        assert!((occ[&5] - 0.3).abs() < 1e-12);
        assert!((occ[&6] - 0.7).abs() < 1e-12);
        let sum: f64 = occ.values().sum();
        assert!((sum - 2.0).abs() < 1e-12);
    }

    #[test]
    fn occupancy_of_nothing() {
        assert!(matches!(occupancy(&Vec::new()), Err(Error::EmptyInput)));
    }

    #[test]
    fn residue_charges() {
        let positions = vec![vec![3, 4], vec![5, 6]];
        let charges = residue_charge(&collection(), &positions, &registry()).unwrap();
        assert!((charges[0] - -0.5).abs() < 1e-12);
        assert!((charges[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn residue_charge_needs_registry() {
        let positions = vec![vec![3, 4], vec![5, 6]];
        let result = residue_charge(&collection(), &positions, &ConformerRegistry::default());
        assert!(matches!(result, Err(Error::MissingRegistry)));
    }

    #[test]
    fn residue_charge_rejects_shared_conformer() {
        let positions = vec![vec![3, 4], vec![4, 5, 6]];
        let result = residue_charge(&collection(), &positions, &registry());
        assert!(matches!(result, Err(Error::Consistency(_))));
    }

    #[test]
    fn residue_charge_rejects_unmapped_conformer() {
        let positions = vec![vec![3, 4]];
        let result = residue_charge(&collection(), &positions, &registry());
        assert!(matches!(result, Err(Error::Consistency(_))));
    }

    #[test]
    fn microstate_charges() {
        let registry = registry();
        let microstates = collection();
        assert_eq!(microstate_charge(&microstates[3], &registry).unwrap(), 0.0);
        assert_eq!(microstate_charge(&microstates[1], &registry).unwrap(), -1.0);
        // Weighted: (0 * 2 - 1 * 1 + 1 * 3 + 0 * 4) / 10.
        let avg = average_charge(&microstates, &registry).unwrap();
        assert!((avg - 0.2).abs() < 1e-12);
    }

    #[test]
    fn boltzmann_sums_to_one() {
        let probs = boltzmann_occupancy(&[-1000.0, -999.0, -990.0], KCAL_TO_KT).unwrap();
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
        let ratio = probs[1] / probs[0];
        assert!((ratio - (-KCAL_TO_KT).exp()).abs() < 1e-12);
    }

    #[test]
    fn boltzmann_of_equal_energies_is_uniform() {
        let probs = boltzmann_occupancy(&[2.0; 4], KCAL_TO_KT).unwrap();
        assert!(probs.iter().all(|&p| (p - 0.25).abs() < 1e-12));
    }

    #[test]
    fn boltzmann_of_nothing() {
        assert!(matches!(
            boltzmann_occupancy(&[], KCAL_TO_KT),
            Err(Error::EmptyInput)
        ));
    }
}
