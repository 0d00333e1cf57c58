use crate::comparison::{occupancy_delta, residue_distance};
use crate::config::Config;
use crate::conformer::ConformerRegistry;
use crate::error::Error;
use crate::grouping::{by_conformer_id_substring, by_conformer_membership, by_energy, energy_ticks};
use crate::model::{Microstate, total_count};
use crate::occupancy::{average_charge, boltzmann_occupancy, fixed_charge, occupancy, residue_charge};
use crate::sampling::sample;
use crate::store::{Header, MicrostateStore, Summary};
use anyhow::{Context, Result};
use rmp_serde::encode;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleReport {
    pub rank: usize,
    pub state: Vec<usize>,
    pub energy: f64,
    pub count: u64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct BandReport {
    /// Lower energy boundary of the band.
    pub lower: f64,
    pub unique_count: usize,
    pub total_count: u64,
    pub average_charge: Option<f64>,
}

/// Comparison between the microstates matching a selector and the rest.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub selector: String,
    pub selected_count: u64,
    pub rest_count: u64,
    /// Occupancy of the rest minus occupancy of the selected group.
    pub occupancy_delta: Option<BTreeMap<usize, f64>>,
    pub residue_distance: Option<Vec<f64>>,
}

/// Results of analyzing one microstate file.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub header: Header,
    pub summary: Summary,
    pub samples: Vec<SampleReport>,
    /// Boltzmann probabilities of the sampled energies at the file temperature.
    pub sample_probabilities: Option<Vec<f64>>,
    pub energy_bands: Vec<BandReport>,
    pub occupancy: BTreeMap<usize, f64>,
    pub residue_charge: Option<Vec<f64>>,
    pub fixed_charge: Option<f64>,
    pub comparisons: Vec<ComparisonReport>,
}

impl Report {
    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, self).context("failed to serialize report")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

pub struct Analyzer {
    cfg: Config,
    registry: ConformerRegistry,
}

impl Analyzer {
    pub fn new(cfg: Config, registry: ConformerRegistry) -> Self {
        Self { cfg, registry }
    }

    pub fn analyze(&self, store: &MicrostateStore) -> Result<Report> {
        let summary = *store.summary().context("failed to summarize store")?;
        let microstates = store.microstates();

        let samples = sample(store, &self.cfg.sampling).context("failed to sample microstates")?;
        let energies: Vec<_> = samples.iter().map(|s| s.microstate.energy()).collect();
        let sample_probabilities = optional(
            boltzmann_occupancy(&energies, store.header().inverse_thermal_energy()),
            "sample probabilities",
        )?;
        let samples = samples
            .into_iter()
            .map(|s| SampleReport {
                rank: s.rank,
                state: s.microstate.state().to_vec(),
                energy: s.microstate.energy(),
                count: s.microstate.count(),
            })
            .collect();

        let energy_bands = self
            .energy_bands(microstates, &summary)
            .context("failed to group microstates by energy")?;

        let occupancy = occupancy(microstates).context("failed to compute occupancy")?;
        let residue_charge = optional(
            residue_charge(microstates, store.positions(), &self.registry),
            "residue charges",
        )?;
        let fixed_charge = optional(fixed_charge(store, &self.registry), "fixed charge")?;

        let comparisons = self
            .comparisons(store)
            .context("failed to compare microstate groups")?;

        Ok(Report {
            header: *store.header(),
            summary,
            samples,
            sample_probabilities,
            energy_bands,
            occupancy,
            residue_charge,
            fixed_charge,
            comparisons,
        })
    }

    fn energy_bands(&self, microstates: &[Microstate], summary: &Summary) -> Result<Vec<BandReport>> {
        let ticks = energy_ticks(
            summary.min_energy,
            summary.max_energy,
            self.cfg.grouping.energy_bands,
        );
        let bands = by_energy(microstates, &ticks);

        let mut reports = Vec::with_capacity(bands.len());
        for (&lower, band) in ticks.iter().zip(&bands) {
            let average_charge = if band.is_empty() || self.registry.is_empty() {
                None
            } else {
                Some(average_charge(band.iter().copied(), &self.registry)?)
            };
            reports.push(BandReport {
                lower,
                unique_count: band.len(),
                total_count: total_count(band.iter().copied()),
                average_charge,
            });
        }
        Ok(reports)
    }

    fn comparisons(&self, store: &MicrostateStore) -> Result<Vec<ComparisonReport>> {
        let grouping = &self.cfg.grouping;
        let mut reports = Vec::new();

        if !grouping.conformer_indices.is_empty() {
            let (selected, rest) =
                by_conformer_membership(store.microstates(), &grouping.conformer_indices);
            let selector = format!("conformer indices {:?}", grouping.conformer_indices);
            reports.push(compare(selector, &selected, &rest, store.positions())?);
        }

        if !grouping.conformer_ids.is_empty() {
            let groups = optional(
                by_conformer_id_substring(
                    store.microstates(),
                    grouping.conformer_ids.as_slice(),
                    &self.registry,
                ),
                "conformer id grouping",
            )?;
            if let Some((selected, rest)) = groups {
                let selector = format!("conformer ids {:?}", grouping.conformer_ids);
                reports.push(compare(selector, &selected, &rest, store.positions())?);
            }
        }

        Ok(reports)
    }
}

fn compare(
    selector: String,
    selected: &[&Microstate],
    rest: &[&Microstate],
    positions: &[Vec<usize>],
) -> Result<ComparisonReport> {
    log::info!(
        "{selector}: {} selected and {} remaining microstates",
        selected.len(),
        rest.len()
    );
    let occupancy_delta = optional(
        occupancy_delta(selected.iter().copied(), rest.iter().copied()),
        "occupancy delta",
    )?;
    let residue_distance = optional(
        residue_distance(selected.iter().copied(), rest.iter().copied(), positions),
        "residue distances",
    )?;

    Ok(ComparisonReport {
        selector,
        selected_count: total_count(selected.iter().copied()),
        rest_count: total_count(rest.iter().copied()),
        occupancy_delta,
        residue_distance,
    })
}

/// Keep a section out of the report when its input is missing.
fn optional<T>(result: crate::Result<T>, what: &str) -> Result<Option<T>> {
    match result {
        Ok(val) => Ok(Some(val)),
        Err(err @ (Error::MissingRegistry | Error::EmptyInput)) => {
            log::warn!("skipping {what}: {err}");
            Ok(None)
        }
        Err(err) => Err(err).with_context(|| format!("failed to compute {what}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupingConfig, InputConfig};
    use crate::grouping::tests::registry;
    use crate::sampling::{SampleKind, SampleParams};
    use crate::stats::SortKey;
    use crate::store::tests::parse;

    const BODY: &str = "\
MC:0
2:3 5
-4.0,2,
-1.0,1,4
0.5,3,3 6
3.0,4,4
";

    fn config(conformer_ids: Vec<String>) -> Config {
        Config {
            input: InputConfig::default(),
            sampling: SampleParams {
                size: 3,
                kind: SampleKind::Deterministic,
                sort_by: SortKey::Energy,
                reverse: false,
                seed: None,
            },
            grouping: GroupingConfig {
                energy_bands: 2,
                conformer_indices: vec![4],
                conformer_ids,
            },
        }
    }

    #[test]
    fn full_report() {
        let store = parse(BODY).unwrap();
        let analyzer = Analyzer::new(config(vec!["HIS+".to_string()]), registry());
        let report = analyzer.analyze(&store).unwrap();

        assert_eq!(report.summary.total_count, 10);
        assert_eq!(report.samples.len(), 3);
        let probs = report.sample_probabilities.unwrap();
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        // Bands start at -4.0 and -0.5.
        assert_eq!(report.energy_bands.len(), 2);
        assert_eq!(report.energy_bands[0].total_count, 3);
        assert_eq!(report.energy_bands[1].total_count, 7);
        assert!(report.energy_bands[0].average_charge.is_some());

        assert_eq!(report.occupancy.len(), 4);
        assert_eq!(report.residue_charge.unwrap().len(), 2);
        assert_eq!(report.fixed_charge, Some(0.0));

        assert_eq!(report.comparisons.len(), 2);
        let by_index = &report.comparisons[0];
        assert_eq!(by_index.selected_count, 5);
        assert_eq!(by_index.rest_count, 5);
        // Conformer 4 is in every selected microstate and in none of the rest.
        assert_eq!(by_index.occupancy_delta.as_ref().unwrap()[&4], -1.0);
        assert_eq!(by_index.residue_distance.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn registry_sections_are_skipped_without_table() {
        let store = parse(BODY).unwrap();
        let analyzer = Analyzer::new(
            config(vec!["GLU".to_string()]),
            ConformerRegistry::default(),
        );
        let report = analyzer.analyze(&store).unwrap();

        assert!(report.residue_charge.is_none());
        assert!(report.fixed_charge.is_none());
        assert!(report.energy_bands.iter().all(|b| b.average_charge.is_none()));
        assert_eq!(report.comparisons.len(), 1);
    }

    #[test]
    fn empty_store_cannot_be_analyzed() {
        let store = parse("").unwrap();
        let analyzer = Analyzer::new(config(Vec::new()), registry());
        assert!(analyzer.analyze(&store).is_err());
    }
}
