//! Streaming parser and deduplicating aggregator for microstate files.

use crate::error::{Error, Result};
use crate::model::Microstate;
use crate::stats::EnergyAccumulator;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// Boltzmann constant in kcal/(mol K).
pub const K_BOLTZMANN: f64 = 0.0019872041;

const MC_MARKER: &str = "MC:";
const METHOD: &str = "MONTERUNS";

/// Thermodynamic conditions read from the header line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Temperature in K.
    pub temperature: f64,
    pub ph: f64,
    /// Redox potential in mV.
    pub eh: f64,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            temperature: 273.15,
            ph: 7.0,
            eh: 0.0,
        }
    }
}

impl Header {
    /// Inverse thermal energy `1 / (k_B T)` in mol/kcal.
    pub fn inverse_thermal_energy(&self) -> f64 {
        1.0 / (K_BOLTZMANN * self.temperature)
    }
}

/// Summary statistics over the unique microstates of a store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_count: u64,
    pub unique_count: usize,
    pub min_energy: f64,
    pub max_energy: f64,
    pub average_energy: f64,
}

impl Summary {
    fn compute(microstates: &[Microstate]) -> Option<Self> {
        let mut acc = EnergyAccumulator::new();
        for ms in microstates {
            acc.add(ms);
        }
        let stat = acc.report()?;
        Some(Self {
            total_count: acc.weight_sum(),
            unique_count: microstates.len(),
            min_energy: stat.min,
            max_energy: stat.max,
            average_energy: stat.average,
        })
    }
}

/// Unique microstates sampled by a Monte Carlo run, with their metadata.
///
/// Built once by [`MicrostateStore::from_reader`] and read-only afterwards.
/// Microstates keep the order in which they were first observed.
#[derive(Debug, Clone)]
pub struct MicrostateStore {
    header: Header,
    fixed: Vec<usize>,
    positions: Vec<Vec<usize>>,
    conf_to_pos: HashMap<usize, usize>,
    microstates: Vec<Microstate>,
    summary: Option<Summary>,
}

impl MicrostateStore {
    /// Parse a microstate file.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let path = file.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_reader(BufReader::new(file))?;
        log::info!(
            "parsed {path:?}: {} unique microstates out of {}",
            store.len(),
            store.summary.map_or(0, |s| s.total_count)
        );
        Ok(store)
    }

    /// Parse microstates from a reader in a single sequential pass.
    ///
    /// Any error aborts the whole parse.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = Lines::new(reader);

        let header = parse_header(lines.require("header")?)?;
        parse_method(lines.require("method")?)?;

        let (line_num, line) = lines.require("fixed conformers")?;
        let fixed = parse_indices(after_colon(&line), line_num)?;

        let (line_num, line) = lines.require("free residues")?;
        let positions = after_colon(&line)
            .split(';')
            .filter(|group| !group.trim().is_empty())
            .map(|group| parse_indices(group, line_num))
            .collect::<Result<Vec<_>>>()?;

        let mut builder = Builder::new(header, fixed, positions)?;
        builder.parse_blocks(&mut lines)?;
        Ok(builder.finish())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Conformers held constant in every microstate.
    pub fn fixed_conformers(&self) -> &[usize] {
        &self.fixed
    }

    /// Alternative conformers of each free residue position.
    pub fn positions(&self) -> &[Vec<usize>] {
        &self.positions
    }

    /// Free residue position a conformer belongs to.
    pub fn position_of(&self, conformer: usize) -> Option<usize> {
        self.conf_to_pos.get(&conformer).copied()
    }

    /// Unique microstates in first-seen order.
    pub fn microstates(&self) -> &[Microstate] {
        &self.microstates
    }

    pub fn len(&self) -> usize {
        self.microstates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.microstates.is_empty()
    }

    pub fn summary(&self) -> Result<&Summary> {
        self.summary.as_ref().ok_or(Error::EmptyStore)
    }

    pub fn total_count(&self) -> Result<u64> {
        Ok(self.summary()?.total_count)
    }

    pub fn unique_count(&self) -> Result<usize> {
        Ok(self.summary()?.unique_count)
    }

    pub fn min_energy(&self) -> Result<f64> {
        Ok(self.summary()?.min_energy)
    }

    pub fn max_energy(&self) -> Result<f64> {
        Ok(self.summary()?.max_energy)
    }

    pub fn average_energy(&self) -> Result<f64> {
        Ok(self.summary()?.average_energy)
    }
}

/// Numbered lines with comments and blank lines removed.
struct Lines<R> {
    inner: std::iter::Enumerate<std::io::Lines<R>>,
}

impl<R: BufRead> Lines<R> {
    fn new(reader: R) -> Self {
        Self {
            inner: reader.lines().enumerate(),
        }
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        for (i_line, line) in self.inner.by_ref() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Ok(Some((i_line + 1, line.to_string())));
        }
        Ok(None)
    }

    fn require(&mut self, what: &str) -> Result<(usize, String)> {
        self.next_line()?
            .ok_or_else(|| Error::Format(format!("missing {what} line")))
    }
}

fn parse_header((line_num, line): (usize, String)) -> Result<Header> {
    let mut header = Header::default();
    for field in line.split(',') {
        let (key, value) = field
            .split_once(':')
            .ok_or_else(|| Error::Format(format!("header field '{field}' is not KEY:VALUE")))?;
        let value: f64 = value.trim().parse().map_err(|_| {
            Error::Format(format!(
                "invalid header value '{}' on line {line_num}",
                value.trim()
            ))
        })?;
        match key.trim().to_uppercase().as_str() {
            "T" => header.temperature = value,
            "PH" => header.ph = value,
            "EH" => header.eh = value,
            other => log::debug!("ignoring header key '{other}'"),
        }
    }
    Ok(header)
}

fn parse_method((_, line): (usize, String)) -> Result<()> {
    match line.split_once(':') {
        Some((key, value)) if key.trim() == "METHOD" && value.trim() == METHOD => Ok(()),
        _ => Err(Error::Format(format!(
            "expected 'METHOD: {METHOD}', but found '{line}'"
        ))),
    }
}

fn after_colon(line: &str) -> &str {
    line.split_once(':').map_or(line, |(_, rest)| rest)
}

fn parse_indices(field: &str, line_num: usize) -> Result<Vec<usize>> {
    field
        .split_whitespace()
        .map(|token| {
            token.parse().map_err(|_| Error::Parse {
                line: line_num,
                reason: format!("invalid conformer index '{token}'"),
            })
        })
        .collect()
}

/// Energy and count of a unique state, with the order it was first seen in.
struct Entry {
    order: usize,
    energy: f64,
    count: u64,
}

/// Accumulates microstates while the file is being read.
///
/// Each unique state is held once, as its map key, until [`Builder::finish`]
/// moves it into a [`Microstate`].
struct Builder {
    header: Header,
    fixed: Vec<usize>,
    positions: Vec<Vec<usize>>,
    conf_to_pos: HashMap<usize, usize>,
    entries: HashMap<Vec<usize>, Entry>,
}

impl Builder {
    fn new(header: Header, fixed: Vec<usize>, positions: Vec<Vec<usize>>) -> Result<Self> {
        let fixed_set: HashSet<_> = fixed.iter().copied().collect();
        let mut conf_to_pos = HashMap::new();
        for (i_pos, group) in positions.iter().enumerate() {
            for &conf in group {
                if fixed_set.contains(&conf) {
                    return Err(Error::Consistency(format!(
                        "conformer {conf} is both fixed and free"
                    )));
                }
                if let Some(other) = conf_to_pos.insert(conf, i_pos) {
                    return Err(Error::Consistency(format!(
                        "conformer {conf} belongs to positions {other} and {i_pos}"
                    )));
                }
            }
        }

        Ok(Self {
            header,
            fixed,
            positions,
            conf_to_pos,
            entries: HashMap::new(),
        })
    }

    fn parse_blocks<R: BufRead>(&mut self, lines: &mut Lines<R>) -> Result<()> {
        let mut n_blocks = 0;
        let mut n_records = 0;
        let mut n_skipped = 0;
        let mut new_block = false;
        // Running state, replaced by each block's initial state and updated by every flip.
        let mut current: Option<Vec<usize>> = None;

        while let Some((line_num, line)) = lines.next_line()? {
            if line.starts_with(MC_MARKER) {
                n_blocks += 1;
                new_block = true;
                continue;
            }
            if new_block {
                current = Some(self.initial_state(&line, line_num)?);
                new_block = false;
                continue;
            }
            let Some(state) = current.as_mut() else {
                log::warn!("ignoring line {line_num} outside of any MC block");
                continue;
            };

            let fields: Vec<_> = line.split(',').collect();
            if fields.len() < 3 {
                n_skipped += 1;
                continue;
            }
            let energy = parse_field(fields[0], line_num, "energy")?;
            let count: u64 = parse_field(fields[1], line_num, "count")?;
            if count == 0 {
                return Err(Error::Parse {
                    line: line_num,
                    reason: "count must be positive".to_string(),
                });
            }
            for conf in parse_indices(fields[2], line_num)? {
                let i_pos = self.conf_to_pos.get(&conf).ok_or_else(|| {
                    Error::Consistency(format!(
                        "flipped conformer {conf} on line {line_num} is not free"
                    ))
                })?;
                state[*i_pos] = conf;
            }

            self.insert(state, energy, count);
            n_records += 1;
        }

        log::debug!(
            "read {n_records} records in {n_blocks} blocks, skipped {n_skipped} short records"
        );
        Ok(())
    }

    fn initial_state(&self, line: &str, line_num: usize) -> Result<Vec<usize>> {
        let state = parse_indices(after_colon(line), line_num)?;
        if state.len() != self.positions.len() {
            return Err(Error::Consistency(format!(
                "initial state on line {line_num} has {} conformers, but there are {} free positions",
                state.len(),
                self.positions.len()
            )));
        }
        for (i_pos, &conf) in state.iter().enumerate() {
            if self.conf_to_pos.get(&conf) != Some(&i_pos) {
                return Err(Error::Consistency(format!(
                    "initial state on line {line_num} puts conformer {conf} at position {i_pos}"
                )));
            }
        }
        Ok(state)
    }

    /// Merge by state: counts add up and the first energy seen is kept.
    fn insert(&mut self, state: &[usize], energy: f64, count: u64) {
        if let Some(entry) = self.entries.get_mut(state) {
            entry.count += count;
        } else {
            let order = self.entries.len();
            self.entries.insert(
                state.to_vec(),
                Entry {
                    order,
                    energy,
                    count,
                },
            );
        }
    }

    fn finish(self) -> MicrostateStore {
        let mut ordered: Vec<_> = self.entries.into_iter().collect();
        ordered.sort_unstable_by_key(|(_, entry)| entry.order);
        let microstates: Vec<_> = ordered
            .into_iter()
            .map(|(state, entry)| Microstate::new(state, entry.energy, entry.count))
            .collect();

        let summary = Summary::compute(&microstates);
        MicrostateStore {
            header: self.header,
            fixed: self.fixed,
            positions: self.positions,
            conf_to_pos: self.conf_to_pos,
            microstates,
            summary,
        }
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, line_num: usize, what: &str) -> Result<T> {
    field.trim().parse().map_err(|_| Error::Parse {
        line: line_num,
        reason: format!("invalid {what} '{}'", field.trim()),
    })
}
