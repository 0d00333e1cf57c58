//! Conformer metadata table.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

/// Field holding the partial charge in a conformer table row.
const CHARGE_FIELD: usize = 4;

/// One alternative conformation of a residue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformer {
    /// Global 0-based conformer index.
    pub index: usize,
    /// Conformer identifier, e.g. `GLU-1A0035_001`.
    pub id: String,
    /// Residue identifier derived from `id`, e.g. `GLUA0035_`.
    pub residue_id: String,
    /// Partial charge.
    pub charge: f64,
}

impl Conformer {
    fn from_row(row: &str, line: usize) -> Result<Self> {
        let fields: Vec<_> = row.split_whitespace().collect();
        if fields.len() <= CHARGE_FIELD {
            return Err(Error::Parse {
                line,
                reason: format!(
                    "conformer row must have at least {} fields, but has {}",
                    CHARGE_FIELD + 1,
                    fields.len()
                ),
            });
        }

        let ordinal: usize = fields[0].parse().map_err(|_| Error::Parse {
            line,
            reason: format!("invalid conformer ordinal '{}'", fields[0]),
        })?;
        let index = ordinal.checked_sub(1).ok_or_else(|| Error::Parse {
            line,
            reason: "conformer ordinals start at 1".to_string(),
        })?;

        let id = fields[1].to_string();
        let charge = fields[CHARGE_FIELD].parse().map_err(|_| Error::Parse {
            line,
            reason: format!("invalid partial charge '{}'", fields[CHARGE_FIELD]),
        })?;

        Ok(Self {
            index,
            residue_id: residue_id(&id),
            id,
            charge,
        })
    }
}

/// Residue name plus chain, sequence number and insertion code, dropping the
/// conformer type and conformer number.
fn residue_id(id: &str) -> String {
    let name = id.get(..3).unwrap_or(id);
    let site = id.get(5..11).or_else(|| id.get(5..)).unwrap_or("");
    format!("{name}{site}")
}

/// Conformer metadata indexed by global conformer index.
///
/// An empty registry stands for a missing conformer table: every lookup
/// fails with [`Error::MissingRegistry`].
#[derive(Debug, Default, Clone)]
pub struct ConformerRegistry {
    conformers: Vec<Conformer>,
}

impl ConformerRegistry {
    /// Load a conformer table from a file.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let path = file.as_ref();
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_reader(BufReader::new(file))?;
        log::info!("loaded {} conformers from {path:?}", registry.len());
        Ok(registry)
    }

    /// Load a conformer table from a reader.
    ///
    /// The first row is a header and is skipped. Rows must list conformers in
    /// ordinal order, so that row `n` holds the conformer with index `n - 1`.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut conformers = Vec::new();
        for (i_line, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let conformer = Conformer::from_row(&line, i_line + 1)?;
            if conformer.index != conformers.len() {
                return Err(Error::Parse {
                    line: i_line + 1,
                    reason: format!(
                        "expected conformer ordinal {}, but found {}",
                        conformers.len() + 1,
                        conformer.index + 1
                    ),
                });
            }
            conformers.push(conformer);
        }
        Ok(Self { conformers })
    }

    pub fn from_conformers(conformers: Vec<Conformer>) -> Self {
        Self { conformers }
    }

    pub fn len(&self) -> usize {
        self.conformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conformers.is_empty()
    }

    /// Fail with [`Error::MissingRegistry`] if no conformer table is loaded.
    pub fn ensure_loaded(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::MissingRegistry);
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&Conformer> {
        self.ensure_loaded()?;
        self.conformers
            .get(index)
            .ok_or(Error::UnknownConformer(index))
    }

    pub fn charge(&self, index: usize) -> Result<f64> {
        Ok(self.get(index)?.charge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "\
iConf CONFORMER     FL  occ    crg   Em0  pKa0 ne nH    vdw0    vdw1    tors    epol   dsolv   extra    history
00001 NTR01-1A0001_001 f 0.00  0.000     0  0.00  0  0   0.000   0.000   0.000   0.000   0.000   0.000 01O000M000
00002 NTR+1-1A0001_002 f 0.00  1.000     0  0.00  0  1   0.000   0.000   0.000   0.000   0.000   0.000 01O000M000
00003 GLU-1A0035_001 f 0.00 -1.000     0  0.00  0  0   0.000   0.000   0.000   0.000   0.000   0.000 01O000M000
";

    #[test]
    fn loads_rows_by_ordinal() {
        let registry = ConformerRegistry::from_reader(TABLE.as_bytes()).unwrap();
        assert_eq!(registry.len(), 3);

        let glu = registry.get(2).unwrap();
        assert_eq!(glu.index, 2);
        assert_eq!(glu.id, "GLU-1A0035_001");
        assert_eq!(glu.residue_id, "GLUA0035_");
        assert_eq!(glu.charge, -1.0);
        assert_eq!(registry.charge(1).unwrap(), 1.0);
    }

    #[test]
    fn malformed_row_is_parse_error() {
        let table = "header\n00001 GLU-1A0035_001 f 0.00\n";
        let err = ConformerRegistry::from_reader(table.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));

        let table = "header\n00001 GLU-1A0035_001 f 0.00 abc\n";
        let err = ConformerRegistry::from_reader(table.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn out_of_order_ordinal_is_rejected() {
        let table = "header\n00002 GLU-1A0035_001 f 0.00 -1.0\n";
        let err = ConformerRegistry::from_reader(table.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn empty_registry_reports_missing() {
        let registry = ConformerRegistry::default();
        assert!(matches!(registry.get(0), Err(Error::MissingRegistry)));

        let registry = ConformerRegistry::from_reader(TABLE.as_bytes()).unwrap();
        assert!(matches!(registry.get(7), Err(Error::UnknownConformer(7))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ConformerRegistry::from_file("/nonexistent/head3.lst").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
