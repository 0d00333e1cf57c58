use crate::sampling::SampleParams;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs,
    ops::RangeBounds,
    path::{Path, PathBuf},
};

/// Analysis configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    pub sampling: SampleParams,
    pub grouping: GroupingConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Glob pattern of microstate files, relative to the analysis directory.
    #[serde(default = "default_microstates")]
    pub microstates: String,
    /// Conformer table, relative to the analysis directory.
    pub conformers: Option<PathBuf>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            microstates: default_microstates(),
            conformers: None,
        }
    }
}

fn default_microstates() -> String {
    "ms_out/*.txt".to_string()
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Number of equal-width energy bands.
    pub energy_bands: usize,
    /// Conformers splitting microstates into those containing any of them and the rest.
    #[serde(default)]
    pub conformer_indices: Vec<usize>,
    /// Conformer id fragments that must all be present in selected microstates.
    #[serde(default)]
    pub conformer_ids: Vec<String>,
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.input.microstates.trim().is_empty() {
            bail!("microstate file pattern must not be empty");
        }

        check_num(self.sampling.size, 1..=1_000_000).context("invalid sample size")?;
        check_num(self.grouping.energy_bands, 1..=1000).context("invalid number of energy bands")?;

        if self.grouping.conformer_ids.iter().any(|id| id.is_empty()) {
            bail!("conformer id fragments must not be empty");
        }

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SampleKind;
    use crate::stats::SortKey;

    fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn parses_full_config() {
        let config = parse(
            r#"
[input]
microstates = "ms_out/pH*.txt"
conformers = "head3.lst"

[sampling]
size = 100
kind = "Random"
sort_by = "count"
reverse = true
seed = 42

[grouping]
energy_bands = 20
conformer_indices = [12, 13]
conformer_ids = ["GLU-1A0035"]
"#,
        )
        .unwrap();

        assert_eq!(config.input.microstates, "ms_out/pH*.txt");
        assert_eq!(config.input.conformers, Some(PathBuf::from("head3.lst")));
        assert_eq!(config.sampling.kind, SampleKind::Random);
        assert_eq!(config.sampling.sort_by, SortKey::Count);
        assert!(config.sampling.reverse);
        assert_eq!(config.sampling.seed, Some(42));
        assert_eq!(config.grouping.conformer_indices, vec![12, 13]);
    }

    #[test]
    fn applies_defaults() {
        let config = parse(
            r#"
[sampling]
size = 10
kind = "deterministic"
sort_by = "energy"

[grouping]
energy_bands = 5
"#,
        )
        .unwrap();

        assert_eq!(config.input, InputConfig::default());
        assert!(!config.sampling.reverse);
        assert_eq!(config.sampling.seed, None);
        assert!(config.grouping.conformer_ids.is_empty());
    }

    #[test]
    fn rejects_unknown_sort_key() {
        let err = parse(
            r#"
[sampling]
size = 10
kind = "deterministic"
sort_by = "stateid"

[grouping]
energy_bands = 5
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid argument"));
    }

    #[test]
    fn rejects_zero_sample_size() {
        let err = parse(
            r#"
[sampling]
size = 0
kind = "random"
sort_by = "energy"

[grouping]
energy_bands = 5
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("invalid sample size"));
    }
}
