use crate::analysis::Analyzer;
use crate::config::Config;
use crate::conformer::ConformerRegistry;
use crate::store::MicrostateStore;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Runs analyses over the microstate files of an analysis directory.
pub struct Manager {
    dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        let cfg = Config::from_file(dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { dir, cfg })
    }

    pub fn run_analysis(&self) -> Result<()> {
        let registry = self.load_registry().context("failed to load conformers")?;
        let analyzer = Analyzer::new(self.cfg.clone(), registry);

        let files = self
            .microstate_files()
            .context("failed to list microstate files")?;
        if files.is_empty() {
            log::warn!("no microstate files match {:?}", self.cfg.input.microstates);
        }

        for file in files {
            let store = MicrostateStore::from_file(&file)
                .with_context(|| format!("failed to parse {file:?}"))?;

            let report = analyzer
                .analyze(&store)
                .with_context(|| format!("failed to analyze {file:?}"))?;

            let results_file = results_file(&file);
            report
                .save(&results_file)
                .context("failed to save results")?;
            log::info!("saved {results_file:?}");
        }

        Ok(())
    }

    pub fn clean_analysis(&self) -> Result<()> {
        for file in self
            .microstate_files()
            .context("failed to list microstate files")?
        {
            let results_file = results_file(&file);
            if results_file.exists() {
                fs::remove_file(&results_file)
                    .with_context(|| format!("failed to remove {results_file:?}"))?;
                log::info!("removed {results_file:?}");
            }
        }

        Ok(())
    }

    fn load_registry(&self) -> Result<ConformerRegistry> {
        match &self.cfg.input.conformers {
            Some(conformers) => {
                let registry = ConformerRegistry::from_file(self.dir.join(conformers))?;
                Ok(registry)
            }
            None => {
                log::warn!("no conformer table configured, charge and id analyses are skipped");
                Ok(ConformerRegistry::default())
            }
        }
    }

    fn microstate_files(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.dir.join(&self.cfg.input.microstates);
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let mut files: Vec<_> = glob(pattern)
            .context("failed to glob microstate files")?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        Ok(files)
    }
}

fn results_file(microstate_file: &Path) -> PathBuf {
    microstate_file.with_extension("results.msgpack")
}
