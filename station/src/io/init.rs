//! Initialization helpers for `.station/` scaffolding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::core::loader::PROCEDURE_SCHEMA;
use crate::io::atomic::{write_atomic, write_json_atomic};
use crate::io::config::{StationConfig, write_config};
use crate::io::store::Target;

/// All canonical paths within `.station/` for a project root.
#[derive(Debug, Clone)]
pub struct StationPaths {
    pub root: PathBuf,
    pub station_dir: PathBuf,
    pub procedures_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub targets_path: PathBuf,
    pub config_path: PathBuf,
    /// Copy of the definition schema for editors and authoring tools.
    pub schema_path: PathBuf,
}

impl StationPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let station_dir = root.join(".station");
        Self {
            root: root.clone(),
            station_dir: station_dir.clone(),
            procedures_dir: station_dir.join("procedures"),
            runs_dir: station_dir.join("runs"),
            targets_path: station_dir.join("targets.json"),
            config_path: station_dir.join("config.toml"),
            schema_path: station_dir.join("procedure.v1.schema.json"),
        }
    }

    pub fn procedure_path(&self, id: i32) -> PathBuf {
        self.procedures_dir.join(format!("{id}.json"))
    }

    pub fn run_path(&self, id: i32) -> PathBuf {
        self.runs_dir.join(format!("{id}.json"))
    }
}

/// Options for `init_station`.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// If true, overwrite existing station-owned files.
    pub force: bool,
}

/// Create `.station/` scaffolding in `root`.
///
/// Fails if `.station/` already exists unless `options.force` is set. Forcing
/// resets config, the target list and the schema copy; procedures and runs are
/// kept.
pub fn init_station(root: &Path, options: &InitOptions) -> Result<StationPaths> {
    let paths = StationPaths::new(root);
    if paths.station_dir.exists() && !paths.station_dir.is_dir() {
        return Err(anyhow!(
            "station init: .station exists but is not a directory"
        ));
    }
    if paths.station_dir.exists() && !options.force {
        return Err(anyhow!(
            "station init: .station already exists (use --force to overwrite)"
        ));
    }

    create_dir(&paths.station_dir)?;
    create_dir(&paths.procedures_dir)?;
    create_dir(&paths.runs_dir)?;

    write_config(&paths.config_path, &StationConfig::default())?;
    write_json_atomic(&paths.targets_path, &Vec::<Target>::new())?;
    write_atomic(&paths.schema_path, PROCEDURE_SCHEMA)?;

    Ok(paths)
}

/// Fail with a hint when `.station/` has not been initialised.
pub fn ensure_initialized(paths: &StationPaths) -> Result<()> {
    if !paths.station_dir.is_dir() {
        return Err(anyhow!(
            "missing directory {} (run `station init`)",
            paths.station_dir.display()
        ));
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create {}", path.display()))
}
