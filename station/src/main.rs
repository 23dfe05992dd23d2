//! Station test-bench CLI.
//!
//! Keeps procedure definitions and results under `.station/` and walks an
//! operator through the checklist assigned to a target.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use station::core::loader::load_procedure;
use station::core::types::{OperatorId, TargetId};
use station::exit_codes;
use station::io::config::{StationConfig, load_config};
use station::io::console::{Console, StepView};
use station::io::init::{InitOptions, StationPaths, ensure_initialized, init_station};
use station::io::store::{FileStore, ProcedureStore};
use station::logging;
use station::run::{RunExit, run_checklist};
use station::session::Session;

#[derive(Parser)]
#[command(name = "station", version, about = "Procedure-driven test bench")]
struct Cli {
    /// Project root containing `.station/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Operator id recorded with results (overrides config).
    #[arg(long, global = true)]
    operator: Option<i32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `.station/` with default config and an empty target list.
    Init {
        /// Overwrite config and target list.
        #[arg(short, long)]
        force: bool,
    },
    /// List targets and their current procedure.
    Targets,
    /// Check a definition file without importing it.
    Validate { file: PathBuf },
    /// Import a definition file and assign it to a target.
    Import {
        file: PathBuf,
        #[arg(long)]
        target: i32,
        /// Display name for a new target (or rename an existing one).
        #[arg(long)]
        name: Option<String>,
    },
    /// Print every step of a target's current procedure.
    Show {
        #[arg(long)]
        target: i32,
    },
    /// Work through a target's procedure interactively and save the results.
    Run {
        #[arg(long)]
        target: i32,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let paths = StationPaths::new(&cli.root);
    match cli.command {
        Command::Init { force } => cmd_init(&paths, force),
        Command::Targets => cmd_targets(&paths),
        Command::Validate { file } => cmd_validate(&file),
        Command::Import { file, target, name } => {
            cmd_import(&paths, &file, TargetId::new(target), name.as_deref())
        }
        Command::Show { target } => cmd_show(&paths, TargetId::new(target)),
        Command::Run { target } => cmd_run(&paths, cli.operator, TargetId::new(target)),
    }
}

fn cmd_init(paths: &StationPaths, force: bool) -> Result<i32> {
    let paths = init_station(&paths.root, &InitOptions { force })?;
    println!("initialized {}", paths.station_dir.display());
    Ok(exit_codes::OK)
}

fn cmd_targets(paths: &StationPaths) -> Result<i32> {
    let store = open_store(paths)?;
    for target in store.list_targets()? {
        match target.procedures.last() {
            Some(procedure) => println!(
                "{}\t{}\tprocedure {procedure}",
                target.id, target.display_name
            ),
            None => println!("{}\t{}\t(no procedure)", target.id, target.display_name),
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_validate(file: &Path) -> Result<i32> {
    let raw = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let procedure = load_procedure(&raw)?;
    println!(
        "ok: {} step(s), {} requirement(s)",
        procedure.steps.len(),
        procedure.requirement_count()
    );
    Ok(exit_codes::OK)
}

fn cmd_import(
    paths: &StationPaths,
    file: &Path,
    target: TargetId,
    name: Option<&str>,
) -> Result<i32> {
    let store = open_store(paths)?;
    let raw = fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let procedure = store.import_procedure(target, name, &raw)?;
    println!("imported procedure {procedure} for target {target}");
    Ok(exit_codes::OK)
}

fn cmd_show(paths: &StationPaths, target: TargetId) -> Result<i32> {
    let store = open_store(paths)?;
    let mut session = Session::new(store, OperatorId::new(1));
    let procedure = session.select_target(target)?;
    let view = StepView::new()?;
    let mut out = BufWriter::new(io::stdout().lock());
    for (index, step) in procedure.steps.iter().enumerate() {
        let rendered = view.render(procedure, index, &step.checklist())?;
        writeln!(out, "{rendered}")?;
    }
    out.flush()?;
    Ok(exit_codes::OK)
}

fn cmd_run(paths: &StationPaths, operator: Option<i32>, target: TargetId) -> Result<i32> {
    let store = open_store(paths)?;
    let config = load_station_config(paths, operator)?;
    debug!(operator = config.operator_id, confirm_save = config.confirm_save, "config loaded");

    let mut session =
        Session::new(store, config.operator()).with_confirm_save(config.confirm_save);
    let mut console = Console::new(
        io::stdin().lock(),
        io::stdout().lock(),
        config.review.comment_prompt.as_str(),
    )?;
    let code = match run_checklist(&mut session, &mut console, target)? {
        RunExit::Saved(_) => exit_codes::OK,
        RunExit::Quit => exit_codes::ABORTED,
        RunExit::PartialFailure { saved, total } => {
            eprintln!("results incomplete: {saved} of {total} rows saved");
            exit_codes::PARTIAL_FAILURE
        }
    };
    Ok(code)
}

fn open_store(paths: &StationPaths) -> Result<FileStore> {
    ensure_initialized(paths)?;
    Ok(FileStore::new(paths.clone()))
}

fn load_station_config(paths: &StationPaths, operator: Option<i32>) -> Result<StationConfig> {
    let mut config = load_config(&paths.config_path)?;
    if let Some(operator) = operator {
        config.operator_id = operator;
        config.validate().context("--operator")?;
    }
    Ok(config)
}
