//! `deals init`: create `.deals/` with a config file, the database and a
//! starter sales pipeline.

use anyhow::Context as _;
use clap::Args;
use deals_core::config::{PROJECT_DIR, write_default_config};
use deals_core::db::open_store;
use deals_core::model::stage::{Stage, SystemRole};
use deals_core::service;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::report;
use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};
use crate::project::{DEFAULT_PIPELINE, db_path};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Re-run initialization over an existing `.deals/`. Data is kept.
    #[arg(long)]
    pub force: bool,

    /// Do not create the starter pipeline.
    #[arg(long)]
    pub no_seed: bool,
}

/// Starter pipeline: four open stages followed by the two closing ones.
const STARTER_STAGES: &[(&str, &str, SystemRole)] = &[
    ("lead", "Lead", SystemRole::Normal),
    ("qualified", "Qualified", SystemRole::Normal),
    ("proposal", "Proposal", SystemRole::Normal),
    ("negotiation", "Negotiation", SystemRole::Normal),
    ("closed_won", "Closed Won", SystemRole::Won),
    ("closed_lost", "Closed Lost", SystemRole::Lost),
];

fn starter_stages() -> impl Iterator<Item = Stage> {
    STARTER_STAGES
        .iter()
        .zip(1..)
        .map(|(&(id, name, system_role), order)| Stage {
            id: id.to_string(),
            pipeline_id: DEFAULT_PIPELINE.to_string(),
            name: name.to_string(),
            order,
            color_hint: None,
            system_role,
        })
}

#[derive(Debug, Serialize)]
struct InitOutput {
    root: PathBuf,
    config: PathBuf,
    database: PathBuf,
    pipeline: String,
    seeded_stages: Vec<String>,
}

pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let deals_dir = project_root.join(PROJECT_DIR);
    if deals_dir.exists() && !args.force {
        let msg = format!("{PROJECT_DIR}/ already exists");
        render_error(
            output,
            &CliError::with_details(&msg, "Use `deals init --force` to re-run initialization.", "already_initialized"),
        )?;
        anyhow::bail!(msg);
    }

    let config = write_default_config(project_root)?;
    let database = db_path(project_root);
    let store = open_store(&database)
        .with_context(|| format!("initialize {}", database.display()))?;

    let mut seeded_stages = Vec::new();
    if !args.no_seed && store.list_stages(DEFAULT_PIPELINE)?.is_empty() {
        for stage in starter_stages() {
            let stage = service::add_stage(&store, stage).map_err(|e| report(output, &e))?;
            seeded_stages.push(stage.id);
        }
    }
    tracing::info!(root = %project_root.display(), seeded = seeded_stages.len(), "project initialized");

    let result = InitOutput {
        root: project_root.to_path_buf(),
        config,
        database,
        pipeline: DEFAULT_PIPELINE.to_string(),
        seeded_stages,
    };
    render_mode(
        output,
        &result,
        |r, w| {
            writeln!(w, "initialized {}", r.root.display())?;
            if !r.seeded_stages.is_empty() {
                writeln!(w, "pipeline {}: {}", r.pipeline, r.seeded_stages.join(" "))?;
            }
            Ok(())
        },
        |r, w| {
            pretty_section(w, "Initialized deals project")?;
            pretty_kv(w, "Root", r.root.display().to_string())?;
            pretty_kv(w, "Config", r.config.display().to_string())?;
            pretty_kv(w, "Database", r.database.display().to_string())?;
            if !r.seeded_stages.is_empty() {
                pretty_kv(w, "Pipeline", &r.pipeline)?;
                pretty_kv(w, "Stages", r.seeded_stages.join(" > "))?;
            }
            Ok(())
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use deals_core::model::stage::StageCatalog;

    #[test]
    fn starter_pipeline_is_a_valid_catalog() {
        let catalog = StageCatalog::new(DEFAULT_PIPELINE, starter_stages()).expect("catalog");
        assert_eq!(catalog.default_stage().expect("default").id, "lead");
        assert_eq!(catalog.role_of("closed_lost"), Some(SystemRole::Lost));
        assert_eq!(catalog.role_of("closed_won"), Some(SystemRole::Won));
    }

    #[test]
    fn init_creates_config_database_and_stages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let args = InitArgs {
            force: false,
            no_seed: false,
        };
        run_init(&args, OutputMode::Json, dir.path()).expect("init");

        assert!(dir.path().join(PROJECT_DIR).join("config.toml").is_file());
        let store = open_store(&db_path(dir.path())).expect("store");
        assert_eq!(store.list_stages(DEFAULT_PIPELINE).expect("stages").len(), 6);

        assert!(run_init(&args, OutputMode::Json, dir.path()).is_err());
        let forced = InitArgs {
            force: true,
            no_seed: false,
        };
        run_init(&forced, OutputMode::Json, dir.path()).expect("forced init");
        assert_eq!(store.list_stages(DEFAULT_PIPELINE).expect("stages").len(), 6);
    }
}
