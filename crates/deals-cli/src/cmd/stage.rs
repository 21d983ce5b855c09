//! `deals stage add|list`: maintain the stage list of a pipeline.

use clap::{Args, Subcommand};
use deals_core::model::stage::{Stage, SystemRole};
use deals_core::{DealsError, service};
use std::io::Write;
use std::path::Path;

use super::{report, report_invalid};
use crate::output::{OutputMode, pretty_kv, pretty_rule, pretty_section, render_mode};
use crate::project::{DEFAULT_PIPELINE, open_project};

#[derive(Subcommand, Debug)]
pub enum StageCommand {
    /// Add a stage to a pipeline.
    Add(StageAddArgs),
    /// List the stages of a pipeline in board order.
    List(StageListArgs),
    /// List the pipelines that have at least one stage.
    Pipelines,
}

#[derive(Args, Debug)]
pub struct StageAddArgs {
    /// Stage id, unique across all pipelines.
    pub id: String,

    /// Display name. Defaults to the id.
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, default_value = DEFAULT_PIPELINE)]
    pub pipeline: String,

    /// Board position. Defaults to after the last stage.
    #[arg(long)]
    pub order: Option<i32>,

    /// normal, won or lost.
    #[arg(long, default_value = "normal")]
    pub role: String,

    /// Colour hint for front ends, e.g. `#3366ff`.
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args, Debug)]
pub struct StageListArgs {
    #[arg(long, default_value = DEFAULT_PIPELINE)]
    pub pipeline: String,
}

pub fn run_stage(command: &StageCommand, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    match command {
        StageCommand::Add(args) => run_stage_add(args, output, project_root),
        StageCommand::List(args) => run_stage_list(args, output, project_root),
        StageCommand::Pipelines => run_pipelines(output, project_root),
    }
}

fn run_stage_add(args: &StageAddArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let system_role: SystemRole = args
        .role
        .parse()
        .map_err(|e| report_invalid(output, format!("{e}")))?;
    if args.id.trim().is_empty() {
        return Err(report_invalid(output, "stage id must not be empty"));
    }

    let project = open_project(project_root, output)?;
    let order = match args.order {
        Some(order) => order,
        None => project
            .store
            .list_stages(&args.pipeline)
            .map_err(|e| report(output, &DealsError::from(e)))?
            .iter()
            .map(|stage| stage.order)
            .max()
            .map_or(1, |last| last + 1),
    };

    let stage = Stage {
        id: args.id.clone(),
        pipeline_id: args.pipeline.clone(),
        name: args.name.clone().unwrap_or_default(),
        order,
        color_hint: args.color.clone(),
        system_role,
    };
    let stage = service::add_stage(&project.store, stage).map_err(|e| report(output, &e))?;

    render_mode(
        output,
        &stage,
        |s, w| writeln!(w, "{}\t{}\t{}\t{}", s.id, s.order, s.system_role, s.name),
        |s, w| {
            pretty_section(w, &format!("Stage added to {}", s.pipeline_id))?;
            pretty_kv(w, "ID", &s.id)?;
            pretty_kv(w, "Name", &s.name)?;
            pretty_kv(w, "Order", s.order.to_string())?;
            pretty_kv(w, "Role", s.system_role.to_string())
        },
    )
}

fn run_stage_list(args: &StageListArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;
    let catalog = service::list_stages(&project.store, &args.pipeline).map_err(|e| report(output, &e))?;
    let stages = catalog.list_stages().to_vec();

    render_mode(
        output,
        &stages,
        |stages, w| {
            for s in stages {
                writeln!(w, "{}\t{}\t{}\t{}", s.id, s.order, s.system_role, s.name)?;
            }
            Ok(())
        },
        |stages, w| {
            pretty_section(w, &format!("Pipeline {}", args.pipeline))?;
            writeln!(w, "{:<5} {:<20} {:<8} NAME", "ORDER", "ID", "ROLE")?;
            for s in stages {
                writeln!(w, "{:<5} {:<20} {:<8} {}", s.order, s.id, s.system_role.to_string(), s.name)?;
            }
            pretty_rule(w)
        },
    )
}

fn run_pipelines(output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;
    let pipelines = project
        .store
        .list_pipelines()
        .map_err(|e| report(output, &DealsError::from(e)))?;

    render_mode(
        output,
        &pipelines,
        |pipelines, w| {
            for id in pipelines {
                writeln!(w, "{id}")?;
            }
            Ok(())
        },
        |pipelines, w| {
            pretty_section(w, "Pipelines")?;
            for id in pipelines {
                writeln!(w, "  {id}")?;
            }
            pretty_rule(w)
        },
    )
}
