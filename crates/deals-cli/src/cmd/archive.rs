//! `deals archive`: hide an opportunity from the board and forecast, or
//! bring it back with `--undo`.

use clap::Args;
use deals_core::service;
use std::io::Write;
use std::path::Path;

use super::report;
use crate::output::{OutputMode, render_mode};
use crate::project::open_project;

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    /// Opportunity ID.
    pub id: String,

    /// Unarchive instead.
    #[arg(long)]
    pub undo: bool,
}

pub fn run_archive(args: &ArchiveArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;
    let opportunity = service::archive(&project.store, &args.id, !args.undo, &project.ctx)
        .map_err(|e| report(output, &e))?;

    let verb = if opportunity.archived { "archived" } else { "unarchived" };
    render_mode(
        output,
        &opportunity,
        |o, w| writeln!(w, "{}\t{verb}", o.id),
        |o, w| writeln!(w, "{verb} {} ({})", o.id, o.title),
    )
}
