//! `deals board`: the kanban view of a pipeline.

use clap::Args;
use deals_core::pipeline::BoardFilter;
use deals_core::service;
use std::io::Write;
use std::path::Path;

use super::{report, require_actor};
use crate::output::{OutputMode, money, pretty_rule, render_mode};
use crate::project::{DEFAULT_PIPELINE, open_project};

#[derive(Args, Debug)]
pub struct BoardArgs {
    #[arg(long, default_value = DEFAULT_PIPELINE)]
    pub pipeline: String,

    /// Only opportunities owned by the acting user.
    #[arg(long)]
    pub mine: bool,

    /// Include archived opportunities.
    #[arg(long)]
    pub all: bool,
}

pub fn run_board(
    args: &BoardArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let only_owner = if args.mine {
        Some(require_actor(actor_flag, output)?)
    } else {
        None
    };
    let filter = BoardFilter {
        only_owner,
        include_archived: args.all,
    };

    let project = open_project(project_root, output)?;
    let board = service::board(&project.store, &args.pipeline, &filter).map_err(|e| report(output, &e))?;

    render_mode(
        output,
        &board,
        |b, w| {
            for column in &b.columns {
                writeln!(
                    w,
                    "# {}\t{}\t{}\t{}",
                    column.stage.id,
                    column.opportunities.len(),
                    money(column.total_amount),
                    money(column.weighted_amount)
                )?;
                for o in &column.opportunities {
                    writeln!(w, "{}\t{}\t{}\t{}", o.id, money(o.amount()), o.probability, o.title)?;
                }
            }
            Ok(())
        },
        |b, w| {
            writeln!(w, "Board: {} ({} cards)", b.pipeline_id, b.card_count())?;
            for column in &b.columns {
                pretty_rule(w)?;
                writeln!(
                    w,
                    "{} [{}]  total {}  weighted {}",
                    column.stage.name,
                    column.stage.system_role,
                    money(column.total_amount),
                    money(column.weighted_amount)
                )?;
                if column.opportunities.is_empty() {
                    writeln!(w, "  (empty)")?;
                }
                for o in &column.opportunities {
                    let archived = if o.archived { "  [archived]" } else { "" };
                    writeln!(
                        w,
                        "  {:<38} {:>12} {:>5}  {}{archived}",
                        o.id,
                        money(o.amount()),
                        o.probability.to_string(),
                        o.title
                    )?;
                }
            }
            pretty_rule(w)
        },
    )
}
