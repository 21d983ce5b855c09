//! `deals show`: one opportunity, archived or not.

use clap::Args;
use deals_core::model::opportunity::Opportunity;
use deals_core::service;
use std::io::{self, Write};
use std::path::Path;

use super::report;
use crate::output::{OutputMode, money, or_dash, pretty_kv, pretty_section, render_mode};
use crate::project::open_project;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Opportunity ID.
    pub id: String,
}

/// `id  stage  amount  probability  title` on one line.
pub fn opportunity_line(o: &Opportunity, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}\t{}",
        o.id,
        o.stage_id,
        money(o.amount()),
        o.probability,
        o.title
    )
}

pub fn opportunity_pretty(heading: &str, o: &Opportunity, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{heading}: {}", o.title))?;
    pretty_kv(w, "ID", &o.id)?;
    pretty_kv(w, "Pipeline", &o.pipeline_id)?;
    pretty_kv(w, "Stage", &o.stage_id)?;
    pretty_kv(w, "Contact", &o.contact_id)?;
    pretty_kv(w, "Amount", or_dash(o.estimated_amount.map(money)))?;
    pretty_kv(w, "Probability", o.probability.to_string())?;
    pretty_kv(w, "Weighted", or_dash(o.weighted_amount().map(money)))?;
    pretty_kv(w, "Close date", or_dash(o.expected_close_date))?;
    pretty_kv(w, "Owner", or_dash(o.owner_id.as_deref()))?;
    if let Some(reason) = &o.loss_reason {
        pretty_kv(w, "Loss reason", reason)?;
    }
    if let Some(reason) = &o.win_reason {
        pretty_kv(w, "Win reason", reason)?;
    }
    if o.archived {
        pretty_kv(w, "Archived", or_dash(o.archived_at.map(|at| at.to_rfc3339())))?;
    }
    if let Some(description) = &o.description {
        writeln!(w)?;
        writeln!(w, "{description}")?;
    }
    Ok(())
}

pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;
    let opportunity =
        service::get_opportunity(&project.store, &args.id).map_err(|e| report(output, &e))?;

    render_mode(output, &opportunity, opportunity_line, |o, w| {
        opportunity_pretty("Opportunity", o, w)
    })
}
