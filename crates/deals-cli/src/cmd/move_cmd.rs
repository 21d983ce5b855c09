//! `deals move`: move an opportunity to another stage of its pipeline.

use clap::Args;
use deals_core::model::activity::Activity;
use deals_core::model::opportunity::Opportunity;
use deals_core::service;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use super::{report, require_actor};
use crate::output::{OutputMode, or_dash, pretty_kv, pretty_section, render_mode};
use crate::project::open_project;

#[derive(Args, Debug)]
pub struct MoveArgs {
    /// Opportunity ID.
    pub id: String,

    /// Target stage ID.
    pub stage: String,

    /// Reason code; required when the target is a won or lost stage.
    #[arg(long)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct MoveOutput {
    moved: bool,
    opportunity: Opportunity,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage_change: Option<Activity>,
}

pub fn run_move(
    args: &MoveArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let project = open_project(project_root, output)?;

    let transition = service::move_opportunity(
        &project.store,
        &project.reasons(),
        &args.id,
        &args.stage,
        args.reason.as_deref(),
        &actor,
        &project.ctx,
    )
    .map_err(|e| report(output, &e))?;

    let result = MoveOutput {
        moved: transition.is_moved(),
        stage_change: transition.stage_change().cloned(),
        opportunity: transition.into_opportunity(),
    };

    render_mode(
        output,
        &result,
        |r, w| {
            let from = r
                .stage_change
                .as_ref()
                .and_then(|a| a.stage_change.as_ref())
                .map_or(r.opportunity.stage_id.as_str(), |c| c.from_stage_id.as_str());
            writeln!(w, "{}\t{from}\t{}\t{}", r.opportunity.id, r.opportunity.stage_id, r.moved)
        },
        |r, w| {
            if !r.moved {
                return writeln!(w, "{} is already in {}", r.opportunity.id, r.opportunity.stage_id);
            }
            pretty_section(w, &format!("Moved {}", r.opportunity.id))?;
            if let Some(change) = r.stage_change.as_ref().and_then(|a| a.stage_change.as_ref()) {
                pretty_kv(w, "From", &change.from_stage_id)?;
                pretty_kv(w, "To", &change.to_stage_id)?;
            }
            let reason = r
                .opportunity
                .loss_reason
                .as_deref()
                .or(r.opportunity.win_reason.as_deref());
            pretty_kv(w, "Reason", or_dash(reason))
        },
    )
}
