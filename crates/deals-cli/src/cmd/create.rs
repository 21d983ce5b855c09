//! `deals create`: open a new opportunity.

use clap::Args;
use deals_core::DealsError;
use deals_core::model::opportunity::{OpportunityDraft, Probability};
use deals_core::service;
use rust_decimal::Decimal;
use std::path::Path;

use super::report;
use super::show::{opportunity_line, opportunity_pretty};
use crate::actor;
use crate::output::{OutputMode, render_mode};
use crate::project::{DEFAULT_PIPELINE, open_project};

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub title: String,

    /// Contact the opportunity belongs to.
    #[arg(long)]
    pub contact: String,

    #[arg(long, default_value = DEFAULT_PIPELINE)]
    pub pipeline: String,

    /// Starting stage. Defaults to the first open stage.
    #[arg(long)]
    pub stage: Option<String>,

    /// Estimated amount, e.g. `1500.00`.
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Win probability in percent. Defaults to `[defaults].probability`.
    #[arg(long)]
    pub probability: Option<i64>,

    /// Expected close date, `YYYY-MM-DD`.
    #[arg(long)]
    pub close_date: Option<chrono::NaiveDate>,

    /// Owner. Defaults to the acting user when one is known.
    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Explicit id instead of a generated one.
    #[arg(long)]
    pub id: Option<String>,
}

pub fn run_create(
    args: &CreateArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;

    let probability = match args.probability {
        Some(value) => Probability::try_from(value),
        None => project.config.default_probability(),
    }
    .map_err(|e| report(output, &DealsError::from(e)))?;

    let draft = OpportunityDraft {
        id: args.id.clone().unwrap_or_default(),
        contact_id: args.contact.clone(),
        title: args.title.clone(),
        description: args.description.clone(),
        stage_id: args.stage.clone(),
        estimated_amount: args.amount,
        probability,
        expected_close_date: args.close_date,
        owner_id: args.owner.clone().or_else(|| actor::resolve_actor(actor_flag)),
    };

    let opportunity = service::create_opportunity(&project.store, &args.pipeline, draft, &project.ctx)
        .map_err(|e| report(output, &e))?;

    render_mode(output, &opportunity, opportunity_line, |o, w| {
        opportunity_pretty("Created", o, w)
    })
}
