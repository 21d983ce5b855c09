//! `deals forecast`: raw and weighted pipeline totals.

use clap::Args;
use deals_core::service;
use std::io::Write;
use std::path::Path;

use super::report;
use crate::output::{OutputMode, money, pretty_kv, pretty_rule, pretty_section, render_mode};
use crate::project::{DEFAULT_PIPELINE, open_project};

#[derive(Args, Debug)]
pub struct ForecastArgs {
    #[arg(long, default_value = DEFAULT_PIPELINE)]
    pub pipeline: String,
}

pub fn run_forecast(args: &ForecastArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;
    let forecast =
        service::forecast(&project.store, &args.pipeline).map_err(|e| report(output, &e))?;

    render_mode(
        output,
        &forecast,
        |f, w| {
            for stage in &f.per_stage {
                writeln!(
                    w,
                    "{}\t{}\t{}\t{}",
                    stage.stage_id,
                    stage.count,
                    money(stage.total_amount),
                    money(stage.weighted_amount)
                )?;
            }
            writeln!(
                w,
                "pipeline\t{}\t{}\t{}",
                f.open_count,
                money(f.pipeline_total),
                money(f.pipeline_weighted_total)
            )?;
            writeln!(w, "won\t{}\t{}", f.won_count, money(f.won_amount))?;
            writeln!(w, "lost\t{}", f.lost_count)
        },
        |f, w| {
            pretty_section(w, &format!("Forecast: {}", f.pipeline_id))?;
            writeln!(w, "{:<20} {:>6} {:>14} {:>14}", "STAGE", "COUNT", "TOTAL", "WEIGHTED")?;
            for stage in &f.per_stage {
                writeln!(
                    w,
                    "{:<20} {:>6} {:>14} {:>14}",
                    stage.stage_name,
                    stage.count,
                    money(stage.total_amount),
                    money(stage.weighted_amount)
                )?;
            }
            pretty_rule(w)?;
            pretty_kv(w, "Open", format!("{} deals, {}", f.open_count, money(f.pipeline_total)))?;
            pretty_kv(w, "Weighted", money(f.pipeline_weighted_total))?;
            pretty_kv(w, "Won", format!("{} deals, {}", f.won_count, money(f.won_amount)))?;
            pretty_kv(w, "Lost", f.lost_count.to_string())
        },
    )
}
