//! `deals update`: edit plain opportunity fields.
//!
//! Stage and reasons are not editable here; use `deals move`.

use chrono::NaiveDate;
use clap::Args;
use deals_core::DealsError;
use deals_core::model::opportunity::{OpportunityEdit, Probability};
use deals_core::service;
use rust_decimal::Decimal;
use std::path::Path;

use super::{clearable, report, report_invalid};
use super::show::{opportunity_line, opportunity_pretty};
use crate::output::{OutputMode, render_mode};
use crate::project::open_project;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Opportunity ID.
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    /// New description, or `none` to clear.
    #[arg(long)]
    pub description: Option<String>,

    /// New amount, or `none` to clear.
    #[arg(long)]
    pub amount: Option<String>,

    #[arg(long)]
    pub probability: Option<i64>,

    /// `YYYY-MM-DD`, or `none` to clear.
    #[arg(long)]
    pub close_date: Option<String>,

    /// New owner, or `none` to clear.
    #[arg(long)]
    pub owner: Option<String>,
}

fn parse_clearable<T: std::str::FromStr>(
    field: &str,
    value: Option<&str>,
) -> Result<Option<Option<T>>, String>
where
    T::Err: std::fmt::Display,
{
    match clearable(value) {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(raw)) => raw
            .parse()
            .map(|parsed| Some(Some(parsed)))
            .map_err(|e| format!("invalid --{field} '{raw}': {e}")),
    }
}

fn build_edit(args: &UpdateArgs) -> Result<OpportunityEdit, String> {
    Ok(OpportunityEdit {
        title: args.title.clone(),
        description: clearable(args.description.as_deref()),
        estimated_amount: parse_clearable::<Decimal>("amount", args.amount.as_deref())?,
        probability: None,
        expected_close_date: parse_clearable::<NaiveDate>("close-date", args.close_date.as_deref())?,
        owner_id: clearable(args.owner.as_deref()),
    })
}

pub fn run_update(args: &UpdateArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let mut edit = build_edit(args).map_err(|msg| report_invalid(output, msg))?;
    edit.probability = args
        .probability
        .map(Probability::try_from)
        .transpose()
        .map_err(|e| report(output, &DealsError::from(e)))?;

    let project = open_project(project_root, output)?;
    let opportunity = service::update_opportunity(&project.store, &args.id, &edit, &project.ctx)
        .map_err(|e| report(output, &e))?;

    render_mode(output, &opportunity, opportunity_line, |o, w| {
        opportunity_pretty("Updated", o, w)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn args() -> UpdateArgs {
        UpdateArgs {
            id: "opp-1".into(),
            title: None,
            description: None,
            amount: None,
            probability: None,
            close_date: None,
            owner: None,
        }
    }

    #[test]
    fn untouched_flags_make_an_empty_edit() {
        assert!(build_edit(&args()).expect("edit").is_empty());
    }

    #[test]
    fn none_clears_and_values_parse() {
        let edit = build_edit(&UpdateArgs {
            amount: Some("2500.50".into()),
            close_date: Some("none".into()),
            owner: Some("NONE".into()),
            ..args()
        })
        .expect("edit");
        assert_eq!(edit.estimated_amount, Some(Some(dec!(2500.50))));
        assert_eq!(edit.expected_close_date, Some(None));
        assert_eq!(edit.owner_id, Some(None));
    }

    #[test]
    fn bad_amount_names_the_flag() {
        let err = build_edit(&UpdateArgs {
            amount: Some("lots".into()),
            ..args()
        })
        .expect_err("invalid");
        assert!(err.contains("--amount"));
    }
}
