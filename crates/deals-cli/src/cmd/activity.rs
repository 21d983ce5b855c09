//! `deals activity add|complete|update|delete`: timeline entries.
//!
//! Completion is gated: a task or meeting can only be completed or
//! uncompleted on its own civil date.

use clap::{Args, Subcommand};
use deals_core::model::activity::{Activity, ActivityDraft, ActivityKind, ActivityPatch};
use deals_core::service;
use std::io::{self, Write};
use std::path::Path;

use super::{clearable, parse_clearable_when, parse_when, report, report_invalid, require_actor};
use crate::output::{OutputMode, or_dash, pretty_kv, pretty_section, render_mode, render_success};
use crate::project::open_project;

#[derive(Subcommand, Debug)]
pub enum ActivityCommand {
    /// Attach a note, call, email, whatsapp, meeting, task or reminder.
    Add(ActivityAddArgs),
    /// Mark a task or meeting done (or not done with `--undo`).
    Complete(ActivityCompleteArgs),
    /// Edit an activity's content or schedule.
    Update(ActivityUpdateArgs),
    /// Delete an activity. Stage changes cannot be deleted.
    Delete(ActivityDeleteArgs),
}

#[derive(Args, Debug)]
pub struct ActivityAddArgs {
    /// Opportunity ID.
    pub opportunity: String,

    #[arg(long, default_value = "note")]
    pub kind: ActivityKind,

    #[arg(long)]
    pub content: Option<String>,

    /// Meeting start, RFC 3339 or `YYYY-MM-DD HH:MM` in the business zone.
    #[arg(long)]
    pub start: Option<String>,

    /// Meeting end.
    #[arg(long)]
    pub end: Option<String>,

    /// Task or reminder due time.
    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// Assignee of a task.
    #[arg(long)]
    pub assign: Option<String>,

    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Args, Debug)]
pub struct ActivityCompleteArgs {
    /// Activity ID.
    pub id: String,

    /// Clear the completion instead.
    #[arg(long, conflicts_with = "toggle")]
    pub undo: bool,

    /// Flip the current state.
    #[arg(long)]
    pub toggle: bool,
}

impl ActivityCompleteArgs {
    /// `None` means toggle.
    const fn desired(&self) -> Option<bool> {
        if self.toggle { None } else { Some(!self.undo) }
    }
}

#[derive(Args, Debug)]
pub struct ActivityUpdateArgs {
    /// Activity ID.
    pub id: String,

    /// New content, or `none` to clear.
    #[arg(long)]
    pub content: Option<String>,

    /// `none` clears.
    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub end: Option<String>,

    #[arg(long)]
    pub due: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub assign: Option<String>,
}

#[derive(Args, Debug)]
pub struct ActivityDeleteArgs {
    /// Activity ID.
    pub id: String,
}

pub fn run_activity(
    command: &ActivityCommand,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    match command {
        ActivityCommand::Add(args) => run_add(args, actor_flag, output, project_root),
        ActivityCommand::Complete(args) => run_complete(args, actor_flag, output, project_root),
        ActivityCommand::Update(args) => run_update(args, output, project_root),
        ActivityCommand::Delete(args) => run_delete(args, output, project_root),
    }
}

fn activity_line(a: &Activity, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "{}\t{}\t{}\t{}",
        a.id,
        a.kind,
        a.completed,
        a.content.as_deref().unwrap_or_default()
    )
}

fn activity_pretty(heading: &str, a: &Activity, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{heading}: {} {}", a.kind, a.id))?;
    pretty_kv(w, "Opportunity", &a.opportunity_id)?;
    pretty_kv(w, "Content", or_dash(a.content.as_deref()))?;
    if a.kind.is_completable() {
        pretty_kv(w, "Completed", if a.completed { "yes" } else { "no" })?;
        if let Some(by) = &a.completed_by {
            pretty_kv(w, "Completed by", by)?;
        }
    }
    if let Some(start) = a.start_at {
        pretty_kv(w, "Start", start.to_rfc3339())?;
    }
    if let Some(end) = a.end_at {
        pretty_kv(w, "End", end.to_rfc3339())?;
    }
    if let Some(due) = a.due_at {
        pretty_kv(w, "Due", due.to_rfc3339())?;
    }
    if let Some(location) = &a.location {
        pretty_kv(w, "Location", location)?;
    }
    if let Some(assignee) = &a.assigned_to {
        pretty_kv(w, "Assigned to", assignee)?;
    }
    Ok(())
}

fn run_add(
    args: &ActivityAddArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let project = open_project(project_root, output)?;
    let calendar = &project.ctx.calendar;

    let when = |value: Option<&String>| {
        value
            .map(|v| parse_when(v, calendar))
            .transpose()
            .map_err(|e| report_invalid(output, format!("{e:#}")))
    };
    let mut draft = ActivityDraft::new(
        args.id.clone().unwrap_or_default(),
        args.opportunity.clone(),
        args.kind,
    );
    draft.content = args.content.clone();
    draft.start_at = when(args.start.as_ref())?;
    draft.end_at = when(args.end.as_ref())?;
    draft.due_at = when(args.due.as_ref())?;
    draft.location = args.location.clone();
    draft.assigned_to = args.assign.clone();

    let activity = service::add_activity(&project.store, draft, &actor, &project.ctx)
        .map_err(|e| report(output, &e))?;
    render_mode(output, &activity, activity_line, |a, w| activity_pretty("Added", a, w))
}

fn run_complete(
    args: &ActivityCompleteArgs,
    actor_flag: Option<&str>,
    output: OutputMode,
    project_root: &Path,
) -> anyhow::Result<()> {
    let actor = require_actor(actor_flag, output)?;
    let project = open_project(project_root, output)?;
    let activity = service::set_activity_completion(
        &project.store,
        &args.id,
        args.desired(),
        &actor,
        &project.ctx,
    )
    .map_err(|e| report(output, &e))?;

    render_mode(output, &activity, activity_line, |a, w| {
        let heading = if a.completed { "Completed" } else { "Reopened" };
        activity_pretty(heading, a, w)
    })
}

fn run_update(args: &ActivityUpdateArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;
    let calendar = &project.ctx.calendar;
    let when = |value: Option<&String>| {
        parse_clearable_when(value.map(String::as_str), calendar)
            .map_err(|e| report_invalid(output, format!("{e:#}")))
    };

    let patch = ActivityPatch {
        content: clearable(args.content.as_deref()),
        start_at: when(args.start.as_ref())?,
        end_at: when(args.end.as_ref())?,
        due_at: when(args.due.as_ref())?,
        location: clearable(args.location.as_deref()),
        assigned_to: clearable(args.assign.as_deref()),
    };

    let activity = service::update_activity(&project.store, &args.id, &patch, &project.ctx)
        .map_err(|e| report(output, &e))?;
    render_mode(output, &activity, activity_line, |a, w| activity_pretty("Updated", a, w))
}

fn run_delete(args: &ActivityDeleteArgs, output: OutputMode, project_root: &Path) -> anyhow::Result<()> {
    let project = open_project(project_root, output)?;
    service::delete_activity(&project.store, &args.id).map_err(|e| report(output, &e))?;

    render_success(output, &format!("deleted activity {}", args.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(undo: bool, toggle: bool) -> ActivityCompleteArgs {
        ActivityCompleteArgs {
            id: "act-1".into(),
            undo,
            toggle,
        }
    }

    #[test]
    fn completion_flags_map_to_desired_state() {
        assert_eq!(complete(false, false).desired(), Some(true));
        assert_eq!(complete(true, false).desired(), Some(false));
        assert_eq!(complete(false, true).desired(), None);
    }
}
